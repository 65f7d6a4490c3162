use crate::game::{ClientGame, ConnectionStatus};
use crate::presence::Proxy;
use macroquad::prelude::*;
use shared::PLAYER_SIZE;

const LOCAL_COLOR: Color = Color::new(0.0, 0.6, 0.6, 1.0);
const REMOTE_COLOR: Color = Color::new(0.55, 0.55, 0.55, 1.0);
const PUZZLE_AREA_COLOR: Color = Color::new(0.27, 0.27, 0.27, 1.0);

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn render(&mut self, game: &ClientGame) {
        clear_background(Color::from_rgba(26, 26, 26, 255));

        self.draw_puzzle_area();

        for proxy in game.view.remotes() {
            self.draw_proxy(proxy, REMOTE_COLOR);
        }
        // Drawn last so it stays on top
        if let Some(local) = game.view.local() {
            self.draw_proxy(local, LOCAL_COLOR);
        }

        self.draw_ui(game);
    }

    fn draw_puzzle_area(&mut self) {
        let w = self.width * 0.3;
        let h = self.height * 0.3;
        let x = (self.width - w) / 2.0;
        let y = (self.height - h) / 2.0;

        draw_rectangle(x, y, w, h, PUZZLE_AREA_COLOR);
        draw_rectangle_lines(x, y, w, h, 2.0, GRAY);
        draw_text("Puzzle Area", x + 8.0, y + 20.0, 18.0, LIGHTGRAY);
    }

    /// Proxies are positioned by their center.
    fn draw_proxy(&mut self, proxy: &Proxy, color: Color) {
        let (cx, cy) = proxy.position();
        let x = cx - PLAYER_SIZE / 2.0;
        let y = cy - PLAYER_SIZE / 2.0;

        draw_rectangle(x, y, PLAYER_SIZE, PLAYER_SIZE, color);
        draw_rectangle_lines(x, y, PLAYER_SIZE, PLAYER_SIZE, 2.0, WHITE);

        let name = proxy.display_name();
        let dims = measure_text(name, None, 14, 1.0);
        draw_text(name, cx - dims.width / 2.0, y - 6.0, 14.0, WHITE);
    }

    fn draw_ui(&mut self, game: &ClientGame) {
        draw_text(&game.welcome_text(), 10.0, 24.0, 22.0, WHITE);

        let (status, color) = match game.status() {
            ConnectionStatus::Connecting => ("Connecting...".to_string(), YELLOW),
            ConnectionStatus::Connected => ("Connected".to_string(), GREEN),
            ConnectionStatus::Closed(reason) => (format!("Disconnected: {}", reason), RED),
        };
        draw_rectangle(10.0, 36.0, 8.0, 8.0, color);
        draw_text(&status, 24.0, 44.0, 14.0, WHITE);

        let players = format!("{} players", game.view.player_count());
        draw_text(&players, 10.0, 62.0, 14.0, WHITE);

        let smoothing = if game.view.smoothing() { GREEN } else { RED };
        draw_rectangle(10.0, 70.0, 8.0, 8.0, smoothing);
        draw_text("I: smoothing", 24.0, 78.0, 14.0, WHITE);
    }
}
