use clap::Parser;
use client::game::ClientGame;
use client::input::InputManager;
use client::network::{Connection, NetworkEvent};
use client::rendering::Renderer;
use log::{error, info};
use macroquad::prelude::*;
use shared::Identity;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, env = "PRESENCE_SERVER", default_value = "127.0.0.1:8080")]
    server: String,

    /// Display name shown to other players; joins as a guest when omitted
    #[arg(short = 'n', long, env = "PRESENCE_NAME")]
    name: Option<String>,

    /// External numeric id paired with the display name
    #[arg(short = 'e', long, env = "PRESENCE_EXTERNAL_ID", default_value = "0")]
    external_id: u64,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: usize,
}

impl Args {
    fn identity(&self) -> Option<Identity> {
        self.name
            .as_ref()
            .map(|name| Identity::new(self.external_id, name.clone()).truncated())
    }
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Presence".to_string(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    info!("Controls: WASD/arrows to move, I to toggle smoothing, Esc to quit");

    let mut connection = match Connection::spawn(&args.server) {
        Ok(connection) => connection,
        Err(e) => {
            error!("Failed to start network thread: {}", e);
            return;
        }
    };

    let mut game = ClientGame::with_bounds(args.identity(), args.width as f32, args.height as f32);
    let mut input_manager = InputManager::new();
    let mut renderer = Renderer::new(args.width, args.height);

    loop {
        for event in connection.poll() {
            match event {
                NetworkEvent::Packet(packet) => {
                    for reply in game.handle_packet(packet) {
                        connection.send(reply);
                    }
                }
                NetworkEvent::Closed(reason) => game.handle_closed(reason),
            }
        }

        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        let input = input_manager.update();
        if let Some(packet) = game.step(get_frame_time(), input) {
            connection.send(packet);
        }

        renderer.render(&game);

        next_frame().await;
    }

    connection.shutdown();
}
