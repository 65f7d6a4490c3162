//! Keyboard sampling and outbound movement coalescing

use macroquad::prelude::*;
use shared::{distance, MOVE_SEND_THRESHOLD};

/// One frame of sampled input
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InputFrame {
    /// Normalized movement direction, `(0, 0)` when idle
    pub direction: (f32, f32),
    /// True on the first idle frame after movement
    pub released: bool,
    pub toggle_smoothing: bool,
}

impl InputFrame {
    pub fn is_moving(&self) -> bool {
        self.direction != (0.0, 0.0)
    }
}

/// Samples WASD / arrow keys with edge detection for toggles
pub struct InputManager {
    was_moving: bool,
    prev_key_i: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self {
            was_moving: false,
            prev_key_i: false,
        }
    }

    pub fn update(&mut self) -> InputFrame {
        let left = is_key_down(KeyCode::A) || is_key_down(KeyCode::Left);
        let right = is_key_down(KeyCode::D) || is_key_down(KeyCode::Right);
        let up = is_key_down(KeyCode::W) || is_key_down(KeyCode::Up);
        let down = is_key_down(KeyCode::S) || is_key_down(KeyCode::Down);

        let raw_x = f32::from(u8::from(right)) - f32::from(u8::from(left));
        let raw_y = f32::from(u8::from(down)) - f32::from(u8::from(up));
        let direction = normalize(raw_x, raw_y);

        let key_i = is_key_down(KeyCode::I);
        let toggle_smoothing = key_i && !self.prev_key_i;
        self.prev_key_i = key_i;

        let moving = direction != (0.0, 0.0);
        let released = self.was_moving && !moving;
        self.was_moving = moving;

        InputFrame {
            direction,
            released,
            toggle_smoothing,
        }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

pub fn normalize(x: f32, y: f32) -> (f32, f32) {
    let magnitude = (x * x + y * y).sqrt();
    if magnitude > 0.0 {
        (x / magnitude, y / magnitude)
    } else {
        (0.0, 0.0)
    }
}

/// Drops position updates that moved less than a threshold since the last send.
///
/// Stale or duplicate sends are harmless since the server keeps the last
/// write, so this only limits traffic.
#[derive(Debug, Clone)]
pub struct MoveThrottle {
    last_sent: Option<(f32, f32)>,
    threshold: f32,
}

impl MoveThrottle {
    pub fn new(threshold: f32) -> Self {
        Self {
            last_sent: None,
            threshold,
        }
    }

    /// Sets the reference point, e.g. the spawn position.
    pub fn reset(&mut self, position: (f32, f32)) {
        self.last_sent = Some(position);
    }

    /// Returns the position to send, if it moved far enough.
    pub fn poll(&mut self, position: (f32, f32)) -> Option<(f32, f32)> {
        let should_send = match self.last_sent {
            Some(last) => distance(last, position) > self.threshold,
            None => true,
        };

        if should_send {
            self.last_sent = Some(position);
            Some(position)
        } else {
            None
        }
    }

    pub fn last_sent(&self) -> Option<(f32, f32)> {
        self.last_sent
    }
}

impl Default for MoveThrottle {
    fn default() -> Self {
        Self::new(MOVE_SEND_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_input_manager_creation() {
        let input_manager = InputManager::new();
        assert!(!input_manager.was_moving);
        assert!(!input_manager.prev_key_i);
    }

    #[test]
    fn test_normalize_diagonal() {
        let (x, y) = normalize(1.0, -1.0);
        assert_approx_eq!(x, std::f32::consts::FRAC_1_SQRT_2, 0.0001);
        assert_approx_eq!(y, -std::f32::consts::FRAC_1_SQRT_2, 0.0001);
        assert_eq!(normalize(0.0, 0.0), (0.0, 0.0));
    }

    #[test]
    fn test_throttle_sends_first_position() {
        let mut throttle = MoveThrottle::default();
        assert_eq!(throttle.poll((5.0, 5.0)), Some((5.0, 5.0)));
    }

    #[test]
    fn test_throttle_suppresses_small_moves() {
        let mut throttle = MoveThrottle::default();
        throttle.reset((100.0, 100.0));

        assert_eq!(throttle.poll((100.5, 100.5)), None);
        assert_eq!(throttle.poll((101.0, 100.0)), None);
        assert_eq!(throttle.poll((102.0, 100.0)), Some((102.0, 100.0)));
        assert_eq!(throttle.last_sent(), Some((102.0, 100.0)));
    }

    #[test]
    fn test_throttle_measures_from_last_send() {
        let mut throttle = MoveThrottle::new(1.0);
        throttle.reset((0.0, 0.0));

        // Small steps accumulate until they cross the threshold
        assert_eq!(throttle.poll((0.6, 0.0)), None);
        assert_eq!(throttle.poll((1.2, 0.0)), Some((1.2, 0.0)));
        assert_eq!(throttle.poll((1.8, 0.0)), None);
    }

    #[test]
    fn test_input_frame_is_moving() {
        let idle = InputFrame::default();
        assert!(!idle.is_moving());

        let moving = InputFrame {
            direction: (1.0, 0.0),
            ..InputFrame::default()
        };
        assert!(moving.is_moving());
    }
}
