// Keyboard direction handling
use glam::Vec2;

/// One of the four movement directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Accepts both `KeyboardEvent.key` values ("w", "ArrowUp") and codes ("KeyW").
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "w" | "W" | "KeyW" | "ArrowUp" => Some(Direction::Up),
            "s" | "S" | "KeyS" | "ArrowDown" => Some(Direction::Down),
            "a" | "A" | "KeyA" | "ArrowLeft" => Some(Direction::Left),
            "d" | "D" | "KeyD" | "ArrowRight" => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    /// Unit step in screen coordinates (y grows downward).
    pub fn unit(self) -> Vec2 {
        match self {
            Direction::Up => Vec2::new(0.0, -1.0),
            Direction::Down => Vec2::new(0.0, 1.0),
            Direction::Left => Vec2::new(-1.0, 0.0),
            Direction::Right => Vec2::new(1.0, 0.0),
        }
    }
}

/// Held keys with the direction each maps to, most recent last.
///
/// Two keys can share a direction ("w" and "ArrowUp"); releasing one
/// leaves the other held.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    held: Vec<(String, Direction)>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `dir` without a physical key, e.g. from a bot.
    pub fn press(&mut self, dir: Direction) {
        self.hold(dir.name().to_string(), dir);
    }

    /// Stop moving in `dir`, whichever keys were holding it.
    pub fn release(&mut self, dir: Direction) {
        self.held.retain(|(_, d)| *d != dir);
    }

    pub fn clear(&mut self) {
        self.held.clear();
    }

    /// Most recently pressed direction that is still held.
    pub fn intent(&self) -> Option<Direction> {
        self.held.last().map(|(_, dir)| *dir)
    }

    pub fn key_down(&mut self, key: &str) -> bool {
        match Direction::from_key(key) {
            Some(dir) => {
                self.hold(normalize(key), dir);
                true
            }
            None => false,
        }
    }

    pub fn key_up(&mut self, key: &str) -> bool {
        if Direction::from_key(key).is_none() {
            return false;
        }
        let key = normalize(key);
        self.held.retain(|(k, _)| *k != key);
        true
    }

    fn hold(&mut self, key: String, dir: Direction) {
        // Key repeat re-sends keydown; move it to the top either way.
        self.held.retain(|(k, _)| *k != key);
        self.held.push((key, dir));
    }
}

/// Shift changes "w" to "W" between keydown and keyup.
fn normalize(key: &str) -> String {
    if key.len() == 1 {
        key.to_ascii_lowercase()
    } else {
        key.to_string()
    }
}
