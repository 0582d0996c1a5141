//! Random-walk steering for the headless player.

use client::input::{Direction, InputState};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DIRECTIONS: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

/// Holds one direction for a random number of ticks, picking a new one
/// early when the player stops moving (ran into a wall).
pub struct Wanderer {
    rng: StdRng,
    ticks_left: u32,
}

impl Wanderer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            ticks_left: 0,
        }
    }

    /// Returns the direction pressed this tick, if it changed.
    pub fn steer(&mut self, input: &mut InputState, stuck: bool) -> Option<Direction> {
        if self.ticks_left > 0 && !stuck {
            self.ticks_left -= 1;
            return None;
        }
        let next = DIRECTIONS[self.rng.random_range(0..DIRECTIONS.len())];
        input.clear();
        input.press(next);
        self.ticks_left = self.rng.random_range(30..180);
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holds_exactly_one_direction() {
        let mut bot = Wanderer::new(7);
        let mut input = InputState::new();
        let first = bot.steer(&mut input, false).unwrap();
        assert_eq!(input.intent(), Some(first));

        // Not stuck: keeps going.
        assert!(bot.steer(&mut input, false).is_none());
        assert_eq!(input.intent(), Some(first));
    }

    #[test]
    fn stuck_forces_a_new_pick() {
        let mut bot = Wanderer::new(7);
        let mut input = InputState::new();
        bot.steer(&mut input, false);
        let picked = bot.steer(&mut input, true).unwrap();
        assert_eq!(input.intent(), Some(picked));
        input.release(picked);
        assert_eq!(input.intent(), None);
    }
}
