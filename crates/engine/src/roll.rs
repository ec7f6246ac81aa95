//! Check roll helper.
//!
//! Resolution paths take `CheckRoll` values from the caller; this helper
//! exists for hosts that want the engine to roll. Tests inject their own
//! RNG to stay deterministic.

use rand::Rng;

use visioner_domain::CheckRoll;

/// Roll 1d20 + modifier with the thread RNG.
pub fn roll_check(modifier: i32) -> CheckRoll {
    roll_check_with(&mut rand::thread_rng(), modifier)
}

/// Roll 1d20 + modifier with a caller-provided RNG.
pub fn roll_check_with<R: Rng>(rng: &mut R, modifier: i32) -> CheckRoll {
    let die = rng.gen_range(1..=20);
    CheckRoll {
        die,
        modifier,
        total: die + modifier,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_roll_range() {
        for _ in 0..100 {
            let roll = roll_check(5);
            assert!(roll.die >= 1 && roll.die <= 20);
            assert_eq!(roll.total, roll.die + 5);
        }
    }

    #[test]
    fn test_seeded_roll_is_deterministic() {
        let mut first_rng = StdRng::seed_from_u64(7);
        let mut second_rng = StdRng::seed_from_u64(7);
        assert_eq!(
            roll_check_with(&mut first_rng, 3),
            roll_check_with(&mut second_rng, 3)
        );
    }
}
