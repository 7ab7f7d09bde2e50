use rand::Rng;

/// Inclusive uniform selection used to pick equivalence class entries.
///
/// Every `rand::Rng` is a source, so a seeded `ChaCha8Rng` makes mutation
/// output reproducible.
pub trait RandomSource {
    /// Returns a value in `min..=max`.
    fn random_in_range(&mut self, min: usize, max: usize) -> usize;
}

impl<R: Rng + ?Sized> RandomSource for R {
    fn random_in_range(&mut self, min: usize, max: usize) -> usize {
        self.gen_range(min..=max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_range_is_inclusive() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut seen = [false; 4];

        for _ in 0..1000 {
            let value = rng.random_in_range(0, 3);
            assert!(value <= 3);
            seen[value] = true;
        }

        assert!(seen.iter().all(|hit| *hit));
    }

    #[test]
    fn test_degenerate_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(rng.random_in_range(5, 5), 5);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = ChaCha8Rng::seed_from_u64(42);
        let mut b = ChaCha8Rng::seed_from_u64(42);

        let first: Vec<usize> = (0..32).map(|_| a.random_in_range(0, 9)).collect();
        let second: Vec<usize> = (0..32).map(|_| b.random_in_range(0, 9)).collect();
        assert_eq!(first, second);
    }
}
