// Weighted sampling without replacement

use rand::Rng;

/// Draws candidates in a random order biased toward higher weights
///
/// Each draw picks `r` uniformly in `[0, total)`, walks the remaining entries
/// accumulating weight until the running sum exceeds `r`, then removes that
/// entry. A candidate is never returned twice.
#[derive(Debug, Clone)]
pub struct WeightedSampler<T> {
    remaining: Vec<(T, u64)>,
    total: u64,
}

impl<T: Copy> WeightedSampler<T> {
    /// Zero-weight entries are never drawn
    pub fn new(entries: impl IntoIterator<Item = (T, u64)>) -> Self {
        let remaining: Vec<(T, u64)> = entries.into_iter().filter(|(_, w)| *w > 0).collect();
        let total = remaining.iter().map(|(_, w)| w).sum();
        Self { remaining, total }
    }

    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    /// Next candidate, or `None` once every entry was drawn
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<T> {
        if self.total == 0 {
            return None;
        }

        let target = rng.gen_range(0..self.total);
        let mut cumulative: u64 = 0;
        let index = self
            .remaining
            .iter()
            .position(|(_, weight)| {
                cumulative += weight;
                cumulative > target
            })?;

        let (candidate, weight) = self.remaining.remove(index);
        self.total -= weight;
        Some(candidate)
    }

    /// Drain the whole permutation
    pub fn into_order<R: Rng + ?Sized>(mut self, rng: &mut R) -> Vec<T> {
        let mut order = Vec::with_capacity(self.remaining.len());
        while let Some(candidate) = self.draw(rng) {
            order.push(candidate);
        }
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_draws_every_candidate_once() {
        let mut rng = StdRng::seed_from_u64(7);
        let sampler = WeightedSampler::new([("a", 5), ("b", 1), ("c", 2), ("d", 9)]);

        let order = sampler.into_order(&mut rng);
        let unique: HashSet<_> = order.iter().collect();
        assert_eq!(order.len(), 4);
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_empty_and_zero_weights() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut empty: WeightedSampler<&str> = WeightedSampler::new([]);
        assert!(empty.draw(&mut rng).is_none());

        let mut zero = WeightedSampler::new([("a", 0), ("b", 1)]);
        assert_eq!(zero.len(), 1);
        assert_eq!(zero.draw(&mut rng), Some("b"));
        assert!(zero.draw(&mut rng).is_none());
        assert!(zero.is_empty());
    }

    #[test]
    fn test_first_draw_follows_weights() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut heavy = 0;
        let draws = 4000;

        for _ in 0..draws {
            let mut sampler = WeightedSampler::new([("heavy", 3), ("light", 1)]);
            if sampler.draw(&mut rng) == Some("heavy") {
                heavy += 1;
            }
        }

        // Expected 3000; allow generous statistical tolerance
        assert!((2800..=3200).contains(&heavy), "heavy drawn {} times", heavy);
    }

    #[test]
    fn test_second_draw_is_the_other_candidate() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let mut sampler = WeightedSampler::new([(0usize, 10), (1usize, 1)]);
            let first = sampler.draw(&mut rng).unwrap();
            let second = sampler.draw(&mut rng).unwrap();
            assert_ne!(first, second);
        }
    }
}
