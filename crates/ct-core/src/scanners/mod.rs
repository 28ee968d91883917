//! Scanners
//!
//! A scanner maps a target onto a [`ScanResult`]. Scanners never touch scan
//! records; the lifecycle manager owns those.

pub mod iac;
pub mod was;

use crate::{CoreResult, ScanResult, ScanType};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;

/// Trait implemented by every scanner the lifecycle manager can run
#[async_trait]
pub trait Scanner: Send + Sync {
    /// The scan type this scanner handles
    fn scan_type(&self) -> ScanType;

    /// Scan a target (URL or file path)
    async fn scan(&self, target: &str) -> CoreResult<ScanResult>;
}

/// Pick a uniformly random subset of `items` without replacement.
///
/// The subset size is drawn uniformly from `[min, items.len()]`, with `min`
/// capped at the catalog size. An empty catalog yields an empty subset.
pub fn sample_subset<'a, T, R>(items: &'a [T], min: usize, rng: &mut R) -> Vec<&'a T>
where
    R: Rng + ?Sized,
{
    if items.is_empty() {
        return Vec::new();
    }

    let low = min.min(items.len());
    let amount = rng.gen_range(low..=items.len());
    items.choose_multiple(rng, amount).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_sample_subset_bounds() {
        let items = [1, 2, 3, 4, 5];
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..500 {
            let picked = sample_subset(&items, 2, &mut rng);
            let drawn = picked.len();
            assert!((2..=5).contains(&drawn));

            let mut values: Vec<i32> = picked.into_iter().copied().collect();
            values.sort_unstable();
            values.dedup();
            assert_eq!(values.len(), drawn, "duplicates drawn");
        }
    }

    #[test]
    fn test_sample_subset_reaches_every_size() {
        let items = [1, 2, 3, 4];
        let mut rng = StdRng::seed_from_u64(11);
        let mut seen = [false; 5];

        for _ in 0..400 {
            seen[sample_subset(&items, 1, &mut rng).len()] = true;
        }

        assert_eq!(seen, [false, true, true, true, true]);
    }

    #[test]
    fn test_sample_subset_edge_cases() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(sample_subset::<u8, _>(&[], 1, &mut rng).is_empty());

        // Minimum larger than the catalog takes everything
        let items = [9];
        assert_eq!(sample_subset(&items, 2, &mut rng), vec![&9]);
    }
}
