//! Weighted image sampling.

use rand::distributions::{Distribution, WeightedError, WeightedIndex};
use rand::Rng;

use crate::catalog::ImagePool;

/// Draws `min(k, pool.len())` URLs with replacement, proportionally to weight.
///
/// The same URL can appear more than once when the pool is small or skewed.
pub fn weighted_sample<R: Rng + ?Sized>(
    pool: &ImagePool,
    k: usize,
    rng: &mut R,
) -> Result<Vec<String>, WeightedError> {
    let entries = pool.entries();
    if entries.is_empty() {
        return Err(WeightedError::NoItem);
    }
    let dist = WeightedIndex::new(entries.iter().map(|e| e.weight))?;
    let draws = k.min(entries.len());
    Ok((0..draws)
        .map(|_| entries[dist.sample(rng)].url.clone())
        .collect())
}
