//! Switch edge selection strategies.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::graph::{EdgeId, SelectionMethod};

/// Pick one edge among eligible `(edge, weight)` candidates.
///
/// Returns `None` only when there are no candidates.
pub fn select<R: Rng>(
    method: SelectionMethod,
    candidates: &[(EdgeId, f64)],
    rng: &mut R,
) -> Option<EdgeId> {
    if candidates.is_empty() {
        return None;
    }

    match method {
        SelectionMethod::FirstFilter => candidates.first().map(|(edge, _)| *edge),
        SelectionMethod::Random => uniform(candidates, rng),
        SelectionMethod::RandomWeighted => weighted(candidates, rng),
    }
}

fn uniform<R: Rng>(candidates: &[(EdgeId, f64)], rng: &mut R) -> Option<EdgeId> {
    let index = rng.gen_range(0..candidates.len());
    Some(candidates[index].0)
}

fn weighted<R: Rng>(candidates: &[(EdgeId, f64)], rng: &mut R) -> Option<EdgeId> {
    let pool: Vec<(EdgeId, f64)> = candidates
        .iter()
        .copied()
        .filter(|(_, weight)| *weight > 0.0)
        .collect();

    let largest = pool.iter().map(|(_, weight)| *weight).fold(0.0, f64::max);
    if largest.is_infinite() {
        let unbounded: Vec<(EdgeId, f64)> = pool
            .into_iter()
            .filter(|(_, weight)| weight.is_infinite())
            .collect();
        return uniform(&unbounded, rng);
    }

    // Scaled to at most 1.0 each so the total cannot overflow.
    let scaled = pool.iter().map(|(_, weight)| *weight / largest);
    match WeightedIndex::new(scaled) {
        Ok(distribution) => Some(pool[distribution.sample(rng)].0),
        // Nothing with positive weight: every eligible edge is equally likely.
        Err(_) => uniform(candidates, rng),
    }
}
