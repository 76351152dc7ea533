//! Seeded response simulation
//!
//! Draws abilities and dichotomous responses from the item models. The same
//! seed always reproduces the same data.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::irt::probability;
use crate::types::{ItemParameter, ResponseMatrix, EPSILON};

/// Standard normal draw via Box-Muller
fn sample_normal(rng: &mut ChaCha8Rng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(EPSILON);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// `n` abilities from N(mean, sd²)
pub fn sample_abilities(n: usize, mean: f64, sd: f64, seed: u64) -> Vec<f64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..n).map(|_| mean + sd * sample_normal(&mut rng)).collect()
}

/// Fully observed response matrix for the given abilities and items
pub fn simulate_responses(thetas: &[f64], items: &[ItemParameter], seed: u64) -> ResponseMatrix {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let rows: Vec<Vec<Option<bool>>> = thetas
        .iter()
        .map(|&theta| {
            items
                .iter()
                .map(|item| Some(rng.gen::<f64>() < probability(theta, item)))
                .collect()
        })
        .collect();
    ResponseMatrix::from_rows_unchecked(items.len(), rows)
}
