//! Monte Carlo Estimator
//!
//! One-shot estimate of a definite integral by uniform sampling:
//! `(hi - lo) * mean(f(U(lo, hi)))`. Non-deterministic but statistically
//! convergent to the true value as the sample count grows.

use quadbench_ipc::IntegrandId;
use rand::Rng;

use crate::integrand::eval;

/// Sample count of the reference configuration.
pub const DEFAULT_SAMPLES: u64 = 5_000_000;

/// Estimate the definite integral of the selected integrand over
/// `[lo, hi]` using `samples` uniform draws from the thread RNG.
///
/// Requires `lo < hi`; callers validate the range before computing.
pub fn estimate(id: IntegrandId, lo: f64, hi: f64, samples: u64) -> f64 {
    let mut rng = rand::rng();
    estimate_with(&mut rng, id, lo, hi, samples)
}

/// Estimate with a caller-supplied RNG, so tests can seed for determinism.
pub fn estimate_with<R: Rng + ?Sized>(
    rng: &mut R,
    id: IntegrandId,
    lo: f64,
    hi: f64,
    samples: u64,
) -> f64 {
    debug_assert!(lo < hi);
    debug_assert!(samples > 0);

    let mut acc = 0.0;
    for _ in 0..samples {
        let x = rng.random_range(lo..hi);
        acc += eval(id, x);
    }

    (hi - lo) * acc / samples as f64
}
