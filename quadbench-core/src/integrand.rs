//! Integrand Dispatch
//!
//! The selector crosses the channel; the function it names is resolved here,
//! process-locally. Function pointers never travel between address spaces.

use quadbench_ipc::IntegrandId;

/// Evaluate the integrand named by `id` at `x`.
pub fn eval(id: IntegrandId, x: f64) -> f64 {
    match id {
        IntegrandId::Cosine => x.cos(),
        IntegrandId::Quadratic => x * x + 2.0 * x + 1.0,
        IntegrandId::Constant => 3.0,
        IntegrandId::Linear => 10.0 - x,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_matches_formulas() {
        assert!((eval(IntegrandId::Cosine, 0.0) - 1.0).abs() < 1e-12);
        // x^2 + 2x + 1 = (x + 1)^2
        assert!((eval(IntegrandId::Quadratic, 2.0) - 9.0).abs() < 1e-12);
        assert!((eval(IntegrandId::Constant, 123.456) - 3.0).abs() < 1e-12);
        assert!((eval(IntegrandId::Linear, 4.0) - 6.0).abs() < 1e-12);
    }

    #[test]
    fn every_selector_is_dispatchable() {
        for id in IntegrandId::ALL {
            assert!(eval(id, 0.5).is_finite());
        }
    }
}
