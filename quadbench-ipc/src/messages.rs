//! IPC Message Types
//!
//! One request in, one response out, per task. Both sides of the channel are
//! separate address spaces, so the integrand crosses the wire as a selector
//! that each process resolves through its own dispatch table, never as a
//! function pointer.

use rkyv::{Archive, Deserialize as RkyvDeserialize, Serialize as RkyvSerialize};

/// Selector for one of the fixed set of integrands.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, RkyvSerialize, RkyvDeserialize,
)]
#[archive(check_bytes)]
#[archive_attr(derive(Debug))]
pub enum IntegrandId {
    /// f1(x) = cos(x)
    Cosine,
    /// f2(x) = x^2 + 2x + 1
    Quadratic,
    /// f3(x) = 3
    Constant,
    /// f4(x) = 10 - x
    Linear,
}

impl IntegrandId {
    /// All selectors, in report-column order.
    pub const ALL: [IntegrandId; 4] = [
        IntegrandId::Cosine,
        IntegrandId::Quadratic,
        IntegrandId::Constant,
        IntegrandId::Linear,
    ];

    /// Short column label used in the CSV tables.
    pub fn label(self) -> &'static str {
        match self {
            IntegrandId::Cosine => "f1",
            IntegrandId::Quadratic => "f2",
            IntegrandId::Constant => "f3",
            IntegrandId::Linear => "f4",
        }
    }

    /// Human-readable formula, for logs.
    pub fn formula(self) -> &'static str {
        match self {
            IntegrandId::Cosine => "cos(x)",
            IntegrandId::Quadratic => "x^2 + 2x + 1",
            IntegrandId::Constant => "3",
            IntegrandId::Linear => "10 - x",
        }
    }
}

/// Request message: coordinator -> worker, consumed by exactly one worker.
#[derive(Debug, Clone, Copy, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct TaskRequest {
    /// Dense task id in `0..N_TASKS`.
    pub task_id: u32,
    /// Lower integration bound.
    pub domain_min: f64,
    /// Upper integration bound (strictly greater than `domain_min` for any
    /// well-formed request).
    pub domain_max: f64,
    /// Which integrand to evaluate.
    pub integrand: IntegrandId,
}

impl TaskRequest {
    /// A request is well-formed when its integration range is non-empty.
    /// The task catalog guarantees this by construction; workers treat a
    /// malformed request as a no-op poll.
    pub fn is_well_formed(&self) -> bool {
        self.domain_min < self.domain_max
    }
}

/// Response message: worker -> coordinator, one per completed task.
#[derive(Debug, Clone, Copy, PartialEq, Archive, RkyvSerialize, RkyvDeserialize)]
#[archive(check_bytes)]
pub struct TaskResponse {
    /// Id of the task this result belongs to.
    pub task_id: u32,
    /// Monte Carlo estimate of the definite integral.
    pub result: f64,
    /// Wall-clock time spent inside the estimator, in nanoseconds.
    pub compute_time_ns: u64,
}

impl TaskResponse {
    /// Compute time as fractional seconds, for aggregation and reporting.
    pub fn compute_time_secs(&self) -> f64 {
        self.compute_time_ns as f64 / 1e9
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_follow_column_order() {
        let labels: Vec<&str> = IntegrandId::ALL.iter().map(|id| id.label()).collect();
        assert_eq!(labels, ["f1", "f2", "f3", "f4"]);
    }

    #[test]
    fn well_formedness_requires_nonempty_range() {
        let mut req = TaskRequest {
            task_id: 0,
            domain_min: 0.0,
            domain_max: 1.0,
            integrand: IntegrandId::Cosine,
        };
        assert!(req.is_well_formed());

        req.domain_max = 0.0;
        assert!(!req.is_well_formed());

        req.domain_max = -1.0;
        assert!(!req.is_well_formed());
    }

    #[test]
    fn compute_time_converts_to_seconds() {
        let resp = TaskResponse {
            task_id: 7,
            result: 3.0,
            compute_time_ns: 1_500_000_000,
        };
        assert!((resp.compute_time_secs() - 1.5).abs() < 1e-12);
    }
}
