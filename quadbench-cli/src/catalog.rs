//! Task Catalog
//!
//! The fixed job batch: the cross product of five integration ranges and the
//! four integrands, built once and reused for every round. Result slots are
//! indexed by the dense task id and written at most once per round.

use quadbench_ipc::{IntegrandId, TaskRequest};

/// The fixed integration ranges, in report-row order.
pub const RANGES: [(f64, f64); 5] = [
    (0.0, 1.0),
    (0.0, 2.0),
    (0.0, 3.0),
    (1.0, 10.0),
    (0.0, std::f64::consts::PI),
];

/// Number of tasks per round.
pub const N_TASKS: usize = RANGES.len() * IntegrandId::ALL.len();

/// One (integrand, range) pairing plus its result slot.
///
/// The request fields are immutable once built; only the coordinator writes
/// `result`, at most once per round.
#[derive(Debug, Clone)]
pub struct Task {
    /// Dense id in `0..N_TASKS`.
    pub id: u32,
    /// Lower integration bound.
    pub domain_min: f64,
    /// Upper integration bound.
    pub domain_max: f64,
    /// Integrand selector.
    pub integrand: IntegrandId,
    /// Estimate recorded from this round's response, if collected.
    pub result: Option<f64>,
}

/// The full task batch for one benchmark round.
#[derive(Debug, Clone)]
pub struct Catalog {
    tasks: Vec<Task>,
}

impl Catalog {
    /// Build the fixed range x integrand matrix. Ids are dense and laid out
    /// range-major, so row `r` of the report is tasks `r*4 .. r*4+4`.
    pub fn build() -> Self {
        let mut tasks = Vec::with_capacity(N_TASKS);
        for (range_idx, &(domain_min, domain_max)) in RANGES.iter().enumerate() {
            for (fn_idx, &integrand) in IntegrandId::ALL.iter().enumerate() {
                tasks.push(Task {
                    id: (range_idx * IntegrandId::ALL.len() + fn_idx) as u32,
                    domain_min,
                    domain_max,
                    integrand,
                    result: None,
                });
            }
        }
        Self { tasks }
    }

    /// Number of tasks in the batch.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether the batch is empty (it never is for the fixed matrix).
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// All tasks, in id order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// The request message for the task at `index`.
    pub fn request(&self, index: usize) -> TaskRequest {
        let task = &self.tasks[index];
        TaskRequest {
            task_id: task.id,
            domain_min: task.domain_min,
            domain_max: task.domain_max,
            integrand: task.integrand,
        }
    }

    /// Record a collected result. Returns `false` (without writing) when the
    /// id is unknown or the slot was already written this round; the channel
    /// delivers each request to exactly one worker, so either case means a
    /// protocol violation the caller should log rather than count.
    pub fn record(&mut self, task_id: u32, result: f64) -> bool {
        match self.tasks.get_mut(task_id as usize) {
            Some(task) if task.result.is_none() => {
                task.result = Some(result);
                true
            }
            _ => false,
        }
    }

    /// Clear all result slots at the start of a round. Later rounds overwrite
    /// earlier ones; only the per-round timing records are retained.
    pub fn clear_results(&mut self) {
        for task in &mut self.tasks {
            task.result = None;
        }
    }

    /// Whether every task has a recorded result.
    pub fn is_complete(&self) -> bool {
        self.tasks.iter().all(|task| task.result.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_the_full_matrix() {
        let catalog = Catalog::build();
        assert_eq!(catalog.len(), 20);

        // Ids are dense and match their index.
        for (index, task) in catalog.tasks().iter().enumerate() {
            assert_eq!(task.id as usize, index);
            assert!(task.domain_min < task.domain_max);
            assert!(task.result.is_none());
        }
    }

    #[test]
    fn layout_is_range_major() {
        let catalog = Catalog::build();
        // Row 3 (range [1, 10]) holds tasks 12..16, one per integrand.
        for (fn_idx, &integrand) in IntegrandId::ALL.iter().enumerate() {
            let task = &catalog.tasks()[12 + fn_idx];
            assert_eq!(task.domain_min, 1.0);
            assert_eq!(task.domain_max, 10.0);
            assert_eq!(task.integrand, integrand);
        }
    }

    #[test]
    fn record_writes_each_slot_at_most_once() {
        let mut catalog = Catalog::build();
        assert!(catalog.record(5, 1.25));
        assert!(!catalog.record(5, 9.99), "second write must be rejected");
        assert_eq!(catalog.tasks()[5].result, Some(1.25));
    }

    #[test]
    fn record_rejects_unknown_ids() {
        let mut catalog = Catalog::build();
        assert!(!catalog.record(N_TASKS as u32, 0.0));
    }

    #[test]
    fn clear_results_resets_completion() {
        let mut catalog = Catalog::build();
        for id in 0..catalog.len() as u32 {
            assert!(catalog.record(id, 0.0));
        }
        assert!(catalog.is_complete());

        catalog.clear_results();
        assert!(!catalog.is_complete());
        // Slots are writable again in the next round.
        assert!(catalog.record(0, 1.0));
    }

    #[test]
    fn requests_are_well_formed() {
        let catalog = Catalog::build();
        for index in 0..catalog.len() {
            assert!(catalog.request(index).is_well_formed());
        }
    }
}
