//! CSV Report Tables
//!
//! Per round: a header line, then one line per range with one estimate per
//! integrand. After all rounds: a `workers,total_time` table. Floats use
//! fixed six-decimal formatting.

use quadbench_ipc::IntegrandId;

use crate::catalog::Catalog;
use crate::coordinator::RoundRecord;

/// Announcement line printed before each round's table.
pub fn format_round_header(worker_count: usize) -> String {
    format!("workers: {worker_count}\n")
}

/// The round's result table: integrand labels, then one CSV line per range.
/// A missing slot (unreachable once a round completed) renders as `NaN`.
pub fn format_round_table(catalog: &Catalog) -> String {
    let mut output = String::new();

    let labels: Vec<&str> = IntegrandId::ALL.iter().map(|id| id.label()).collect();
    output.push_str(&labels.join(","));
    output.push('\n');

    for row in catalog.tasks().chunks(IntegrandId::ALL.len()) {
        let cells: Vec<String> = row
            .iter()
            .map(|task| format!("{:.6}", task.result.unwrap_or(f64::NAN)))
            .collect();
        output.push_str(&cells.join(","));
        output.push('\n');
    }

    output
}

/// The final aggregate table: total compute time per tested pool size.
pub fn format_timing_table(records: &[RoundRecord]) -> String {
    let mut output = String::from("workers,total_time\n");
    for record in records {
        output.push_str(&format!(
            "{},{:.6}\n",
            record.worker_count, record.total_compute_time
        ));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::N_TASKS;

    #[test]
    fn round_header_names_the_pool_size() {
        assert_eq!(format_round_header(3), "workers: 3\n");
    }

    #[test]
    fn round_table_has_header_and_one_line_per_range() {
        let mut catalog = Catalog::build();
        for id in 0..N_TASKS as u32 {
            catalog.record(id, id as f64);
        }

        let table = format_round_table(&catalog);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "f1,f2,f3,f4");
        assert_eq!(lines[1], "0.000000,1.000000,2.000000,3.000000");
        assert_eq!(lines[5], "16.000000,17.000000,18.000000,19.000000");
        assert!(table.ends_with('\n'));
    }

    #[test]
    fn unset_slots_render_as_nan() {
        let catalog = Catalog::build();
        let table = format_round_table(&catalog);
        assert!(table.lines().nth(1).unwrap().starts_with("NaN"));
    }

    #[test]
    fn timing_table_lists_one_row_per_round() {
        let records = vec![
            RoundRecord {
                worker_count: 1,
                total_compute_time: 1.5,
            },
            RoundRecord {
                worker_count: 2,
                total_compute_time: 1.25,
            },
        ];

        let table = format_timing_table(&records);
        assert_eq!(table, "workers,total_time\n1,1.500000\n2,1.250000\n");
    }
}
