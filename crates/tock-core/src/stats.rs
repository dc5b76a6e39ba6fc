use chrono::NaiveDate;

use crate::datetime::DisplayZone;
use crate::task::Task;
use crate::timefmt::whole_minutes;

#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    /// Creation date of the completed task.
    pub date: NaiveDate,
    pub text: String,
    pub minutes: f64,
}

/// Aggregates over completed tasks, in collection order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub completed: usize,
    pub total: usize,
    pub total_ms: u64,
    pub series: Vec<SeriesPoint>,
}

impl Statistics {
    pub fn collect(tasks: &[Task], zone: DisplayZone) -> Self {
        let done: Vec<&Task> = tasks.iter().filter(|task| task.completed).collect();
        let total_ms = done
            .iter()
            .fold(0u64, |acc, task| acc.saturating_add(task.time_spent));
        let series = done
            .iter()
            .map(|task| SeriesPoint {
                date: zone.date_of(task.created_at),
                text: task.text.clone(),
                minutes: task.time_spent as f64 / 60_000.0,
            })
            .collect();

        Self {
            completed: done.len(),
            total: tasks.len(),
            total_ms,
            series,
        }
    }

    pub fn total_minutes(&self) -> u64 {
        whole_minutes(self.total_ms)
    }
}
