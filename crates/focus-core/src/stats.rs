use std::f64::consts::PI;

use chrono::NaiveDate;
use serde::Serialize;

use crate::task::Task;

/// Radius of the dashboard progress ring.
pub const PROGRESS_RING_RADIUS: f64 = 35.0;

/// Completion figures for the tasks that matter today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyStats {
    pub completed: usize,
    pub total: usize,
    pub percentage: u8,
}

impl DailyStats {
    pub fn compute(tasks: &[Task], today: NaiveDate) -> Self {
        let relevant = tasks.iter().filter(|task| is_today_relevant(task, today));

        let (completed, total) = relevant.fold((0usize, 0usize), |(done, all), task| {
            let done = if task.is_completed() {
                done + 1
            } else {
                done
            };
            (done, all + 1)
        });

        Self {
            completed,
            total,
            percentage: rounded_percentage(completed, total),
        }
    }

    /// Stroke-dash offset for a ring of `radius`: the full circumference at
    /// 0% and zero at 100%.
    pub fn ring_offset(&self, radius: f64) -> f64 {
        let circumference = 2.0 * PI * radius;
        circumference - (f64::from(self.percentage) / 100.0) * circumference
    }
}

/// Due today, or still open and either undated or overdue.
pub fn is_today_relevant(task: &Task, today: NaiveDate) -> bool {
    if task.due_date == Some(today) {
        return true;
    }
    !task.is_completed() && task.due_date.is_none_or(|due| due <= today)
}

/// `round(100 * completed / total)` with halves rounding up, 0 for an empty
/// denominator.
fn rounded_percentage(completed: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let scaled = (200 * completed + total) / (2 * total);
    u8::try_from(scaled.min(100)).unwrap_or(100)
}
