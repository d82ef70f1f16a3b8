//! Aggregations behind the dashboard charts.

use std::collections::HashMap;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::status::{AppointmentStatus, Lifecycle};

/// Number of events on a given day.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: i64,
}

/// Expand sparse `(date, count)` rows into one entry per day starting at `start`.
/// Rows outside the window are ignored; duplicate dates are summed.
pub fn daily_series(start: NaiveDate, days: u32, rows: &[(NaiveDate, i64)]) -> Vec<DailyCount> {
    let mut by_day: HashMap<NaiveDate, i64> = HashMap::new();
    for (date, count) in rows {
        *by_day.entry(*date).or_default() += count;
    }
    (0..days)
        .filter_map(|offset| start.checked_add_days(Days::new(u64::from(offset))))
        .map(|date| DailyCount {
            date,
            count: by_day.get(&date).copied().unwrap_or(0),
        })
        .collect()
}

/// Appointment totals per status.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub total: i64,
    pub scheduled: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub cancelled: i64,
    /// Completed share of appointments that were not cancelled, 0.0 to 1.0.
    pub completion_rate: f64,
}

impl StatusBreakdown {
    /// Build from `(status, count)` rows. Unknown statuses count towards the total only.
    pub fn from_counts(rows: &[(String, i64)]) -> Self {
        let mut out = Self::default();
        for (status, count) in rows {
            out.total += count;
            match AppointmentStatus::parse(status) {
                Ok(AppointmentStatus::Scheduled) => out.scheduled += count,
                Ok(AppointmentStatus::InProgress) => out.in_progress += count,
                Ok(AppointmentStatus::Completed) => out.completed += count,
                Ok(AppointmentStatus::Cancelled) => out.cancelled += count,
                Err(_) => {}
            }
        }
        let effective = out.total - out.cancelled;
        out.completion_rate = if effective > 0 {
            out.completed as f64 / effective as f64
        } else {
            0.0
        };
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2030, 3, day).unwrap()
    }

    #[test]
    fn test_daily_series_fills_gaps() {
        let series = daily_series(d(1), 4, &[(d(2), 3), (d(4), 1), (d(9), 7)]);
        let counts: Vec<i64> = series.iter().map(|c| c.count).collect();
        assert_eq!(counts, vec![0, 3, 0, 1]);
        assert_eq!(series[0].date, d(1));
        assert_eq!(series[3].date, d(4));
    }

    #[test]
    fn test_daily_series_sums_duplicates() {
        let series = daily_series(d(1), 1, &[(d(1), 2), (d(1), 5)]);
        assert_eq!(series, vec![DailyCount { date: d(1), count: 7 }]);
    }

    #[test]
    fn test_status_breakdown() {
        let rows = vec![
            ("scheduled".to_string(), 4),
            ("completed".to_string(), 3),
            ("cancelled".to_string(), 2),
            ("in-progress".to_string(), 1),
        ];
        let b = StatusBreakdown::from_counts(&rows);
        assert_eq!(b.total, 10);
        assert_eq!(b.cancelled, 2);
        assert!((b.completion_rate - 3.0 / 8.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_status_breakdown_empty() {
        let b = StatusBreakdown::from_counts(&[]);
        assert_eq!(b.total, 0);
        assert_eq!(b.completion_rate, 0.0);
    }
}
