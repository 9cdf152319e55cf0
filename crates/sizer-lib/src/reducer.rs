//! Measurement reduction
//!
//! Turns raw measurement time series into `{max, avg, count}` summaries,
//! optionally restricted to a time-of-day window and optionally summing
//! several named series at each timestamp first (e.g. per-mode CPU
//! percentages, which only describe total utilization once added up).

use crate::error::ConfigError;
use crate::models::Measurement;
use chrono::{DateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Summary statistics of a reduced series
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatSummary {
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub count: usize,
}

impl StatSummary {
    fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = values.iter().sum::<f64>() / values.len() as f64;
        Self {
            max: Some(round2(max)),
            avg: Some(round2(avg)),
            count: values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Apply a unit conversion to both statistics, re-rounding the result
    pub fn scaled(&self, divisor: f64) -> Self {
        Self {
            max: self.max.map(|v| round2(v / divisor)),
            avg: self.avg.map(|v| round2(v / divisor)),
            count: self.count,
        }
    }
}

/// Round to two decimal places
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Inclusive time-of-day window, compared at minute resolution in UTC
///
/// When `start > end` the window wraps midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    /// Parse a window from two `HH:MM` strings
    pub fn parse(start: &str, end: &str) -> Result<Self, ConfigError> {
        Ok(Self::new(parse_time_of_day(start)?, parse_time_of_day(end)?))
    }

    /// Whether a time of day falls inside the window
    pub fn contains(&self, time: NaiveTime) -> bool {
        let t = minute_of_day(time);
        let start = minute_of_day(self.start);
        let end = minute_of_day(self.end);
        if start <= end {
            t >= start && t <= end
        } else {
            t >= start || t <= end
        }
    }

    /// Whether a sample taken at `timestamp` qualifies.
    ///
    /// Unparseable timestamps qualify: one malformed sample must not
    /// silently discard the rest of a series.
    pub fn admits(&self, timestamp: &str) -> bool {
        match DateTime::parse_from_rfc3339(timestamp) {
            Ok(dt) => self.contains(dt.with_timezone(&Utc).time()),
            Err(_) => true,
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

fn parse_time_of_day(value: &str) -> Result<NaiveTime, ConfigError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| ConfigError::InvalidTime(value.to_string()))
}

fn minute_of_day(time: NaiveTime) -> u32 {
    time.hour() * 60 + time.minute()
}

fn admitted(window: Option<&TimeWindow>, timestamp: Option<&str>) -> bool {
    match (window, timestamp) {
        (None, _) => true,
        (Some(window), Some(ts)) => window.admits(ts),
        // No timestamp to judge; same fail-open policy as a bad parse
        (Some(_), None) => true,
    }
}

/// Reduce one measurement's present values
pub fn reduce_single(measurement: &Measurement, window: Option<&TimeWindow>) -> StatSummary {
    let values: Vec<f64> = measurement
        .data_points
        .iter()
        .filter(|p| admitted(window, p.timestamp.as_deref()))
        .filter_map(|p| p.value)
        .collect();

    StatSummary::from_values(&values)
}

/// Sum several measurements per timestamp, then reduce the sums.
///
/// Every distinct timestamp that passes the window and carries at least
/// one present value contributes one sum; series without a value at that
/// timestamp contribute zero. Points without a timestamp cannot be aligned
/// and are ignored.
pub fn reduce_summed<'a, I>(measurements: I, window: Option<&TimeWindow>) -> StatSummary
where
    I: IntoIterator<Item = &'a Measurement>,
{
    let mut sums: BTreeMap<&str, f64> = BTreeMap::new();

    for measurement in measurements {
        for point in &measurement.data_points {
            let Some(value) = point.value else {
                continue;
            };
            let Some(ts) = point.timestamp.as_deref().filter(|ts| !ts.is_empty()) else {
                continue;
            };
            if !admitted(window, Some(ts)) {
                continue;
            }
            *sums.entry(ts).or_insert(0.0) += value;
        }
    }

    let values: Vec<f64> = sums.into_values().collect();
    StatSummary::from_values(&values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DataPoint;

    fn series(name: &str, points: &[(&str, Option<f64>)]) -> Measurement {
        Measurement {
            name: name.to_string(),
            units: None,
            data_points: points
                .iter()
                .map(|(ts, v)| DataPoint::new(*ts, *v))
                .collect(),
        }
    }

    fn sample() -> Measurement {
        series(
            "CONNECTIONS",
            &[
                ("2023-10-01T10:00:00Z", Some(50.0)),
                ("2023-10-01T14:00:00Z", Some(30.0)),
                ("2023-10-01T16:00:00Z", Some(40.0)),
                ("2023-10-01T18:00:00Z", Some(60.0)),
                ("2023-10-01T02:00:00Z", Some(20.0)),
            ],
        )
    }

    fn at(ts: &str) -> NaiveTime {
        DateTime::parse_from_rfc3339(ts).unwrap().time()
    }

    #[test]
    fn test_reduce_single_without_window() {
        let stats = reduce_single(&sample(), None);
        assert_eq!(stats.max, Some(60.0));
        assert_eq!(stats.avg, Some(40.0));
        assert_eq!(stats.count, 5);
    }

    #[test]
    fn test_reduce_single_with_window() {
        let window = TimeWindow::parse("14:00", "23:59").unwrap();
        let stats = reduce_single(&sample(), Some(&window));
        assert_eq!(stats.max, Some(60.0));
        assert_eq!(stats.avg, Some(43.33));
        assert_eq!(stats.count, 3);
    }

    #[test]
    fn test_no_qualifying_points() {
        let empty = series("CONNECTIONS", &[("2023-10-01T10:00:00Z", None)]);
        assert_eq!(reduce_single(&empty, None), StatSummary::default());
        assert_eq!(reduce_summed([&empty], None), StatSummary::default());

        let window = TimeWindow::parse("20:00", "21:00").unwrap();
        let stats = reduce_single(&sample(), Some(&window));
        assert!(stats.is_empty());
        assert!(stats.max.is_none() && stats.avg.is_none());
    }

    #[test]
    fn test_absent_values_skipped() {
        let m = series(
            "CONNECTIONS",
            &[
                ("2023-10-01T10:00:00Z", Some(10.0)),
                ("2023-10-01T11:00:00Z", None),
                ("2023-10-01T12:00:00Z", Some(20.0)),
            ],
        );
        let stats = reduce_single(&m, None);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.avg, Some(15.0));
    }

    #[test]
    fn test_window_wrapping_midnight() {
        let window = TimeWindow::parse("22:00", "06:00").unwrap();
        assert!(window.start > window.end);

        assert!(!window.contains(at("2023-10-01T21:59:00Z")));
        assert!(window.contains(at("2023-10-01T22:00:00Z")));
        assert!(window.contains(at("2023-10-01T02:30:00Z")));
        assert!(window.contains(at("2023-10-01T06:00:00Z")));
        assert!(!window.contains(at("2023-10-01T06:01:00Z")));
        assert!(!window.contains(at("2023-10-01T12:00:00Z")));
    }

    #[test]
    fn test_same_day_window_bounds_inclusive() {
        let window = TimeWindow::parse("14:00", "23:59").unwrap();
        assert!(!window.admits("2023-10-01T13:59:00Z"));
        assert!(window.admits("2023-10-01T14:00:00Z"));
        assert!(window.admits("2023-10-01T23:59:30Z"));
        assert!(!window.admits("2023-10-01T00:00:00Z"));
    }

    #[test]
    fn test_window_uses_utc_time_of_day() {
        let window = TimeWindow::parse("14:00", "15:00").unwrap();
        // 16:30 at +02:00 is 14:30 UTC
        assert!(window.admits("2023-10-01T16:30:00+02:00"));
    }

    #[test]
    fn test_unparseable_timestamp_fails_open() {
        let window = TimeWindow::parse("14:00", "15:00").unwrap();
        assert!(window.admits("not-a-timestamp"));

        let m = series(
            "CONNECTIONS",
            &[
                ("2023-10-01T10:00:00Z", Some(50.0)),
                ("garbage", Some(7.0)),
            ],
        );
        let stats = reduce_single(&m, Some(&window));
        assert_eq!(stats.count, 1);
        assert_eq!(stats.max, Some(7.0));
    }

    #[test]
    fn test_invalid_window_rejected() {
        assert!(TimeWindow::parse("25:00", "06:00").is_err());
        assert!(TimeWindow::parse("14:00", "noon").is_err());
    }

    #[test]
    fn test_reduce_summed_aligns_timestamps() {
        let user = series(
            "SYSTEM_NORMALIZED_CPU_USER",
            &[
                ("2023-10-01T10:00:00Z", Some(10.0)),
                ("2023-10-01T10:01:00Z", Some(20.0)),
            ],
        );
        let kernel = series(
            "SYSTEM_NORMALIZED_CPU_KERNEL",
            &[
                ("2023-10-01T10:00:00Z", Some(5.0)),
                ("2023-10-01T10:02:00Z", Some(3.0)),
            ],
        );

        let stats = reduce_summed([&user, &kernel], None);
        // sums: 15, 20, 3
        assert_eq!(stats.count, 3);
        assert_eq!(stats.max, Some(20.0));
        assert_eq!(stats.avg, Some(12.67));
    }

    #[test]
    fn test_reduce_summed_skips_timestamps_without_values() {
        let user = series(
            "CPU_USER",
            &[
                ("2023-10-01T10:00:00Z", Some(30.0)),
                ("2023-10-01T10:01:00Z", Some(50.0)),
                ("2023-10-01T10:02:00Z", None),
            ],
        );
        let kernel = series(
            "CPU_KERNEL",
            &[
                ("2023-10-01T10:00:00Z", Some(10.0)),
                ("2023-10-01T10:01:00Z", None),
                ("2023-10-01T10:02:00Z", None),
            ],
        );

        let stats = reduce_summed([&user, &kernel], None);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.max, Some(50.0));
        assert_eq!(stats.avg, Some(45.0));
    }

    #[test]
    fn test_reduce_summed_with_window() {
        let a = series(
            "OPCOUNTER_CMD",
            &[
                ("2023-10-01T03:00:00Z", Some(100.0)),
                ("2023-10-01T15:00:00Z", Some(1.0)),
            ],
        );
        let b = series(
            "OPCOUNTER_QUERY",
            &[
                ("2023-10-01T03:00:00Z", Some(100.0)),
                ("2023-10-01T15:00:00Z", Some(2.0)),
            ],
        );

        let window = TimeWindow::parse("14:00", "23:59").unwrap();
        let stats = reduce_summed([&a, &b], Some(&window));
        assert_eq!(stats.count, 1);
        assert_eq!(stats.max, Some(3.0));
    }

    #[test]
    fn test_scaled_rounds() {
        let stats = StatSummary {
            max: Some(3_145_728.0),
            avg: Some(1_048_576.0),
            count: 2,
        };
        let gb = stats.scaled(1024.0 * 1024.0);
        assert_eq!(gb.max, Some(3.0));
        assert_eq!(gb.avg, Some(1.0));
    }

    #[test]
    fn test_window_display() {
        let window = TimeWindow::parse("22:00", "06:00").unwrap();
        assert_eq!(window.to_string(), "22:00-06:00");
    }
}
