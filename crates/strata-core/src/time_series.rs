// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::StrataError;

/// Nanoseconds per second, the unit conversion for Unix-nanosecond timestamps.
pub const NANOS_PER_SECOND: f64 = 1_000_000_000.0;

/// Seconds elapsed between two Unix-nanosecond instants (negative if `to < from`).
pub fn elapsed_seconds(from_ns: i64, to_ns: i64) -> f64 {
    (i128::from(to_ns) - i128::from(from_ns)) as f64 / NANOS_PER_SECOND
}

/// One reading: a Unix-nanosecond timestamp and its scalar value.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DataPoint {
    pub t_ns: i64,
    pub value: f64,
}

impl DataPoint {
    pub const fn new(t_ns: i64, value: f64) -> Self {
        Self { t_ns, value }
    }

    /// Identity used for de-duplication: same instant and same value.
    pub fn same_reading(&self, other: &Self) -> bool {
        self.t_ns == other.t_ns && self.value == other.value
    }
}

/// Ordered sequence of readings with non-decreasing timestamps.
///
/// Equal timestamps are allowed and keep their insertion order.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TimeSeries {
    points: Vec<DataPoint>,
}

impl TimeSeries {
    /// Constructs a validated series; fails if timestamps ever decrease.
    pub fn new(points: Vec<DataPoint>) -> Result<Self, StrataError> {
        if let Some(idx) = points.windows(2).position(|pair| pair[1].t_ns < pair[0].t_ns) {
            return Err(StrataError::invalid_input(format!(
                "timestamps must be non-decreasing: index {} has t_ns={} after t_ns={}",
                idx + 1,
                points[idx + 1].t_ns,
                points[idx].t_ns
            )));
        }
        Ok(Self { points })
    }

    /// Stable-sorts by timestamp, then constructs the series.
    pub fn from_unsorted(mut points: Vec<DataPoint>) -> Self {
        points.sort_by_key(|point| point.t_ns);
        Self { points }
    }

    /// Zips parallel timestamp and value columns.
    pub fn from_columns(timestamps: &[i64], values: &[f64]) -> Result<Self, StrataError> {
        if timestamps.len() != values.len() {
            return Err(StrataError::invalid_input(format!(
                "column length mismatch: {} timestamps, {} values",
                timestamps.len(),
                values.len()
            )));
        }
        Self::new(
            timestamps
                .iter()
                .zip(values)
                .map(|(&t_ns, &value)| DataPoint::new(t_ns, value))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<DataPoint> {
        self.points
    }

    pub fn start_ns(&self) -> Option<i64> {
        self.points.first().map(|point| point.t_ns)
    }

    pub fn end_ns(&self) -> Option<i64> {
        self.points.last().map(|point| point.t_ns)
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.value).collect()
    }

    pub fn timestamps(&self) -> Vec<i64> {
        self.points.iter().map(|point| point.t_ns).collect()
    }

    /// Keeps readings inside the closed range `[start_ns, end_ns]`.
    pub fn restrict_to(&self, start_ns: i64, end_ns: i64) -> Self {
        let lo = self.points.partition_point(|point| point.t_ns < start_ns);
        let hi = self.points.partition_point(|point| point.t_ns <= end_ns);
        Self {
            points: self.points[lo..hi.max(lo)].to_vec(),
        }
    }

    /// Drops NaN and infinite readings; returns the rest and how many were dropped.
    pub fn split_finite(&self) -> (Self, usize) {
        let points: Vec<DataPoint> = self
            .points
            .iter()
            .copied()
            .filter(|point| point.value.is_finite())
            .collect();
        let dropped = self.points.len() - points.len();
        (Self { points }, dropped)
    }
}

/// Counters describing one sampler invocation.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SamplingStats {
    pub input_len: usize,
    pub bucket_count: usize,
    pub empty_buckets: usize,
    pub non_finite_buckets: usize,
    pub short_circuited: bool,
}

/// Sampler output: representative readings in timestamp order.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct ReducedSeries {
    points: Vec<DataPoint>,
    pub stats: SamplingStats,
}

impl ReducedSeries {
    /// Wraps points already in non-decreasing timestamp order.
    pub fn new(points: Vec<DataPoint>, stats: SamplingStats) -> Result<Self, StrataError> {
        let series = TimeSeries::new(points)?;
        Ok(Self {
            points: series.into_points(),
            stats,
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[DataPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|point| point.value).collect()
    }

    pub fn timestamps(&self) -> Vec<i64> {
        self.points.iter().map(|point| point.t_ns).collect()
    }
}
