// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use strata_core::{DataPoint, StrataError, TimeSeries, elapsed_seconds};

/// Width of one bucket in seconds for a span split into `bucket_count` slices.
pub fn bucket_interval_seconds(start_ns: i64, end_ns: i64, bucket_count: usize) -> f64 {
    elapsed_seconds(start_ns, end_ns) / bucket_count as f64
}

/// One time slice and the readings that fall inside it.
///
/// Bounds are offsets in seconds from the first reading. The last bucket has
/// no upper bound: it absorbs everything after the last closed boundary.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bucket<'a> {
    pub index: usize,
    pub lower_s: f64,
    pub upper_s: Option<f64>,
    pub points: &'a [DataPoint],
}

impl Bucket<'_> {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn is_last(&self) -> bool {
        self.upper_s.is_none()
    }

    /// Whether an offset (seconds from series start) lies in `[lower_s, upper_s)`.
    pub fn contains_offset(&self, offset_s: f64) -> bool {
        offset_s >= self.lower_s && self.upper_s.is_none_or(|upper| offset_s < upper)
    }
}

/// Single-pass iterator over all buckets of a sorted series, empty ones included.
///
/// Readings are assigned to the first bucket whose upper boundary lies strictly
/// after them; bucket indices advance independently of reading arrival, so
/// long runs of empty buckets still make progress.
#[derive(Clone, Debug)]
pub struct Stratifier<'a> {
    points: &'a [DataPoint],
    start_ns: i64,
    interval_s: f64,
    bucket_count: usize,
    next_bucket: usize,
    cursor: usize,
}

impl Stratifier<'_> {
    pub fn interval_s(&self) -> f64 {
        self.interval_s
    }

    pub fn bucket_count(&self) -> usize {
        self.bucket_count
    }
}

impl<'a> Iterator for Stratifier<'a> {
    type Item = Bucket<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_bucket >= self.bucket_count {
            return None;
        }

        let index = self.next_bucket;
        self.next_bucket += 1;

        let lower_s = index as f64 * self.interval_s;
        let begin = self.cursor;

        let upper_s = if index + 1 == self.bucket_count {
            self.cursor = self.points.len();
            None
        } else {
            let upper = (index + 1) as f64 * self.interval_s;
            let remaining = &self.points[begin..];
            let taken = remaining
                .partition_point(|point| elapsed_seconds(self.start_ns, point.t_ns) < upper);
            self.cursor = begin + taken;
            Some(upper)
        };

        Some(Bucket {
            index,
            lower_s,
            upper_s,
            points: &self.points[begin..self.cursor],
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.bucket_count - self.next_bucket;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Stratifier<'_> {}

/// Splits `[start, end]` of `series` into `bucket_count` equal-width buckets.
pub fn stratify(series: &TimeSeries, bucket_count: usize) -> Result<Stratifier<'_>, StrataError> {
    if bucket_count == 0 {
        return Err(StrataError::invalid_parameter(
            "bucket count must be >= 1; got 0",
        ));
    }
    let (Some(start_ns), Some(end_ns)) = (series.start_ns(), series.end_ns()) else {
        return Err(StrataError::empty_input("cannot stratify an empty series"));
    };

    Ok(Stratifier {
        points: series.points(),
        start_ns,
        interval_s: bucket_interval_seconds(start_ns, end_ns, bucket_count),
        bucket_count,
        next_bucket: 0,
        cursor: 0,
    })
}
