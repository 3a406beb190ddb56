// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Render wire payload: what a charting front end needs to draw the reduced
//! series, change-point markers, and low-level bands.

use chrono::DateTime;
use serde::Serialize;
use strata_core::{BreakpointSet, ReducedSeries, StrataError};

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const LABEL_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// ISO-8601 rendering of a Unix-nanosecond instant in UTC, without offset.
/// Fractional seconds are printed only when non-zero.
pub fn format_iso(t_ns: i64) -> String {
    DateTime::from_timestamp_nanos(t_ns)
        .naive_utc()
        .format(ISO_FORMAT)
        .to_string()
}

/// Human-readable breakpoint label, second precision.
pub fn format_label(t_ns: i64) -> String {
    DateTime::from_timestamp_nanos(t_ns)
        .naive_utc()
        .format(LABEL_FORMAT)
        .to_string()
}

/// Per-segment statistics over the reduced values.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SegmentSummary {
    pub start: usize,
    pub end: usize,
    pub mean: f64,
    pub median: f64,
    pub is_low: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SeriesSummary {
    pub original_points: usize,
    pub reduced_points: usize,
    pub reduction_ratio: f64,
    pub change_points: usize,
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartPayload {
    pub signal_name: String,
    pub timestamps: Vec<String>,
    pub values: Vec<f64>,
    pub breakpoints: Vec<usize>,
    /// One label per breakpoint that indexes a reading; the terminal sentinel
    /// has none.
    pub breakpoint_labels: Vec<String>,
    pub breakpoint_times: Vec<String>,
    pub segments: Vec<SegmentSummary>,
    pub summary: SeriesSummary,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_std(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let var = values
        .iter()
        .map(|value| {
            let diff = value - mean;
            diff * diff
        })
        .sum::<f64>()
        / values.len() as f64;
    var.sqrt()
}

/// Upper-middle median, matching the segment cost's center.
fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut scratch = values.to_vec();
    let mid = scratch.len() / 2;
    let (_, median, _) = scratch.select_nth_unstable_by(mid, f64::total_cmp);
    *median
}

/// Assembles the chart payload for one pipeline run.
pub fn build_chart_payload(
    signal_name: &str,
    original_points: usize,
    reduced: &ReducedSeries,
    breakpoints: &BreakpointSet,
    low_threshold: f64,
) -> Result<ChartPayload, StrataError> {
    let values = reduced.values();
    if breakpoints.n() != values.len() {
        return Err(StrataError::invalid_input(format!(
            "breakpoints cover n={} but the reduced series has {} points",
            breakpoints.n(),
            values.len()
        )));
    }

    let timestamps_ns = reduced.timestamps();
    let marked: Vec<i64> = breakpoints
        .as_slice()
        .iter()
        .filter_map(|&idx| timestamps_ns.get(idx).copied())
        .collect();

    let segments = breakpoints
        .segments()
        .into_iter()
        .map(|segment| {
            let slice = &values[segment.start..segment.end];
            let segment_mean = mean(slice);
            SegmentSummary {
                start: segment.start,
                end: segment.end,
                mean: segment_mean,
                median: median(slice),
                is_low: segment_mean < low_threshold,
            }
        })
        .collect();

    let overall_mean = mean(&values);
    let reduction_ratio = if original_points == 0 {
        0.0
    } else {
        values.len() as f64 / original_points as f64
    };

    Ok(ChartPayload {
        signal_name: signal_name.to_string(),
        timestamps: timestamps_ns.iter().copied().map(format_iso).collect(),
        breakpoint_labels: marked.iter().copied().map(format_label).collect(),
        breakpoint_times: marked.iter().copied().map(format_iso).collect(),
        breakpoints: breakpoints.as_slice().to_vec(),
        segments,
        summary: SeriesSummary {
            original_points,
            reduced_points: values.len(),
            reduction_ratio,
            change_points: breakpoints.change_points().len(),
            mean: overall_mean,
            std: population_std(&values, overall_mean),
        },
        values,
    })
}
