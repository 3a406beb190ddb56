// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Shared types for the strata sampler and segmenter.

pub mod diagnostics;
pub mod error;
pub mod results;
pub mod time_series;

pub use diagnostics::{DIAGNOSTICS_SCHEMA_VERSION, Diagnostics, PruningStats};
pub use error::StrataError;
pub use results::{
    BreakpointSet, Segment, Segmentation, segments_from_breakpoints, validate_breakpoints,
};
pub use time_series::{
    DataPoint, NANOS_PER_SECOND, ReducedSeries, SamplingStats, TimeSeries, elapsed_seconds,
};
