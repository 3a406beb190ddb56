// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Composes sampling and segmentation into one configured pipeline run and
//! shapes the result for a charting front end.

pub mod config;
pub mod pipeline;
pub mod report;

pub use config::{DateRange, PipelineConfig};
pub use pipeline::{BatchJob, PipelineOutput, run_batch, run_pipeline};
pub use report::{ChartPayload, SegmentSummary, SeriesSummary, build_chart_payload};
