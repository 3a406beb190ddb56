// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Time-stratified sampler: splits a series into equal-width time buckets and
//! keeps the min, max, median, and one random reading from each.

pub mod bucket;
pub mod representative;
pub mod sampler;

pub use bucket::{Bucket, Stratifier, bucket_interval_seconds, stratify};
pub use representative::select_representatives;
pub use sampler::sample;
