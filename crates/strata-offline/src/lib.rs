// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

//! Offline change-point segmentation by exact penalized dynamic programming.

pub mod pelt;

pub use pelt::{Pelt, PeltConfig, segment};
