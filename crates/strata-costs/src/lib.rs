// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

pub mod l1;
pub mod model;

pub use l1::{CostL1Median, L1Cache};
pub use model::CostModel;
