// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::fmt;

/// Error type shared by every strata stage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StrataError {
    /// The input series holds no points.
    EmptyInput(String),
    /// A caller-supplied parameter is out of its domain.
    InvalidParameter(String),
    /// Too few values to produce a segmentation.
    InsufficientData(String),
    /// Input data violates a structural invariant.
    InvalidInput(String),
    /// A non-finite cost or objective surfaced during a computation.
    NumericalIssue(String),
}

impl StrataError {
    pub fn empty_input(msg: impl Into<String>) -> Self {
        Self::EmptyInput(msg.into())
    }

    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    pub fn insufficient_data(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn numerical_issue(msg: impl Into<String>) -> Self {
        Self::NumericalIssue(msg.into())
    }

    /// Stable machine-readable code for the variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyInput(_) => "empty_input",
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::InsufficientData(_) => "insufficient_data",
            Self::InvalidInput(_) => "invalid_input",
            Self::NumericalIssue(_) => "numerical_issue",
        }
    }
}

impl fmt::Display for StrataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput(msg) => write!(f, "empty input: {msg}"),
            Self::InvalidParameter(msg) => write!(f, "invalid parameter: {msg}"),
            Self::InsufficientData(msg) => write!(f, "insufficient data: {msg}"),
            Self::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            Self::NumericalIssue(msg) => write!(f, "numerical issue: {msg}"),
        }
    }
}

impl std::error::Error for StrataError {}
