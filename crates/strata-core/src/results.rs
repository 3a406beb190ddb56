// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::{Diagnostics, StrataError};

/// Contiguous half-open index range `[start, end)` over a value sequence.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
}

impl Segment {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Checks the breakpoint contract: non-empty, strictly increasing,
/// every entry in `1..=n`, last entry equal to `n`.
pub fn validate_breakpoints(n: usize, breakpoints: &[usize]) -> Result<(), StrataError> {
    let Some(&last) = breakpoints.last() else {
        return Err(StrataError::invalid_input(
            "breakpoints must contain at least the terminal index n",
        ));
    };
    if last != n {
        return Err(StrataError::invalid_input(format!(
            "last breakpoint must equal n={n}; got {last}"
        )));
    }
    if breakpoints[0] == 0 {
        return Err(StrataError::invalid_input("breakpoint 0 is not a valid boundary"));
    }
    if let Some(pair) = breakpoints.windows(2).find(|pair| pair[0] >= pair[1]) {
        return Err(StrataError::invalid_input(format!(
            "breakpoints must be strictly increasing; found {} followed by {}",
            pair[0], pair[1]
        )));
    }
    Ok(())
}

/// Expands breakpoints into the segments they induce over `[0, n)`.
pub fn segments_from_breakpoints(breakpoints: &[usize]) -> Vec<Segment> {
    let mut start = 0usize;
    breakpoints
        .iter()
        .map(|&end| {
            let segment = Segment { start, end };
            start = end;
            segment
        })
        .collect()
}

/// Sorted segment boundaries; the last entry is always the series length.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "RawBreakpointSet"))]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BreakpointSet {
    breakpoints: Vec<usize>,
}

/// Wire shape of [`BreakpointSet`]; checked before it becomes one.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawBreakpointSet {
    breakpoints: Vec<usize>,
}

#[cfg(feature = "serde")]
impl TryFrom<RawBreakpointSet> for BreakpointSet {
    type Error = StrataError;

    fn try_from(raw: RawBreakpointSet) -> Result<Self, Self::Error> {
        let n = raw.breakpoints.last().copied().unwrap_or(0);
        Self::new(n, raw.breakpoints)
    }
}

impl BreakpointSet {
    /// Constructs a validated breakpoint set over a series of length `n`.
    pub fn new(n: usize, breakpoints: Vec<usize>) -> Result<Self, StrataError> {
        validate_breakpoints(n, &breakpoints)?;
        Ok(Self { breakpoints })
    }

    /// All boundaries, including the terminal sentinel.
    pub fn as_slice(&self) -> &[usize] {
        &self.breakpoints
    }

    pub fn into_vec(self) -> Vec<usize> {
        self.breakpoints
    }

    /// Boundaries that mark an actual level shift (terminal sentinel removed).
    pub fn change_points(&self) -> &[usize] {
        &self.breakpoints[..self.breakpoints.len() - 1]
    }

    /// Length of the series these breakpoints cover.
    pub fn n(&self) -> usize {
        self.breakpoints[self.breakpoints.len() - 1]
    }

    pub fn segment_count(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn segments(&self) -> Vec<Segment> {
        segments_from_breakpoints(&self.breakpoints)
    }
}

/// Segmenter output: boundaries plus run diagnostics.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, PartialEq)]
pub struct Segmentation {
    pub breakpoints: BreakpointSet,
    pub diagnostics: Diagnostics,
}
