// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use rand::Rng;
use strata_core::DataPoint;

/// Picks the representative readings of one bucket.
///
/// Returns indices into `points`, ascending, de-duplicated on
/// `(timestamp, value)`. Candidates are the first minimum, the first maximum,
/// the middle rank by value (`count / 2`), and one uniform random draw.
/// Non-finite values never qualify; a bucket without finite values yields
/// nothing and consumes no randomness.
pub fn select_representatives<R: Rng + ?Sized>(points: &[DataPoint], rng: &mut R) -> Vec<usize> {
    let finite: Vec<usize> = points
        .iter()
        .enumerate()
        .filter(|(_, point)| point.value.is_finite())
        .map(|(idx, _)| idx)
        .collect();

    let Some(&first) = finite.first() else {
        return Vec::new();
    };

    let mut min_idx = first;
    let mut max_idx = first;
    for &idx in &finite[1..] {
        if points[idx].value < points[min_idx].value {
            min_idx = idx;
        }
        if points[idx].value > points[max_idx].value {
            max_idx = idx;
        }
    }

    let mut by_value = finite.clone();
    by_value.sort_by(|&a, &b| points[a].value.total_cmp(&points[b].value));
    let median_idx = by_value[by_value.len() / 2];

    let random_idx = finite[rng.gen_range(0..finite.len())];

    let mut picks: Vec<usize> = Vec::with_capacity(4);
    for candidate in [min_idx, max_idx, median_idx, random_idx] {
        if !picks
            .iter()
            .any(|&kept| points[kept].same_reading(&points[candidate]))
        {
            picks.push(candidate);
        }
    }
    picks.sort_unstable();
    picks
}
