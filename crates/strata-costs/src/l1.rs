// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::model::CostModel;
use strata_core::StrataError;

/// L1 segment cost: sum of absolute deviations from the segment median.
///
/// Segment conventions use half-open intervals: `[start, end)`.
///
/// For even-length segments the upper of the two middle values is used as the
/// center. Any value between the two middles minimises the absolute-deviation
/// sum, so the cost does not depend on the choice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CostL1Median;

impl CostL1Median {
    pub const fn new() -> Self {
        Self
    }
}

/// One bit-plane of the rank wavelet matrix, most significant bit first.
///
/// Positions index the readings as arranged at this level: the previous
/// level's zero-bit readings, stably followed by its one-bit readings.
#[derive(Clone, Debug, PartialEq)]
struct RankLevel {
    /// Readings at positions `< i` whose rank has this bit clear.
    zeros_before: Vec<usize>,
    /// Sum of the values of those readings.
    zero_sums: Vec<f64>,
    zero_total: usize,
}

/// Rank wavelet matrix over the input plus prefix sums.
///
/// Answers "median of `[start, end)` and the sum of everything ranked below
/// it" in one pass over `O(log n)` levels, so a segment cost query never
/// touches the segment's values.
#[derive(Clone, Debug, PartialEq)]
pub struct L1Cache {
    /// Values in ascending order; `sorted[rank]` is the reading with `rank`.
    sorted: Vec<f64>,
    prefix_sum: Vec<f64>,
    levels: Vec<RankLevel>,
}

impl L1Cache {
    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    fn build(values: &[f64]) -> Self {
        let n = values.len();

        // Ties are broken by position so every reading gets a distinct rank.
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| values[a].total_cmp(&values[b]).then_with(|| a.cmp(&b)));
        let sorted: Vec<f64> = order.iter().map(|&idx| values[idx]).collect();
        let mut rank_of = vec![0usize; n];
        for (rank, &idx) in order.iter().enumerate() {
            rank_of[idx] = rank;
        }

        let mut prefix_sum = Vec::with_capacity(n + 1);
        prefix_sum.push(0.0);
        let mut running = 0.0;
        for &value in values {
            running += value;
            prefix_sum.push(running);
        }

        let bits = rank_bits(n);
        let mut levels = Vec::with_capacity(bits);
        let mut current: Vec<(usize, f64)> = rank_of
            .iter()
            .copied()
            .zip(values.iter().copied())
            .collect();

        for bit in (0..bits).rev() {
            let mut zeros_before = Vec::with_capacity(n + 1);
            let mut zero_sums = Vec::with_capacity(n + 1);
            zeros_before.push(0);
            zero_sums.push(0.0);

            let mut zeros = Vec::with_capacity(n);
            let mut ones = Vec::with_capacity(n);
            let mut zero_count = 0usize;
            let mut zero_sum = 0.0;
            for &(rank, value) in &current {
                if (rank >> bit) & 1 == 0 {
                    zero_count += 1;
                    zero_sum += value;
                    zeros.push((rank, value));
                } else {
                    ones.push((rank, value));
                }
                zeros_before.push(zero_count);
                zero_sums.push(zero_sum);
            }

            levels.push(RankLevel {
                zeros_before,
                zero_sums,
                zero_total: zero_count,
            });
            zeros.extend(ones);
            current = zeros;
        }

        Self {
            sorted,
            prefix_sum,
            levels,
        }
    }

    /// The `k`-th smallest value (0-based) in `[start, end)` and the sum of
    /// the `k` readings ranked below it.
    fn select_with_lower_sum(
        &self,
        mut start: usize,
        mut end: usize,
        mut k: usize,
    ) -> (f64, f64) {
        let mut rank = 0usize;
        let mut lower_sum = 0.0;
        for level in &self.levels {
            let zeros_lo = level.zeros_before[start];
            let zeros_hi = level.zeros_before[end];
            let zeros = zeros_hi - zeros_lo;
            rank <<= 1;
            if k < zeros {
                start = zeros_lo;
                end = zeros_hi;
            } else {
                lower_sum += level.zero_sums[end] - level.zero_sums[start];
                k -= zeros;
                start = level.zero_total + (start - zeros_lo);
                end = level.zero_total + (end - zeros_hi);
                rank |= 1;
            }
        }
        (self.sorted[rank], lower_sum)
    }
}

/// Bits needed to write every rank in `0..n`.
fn rank_bits(n: usize) -> usize {
    if n <= 1 {
        0
    } else {
        (usize::BITS - (n - 1).leading_zeros()) as usize
    }
}

fn cache_overflow_err(n: usize) -> StrataError {
    StrataError::invalid_input(format!("CostL1Median cache size overflow for n={n}"))
}

impl CostModel for CostL1Median {
    type Cache = L1Cache;

    fn name(&self) -> &'static str {
        "l1_median"
    }

    fn validate(&self, values: &[f64]) -> Result<(), StrataError> {
        if let Some((idx, value)) = values
            .iter()
            .enumerate()
            .find(|(_, value)| !value.is_finite())
        {
            return Err(StrataError::invalid_input(format!(
                "CostL1Median requires finite values; got value={value} at t={idx}"
            )));
        }
        Ok(())
    }

    fn precompute(&self, values: &[f64]) -> Result<Self::Cache, StrataError> {
        self.validate(values)?;
        if self.worst_case_cache_bytes(values.len()) == usize::MAX {
            return Err(cache_overflow_err(values.len()));
        }
        Ok(L1Cache::build(values))
    }

    fn worst_case_cache_bytes(&self, n: usize) -> usize {
        let Some(prefix_len) = n.checked_add(1) else {
            return usize::MAX;
        };
        let per_level = std::mem::size_of::<usize>() + std::mem::size_of::<f64>();
        let level_bytes = prefix_len
            .checked_mul(per_level)
            .and_then(|bytes| bytes.checked_mul(rank_bits(n)));
        let flat_bytes = n
            .checked_add(prefix_len)
            .and_then(|len| len.checked_mul(std::mem::size_of::<f64>()));
        match (level_bytes, flat_bytes) {
            (Some(levels), Some(flat)) => levels.checked_add(flat).unwrap_or(usize::MAX),
            _ => usize::MAX,
        }
    }

    fn segment_cost(&self, cache: &Self::Cache, start: usize, end: usize) -> f64 {
        assert!(
            start < end,
            "segment_cost requires start < end; got start={start}, end={end}"
        );
        assert!(
            end <= cache.len(),
            "segment_cost end out of bounds: end={end}, n={}",
            cache.len()
        );

        let len = end - start;
        let below = len / 2;
        let (median, lower_sum) = cache.select_with_lower_sum(start, end, below);
        let upper_sum = cache.prefix_sum[end] - cache.prefix_sum[start] - lower_sum;

        let lower_cost = below as f64 * median - lower_sum;
        let upper_cost = upper_sum - (len - below) as f64 * median;
        // Rounding can leave a constant segment a hair below zero.
        (lower_cost + upper_cost).max(0.0)
    }
}
