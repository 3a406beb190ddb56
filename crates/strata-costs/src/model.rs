// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use strata_core::StrataError;

/// Segment cost seam used by the offline search.
///
/// Segments are half-open `[start, end)` ranges over the values passed to
/// [`CostModel::precompute`].
pub trait CostModel {
    type Cache;

    /// Stable identifier recorded in run diagnostics.
    fn name(&self) -> &'static str;

    fn validate(&self, values: &[f64]) -> Result<(), StrataError>;

    fn precompute(&self, values: &[f64]) -> Result<Self::Cache, StrataError>;

    /// Upper bound on cache memory for `n` values; `usize::MAX` on overflow.
    fn worst_case_cache_bytes(&self, n: usize) -> usize {
        n.checked_mul(std::mem::size_of::<f64>())
            .unwrap_or(usize::MAX)
    }

    /// Cost of the half-open segment `[start, end)`.
    ///
    /// Callers guarantee `start < end <= n`.
    fn segment_cost(&self, cache: &Self::Cache, start: usize, end: usize) -> f64;
}

#[cfg(test)]
mod tests {
    use super::CostModel;
    use strata_core::StrataError;

    struct LengthCost;

    impl CostModel for LengthCost {
        type Cache = usize;

        fn name(&self) -> &'static str {
            "length"
        }

        fn validate(&self, _values: &[f64]) -> Result<(), StrataError> {
            Ok(())
        }

        fn precompute(&self, values: &[f64]) -> Result<Self::Cache, StrataError> {
            Ok(values.len())
        }

        fn segment_cost(&self, _cache: &Self::Cache, start: usize, end: usize) -> f64 {
            (end - start) as f64
        }
    }

    #[test]
    fn default_cache_bytes_scale_with_n_and_saturate() {
        assert_eq!(LengthCost.worst_case_cache_bytes(4), 32);
        assert_eq!(LengthCost.worst_case_cache_bytes(usize::MAX), usize::MAX);
    }

    #[test]
    fn trait_is_usable_through_generic_helpers() {
        fn total<C: CostModel>(model: &C, values: &[f64]) -> f64 {
            let cache = model.precompute(values).expect("precompute");
            model.segment_cost(&cache, 0, values.len())
        }
        assert_eq!(total(&LengthCost, &[1.0, 2.0, 3.0]), 3.0);
        assert_eq!(LengthCost.name(), "length");
    }
}
