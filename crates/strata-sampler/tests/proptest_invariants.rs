// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use rand::SeedableRng;
use rand::rngs::StdRng;
use strata_core::{DataPoint, TimeSeries};
use strata_sampler::{sample, stratify};

const MIN_PROPTEST_CASES: u32 = 256;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

/// Builds a sorted series from positive timestamp gaps (duplicates allowed via 0 gaps).
fn series_from_gaps(gaps: &[i64], values: &[f64]) -> TimeSeries {
    let mut t_ns = 1_700_000_000_000_000_000i64;
    let points = gaps
        .iter()
        .zip(values)
        .map(|(&gap, &value)| {
            t_ns += gap;
            DataPoint::new(t_ns, value)
        })
        .collect();
    TimeSeries::new(points).expect("gaps are non-negative so the series is sorted")
}

fn series_strategy() -> impl Strategy<Value = TimeSeries> {
    (1usize..600).prop_flat_map(|n| {
        (
            prop::collection::vec(0i64..5_000_000_000, n),
            prop::collection::vec(-1_000.0f64..1_000.0, n),
        )
            .prop_map(|(gaps, values)| series_from_gaps(&gaps, &values))
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 1024,
        failure_persistence: Some(Box::new(FileFailurePersistence::Direct("proptest-regressions/tests/proptest_invariants.txt"))),
        .. ProptestConfig::default()
    })]

    #[test]
    fn series_within_target_is_returned_verbatim(
        series in series_strategy(),
        slack in 0usize..50,
        seed in any::<u64>(),
    ) {
        let target = series.len() + slack;
        let reduced = sample(&series, target, &mut StdRng::seed_from_u64(seed))
            .expect("sample should succeed");
        prop_assert_eq!(reduced.points(), series.points());
        prop_assert!(reduced.stats.short_circuited);
    }

    #[test]
    fn buckets_partition_the_series_in_order(
        series in series_strategy(),
        bucket_count in 1usize..120,
    ) {
        let buckets: Vec<_> = stratify(&series, bucket_count)
            .expect("stratify should succeed")
            .collect();
        prop_assert_eq!(buckets.len(), bucket_count);

        let mut covered = 0usize;
        for (expected_idx, bucket) in buckets.iter().enumerate() {
            prop_assert_eq!(bucket.index, expected_idx);
            prop_assert_eq!(bucket.points, &series.points()[covered..covered + bucket.points.len()]);
            covered += bucket.points.len();
        }
        prop_assert_eq!(covered, series.len());
        prop_assert!(buckets.last().is_some_and(|bucket| bucket.is_last()));
    }

    #[test]
    fn reduced_output_is_sorted_bounded_and_drawn_from_input(
        series in series_strategy(),
        target in 1usize..200,
        seed in any::<u64>(),
    ) {
        prop_assume!(series.len() > target);
        let reduced = sample(&series, target, &mut StdRng::seed_from_u64(seed))
            .expect("sample should succeed");

        let non_empty = target - reduced.stats.empty_buckets;
        prop_assert!(reduced.len() >= non_empty);
        prop_assert!(reduced.len() <= 4 * non_empty);
        prop_assert!(reduced.len() <= 4 * target);
        prop_assert!(reduced.timestamps().windows(2).all(|pair| pair[0] <= pair[1]));
        for point in reduced.points() {
            prop_assert!(series.points().iter().any(|input| input.same_reading(point)));
        }
        for (idx, point) in reduced.points().iter().enumerate() {
            prop_assert!(
                !reduced.points()[idx + 1..].iter().any(|other| other.same_reading(point)),
                "reading at t_ns={} emitted twice",
                point.t_ns
            );
        }
    }

    #[test]
    fn global_extrema_survive_sampling(
        series in series_strategy(),
        target in 1usize..200,
        seed in any::<u64>(),
    ) {
        prop_assume!(series.len() > target);
        let values = series.values();
        let global_min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let global_max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        let reduced = sample(&series, target, &mut StdRng::seed_from_u64(seed))
            .expect("sample should succeed");
        let kept = reduced.values();
        prop_assert!(kept.contains(&global_min));
        prop_assert!(kept.contains(&global_max));
    }

    #[test]
    fn pinned_seed_is_deterministic(
        series in series_strategy(),
        target in 1usize..200,
        seed in any::<u64>(),
    ) {
        let first = sample(&series, target, &mut StdRng::seed_from_u64(seed))
            .expect("first run should succeed");
        let second = sample(&series, target, &mut StdRng::seed_from_u64(seed))
            .expect("second run should succeed");
        prop_assert_eq!(first, second);
    }
}
