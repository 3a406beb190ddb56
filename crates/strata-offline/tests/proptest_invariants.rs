// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use proptest::prelude::*;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use strata_core::{Segmentation, validate_breakpoints};
use strata_costs::{CostL1Median, CostModel};
use strata_offline::{Pelt, PeltConfig, segment};

const MIN_PROPTEST_CASES: u32 = 512;

fn proptest_cases() -> u32 {
    std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|raw| raw.parse::<u32>().ok())
        .map(|parsed| parsed.max(MIN_PROPTEST_CASES))
        .unwrap_or(MIN_PROPTEST_CASES)
}

/// Integer-valued readings keep every cost and objective exact in f64.
fn integer_values(len: std::ops::Range<usize>) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-60i32..60, len)
        .prop_map(|raw| raw.into_iter().map(f64::from).collect())
}

fn detect(values: &[f64], config: PeltConfig) -> Segmentation {
    Pelt::new(CostL1Median::new(), config)
        .expect("generated config should be valid")
        .detect(values)
        .expect("detect should succeed for generated input")
}

fn objective(values: &[f64], breakpoints: &[usize], penalty: f64) -> f64 {
    let model = CostL1Median::new();
    let cache = model.precompute(values).expect("precompute");
    let mut start = 0;
    let mut total = 0.0;
    for &end in breakpoints {
        total += model.segment_cost(&cache, start, end) + penalty;
        start = end;
    }
    total
}

/// Minimum objective over all 2^(n-1) partitions of `[0, n)`.
fn exhaustive_min_objective(values: &[f64], penalty: f64) -> f64 {
    let n = values.len();
    let mut best = f64::INFINITY;
    for mask in 0u32..(1u32 << (n - 1)) {
        let mut breakpoints: Vec<usize> = (1..n).filter(|&b| mask & (1 << (b - 1)) != 0).collect();
        breakpoints.push(n);
        best = best.min(objective(values, &breakpoints, penalty));
    }
    best
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: proptest_cases(),
        max_shrink_iters: 1024,
        failure_persistence: Some(Box::new(FileFailurePersistence::Direct("proptest-regressions/tests/proptest_invariants.txt"))),
        .. ProptestConfig::default()
    })]

    #[test]
    fn outputs_respect_breakpoint_constraints_and_are_deterministic(
        values in integer_values(1..160),
        penalty in 0u32..200,
        min_segment_len in 1usize..6,
        jump in 1usize..5,
    ) {
        let n = values.len();
        prop_assume!(min_segment_len <= n);
        let config = PeltConfig {
            penalty: f64::from(penalty),
            min_segment_len,
            jump,
            prune: true,
        };

        let first = detect(&values, config.clone());
        let second = detect(&values, config);
        prop_assert_eq!(&first.breakpoints, &second.breakpoints);

        let breakpoints = first.breakpoints.as_slice();
        validate_breakpoints(n, breakpoints).expect("breakpoint contract must hold");
        let mut start = 0usize;
        for &end in breakpoints {
            prop_assert!(end - start >= min_segment_len);
            if end != n {
                prop_assert_eq!(end % jump, 0);
            }
            start = end;
        }
        let covered: usize = first.breakpoints.segments().iter().map(|segment| segment.len()).sum();
        prop_assert_eq!(covered, n);
    }

    #[test]
    fn pruning_never_changes_the_result(
        values in integer_values(1..200),
        penalty in 0u32..120,
        min_segment_len in 1usize..5,
        jump in 1usize..4,
    ) {
        prop_assume!(min_segment_len <= values.len());
        let base = PeltConfig {
            penalty: f64::from(penalty),
            min_segment_len,
            jump,
            prune: true,
        };
        let pruned = detect(&values, base.clone());
        let unpruned = detect(&values, PeltConfig { prune: false, ..base });
        prop_assert_eq!(&pruned.breakpoints, &unpruned.breakpoints);
        prop_assert_eq!(pruned.diagnostics.objective, unpruned.diagnostics.objective);
        prop_assert!(pruned.diagnostics.cost_evals <= unpruned.diagnostics.cost_evals);
    }

    #[test]
    fn larger_penalty_never_adds_segments(
        values in integer_values(1..160),
        low in 0u32..100,
        extra in 0u32..100,
    ) {
        let fewer_penalized = segment(&values, f64::from(low)).expect("segment");
        let more_penalized = segment(&values, f64::from(low + extra)).expect("segment");
        prop_assert!(more_penalized.segment_count() <= fewer_penalized.segment_count());
    }

    #[test]
    fn result_matches_exhaustive_search_on_small_inputs(
        values in integer_values(1..11),
        penalty in 0u32..60,
    ) {
        let penalty = f64::from(penalty);
        let segmentation = detect(&values, PeltConfig::with_penalty(penalty));
        let found = objective(&values, segmentation.breakpoints.as_slice(), penalty);
        prop_assert_eq!(found, exhaustive_min_objective(&values, penalty));
        prop_assert_eq!(segmentation.diagnostics.objective, Some(found));
    }

    #[test]
    fn constant_series_with_positive_penalty_is_one_segment(
        level in -1_000i32..1_000,
        n in 1usize..300,
        penalty in 1u32..50,
    ) {
        let values = vec![f64::from(level); n];
        let breakpoints = segment(&values, f64::from(penalty)).expect("segment");
        prop_assert_eq!(breakpoints.as_slice(), &[n]);
    }
}
