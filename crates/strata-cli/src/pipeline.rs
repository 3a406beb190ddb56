// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::config::PipelineConfig;
use crate::report::{ChartPayload, build_chart_payload};
use rand::SeedableRng;
use rand::rngs::StdRng;
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use serde::Serialize;
use strata_core::{ReducedSeries, SamplingStats, Segmentation, StrataError, TimeSeries};
use strata_costs::CostL1Median;
use strata_offline::Pelt;
use strata_sampler::sample;

/// Result of one sample-then-segment run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub signal_name: String,
    /// NaN or infinite readings inside the date range, ignored before sampling.
    pub non_finite_dropped: usize,
    #[serde(skip)]
    pub reduced: ReducedSeries,
    pub sampling: SamplingStats,
    pub segmentation: Segmentation,
    pub chart: ChartPayload,
}

/// One independent unit of work for [`run_batch`].
#[derive(Clone, Debug, PartialEq)]
pub struct BatchJob {
    pub config: PipelineConfig,
    pub series: TimeSeries,
}

/// Clips `series` to the configured date range, samples it, and segments the
/// sampled values.
///
/// Non-finite readings in the range are ignored whatever the window length,
/// and reported as a warning in the segmentation diagnostics. The random
/// source is seeded once per call from [`PipelineConfig::seed`], so identical
/// inputs reproduce identical output. A window with no finite readings fails
/// with `EmptyInput` before segmentation runs.
pub fn run_pipeline(
    config: &PipelineConfig,
    series: &TimeSeries,
) -> Result<PipelineOutput, StrataError> {
    config.validate()?;

    let (start_ns, end_ns) = config.date_range.bounds_ns()?;
    let in_range = series.restrict_to(start_ns, end_ns);
    let (window, non_finite_dropped) = in_range.split_finite();
    if non_finite_dropped > 0 {
        log::warn!(
            "signal '{}': ignoring {non_finite_dropped} non-finite readings in {}..={}",
            config.signal_name,
            config.date_range.start,
            config.date_range.end
        );
    }
    if window.is_empty() {
        return Err(StrataError::empty_input(format!(
            "no finite data points for signal '{}' between {} and {}",
            config.signal_name, config.date_range.start, config.date_range.end
        )));
    }
    log::info!(
        "signal '{}': {} of {} points fall in {}..={}",
        config.signal_name,
        window.len(),
        series.len(),
        config.date_range.start,
        config.date_range.end
    );

    let mut rng = StdRng::seed_from_u64(config.seed());
    let reduced = sample(&window, config.target_points, &mut rng)?;
    log::info!(
        "signal '{}': reduced {} -> {} points (ratio {:.4})",
        config.signal_name,
        window.len(),
        reduced.len(),
        reduced.len() as f64 / window.len() as f64
    );

    let detector = Pelt::new(CostL1Median::new(), config.pelt_config())?;
    let mut segmentation = detector.detect(&reduced.values())?;
    if non_finite_dropped > 0 {
        segmentation.diagnostics.warnings.push(format!(
            "ignored {non_finite_dropped} non-finite readings before sampling"
        ));
    }
    log::info!(
        "signal '{}': {} change points at penalty {}",
        config.signal_name,
        segmentation.breakpoints.change_points().len(),
        config.penalty
    );

    let chart = build_chart_payload(
        &config.signal_name,
        in_range.len(),
        &reduced,
        &segmentation.breakpoints,
        config.low_threshold,
    )?;

    Ok(PipelineOutput {
        signal_name: config.signal_name.clone(),
        non_finite_dropped,
        sampling: reduced.stats,
        reduced,
        segmentation,
        chart,
    })
}

/// Runs independent jobs, in parallel when the `rayon` feature is enabled.
///
/// Each job owns its data and its own seeded random source; results come back
/// in job order and one job's failure does not affect the others.
pub fn run_batch(jobs: &[BatchJob]) -> Vec<Result<PipelineOutput, StrataError>> {
    #[cfg(feature = "rayon")]
    {
        jobs.par_iter()
            .map(|job| run_pipeline(&job.config, &job.series))
            .collect()
    }
    #[cfg(not(feature = "rayon"))]
    {
        jobs.iter()
            .map(|job| run_pipeline(&job.config, &job.series))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{BatchJob, run_batch, run_pipeline};
    use crate::config::{DateRange, PipelineConfig};
    use chrono::NaiveDate;
    use strata_core::{DataPoint, TimeSeries};

    const MINUTE: i64 = 60_000_000_000;
    // 2024-03-01T00:00:00Z
    const MARCH_1_2024: i64 = 1_709_251_200_000_000_000;

    fn config(days: (u32, u32)) -> PipelineConfig {
        let date = |d| NaiveDate::from_ymd_opt(2024, 3, d).expect("valid test date");
        PipelineConfig::new(
            "suction_temp",
            DateRange::new(date(days.0), date(days.1)).expect("valid range"),
        )
    }

    fn step_series(n: usize) -> TimeSeries {
        TimeSeries::new(
            (0..n)
                .map(|idx| {
                    let level = if idx < n / 2 { 20.0 } else { 70.0 };
                    DataPoint::new(MARCH_1_2024 + idx as i64 * MINUTE, level + (idx % 5) as f64)
                })
                .collect(),
        )
        .expect("sorted series")
    }

    #[test]
    fn small_series_passes_through_and_segments() {
        let mut config = config((1, 2));
        config.penalty = 20.0;
        let output = run_pipeline(&config, &step_series(100)).expect("pipeline should run");

        assert!(output.sampling.short_circuited);
        assert_eq!(output.reduced.len(), 100);
        assert_eq!(output.segmentation.breakpoints.as_slice(), &[50, 100]);
        assert_eq!(output.chart.breakpoint_labels, vec!["2024-03-01 00:50:00".to_string()]);
        assert!(output.chart.segments[0].is_low);
        assert!(!output.chart.segments[1].is_low);
    }

    fn with_readings(series: &TimeSeries, replace: &[(usize, f64)]) -> TimeSeries {
        let mut points = series.points().to_vec();
        for &(idx, value) in replace {
            points[idx].value = value;
        }
        TimeSeries::new(points).expect("sorted series")
    }

    #[test_log::test]
    fn short_window_ignores_non_finite_readings() {
        let mut config = config((1, 2));
        config.penalty = 20.0;
        let series = with_readings(&step_series(100), &[(10, f64::NAN)]);

        let output = run_pipeline(&config, &series).expect("NaN must not fail the run");

        assert!(output.sampling.short_circuited);
        assert_eq!(output.non_finite_dropped, 1);
        assert_eq!(output.reduced.len(), 99);
        assert!(output.reduced.values().iter().all(|value| value.is_finite()));
        assert_eq!(output.segmentation.breakpoints.as_slice(), &[49, 99]);
        assert_eq!(output.chart.summary.original_points, 100);
        assert_eq!(
            output.segmentation.diagnostics.warnings,
            vec!["ignored 1 non-finite readings before sampling".to_string()]
        );
    }

    #[test]
    fn non_finite_handling_does_not_depend_on_window_length() {
        let bad = [(10, f64::NAN), (20, f64::INFINITY), (30, f64::NEG_INFINITY)];
        let mut short = config((1, 2));
        short.penalty = 20.0;
        let mut long = short.clone();
        long.target_points = 50;

        for config in [short, long] {
            let output = run_pipeline(&config, &with_readings(&step_series(1_000), &bad))
                .expect("non-finite readings must not fail the run");
            assert_eq!(output.non_finite_dropped, 3);
            assert_eq!(output.segmentation.diagnostics.warnings.len(), 1);
        }
    }

    #[test]
    fn all_non_finite_window_is_empty_input() {
        let series = TimeSeries::new(vec![
            DataPoint::new(MARCH_1_2024, f64::NAN),
            DataPoint::new(MARCH_1_2024 + MINUTE, f64::INFINITY),
        ])
        .expect("sorted series");
        let err = run_pipeline(&config((1, 2)), &series).expect_err("nothing finite to segment");
        assert_eq!(err.code(), "empty_input");
    }

    #[test]
    fn clean_input_records_no_warnings() {
        let output = run_pipeline(&config((1, 2)), &step_series(40)).expect("pipeline should run");
        assert_eq!(output.non_finite_dropped, 0);
        assert!(output.segmentation.diagnostics.warnings.is_empty());
    }

    #[test]
    fn window_outside_data_is_empty_input() {
        let err = run_pipeline(&config((10, 11)), &step_series(100))
            .expect_err("empty window must fail");
        assert_eq!(err.code(), "empty_input");
        assert!(err.to_string().contains("suction_temp"));
    }

    #[test]
    fn invalid_config_fails_before_work() {
        let mut config = config((1, 2));
        config.target_points = 0;
        let err = run_pipeline(&config, &step_series(10)).expect_err("zero target must fail");
        assert_eq!(err.code(), "invalid_parameter");
    }

    #[test]
    fn batch_preserves_order_and_isolates_failures() {
        let mut reduced = config((1, 2));
        reduced.target_points = 50;
        let jobs = vec![
            BatchJob {
                config: reduced.clone(),
                series: step_series(1_000),
            },
            BatchJob {
                config: config((20, 21)),
                series: step_series(1_000),
            },
            BatchJob {
                config: reduced.clone(),
                series: step_series(1_000),
            },
        ];

        let results = run_batch(&jobs);
        assert_eq!(results.len(), 3);
        let first = results[0].as_ref().expect("first job should succeed");
        let third = results[2].as_ref().expect("third job should succeed");
        assert_eq!(first.reduced, third.reduced);
        assert_eq!(first.segmentation.breakpoints, third.segmentation.breakpoints);
        assert_eq!(first.chart, third.chart);
        assert!(!first.sampling.short_circuited);
        assert_eq!(first.sampling.bucket_count, 50);
        let err = results[1].as_ref().expect_err("second job has no data");
        assert_eq!(err.code(), "empty_input");
    }
}
