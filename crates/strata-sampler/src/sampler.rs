// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::bucket::stratify;
use crate::representative::select_representatives;
use rand::Rng;
use strata_core::{ReducedSeries, SamplingStats, StrataError, TimeSeries};

/// Reduces `series` to at most four representative readings per time bucket.
///
/// Series no longer than `target_points` are returned unchanged. Otherwise the
/// span is split into `target_points` equal-width buckets and each non-empty
/// bucket contributes its min, max, median, and one random reading drawn from
/// `rng`. The output size is bounded by `4 * target_points`, not by
/// `target_points`.
pub fn sample<R: Rng + ?Sized>(
    series: &TimeSeries,
    target_points: usize,
    rng: &mut R,
) -> Result<ReducedSeries, StrataError> {
    if series.is_empty() {
        return Err(StrataError::empty_input(
            "no data points for requested parameters",
        ));
    }
    if target_points == 0 {
        return Err(StrataError::invalid_parameter(
            "target_points must be >= 1; got 0",
        ));
    }

    let input_len = series.len();
    if input_len <= target_points {
        log::debug!(
            "series has {input_len} points <= target {target_points}; returning it unchanged"
        );
        return ReducedSeries::new(
            series.points().to_vec(),
            SamplingStats {
                input_len,
                short_circuited: true,
                ..SamplingStats::default()
            },
        );
    }

    let stratifier = stratify(series, target_points)?;
    log::debug!(
        "stratifying {input_len} points into {target_points} buckets of {:.6}s",
        stratifier.interval_s()
    );

    let mut stats = SamplingStats {
        input_len,
        bucket_count: stratifier.bucket_count(),
        ..SamplingStats::default()
    };
    let mut reduced = Vec::with_capacity(input_len.min(target_points.saturating_mul(4)));

    for bucket in stratifier {
        if bucket.is_empty() {
            stats.empty_buckets += 1;
            continue;
        }

        let picks = select_representatives(bucket.points, rng);
        if picks.is_empty() {
            stats.non_finite_buckets += 1;
            log::warn!(
                "bucket {} holds {} readings and none are finite; skipping it",
                bucket.index,
                bucket.points.len()
            );
            continue;
        }

        log::trace!(
            "bucket {} kept {} of {} readings",
            bucket.index,
            picks.len(),
            bucket.points.len()
        );
        reduced.extend(picks.into_iter().map(|idx| bucket.points[idx]));
    }

    reduced.sort_by_key(|point| point.t_ns);

    log::debug!(
        "sampled {input_len} -> {} points ({} empty buckets, {} non-finite buckets)",
        reduced.len(),
        stats.empty_buckets,
        stats.non_finite_buckets
    );

    ReducedSeries::new(reduced, stats)
}
