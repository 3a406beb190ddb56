// SPDX-License-Identifier: MIT OR Apache-2.0

#![no_main]

#[path = "common.rs"]
mod common;

use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand::rngs::StdRng;
use strata_core::{DataPoint, TimeSeries};
use strata_costs::CostL1Median;
use strata_offline::{Pelt, PeltConfig};
use strata_sampler::sample;

fn build_value(raw: f64, mode_seed: u8, small_seed: i16) -> f64 {
    match mode_seed % 8 {
        0 => f64::from(small_seed) / 8.0,
        1 => f64::from(small_seed % 4),
        2 => 0.0,
        3 => f64::NAN,
        4 => f64::INFINITY,
        5 => f64::NEG_INFINITY,
        _ => raw,
    }
}

fn build_penalty(seed: u8, value_seed: u8) -> f64 {
    match seed % 6 {
        0 => 0.0,
        1 => -1.0,
        2 => f64::NAN,
        3 => f64::INFINITY,
        _ => f64::from(value_seed) / 4.0,
    }
}

fuzz_target!(|data: &[u8]| {
    let mut cursor = common::ByteCursor::new(data);

    let payload_len = common::bounded(cursor.next_u8(), 0, 128).saturating_mul(8);
    let raw_values = common::decode_f64_chunks(&cursor.take_padded(payload_len), 128);

    let mut t_ns = i64::from(cursor.next_i16());
    let mut points = Vec::with_capacity(raw_values.len());
    for raw in raw_values {
        let gap_seed = cursor.next_u8();
        t_ns = match gap_seed % 4 {
            0 => t_ns,
            1 => t_ns.saturating_add(i64::from(gap_seed)),
            2 => t_ns.saturating_add(i64::from(cursor.next_i16()).abs() * 1_000_000),
            _ => t_ns.saturating_add(i64::MAX / 64),
        };
        let value = build_value(raw, cursor.next_u8(), cursor.next_i16());
        points.push(DataPoint::new(t_ns, value));
    }

    let series = TimeSeries::from_unsorted(points);
    let target_points = common::bounded(cursor.next_u8(), 0, 64);
    let mut rng = StdRng::seed_from_u64(cursor.next_u64());

    let values = match sample(&series, target_points, &mut rng) {
        Ok(reduced) => reduced.values(),
        Err(_) => series.values(),
    };

    let config = PeltConfig {
        penalty: build_penalty(cursor.next_u8(), cursor.next_u8()),
        min_segment_len: common::bounded(cursor.next_u8(), 0, 8),
        jump: common::bounded(cursor.next_u8(), 0, 4),
        prune: cursor.next_u8() & 1 == 0,
    };
    let Ok(detector) = Pelt::new(CostL1Median::new(), config) else {
        return;
    };
    let _ = detector.detect(&values);
});
