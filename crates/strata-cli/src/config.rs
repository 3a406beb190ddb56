// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strata_core::StrataError;
use strata_offline::PeltConfig;

pub const DEFAULT_TARGET_POINTS: usize = 2_000;
pub const DEFAULT_PENALTY: f64 = 100.0;
pub const DEFAULT_SEED: u64 = 0;
pub const DEFAULT_LOW_THRESHOLD: f64 = 30.0;

const LAST_NANO_OF_DAY: u32 = 999_999_999;

fn default_target_points() -> usize {
    DEFAULT_TARGET_POINTS
}

fn default_penalty() -> f64 {
    DEFAULT_PENALTY
}

fn default_one() -> usize {
    1
}

fn default_low_threshold() -> f64 {
    DEFAULT_LOW_THRESHOLD
}

/// Closed calendar range; both end days are included in full.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, StrataError> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    fn validate(&self) -> Result<(), StrataError> {
        if self.start > self.end {
            return Err(StrataError::invalid_parameter(format!(
                "date_range.start={} is after date_range.end={}",
                self.start, self.end
            )));
        }
        Ok(())
    }

    /// Inclusive Unix-nanosecond bounds: start-of-day `start` through the last
    /// nanosecond of `end`, both UTC.
    pub fn bounds_ns(&self) -> Result<(i64, i64), StrataError> {
        let start = self
            .start
            .and_hms_opt(0, 0, 0)
            .and_then(|moment| moment.and_utc().timestamp_nanos_opt())
            .ok_or_else(|| {
                StrataError::invalid_parameter(format!(
                    "date_range.start={} is outside the representable nanosecond range",
                    self.start
                ))
            })?;
        let end = self
            .end
            .and_hms_nano_opt(23, 59, 59, LAST_NANO_OF_DAY)
            .and_then(|moment| moment.and_utc().timestamp_nanos_opt())
            .ok_or_else(|| {
                StrataError::invalid_parameter(format!(
                    "date_range.end={} is outside the representable nanosecond range",
                    self.end
                ))
            })?;
        Ok((start, end))
    }
}

/// Everything one pipeline run needs; loaded from JSON by the CLI.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub signal_name: String,
    pub date_range: DateRange,
    #[serde(default = "default_target_points")]
    pub target_points: usize,
    #[serde(default = "default_penalty")]
    pub penalty: f64,
    /// Seed for the per-bucket random pick; `None` means [`DEFAULT_SEED`].
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_one")]
    pub min_segment_len: usize,
    #[serde(default = "default_one")]
    pub jump: usize,
    /// Segments whose mean falls below this are flagged `is_low` in the chart.
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,
}

impl PipelineConfig {
    pub fn new(signal_name: impl Into<String>, date_range: DateRange) -> Self {
        Self {
            signal_name: signal_name.into(),
            date_range,
            target_points: DEFAULT_TARGET_POINTS,
            penalty: DEFAULT_PENALTY,
            seed: None,
            min_segment_len: 1,
            jump: 1,
            low_threshold: DEFAULT_LOW_THRESHOLD,
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, StrataError> {
        let config: Self = serde_json::from_str(raw)
            .map_err(|err| StrataError::invalid_input(format!("invalid pipeline config JSON: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StrataError> {
        if self.signal_name.trim().is_empty() {
            return Err(StrataError::invalid_parameter(
                "signal_name must not be empty",
            ));
        }
        self.date_range.validate()?;
        if self.target_points == 0 {
            return Err(StrataError::invalid_parameter(
                "target_points must be >= 1; got 0",
            ));
        }
        if !self.low_threshold.is_finite() {
            return Err(StrataError::invalid_parameter(format!(
                "low_threshold must be finite; got {}",
                self.low_threshold
            )));
        }
        self.pelt_config().validate()
    }

    pub fn seed(&self) -> u64 {
        self.seed.unwrap_or(DEFAULT_SEED)
    }

    pub fn pelt_config(&self) -> PeltConfig {
        PeltConfig {
            penalty: self.penalty,
            min_segment_len: self.min_segment_len,
            jump: self.jump,
            prune: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_PENALTY, DEFAULT_TARGET_POINTS, DateRange, PipelineConfig};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid test date")
    }

    #[test]
    fn json_config_fills_defaults() {
        let config = PipelineConfig::from_json_str(
            r#"{"signal_name":"suction_temp","date_range":{"start":"2024-03-01","end":"2024-12-15"}}"#,
        )
        .expect("minimal config should parse");
        assert_eq!(config.target_points, DEFAULT_TARGET_POINTS);
        assert_eq!(config.penalty, DEFAULT_PENALTY);
        assert_eq!(config.seed(), 0);
        assert_eq!(config.min_segment_len, 1);
        assert_eq!(config.jump, 1);
        assert_eq!(config.low_threshold, 30.0);
        assert_eq!(config.date_range.start, date(2024, 3, 1));
    }

    #[test]
    fn json_config_rejects_unknown_fields_and_bad_values() {
        let err = PipelineConfig::from_json_str(
            r#"{"signal_name":"s","date_range":{"start":"2024-03-01","end":"2024-03-02"},"pen":5}"#,
        )
        .expect_err("unknown field must fail");
        assert_eq!(err.code(), "invalid_input");
        assert!(err.to_string().contains("invalid pipeline config JSON"));

        let err = PipelineConfig::from_json_str(
            r#"{"signal_name":"s","date_range":{"start":"2024-03-01","end":"2024-03-02"},"target_points":0}"#,
        )
        .expect_err("zero target must fail");
        assert_eq!(err.code(), "invalid_parameter");

        let err = PipelineConfig::from_json_str(
            r#"{"signal_name":"s","date_range":{"start":"2024-03-01","end":"2024-03-02"},"penalty":-1.0}"#,
        )
        .expect_err("negative penalty must fail");
        assert!(err.to_string().contains("penalty"));
    }

    #[test]
    fn reversed_date_range_is_rejected() {
        let err = DateRange::new(date(2024, 5, 2), date(2024, 5, 1)).expect_err("reversed");
        assert_eq!(err.code(), "invalid_parameter");

        let mut config = PipelineConfig::new(
            "s",
            DateRange::new(date(2024, 5, 1), date(2024, 5, 1)).expect("single day"),
        );
        config.validate().expect("single-day range is valid");
        config.date_range.start = date(2024, 6, 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn bounds_cover_whole_end_day() {
        let range = DateRange::new(date(1970, 1, 1), date(1970, 1, 2)).expect("range");
        let (start, end) = range.bounds_ns().expect("bounds");
        assert_eq!(start, 0);
        assert_eq!(end, 2 * 86_400 * 1_000_000_000 - 1);
    }

    #[test]
    fn pelt_config_mirrors_pipeline_settings() {
        let mut config = PipelineConfig::new(
            "s",
            DateRange::new(date(2024, 1, 1), date(2024, 1, 31)).expect("range"),
        );
        config.penalty = 12.5;
        config.min_segment_len = 3;
        config.jump = 2;
        let pelt = config.pelt_config();
        assert_eq!(pelt.penalty, 12.5);
        assert_eq!(pelt.min_segment_len, 3);
        assert_eq!(pelt.jump, 2);
        assert!(pelt.prune);

        config.jump = 0;
        let err = config.validate().expect_err("jump=0 must fail");
        assert!(err.to_string().contains("jump"));
    }
}
