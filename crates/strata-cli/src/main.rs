// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use chrono::{DateTime, NaiveDateTime};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use strata_cli::report::format_iso;
use strata_cli::{PipelineConfig, PipelineOutput, run_pipeline};
use strata_core::{DataPoint, Diagnostics, SamplingStats, StrataError, TimeSeries};
use strata_costs::CostL1Median;
use strata_offline::{Pelt, PeltConfig};
use strata_sampler::sample;

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

struct Cli {
    command: Command,
}

enum Command {
    Run(RunArgs),
    Sample(SampleArgs),
    Segment(SegmentArgs),
}

#[derive(Debug)]
struct RunArgs {
    config: PathBuf,
    input: PathBuf,
    output: Option<PathBuf>,
}

#[derive(Debug)]
struct SampleArgs {
    input: PathBuf,
    target_points: usize,
    seed: u64,
    output: Option<PathBuf>,
}

impl Default for SampleArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            target_points: strata_cli::config::DEFAULT_TARGET_POINTS,
            seed: strata_cli::config::DEFAULT_SEED,
            output: None,
        }
    }
}

#[derive(Debug)]
struct SegmentArgs {
    input: PathBuf,
    config: PeltConfig,
    output: Option<PathBuf>,
}

impl Default for SegmentArgs {
    fn default() -> Self {
        Self {
            input: PathBuf::new(),
            config: PeltConfig::default(),
            output: None,
        }
    }
}

#[derive(Debug)]
enum CliError {
    Strata(StrataError),
    Io {
        context: String,
        source: std::io::Error,
    },
    Json {
        context: String,
        source: serde_json::Error,
    },
    InvalidInput(String),
}

impl CliError {
    fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Strata(err) => err.code(),
            Self::InvalidInput(_) => "invalid_input",
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strata(err) => write!(f, "{err}"),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::Json { context, source } => write!(f, "{context}: {source}"),
            Self::InvalidInput(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Strata(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::InvalidInput(_) => None,
        }
    }
}

impl From<StrataError> for CliError {
    fn from(value: StrataError) -> Self {
        Self::Strata(value)
    }
}

/// Readings loaded from a `timestamp,value` CSV after the null/zero filter.
#[derive(Clone, Debug)]
struct LoadedSeries {
    path: PathBuf,
    series: TimeSeries,
    rows: usize,
    dropped: usize,
}

impl LoadedSeries {
    fn summary(&self) -> InputSummary {
        InputSummary {
            path: self.path.display().to_string(),
            rows: self.rows,
            dropped: self.dropped,
            n: self.series.len(),
        }
    }
}

#[derive(Serialize)]
struct InputSummary {
    path: String,
    rows: usize,
    dropped: usize,
    n: usize,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    command: &'static str,
    input: InputSummary,
    config: &'a PipelineConfig,
    result: &'a PipelineOutput,
}

#[derive(Serialize)]
struct SampledPoint {
    timestamp: String,
    value: f64,
}

#[derive(Serialize)]
struct SampleOutput {
    command: &'static str,
    input: InputSummary,
    target_points: usize,
    seed: u64,
    stats: SamplingStats,
    points: Vec<SampledPoint>,
}

#[derive(Serialize)]
struct SegmentOutput {
    command: &'static str,
    input: String,
    n: usize,
    breakpoints: Vec<usize>,
    diagnostics: Diagnostics,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Serialize)]
struct ErrorPayload {
    code: String,
    message: String,
}

fn main() {
    init_logging();
    if let Err(err) = run() {
        emit_structured_error(&err);
        process::exit(1);
    }
}

fn init_logging() {
    env_logger::builder()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("strata", log::LevelFilter::Info)
        .parse_default_env()
        .init();
}

fn run() -> Result<(), CliError> {
    let Some(cli) = parse_cli(env::args().skip(1).collect())? else {
        return Ok(());
    };

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Sample(args) => handle_sample(args),
        Command::Segment(args) => handle_segment(args),
    }
}

fn parse_cli(args: Vec<String>) -> Result<Option<Cli>, CliError> {
    if args.is_empty() {
        print_root_help();
        return Ok(None);
    }

    if matches!(args[0].as_str(), "-h" | "--help") {
        print_root_help();
        return Ok(None);
    }
    if matches!(args[0].as_str(), "-V" | "--version") {
        print_version();
        return Ok(None);
    }

    let command_name = args[0].as_str();
    let rest = &args[1..];

    if rest
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print_command_help(command_name)?;
        return Ok(None);
    }
    if rest
        .iter()
        .any(|arg| matches!(arg.as_str(), "-V" | "--version"))
    {
        print_version();
        return Ok(None);
    }

    let command = match command_name {
        "run" => Command::Run(parse_run_args(rest)?),
        "sample" => Command::Sample(parse_sample_args(rest)?),
        "segment" => Command::Segment(parse_segment_args(rest)?),
        _ => {
            return Err(CliError::invalid_input(format!(
                "unknown command '{command_name}'; expected one of: run, sample, segment"
            )));
        }
    };

    Ok(Some(Cli { command }))
}

fn parse_run_args(tokens: &[String]) -> Result<RunArgs, CliError> {
    let mut config = PathBuf::new();
    let mut input = PathBuf::new();
    let mut output: Option<PathBuf> = None;

    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--config" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                config = PathBuf::from(raw);
            }
            "--input" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                input = PathBuf::from(raw);
            }
            "--output" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                output = Some(PathBuf::from(raw));
            }
            other => {
                return Err(CliError::invalid_input(format!(
                    "unknown run option '{other}'"
                )));
            }
        }
        idx += 1;
    }

    if config.as_os_str().is_empty() {
        return Err(CliError::invalid_input("run requires --config <path>"));
    }
    if input.as_os_str().is_empty() {
        return Err(CliError::invalid_input("run requires --input <path>"));
    }

    Ok(RunArgs {
        config,
        input,
        output,
    })
}

fn parse_sample_args(tokens: &[String]) -> Result<SampleArgs, CliError> {
    let mut args = SampleArgs::default();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--input" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.input = PathBuf::from(raw);
            }
            "--target-points" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.target_points = parse_usize_arg(raw.as_str(), flag)?;
            }
            "--seed" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.seed = parse_u64_arg(raw.as_str(), flag)?;
            }
            "--output" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.output = Some(PathBuf::from(raw));
            }
            other => {
                return Err(CliError::invalid_input(format!(
                    "unknown sample option '{other}'"
                )));
            }
        }
        idx += 1;
    }

    if args.input.as_os_str().is_empty() {
        return Err(CliError::invalid_input("sample requires --input <path>"));
    }

    Ok(args)
}

fn parse_segment_args(tokens: &[String]) -> Result<SegmentArgs, CliError> {
    let mut args = SegmentArgs::default();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--input" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.input = PathBuf::from(raw);
            }
            "--penalty" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.config.penalty = parse_f64_arg(raw.as_str(), flag)?;
            }
            "--min-segment-len" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.config.min_segment_len = parse_usize_arg(raw.as_str(), flag)?;
            }
            "--jump" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.config.jump = parse_usize_arg(raw.as_str(), flag)?;
            }
            "--no-prune" => {
                ensure_no_inline_value(flag, inline_value)?;
                args.config.prune = false;
            }
            "--output" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.output = Some(PathBuf::from(raw));
            }
            other => {
                return Err(CliError::invalid_input(format!(
                    "unknown segment option '{other}'"
                )));
            }
        }
        idx += 1;
    }

    if args.input.as_os_str().is_empty() {
        return Err(CliError::invalid_input("segment requires --input <path>"));
    }

    Ok(args)
}

fn split_flag(token: &str) -> Result<(&str, Option<String>), CliError> {
    if !token.starts_with("--") {
        return Err(CliError::invalid_input(format!(
            "unexpected positional argument '{token}'; expected --flag value"
        )));
    }
    if let Some((flag, value)) = token.split_once('=') {
        return Ok((flag, Some(value.to_string())));
    }
    Ok((token, None))
}

fn take_flag_value(
    flag: &str,
    inline_value: Option<String>,
    tokens: &[String],
    idx: &mut usize,
) -> Result<String, CliError> {
    if let Some(value) = inline_value {
        return Ok(value);
    }

    *idx += 1;
    let value = tokens
        .get(*idx)
        .ok_or_else(|| CliError::invalid_input(format!("{flag} requires a value")))?;
    if value.starts_with("--") {
        return Err(CliError::invalid_input(format!(
            "{flag} requires a value, but got option '{value}'"
        )));
    }
    Ok(value.clone())
}

fn ensure_no_inline_value(flag: &str, inline_value: Option<String>) -> Result<(), CliError> {
    if inline_value.is_some() {
        return Err(CliError::invalid_input(format!(
            "{flag} does not accept a value"
        )));
    }
    Ok(())
}

fn parse_usize_arg(raw: &str, flag: &str) -> Result<usize, CliError> {
    raw.parse::<usize>().map_err(|_| {
        CliError::invalid_input(format!(
            "{flag} expects a non-negative integer, got '{raw}'"
        ))
    })
}

fn parse_u64_arg(raw: &str, flag: &str) -> Result<u64, CliError> {
    raw.parse::<u64>().map_err(|_| {
        CliError::invalid_input(format!(
            "{flag} expects a non-negative integer, got '{raw}'"
        ))
    })
}

fn parse_f64_arg(raw: &str, flag: &str) -> Result<f64, CliError> {
    raw.parse::<f64>()
        .map_err(|_| CliError::invalid_input(format!("{flag} expects a number, got '{raw}'")))
}

fn print_version() {
    println!("strata {}", env!("CARGO_PKG_VERSION"));
}

fn print_root_help() {
    println!(
        "strata {}\n\nUSAGE:\n  strata <COMMAND> [OPTIONS]\n\nCOMMANDS:\n  run       Sample and segment a signal using a pipeline config JSON\n  sample    Reduce a timestamp,value CSV with time-stratified sampling\n  segment   Find change points in a single-column CSV of values\n\nGLOBAL OPTIONS:\n  -h, --help      Show help\n  -V, --version   Show version\n\nLogging goes to stderr; set RUST_LOG to adjust it.\nRun 'strata <COMMAND> --help' for subcommand options.",
        env!("CARGO_PKG_VERSION")
    );
}

fn print_command_help(command: &str) -> Result<(), CliError> {
    match command {
        "run" => {
            println!(
                "USAGE:\n  strata run --config <config.json> --input <data.csv> [OPTIONS]\n\nOPTIONS:\n  --config <path>                    Required pipeline config JSON\n  --input <path>                     Required timestamp,value CSV\n  --output <path>                    Write JSON output to file"
            );
            Ok(())
        }
        "sample" => {
            println!(
                "USAGE:\n  strata sample --input <data.csv> [OPTIONS]\n\nOPTIONS:\n  --input <path>                     Required timestamp,value CSV\n  --target-points <usize>            Default: 2000\n  --seed <u64>                       Default: 0\n  --output <path>                    Write JSON output to file"
            );
            Ok(())
        }
        "segment" => {
            println!(
                "USAGE:\n  strata segment --input <values.csv> [OPTIONS]\n\nOPTIONS:\n  --input <path>                     Required single-column CSV of values\n  --penalty <float>                  Default: 100\n  --min-segment-len <usize>          Default: 1\n  --jump <usize>                     Default: 1\n  --no-prune                         Evaluate every predecessor\n  --output <path>                    Write JSON output to file"
            );
            Ok(())
        }
        _ => Err(CliError::invalid_input(format!(
            "unknown command '{command}'; expected one of: run, sample, segment"
        ))),
    }
}

fn handle_run(args: RunArgs) -> Result<(), CliError> {
    let raw = fs::read_to_string(&args.config).map_err(|source| {
        CliError::io(format!("failed to read '{}'", args.config.display()), source)
    })?;
    let config = PipelineConfig::from_json_str(raw.as_str())?;
    let input = load_series(args.input.as_path())?;
    let result = run_pipeline(&config, &input.series)?;

    write_json_output(
        &RunOutput {
            command: "run",
            input: input.summary(),
            config: &config,
            result: &result,
        },
        args.output.as_deref(),
    )
}

fn handle_sample(args: SampleArgs) -> Result<(), CliError> {
    let input = load_series(args.input.as_path())?;
    let mut rng = StdRng::seed_from_u64(args.seed);
    let reduced = sample(&input.series, args.target_points, &mut rng)?;

    write_json_output(
        &SampleOutput {
            command: "sample",
            target_points: args.target_points,
            seed: args.seed,
            stats: reduced.stats,
            points: reduced
                .points()
                .iter()
                .map(|point| SampledPoint {
                    timestamp: format_iso(point.t_ns),
                    value: point.value,
                })
                .collect(),
            input: input.summary(),
        },
        args.output.as_deref(),
    )
}

fn handle_segment(args: SegmentArgs) -> Result<(), CliError> {
    let raw = fs::read_to_string(&args.input).map_err(|source| {
        CliError::io(format!("failed to read '{}'", args.input.display()), source)
    })?;
    let values = parse_values_csv(raw.as_str())?;
    let detector = Pelt::new(CostL1Median::new(), args.config)?;
    let segmentation = detector.detect(&values)?;

    write_json_output(
        &SegmentOutput {
            command: "segment",
            input: args.input.display().to_string(),
            n: values.len(),
            breakpoints: segmentation.breakpoints.into_vec(),
            diagnostics: segmentation.diagnostics,
        },
        args.output.as_deref(),
    )
}

fn load_series(path: &Path) -> Result<LoadedSeries, CliError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| CliError::io(format!("failed to read '{}'", path.display()), source))?;
    let (points, rows, dropped) = parse_series_csv(raw.as_str())?;
    if dropped > 0 {
        log::info!(
            "dropped {dropped} of {rows} rows from '{}' with empty, zero, or non-finite values",
            path.display()
        );
    }
    Ok(LoadedSeries {
        path: path.to_path_buf(),
        series: TimeSeries::from_unsorted(points),
        rows,
        dropped,
    })
}

fn parse_timestamp_ns(raw: &str) -> Option<i64> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed.timestamp_nanos_opt();
    }
    NAIVE_TIMESTAMP_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(raw, format)
            .ok()
            .and_then(|parsed| parsed.and_utc().timestamp_nanos_opt())
    })
}

fn split_cells(row: &str) -> Vec<&str> {
    row.split(',').map(str::trim).collect()
}

/// Parses `timestamp,value` rows, skipping a header row if present.
///
/// Rows whose value is empty, zero, or non-finite are dropped and counted;
/// anything else malformed is an error. Returns points, data rows, dropped rows.
fn parse_series_csv(raw: &str) -> Result<(Vec<DataPoint>, usize, usize), CliError> {
    let rows = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();

    if rows.is_empty() {
        return Err(CliError::invalid_input("CSV input is empty"));
    }

    let skip = usize::from(rows.len() > 1 && series_header_present(rows[0], rows[1]));
    let mut points = Vec::with_capacity(rows.len() - skip);
    let mut dropped = 0usize;

    for (offset, row) in rows[skip..].iter().enumerate() {
        let row_number = offset + skip + 1;
        let cells = split_cells(row);
        if cells.len() != 2 {
            return Err(CliError::invalid_input(format!(
                "CSV row {row_number} has {} columns but expected 2 (timestamp,value)",
                cells.len()
            )));
        }

        let t_ns = parse_timestamp_ns(cells[0]).ok_or_else(|| {
            CliError::invalid_input(format!(
                "CSV row {row_number} column 1 is not a valid timestamp: '{}'",
                cells[0]
            ))
        })?;

        if cells[1].is_empty() {
            dropped += 1;
            continue;
        }
        let value = cells[1].parse::<f64>().map_err(|_| {
            CliError::invalid_input(format!(
                "CSV row {row_number} column 2 is not a valid float: '{}'",
                cells[1]
            ))
        })?;
        if value == 0.0 || !value.is_finite() {
            dropped += 1;
            continue;
        }

        points.push(DataPoint::new(t_ns, value));
    }

    Ok((points, rows.len() - skip, dropped))
}

fn series_header_present(first_row: &str, second_row: &str) -> bool {
    let first = split_cells(first_row);
    let second = split_cells(second_row);
    if first.len() != 2 || second.len() != 2 {
        return false;
    }
    parse_timestamp_ns(first[0]).is_none()
        && first[1].parse::<f64>().is_err()
        && parse_timestamp_ns(second[0]).is_some()
}

/// Parses a single-column CSV of values, skipping a header row if present.
fn parse_values_csv(raw: &str) -> Result<Vec<f64>, CliError> {
    let rows = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();

    if rows.is_empty() {
        return Err(CliError::invalid_input("CSV input is empty"));
    }

    match parse_value_rows(rows.as_slice(), 0) {
        Ok(parsed) => Ok(parsed),
        Err(err) => {
            if rows.len() > 1
                && first_row_looks_like_header(rows[0], rows[1])
                && let Ok(without_header) = parse_value_rows(&rows[1..], 1)
            {
                return Ok(without_header);
            }
            Err(err)
        }
    }
}

fn parse_value_rows(rows: &[&str], row_offset: usize) -> Result<Vec<f64>, CliError> {
    let mut values = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let row_number = idx + row_offset + 1;
        let cells = split_cells(row);
        if cells.len() != 1 {
            return Err(CliError::invalid_input(format!(
                "CSV row {row_number} has {} columns but expected 1",
                cells.len()
            )));
        }
        let value = cells[0].parse::<f64>().map_err(|_| {
            CliError::invalid_input(format!(
                "CSV row {row_number} column 1 is not a valid float: '{}'",
                cells[0]
            ))
        })?;
        values.push(value);
    }
    Ok(values)
}

fn first_row_looks_like_header(first_row: &str, second_row: &str) -> bool {
    let first_cells = split_cells(first_row);
    let second_cells = split_cells(second_row);

    if first_cells.is_empty()
        || first_cells.len() != second_cells.len()
        || first_cells.iter().any(|cell| cell.is_empty())
        || second_cells.iter().any(|cell| cell.is_empty())
    {
        return false;
    }

    let first_all_non_numeric = first_cells.iter().all(|cell| cell.parse::<f64>().is_err());
    let second_all_numeric = second_cells.iter().all(|cell| cell.parse::<f64>().is_ok());

    first_all_non_numeric && second_all_numeric
}

fn write_json_output<T: Serialize>(
    payload: &T,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let encoded = serde_json::to_string_pretty(payload)
        .map_err(|source| CliError::json("failed to serialize JSON output", source))?;

    if let Some(path) = output_path {
        fs::write(path, format!("{encoded}\n"))
            .map_err(|source| CliError::io(format!("failed to write '{}'", path.display()), source))
    } else {
        println!("{encoded}");
        Ok(())
    }
}

fn emit_structured_error(err: &CliError) {
    let envelope = ErrorEnvelope {
        error: ErrorPayload {
            code: err.code().to_string(),
            message: err.to_string(),
        },
    };

    match serde_json::to_string_pretty(&envelope) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!(
            "{{\"error\":{{\"code\":\"{}\",\"message\":\"{}\"}}}}",
            err.code(),
            err
        ),
    }
}
