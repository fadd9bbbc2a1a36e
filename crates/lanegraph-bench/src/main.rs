//! lanegraph-bench: CLI tool for running the lane topology pipeline on
//! survey point files and collecting diagnostics.
//!
//! Reads a point file, runs every pipeline stage with configurable
//! parameters and prints detailed per-stage diagnostics. Useful for:
//!
//! - Tuning clustering and matching thresholds for a new survey
//! - Comparing centerline strategies and smoothers
//! - Measuring per-stage durations to identify bottlenecks
//! - Writing the result document for downstream map tooling
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin lanegraph-bench -- [OPTIONS] <POINTS_PATH>
//! ```
//!
//! Log output goes to stderr and is controlled by `RUST_LOG`.

#![allow(clippy::print_stdout, clippy::print_stderr)]

mod points;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use lanegraph_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use lanegraph_pipeline::{CenterlineStrategy, PipelineConfig, SmootherKind, UnmatchedPolicy};
use tracing_subscriber::EnvFilter;

/// Lane topology reconstruction and diagnostics for lanegraph.
///
/// Runs the pipeline on a point file with configurable parameters and
/// prints per-stage timing and count diagnostics.
#[derive(Parser)]
#[command(name = "lanegraph-bench", version)]
struct Cli {
    /// Path to the input points (JSON `[[x, y], ...]`, `{"points": ...}`,
    /// or `x,y` lines).
    points_path: PathBuf,

    /// DBSCAN neighbourhood radius.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLUSTER_RADIUS)]
    cluster_radius: f64,

    /// DBSCAN core-point threshold (the point itself included).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CLUSTER_MIN_SAMPLES, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    cluster_min_samples: usize,

    /// Endpoint distance under which collinear fragments merge.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MERGE_PROXIMITY)]
    merge_proximity: f64,

    /// Greedy merge passes.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MERGE_MAX_PASSES, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    merge_max_passes: u32,

    /// Maximum distance to a boundary match candidate.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MAX_MATCH_DISTANCE)]
    max_match_distance: f64,

    /// Score weight given to parallelism (distance gets the rest).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_PARALLELISM_WEIGHT)]
    parallelism_weight: f64,

    /// Drop points without a match candidate instead of failing.
    #[arg(long)]
    skip_unmatched: bool,

    /// Boundary smoother.
    #[arg(long, value_enum, default_value_t = Smoother::Passthrough)]
    smoother: Smoother,

    /// Centerline construction strategy.
    #[arg(long, value_enum, default_value_t = Centerline::PairsMiddle)]
    centerline: Centerline,

    /// Samples per centerline (parametric and perpendicular strategies).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CENTERLINE_SAMPLES, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(2..))]
    centerline_samples: usize,

    /// Distance under which lane endpoints group into a node.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_NODE_MERGE_DISTANCE)]
    node_merge_distance: f64,

    /// Minimum centerline length for a lane to take part in a node.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_MIN_LANE_LENGTH)]
    min_lane_length: f64,

    /// Do not link lanes back to nearby nodes.
    #[arg(long)]
    no_link: bool,

    /// Write the result document (JSON) to this file.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Enable debug-level logging when `RUST_LOG` is unset.
    #[arg(long, short)]
    verbose: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// Missing fields take their default values.
    #[arg(long, conflicts_with = "config")]
    config_json: Option<String>,

    /// Full pipeline config read from a JSON file.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Boundary smoother selection.
#[derive(Clone, Copy, ValueEnum)]
enum Smoother {
    /// Leave boundaries untouched.
    Passthrough,
    /// Chaikin corner cutting.
    Chaikin,
    /// Ramer-Douglas-Peucker simplification.
    Simplify,
}

/// Centerline strategy selection.
#[derive(Clone, Copy, ValueEnum)]
enum Centerline {
    /// Midpoints of index-resampled boundaries.
    PairsMiddle,
    /// Average of two fitted Bezier curves.
    Parametric,
    /// Midpoints of perpendicular projections.
    Perpendicular,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` or `--config` is provided, the JSON is parsed
/// directly and all individual parameter flags are ignored. Otherwise,
/// a config is assembled from the individual flags.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    if let Some(ref json) = cli.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }
    if let Some(ref path) = cli.config {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Error reading {}: {e}", path.display()))?;
        return serde_json::from_str(&text)
            .map_err(|e| format!("Error parsing {}: {e}", path.display()));
    }

    Ok(PipelineConfig {
        cluster_radius: cli.cluster_radius,
        cluster_min_samples: cli.cluster_min_samples,
        merge_proximity: cli.merge_proximity,
        merge_max_passes: cli.merge_max_passes,
        max_match_distance: cli.max_match_distance,
        parallelism_weight: cli.parallelism_weight,
        unmatched_policy: if cli.skip_unmatched {
            UnmatchedPolicy::Skip
        } else {
            UnmatchedPolicy::Abort
        },
        smoother: match cli.smoother {
            Smoother::Passthrough => SmootherKind::Passthrough,
            Smoother::Chaikin => SmootherKind::Chaikin,
            Smoother::Simplify => SmootherKind::Simplify,
        },
        centerline_strategy: match cli.centerline {
            Centerline::PairsMiddle => CenterlineStrategy::PairsMiddle,
            Centerline::Parametric => CenterlineStrategy::Parametric,
            Centerline::Perpendicular => CenterlineStrategy::Perpendicular,
        },
        centerline_samples: cli.centerline_samples,
        node_merge_distance: cli.node_merge_distance,
        min_lane_length: cli.min_lane_length,
        link_nodes: !cli.no_link,
        ..PipelineConfig::default()
    })
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "lanegraph=debug"
    } else {
        "lanegraph=info"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let points = match std::fs::read_to_string(&cli.points_path)
        .map_err(|e| format!("Error reading {}: {e}", cli.points_path.display()))
        .and_then(|text| points::parse_points(&text))
    {
        Ok(points) => points,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!(
        "Points: {} ({} points)",
        cli.points_path.display(),
        points.len(),
    );
    eprintln!("Config: {config:#?}");
    tracing::debug!(points = points.len(), runs = cli.runs, "starting benchmark");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        match lanegraph_pipeline::diagnostics::process_staged_with_diagnostics(
            points.clone(),
            &config,
            &StdClock,
        ) {
            Ok((result, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write the document on the first run only.
                if run == 0
                    && let Some(ref output) = cli.output
                {
                    let document = match lanegraph_export::to_json_pretty(&result) {
                        Ok(document) => document,
                        Err(e) => {
                            eprintln!("Error serializing result document: {e}");
                            return ExitCode::FAILURE;
                        }
                    };
                    match std::fs::write(output, &document) {
                        Ok(()) => {
                            eprintln!(
                                "Result document written to {} ({} bytes)",
                                output.display(),
                                document.len(),
                            );
                        }
                        Err(e) => {
                            eprintln!("Error writing {}: {e}", output.display());
                        }
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
    debug_assert!(!all_diagnostics.is_empty(), "no diagnostics to summarize");

    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    let Some(first) = all_diagnostics.first() else {
        println!("Warning: no diagnostics to summarize");
        return;
    };

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    for (index, (name, _)) in first.stages().iter().enumerate() {
        let stage_total: f64 = all_diagnostics
            .iter()
            .map(|d| d.stages()[index].1.duration.as_secs_f64() * 1000.0)
            .sum();
        let stage_mean = stage_total / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}
