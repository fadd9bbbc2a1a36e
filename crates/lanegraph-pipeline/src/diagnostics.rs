//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! parameter tuning on real survey data. Every call to
//! [`process_staged_with_diagnostics`] collects them alongside the
//! pipeline result.
//!
//! Timestamps come from a caller-supplied [`Clock`] so the library
//! itself never reads the system time.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::{Pipeline, PipelineStage};
use crate::types::{PipelineConfig, PipelineError, Point, TopologyResult};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single pipeline run.
///
/// Each field captures metrics for one stage of the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: density clustering.
    pub cluster: StageDiagnostics,
    /// Stage 2: fragment merging.
    pub merge: StageDiagnostics,
    /// Stage 3: boundary matching.
    pub pair: StageDiagnostics,
    /// Stage 4: path ordering.
    pub order: StageDiagnostics,
    /// Stage 5: boundary smoothing.
    pub smooth: StageDiagnostics,
    /// Stage 6: centerline construction.
    pub centerlines: StageDiagnostics,
    /// Stage 7: intersection node synthesis.
    pub nodes: StageDiagnostics,
    /// Total wall-clock duration of the entire pipeline (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary counts across all stages.
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Density clustering metrics.
    Cluster {
        /// Neighbourhood radius.
        radius: f64,
        /// Minimum neighbourhood size of a core point.
        min_samples: usize,
        /// Points handed to the clusterer.
        input_points: usize,
        /// Clusters found.
        fragment_count: usize,
        /// Points in no cluster.
        noise_points: usize,
        /// Repeated coordinates dropped inside clusters.
        duplicate_points: usize,
    },
    /// Fragment merging metrics.
    Merge {
        /// Fragments entering the stage.
        fragments_before: usize,
        /// Fragments leaving the stage.
        fragments_after: usize,
        /// Pairwise merges performed.
        merge_count: usize,
        /// Passes run.
        passes: u32,
    },
    /// Boundary matching metrics.
    Pair {
        /// Candidate search radius.
        max_distance: f64,
        /// Distinct boundaries produced.
        boundary_count: usize,
        /// Distinct lanes produced.
        lane_count: usize,
        /// Points on two-fragment boundaries.
        paired_points: usize,
        /// Points on shared boundaries.
        shared_points: usize,
        /// Points dropped.
        skipped_points: usize,
    },
    /// Path ordering metrics.
    Order {
        /// Boundaries ordered.
        boundary_count: usize,
        /// Points across all boundaries.
        point_count: usize,
        /// Mean arc length of an ordered boundary.
        mean_boundary_length: f64,
    },
    /// Boundary smoothing metrics.
    Smooth {
        /// Smoother used.
        strategy: String,
        /// Boundary points before smoothing.
        points_before: usize,
        /// Boundary points after smoothing.
        points_after: usize,
        /// Mean distance boundary endpoints moved.
        mean_endpoint_shift: f64,
    },
    /// Centerline construction metrics.
    Centerlines {
        /// Strategy used.
        strategy: String,
        /// Lanes in the topology.
        lane_count: usize,
        /// Lanes that got a centerline.
        built: usize,
        /// Lanes without exactly two boundaries.
        missing_boundaries: usize,
        /// Lanes with a boundary under 2 points.
        degenerate_boundaries: usize,
    },
    /// Node synthesis metrics.
    Nodes {
        /// Centerline endpoints considered.
        endpoint_count: usize,
        /// Endpoints on lanes long enough to form nodes.
        eligible_endpoints: usize,
        /// Nodes created.
        node_count: usize,
        /// Lane connections across all nodes.
        connection_count: usize,
        /// Lane-to-node links added.
        link_count: usize,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSummary {
    /// Input point count.
    pub input_points: usize,
    /// Fragments after merging.
    pub fragment_count: usize,
    /// Boundaries in the final topology.
    pub boundary_count: usize,
    /// Lanes in the final topology.
    pub lane_count: usize,
    /// Lanes with a centerline.
    pub centerline_count: usize,
    /// Intersection nodes.
    pub node_count: usize,
}

impl PipelineDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!("Input: {} points", self.summary.input_points));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);

        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Fragments: {}  |  Boundaries: {}  |  Lanes: {} ({} with centerline)  |  Nodes: {}",
            self.summary.fragment_count,
            self.summary.boundary_count,
            self.summary.lane_count,
            self.summary.centerline_count,
            self.summary.node_count,
        ));

        lines.join("\n")
    }

    /// Display name and diagnostics of every stage, in pipeline order.
    #[must_use]
    pub fn stages(&self) -> [(&'static str, &StageDiagnostics); 7] {
        [
            ("Cluster", &self.cluster),
            ("Merge", &self.merge),
            ("Pair", &self.pair),
            ("Order", &self.order),
            ("Smooth", &self.smooth),
            ("Centerlines", &self.centerlines),
            ("Nodes", &self.nodes),
        ]
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Cluster {
            radius,
            min_samples,
            input_points,
            fragment_count,
            noise_points,
            duplicate_points,
        } => format!(
            "eps={radius:e} min={min_samples} {input_points} pts -> {fragment_count} fragments (noise={noise_points} dup={duplicate_points})",
        ),
        StageMetrics::Merge {
            fragments_before,
            fragments_after,
            merge_count,
            passes,
        } => format!(
            "{fragments_before}->{fragments_after} fragments, {merge_count} merges in {passes} passes",
        ),
        StageMetrics::Pair {
            max_distance,
            boundary_count,
            lane_count,
            paired_points,
            shared_points,
            skipped_points,
        } => format!(
            "max={max_distance:e} {boundary_count} boundaries, {lane_count} lanes (paired={paired_points} shared={shared_points} skipped={skipped_points})",
        ),
        StageMetrics::Order {
            boundary_count,
            point_count,
            mean_boundary_length,
        } => format!(
            "{boundary_count} boundaries, {point_count} pts (mean length={mean_boundary_length:e})",
        ),
        StageMetrics::Smooth {
            strategy,
            points_before,
            points_after,
            mean_endpoint_shift,
        } => format!(
            "{strategy} {points_before}->{points_after} pts (endpoint shift={mean_endpoint_shift:e})",
        ),
        StageMetrics::Centerlines {
            strategy,
            lane_count,
            built,
            missing_boundaries,
            degenerate_boundaries,
        } => format!(
            "{strategy} {built}/{lane_count} lanes (missing={missing_boundaries} degenerate={degenerate_boundaries})",
        ),
        StageMetrics::Nodes {
            endpoint_count,
            eligible_endpoints,
            node_count,
            connection_count,
            link_count,
        } => format!(
            "{eligible_endpoints}/{endpoint_count} endpoints -> {node_count} nodes, {connection_count} connections, {link_count} links",
        ),
    }
}

/// Time one stage transition, returning the new stage and its diagnostics.
fn timed<C, S, F>(clock: &C, step: F) -> Result<(S, StageDiagnostics), PipelineError>
where
    C: Clock,
    S: PipelineStage,
    F: FnOnce() -> Result<S, PipelineError>,
{
    let start = clock.now();
    let stage = step()?;
    let duration = clock.elapsed(&start);
    let metrics = stage.metrics().ok_or_else(|| {
        PipelineError::InvalidConfig(format!("stage {} reported no metrics", S::NAME))
    })?;
    Ok((stage, StageDiagnostics { duration, metrics }))
}

/// Run the full pipeline, collecting per-stage diagnostics.
///
/// # Errors
///
/// Same as [`crate::process`].
pub fn process_staged_with_diagnostics<C: Clock>(
    points: Vec<Point>,
    config: &PipelineConfig,
    clock: &C,
) -> Result<(TopologyResult, PipelineDiagnostics), PipelineError> {
    let input_points = points.len();
    let pipeline_start = clock.now();

    let (clustered, cluster) = timed(clock, || {
        Pipeline::new(points, config.clone()).cluster()
    })?;
    let (merged, merge) = timed(clock, || Ok(clustered.merge()))?;
    let (paired, pair) = timed(clock, || merged.pair())?;
    let (ordered, order) = timed(clock, || Ok(paired.order()))?;
    let (smoothed, smooth) = timed(clock, || Ok(ordered.smooth()))?;
    let (built, centerlines) = timed(clock, || Ok(smoothed.build_centerlines()))?;
    let (synthesized, nodes) = timed(clock, || Ok(built.synthesize_nodes()))?;

    let total_duration = clock.elapsed(&pipeline_start);
    let result = synthesized.into_result();

    let summary = PipelineSummary {
        input_points,
        fragment_count: result.fragments.len(),
        boundary_count: result.topology.boundaries.len(),
        lane_count: result.topology.lanes.len(),
        centerline_count: result
            .topology
            .lanes
            .values()
            .filter(|l| l.centerline.is_some())
            .count(),
        node_count: result.nodes.len(),
    };

    tracing::info!(
        fragments = summary.fragment_count,
        lanes = summary.lane_count,
        nodes = summary.node_count,
        duration_ms = duration_ms(total_duration),
        "pipeline finished"
    );

    Ok((
        result,
        PipelineDiagnostics {
            cluster,
            merge,
            pair,
            order,
            smooth,
            centerlines,
            nodes,
            total_duration,
            summary,
        },
    ))
}
