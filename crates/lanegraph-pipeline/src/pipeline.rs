//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::process`] which runs the entire pipeline in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use lanegraph_pipeline::{Pipeline, PipelineConfig, PipelineError, Point};
//! # fn run(points: Vec<Point>) -> Result<(), PipelineError> {
//! let config = PipelineConfig::default();
//! let pipeline = Pipeline::new(points, config)
//!     .cluster()?
//!     .merge()
//!     .pair()?
//!     .order()
//!     .smooth()
//!     .build_centerlines()
//!     .synthesize_nodes();
//!
//! let result = pipeline.into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages). Stages keep the merged fragments
//! and the current topology; earlier intermediates are dropped once
//! the next stage no longer needs them.

use crate::centerline::CenterlineStats;
use crate::cluster::Clustering;
use crate::diagnostics::StageMetrics;
use crate::matching::MatchOutcome;
use crate::merge::MergeOutcome;
use crate::smooth::{Smoother, smooth_boundaries};
use crate::types::{
    Fragment, IntersectionNode, PipelineConfig, PipelineError, Point, Topology, TopologyResult,
};

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`cluster`](Self::cluster) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .cluster() to continue"]
pub struct Pending {
    config: PipelineConfig,
    points: Vec<Point>,
}

impl Pending {
    /// The raw input points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Validate the configuration and cluster the input points.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::EmptyInput`] for an empty point list,
    /// [`PipelineError::InvalidConfig`] when validation fails,
    /// [`PipelineError::NonFiniteInput`] for a NaN or infinite
    /// coordinate, and [`PipelineError::NoFragments`] when every point
    /// is noise.
    pub fn cluster(self) -> Result<Clustered, PipelineError> {
        if self.points.is_empty() {
            return Err(PipelineError::EmptyInput);
        }
        self.config.validate()?;
        check_finite(&self.points)?;
        let clustering = crate::cluster::cluster_points(
            &self.points,
            self.config.cluster_radius,
            self.config.cluster_min_samples,
        );
        if clustering.fragments.is_empty() {
            return Err(PipelineError::NoFragments);
        }
        tracing::debug!(
            input = self.points.len(),
            fragments = clustering.fragments.len(),
            noise = clustering.noise_count,
            duplicates = clustering.duplicate_count,
            "clustered points"
        );
        Ok(Clustered {
            config: self.config,
            input_count: self.points.len(),
            clustering,
        })
    }
}

// ───────────────────────── Stage 1: Clustered ────────────────────────

/// Pipeline state after density clustering.
///
/// Call [`merge`](Self::merge) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .merge() to continue"]
pub struct Clustered {
    config: PipelineConfig,
    input_count: usize,
    clustering: Clustering,
}

impl Clustered {
    /// Fragments as produced by clustering.
    #[must_use]
    pub fn fragments(&self) -> &[Fragment] {
        &self.clustering.fragments
    }

    /// Merge collinear, touching fragments.
    pub fn merge(self) -> Merged {
        let clustered_count = self.clustering.fragments.len();
        let outcome = crate::merge::merge_fragments(
            self.clustering.fragments,
            self.config.merge_proximity,
            self.config.merge_collinearity,
            self.config.merge_max_passes,
        );
        tracing::debug!(
            before = clustered_count,
            after = outcome.fragments.len(),
            merges = outcome.merges.len(),
            "merged fragments"
        );
        Merged {
            config: self.config,
            clustered_count,
            outcome,
        }
    }
}

// ───────────────────────── Stage 2: Merged ───────────────────────────

/// Pipeline state after fragment merging.
///
/// Call [`pair`](Self::pair) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .pair() to continue"]
pub struct Merged {
    config: PipelineConfig,
    clustered_count: usize,
    outcome: MergeOutcome,
}

impl Merged {
    /// Surviving fragments, ascending by id.
    #[must_use]
    pub fn fragments(&self) -> &[Fragment] {
        &self.outcome.fragments
    }

    /// Match every fragment point to build boundaries and lanes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoMatch`] when a point has no candidate
    /// and the configuration asks to abort.
    pub fn pair(self) -> Result<Paired, PipelineError> {
        let matched = crate::matching::match_boundaries(&self.outcome.fragments, &self.config)?;
        Ok(Paired {
            config: self.config,
            fragments: self.outcome.fragments,
            matched,
        })
    }
}

// ───────────────────────── Stage 3: Paired ───────────────────────────

/// Pipeline state after boundary matching. Boundary coordinates are
/// still unordered.
///
/// Call [`order`](Self::order) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .order() to continue"]
pub struct Paired {
    config: PipelineConfig,
    fragments: Vec<Fragment>,
    matched: MatchOutcome,
}

impl Paired {
    /// Boundaries and lanes as matched.
    #[must_use]
    pub const fn topology(&self) -> &Topology {
        &self.matched.topology
    }

    /// Order each boundary into a polyline.
    pub fn order(self) -> Ordered {
        let mut topology = self.matched.topology;
        crate::order::order_boundaries(&mut topology);
        Ordered {
            config: self.config,
            fragments: self.fragments,
            topology,
        }
    }
}

// ───────────────────────── Stage 4: Ordered ──────────────────────────

/// Pipeline state after path ordering.
///
/// Call [`smooth`](Self::smooth) or [`smooth_with`](Self::smooth_with)
/// to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing; call .smooth() to continue"]
pub struct Ordered {
    config: PipelineConfig,
    fragments: Vec<Fragment>,
    topology: Topology,
}

impl Ordered {
    /// Boundaries ordered into polylines.
    #[must_use]
    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Smooth boundaries with the configured built-in smoother.
    pub fn smooth(self) -> Smoothed {
        let smoother = self.config.smoother;
        let name = smoother.to_string();
        self.smooth_named(&smoother, name)
    }

    /// Smooth boundaries with a caller-supplied smoother.
    pub fn smooth_with<S: Smoother + ?Sized>(self, smoother: &S) -> Smoothed {
        self.smooth_named(smoother, "Custom".to_string())
    }

    fn smooth_named<S: Smoother + ?Sized>(self, smoother: &S, strategy: String) -> Smoothed {
        let smoothed = smooth_boundaries(&self.topology, smoother, &self.config);
        Smoothed {
            config: self.config,
            fragments: self.fragments,
            ordered: self.topology,
            topology: smoothed,
            strategy,
        }
    }
}

// ───────────────────────── Stage 5: Smoothed ─────────────────────────

/// Pipeline state after boundary smoothing.
///
/// Call [`build_centerlines`](Self::build_centerlines) to advance to the
/// next stage.
#[must_use = "pipeline stages are consumed by advancing; call .build_centerlines() to continue"]
pub struct Smoothed {
    config: PipelineConfig,
    fragments: Vec<Fragment>,
    ordered: Topology,
    topology: Topology,
    strategy: String,
}

impl Smoothed {
    /// Boundaries after smoothing.
    #[must_use]
    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Compute a centerline for every lane with two usable boundaries.
    pub fn build_centerlines(self) -> CenterlinesBuilt {
        let mut topology = self.topology;
        let stats = crate::centerline::build_centerlines(&mut topology, &self.config);
        tracing::debug!(
            built = stats.built,
            missing = stats.missing_boundaries,
            degenerate = stats.degenerate_boundaries,
            "centerlines built"
        );
        CenterlinesBuilt {
            config: self.config,
            fragments: self.fragments,
            topology,
            stats,
        }
    }
}

// ───────────────────────── Stage 6: CenterlinesBuilt ─────────────────

/// Pipeline state after centerline construction.
///
/// Call [`synthesize_nodes`](Self::synthesize_nodes) to advance to the
/// next stage.
#[must_use = "pipeline stages are consumed by advancing; call .synthesize_nodes() to continue"]
pub struct CenterlinesBuilt {
    config: PipelineConfig,
    fragments: Vec<Fragment>,
    topology: Topology,
    stats: CenterlineStats,
}

impl CenterlinesBuilt {
    /// Lanes with their centerlines.
    #[must_use]
    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Group lane endpoints into intersection nodes and, when enabled,
    /// link lanes back to them.
    pub fn synthesize_nodes(self) -> Synthesized {
        let mut topology = self.topology;
        let endpoints = crate::nodes::prepare_endpoints(&topology);
        let eligible_count = endpoints
            .iter()
            .filter(|e| e.lane_length > self.config.min_lane_length)
            .count();
        let nodes = crate::nodes::synthesize_nodes(
            &endpoints,
            self.config.node_merge_distance,
            self.config.min_lane_length,
        );
        let link_count = if self.config.link_nodes {
            crate::nodes::link_lanes(&mut topology, &nodes, self.config.node_link_distance)
        } else {
            0
        };
        Synthesized {
            config: self.config,
            fragments: self.fragments,
            topology,
            nodes,
            endpoint_count: endpoints.len(),
            eligible_count,
            link_count,
        }
    }
}

// ───────────────────────── Stage 7: Synthesized ──────────────────────

/// Pipeline state after node synthesis, the final stage.
///
/// Call [`into_result`](Self::into_result) to extract the
/// [`TopologyResult`].
#[must_use = "call .into_result() to extract the TopologyResult"]
pub struct Synthesized {
    config: PipelineConfig,
    fragments: Vec<Fragment>,
    topology: Topology,
    nodes: Vec<IntersectionNode>,
    endpoint_count: usize,
    eligible_count: usize,
    link_count: usize,
}

impl Synthesized {
    /// Final topology, lanes linked to nodes.
    #[must_use]
    pub const fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Synthesized intersection nodes.
    #[must_use]
    pub fn nodes(&self) -> &[IntersectionNode] {
        &self.nodes
    }

    /// Consume the pipeline and return the [`TopologyResult`].
    #[must_use]
    pub fn into_result(self) -> TopologyResult {
        TopologyResult {
            fragments: self.fragments,
            topology: self.topology,
            nodes: self.nodes,
        }
    }
}

// ──────────────────── PipelineStage trait + Stage enum ────────────────

/// Total number of stages in the pipeline.
pub const STAGE_COUNT: usize = 8;

/// The output produced by a single pipeline stage.
///
/// Each variant borrows the data that the corresponding stage computed.
#[must_use]
pub enum StageOutput<'a> {
    /// Raw input points.
    Source {
        /// The unprocessed points.
        points: &'a [Point],
    },
    /// Density clusters.
    Clustered {
        /// One fragment per cluster.
        fragments: &'a [Fragment],
    },
    /// Fragments after merging.
    Merged {
        /// Surviving fragments.
        fragments: &'a [Fragment],
    },
    /// Matched, unordered boundaries and lanes.
    Paired {
        /// The matched topology.
        topology: &'a Topology,
    },
    /// Ordered boundaries.
    Ordered {
        /// The ordered topology.
        topology: &'a Topology,
    },
    /// Smoothed boundaries.
    Smoothed {
        /// The smoothed topology.
        topology: &'a Topology,
    },
    /// Lanes with centerlines.
    CenterlinesBuilt {
        /// The topology with centerlines.
        topology: &'a Topology,
    },
    /// Final topology and nodes.
    Synthesized {
        /// The final topology.
        topology: &'a Topology,
        /// Synthesized intersection nodes.
        nodes: &'a [IntersectionNode],
    },
}

/// Trait implemented by every pipeline stage, enabling uniform iteration.
///
/// Both the typed API (individual stage structs) and the dynamic API
/// ([`Stage`] enum) are available. Each stage struct implements this
/// trait and [`Stage`] delegates to whichever variant it holds.
///
/// ```rust
/// # use lanegraph_pipeline::{Pipeline, PipelineConfig, PipelineError, Point};
/// # use lanegraph_pipeline::pipeline::{Stage, Advance};
/// # fn run(points: Vec<Point>) -> Result<(), PipelineError> {
/// let mut stage: Stage = Pipeline::new(points, PipelineConfig::default()).into();
/// loop {
///     match stage.advance()? {
///         Advance::Next(next) => stage = next,
///         Advance::Complete(done) => { stage = done; break; }
///     }
/// }
/// let result = stage.complete()?;
/// # Ok(())
/// # }
/// ```
pub trait PipelineStage: Sized {
    /// Short name of this stage (e.g. `"cluster"`, `"nodes"`).
    const NAME: &str;

    /// Zero-based index of this stage (`0` for Pending through `7` for
    /// Synthesized).
    const INDEX: usize;

    /// The output this stage produced.
    fn output(&self) -> StageOutput<'_>;

    /// Stage-specific metrics for diagnostics.
    ///
    /// `None` for [`Pending`], which has not processed anything yet.
    fn metrics(&self) -> Option<StageMetrics>;

    /// Advance to the next stage.
    ///
    /// Returns `Ok(Some(stage))` on success or `Ok(None)` if already at
    /// the final stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the stage transition fails.
    fn next(self) -> Result<Option<Stage>, PipelineError>;

    /// Run all remaining stages and return the final [`TopologyResult`].
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    fn complete(self) -> Result<TopologyResult, PipelineError>;
}

impl PipelineStage for Pending {
    const NAME: &str = "source";
    const INDEX: usize = 0;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Source {
            points: &self.points,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        None
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Clustered(self.cluster()?)))
    }

    fn complete(self) -> Result<TopologyResult, PipelineError> {
        self.cluster()?.complete()
    }
}

impl PipelineStage for Clustered {
    const NAME: &str = "cluster";
    const INDEX: usize = 1;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Clustered {
            fragments: &self.clustering.fragments,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Cluster {
            radius: self.config.cluster_radius,
            min_samples: self.config.cluster_min_samples,
            input_points: self.input_count,
            fragment_count: self.clustering.fragments.len(),
            noise_points: self.clustering.noise_count,
            duplicate_points: self.clustering.duplicate_count,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Merged(self.merge())))
    }

    fn complete(self) -> Result<TopologyResult, PipelineError> {
        self.merge().complete()
    }
}

impl PipelineStage for Merged {
    const NAME: &str = "merge";
    const INDEX: usize = 2;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Merged {
            fragments: &self.outcome.fragments,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Merge {
            fragments_before: self.clustered_count,
            fragments_after: self.outcome.fragments.len(),
            merge_count: self.outcome.merges.len(),
            passes: self.outcome.passes,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Paired(self.pair()?)))
    }

    fn complete(self) -> Result<TopologyResult, PipelineError> {
        self.pair()?.complete()
    }
}

impl PipelineStage for Paired {
    const NAME: &str = "pair";
    const INDEX: usize = 3;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Paired {
            topology: &self.matched.topology,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Pair {
            max_distance: self.config.max_match_distance,
            boundary_count: self.matched.topology.boundaries.len(),
            lane_count: self.matched.topology.lanes.len(),
            paired_points: self.matched.paired_points,
            shared_points: self.matched.shared_points,
            skipped_points: self.matched.skipped_points,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Ordered(self.order())))
    }

    fn complete(self) -> Result<TopologyResult, PipelineError> {
        self.order().complete()
    }
}

impl PipelineStage for Ordered {
    const NAME: &str = "order";
    const INDEX: usize = 4;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Ordered {
            topology: &self.topology,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn metrics(&self) -> Option<StageMetrics> {
        let lengths: Vec<f64> = self
            .topology
            .boundaries
            .values()
            .map(|b| b.coordinates.arc_length())
            .collect();
        let mean_boundary_length = if lengths.is_empty() {
            0.0
        } else {
            lengths.iter().sum::<f64>() / lengths.len() as f64
        };
        Some(StageMetrics::Order {
            boundary_count: self.topology.boundaries.len(),
            point_count: self.topology.total_boundary_points(),
            mean_boundary_length,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Smoothed(self.smooth())))
    }

    fn complete(self) -> Result<TopologyResult, PipelineError> {
        self.smooth().complete()
    }
}

impl PipelineStage for Smoothed {
    const NAME: &str = "smooth";
    const INDEX: usize = 5;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Smoothed {
            topology: &self.topology,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Smooth {
            strategy: self.strategy.clone(),
            points_before: self.ordered.total_boundary_points(),
            points_after: self.topology.total_boundary_points(),
            mean_endpoint_shift: crate::smooth::endpoint_shift(&self.ordered, &self.topology),
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::CenterlinesBuilt(self.build_centerlines())))
    }

    fn complete(self) -> Result<TopologyResult, PipelineError> {
        self.build_centerlines().complete()
    }
}

impl PipelineStage for CenterlinesBuilt {
    const NAME: &str = "centerlines";
    const INDEX: usize = 6;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::CenterlinesBuilt {
            topology: &self.topology,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Centerlines {
            strategy: self.config.centerline_strategy.to_string(),
            lane_count: self.topology.lanes.len(),
            built: self.stats.built,
            missing_boundaries: self.stats.missing_boundaries,
            degenerate_boundaries: self.stats.degenerate_boundaries,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(Some(Stage::Synthesized(self.synthesize_nodes())))
    }

    fn complete(self) -> Result<TopologyResult, PipelineError> {
        Ok(self.synthesize_nodes().into_result())
    }
}

impl PipelineStage for Synthesized {
    const NAME: &str = "nodes";
    const INDEX: usize = 7;

    fn output(&self) -> StageOutput<'_> {
        StageOutput::Synthesized {
            topology: &self.topology,
            nodes: &self.nodes,
        }
    }

    fn metrics(&self) -> Option<StageMetrics> {
        Some(StageMetrics::Nodes {
            endpoint_count: self.endpoint_count,
            eligible_endpoints: self.eligible_count,
            node_count: self.nodes.len(),
            connection_count: self.nodes.iter().map(|n| n.connections.len()).sum(),
            link_count: self.link_count,
        })
    }

    fn next(self) -> Result<Option<Stage>, PipelineError> {
        Ok(None)
    }

    fn complete(self) -> Result<TopologyResult, PipelineError> {
        Ok(self.into_result())
    }
}

/// Enum wrapping all pipeline stages for uniform, loopable access.
///
/// Use [`From`] conversions to enter the dynamic API from any typed
/// stage, then call [`advance`](Self::advance) in a loop.
#[must_use]
pub enum Stage {
    /// See [`Pending`].
    Pending(Pending),
    /// See [`Clustered`].
    Clustered(Clustered),
    /// See [`Merged`].
    Merged(Merged),
    /// See [`Paired`].
    Paired(Paired),
    /// See [`Ordered`].
    Ordered(Ordered),
    /// See [`Smoothed`].
    Smoothed(Smoothed),
    /// See [`CenterlinesBuilt`].
    CenterlinesBuilt(CenterlinesBuilt),
    /// See [`Synthesized`].
    Synthesized(Synthesized),
}

/// Compile-time guard: adding a [`Stage`] variant makes this match
/// non-exhaustive until [`STAGE_COUNT`] is revisited.
#[allow(dead_code, clippy::match_same_arms)]
const fn _stage_count_guard(s: &Stage) {
    match s {
        Stage::Pending(_)
        | Stage::Clustered(_)
        | Stage::Merged(_)
        | Stage::Paired(_)
        | Stage::Ordered(_)
        | Stage::Smoothed(_)
        | Stage::CenterlinesBuilt(_)
        | Stage::Synthesized(_) => {}
    }
}

/// Result of [`Stage::advance`]: either the next stage or the
/// completed final stage returned unchanged.
#[must_use]
pub enum Advance {
    /// The pipeline advanced to this next stage.
    Next(Stage),
    /// The pipeline was already at the final stage; returned unchanged.
    Complete(Stage),
}

/// Delegate a method call to whichever `Stage` variant is active.
macro_rules! delegate {
    ($self:ident, $method:ident $(, $arg:expr)*) => {
        match $self {
            Self::Pending(s) => s.$method($($arg),*),
            Self::Clustered(s) => s.$method($($arg),*),
            Self::Merged(s) => s.$method($($arg),*),
            Self::Paired(s) => s.$method($($arg),*),
            Self::Ordered(s) => s.$method($($arg),*),
            Self::Smoothed(s) => s.$method($($arg),*),
            Self::CenterlinesBuilt(s) => s.$method($($arg),*),
            Self::Synthesized(s) => s.$method($($arg),*),
        }
    };
}

impl Stage {
    /// Short name of the current stage.
    #[must_use]
    pub fn name(&self) -> &'static str {
        delegate!(self, name)
    }

    /// Zero-based index of the current stage.
    #[must_use]
    pub fn index(&self) -> usize {
        delegate!(self, index)
    }

    /// The output this stage produced.
    pub fn output(&self) -> StageOutput<'_> {
        delegate!(self, output)
    }

    /// Stage-specific metrics for diagnostics.
    #[must_use]
    pub fn metrics(&self) -> Option<StageMetrics> {
        delegate!(self, metrics)
    }

    /// Whether the pipeline is at the final stage.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Synthesized(_))
    }

    /// Advance to the next stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn next(self) -> Result<Option<Self>, PipelineError> {
        delegate!(self, next)
    }

    /// Advance to the next stage, returning `self` unchanged if
    /// already complete.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a fallible stage transition fails.
    pub fn advance(self) -> Result<Advance, PipelineError> {
        if self.is_complete() {
            return Ok(Advance::Complete(self));
        }
        match self.next()? {
            Some(next) => Ok(Advance::Next(next)),
            None => Err(PipelineError::InvalidConfig(
                "non-final stage produced no successor".to_string(),
            )),
        }
    }

    /// Run all remaining stages to completion.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if any remaining fallible stage fails.
    pub fn complete(self) -> Result<TopologyResult, PipelineError> {
        delegate!(self, complete)
    }
}

// Lets the macro call `.name()` / `.index()` on `&self`; associated
// constants are not reachable as `self.NAME`.
trait StageMetadata {
    fn name(&self) -> &'static str;
    fn index(&self) -> usize;
}

impl<T: PipelineStage> StageMetadata for T {
    fn name(&self) -> &'static str {
        T::NAME
    }

    fn index(&self) -> usize {
        T::INDEX
    }
}

macro_rules! stage_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Stage {
                fn from(s: $variant) -> Self {
                    Self::$variant(s)
                }
            }
        )*
    };
}

stage_from!(
    Pending,
    Clustered,
    Merged,
    Paired,
    Ordered,
    Smoothed,
    CenterlinesBuilt,
    Synthesized,
);

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental lane topology pipeline.
///
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order.
pub struct Pipeline;

impl Pipeline {
    /// Create a new pipeline from raw points and config.
    ///
    /// Nothing is validated or processed until
    /// [`.cluster()`](Pending::cluster).
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(points: Vec<Point>, config: PipelineConfig) -> Pending {
        Pending { config, points }
    }

    /// Start from already clustered fragments, skipping the density
    /// clustering stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] when validation fails,
    /// [`PipelineError::NoFragments`] for an empty fragment list, and
    /// [`PipelineError::NonFiniteInput`] for a NaN or infinite
    /// coordinate in any fragment.
    pub fn from_fragments(
        fragments: Vec<Fragment>,
        config: PipelineConfig,
    ) -> Result<Clustered, PipelineError> {
        config.validate()?;
        if fragments.is_empty() {
            return Err(PipelineError::NoFragments);
        }
        check_finite(fragments.iter().flat_map(|f| f.points.iter()))?;
        let input_count = fragments.iter().map(|f| f.points.len()).sum();
        Ok(Clustered {
            config,
            input_count,
            clustering: Clustering {
                fragments,
                noise_count: 0,
                duplicate_count: 0,
            },
        })
    }
}

/// Reject the first point with a NaN or infinite coordinate; the
/// spatial index cannot hold one.
fn check_finite<'a>(points: impl IntoIterator<Item = &'a Point>) -> Result<(), PipelineError> {
    match points.into_iter().position(|p| !p.is_finite()) {
        Some(index) => Err(PipelineError::NonFiniteInput { index }),
        None => Ok(()),
    }
}
