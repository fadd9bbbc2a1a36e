//! Shared types for the lanegraph topology pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::centerline::CenterlineStrategy;
use crate::smooth::SmootherKind;

/// A 2D survey coordinate (projected metres or geographic degrees; the
/// pipeline never assumes a unit).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (easting / longitude).
    pub x: f64,
    /// Vertical position (northing / latitude).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Whether both coordinates are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Point halfway between `self` and `other`.
    #[must_use]
    pub fn midpoint(self, other: Self) -> Self {
        Self::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    /// Linear interpolation from `self` (`t = 0`) towards `other` (`t = 1`).
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        Self::new(
            (other.x - self.x).mul_add(t, self.x),
            (other.y - self.y).mul_add(t, self.y),
        )
    }

    /// Vector from `origin` to `self`.
    #[must_use]
    pub fn vector_from(self, origin: Self) -> Vector {
        Vector::new(self.x - origin.x, self.y - origin.y)
    }

    /// Bit-exact identity of this point, usable as a set/map key.
    #[must_use]
    pub fn key(self) -> PointKey {
        PointKey::from_point(self)
    }
}

/// Hashable identity of a [`Point`].
///
/// Coordinates are compared via their bit patterns. `-0.0` is folded
/// into `0.0` so the two zeros do not produce distinct keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointKey {
    x_bits: u64,
    y_bits: u64,
}

impl PointKey {
    /// Key for the given point.
    #[must_use]
    pub fn from_point(p: Point) -> Self {
        Self {
            x_bits: (p.x + 0.0).to_bits(),
            y_bits: (p.y + 0.0).to_bits(),
        }
    }
}

/// A 2D displacement, used for local directions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vector {
    /// Horizontal component.
    pub dx: f64,
    /// Vertical component.
    pub dy: f64,
}

impl Vector {
    /// Create a new vector.
    #[must_use]
    pub const fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(self) -> f64 {
        self.dx.hypot(self.dy)
    }

    /// Dot product.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.dx.mul_add(other.dx, self.dy * other.dy)
    }

    /// Unit vector in the same direction, or `None` for a zero-length
    /// (or non-finite) vector.
    #[must_use]
    pub fn normalized(self) -> Option<Self> {
        let len = self.length();
        if len > 0.0 && len.is_finite() {
            Some(Self::new(self.dx / len, self.dy / len))
        } else {
            None
        }
    }
}

/// A sequence of connected points.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyline(Vec<Point>);

impl Polyline {
    /// Create a new polyline from a vector of points.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polyline has no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of points in the polyline.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the first point, if any.
    #[must_use]
    pub fn first(&self) -> Option<&Point> {
        self.0.first()
    }

    /// Returns the last point, if any.
    #[must_use]
    pub fn last(&self) -> Option<&Point> {
        self.0.last()
    }

    /// Returns a slice of all points.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polyline and returns the underlying vector of points.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// Append a point at the end.
    pub fn push(&mut self, point: Point) {
        self.0.push(point);
    }

    /// Total length of all segments.
    #[must_use]
    pub fn arc_length(&self) -> f64 {
        self.0.windows(2).map(|w| w[0].distance(w[1])).sum()
    }
}

impl FromIterator<Point> for Polyline {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Density-cluster label identifying a fragment.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FragmentId(pub u32);

impl fmt::Display for FragmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A directional group of points sharing one cluster label.
///
/// Point order reflects clustering and merge history, not spatial
/// order. Local directions are taken from that storage order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Cluster label.
    pub id: FragmentId,
    /// Member points, deduplicated.
    pub points: Vec<Point>,
}

impl Fragment {
    /// Create a fragment.
    #[must_use]
    pub const fn new(id: FragmentId, points: Vec<Point>) -> Self {
        Self { id, points }
    }

    /// Local direction at `index`: forward difference at index 0,
    /// backward difference everywhere else.
    ///
    /// Returns `None` when the fragment has fewer than 2 points or
    /// `index` is out of range.
    #[must_use]
    pub fn direction_at(&self, index: usize) -> Option<Vector> {
        if self.points.len() < 2 || index >= self.points.len() {
            return None;
        }
        if index == 0 {
            Some(self.points[1].vector_from(self.points[0]))
        } else {
            Some(self.points[index].vector_from(self.points[index - 1]))
        }
    }

    /// Unit directions of the first and last segments, in that order.
    ///
    /// `None` for fragments with fewer than 2 points or a zero-length
    /// extremity segment.
    #[must_use]
    pub fn extremity_directions(&self) -> Option<(Vector, Vector)> {
        let n = self.points.len();
        if n < 2 {
            return None;
        }
        let start = self.points[1].vector_from(self.points[0]).normalized()?;
        let end = self.points[n - 1].vector_from(self.points[n - 2]).normalized()?;
        Some((start, end))
    }
}

/// Error returned when parsing a composite key from its text form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid composite key {0:?}")]
pub struct KeyParseError(pub String);

/// Parse `"[1, 2]"`-style integer lists.
fn parse_id_list(s: &str) -> Result<Vec<FragmentId>, KeyParseError> {
    let err = || KeyParseError(s.to_string());
    let inner = s
        .trim()
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(err)?;
    inner
        .split(',')
        .map(|part| part.trim().parse::<u32>().map(FragmentId).map_err(|_| err()))
        .collect()
}

/// Canonical lane identifier: the ascending pair of fragment ids the
/// lane lies between.
///
/// The only constructor sorts its inputs, so `{A, B}` and `{B, A}`
/// are the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LaneKey {
    low: FragmentId,
    high: FragmentId,
}

impl LaneKey {
    /// Key for the lane between fragments `a` and `b`.
    #[must_use]
    pub fn new(a: FragmentId, b: FragmentId) -> Self {
        Self {
            low: a.min(b),
            high: a.max(b),
        }
    }

    /// The smaller fragment id.
    #[must_use]
    pub const fn low(self) -> FragmentId {
        self.low
    }

    /// The larger fragment id.
    #[must_use]
    pub const fn high(self) -> FragmentId {
        self.high
    }

    /// Both ids as a raw integer pair.
    #[must_use]
    pub const fn ids(self) -> [u32; 2] {
        [self.low.0, self.high.0]
    }
}

impl fmt::Display for LaneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.low, self.high)
    }
}

impl FromStr for LaneKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_id_list(s)?.as_slice() {
            &[a, b] => Ok(Self::new(a, b)),
            _ => Err(KeyParseError(s.to_string())),
        }
    }
}

/// Identifier of one boundary: the fragment whose points it holds
/// (`owner`) and the fragment(s) those points were matched against.
///
/// The two sides of a lane are distinct boundaries: points of `A`
/// matched to `B` form `Pair { owner: A, partner: B }`, points of `B`
/// matched to `A` form `Pair { owner: B, partner: A }`. A boundary
/// shared by two lanes (the owner sits between `left` and `right`) is
/// `Shared`, with `left < right` always.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BoundaryKey {
    /// Boundary of a single lane.
    Pair {
        /// Fragment the boundary points belong to.
        owner: FragmentId,
        /// Fragment on the other side of the lane.
        partner: FragmentId,
    },
    /// Boundary shared by the lanes on both sides of `owner`.
    Shared {
        /// Smaller neighbouring fragment id.
        left: FragmentId,
        /// Fragment the boundary points belong to.
        owner: FragmentId,
        /// Larger neighbouring fragment id.
        right: FragmentId,
    },
}

impl BoundaryKey {
    /// Key for the points of `owner` matched against `partner`.
    #[must_use]
    pub const fn pair(owner: FragmentId, partner: FragmentId) -> Self {
        Self::Pair { owner, partner }
    }

    /// Key for the points of `owner` shared between the lanes towards
    /// `a` and `b` (given in any order).
    #[must_use]
    pub fn shared(owner: FragmentId, a: FragmentId, b: FragmentId) -> Self {
        Self::Shared {
            left: a.min(b),
            owner,
            right: a.max(b),
        }
    }

    /// Fragment whose points this boundary holds.
    #[must_use]
    pub const fn owner(self) -> FragmentId {
        match self {
            Self::Pair { owner, .. } | Self::Shared { owner, .. } => owner,
        }
    }

    /// Lane keys this boundary participates in (one or two).
    #[must_use]
    pub fn lanes(self) -> Vec<LaneKey> {
        match self {
            Self::Pair { owner, partner } => vec![LaneKey::new(owner, partner)],
            Self::Shared { left, owner, right } => {
                vec![LaneKey::new(owner, left), LaneKey::new(owner, right)]
            }
        }
    }
}

impl fmt::Display for BoundaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pair { owner, partner } => write!(f, "[{owner}, {partner}]"),
            Self::Shared { left, owner, right } => write!(f, "[{left}, {owner}, {right}]"),
        }
    }
}

impl FromStr for BoundaryKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match parse_id_list(s)?.as_slice() {
            &[owner, partner] => Ok(Self::pair(owner, partner)),
            &[a, owner, b] if a < b => Ok(Self::shared(owner, a, b)),
            _ => Err(KeyParseError(s.to_string())),
        }
    }
}

/// Serialize composite keys as their text form so they can be used as
/// JSON object keys.
macro_rules! string_key_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let text = String::deserialize(deserializer)?;
                text.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

string_key_serde!(LaneKey);
string_key_serde!(BoundaryKey);

/// One edge (left or right) of a lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    /// Unique coordinates. Unordered after matching, a walkable
    /// polyline after ordering.
    pub coordinates: Polyline,
    /// Lanes this boundary belongs to. Fixed when the boundary is
    /// first created.
    pub lanes: Vec<LaneKey>,
}

/// Reference to an [`IntersectionNode`] by its index in the node list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub usize);

/// A drivable corridor between two boundaries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lane {
    /// Centerline, once computed.
    pub centerline: Option<Polyline>,
    /// Intersection nodes this lane's endpoints were linked to.
    pub connected_nodes: Vec<NodeId>,
}

/// Link from an intersection node back to one lane endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    /// The lane whose endpoint joined the node.
    pub lane: LaneKey,
    /// Segment from the lane endpoint to the node centroid.
    pub line: [Point; 2],
}

/// Synthesized topology vertex where several lane endpoints converge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntersectionNode {
    /// Centroid of the grouped endpoints.
    pub location: Point,
    /// One record per grouped endpoint.
    pub connections: Vec<Connection>,
}

/// Boundaries and lanes produced by matching and refined by the later
/// stages. Ordered maps keep every downstream pass deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    /// All boundaries by key.
    pub boundaries: BTreeMap<BoundaryKey, Boundary>,
    /// All lanes by key.
    pub lanes: BTreeMap<LaneKey, Lane>,
}

impl Topology {
    /// Boundaries that list `lane` among their lanes, in key order.
    pub fn boundaries_of(&self, lane: LaneKey) -> impl Iterator<Item = (&BoundaryKey, &Boundary)> {
        self.boundaries
            .iter()
            .filter(move |(_, b)| b.lanes.contains(&lane))
    }

    /// Total number of boundary coordinates.
    #[must_use]
    pub fn total_boundary_points(&self) -> usize {
        self.boundaries.values().map(|b| b.coordinates.len()).sum()
    }
}

/// Result of running the full pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyResult {
    /// Fragments after merging, as fed to the matcher.
    pub fragments: Vec<Fragment>,
    /// Boundaries (ordered, smoothed) and lanes (with centerlines).
    pub topology: Topology,
    /// Synthesized intersection nodes.
    pub nodes: Vec<IntersectionNode>,
}

/// What the matcher does with a point that has no candidate within
/// `max_match_distance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnmatchedPolicy {
    /// Abort the run with [`PipelineError::NoMatch`].
    #[default]
    Abort,
    /// Drop the point and continue.
    Skip,
}

impl fmt::Display for UnmatchedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Abort => f.write_str("Abort"),
            Self::Skip => f.write_str("Skip"),
        }
    }
}

/// Configuration for the topology pipeline.
///
/// Defaults are tuned for geographic coordinates in degrees, where
/// lane markings sit a few metres (~0.00003°) apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// DBSCAN neighborhood radius.
    pub cluster_radius: f64,
    /// Minimum neighborhood size (the point itself included) for a
    /// DBSCAN core point.
    pub cluster_min_samples: usize,
    /// Maximum endpoint gap for merging two fragments.
    pub merge_proximity: f64,
    /// `|dot|` above which two extremity directions count as collinear.
    pub merge_collinearity: f64,
    /// Greedy merge passes. `1` is a single pass; larger values repeat
    /// until a pass merges nothing.
    pub merge_max_passes: u32,
    /// Maximum distance for a match candidate.
    pub max_match_distance: f64,
    /// Weight of parallelism in the match score; distance gets the rest.
    pub parallelism_weight: f64,
    /// Distance tolerance for recognizing a shared multi-lane boundary.
    pub ambiguity_distance_tolerance: f64,
    /// Parallelism tolerance for recognizing a shared multi-lane boundary.
    pub ambiguity_parallelism_tolerance: f64,
    /// Handling of points with no match candidate.
    pub unmatched_policy: UnmatchedPolicy,
    /// Built-in smoothing applied between ordering and centerlines.
    pub smoother: SmootherKind,
    /// Corner-cutting rounds for [`SmootherKind::Chaikin`].
    pub chaikin_iterations: u32,
    /// RDP tolerance for [`SmootherKind::Simplify`].
    pub smooth_simplify_tolerance: f64,
    /// Centerline construction strategy.
    pub centerline_strategy: CenterlineStrategy,
    /// Sample count for the parametric and perpendicular strategies.
    pub centerline_samples: usize,
    /// RDP tolerance applied before fitting the parametric curve.
    pub curve_fit_tolerance: f64,
    /// Maximum distance between lane endpoints grouped into one node.
    pub node_merge_distance: f64,
    /// Minimum centerline length for a lane's endpoints to form nodes.
    pub min_lane_length: f64,
    /// Whether to link lane endpoints back to nearby nodes.
    pub link_nodes: bool,
    /// Maximum endpoint-to-node distance for linking.
    pub node_link_distance: f64,
}

impl PipelineConfig {
    /// Default DBSCAN radius.
    pub const DEFAULT_CLUSTER_RADIUS: f64 = 0.000_025;
    /// Default DBSCAN minimum samples.
    pub const DEFAULT_CLUSTER_MIN_SAMPLES: usize = 3;
    /// Default merge proximity.
    pub const DEFAULT_MERGE_PROXIMITY: f64 = 0.000_03;
    /// Default collinearity threshold.
    pub const DEFAULT_MERGE_COLLINEARITY: f64 = 0.99;
    /// Default merge pass count.
    pub const DEFAULT_MERGE_MAX_PASSES: u32 = 1;
    /// Default maximum match distance.
    pub const DEFAULT_MAX_MATCH_DISTANCE: f64 = 0.000_25;
    /// Default parallelism weight.
    pub const DEFAULT_PARALLELISM_WEIGHT: f64 = 0.4;
    /// Default multi-lane distance tolerance.
    pub const DEFAULT_AMBIGUITY_DISTANCE_TOLERANCE: f64 = 0.000_02;
    /// Default multi-lane parallelism tolerance.
    pub const DEFAULT_AMBIGUITY_PARALLELISM_TOLERANCE: f64 = 0.01;
    /// Default Chaikin rounds.
    pub const DEFAULT_CHAIKIN_ITERATIONS: u32 = 5;
    /// Upper bound on Chaikin rounds; each round doubles the point count.
    pub const MAX_CHAIKIN_ITERATIONS: u32 = 16;
    /// Default smoothing simplification tolerance.
    pub const DEFAULT_SMOOTH_SIMPLIFY_TOLERANCE: f64 = 0.000_000_02;
    /// Default centerline sample count.
    pub const DEFAULT_CENTERLINE_SAMPLES: usize = 100;
    /// Default curve-fit simplification tolerance.
    pub const DEFAULT_CURVE_FIT_TOLERANCE: f64 = 0.000_000_001;
    /// Default node grouping distance.
    pub const DEFAULT_NODE_MERGE_DISTANCE: f64 = 0.000_08;
    /// Default minimum lane length for node eligibility.
    pub const DEFAULT_MIN_LANE_LENGTH: f64 = 0.000_08;
    /// Default node linking distance.
    pub const DEFAULT_NODE_LINK_DISTANCE: f64 = 0.000_03;

    /// Check every field for values the pipeline cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] naming the first
    /// offending field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let positive = [
            ("cluster_radius", self.cluster_radius),
            ("merge_proximity", self.merge_proximity),
            ("max_match_distance", self.max_match_distance),
            ("node_merge_distance", self.node_merge_distance),
            ("node_link_distance", self.node_link_distance),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be finite and positive, got {value}"
                )));
            }
        }

        let non_negative = [
            ("ambiguity_distance_tolerance", self.ambiguity_distance_tolerance),
            (
                "ambiguity_parallelism_tolerance",
                self.ambiguity_parallelism_tolerance,
            ),
            ("smooth_simplify_tolerance", self.smooth_simplify_tolerance),
            ("curve_fit_tolerance", self.curve_fit_tolerance),
            ("min_lane_length", self.min_lane_length),
        ];
        for (name, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be finite and non-negative, got {value}"
                )));
            }
        }

        let unit = [
            ("merge_collinearity", self.merge_collinearity),
            ("parallelism_weight", self.parallelism_weight),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        if self.cluster_min_samples == 0 {
            return Err(PipelineError::InvalidConfig(
                "cluster_min_samples must be at least 1".to_string(),
            ));
        }
        if self.merge_max_passes == 0 {
            return Err(PipelineError::InvalidConfig(
                "merge_max_passes must be at least 1".to_string(),
            ));
        }
        if self.chaikin_iterations > Self::MAX_CHAIKIN_ITERATIONS {
            return Err(PipelineError::InvalidConfig(format!(
                "chaikin_iterations must be at most {}, got {}",
                Self::MAX_CHAIKIN_ITERATIONS,
                self.chaikin_iterations
            )));
        }
        if self.centerline_samples < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "centerline_samples must be at least 2, got {}",
                self.centerline_samples
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            cluster_radius: Self::DEFAULT_CLUSTER_RADIUS,
            cluster_min_samples: Self::DEFAULT_CLUSTER_MIN_SAMPLES,
            merge_proximity: Self::DEFAULT_MERGE_PROXIMITY,
            merge_collinearity: Self::DEFAULT_MERGE_COLLINEARITY,
            merge_max_passes: Self::DEFAULT_MERGE_MAX_PASSES,
            max_match_distance: Self::DEFAULT_MAX_MATCH_DISTANCE,
            parallelism_weight: Self::DEFAULT_PARALLELISM_WEIGHT,
            ambiguity_distance_tolerance: Self::DEFAULT_AMBIGUITY_DISTANCE_TOLERANCE,
            ambiguity_parallelism_tolerance: Self::DEFAULT_AMBIGUITY_PARALLELISM_TOLERANCE,
            unmatched_policy: UnmatchedPolicy::default(),
            smoother: SmootherKind::default(),
            chaikin_iterations: Self::DEFAULT_CHAIKIN_ITERATIONS,
            smooth_simplify_tolerance: Self::DEFAULT_SMOOTH_SIMPLIFY_TOLERANCE,
            centerline_strategy: CenterlineStrategy::default(),
            centerline_samples: Self::DEFAULT_CENTERLINE_SAMPLES,
            curve_fit_tolerance: Self::DEFAULT_CURVE_FIT_TOLERANCE,
            node_merge_distance: Self::DEFAULT_NODE_MERGE_DISTANCE,
            min_lane_length: Self::DEFAULT_MIN_LANE_LENGTH,
            link_nodes: true,
            node_link_distance: Self::DEFAULT_NODE_LINK_DISTANCE,
        }
    }
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, Clone, PartialEq, thiserror::Error, Serialize, Deserialize)]
pub enum PipelineError {
    /// The input point list was empty.
    #[error("input point set is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// An input coordinate was NaN or infinite.
    #[error("input point {index} has a non-finite coordinate")]
    NonFiniteInput {
        /// Position of the offending point in the input (for fragments,
        /// counted across all fragment points in order).
        index: usize,
    },

    /// Clustering classified every point as noise.
    #[error("clustering produced no fragments (every point is noise)")]
    NoFragments,

    /// A point had no match candidate within `max_match_distance`.
    ///
    /// Signals that the clustering and matching thresholds do not suit
    /// the data.
    #[error("no match candidate within range for point ({x}, {y})")]
    NoMatch {
        /// Point x coordinate.
        x: f64,
        /// Point y coordinate.
        y: f64,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(n: u32) -> FragmentId {
        FragmentId(n)
    }

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_key_folds_negative_zero() {
        assert_eq!(Point::new(-0.0, 1.0).key(), Point::new(0.0, 1.0).key());
        assert_ne!(Point::new(0.1, 1.0).key(), Point::new(0.1, 1.000_000_1).key());
    }

    #[test]
    fn midpoint_of_identical_points_is_exact() {
        let p = Point::new(0.123_456_789, -7.654_321);
        assert_eq!(p.midpoint(p), p);
    }

    #[test]
    fn vector_normalized_rejects_zero() {
        assert!(Vector::new(0.0, 0.0).normalized().is_none());
        let unit = Vector::new(3.0, 4.0).normalized().unwrap();
        assert!((unit.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn polyline_arc_length() {
        let pl = Polyline::new(vec![
            Point::new(0.0, 0.0),
            Point::new(3.0, 4.0),
            Point::new(3.0, 6.0),
        ]);
        assert!((pl.arc_length() - 7.0).abs() < 1e-12);
        assert!(Polyline::default().arc_length().abs() < f64::EPSILON);
    }

    #[test]
    fn fragment_direction_forward_then_backward() {
        let f = Fragment::new(
            id(0),
            vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 2.0)],
        );
        assert_eq!(f.direction_at(0), Some(Vector::new(1.0, 0.0)));
        assert_eq!(f.direction_at(1), Some(Vector::new(1.0, 0.0)));
        assert_eq!(f.direction_at(2), Some(Vector::new(0.0, 2.0)));
        assert_eq!(f.direction_at(3), None);
    }

    #[test]
    fn single_point_fragment_has_no_direction() {
        let f = Fragment::new(id(0), vec![Point::new(0.0, 0.0)]);
        assert!(f.direction_at(0).is_none());
        assert!(f.extremity_directions().is_none());
    }

    #[test]
    fn extremity_directions_are_unit() {
        let f = Fragment::new(
            id(0),
            vec![Point::new(0.0, 0.0), Point::new(2.0, 0.0), Point::new(2.0, 5.0)],
        );
        let (start, end) = f.extremity_directions().unwrap();
        assert_eq!(start, Vector::new(1.0, 0.0));
        assert_eq!(end, Vector::new(0.0, 1.0));
    }

    #[test]
    fn lane_key_is_order_independent() {
        assert_eq!(LaneKey::new(id(5), id(2)), LaneKey::new(id(2), id(5)));
        let key = LaneKey::new(id(5), id(2));
        assert_eq!(key.ids(), [2, 5]);
        assert_eq!(key.to_string(), "[2, 5]");
    }

    #[test]
    fn lane_key_parses_text_form() {
        let key: LaneKey = "[7, 3]".parse().unwrap();
        assert_eq!(key, LaneKey::new(id(3), id(7)));
        assert!("[1, 2, 3]".parse::<LaneKey>().is_err());
        assert!("1, 2".parse::<LaneKey>().is_err());
        assert!("[a, 2]".parse::<LaneKey>().is_err());
    }

    #[test]
    fn shared_boundary_key_sorts_neighbours() {
        let key = BoundaryKey::shared(id(4), id(9), id(1));
        assert_eq!(
            key,
            BoundaryKey::Shared {
                left: id(1),
                owner: id(4),
                right: id(9)
            }
        );
        assert_eq!(key.to_string(), "[1, 4, 9]");
        assert_eq!(
            key.lanes(),
            vec![LaneKey::new(id(1), id(4)), LaneKey::new(id(4), id(9))]
        );
    }

    #[test]
    fn boundary_key_text_round_trip() {
        for key in [
            BoundaryKey::pair(id(3), id(1)),
            BoundaryKey::shared(id(2), id(0), id(5)),
        ] {
            let parsed: BoundaryKey = key.to_string().parse().unwrap();
            assert_eq!(parsed, key);
        }
        // Pair keys keep their owner-first order.
        assert_eq!(
            "[3, 1]".parse::<BoundaryKey>().unwrap().owner(),
            FragmentId(3)
        );
        // A triple must list its neighbours ascending.
        assert!("[5, 2, 0]".parse::<BoundaryKey>().is_err());
    }

    #[test]
    fn keys_serialize_as_json_object_keys() {
        let mut lanes = BTreeMap::new();
        lanes.insert(LaneKey::new(id(1), id(0)), Lane::default());
        let json = serde_json::to_string(&lanes).unwrap();
        assert!(json.starts_with("{\"[0, 1]\":"), "got {json}");
        let back: BTreeMap<LaneKey, Lane> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, lanes);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let bad = PipelineConfig {
            max_match_distance: 0.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(PipelineError::InvalidConfig(ref s)) if s.contains("max_match_distance")
        ));

        let bad = PipelineConfig {
            parallelism_weight: 1.5,
            ..PipelineConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = PipelineConfig {
            cluster_min_samples: 0,
            ..PipelineConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = PipelineConfig {
            centerline_samples: 1,
            ..PipelineConfig::default()
        };
        assert!(bad.validate().is_err());

        let bad = PipelineConfig {
            chaikin_iterations: 40,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(PipelineError::InvalidConfig(ref s)) if s.contains("chaikin_iterations")
        ));
        let edge = PipelineConfig {
            chaikin_iterations: PipelineConfig::MAX_CHAIKIN_ITERATIONS,
            ..PipelineConfig::default()
        };
        assert!(edge.validate().is_ok());
    }

    #[test]
    fn config_deserializes_partial_json() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"max_match_distance": 2.5, "link_nodes": false}"#).unwrap();
        assert!((config.max_match_distance - 2.5).abs() < f64::EPSILON);
        assert!(!config.link_nodes);
        assert_eq!(
            config.cluster_min_samples,
            PipelineConfig::DEFAULT_CLUSTER_MIN_SAMPLES
        );
    }

    #[test]
    fn error_display() {
        assert_eq!(
            PipelineError::EmptyInput.to_string(),
            "input point set is empty"
        );
        assert_eq!(
            PipelineError::NoMatch { x: 1.0, y: 2.0 }.to_string(),
            "no match candidate within range for point (1, 2)"
        );
    }

    #[test]
    fn pipeline_error_serde_round_trip() {
        let err = PipelineError::NoMatch { x: 0.5, y: -1.0 };
        let json = serde_json::to_string(&err).unwrap();
        let back: PipelineError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }
}
