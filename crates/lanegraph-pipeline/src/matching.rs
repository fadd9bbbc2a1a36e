//! Pair fragments into lane boundaries.
//!
//! Every point of every fragment is matched against the nearest point
//! of each other fragment. Candidates closer than `max_match_distance`
//! are scored by
//!
//! ```text
//! score = w * parallelism + (1 - w) * (1 - distance / max_match_distance)
//! ```
//!
//! where `parallelism = |dot(unit(dir_a), unit(dir_b))|` and `w` is
//! `parallelism_weight`. The best-scoring candidate's fragment becomes
//! the point's partner. When a later candidate from a different
//! fragment sits within the ambiguity tolerances of the current best
//! (both distance and parallelism), the point lies on a boundary shared
//! by two lanes and is registered under a [`BoundaryKey::Shared`] key.
//!
//! Matching is a pure reduction: all per-point decisions are computed
//! against the frozen fragment list first, then folded into the
//! [`Topology`] in fragment/point order.

use std::collections::{BTreeMap, HashSet};

use rstar::RTree;
use rstar::primitives::GeomWithData;
use tracing::{debug, warn};

use crate::types::{
    Boundary, BoundaryKey, Fragment, FragmentId, PipelineConfig, PipelineError, Point, PointKey,
    Polyline, Topology, UnmatchedPolicy, Vector,
};

/// A fragment point tagged with its storage index.
type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Output of [`match_boundaries`].
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    /// Boundaries and lanes, centerlines not yet computed.
    pub topology: Topology,
    /// Points assigned to a two-fragment boundary.
    pub paired_points: usize,
    /// Points assigned to a shared (three-fragment) boundary.
    pub shared_points: usize,
    /// Points dropped: no candidate under [`UnmatchedPolicy::Skip`], or
    /// their fragment has no direction.
    pub skipped_points: usize,
}

/// Matching decision for one point.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Assignment {
    point: Point,
    key: BoundaryKey,
}

/// A point of another fragment considered as a partner.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    fragment: FragmentId,
    distance: f64,
    direction: Vector,
}

#[derive(Debug, Clone, Copy)]
struct Best {
    fragment: FragmentId,
    score: f64,
    distance: f64,
    parallelism: f64,
}

/// Spatial index over one fragment.
struct FragmentIndex<'a> {
    fragment: &'a Fragment,
    tree: RTree<IndexedPoint>,
}

impl<'a> FragmentIndex<'a> {
    fn new(fragment: &'a Fragment) -> Self {
        let entries = fragment
            .points
            .iter()
            .enumerate()
            .map(|(i, p)| GeomWithData::new([p.x, p.y], i))
            .collect();
        Self {
            fragment,
            tree: RTree::bulk_load(entries),
        }
    }

    /// Nearest point of this fragment to `point`, with its local
    /// direction, if it lies closer than `max_distance`.
    fn candidate(&self, point: Point, max_distance: f64) -> Option<Candidate> {
        let nearest = self.tree.nearest_neighbor(&[point.x, point.y])?;
        let index = nearest.data;
        let distance = point.distance(self.fragment.points[index]);
        if distance >= max_distance {
            return None;
        }
        Some(Candidate {
            fragment: self.fragment.id,
            distance,
            direction: self.fragment.direction_at(index)?,
        })
    }
}

/// `|dot|` of the two unit directions; zero when either is degenerate.
fn parallelism(a: Vector, b: Vector) -> f64 {
    match (a.normalized(), b.normalized()) {
        (Some(a), Some(b)) => a.dot(b).abs(),
        _ => 0.0,
    }
}

/// Build boundaries and lanes from the merged fragments.
///
/// Fragments with fewer than 2 points have no direction: they are never
/// candidates and their own points are skipped.
///
/// # Errors
///
/// Returns [`PipelineError::NoMatch`] for the first point with no
/// candidate when `config.unmatched_policy` is
/// [`UnmatchedPolicy::Abort`].
pub fn match_boundaries(
    fragments: &[Fragment],
    config: &PipelineConfig,
) -> Result<MatchOutcome, PipelineError> {
    let mut ordered: Vec<&Fragment> = fragments.iter().collect();
    ordered.sort_by_key(|f| f.id);

    let indexes: Vec<FragmentIndex<'_>> = ordered
        .iter()
        .filter(|f| f.points.len() >= 2)
        .map(|f| FragmentIndex::new(f))
        .collect();

    let mut assignments = Vec::new();
    let mut skipped_points = 0;

    for fragment in &ordered {
        if fragment.points.len() < 2 {
            warn!(
                fragment = %fragment.id,
                points = fragment.points.len(),
                "fragment has no direction, skipping its points"
            );
            skipped_points += fragment.points.len();
            continue;
        }
        for (index, &point) in fragment.points.iter().enumerate() {
            match assign_point(fragment, index, point, &indexes, config)? {
                Some(assignment) => assignments.push(assignment),
                None => skipped_points += 1,
            }
        }
    }

    let shared_points = assignments
        .iter()
        .filter(|a| matches!(a.key, BoundaryKey::Shared { .. }))
        .count();
    let paired_points = assignments.len() - shared_points;
    let topology = fold_assignments(&assignments);

    debug!(
        boundaries = topology.boundaries.len(),
        lanes = topology.lanes.len(),
        paired_points,
        shared_points,
        skipped_points,
        "matching complete"
    );

    Ok(MatchOutcome {
        topology,
        paired_points,
        shared_points,
        skipped_points,
    })
}

/// Decide which boundary `point` (at `index` within `fragment`) joins.
///
/// `Ok(None)` means the point was dropped under
/// [`UnmatchedPolicy::Skip`].
fn assign_point(
    fragment: &Fragment,
    index: usize,
    point: Point,
    indexes: &[FragmentIndex<'_>],
    config: &PipelineConfig,
) -> Result<Option<Assignment>, PipelineError> {
    let Some(direction) = fragment.direction_at(index) else {
        return Ok(None);
    };

    let candidates = indexes
        .iter()
        .filter(|idx| idx.fragment.id != fragment.id)
        .filter_map(|idx| idx.candidate(point, config.max_match_distance));

    let weight = config.parallelism_weight;
    let mut best: Option<Best> = None;
    let mut shared: Option<(FragmentId, FragmentId)> = None;

    for candidate in candidates {
        let par = parallelism(direction, candidate.direction);
        let score = weight.mul_add(
            par,
            (1.0 - weight) * (1.0 - candidate.distance / config.max_match_distance),
        );
        match best {
            Some(b)
                if (candidate.distance - b.distance).abs() < config.ambiguity_distance_tolerance
                    && (par - b.parallelism).abs() < config.ambiguity_parallelism_tolerance
                    && candidate.fragment != b.fragment =>
            {
                shared = Some((b.fragment, candidate.fragment));
            }
            _ if best.is_none_or(|b| score > b.score) => {
                best = Some(Best {
                    fragment: candidate.fragment,
                    score,
                    distance: candidate.distance,
                    parallelism: par,
                });
            }
            _ => {}
        }
    }

    let Some(best) = best else {
        return match config.unmatched_policy {
            UnmatchedPolicy::Abort => Err(PipelineError::NoMatch {
                x: point.x,
                y: point.y,
            }),
            UnmatchedPolicy::Skip => {
                warn!(x = point.x, y = point.y, fragment = %fragment.id, "no match candidate, skipping point");
                Ok(None)
            }
        };
    };

    let key = match shared {
        Some((a, b)) => BoundaryKey::shared(fragment.id, a, b),
        None => BoundaryKey::pair(fragment.id, best.fragment),
    };
    Ok(Some(Assignment { point, key }))
}

/// Fold per-point decisions into boundaries and lanes.
///
/// A boundary's lane list is fixed by its key when first created;
/// appending a point already present is a no-op.
fn fold_assignments(assignments: &[Assignment]) -> Topology {
    let mut boundaries: BTreeMap<BoundaryKey, Boundary> = BTreeMap::new();
    let mut members: BTreeMap<BoundaryKey, HashSet<PointKey>> = BTreeMap::new();
    let mut topology = Topology::default();

    for assignment in assignments {
        let boundary = boundaries.entry(assignment.key).or_insert_with(|| Boundary {
            coordinates: Polyline::default(),
            lanes: assignment.key.lanes(),
        });
        if members
            .entry(assignment.key)
            .or_default()
            .insert(assignment.point.key())
        {
            boundary.coordinates.push(assignment.point);
        }
        for lane in assignment.key.lanes() {
            topology.lanes.entry(lane).or_default();
        }
    }

    topology.boundaries = boundaries;
    topology
}
