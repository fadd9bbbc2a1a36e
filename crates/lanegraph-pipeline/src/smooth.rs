//! Boundary smoothing between path ordering and centerline building.
//!
//! The pipeline treats smoothing as a pluggable collaborator: anything
//! implementing [`Smoother`] can be passed to
//! [`Ordered::smooth_with`](crate::pipeline::Ordered::smooth_with).
//! [`SmootherKind`] provides the built-in choices selectable from
//! [`PipelineConfig`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{Boundary, BoundaryKey, LaneKey, PipelineConfig, Point, Polyline, Topology};

/// What a [`Smoother`] may look at besides the polyline itself.
#[derive(Debug, Clone, Copy)]
pub struct SmoothingContext<'a> {
    /// Key of the boundary being smoothed.
    pub key: BoundaryKey,
    /// Lanes the boundary belongs to.
    pub lanes: &'a [LaneKey],
    /// The ordered, not yet smoothed, topology.
    pub topology: &'a Topology,
    /// Active configuration.
    pub config: &'a PipelineConfig,
}

impl<'a> SmoothingContext<'a> {
    /// Other boundaries sharing at least one lane with this one, i.e.
    /// the opposite side(s) of its lane(s).
    pub fn opposite_boundaries(&self) -> impl Iterator<Item = (&'a BoundaryKey, &'a Boundary)> {
        let key = self.key;
        let lanes = self.lanes;
        self.topology
            .boundaries
            .iter()
            .filter(move |(k, b)| **k != key && b.lanes.iter().any(|l| lanes.contains(l)))
    }
}

/// Trait for boundary smoothing strategies.
///
/// Input: one ordered boundary polyline. Output: its smoothed
/// replacement, also ordered from the same end.
pub trait Smoother {
    /// Smooth one boundary.
    fn smooth(&self, polyline: &Polyline, context: &SmoothingContext<'_>) -> Polyline;
}

/// Built-in smoothing strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SmootherKind {
    /// Leave boundaries untouched.
    #[default]
    Passthrough,

    /// Chaikin corner cutting, `chaikin_iterations` rounds.
    ///
    /// Each round replaces every segment with points at 1/4 and 3/4 of
    /// its length, keeping the two endpoints, so the point count grows
    /// to `2n` per round.
    Chaikin,

    /// Ramer-Douglas-Peucker with `smooth_simplify_tolerance`.
    Simplify,
}

impl fmt::Display for SmootherKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passthrough => f.write_str("Passthrough"),
            Self::Chaikin => f.write_str("Chaikin"),
            Self::Simplify => f.write_str("Simplify"),
        }
    }
}

impl Smoother for SmootherKind {
    fn smooth(&self, polyline: &Polyline, context: &SmoothingContext<'_>) -> Polyline {
        match *self {
            Self::Passthrough => polyline.clone(),
            Self::Chaikin => chaikin(polyline, context.config.chaikin_iterations),
            Self::Simplify => {
                crate::simplify::simplify(polyline, context.config.smooth_simplify_tolerance)
            }
        }
    }
}

/// Chaikin corner cutting. Polylines with fewer than 3 points are
/// returned unchanged.
#[must_use = "returns the smoothed polyline"]
pub fn chaikin(polyline: &Polyline, iterations: u32) -> Polyline {
    if polyline.len() < 3 {
        return polyline.clone();
    }
    let mut points = polyline.points().to_vec();
    for _ in 0..iterations {
        let mut refined = Vec::with_capacity(points.len() * 2);
        refined.extend(points.first().copied());
        for w in points.windows(2) {
            refined.push(w[0].lerp(w[1], 0.25));
            refined.push(w[0].lerp(w[1], 0.75));
        }
        refined.extend(points.last().copied());
        points = refined;
    }
    Polyline::new(points)
}

/// Apply `smoother` to every boundary of `topology`.
///
/// Every smoother sees the same pre-smoothing topology, so the result
/// does not depend on boundary iteration order.
pub fn smooth_boundaries<S: Smoother + ?Sized>(
    topology: &Topology,
    smoother: &S,
    config: &PipelineConfig,
) -> Topology {
    let boundaries = topology
        .boundaries
        .iter()
        .map(|(&key, boundary)| {
            let context = SmoothingContext {
                key,
                lanes: &boundary.lanes,
                topology,
                config,
            };
            let coordinates = smoother.smooth(&boundary.coordinates, &context);
            (
                key,
                Boundary {
                    coordinates,
                    lanes: boundary.lanes.clone(),
                },
            )
        })
        .collect();

    Topology {
        boundaries,
        lanes: topology.lanes.clone(),
    }
}

/// Mean distance a smoother moved endpoints, for diagnostics.
pub(crate) fn endpoint_shift(before: &Topology, after: &Topology) -> f64 {
    let shifts: Vec<f64> = before
        .boundaries
        .iter()
        .filter_map(|(key, b)| {
            let a = after.boundaries.get(key)?;
            let pair = |p: Option<&Point>, q: Option<&Point>| Some(p?.distance(*q?));
            Some(
                pair(b.coordinates.first(), a.coordinates.first())?
                    + pair(b.coordinates.last(), a.coordinates.last())?,
            )
        })
        .collect();
    if shifts.is_empty() {
        0.0
    } else {
        #[allow(clippy::cast_precision_loss)]
        let n = (shifts.len() * 2) as f64;
        shifts.iter().sum::<f64>() / n
    }
}
