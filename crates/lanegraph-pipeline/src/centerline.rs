//! Lane centerlines from pairs of ordered boundaries.
//!
//! A lane gets a centerline only when exactly two boundaries list it
//! and both have at least 2 points. Anything else leaves
//! [`Lane::centerline`](crate::types::Lane) unset.

use std::fmt;

use geo::{Closest, ClosestPoint, LineString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::{LaneKey, PipelineConfig, Point, Polyline, Topology};

/// Selects how a centerline is derived from two boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CenterlineStrategy {
    /// Resample both boundaries to the longer one's point count by
    /// linear interpolation over normalized index position, then
    /// average corresponding samples.
    ///
    /// Exact for uniformly sampled boundaries and numerically stable on
    /// noisy ones.
    #[default]
    PairsMiddle,

    /// Simplify each boundary, use the remaining points as Bezier
    /// control points, and average both curves at `centerline_samples`
    /// matching parameters.
    Parametric,

    /// Sample the first boundary at `centerline_samples` evenly spaced
    /// arc-length fractions, project each sample onto the second
    /// boundary and take the midpoint.
    Perpendicular,
}

impl fmt::Display for CenterlineStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PairsMiddle => f.write_str("PairsMiddle"),
            Self::Parametric => f.write_str("Parametric"),
            Self::Perpendicular => f.write_str("Perpendicular"),
        }
    }
}

/// Trait for centerline construction strategies.
pub trait CenterlineBuilder {
    /// Centerline between two ordered boundaries, each with at least 2
    /// points.
    fn build(&self, first: &Polyline, second: &Polyline, config: &PipelineConfig) -> Polyline;
}

impl CenterlineBuilder for CenterlineStrategy {
    fn build(&self, first: &Polyline, second: &Polyline, config: &PipelineConfig) -> Polyline {
        match *self {
            Self::PairsMiddle => pairs_middle(first.points(), second.points()),
            Self::Parametric => parametric(first, second, config),
            Self::Perpendicular => {
                perpendicular(first.points(), second.points(), config.centerline_samples)
            }
        }
    }
}

/// Centerline between `first` and `second`, or `None` when either has
/// fewer than 2 points.
#[must_use]
pub fn compute_centerline(
    first: &Polyline,
    second: &Polyline,
    strategy: CenterlineStrategy,
    config: &PipelineConfig,
) -> Option<Polyline> {
    if first.len() < 2 || second.len() < 2 {
        return None;
    }
    Some(strategy.build(first, second, config))
}

/// Counts from [`build_centerlines`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CenterlineStats {
    /// Lanes that received a centerline.
    pub built: usize,
    /// Lanes without exactly two boundaries.
    pub missing_boundaries: usize,
    /// Lanes whose boundaries were too short.
    pub degenerate_boundaries: usize,
}

/// Compute the centerline of every lane in `topology`.
pub fn build_centerlines(topology: &mut Topology, config: &PipelineConfig) -> CenterlineStats {
    let mut stats = CenterlineStats::default();
    let computed: Vec<(LaneKey, Option<Polyline>)> = topology
        .lanes
        .keys()
        .map(|&lane| {
            let sides: Vec<&Polyline> = topology
                .boundaries_of(lane)
                .map(|(_, b)| &b.coordinates)
                .collect();
            let centerline = match sides.as_slice() {
                &[first, second] => {
                    let line = compute_centerline(first, second, config.centerline_strategy, config);
                    if line.is_none() {
                        debug!(%lane, "boundary has fewer than 2 points, centerline skipped");
                        stats.degenerate_boundaries += 1;
                    }
                    line
                }
                other => {
                    warn!(%lane, boundaries = other.len(), "lane does not have exactly two boundaries, centerline skipped");
                    stats.missing_boundaries += 1;
                    None
                }
            };
            (lane, centerline)
        })
        .collect();

    for (lane, centerline) in computed {
        if let (Some(line), Some(entry)) = (centerline, topology.lanes.get_mut(&lane)) {
            entry.centerline = Some(line);
            stats.built += 1;
        }
    }
    stats
}

// ───────────────────────── PairsMiddle ─────────────────────────────

fn pairs_middle(first: &[Point], second: &[Point]) -> Polyline {
    let target = first.len().max(second.len());
    resample(first, target)
        .into_iter()
        .zip(resample(second, target))
        .map(|(a, b)| a.midpoint(b))
        .collect()
}

/// Resample to `target` points, interpolating linearly over normalized
/// index position. Requires at least one input point.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn resample(points: &[Point], target: usize) -> Vec<Point> {
    let last = points.len() - 1;
    if target < 2 || last == 0 {
        return vec![points[0]; target];
    }
    (0..target)
        .map(|i| {
            let position = (i * last) as f64 / (target - 1) as f64;
            let lower = (position.floor() as usize).min(last);
            let frac = position - lower as f64;
            if frac == 0.0 || lower == last {
                points[lower]
            } else {
                points[lower].lerp(points[lower + 1], frac)
            }
        })
        .collect()
}

// ───────────────────────── Parametric ──────────────────────────────

fn parametric(first: &Polyline, second: &Polyline, config: &PipelineConfig) -> Polyline {
    let a = crate::simplify::simplify(first, config.curve_fit_tolerance);
    let b = crate::simplify::simplify(second, config.curve_fit_tolerance);
    let mut scratch = Vec::new();
    unit_steps(config.centerline_samples)
        .map(|t| {
            let p = bezier_point(a.points(), t, &mut scratch);
            let q = bezier_point(b.points(), t, &mut scratch);
            p.midpoint(q)
        })
        .collect()
}

/// `count` evenly spaced parameters over `[0, 1]`, both ends included.
#[allow(clippy::cast_precision_loss)]
fn unit_steps(count: usize) -> impl Iterator<Item = f64> {
    let denominator = count.saturating_sub(1).max(1) as f64;
    (0..count).map(move |i| i as f64 / denominator)
}

/// Evaluate the Bezier curve with the given control points at `t`
/// (de Casteljau). `scratch` is reused between calls.
fn bezier_point(control: &[Point], t: f64, scratch: &mut Vec<Point>) -> Point {
    scratch.clear();
    scratch.extend_from_slice(control);
    for level in (1..scratch.len()).rev() {
        for i in 0..level {
            scratch[i] = scratch[i].lerp(scratch[i + 1], t);
        }
    }
    scratch.first().copied().unwrap_or(Point::new(0.0, 0.0))
}

// ───────────────────────── Perpendicular ───────────────────────────

fn perpendicular(first: &[Point], second: &[Point], samples: usize) -> Polyline {
    let opposite: LineString<f64> = second.iter().map(|p| (p.x, p.y)).collect();
    sample_by_arc_length(first, samples)
        .into_iter()
        .filter_map(|sample| {
            match opposite.closest_point(&geo::Point::new(sample.x, sample.y)) {
                Closest::Intersection(c) | Closest::SinglePoint(c) => {
                    Some(sample.midpoint(Point::new(c.x(), c.y())))
                }
                Closest::Indeterminate => None,
            }
        })
        .collect()
}

/// `count` points at evenly spaced fractions of the polyline's length.
fn sample_by_arc_length(points: &[Point], count: usize) -> Vec<Point> {
    let mut cumulative = Vec::with_capacity(points.len());
    let mut total = 0.0;
    cumulative.push(0.0);
    for w in points.windows(2) {
        total += w[0].distance(w[1]);
        cumulative.push(total);
    }

    unit_steps(count)
        .map(|fraction| {
            let target = fraction * total;
            let seg = cumulative
                .partition_point(|&d| d < target)
                .clamp(1, points.len() - 1);
            let (start, end) = (cumulative[seg - 1], cumulative[seg]);
            let span = end - start;
            if span <= 0.0 {
                points[seg]
            } else {
                points[seg - 1].lerp(points[seg], ((target - start) / span).clamp(0.0, 1.0))
            }
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::types::{Boundary, BoundaryKey, FragmentId, Lane};

    fn line(coords: &[(f64, f64)]) -> Polyline {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    fn assert_close(actual: &Polyline, expected: &[(f64, f64)], tol: f64) {
        assert_eq!(actual.len(), expected.len(), "{actual:?}");
        for (p, &(x, y)) in actual.points().iter().zip(expected) {
            assert!(
                (p.x - x).abs() < tol && (p.y - y).abs() < tol,
                "got ({}, {}), expected ({x}, {y})",
                p.x,
                p.y,
            );
        }
    }

    #[test]
    fn pairs_middle_of_rails() {
        let out = compute_centerline(
            &line(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]),
            &line(&[(0.0, 1.0), (1.0, 1.0), (2.0, 1.0)]),
            CenterlineStrategy::PairsMiddle,
            &PipelineConfig::default(),
        )
        .unwrap();
        assert_eq!(out, line(&[(0.0, 0.5), (1.0, 0.5), (2.0, 0.5)]));
    }

    #[test]
    fn pairs_middle_of_identical_boundaries_is_identity() {
        let b = line(&[(0.1, 0.7), (0.35, 0.9), (1.3, 1.7), (2.9, 1.1)]);
        let out = compute_centerline(&b, &b, CenterlineStrategy::PairsMiddle, &PipelineConfig::default())
            .unwrap();
        assert_eq!(out, b);
    }

    #[test]
    fn pairs_middle_resamples_shorter_boundary() {
        let out = compute_centerline(
            &line(&[(0.0, 0.0), (2.0, 0.0)]),
            &line(&[(0.0, 2.0), (1.0, 2.0), (2.0, 2.0)]),
            CenterlineStrategy::PairsMiddle,
            &PipelineConfig::default(),
        )
        .unwrap();
        assert_close(&out, &[(0.0, 1.0), (1.0, 1.0), (2.0, 1.0)], 1e-12);
    }

    #[test]
    fn short_boundary_leaves_centerline_unset() {
        let out = compute_centerline(
            &line(&[(0.0, 0.0)]),
            &line(&[(0.0, 1.0), (1.0, 1.0)]),
            CenterlineStrategy::PairsMiddle,
            &PipelineConfig::default(),
        );
        assert!(out.is_none());
    }

    #[test]
    fn parametric_of_straight_rails() {
        let config = PipelineConfig {
            centerline_samples: 5,
            ..PipelineConfig::default()
        };
        let out = compute_centerline(
            &line(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]),
            &line(&[(0.0, 1.0), (1.0, 1.0), (2.0, 1.0)]),
            CenterlineStrategy::Parametric,
            &config,
        )
        .unwrap();
        assert_close(
            &out,
            &[(0.0, 0.5), (0.5, 0.5), (1.0, 0.5), (1.5, 0.5), (2.0, 0.5)],
            1e-9,
        );
    }

    #[test]
    fn bezier_quadratic_midpoint() {
        let control = [Point::new(0.0, 0.0), Point::new(1.0, 2.0), Point::new(2.0, 0.0)];
        let p = bezier_point(&control, 0.5, &mut Vec::new());
        assert!((p.x - 1.0).abs() < 1e-12);
        assert!((p.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn perpendicular_of_offset_rails() {
        let config = PipelineConfig {
            centerline_samples: 3,
            ..PipelineConfig::default()
        };
        let out = compute_centerline(
            &line(&[(0.0, 0.0), (4.0, 0.0)]),
            &line(&[(-1.0, 2.0), (5.0, 2.0)]),
            CenterlineStrategy::Perpendicular,
            &config,
        )
        .unwrap();
        assert_close(&out, &[(0.0, 1.0), (2.0, 1.0), (4.0, 1.0)], 1e-9);
    }

    #[test]
    fn arc_length_sampling_is_even() {
        let samples = sample_by_arc_length(
            &[Point::new(0.0, 0.0), Point::new(1.0, 0.0), Point::new(1.0, 3.0)],
            5,
        );
        let expected = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (1.0, 2.0), (1.0, 3.0)];
        assert_close(&samples.into_iter().collect(), &expected, 1e-12);
    }

    #[test]
    fn build_centerlines_skips_lane_with_one_boundary() {
        let lane = LaneKey::new(FragmentId(0), FragmentId(1));
        let lonely = LaneKey::new(FragmentId(1), FragmentId(2));
        let mut boundaries = BTreeMap::new();
        boundaries.insert(
            BoundaryKey::pair(FragmentId(0), FragmentId(1)),
            Boundary {
                coordinates: line(&[(0.0, 0.0), (1.0, 0.0)]),
                lanes: vec![lane],
            },
        );
        boundaries.insert(
            BoundaryKey::pair(FragmentId(1), FragmentId(0)),
            Boundary {
                coordinates: line(&[(0.0, 1.0), (1.0, 1.0)]),
                lanes: vec![lane],
            },
        );
        boundaries.insert(
            BoundaryKey::pair(FragmentId(2), FragmentId(1)),
            Boundary {
                coordinates: line(&[(0.0, 2.0), (1.0, 2.0)]),
                lanes: vec![lonely],
            },
        );
        let mut lanes = BTreeMap::new();
        lanes.insert(lane, Lane::default());
        lanes.insert(lonely, Lane::default());
        let mut topology = crate::types::Topology { boundaries, lanes };

        let stats = build_centerlines(&mut topology, &PipelineConfig::default());
        assert_eq!(stats.built, 1);
        assert_eq!(stats.missing_boundaries, 1);
        assert_eq!(
            topology.lanes[&lane].centerline,
            Some(line(&[(0.0, 0.5), (1.0, 0.5)]))
        );
        assert!(topology.lanes[&lonely].centerline.is_none());
    }
}
