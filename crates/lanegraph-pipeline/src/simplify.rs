//! Ramer-Douglas-Peucker simplification of survey polylines.
//!
//! Used in two places: the [`SmootherKind::Simplify`](crate::smooth::SmootherKind)
//! boundary smoother, and the curve-fit centerline strategy, which
//! reduces each boundary to its control points before building a
//! Bezier curve.

use crate::types::{Point, Polyline};

/// Simplify a polyline, dropping points within `tolerance` of the
/// segment between the retained points around them.
///
/// Endpoints are always retained. Polylines with fewer than 3 points
/// are returned unchanged, and a tolerance of `0.0` only removes
/// points that lie exactly on their chord.
#[must_use = "returns the simplified polyline"]
pub fn simplify(polyline: &Polyline, tolerance: f64) -> Polyline {
    let points = polyline.points();
    if points.len() < 3 {
        return polyline.clone();
    }

    let last = points.len() - 1;
    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[last] = true;

    let mut spans = vec![(0, last)];
    while let Some((start, end)) = spans.pop() {
        if end <= start + 1 {
            continue;
        }
        let farthest = ((start + 1)..end)
            .map(|i| (i, segment_distance(points[i], points[start], points[end])))
            .max_by(|(_, a), (_, b)| a.total_cmp(b));
        if let Some((idx, dist)) = farthest
            && dist > tolerance
        {
            kept[idx] = true;
            spans.push((start, idx));
            spans.push((idx, end));
        }
    }

    points
        .iter()
        .zip(&kept)
        .filter_map(|(&p, &k)| k.then_some(p))
        .collect()
}

/// Distance from `p` to the segment `a`-`b`.
///
/// Degenerates to point distance when `a == b`.
pub(crate) fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let ab = b.vector_from(a);
    let len_sq = ab.dot(ab);
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = (p.vector_from(a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a.lerp(b, t))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(coords: &[(f64, f64)]) -> Polyline {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn short_polylines_unchanged() {
        assert!(simplify(&Polyline::default(), 1.0).is_empty());
        assert_eq!(simplify(&line(&[(0.0, 0.0), (1.0, 0.0)]), 1.0).len(), 2);
    }

    #[test]
    fn collinear_interior_points_removed() {
        let result = simplify(
            &line(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0), (3.0, 3.0)]),
            1e-9,
        );
        assert_eq!(result, line(&[(0.0, 0.0), (3.0, 3.0)]));
    }

    #[test]
    fn bend_is_kept_below_tolerance() {
        let bent = line(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (2.0, 1.0), (2.0, 2.0)]);
        assert_eq!(
            simplify(&bent, 0.1),
            line(&[(0.0, 0.0), (2.0, 0.0), (2.0, 2.0)])
        );
        assert_eq!(simplify(&bent, 5.0).len(), 2);
    }

    #[test]
    fn zigzag_survives_small_tolerance() {
        let zigzag = line(&[(0.0, 0.0), (2.0, 5.0), (4.0, 0.0), (6.0, 5.0), (8.0, 0.0)]);
        assert_eq!(simplify(&zigzag, 1.0).len(), 5);
    }

    #[test]
    fn segment_distance_clamps_to_endpoints() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(2.0, 0.0);
        assert!((segment_distance(Point::new(1.0, 3.0), a, b) - 3.0).abs() < 1e-10);
        assert!((segment_distance(Point::new(5.0, 4.0), a, b) - 5.0).abs() < 1e-10);
        assert!((segment_distance(Point::new(3.0, 4.0), a, a) - 5.0).abs() < 1e-10);
    }
}
