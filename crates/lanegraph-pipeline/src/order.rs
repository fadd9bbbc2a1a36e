//! Turn unordered boundary point sets into walkable polylines.
//!
//! Greedy nearest-neighbour walk starting from the westernmost point
//! (minimum x, first on ties). Each step appends the remaining point
//! closest to the current path end, again taking the first on ties.
//! O(n²) with no backtracking: sparse or self-crossing boundaries can
//! zig-zag.

use crate::types::{Point, Polyline, Topology};

/// Order a boundary's points into a polyline.
///
/// Takes ownership of the working set: the walk removes points from it
/// as they are visited.
#[must_use = "returns the ordered polyline"]
pub fn order_path(mut remaining: Vec<Point>) -> Polyline {
    let Some(start) = remaining
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.x.total_cmp(&b.x))
        .map(|(i, _)| i)
    else {
        return Polyline::default();
    };

    let mut ordered = Vec::with_capacity(remaining.len());
    let mut current = remaining.remove(start);
    ordered.push(current);

    while let Some(next) = nearest_index(&remaining, current) {
        current = remaining.remove(next);
        ordered.push(current);
    }

    Polyline::new(ordered)
}

/// Index of the first point nearest to `target`.
fn nearest_index(points: &[Point], target: Point) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.distance_squared(target)
                .total_cmp(&b.distance_squared(target))
        })
        .map(|(i, _)| i)
}

/// Order every boundary of `topology` in place.
pub fn order_boundaries(topology: &mut Topology) {
    for boundary in topology.boundaries.values_mut() {
        let points = std::mem::take(&mut boundary.coordinates).into_points();
        boundary.coordinates = order_path(points);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pts(coords: &[(f64, f64)]) -> Vec<Point> {
        coords.iter().map(|&(x, y)| Point::new(x, y)).collect()
    }

    #[test]
    fn empty_input_gives_empty_polyline() {
        assert!(order_path(Vec::new()).is_empty());
    }

    #[test]
    fn shuffled_line_is_walked_west_to_east() {
        let input = pts(&[(3.0, 0.0), (1.0, 0.0), (4.0, 0.0), (0.0, 0.0), (2.0, 0.0)]);
        let ordered = order_path(input);
        assert_eq!(
            ordered.points(),
            pts(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0), (4.0, 0.0)])
        );
    }

    #[test]
    fn start_tie_takes_first_westernmost() {
        let ordered = order_path(pts(&[(5.0, 0.0), (0.0, 2.0), (0.0, 1.0)]));
        assert_eq!(ordered.first(), Some(&Point::new(0.0, 2.0)));
    }

    #[test]
    fn output_is_a_permutation_with_greedy_steps() {
        let input = pts(&[
            (2.0, 1.0),
            (0.5, 0.2),
            (3.1, 0.9),
            (1.2, 0.4),
            (0.0, 0.0),
            (2.6, 1.4),
            (1.9, 0.3),
        ]);
        let ordered = order_path(input.clone());
        let out = ordered.points();

        let mut sorted_in: Vec<_> = input.iter().map(|p| p.key()).collect();
        let mut sorted_out: Vec<_> = out.iter().map(|p| p.key()).collect();
        sorted_in.sort();
        sorted_out.sort();
        assert_eq!(sorted_in, sorted_out);

        let min_x = input.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        assert!((out[0].x - min_x).abs() < f64::EPSILON);

        for step in 1..out.len() {
            let chosen = out[step - 1].distance_squared(out[step]);
            for later in &out[step..] {
                assert!(out[step - 1].distance_squared(*later) >= chosen);
            }
        }
    }
}
