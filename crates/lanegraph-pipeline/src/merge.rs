//! Repair clustering splits by merging collinear, touching fragments.
//!
//! Two fragments are compatible when, for at least one of the four
//! endpoint pairings (start-start, start-end, end-start, end-end), the
//! unit directions of the corresponding extremity segments satisfy
//! `|dot| > collinearity` and the endpoints lie closer than
//! `proximity`. The absolute value makes antiparallel fragments
//! collinear too.
//!
//! Each pass is greedy: fragments are visited in ascending id order and
//! a fragment merges at most once per pass. The absorbed fragment's
//! points are appended to the survivor and the absorbed id disappears.
//! Further passes run only while `max_passes` allows and the previous
//! pass merged something.

use std::collections::HashSet;

use tracing::debug;

use crate::types::{Fragment, FragmentId, Point, PointKey, Vector};

/// Output of [`merge_fragments`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    /// Surviving fragments in ascending id order.
    pub fragments: Vec<Fragment>,
    /// `(survivor, absorbed)` pairs in the order they were applied.
    pub merges: Vec<(FragmentId, FragmentId)>,
    /// Passes executed.
    pub passes: u32,
}

/// Endpoint geometry of one fragment.
#[derive(Debug, Clone, Copy)]
struct Extremities {
    first: Point,
    last: Point,
    start_dir: Vector,
    end_dir: Vector,
}

impl Extremities {
    fn of(fragment: &Fragment) -> Option<Self> {
        let (start_dir, end_dir) = fragment.extremity_directions()?;
        Some(Self {
            first: *fragment.points.first()?,
            last: *fragment.points.last()?,
            start_dir,
            end_dir,
        })
    }

    fn compatible(&self, other: &Self, proximity: f64, collinearity: f64) -> bool {
        [
            (self.start_dir, other.start_dir, self.first, other.first),
            (self.start_dir, other.end_dir, self.first, other.last),
            (self.end_dir, other.start_dir, self.last, other.first),
            (self.end_dir, other.end_dir, self.last, other.last),
        ]
        .into_iter()
        .any(|(u, v, p, q)| u.dot(v).abs() > collinearity && p.distance(q) < proximity)
    }
}

/// Merge compatible fragment pairs.
#[must_use = "returns the merged fragments"]
pub fn merge_fragments(
    mut fragments: Vec<Fragment>,
    proximity: f64,
    collinearity: f64,
    max_passes: u32,
) -> MergeOutcome {
    fragments.sort_by_key(|f| f.id);
    let mut merges = Vec::new();
    let mut passes = 0;

    while passes < max_passes {
        passes += 1;
        let pairs = plan_pass(&fragments, proximity, collinearity);
        if pairs.is_empty() {
            break;
        }
        fragments = apply_pass(fragments, &pairs);
        merges.extend(
            pairs
                .iter()
                .map(|&(keep, absorb)| (FragmentId(keep), FragmentId(absorb))),
        );
    }

    MergeOutcome {
        fragments,
        merges,
        passes,
    }
}

/// Decide the `(survivor, absorbed)` pairs of one greedy pass, as raw
/// fragment ids.
fn plan_pass(fragments: &[Fragment], proximity: f64, collinearity: f64) -> Vec<(u32, u32)> {
    let extremities: Vec<Option<Extremities>> = fragments
        .iter()
        .map(|f| {
            let ext = Extremities::of(f);
            if ext.is_none() {
                debug!(fragment = %f.id, points = f.points.len(), "fragment has no direction, excluded from merging");
            }
            ext
        })
        .collect();

    let mut consumed = vec![false; fragments.len()];
    let mut pairs = Vec::new();

    for (i, a) in extremities.iter().enumerate() {
        let Some(a) = a else { continue };
        if consumed[i] {
            continue;
        }
        let partner = extremities.iter().enumerate().find_map(|(j, b)| {
            let b = b.as_ref()?;
            (j != i && !consumed[j] && a.compatible(b, proximity, collinearity)).then_some(j)
        });
        if let Some(j) = partner {
            consumed[i] = true;
            consumed[j] = true;
            debug!(survivor = %fragments[i].id, absorbed = %fragments[j].id, "merging fragments");
            pairs.push((fragments[i].id.0, fragments[j].id.0));
        }
    }
    pairs
}

fn apply_pass(fragments: Vec<Fragment>, pairs: &[(u32, u32)]) -> Vec<Fragment> {
    let absorbed: HashSet<u32> = pairs.iter().map(|&(_, b)| b).collect();
    let (mut kept, mut taken): (Vec<Fragment>, Vec<Fragment>) = fragments
        .into_iter()
        .partition(|f| !absorbed.contains(&f.id.0));

    for &(keep, absorb) in pairs {
        let Some(source) = taken.iter_mut().find(|f| f.id.0 == absorb) else {
            continue;
        };
        let points = std::mem::take(&mut source.points);
        if let Some(target) = kept.iter_mut().find(|f| f.id.0 == keep) {
            let mut seen: HashSet<PointKey> = target.points.iter().map(|p| p.key()).collect();
            target
                .points
                .extend(points.into_iter().filter(|p| seen.insert(p.key())));
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(id: u32, coords: &[(f64, f64)]) -> Fragment {
        Fragment::new(
            FragmentId(id),
            coords.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        )
    }

    #[test]
    fn end_to_start_collinear_fragments_merge() {
        let a = fragment(0, &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        let b = fragment(1, &[(2.1, 0.0), (3.0, 0.0), (4.0, 0.0)]);
        let out = merge_fragments(vec![a, b], 0.5, 0.99, 1);

        assert_eq!(out.fragments.len(), 1);
        assert_eq!(out.fragments[0].id, FragmentId(0));
        assert_eq!(out.fragments[0].points.len(), 6);
        assert_eq!(out.merges, vec![(FragmentId(0), FragmentId(1))]);
    }

    #[test]
    fn antiparallel_fragments_merge() {
        // b runs right-to-left, so its end direction is (-1, 0).
        let a = fragment(0, &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        let b = fragment(1, &[(4.0, 0.0), (3.0, 0.0), (2.1, 0.0)]);
        let out = merge_fragments(vec![a, b], 0.5, 0.99, 1);
        assert_eq!(out.fragments.len(), 1);
    }

    #[test]
    fn perpendicular_fragments_do_not_merge() {
        let a = fragment(0, &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]);
        let b = fragment(1, &[(2.1, 0.0), (2.1, 1.0), (2.1, 2.0)]);
        let out = merge_fragments(vec![a, b], 0.5, 0.99, 1);
        assert_eq!(out.fragments.len(), 2);
        assert!(out.merges.is_empty());
    }

    #[test]
    fn distant_collinear_fragments_do_not_merge() {
        let a = fragment(0, &[(0.0, 0.0), (1.0, 0.0)]);
        let b = fragment(1, &[(5.0, 0.0), (6.0, 0.0)]);
        let out = merge_fragments(vec![a, b], 0.5, 0.99, 1);
        assert_eq!(out.fragments.len(), 2);
    }

    #[test]
    fn single_point_fragment_is_left_alone() {
        let a = fragment(0, &[(0.0, 0.0), (1.0, 0.0)]);
        let b = fragment(1, &[(1.05, 0.0)]);
        let out = merge_fragments(vec![a, b], 0.5, 0.99, 1);
        assert_eq!(out.fragments.len(), 2);
    }

    #[test]
    fn single_pass_merges_each_fragment_once() {
        // Three touching collinear pieces: one pass merges 0 with 1 and
        // leaves 2 alone.
        let a = fragment(0, &[(0.0, 0.0), (1.0, 0.0)]);
        let b = fragment(1, &[(1.1, 0.0), (2.0, 0.0)]);
        let c = fragment(2, &[(2.1, 0.0), (3.0, 0.0)]);
        let out = merge_fragments(vec![c.clone(), b.clone(), a.clone()], 0.5, 0.99, 1);
        assert_eq!(out.fragments.len(), 2);
        assert_eq!(out.passes, 1);

        // A second pass picks up the leftover: fragment 0 now ends at
        // (2.0, 0.0), next to fragment 2.
        let out = merge_fragments(vec![a, b, c], 0.5, 0.99, 3);
        assert_eq!(out.fragments.len(), 1);
        assert_eq!(out.fragments[0].points.len(), 6);
        assert_eq!(out.passes, 3);
    }

    #[test]
    fn merged_points_are_not_duplicated() {
        let a = fragment(0, &[(0.0, 0.0), (1.0, 0.0)]);
        let b = fragment(1, &[(1.0, 0.0), (2.0, 0.0)]);
        let out = merge_fragments(vec![a, b], 0.5, 0.99, 1);
        assert_eq!(out.fragments[0].points.len(), 3);
    }
}
