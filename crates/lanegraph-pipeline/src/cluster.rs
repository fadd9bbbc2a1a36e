//! Density-based clustering of raw survey points into fragments.
//!
//! DBSCAN over an R\*-tree: a point with at least `min_samples`
//! neighbours within `radius` (itself included) is a core point. Core
//! points reachable from one another through core neighbourhoods share
//! a label; non-core points within reach of a core point join that
//! core's cluster, everything else is noise.
//!
//! Labels are numbered by the input position of the first core point of
//! each cluster, and a border point reachable from several clusters
//! joins the lowest-numbered one. Fragment points keep input order with
//! exact duplicates removed.

use std::collections::{HashMap, HashSet};

use petgraph::unionfind::UnionFind;
use rstar::RTree;
use rstar::primitives::GeomWithData;

use crate::types::{Fragment, FragmentId, Point, PointKey};

/// An input point tagged with its position in the input slice.
type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Output of [`cluster_points`].
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    /// One fragment per cluster label, in ascending label order.
    pub fragments: Vec<Fragment>,
    /// Points discarded as noise.
    pub noise_count: usize,
    /// Exact duplicates dropped from their fragment.
    pub duplicate_count: usize,
}

/// Group `points` into fragments by density.
#[must_use = "returns the clustered fragments"]
pub fn cluster_points(points: &[Point], radius: f64, min_samples: usize) -> Clustering {
    let labels = dbscan_labels(points, radius, min_samples);
    let cluster_count = labels.iter().flatten().max().map_or(0, |&l| l + 1);

    let mut members: Vec<Vec<Point>> = vec![Vec::new(); cluster_count];
    let mut seen: Vec<HashSet<PointKey>> = vec![HashSet::new(); cluster_count];
    let mut noise_count = 0;
    let mut duplicate_count = 0;

    for (&point, label) in points.iter().zip(&labels) {
        match *label {
            None => noise_count += 1,
            Some(l) if seen[l].insert(point.key()) => members[l].push(point),
            Some(_) => duplicate_count += 1,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    let fragments = members
        .into_iter()
        .enumerate()
        .map(|(label, pts)| Fragment::new(FragmentId(label as u32), pts))
        .collect();

    Clustering {
        fragments,
        noise_count,
        duplicate_count,
    }
}

/// DBSCAN label per input point (`None` for noise).
fn dbscan_labels(points: &[Point], radius: f64, min_samples: usize) -> Vec<Option<usize>> {
    let n = points.len();
    let entries: Vec<IndexedPoint> = points
        .iter()
        .enumerate()
        .map(|(i, p)| GeomWithData::new([p.x, p.y], i))
        .collect();
    let tree = RTree::bulk_load(entries);

    let max_squared_radius = radius * radius;
    let neighbours: Vec<Vec<usize>> = points
        .iter()
        .map(|p| {
            let mut ids: Vec<usize> = tree
                .locate_within_distance([p.x, p.y], max_squared_radius)
                .map(|entry| entry.data)
                .collect();
            ids.sort_unstable();
            ids
        })
        .collect();
    let core: Vec<bool> = neighbours.iter().map(|nb| nb.len() >= min_samples).collect();

    let mut components = UnionFind::<usize>::new(n);
    for (i, nb) in neighbours.iter().enumerate() {
        if core[i] {
            for &j in nb {
                if core[j] {
                    components.union(i, j);
                }
            }
        }
    }

    let mut label_of_root: HashMap<usize, usize> = HashMap::new();
    let mut labels = vec![None; n];
    for i in (0..n).filter(|&i| core[i]) {
        let next = label_of_root.len();
        let label = *label_of_root.entry(components.find(i)).or_insert(next);
        labels[i] = Some(label);
    }
    for i in (0..n).filter(|&i| !core[i]) {
        let label = neighbours[i]
            .iter()
            .filter(|&&j| core[j])
            .filter_map(|&j| labels[j])
            .min();
        labels[i] = label;
    }
    labels
}
