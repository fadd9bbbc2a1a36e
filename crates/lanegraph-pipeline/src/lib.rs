//! lanegraph-pipeline: Lane topology reconstruction from marking points (sans-IO).
//!
//! Converts an unordered cloud of 2D lane-marking points into a lane
//! graph through:
//! cluster -> merge -> pair -> order -> smooth -> centerlines -> nodes.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! point lists and returns structured data. Reading survey files and
//! writing the result document live in `lanegraph-bench` and
//! `lanegraph-export`.

pub mod centerline;
pub mod cluster;
pub mod diagnostics;
pub mod matching;
pub mod merge;
pub mod nodes;
pub mod order;
pub mod pipeline;
pub mod simplify;
pub mod smooth;
pub mod types;

pub use centerline::{CenterlineBuilder, CenterlineStrategy};
pub use pipeline::Pipeline;
pub use smooth::{Smoother, SmootherKind};
pub use types::{
    Boundary, BoundaryKey, Connection, Fragment, FragmentId, IntersectionNode, Lane, LaneKey,
    NodeId, PipelineConfig, PipelineError, Point, Polyline, Topology, TopologyResult,
    UnmatchedPolicy,
};

/// Run the full lane topology pipeline.
///
/// # Pipeline steps
///
/// 1. Density clustering of the raw points into fragments
/// 2. Merging of collinear, touching fragments
/// 3. Boundary matching (pairs and shared boundaries)
/// 4. Greedy path ordering of each boundary
/// 5. Boundary smoothing (configured [`SmootherKind`])
/// 6. Centerline construction (configured [`CenterlineStrategy`])
/// 7. Intersection node synthesis and optional lane linking
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `points` is empty.
/// Returns [`PipelineError::InvalidConfig`] if `config` fails validation.
/// Returns [`PipelineError::NoFragments`] if every point is noise.
/// Returns [`PipelineError::NoMatch`] if a point has no partner and
/// `config.unmatched_policy` is [`UnmatchedPolicy::Abort`].
pub fn process(points: Vec<Point>, config: &PipelineConfig) -> Result<TopologyResult, PipelineError> {
    let result = Pipeline::new(points, config.clone())
        .cluster()?
        .merge()
        .pair()?
        .order()
        .smooth()
        .build_centerlines()
        .synthesize_nodes()
        .into_result();
    tracing::info!(
        fragments = result.fragments.len(),
        lanes = result.topology.lanes.len(),
        nodes = result.nodes.len(),
        "lane topology built"
    );
    Ok(result)
}

/// Run the pipeline from already clustered fragments.
///
/// # Errors
///
/// Same as [`process`], except that clustering errors cannot occur;
/// an empty fragment list yields [`PipelineError::NoFragments`].
pub fn process_fragments(
    fragments: Vec<Fragment>,
    config: &PipelineConfig,
) -> Result<TopologyResult, PipelineError> {
    use pipeline::PipelineStage;

    Pipeline::from_fragments(fragments, config.clone())?.complete()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn fragment(id: u32, coords: &[(f64, f64)]) -> Fragment {
        Fragment::new(
            FragmentId(id),
            coords.iter().map(|&(x, y)| Point::new(x, y)).collect(),
        )
    }

    #[test]
    fn process_empty_input() {
        let result = process(Vec::new(), &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::EmptyInput)));
    }

    #[test]
    fn process_invalid_config() {
        let config = PipelineConfig {
            centerline_samples: 1,
            ..PipelineConfig::default()
        };
        let result = process(vec![Point::new(0.0, 0.0)], &config);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn process_sparse_points_is_all_noise() {
        let points = (0..10).map(|i| Point::new(f64::from(i), 0.0)).collect();
        let result = process(points, &PipelineConfig::default());
        assert!(matches!(result, Err(PipelineError::NoFragments)));
    }

    #[test]
    fn two_rails_give_one_lane_with_a_straight_centerline() {
        let fragments = vec![
            fragment(0, &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0)]),
            fragment(1, &[(0.0, 1.0), (1.0, 1.0), (2.0, 1.0)]),
        ];
        let config = PipelineConfig {
            merge_proximity: 0.5,
            max_match_distance: 5.0,
            ..PipelineConfig::default()
        };
        let result = process_fragments(fragments, &config).unwrap();

        assert_eq!(result.topology.boundaries.len(), 2);
        assert_eq!(result.topology.lanes.len(), 1);
        let lane = &result.topology.lanes[&LaneKey::new(FragmentId(0), FragmentId(1))];
        let expected: Polyline = [(0.0, 0.5), (1.0, 0.5), (2.0, 0.5)]
            .iter()
            .map(|&(x, y)| Point::new(x, y))
            .collect();
        assert_eq!(lane.centerline.as_ref(), Some(&expected));
        assert!(result.nodes.is_empty());
        assert!(lane.connected_nodes.is_empty());
    }

    #[test]
    fn process_dense_rows() {
        let points: Vec<Point> = (0..50)
            .flat_map(|i| {
                let x = f64::from(i) * 0.000_01;
                [Point::new(x, 0.0), Point::new(x, 0.000_1)]
            })
            .collect();
        let result = process(points, &PipelineConfig::default()).unwrap();
        assert_eq!(result.fragments.len(), 2);
        assert_eq!(result.topology.lanes.len(), 1);
        let lane = result.topology.lanes.values().next().unwrap();
        let centerline = lane.centerline.as_ref().unwrap();
        assert_eq!(centerline.len(), 50);
        for p in centerline.points() {
            assert!((p.y - 0.000_05).abs() < 1e-12);
        }
    }
}
