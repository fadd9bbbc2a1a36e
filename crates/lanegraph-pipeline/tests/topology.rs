#![allow(clippy::unwrap_used)]

//! End-to-end scenarios through the public pipeline API.

use lanegraph_pipeline::pipeline::{Advance, Stage};
use lanegraph_pipeline::{
    BoundaryKey, CenterlineStrategy, Fragment, FragmentId, LaneKey, NodeId, Pipeline,
    PipelineConfig, PipelineError, Point, SmootherKind, UnmatchedPolicy, process_fragments,
};

fn fragment(id: u32, y: f64, xs: &[f64]) -> Fragment {
    Fragment::new(FragmentId(id), xs.iter().map(|&x| Point::new(x, y)).collect())
}

fn lane(a: u32, b: u32) -> LaneKey {
    LaneKey::new(FragmentId(a), FragmentId(b))
}

const XS: [f64; 5] = [0.0, 0.5, 1.0, 1.5, 2.0];

#[test]
fn three_markings_share_the_middle_boundary() {
    let fragments = vec![
        fragment(0, -1.0, &XS),
        fragment(1, 0.0, &XS),
        fragment(2, 1.0, &XS),
    ];
    let config = PipelineConfig {
        max_match_distance: 1.5,
        ..PipelineConfig::default()
    };
    let result = process_fragments(fragments, &config).unwrap();
    let topology = &result.topology;

    assert_eq!(topology.boundaries.len(), 3);
    assert!(
        topology
            .boundaries
            .contains_key(&BoundaryKey::shared(FragmentId(1), FragmentId(0), FragmentId(2)))
    );
    assert_eq!(
        topology.lanes.keys().copied().collect::<Vec<_>>(),
        vec![lane(0, 1), lane(1, 2)]
    );

    for (key, expected_y) in [(lane(0, 1), -0.5), (lane(1, 2), 0.5)] {
        let centerline = topology.lanes[&key].centerline.as_ref().unwrap();
        assert_eq!(centerline.len(), XS.len());
        assert!(
            centerline
                .points()
                .iter()
                .all(|p| (p.y - expected_y).abs() < 1e-12),
            "{key}: {centerline:?}"
        );
    }
}

#[test]
fn consecutive_lanes_meet_at_one_node() {
    let tail: Vec<f64> = XS.iter().map(|x| x + 3.5).collect();
    let fragments = vec![
        fragment(0, 0.0, &XS),
        fragment(1, 1.0, &XS),
        fragment(2, 0.0, &tail),
        fragment(3, 1.0, &tail),
    ];
    let config = PipelineConfig {
        merge_proximity: 0.1,
        max_match_distance: 1.2,
        node_merge_distance: 2.0,
        min_lane_length: 1.0,
        node_link_distance: 1.0,
        ..PipelineConfig::default()
    };
    let result = process_fragments(fragments, &config).unwrap();

    assert_eq!(result.topology.lanes.len(), 2);
    assert_eq!(result.nodes.len(), 1);
    let node = &result.nodes[0];
    assert!((node.location.x - 2.75).abs() < 1e-12);
    assert!((node.location.y - 0.5).abs() < 1e-12);
    assert_eq!(node.connections.len(), 2);

    for key in [lane(0, 1), lane(2, 3)] {
        assert_eq!(result.topology.lanes[&key].connected_nodes, vec![NodeId(0)]);
    }
}

#[test]
fn node_linking_can_be_disabled() {
    let tail: Vec<f64> = XS.iter().map(|x| x + 3.5).collect();
    let fragments = vec![
        fragment(0, 0.0, &XS),
        fragment(1, 1.0, &XS),
        fragment(2, 0.0, &tail),
        fragment(3, 1.0, &tail),
    ];
    let config = PipelineConfig {
        merge_proximity: 0.1,
        max_match_distance: 1.2,
        node_merge_distance: 2.0,
        min_lane_length: 1.0,
        link_nodes: false,
        ..PipelineConfig::default()
    };
    let result = process_fragments(fragments, &config).unwrap();
    assert_eq!(result.nodes.len(), 1);
    assert!(
        result
            .topology
            .lanes
            .values()
            .all(|l| l.connected_nodes.is_empty())
    );
}

#[test]
fn raw_points_through_every_stage() {
    // Two marking rows 0.0001 apart, sampled every 0.00001.
    let mut points: Vec<Point> = (0..60)
        .flat_map(|i| {
            let x = f64::from(i) * 0.000_01;
            [Point::new(x, 0.000_1), Point::new(x, 0.0)]
        })
        .collect();
    // A stray point far from both rows.
    points.push(Point::new(0.01, 0.01));

    let mut stage: Stage = Pipeline::new(points, PipelineConfig::default()).into();
    let mut visited = 1;
    loop {
        match stage.advance().unwrap() {
            Advance::Next(next) => {
                visited += 1;
                stage = next;
            }
            Advance::Complete(done) => {
                stage = done;
                break;
            }
        }
    }
    assert_eq!(visited, 8);

    let result = stage.complete().unwrap();
    assert_eq!(result.fragments.len(), 2);
    assert_eq!(result.topology.lanes.len(), 1);
    let centerline = result.topology.lanes[&lane(0, 1)]
        .centerline
        .as_ref()
        .unwrap();
    assert!(
        centerline
            .points()
            .iter()
            .all(|p| (p.y - 0.000_05).abs() < 1e-12)
    );
}

#[test]
fn every_centerline_strategy_stays_between_rails() {
    let fragments = || vec![fragment(0, 0.0, &XS), fragment(1, 1.0, &XS)];
    for strategy in [
        CenterlineStrategy::PairsMiddle,
        CenterlineStrategy::Parametric,
        CenterlineStrategy::Perpendicular,
    ] {
        for smoother in [
            SmootherKind::Passthrough,
            SmootherKind::Chaikin,
            SmootherKind::Simplify,
        ] {
            let config = PipelineConfig {
                max_match_distance: 2.0,
                centerline_strategy: strategy,
                centerline_samples: 9,
                smoother,
                ..PipelineConfig::default()
            };
            let result = process_fragments(fragments(), &config).unwrap();
            let centerline = result.topology.lanes[&lane(0, 1)]
                .centerline
                .as_ref()
                .unwrap();
            assert!(centerline.len() >= 2, "{strategy}/{smoother}");
            assert!(
                centerline
                    .points()
                    .iter()
                    .all(|p| (p.y - 0.5).abs() < 1e-9 && (-1e-9..=2.0 + 1e-9).contains(&p.x)),
                "{strategy}/{smoother}: {centerline:?}"
            );
        }
    }
}

#[test]
fn isolated_marking_aborts_or_is_skipped() {
    let mut fragments = vec![fragment(0, 0.0, &XS), fragment(1, 1.0, &XS)];
    fragments.push(fragment(2, 50.0, &XS));

    let config = PipelineConfig {
        max_match_distance: 2.0,
        ..PipelineConfig::default()
    };
    let err = process_fragments(fragments.clone(), &config).unwrap_err();
    assert!(matches!(err, PipelineError::NoMatch { .. }));

    let config = PipelineConfig {
        unmatched_policy: UnmatchedPolicy::Skip,
        ..config
    };
    let result = process_fragments(fragments, &config).unwrap();
    assert_eq!(result.topology.lanes.len(), 1);
    assert_eq!(result.fragments.len(), 3);
}
