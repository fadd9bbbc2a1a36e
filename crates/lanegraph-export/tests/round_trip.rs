//! Integration test: run synthetic survey points through the full
//! pipeline, export the result document and read it back.

#![allow(clippy::unwrap_used)]

use lanegraph_pipeline::{Fragment, FragmentId, LaneKey, PipelineConfig, Point};

/// Two parallel marking rows 0.0001 apart, sampled every 0.00001.
fn survey() -> Vec<Point> {
    (0..60)
        .flat_map(|i| {
            let x = f64::from(i).mul_add(0.000_01, 7.0);
            [Point::new(x, 50.0), Point::new(x, 50.000_1)]
        })
        .collect()
}

#[test]
fn pipeline_result_survives_document_round_trip() {
    let config = PipelineConfig::default();
    let result = lanegraph_pipeline::process(survey(), &config).unwrap();
    assert_eq!(result.topology.lanes.len(), 1);

    let json = lanegraph_export::to_json_pretty(&result).unwrap();
    eprintln!("document: {} bytes", json.len());

    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert!(value["boundaries"]["[0, 1]"].is_object());
    assert!(value["boundaries"]["[1, 0]"].is_object());
    assert_eq!(
        value["lanes"]["[0, 1]"]["centerline"]
            .as_array()
            .unwrap()
            .len(),
        60
    );

    let parsed = lanegraph_export::from_json(&json).unwrap();
    assert_eq!(parsed.topology, result.topology);
    assert_eq!(parsed.nodes, result.nodes);
}

#[test]
fn compact_and_pretty_documents_agree() {
    let result = lanegraph_pipeline::process(survey(), &PipelineConfig::default()).unwrap();
    let compact = lanegraph_export::from_json(&lanegraph_export::to_json(&result).unwrap()).unwrap();
    let pretty =
        lanegraph_export::from_json(&lanegraph_export::to_json_pretty(&result).unwrap()).unwrap();
    assert_eq!(compact, pretty);
}

fn rail(id: u32, y: f64) -> Fragment {
    Fragment::new(
        FragmentId(id),
        [0.0, 0.5, 1.0, 1.5, 2.0]
            .iter()
            .map(|&x| Point::new(x, y))
            .collect(),
    )
}

#[test]
fn lane_with_one_boundary_keeps_centerline_key() {
    // The middle rail pairs with the closer top rail, so lane [0, 1] is
    // bounded on one side only and gets no centerline.
    let fragments = vec![rail(0, 0.0), rail(1, 1.0), rail(2, 1.5)];
    let config = PipelineConfig {
        max_match_distance: 1.2,
        ..PipelineConfig::default()
    };
    let result = lanegraph_pipeline::process_fragments(fragments, &config).unwrap();
    let lower = LaneKey::new(FragmentId(0), FragmentId(1));
    assert!(result.topology.lanes[&lower].centerline.is_none());

    let json = lanegraph_export::to_json(&result).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["lanes"]["[0, 1]"]["centerline"], serde_json::json!([]));
    assert!(
        !value["lanes"]["[1, 2]"]["centerline"]
            .as_array()
            .unwrap()
            .is_empty()
    );

    let parsed = lanegraph_export::from_json(&json).unwrap();
    assert_eq!(parsed.topology, result.topology);
}
