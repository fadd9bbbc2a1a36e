//! Result document serializer.
//!
//! Converts a [`TopologyResult`] into the JSON result document consumed
//! by downstream map tooling:
//!
//! ```json
//! {
//!   "boundaries": { "[0, 1]": { "coordinates": [[x, y], ...], "lanes": [[0, 1]] } },
//!   "lanes": { "[0, 1]": { "centerline": [[x, y], ...], "connected_nodes": [0] } },
//!   "nodes": [ { "location": [x, y], "connections": [ { "lane": [0, 1], "line": [[x, y], [x, y]] } ] } ]
//! }
//! ```
//!
//! Composite keys are written in their list text form (`"[a, b]"`,
//! `"[left, owner, right]"`) and parsed back into typed keys by
//! [`from_json`]. `nodes` and `connected_nodes` are omitted when empty.
//! Every lane carries `centerline`, written as `[]` when none was built;
//! a missing or empty `centerline` parses back as no centerline.
//!
//! Everything here is pure: the functions take and return strings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use lanegraph_pipeline::{
    Boundary, BoundaryKey, Connection, FragmentId, IntersectionNode, Lane, LaneKey, NodeId,
    Point, Polyline, Topology, TopologyResult,
};

use crate::ExportError;

/// A coordinate pair as written in the document.
pub type Coordinate = [f64; 2];

/// The serialized form of a pipeline result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultDocument {
    /// Boundaries by key text.
    pub boundaries: BTreeMap<String, BoundaryEntry>,
    /// Lanes by key text.
    pub lanes: BTreeMap<String, LaneEntry>,
    /// Intersection nodes; their position is the id lanes refer to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nodes: Vec<NodeEntry>,
}

/// One boundary in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryEntry {
    /// Ordered boundary coordinates.
    pub coordinates: Vec<Coordinate>,
    /// Lanes the boundary belongs to, as fragment id pairs.
    pub lanes: Vec<[u32; 2]>,
}

/// One lane in the document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaneEntry {
    /// Lane centerline; empty when none was built.
    #[serde(default)]
    pub centerline: Vec<Coordinate>,
    /// Indices into the document's `nodes`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connected_nodes: Vec<usize>,
}

/// One intersection node in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    /// Node position.
    pub location: Coordinate,
    /// Lane endpoints attached to the node.
    pub connections: Vec<ConnectionEntry>,
}

/// A lane endpoint attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionEntry {
    /// The connected lane.
    pub lane: [u32; 2],
    /// Segment from the lane endpoint to the node.
    pub line: [Coordinate; 2],
}

/// A document parsed back into typed pipeline values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    /// Boundaries and lanes with typed keys.
    pub topology: Topology,
    /// Intersection nodes.
    pub nodes: Vec<IntersectionNode>,
}

const fn coordinate(p: Point) -> Coordinate {
    [p.x, p.y]
}

const fn point([x, y]: Coordinate) -> Point {
    Point::new(x, y)
}

fn coordinates(polyline: &Polyline) -> Vec<Coordinate> {
    polyline.points().iter().copied().map(coordinate).collect()
}

fn lane_key([a, b]: [u32; 2]) -> LaneKey {
    LaneKey::new(FragmentId(a), FragmentId(b))
}

/// Build the document for a pipeline result.
#[must_use]
pub fn to_document(result: &TopologyResult) -> ResultDocument {
    let boundaries = result
        .topology
        .boundaries
        .iter()
        .map(|(key, boundary)| {
            (
                key.to_string(),
                BoundaryEntry {
                    coordinates: coordinates(&boundary.coordinates),
                    lanes: boundary.lanes.iter().map(|l| l.ids()).collect(),
                },
            )
        })
        .collect();

    let lanes = result
        .topology
        .lanes
        .iter()
        .map(|(key, lane)| {
            (
                key.to_string(),
                LaneEntry {
                    centerline: lane
                        .centerline
                        .as_ref()
                        .map(coordinates)
                        .unwrap_or_default(),
                    connected_nodes: lane.connected_nodes.iter().map(|n| n.0).collect(),
                },
            )
        })
        .collect();

    let nodes = result
        .nodes
        .iter()
        .map(|node| NodeEntry {
            location: coordinate(node.location),
            connections: node
                .connections
                .iter()
                .map(|c| ConnectionEntry {
                    lane: c.lane.ids(),
                    line: c.line.map(coordinate),
                })
                .collect(),
        })
        .collect();

    ResultDocument {
        boundaries,
        lanes,
        nodes,
    }
}

/// Serialize a pipeline result as compact JSON.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if serialization fails, which only
/// happens for non-finite coordinates.
pub fn to_json(result: &TopologyResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string(&to_document(result))?)
}

/// Serialize a pipeline result as indented JSON.
///
/// # Errors
///
/// Same as [`to_json`].
pub fn to_json_pretty(result: &TopologyResult) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(&to_document(result))?)
}

/// Parse a result document, turning key text back into typed keys.
///
/// # Errors
///
/// Returns [`ExportError::Json`] for malformed JSON or a document of the
/// wrong shape, and [`ExportError::InvalidKey`] for a map key that is
/// not a valid boundary or lane key.
pub fn from_json(json: &str) -> Result<ParsedDocument, ExportError> {
    let document: ResultDocument = serde_json::from_str(json)?;
    from_document(document)
}

/// Convert a deserialized document into typed pipeline values.
///
/// # Errors
///
/// Returns [`ExportError::InvalidKey`] for an unparseable map key.
pub fn from_document(document: ResultDocument) -> Result<ParsedDocument, ExportError> {
    let boundaries = document
        .boundaries
        .into_iter()
        .map(|(text, entry)| {
            let key: BoundaryKey = text.parse().map_err(|_| ExportError::InvalidKey(text))?;
            Ok((
                key,
                Boundary {
                    coordinates: entry.coordinates.into_iter().map(point).collect(),
                    lanes: entry.lanes.into_iter().map(lane_key).collect(),
                },
            ))
        })
        .collect::<Result<BTreeMap<_, _>, ExportError>>()?;

    let lanes = document
        .lanes
        .into_iter()
        .map(|(text, entry)| {
            let key: LaneKey = text.parse().map_err(|_| ExportError::InvalidKey(text))?;
            Ok((
                key,
                Lane {
                    centerline: (!entry.centerline.is_empty())
                        .then(|| entry.centerline.into_iter().map(point).collect()),
                    connected_nodes: entry.connected_nodes.into_iter().map(NodeId).collect(),
                },
            ))
        })
        .collect::<Result<BTreeMap<_, _>, ExportError>>()?;

    let nodes = document
        .nodes
        .into_iter()
        .map(|node| IntersectionNode {
            location: point(node.location),
            connections: node
                .connections
                .into_iter()
                .map(|c| Connection {
                    lane: lane_key(c.lane),
                    line: c.line.map(point),
                })
                .collect(),
        })
        .collect();

    Ok(ParsedDocument {
        topology: Topology { boundaries, lanes },
        nodes,
    })
}
