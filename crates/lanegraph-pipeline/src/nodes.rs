//! Intersection nodes where lane centerline endpoints converge.
//!
//! Single greedy pass over the endpoints of lanes whose centerline is
//! longer than `min_lane_length`: each endpoint not yet consumed seeds
//! a group, collects every other unconsumed endpoint closer than
//! `node_merge_distance`, and the group becomes a node at its centroid
//! when it has at least two members. An optional second pass links
//! each lane endpoint to its nearest node within `node_link_distance`.
//!
//! The grouping is order dependent and not iterated; endpoints near
//! the threshold may land in either neighbouring group.

use tracing::debug;

use crate::types::{Connection, IntersectionNode, LaneKey, NodeId, Point, Topology};

/// One end of a lane centerline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Endpoint {
    /// Lane the centerline belongs to.
    pub lane: LaneKey,
    /// Terminal point.
    pub location: Point,
    /// Arc length of the whole centerline.
    pub lane_length: f64,
}

/// Both endpoints of every lane with a centerline, in lane key order.
#[must_use]
pub fn prepare_endpoints(topology: &Topology) -> Vec<Endpoint> {
    topology
        .lanes
        .iter()
        .filter_map(|(&lane, data)| Some((lane, data.centerline.as_ref()?)))
        .flat_map(|(lane, centerline)| {
            let lane_length = centerline.arc_length();
            [centerline.first(), centerline.last()]
                .into_iter()
                .flatten()
                .map(move |&location| Endpoint {
                    lane,
                    location,
                    lane_length,
                })
        })
        .collect()
}

/// Group nearby endpoints into intersection nodes.
#[must_use]
pub fn synthesize_nodes(
    endpoints: &[Endpoint],
    merge_distance: f64,
    min_lane_length: f64,
) -> Vec<IntersectionNode> {
    let eligible: Vec<&Endpoint> = endpoints
        .iter()
        .filter(|e| e.lane_length > min_lane_length)
        .collect();

    let mut consumed = vec![false; eligible.len()];
    let mut nodes = Vec::new();

    for (i, seed) in eligible.iter().enumerate() {
        if consumed[i] {
            continue;
        }
        consumed[i] = true;
        let mut group = vec![*seed];
        for (j, other) in eligible.iter().enumerate() {
            if !consumed[j] && seed.location.distance(other.location) < merge_distance {
                consumed[j] = true;
                group.push(*other);
            }
        }
        if group.len() >= 2 {
            nodes.push(node_from_group(&group));
        }
    }

    debug!(
        endpoints = endpoints.len(),
        eligible = eligible.len(),
        nodes = nodes.len(),
        "intersection nodes synthesized"
    );
    nodes
}

#[allow(clippy::cast_precision_loss)]
fn node_from_group(group: &[&Endpoint]) -> IntersectionNode {
    let n = group.len() as f64;
    let (sx, sy) = group
        .iter()
        .fold((0.0, 0.0), |(sx, sy), e| (sx + e.location.x, sy + e.location.y));
    let location = Point::new(sx / n, sy / n);
    IntersectionNode {
        location,
        connections: group
            .iter()
            .map(|e| Connection {
                lane: e.lane,
                line: [e.location, location],
            })
            .collect(),
    }
}

/// Attach each lane endpoint to the nearest node closer than
/// `link_distance`. A lane lists a node at most once.
///
/// Returns the number of links added.
pub fn link_lanes(topology: &mut Topology, nodes: &[IntersectionNode], link_distance: f64) -> usize {
    let mut links = 0;
    for lane in topology.lanes.values_mut() {
        let Some(centerline) = &lane.centerline else {
            continue;
        };
        let ends: Vec<Point> = [centerline.first(), centerline.last()]
            .into_iter()
            .flatten()
            .copied()
            .collect();
        for end in ends {
            let nearest = nodes
                .iter()
                .enumerate()
                .map(|(i, node)| (NodeId(i), node.location.distance(end)))
                .min_by(|(_, a), (_, b)| a.total_cmp(b));
            if let Some((id, distance)) = nearest
                && distance < link_distance
                && !lane.connected_nodes.contains(&id)
            {
                lane.connected_nodes.push(id);
                links += 1;
            }
        }
    }
    links
}
