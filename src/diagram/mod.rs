// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! The node/connector graph both layout algorithms operate on.
//!
//! Nodes and connectors live in arenas keyed by handle. Which connectors are
//! attached to a node is never stored on the node; it is derived by scanning
//! connector anchors, so there is no back-reference to keep in sync.

pub mod anchor;
pub mod connector;
pub mod node;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};
use smallvec::SmallVec;

use crate::common::Result;
use crate::config::AnchorSharing;
use crate::layout_err;

pub use self::anchor::{AnchorPoint, SlotId};
pub use self::connector::{Connector, ConnectorEnd, End, EndRole};
pub use self::node::{Node, NodeShape};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectorId(pub u32);

impl fmt::Display for ConnectorId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Structural version stamp. Changes whenever nodes or connectors are added
/// or removed, or a connector end is attached or detached; never for
/// position, size or selection changes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Issue(pub u64);

/// Candidate anchors for one connector end; most shapes have a handful.
pub type AnchorCandidates = SmallVec<[AnchorPoint; 8]>;

#[derive(Clone, Debug)]
pub struct Diagram {
    nodes: BTreeMap<NodeId, Node>,
    connectors: BTreeMap<ConnectorId, Connector>,
    selected: BTreeSet<NodeId>,
    projection: Matrix4<f64>,
    issue: Issue,
    next_node: u32,
    next_connector: u32,
}

impl Default for Diagram {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagram {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            connectors: BTreeMap::new(),
            selected: BTreeSet::new(),
            projection: Matrix4::identity(),
            issue: Issue(0),
            next_node: 1,
            next_connector: 1,
        }
    }

    pub fn issue(&self) -> Issue {
        self.issue
    }

    fn bump_issue(&mut self) {
        self.issue = Issue(self.issue.0 + 1);
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn connectors(&self) -> impl Iterator<Item = &Connector> {
        self.connectors.values()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn connector(&self, id: ConnectorId) -> Option<&Connector> {
        self.connectors.get(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn connector_count(&self) -> usize {
        self.connectors.len()
    }

    /// World to view-plane transform used when testing connectors for
    /// crossings.
    pub fn projection(&self) -> &Matrix4<f64> {
        &self.projection
    }

    pub fn set_projection(&mut self, projection: Matrix4<f64>) {
        self.projection = projection;
    }

    pub fn add_node(
        &mut self,
        shape: NodeShape,
        position: Point3<f64>,
        size: Vector3<f64>,
    ) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(
            id,
            Node {
                id,
                name: None,
                position,
                rotation: UnitQuaternion::identity(),
                size,
                shape,
            },
        );
        self.bump_issue();
        id
    }

    /// Remove a node. Connector ends attached to it are left dangling at
    /// their last world position.
    pub fn remove_node(&mut self, id: NodeId) -> Result<Node> {
        let attached: Vec<ConnectorEnd> = self
            .connectors
            .values()
            .flat_map(|c| {
                End::BOTH
                    .into_iter()
                    .filter(move |&end| c.node(end) == Some(id))
                    .map(move |end| ConnectorEnd::new(c.id, end))
            })
            .collect();
        for end in attached {
            self.orphan_end(end);
        }

        let Some(node) = self.nodes.remove(&id) else {
            return layout_err!(Diagram, NoSuchNode, format!("{id}"));
        };
        self.selected.remove(&id);
        self.bump_issue();
        Ok(node)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        match self.nodes.get_mut(&id) {
            Some(node) => Ok(node),
            None => layout_err!(Diagram, NoSuchNode, format!("{id}")),
        }
    }

    fn connector_mut(&mut self, id: ConnectorId) -> Result<&mut Connector> {
        match self.connectors.get_mut(&id) {
            Some(connector) => Ok(connector),
            None => layout_err!(Diagram, NoSuchConnector, format!("{id}")),
        }
    }

    /// Display name; purely informational.
    pub fn set_node_name(&mut self, id: NodeId, name: Option<String>) -> Result<()> {
        self.node_mut(id)?.name = name;
        Ok(())
    }

    pub fn set_node_position(&mut self, id: NodeId, position: Point3<f64>) -> Result<()> {
        self.node_mut(id)?.position = position;
        Ok(())
    }

    pub fn set_node_rotation(&mut self, id: NodeId, rotation: UnitQuaternion<f64>) -> Result<()> {
        self.node_mut(id)?.rotation = rotation;
        Ok(())
    }

    /// Resize a node. Attached slot anchors move to their slot on the new
    /// outline; anchors placed off-slot scale with the node's extents.
    pub fn set_node_size(&mut self, id: NodeId, size: Vector3<f64>) -> Result<()> {
        let node = self.node_mut(id)?;
        let old = std::mem::replace(&mut node.size, size);
        let slots = node.anchors();

        let ratio = |axis: usize| {
            if old[axis] == 0.0 {
                1.0
            } else {
                size[axis] / old[axis]
            }
        };
        let scale = Vector3::new(ratio(0), ratio(1), ratio(2));

        for connector in self.connectors.values_mut() {
            for end in End::BOTH {
                let anchor = &mut connector.anchors[end.index()];
                if anchor.node != Some(id) {
                    continue;
                }
                match anchor.slot.and_then(|slot| slots.get(usize::from(slot.0))) {
                    Some(fresh) => *anchor = *fresh,
                    None => {
                        anchor.location = Point3::from(anchor.location.coords.component_mul(&scale))
                    }
                }
                connector.dirty = true;
            }
        }
        Ok(())
    }

    /// Replacing a shape changes the node's slot set, so attached ends are
    /// re-snapped to the nearest new slot.
    pub fn set_node_shape(&mut self, id: NodeId, shape: NodeShape) -> Result<()> {
        self.node_mut(id)?.shape = shape;

        let attached: Vec<(ConnectorEnd, Point3<f64>)> = self
            .connectors
            .values()
            .flat_map(|c| {
                End::BOTH
                    .into_iter()
                    .filter(move |&end| c.node(end) == Some(id))
                    .map(move |end| ConnectorEnd::new(c.id, end))
            })
            .map(|end| (end, self.end_position(end)))
            .collect();
        for (end, at) in attached {
            self.snap_end(end, id, &at);
        }

        self.bump_issue();
        Ok(())
    }

    pub fn is_selected(&self, id: NodeId) -> bool {
        self.selected.contains(&id)
    }

    pub fn selected(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.selected.iter().copied()
    }

    pub fn select(&mut self, id: NodeId) -> Result<()> {
        if !self.nodes.contains_key(&id) {
            return layout_err!(Diagram, NoSuchNode, format!("{id}"));
        }
        self.selected.insert(id);
        Ok(())
    }

    pub fn deselect(&mut self, id: NodeId) {
        self.selected.remove(&id);
    }

    pub fn clear_selection(&mut self) {
        self.selected.clear();
    }

    fn check_anchor(&self, anchor: &AnchorPoint) -> Result<()> {
        match anchor.node {
            Some(id) if !self.nodes.contains_key(&id) => {
                layout_err!(Diagram, NoSuchNode, format!("{id}"))
            }
            _ => Ok(()),
        }
    }

    pub fn add_connector(
        &mut self,
        start: AnchorPoint,
        finish: AnchorPoint,
    ) -> Result<ConnectorId> {
        self.check_anchor(&start)?;
        self.check_anchor(&finish)?;

        let id = ConnectorId(self.next_connector);
        self.next_connector += 1;
        self.connectors.insert(
            id,
            Connector {
                id,
                anchors: [start, finish],
                roles: [EndRole::Tail, EndRole::Head],
                dirty: true,
            },
        );
        self.bump_issue();
        Ok(id)
    }

    /// Connect two nodes, each end taking the slot nearest the other node.
    /// A node without slots gets a slotless anchor at its centre.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<ConnectorId> {
        let from_pos = self.node(from).map(|n| n.position);
        let to_pos = self.node(to).map(|n| n.position);
        let (Some(from_pos), Some(to_pos)) = (from_pos, to_pos) else {
            let missing = if from_pos.is_none() { from } else { to };
            return layout_err!(Diagram, NoSuchNode, format!("{missing}"));
        };

        let start = self.anchor_toward(from, &to_pos)?;
        let finish = self.anchor_toward(to, &from_pos)?;
        self.add_connector(start, finish)
    }

    fn anchor_toward(&self, node: NodeId, target: &Point3<f64>) -> Result<AnchorPoint> {
        let Some(n) = self.node(node) else {
            return layout_err!(Diagram, NoSuchNode, format!("{node}"));
        };
        let centre = || AnchorPoint::on_node(node, Point3::origin(), Vector3::zeros(), None);
        Ok(n.nearest_anchor(target).unwrap_or_else(centre))
    }

    pub fn remove_connector(&mut self, id: ConnectorId) -> Result<Connector> {
        let Some(connector) = self.connectors.remove(&id) else {
            return layout_err!(Diagram, NoSuchConnector, format!("{id}"));
        };
        self.bump_issue();
        Ok(connector)
    }

    pub fn set_end_roles(&mut self, id: ConnectorId, roles: [EndRole; 2]) -> Result<()> {
        self.connector_mut(id)?.roles = roles;
        Ok(())
    }

    /// Attach a connector end to the slot of `node` nearest `toward`.
    pub fn attach(&mut self, end: ConnectorEnd, node: NodeId, toward: &Point3<f64>) -> Result<()> {
        let anchor = self.anchor_toward(node, toward)?;
        let connector = self.connector_mut(end.connector)?;
        connector.anchors[end.end.index()] = anchor;
        connector.dirty = true;
        self.bump_issue();
        Ok(())
    }

    /// Detach a connector end, leaving it at its current world position.
    pub fn detach(&mut self, end: ConnectorEnd) -> Result<()> {
        if !self.connectors.contains_key(&end.connector) {
            return layout_err!(Diagram, NoSuchConnector, format!("{}", end.connector));
        }
        self.orphan_end(end);
        self.bump_issue();
        Ok(())
    }

    fn orphan_end(&mut self, end: ConnectorEnd) {
        let Some(connector) = self.connectors.get(&end.connector) else {
            return;
        };
        let (location, normal) = self.resolve(connector.anchor(end.end));
        if let Some(connector) = self.connectors.get_mut(&end.connector) {
            connector.anchors[end.end.index()] = AnchorPoint::orphan(location, normal);
            connector.dirty = true;
        }
    }

    fn end_position(&self, end: ConnectorEnd) -> Point3<f64> {
        self.connectors
            .get(&end.connector)
            .map(|c| self.resolve(c.anchor(end.end)).0)
            .unwrap_or_else(Point3::origin)
    }

    fn snap_end(&mut self, end: ConnectorEnd, node: NodeId, at: &Point3<f64>) {
        let Ok(anchor) = self.anchor_toward(node, at) else {
            return;
        };
        if let Some(connector) = self.connectors.get_mut(&end.connector) {
            connector.anchors[end.end.index()] = anchor;
            connector.dirty = true;
        }
    }

    /// Replace both anchors of a connector whose ends stay on the same
    /// nodes. This is not a structural change.
    pub(crate) fn rewire(&mut self, id: ConnectorId, anchors: [AnchorPoint; 2]) {
        if let Some(connector) = self.connectors.get_mut(&id) {
            connector.anchors = anchors;
            connector.dirty = true;
        }
    }

    /// World-space location and normal of an anchor. Orphaned anchors are
    /// already in world space.
    pub fn resolve(&self, anchor: &AnchorPoint) -> (Point3<f64>, Vector3<f64>) {
        match anchor.node.and_then(|id| self.nodes.get(&id)) {
            Some(node) => node.to_world(anchor),
            None => (anchor.location, anchor.normal),
        }
    }

    /// Connectors with at least one end on `node`.
    pub fn connectors_of(&self, node: NodeId) -> impl Iterator<Item = &Connector> {
        self.connectors.values().filter(move |c| c.touches(node))
    }

    pub fn nearest_anchor(&self, node: NodeId, target: &Point3<f64>) -> Option<AnchorPoint> {
        self.nodes.get(&node)?.nearest_anchor(target)
    }

    /// Slots of the node under `end` that `end` could move to without
    /// sharing a slot the policy forbids sharing. Occupancy by `end` itself
    /// is ignored. Orphaned ends have no candidates.
    pub fn available_anchors(&self, end: ConnectorEnd, sharing: AnchorSharing) -> AnchorCandidates {
        let Some(connector) = self.connectors.get(&end.connector) else {
            return AnchorCandidates::new();
        };
        let Some(node) = connector.node(end.end).and_then(|id| self.nodes.get(&id)) else {
            return AnchorCandidates::new();
        };
        let role = connector.role(end.end);

        node.anchors()
            .into_iter()
            .filter(|candidate| {
                self.connectors.values().all(|other| {
                    End::BOTH.into_iter().all(|other_end| {
                        if other.id == end.connector && other_end == end.end {
                            return true;
                        }
                        !other.anchor(other_end).same_slot(candidate)
                            || sharing.can_share(role, other.role(other_end))
                    })
                })
            })
            .collect()
    }

    /// Drain the set of connectors whose anchors changed since the last
    /// call.
    pub fn take_dirty_connectors(&mut self) -> Vec<ConnectorId> {
        let mut dirty = Vec::new();
        for connector in self.connectors.values_mut() {
            if connector.dirty {
                connector.dirty = false;
                dirty.push(connector.id);
            }
        }
        dirty
    }
}
