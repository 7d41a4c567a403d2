// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use nalgebra::{Point3, Vector3};

use super::NodeId;

/// Index of an anchor slot within its node's shape.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId(pub u16);

/// Where a connector end attaches.
///
/// With a node, `location` and `normal` are node-local. Without one (an
/// orphaned end) they are in diagram space, frozen at the position the end
/// had when it was detached.
#[derive(Clone, Copy, Debug)]
pub struct AnchorPoint {
    pub node: Option<NodeId>,
    pub location: Point3<f64>,
    pub normal: Vector3<f64>,
    pub slot: Option<SlotId>,
}

impl PartialEq for AnchorPoint {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node && self.location == other.location && self.normal == other.normal
    }
}

impl AnchorPoint {
    pub fn on_node(
        node: NodeId,
        location: Point3<f64>,
        normal: Vector3<f64>,
        slot: Option<SlotId>,
    ) -> Self {
        Self {
            node: Some(node),
            location,
            normal,
            slot,
        }
    }

    pub fn orphan(location: Point3<f64>, normal: Vector3<f64>) -> Self {
        Self {
            node: None,
            location,
            normal,
            slot: None,
        }
    }

    pub fn is_orphaned(&self) -> bool {
        self.node.is_none()
    }

    /// Attached, but not one of the node's slots (e.g. placed by hand).
    pub fn is_mixed(&self) -> bool {
        self.node.is_some() && self.slot.is_none()
    }

    /// Both anchors occupy the same slot of the same node. Anchors without a
    /// slot id never share.
    pub fn same_slot(&self, other: &AnchorPoint) -> bool {
        self.node.is_some()
            && self.slot.is_some()
            && self.node == other.node
            && self.slot == other.slot
    }
}
