// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use super::anchor::AnchorPoint;
use super::{ConnectorId, NodeId};

/// One of a connector's two ends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum End {
    Start,
    Finish,
}

impl End {
    pub const BOTH: [End; 2] = [End::Start, End::Finish];

    pub fn index(self) -> usize {
        match self {
            End::Start => 0,
            End::Finish => 1,
        }
    }

    pub fn other(self) -> End {
        match self {
            End::Start => End::Finish,
            End::Finish => End::Start,
        }
    }
}

/// Logical role of a connector end, consulted by the anchor sharing policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EndRole {
    Tail,
    Head,
}

/// Names a single end of a specific connector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConnectorEnd {
    pub connector: ConnectorId,
    pub end: End,
}

impl ConnectorEnd {
    pub fn new(connector: ConnectorId, end: End) -> Self {
        Self { connector, end }
    }
}

#[derive(Clone, Debug)]
pub struct Connector {
    pub(super) id: ConnectorId,
    pub(super) anchors: [AnchorPoint; 2],
    pub(super) roles: [EndRole; 2],
    pub(super) dirty: bool,
}

impl Connector {
    pub fn id(&self) -> ConnectorId {
        self.id
    }

    pub fn anchors(&self) -> &[AnchorPoint; 2] {
        &self.anchors
    }

    pub fn anchor(&self, end: End) -> &AnchorPoint {
        &self.anchors[end.index()]
    }

    pub fn roles(&self) -> [EndRole; 2] {
        self.roles
    }

    pub fn role(&self, end: End) -> EndRole {
        self.roles[end.index()]
    }

    pub fn node(&self, end: End) -> Option<NodeId> {
        self.anchors[end.index()].node
    }

    pub fn is_dangling(&self) -> bool {
        self.anchors[0].node.is_none() || self.anchors[1].node.is_none()
    }

    pub fn is_loop(&self) -> bool {
        self.anchors[0].node.is_some() && self.anchors[0].node == self.anchors[1].node
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.anchors.iter().any(|a| a.node == Some(node))
    }

    /// Set when the optimizer rewires this connector; cleared when the
    /// renderer drains it.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{Point3, Vector3};

    fn connector(a: Option<u32>, b: Option<u32>) -> Connector {
        let anchor = |n: Option<u32>| match n {
            Some(id) => AnchorPoint::on_node(NodeId(id), Point3::origin(), Vector3::x(), None),
            None => AnchorPoint::orphan(Point3::origin(), Vector3::x()),
        };
        Connector {
            id: ConnectorId(1),
            anchors: [anchor(a), anchor(b)],
            roles: [EndRole::Tail, EndRole::Head],
            dirty: false,
        }
    }

    #[test]
    fn test_dangling_and_loop() {
        let normal = connector(Some(1), Some(2));
        assert!(!normal.is_dangling());
        assert!(!normal.is_loop());

        let dangling = connector(Some(1), None);
        assert!(dangling.is_dangling());
        assert!(!dangling.is_loop());

        let floating = connector(None, None);
        assert!(floating.is_dangling());
        assert!(!floating.is_loop(), "two orphaned ends are not a loop");

        let self_loop = connector(Some(3), Some(3));
        assert!(!self_loop.is_dangling());
        assert!(self_loop.is_loop());
        assert!(self_loop.touches(NodeId(3)));
        assert!(!self_loop.touches(NodeId(1)));
    }

    #[test]
    fn test_end_indexing() {
        assert_eq!(End::Start.index(), 0);
        assert_eq!(End::Finish.index(), 1);
        assert_eq!(End::Start.other(), End::Finish);

        let c = connector(Some(1), Some(2));
        assert_eq!(c.node(End::Start), Some(NodeId(1)));
        assert_eq!(c.node(End::Finish), Some(NodeId(2)));
        assert_eq!(c.role(End::Finish), EndRole::Head);
    }
}
