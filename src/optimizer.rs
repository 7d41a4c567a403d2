// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Crossing-minimizing link optimizer.
//!
//! Each tick visits every connector with both ends attached and tries every
//! combination of the anchors its ends could occupy. The wiring with the
//! fewest crossings against the rest of the diagram wins, ties going to the
//! shortest projected path. A winner only replaces the current wiring when
//! it removes crossings or is meaningfully shorter, so near-ties don't
//! flicker between frames.

use ordered_float::OrderedFloat;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::config::{AnchorSharing, OptimizerConfig};
use crate::diagram::{
    AnchorCandidates, AnchorPoint, ConnectorEnd, ConnectorId, Diagram, End, EndRole, Issue,
};
use crate::geometry::{Segment2, project};
use crate::schedule::Tick;

/// A connector wiring as drawn: its anchors, their roles and the projected
/// straight path between them.
#[derive(Clone, Copy, Debug)]
pub struct AnchorPair {
    pub connector: ConnectorId,
    pub anchors: [AnchorPoint; 2],
    pub roles: [EndRole; 2],
    pub segment: Segment2,
}

impl AnchorPair {
    pub fn project(
        diagram: &Diagram,
        connector: ConnectorId,
        anchors: [AnchorPoint; 2],
        roles: [EndRole; 2],
    ) -> Self {
        let start = project(diagram.projection(), &diagram.resolve(&anchors[0]).0);
        let end = project(diagram.projection(), &diagram.resolve(&anchors[1]).0);
        Self {
            connector,
            anchors,
            roles,
            segment: Segment2::new(start, end),
        }
    }

    /// Current wiring of a connector, if it exists.
    pub fn of(diagram: &Diagram, id: ConnectorId) -> Option<Self> {
        let connector = diagram.connector(id)?;
        Some(Self::project(diagram, id, *connector.anchors(), connector.roles()))
    }

    pub fn squared_length(&self) -> f64 {
        self.segment.squared_length()
    }

    fn same_wiring(&self, other: &AnchorPair) -> bool {
        self.connector == other.connector && self.anchors == other.anchors
    }
}

/// Whether `possible` conflicts with `pair`: either the two share a slot
/// the policy forbids sharing, or their projected paths cross strictly
/// inside both segments. A wiring never crosses itself.
pub fn crosses(possible: &AnchorPair, pair: &AnchorPair, sharing: AnchorSharing) -> bool {
    if possible.same_wiring(pair) {
        return false;
    }

    for (anchor, role) in possible.anchors.iter().zip(possible.roles) {
        for (other, other_role) in pair.anchors.iter().zip(pair.roles) {
            if anchor.same_slot(other) && !sharing.can_share(role, other_role) {
                return true;
            }
        }
    }

    possible.segment.crosses(&pair.segment)
}

/// Number of conflicting connector pairs in the diagram as it stands.
pub fn total_crossings(diagram: &Diagram, sharing: AnchorSharing) -> usize {
    let pairs: Vec<AnchorPair> = diagram
        .connectors()
        .map(|c| AnchorPair::project(diagram, c.id(), *c.anchors(), c.roles()))
        .collect();

    let mut total = 0;
    for (i, a) in pairs.iter().enumerate() {
        total += pairs[i + 1..]
            .iter()
            .filter(|b| crosses(a, b, sharing))
            .count();
    }
    total
}

pub struct LinkOptimizer {
    config: OptimizerConfig,
    synced: Option<Issue>,
    connectors: Vec<ConnectorId>,
    disposed: bool,
}

impl LinkOptimizer {
    pub fn new(config: OptimizerConfig) -> Self {
        Self {
            config,
            synced: None,
            connectors: Vec::new(),
            disposed: false,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn set_sharing(&mut self, sharing: AnchorSharing) {
        self.config.sharing = sharing;
    }

    /// Connectors tracked since the last structural change.
    pub fn connectors(&self) -> &[ConnectorId] {
        &self.connectors
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn dispose(&mut self) {
        self.disposed = true;
        self.connectors.clear();
        self.synced = None;
    }

    fn resync(&mut self, diagram: &Diagram) {
        self.connectors = diagram.connectors().map(|c| c.id()).collect();
        self.synced = Some(diagram.issue());
        debug!(
            connectors = self.connectors.len(),
            issue = diagram.issue().0,
            "link optimizer resynced"
        );
    }

    /// Conflicts between `wiring` and every baseline pair other than the one
    /// at `skip`, counting no further than `stop_at`.
    fn count_crossings(
        &self,
        wiring: &AnchorPair,
        baseline: &[AnchorPair],
        skip: usize,
        stop_at: usize,
    ) -> usize {
        let mut count = 0;
        for (i, pair) in baseline.iter().enumerate() {
            if count >= stop_at {
                break;
            }
            if i != skip && crosses(wiring, pair, self.config.sharing) {
                count += 1;
            }
        }
        count
    }

    /// Anchors one end may move to: the free slots of its node, plus its
    /// current slot. Hand-placed anchors are not offered back.
    fn candidates(
        &self,
        diagram: &Diagram,
        id: ConnectorId,
        end: End,
        current: &AnchorPoint,
    ) -> AnchorCandidates {
        let mut candidates =
            diagram.available_anchors(ConnectorEnd::new(id, end), self.config.sharing);
        if !current.is_mixed() && !candidates.contains(current) {
            candidates.push(*current);
        }
        candidates
    }

    /// One pass over every connector. Returns how many were rewired.
    pub fn step(&mut self, diagram: &mut Diagram) -> usize {
        if self.disposed {
            return 0;
        }
        if self.synced != Some(diagram.issue()) {
            self.resync(diagram);
        }

        let mut baseline: Vec<AnchorPair> = self
            .connectors
            .iter()
            .filter_map(|&id| AnchorPair::of(diagram, id))
            .collect();

        let cap = self.config.max_crossings_checked;
        let mut rewired = 0;

        for idx in 0..baseline.len() {
            let current = baseline[idx];
            let id = current.connector;
            if current.anchors.iter().any(AnchorPoint::is_orphaned) {
                continue;
            }

            let [start, finish] = End::BOTH
                .map(|end| self.candidates(diagram, id, end, &current.anchors[end.index()]));
            if start.is_empty() || finish.is_empty() {
                continue;
            }

            let current_count = self.count_crossings(&current, &baseline, idx, cap);

            let mut best_count: Option<usize> = None;
            let mut best: SmallVec<[AnchorPair; 8]> = SmallVec::new();
            for a in &start {
                for b in &finish {
                    let possible = AnchorPair::project(diagram, id, [*a, *b], current.roles);
                    let stop_at = best_count.map_or(cap, |n| cap.min(n + 1));
                    let count = self.count_crossings(&possible, &baseline, idx, stop_at);
                    match best_count {
                        Some(n) if count > n => continue,
                        Some(n) if count == n => {}
                        _ => {
                            best_count = Some(count);
                            best.clear();
                        }
                    }
                    best.push(possible);
                }
            }

            let (Some(best_count), Some(choice)) = (
                best_count,
                best.iter().min_by_key(|p| OrderedFloat(p.squared_length())),
            ) else {
                continue;
            };

            if choice.anchors == current.anchors {
                continue;
            }

            let current_len = current.squared_length();
            let choice_len = choice.squared_length();
            trace!(
                connector = %id,
                current_count,
                best_count,
                current_len,
                choice_len,
                "link optimizer candidate"
            );

            if best_count < current_count
                || choice_len < self.config.hysteresis_ratio * current_len
            {
                diagram.rewire(id, choice.anchors);
                baseline[idx] = *choice;
                rewired += 1;
                debug!(
                    connector = %id,
                    crossings_before = current_count,
                    crossings_after = best_count,
                    "connector rewired"
                );
            }
        }

        rewired
    }
}

impl Tick for LinkOptimizer {
    fn tick(&mut self, diagram: &mut Diagram) {
        self.step(diagram);
    }

    fn dispose(&mut self) {
        LinkOptimizer::dispose(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagram::{NodeId, NodeShape, SlotId};
    use nalgebra::{Point3, Vector3};
    use proptest::prelude::*;

    fn square() -> Vector3<f64> {
        Vector3::new(2.0, 2.0, 0.0)
    }

    fn slot(diagram: &Diagram, node: NodeId, index: usize) -> AnchorPoint {
        diagram.node(node).unwrap().anchors()[index]
    }

    fn slot_of(diagram: &Diagram, id: ConnectorId, end: End) -> Option<SlotId> {
        diagram.connector(id).unwrap().anchor(end).slot
    }

    #[test]
    fn test_wiring_never_crosses_itself() {
        let mut diagram = Diagram::new();
        let a = diagram.add_node(NodeShape::Rectangle, Point3::origin(), square());
        let b = diagram.add_node(NodeShape::Rectangle, Point3::new(10.0, 0.0, 0.0), square());
        let c = diagram.connect(a, b).unwrap();

        let pair = AnchorPair::of(&diagram, c).unwrap();
        for sharing in [
            AnchorSharing::ShareAll,
            AnchorSharing::ShareSameOnly,
            AnchorSharing::NoSharing,
        ] {
            assert!(!crosses(&pair, &pair, sharing));
        }
    }

    #[test]
    fn test_forbidden_sharing_counts_as_crossing() {
        let mut diagram = Diagram::new();
        let a = diagram.add_node(NodeShape::Rectangle, Point3::origin(), square());
        let b = diagram.add_node(NodeShape::Rectangle, Point3::new(10.0, 0.0, 0.0), square());
        let c = diagram.add_node(NodeShape::Rectangle, Point3::new(10.0, 1.0, 0.0), square());
        let ab = diagram.connect(a, b).unwrap();
        let ac = diagram.connect(a, c).unwrap();

        let p = AnchorPair::of(&diagram, ab).unwrap();
        let q = AnchorPair::of(&diagram, ac).unwrap();
        assert!(p.anchors[0].same_slot(&q.anchors[0]));
        assert!(!p.segment.crosses(&q.segment));

        // both are tails on the same slot
        assert!(!crosses(&p, &q, AnchorSharing::ShareAll));
        assert!(!crosses(&p, &q, AnchorSharing::ShareSameOnly));
        assert!(crosses(&p, &q, AnchorSharing::NoSharing));

        diagram.set_end_roles(ac, [EndRole::Head, EndRole::Tail]).unwrap();
        let q = AnchorPair::of(&diagram, ac).unwrap();
        assert!(crosses(&p, &q, AnchorSharing::ShareSameOnly));
    }

    #[test]
    fn test_no_sharing_moves_connector_off_shared_slot() {
        let build = || {
            let mut diagram = Diagram::new();
            let a = diagram.add_node(NodeShape::Rectangle, Point3::origin(), square());
            let b = diagram.add_node(NodeShape::Rectangle, Point3::new(10.0, 0.0, 0.0), square());
            let c = diagram.add_node(NodeShape::Rectangle, Point3::new(10.0, 1.0, 0.0), square());
            let ab = diagram.connect(a, b).unwrap();
            let ac = diagram.connect(a, c).unwrap();
            (diagram, ab, ac)
        };

        let (mut diagram, ab, ac) = build();
        let mut optimizer = LinkOptimizer::new(OptimizerConfig::default());
        assert_eq!(optimizer.step(&mut diagram), 0);
        assert_eq!(slot_of(&diagram, ab, End::Start), slot_of(&diagram, ac, End::Start));

        let (mut diagram, ab, ac) = build();
        diagram.take_dirty_connectors();
        let mut optimizer = LinkOptimizer::new(OptimizerConfig {
            sharing: AnchorSharing::NoSharing,
            ..OptimizerConfig::default()
        });
        assert_eq!(optimizer.step(&mut diagram), 1);
        assert_eq!(slot_of(&diagram, ab, End::Start), Some(SlotId(3)));
        assert_eq!(slot_of(&diagram, ac, End::Start), Some(SlotId(0)));
        assert_eq!(total_crossings(&diagram, AnchorSharing::NoSharing), 0);
        assert_eq!(diagram.take_dirty_connectors(), vec![ab]);

        for _ in 0..10 {
            assert_eq!(optimizer.step(&mut diagram), 0);
        }
    }

    #[test]
    fn test_hysteresis_holds_near_tie() {
        // the second slot of `a` sits a hair higher, making one wiring
        // shorter by about a hundredth of a percent
        let a_shape = NodeShape::Custom(vec![
            (Point3::new(1.0, 0.0, 0.0), Vector3::x()),
            (Point3::new(0.0, 1.001, 0.0), Vector3::y()),
        ]);
        let b_shape = NodeShape::Custom(vec![
            (Point3::new(-1.0, 0.0, 0.0), -Vector3::x()),
            (Point3::new(0.0, -1.0, 0.0), -Vector3::y()),
        ]);

        let build = || {
            let mut diagram = Diagram::new();
            let a = diagram.add_node(a_shape.clone(), Point3::origin(), square());
            let b = diagram.add_node(b_shape.clone(), Point3::new(10.0, 10.0, 0.0), square());
            let c = diagram
                .add_connector(slot(&diagram, a, 0), slot(&diagram, b, 1))
                .unwrap();
            (diagram, c)
        };

        let (mut diagram, c) = build();
        let before = *diagram.connector(c).unwrap().anchors();
        let mut optimizer = LinkOptimizer::new(OptimizerConfig::default());
        for _ in 0..50 {
            assert_eq!(optimizer.step(&mut diagram), 0);
            assert_eq!(*diagram.connector(c).unwrap().anchors(), before);
        }

        // with no margin the marginally shorter wiring wins once, then sticks
        let (mut diagram, c) = build();
        let mut optimizer = LinkOptimizer::new(OptimizerConfig {
            hysteresis_ratio: 1.0,
            ..OptimizerConfig::default()
        });
        assert_eq!(optimizer.step(&mut diagram), 1);
        assert_eq!(slot_of(&diagram, c, End::Start), Some(SlotId(1)));
        assert_eq!(slot_of(&diagram, c, End::Finish), Some(SlotId(0)));
        for _ in 0..10 {
            assert_eq!(optimizer.step(&mut diagram), 0);
        }
    }

    #[test]
    fn test_skips_dangling_and_slotless() {
        let mut diagram = Diagram::new();
        let a = diagram.add_node(NodeShape::Rectangle, Point3::origin(), square());
        let b = diagram.add_node(NodeShape::Rectangle, Point3::new(10.0, 5.0, 0.0), square());
        let bare = diagram.add_node(
            NodeShape::Custom(vec![]),
            Point3::new(0.0, 10.0, 0.0),
            square(),
        );

        let dangling = diagram
            .add_connector(slot(&diagram, a, 1), slot(&diagram, b, 0))
            .unwrap();
        diagram.detach(ConnectorEnd::new(dangling, End::Finish)).unwrap();
        let slotless = diagram.connect(a, bare).unwrap();
        diagram.take_dirty_connectors();

        let dangling_before = *diagram.connector(dangling).unwrap().anchors();
        let slotless_before = *diagram.connector(slotless).unwrap().anchors();

        let mut optimizer = LinkOptimizer::new(OptimizerConfig::default());
        assert_eq!(optimizer.step(&mut diagram), 0);
        assert_eq!(*diagram.connector(dangling).unwrap().anchors(), dangling_before);
        assert_eq!(*diagram.connector(slotless).unwrap().anchors(), slotless_before);
        assert!(diagram.take_dirty_connectors().is_empty());
    }

    #[test]
    fn test_crossing_count_is_capped() {
        // one long horizontal connector under a fence of short vertical ones
        let mut diagram = Diagram::new();
        let left = diagram.add_node(NodeShape::Rectangle, Point3::origin(), square());
        let right = diagram.add_node(NodeShape::Rectangle, Point3::new(40.0, 0.0, 0.0), square());
        let long = diagram.connect(left, right).unwrap();
        for i in 0..8 {
            let x = 5.0 + 4.0 * f64::from(i);
            let top = Point3::new(x, 5.0, 0.0);
            let bottom = Point3::new(x, -5.0, 0.0);
            let top = diagram.add_node(NodeShape::Rectangle, top, square());
            let bottom = diagram.add_node(NodeShape::Rectangle, bottom, square());
            diagram.connect(top, bottom).unwrap();
        }

        let mut optimizer = LinkOptimizer::new(OptimizerConfig::default());
        optimizer.step(&mut diagram);
        let baseline: Vec<AnchorPair> = optimizer
            .connectors()
            .iter()
            .filter_map(|&id| AnchorPair::of(&diagram, id))
            .collect();
        let idx = baseline.iter().position(|p| p.connector == long).unwrap();

        assert_eq!(optimizer.count_crossings(&baseline[idx], &baseline, idx, usize::MAX), 8);
        assert_eq!(optimizer.count_crossings(&baseline[idx], &baseline, idx, 5), 5);
    }

    #[test]
    fn test_dispose_stops_work() {
        let mut diagram = Diagram::new();
        let a = diagram.add_node(NodeShape::Rectangle, Point3::origin(), square());
        let b = diagram.add_node(NodeShape::Rectangle, Point3::new(10.0, 0.0, 0.0), square());
        diagram
            .add_connector(slot(&diagram, a, 2), slot(&diagram, b, 0))
            .unwrap();

        let mut optimizer = LinkOptimizer::new(OptimizerConfig::default());
        optimizer.dispose();
        assert!(optimizer.is_disposed());
        assert_eq!(optimizer.step(&mut diagram), 0);
        assert!(optimizer.connectors().is_empty());
    }

    fn shape_strategy() -> impl Strategy<Value = NodeShape> {
        prop_oneof![
            Just(NodeShape::Rectangle),
            (3u16..12).prop_map(|segments| NodeShape::Ellipse { segments }),
            prop::collection::vec((-1.0f64..1.0, -1.0f64..1.0), 1..6).prop_map(|points| {
                NodeShape::Custom(
                    points
                        .into_iter()
                        .map(|(x, y)| (Point3::new(x, y, 0.0), Vector3::x()))
                        .collect(),
                )
            }),
        ]
    }

    proptest! {
        #[test]
        fn prop_no_wiring_crosses_itself(
            nodes in prop::collection::vec(
                ((-50.0f64..50.0, -50.0f64..50.0), shape_strategy()),
                2..6,
            ),
            slots in prop::collection::vec((0usize..16, 0usize..16, any::<bool>()), 1..8),
        ) {
            let mut diagram = Diagram::new();
            let ids: Vec<NodeId> = nodes
                .into_iter()
                .map(|((x, y), shape)| diagram.add_node(shape, Point3::new(x, y, 0.0), square()))
                .collect();

            for (i, &(from_slot, to_slot, reversed)) in slots.iter().enumerate() {
                let from = ids[i % ids.len()];
                let to = ids[(i + 1) % ids.len()];
                let pick = |node: NodeId, index: usize| {
                    let anchors = diagram.node(node).unwrap().anchors();
                    anchors[index % anchors.len()]
                };
                let (start, finish) = (pick(from, from_slot), pick(to, to_slot));
                let id = diagram.add_connector(start, finish).unwrap();
                if reversed {
                    diagram.set_end_roles(id, [EndRole::Head, EndRole::Tail]).unwrap();
                }
            }

            for connector in diagram.connectors() {
                let pair = AnchorPair::of(&diagram, connector.id()).unwrap();
                for sharing in [
                    AnchorSharing::ShareAll,
                    AnchorSharing::ShareSameOnly,
                    AnchorSharing::NoSharing,
                ] {
                    prop_assert!(
                        !crosses(&pair, &pair, sharing),
                        "{} crosses itself",
                        pair.connector
                    );
                }
            }
        }
    }
}
