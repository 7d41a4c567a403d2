// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::f64::consts::PI;

use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion, Vector3};
use ordered_float::OrderedFloat;

use super::NodeId;
use super::anchor::{AnchorPoint, SlotId};

/// Outline a node's anchor slots are derived from.
///
/// Slot locations are expressed in the unit box `[-1, 1]^3` and scaled by
/// half the node size.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeShape {
    /// Face midpoints, in the order +x, +y, -x, -y.
    Rectangle,
    /// Evenly spaced points on the ellipse inscribed in the xy extents,
    /// starting at +x and winding counter-clockwise.
    Ellipse { segments: u16 },
    /// Caller-supplied unit-box locations and outward normals.
    Custom(Vec<(Point3<f64>, Vector3<f64>)>),
}

impl NodeShape {
    fn unit_slots(&self) -> Vec<(Point3<f64>, Vector3<f64>)> {
        match self {
            NodeShape::Rectangle => vec![
                (Point3::new(1.0, 0.0, 0.0), Vector3::x()),
                (Point3::new(0.0, 1.0, 0.0), Vector3::y()),
                (Point3::new(-1.0, 0.0, 0.0), -Vector3::x()),
                (Point3::new(0.0, -1.0, 0.0), -Vector3::y()),
            ],
            NodeShape::Ellipse { segments } => {
                let step = 2.0 * PI / f64::from(*segments);
                (0..*segments)
                    .map(|i| {
                        let angle = f64::from(i) * step;
                        let dir = Vector3::new(angle.cos(), angle.sin(), 0.0);
                        (Point3::from(dir), dir)
                    })
                    .collect()
            }
            NodeShape::Custom(slots) => slots.clone(),
        }
    }
}

/// A box on the diagram. Fields are only mutated through the owning
/// `Diagram` so structural edits always bump its issue counter.
#[derive(Clone, Debug)]
pub struct Node {
    pub(super) id: NodeId,
    pub(super) name: Option<String>,
    pub(super) position: Point3<f64>,
    pub(super) rotation: UnitQuaternion<f64>,
    pub(super) size: Vector3<f64>,
    pub(super) shape: NodeShape,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn position(&self) -> Point3<f64> {
        self.position
    }

    pub fn rotation(&self) -> UnitQuaternion<f64> {
        self.rotation
    }

    pub fn size(&self) -> Vector3<f64> {
        self.size
    }

    pub fn half_extents(&self) -> Vector3<f64> {
        self.size * 0.5
    }

    pub fn shape(&self) -> &NodeShape {
        &self.shape
    }

    pub fn world_transform(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.position.coords), self.rotation)
    }

    /// Every candidate anchor of this node, in slot order.
    pub fn anchors(&self) -> Vec<AnchorPoint> {
        let half = self.half_extents();
        self.shape
            .unit_slots()
            .into_iter()
            .enumerate()
            .map(|(i, (unit, normal))| {
                let location = Point3::from(unit.coords.component_mul(&half));
                AnchorPoint::on_node(self.id, location, normal, Some(SlotId(i as u16)))
            })
            .collect()
    }

    /// World-space location and normal of an anchor given in this node's
    /// local frame.
    pub fn to_world(&self, anchor: &AnchorPoint) -> (Point3<f64>, Vector3<f64>) {
        let xf = self.world_transform();
        (
            xf.transform_point(&anchor.location),
            xf.transform_vector(&anchor.normal),
        )
    }

    /// The slot closest to `target` in world space. `None` for shapes
    /// without slots.
    pub fn nearest_anchor(&self, target: &Point3<f64>) -> Option<AnchorPoint> {
        self.anchors()
            .into_iter()
            .min_by_key(|anchor| OrderedFloat((self.to_world(anchor).0 - target).norm_squared()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(shape: NodeShape) -> Node {
        Node {
            id: NodeId(1),
            name: None,
            position: Point3::new(10.0, 20.0, 0.0),
            rotation: UnitQuaternion::identity(),
            size: Vector3::new(4.0, 2.0, 0.0),
            shape,
        }
    }

    #[test]
    fn test_rectangle_anchors() {
        let n = node(NodeShape::Rectangle);
        let anchors = n.anchors();
        assert_eq!(anchors.len(), 4);

        let (right, normal) = n.to_world(&anchors[0]);
        assert!((right - Point3::new(12.0, 20.0, 0.0)).norm() < 1e-12);
        assert!((normal - Vector3::x()).norm() < 1e-12);

        let (top, _) = n.to_world(&anchors[1]);
        assert!((top - Point3::new(10.0, 21.0, 0.0)).norm() < 1e-12);

        for (i, anchor) in anchors.iter().enumerate() {
            assert_eq!(anchor.node, Some(NodeId(1)));
            assert_eq!(anchor.slot, Some(SlotId(i as u16)));
        }
    }

    #[test]
    fn test_ellipse_anchors() {
        let n = node(NodeShape::Ellipse { segments: 8 });
        let anchors = n.anchors();
        assert_eq!(anchors.len(), 8);
        // the quarter-turn slot sits on the top of the ellipse
        assert!((anchors[2].location - Point3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_rotation_applies_to_anchors() {
        let mut n = node(NodeShape::Rectangle);
        n.rotation = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI / 2.0);
        let (p, normal) = n.to_world(&n.anchors()[0]);
        assert!((p - Point3::new(10.0, 22.0, 0.0)).norm() < 1e-9);
        assert!((normal - Vector3::y()).norm() < 1e-9);
    }

    #[test]
    fn test_nearest_anchor() {
        let n = node(NodeShape::Rectangle);
        let left = n.nearest_anchor(&Point3::new(-100.0, 20.0, 0.0)).unwrap();
        assert_eq!(left.slot, Some(SlotId(2)));
        let below = n.nearest_anchor(&Point3::new(10.0, -50.0, 0.0)).unwrap();
        assert_eq!(below.slot, Some(SlotId(3)));

        let bare = node(NodeShape::Custom(vec![]));
        assert!(bare.nearest_anchor(&Point3::origin()).is_none());
    }
}
