// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::{BTreeMap, BTreeSet};

use nalgebra::{Point3, Vector3};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, trace};

use crate::config::ScatterConfig;
use crate::diagram::{Diagram, Issue, NodeId};
use crate::geometry::{MIN_SEPARATION_SQUARED, min_separation, random_unit_direction};
use crate::schedule::Tick;

/// A node as seen by the simulation: a unit point mass.
#[derive(Clone, Debug)]
pub struct Body {
    pub node: NodeId,
    pub position: Point3<f64>,
    pub velocity: Vector3<f64>,
    force: Vector3<f64>,
    half_extents: Vector3<f64>,
    /// Distinct nodes reachable over non-dangling, non-loop connectors.
    pub link_count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkKind {
    /// A connector joins the pair.
    Spring,
    /// Nothing joins the pair; the bodies repel.
    Charge,
}

/// Unordered pair of body indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Link {
    pub a: usize,
    pub b: usize,
    pub kind: LinkKind,
}

/// Force-directed scatterer. Each tick nudges every unselected node: springs
/// pull connected nodes to just past touching, charges push unconnected
/// nodes apart, and the whole configuration is kept centred on the origin.
pub struct Scatterer {
    config: ScatterConfig,
    rng: StdRng,
    synced: Option<Issue>,
    bodies: Vec<Body>,
    springs: Vec<Link>,
    charges: Vec<Link>,
    at_equilibrium: bool,
    disposed: bool,
}

impl Scatterer {
    pub fn new(config: ScatterConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            synced: None,
            bodies: Vec::new(),
            springs: Vec::new(),
            charges: Vec::new(),
            at_equilibrium: false,
            disposed: false,
        }
    }

    pub fn config(&self) -> &ScatterConfig {
        &self.config
    }

    /// Swap tunables without losing simulation state.
    pub fn set_config(&mut self, config: ScatterConfig) {
        self.config = config;
    }

    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    pub fn springs(&self) -> &[Link] {
        &self.springs
    }

    pub fn charges(&self) -> &[Link] {
        &self.charges
    }

    /// Whether every unpinned body was at rest on the last tick.
    pub fn is_at_equilibrium(&self) -> bool {
        self.at_equilibrium
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Release cached bodies. Later ticks are no-ops and never touch the
    /// diagram.
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.synced = None;
        self.bodies.clear();
        self.springs.clear();
        self.charges.clear();
    }

    fn resync(&mut self, diagram: &Diagram) {
        self.bodies = diagram
            .nodes()
            .map(|node| Body {
                node: node.id(),
                position: node.position(),
                velocity: Vector3::zeros(),
                force: Vector3::zeros(),
                half_extents: node.half_extents(),
                link_count: 0,
            })
            .collect();

        let index: BTreeMap<NodeId, usize> = self
            .bodies
            .iter()
            .enumerate()
            .map(|(i, body)| (body.node, i))
            .collect();

        let mut connected: BTreeSet<(usize, usize)> = BTreeSet::new();
        for (i, body) in self.bodies.iter_mut().enumerate() {
            let mut neighbors: BTreeSet<usize> = BTreeSet::new();
            for connector in diagram.connectors_of(body.node) {
                if connector.is_dangling() || connector.is_loop() {
                    continue;
                }
                let far = connector
                    .anchors()
                    .iter()
                    .filter_map(|anchor| anchor.node)
                    .find(|&n| n != body.node);
                if let Some(&j) = far.and_then(|n| index.get(&n)) {
                    neighbors.insert(j);
                    connected.insert((i.min(j), i.max(j)));
                }
            }
            body.link_count = neighbors.len();
        }

        self.springs = connected
            .iter()
            .map(|&(a, b)| Link {
                a,
                b,
                kind: LinkKind::Spring,
            })
            .collect();

        let n = self.bodies.len();
        let pairs = n * n.saturating_sub(1) / 2;
        self.charges = Vec::with_capacity(pairs.saturating_sub(self.springs.len()));
        for a in 0..n {
            for b in (a + 1)..n {
                if !connected.contains(&(a, b)) {
                    self.charges.push(Link {
                        a,
                        b,
                        kind: LinkKind::Charge,
                    });
                }
            }
        }

        self.synced = Some(diagram.issue());
        self.at_equilibrium = false;
        debug!(
            bodies = self.bodies.len(),
            springs = self.springs.len(),
            charges = self.charges.len(),
            "scatterer resynced"
        );
    }

    /// Run one simulation tick against `diagram`.
    pub fn step(&mut self, diagram: &mut Diagram) {
        if self.disposed {
            return;
        }
        if self.synced != Some(diagram.issue()) {
            self.resync(diagram);
        }
        if self.bodies.is_empty() {
            self.at_equilibrium = true;
            return;
        }

        for body in &mut self.bodies {
            if let Some(node) = diagram.node(body.node) {
                body.half_extents = node.half_extents();
            }
        }
        let pinned: Vec<bool> = self
            .bodies
            .iter()
            .map(|body| diagram.is_selected(body.node))
            .collect();

        self.accumulate_forces();
        let at_rest = self.integrate(&pinned);
        if at_rest != self.at_equilibrium {
            debug!(equilibrium = at_rest, "scatterer equilibrium changed");
        }
        self.at_equilibrium = at_rest;
        self.recenter(&pinned);
        self.commit(diagram, &pinned);
    }

    /// Unit direction from `b` toward `a` and the distance between them.
    /// Coincident bodies get a random direction and zero distance.
    fn separation(&mut self, a: usize, b: usize) -> (Vector3<f64>, f64) {
        let mut sep = self.bodies[a].position - self.bodies[b].position;
        if self.config.planar {
            sep.z = 0.0;
        }
        let dist_sq = sep.norm_squared();
        if dist_sq < MIN_SEPARATION_SQUARED {
            return (random_unit_direction(&mut self.rng, self.config.planar), 0.0);
        }
        let dist = dist_sq.sqrt();
        (sep / dist, dist)
    }

    fn apply_pair(&mut self, link: Link, magnitude: f64, dir: Vector3<f64>) {
        let f = dir * magnitude;
        self.bodies[link.a].force += f;
        self.bodies[link.b].force -= f;
    }

    fn accumulate_forces(&mut self) {
        let margin = self.config.node_margin;

        for i in 0..self.springs.len() {
            let link = self.springs[i];
            let (dir, dist) = self.separation(link.a, link.b);
            let min_sep = min_separation(
                &self.bodies[link.a].half_extents,
                &self.bodies[link.b].half_extents,
                &dir,
                margin,
            );
            let excess = (dist - min_sep).max(0.0);
            let magnitude = -self.config.spring_k * (excess - self.config.spring_bias);
            self.apply_pair(link, magnitude, dir);
        }

        let q2 = self.config.charge * self.config.charge;
        for i in 0..self.charges.len() {
            let link = self.charges[i];
            let (dir, dist) = self.separation(link.a, link.b);
            let min_sep = min_separation(
                &self.bodies[link.a].half_extents,
                &self.bodies[link.b].half_extents,
                &dir,
                margin,
            );
            // clamping at the contact distance keeps overlapping bodies
            // from producing unbounded repulsion
            let r = dist.max(min_sep);
            if r <= 0.0 {
                continue;
            }
            let magnitude = self.config.coulomb_k * q2 / (r * r);
            self.apply_pair(link, magnitude, dir);
        }

        let friction = self.config.friction_k;
        for body in &mut self.bodies {
            body.force -= body.velocity * friction;
        }
    }

    /// Advance unpinned bodies by one step. Returns whether all of them are
    /// at rest.
    fn integrate(&mut self, pinned: &[bool]) -> bool {
        let dt = self.config.dt;
        let threshold_sq = self.config.equilibrium_threshold * self.config.equilibrium_threshold;
        let max_force_sq = self.config.max_force * self.config.max_force;
        let mut at_rest = true;

        for (body, &is_pinned) in self.bodies.iter_mut().zip(pinned) {
            let mut accel = body.force;
            body.force = Vector3::zeros();
            if is_pinned {
                continue;
            }

            let norm_sq = accel.norm_squared();
            if !norm_sq.is_finite() || norm_sq > max_force_sq {
                trace!(node = %body.node, force = norm_sq.sqrt(), "discarding force");
                accel = Vector3::zeros();
                at_rest = false;
            } else if norm_sq >= threshold_sq {
                at_rest = false;
            }

            body.velocity += accel * (0.5 * dt);
            body.position += body.velocity * dt + accel * (0.5 * dt * dt);
            body.velocity += accel;
        }

        at_rest
    }

    /// Translate unpinned bodies so their centroid is the origin.
    fn recenter(&mut self, pinned: &[bool]) {
        let mut sum = Vector3::zeros();
        let mut count = 0usize;
        for (body, &is_pinned) in self.bodies.iter().zip(pinned) {
            if !is_pinned {
                sum += body.position.coords;
                count += 1;
            }
        }
        if count == 0 {
            return;
        }

        let centroid = sum / count as f64;
        for (body, &is_pinned) in self.bodies.iter_mut().zip(pinned) {
            if !is_pinned {
                body.position -= centroid;
            }
        }
    }

    fn commit(&mut self, diagram: &mut Diagram, pinned: &[bool]) {
        for (body, &is_pinned) in self.bodies.iter_mut().zip(pinned) {
            if is_pinned {
                body.velocity = Vector3::zeros();
                if let Some(node) = diagram.node(body.node) {
                    body.position = node.position();
                }
            } else if diagram.set_node_position(body.node, body.position).is_err() {
                trace!(node = %body.node, "body outlived its node");
            }
        }
    }
}

impl Tick for Scatterer {
    fn tick(&mut self, diagram: &mut Diagram) {
        self.step(diagram);
    }

    fn dispose(&mut self) {
        Scatterer::dispose(self);
    }
}
