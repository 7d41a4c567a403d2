// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Interactive auto-layout for node/connector diagrams.
//!
//! Two cooperating algorithms run against a shared [`Diagram`]: the
//! [`Scatterer`] moves nodes under spring and charge forces until the
//! layout settles, and the [`LinkOptimizer`] reassigns the anchor slots
//! connectors attach to so their straight paths cross as little as
//! possible. A [`Scheduler`] ticks both at fixed rates.

#![forbid(unsafe_code)]

pub mod common;
pub mod config;
pub mod diagram;
pub mod geometry;
pub mod optimizer;
pub mod scatter;
pub mod schedule;

pub use self::common::{Error, ErrorCode, ErrorKind, Result};
pub use self::config::{AnchorSharing, AutoLayoutConfig, OptimizerConfig, ScatterConfig};
pub use self::diagram::{
    AnchorPoint, Connector, ConnectorEnd, ConnectorId, Diagram, End, EndRole, Issue, Node,
    NodeId, NodeShape, SlotId,
};
pub use self::optimizer::{AnchorPair, LinkOptimizer, crosses, total_crossings};
pub use self::scatter::Scatterer;
pub use self::schedule::{AutoLayout, CancellationToken, Scheduler, Tick};
