// Copyright 2026 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::common::{Error, Result};
use crate::diagram::EndRole;
use crate::layout_err;

/// Crossing counts stop at this many; past it, wirings are all equally bad.
pub const DEFAULT_MAX_CROSSINGS_CHECKED: usize = 5;

/// A candidate that ties on crossings must be shorter than this fraction of
/// the current wiring's squared length before the optimizer switches to it.
pub const DEFAULT_HYSTERESIS_RATIO: f64 = 0.999;

/// Which connector ends may terminate on the same anchor slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", try_from = "String")]
pub enum AnchorSharing {
    /// Any number of connector ends may share a slot.
    #[default]
    ShareAll,
    /// Ends may share a slot only when their end roles match (all tails, or
    /// all heads).
    ShareSameOnly,
    /// Every slot carries at most one connector end.
    NoSharing,
}

impl AnchorSharing {
    /// Decode the integer form some hosts persist. Anything outside the
    /// known range is a configuration fault.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(AnchorSharing::ShareAll),
            1 => Ok(AnchorSharing::ShareSameOnly),
            2 => Ok(AnchorSharing::NoSharing),
            _ => layout_err!(
                Config,
                UnknownSharingMode,
                format!("sharing mode code {code}")
            ),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            AnchorSharing::ShareAll => 0,
            AnchorSharing::ShareSameOnly => 1,
            AnchorSharing::NoSharing => 2,
        }
    }

    /// Whether two connector ends with the given roles may occupy one slot.
    pub fn can_share(self, a: EndRole, b: EndRole) -> bool {
        match self {
            AnchorSharing::ShareAll => true,
            AnchorSharing::ShareSameOnly => a == b,
            AnchorSharing::NoSharing => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AnchorSharing::ShareAll => "share_all",
            AnchorSharing::ShareSameOnly => "share_same_only",
            AnchorSharing::NoSharing => "no_sharing",
        }
    }
}

impl fmt::Display for AnchorSharing {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AnchorSharing {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "share_all" => Ok(AnchorSharing::ShareAll),
            "share_same_only" => Ok(AnchorSharing::ShareSameOnly),
            "no_sharing" => Ok(AnchorSharing::NoSharing),
            _ => layout_err!(Config, UnknownSharingMode, format!("'{s}'")),
        }
    }
}

impl TryFrom<String> for AnchorSharing {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

/// Tunables for the force-directed scatterer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterConfig {
    /// Spring constant for connected node pairs.
    pub spring_k: f64,
    /// Distance past the minimum separation that springs settle at.
    pub spring_bias: f64,
    /// Coulomb constant for unconnected node pairs.
    pub coulomb_k: f64,
    /// Charge carried by every body.
    pub charge: f64,
    /// Velocity-proportional damping.
    pub friction_k: f64,
    /// Gap added to the sum of two nodes' half extents.
    pub node_margin: f64,
    /// A body is at rest once its acceleration magnitude drops below this.
    pub equilibrium_threshold: f64,
    /// Forces with a larger magnitude are discarded for the tick.
    pub max_force: f64,
    /// Fixed simulation timestep, in seconds.
    pub dt: f64,
    /// Scheduler rate for the scatterer.
    pub rate_hz: f64,
    /// Keep every force in the xy plane.
    pub planar: bool,
    /// Seed for the direction picked when two bodies coincide.
    pub seed: u64,
}

impl Default for ScatterConfig {
    fn default() -> Self {
        Self {
            spring_k: 1.0,
            spring_bias: 1.0,
            coulomb_k: 1.0,
            charge: 1.0,
            friction_k: 0.5,
            node_margin: 2.0,
            equilibrium_threshold: 0.01,
            max_force: 1.0e6,
            dt: 0.05,
            rate_hz: 100.0,
            planar: false,
            seed: 42,
        }
    }
}

/// Tunables for the crossing-minimizing link optimizer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    pub sharing: AnchorSharing,
    /// Cap on crossings counted per wiring.
    pub max_crossings_checked: usize,
    /// Squared-length ratio a tying candidate must beat to be adopted.
    pub hysteresis_ratio: f64,
    /// Scheduler rate for the optimizer.
    pub rate_hz: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            sharing: AnchorSharing::ShareAll,
            max_crossings_checked: DEFAULT_MAX_CROSSINGS_CHECKED,
            hysteresis_ratio: DEFAULT_HYSTERESIS_RATIO,
            rate_hz: 10.0,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoLayoutConfig {
    pub scatter: ScatterConfig,
    pub optimizer: OptimizerConfig,
}

impl AutoLayoutConfig {
    /// Parse a configuration document. Missing fields take their defaults;
    /// an unrecognized sharing mode is reported as such rather than as a
    /// generic decoding failure.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        if let Some(mode) = value.pointer("/optimizer/sharing").and_then(|m| m.as_str()) {
            mode.parse::<AnchorSharing>()?;
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ErrorCode, ErrorKind};

    #[test]
    fn test_default_config() {
        let config = AutoLayoutConfig::default();

        assert!((config.scatter.spring_k - 1.0).abs() < f64::EPSILON);
        assert!((config.scatter.spring_bias - 1.0).abs() < f64::EPSILON);
        assert!((config.scatter.coulomb_k - 1.0).abs() < f64::EPSILON);
        assert!((config.scatter.friction_k - 0.5).abs() < f64::EPSILON);
        assert!((config.scatter.node_margin - 2.0).abs() < f64::EPSILON);
        assert!((config.scatter.equilibrium_threshold - 0.01).abs() < f64::EPSILON);
        assert!((config.scatter.dt - 0.05).abs() < f64::EPSILON);
        assert!((config.scatter.rate_hz - 100.0).abs() < f64::EPSILON);
        assert!(!config.scatter.planar);

        assert_eq!(config.optimizer.sharing, AnchorSharing::ShareAll);
        assert_eq!(config.optimizer.max_crossings_checked, 5);
        assert!((config.optimizer.hysteresis_ratio - 0.999).abs() < f64::EPSILON);
        assert!((config.optimizer.rate_hz - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sharing_policy_table() {
        use EndRole::{Head, Tail};

        assert!(AnchorSharing::ShareAll.can_share(Tail, Head));
        assert!(AnchorSharing::ShareAll.can_share(Head, Head));

        assert!(AnchorSharing::ShareSameOnly.can_share(Tail, Tail));
        assert!(AnchorSharing::ShareSameOnly.can_share(Head, Head));
        assert!(!AnchorSharing::ShareSameOnly.can_share(Tail, Head));

        assert!(!AnchorSharing::NoSharing.can_share(Tail, Tail));
        assert!(!AnchorSharing::NoSharing.can_share(Head, Tail));
    }

    #[test]
    fn test_sharing_mode_parsing() {
        for mode in [
            AnchorSharing::ShareAll,
            AnchorSharing::ShareSameOnly,
            AnchorSharing::NoSharing,
        ] {
            assert_eq!(mode.as_str().parse::<AnchorSharing>(), Ok(mode));
            assert_eq!(AnchorSharing::from_code(mode.code()), Ok(mode));
        }

        let err = "share_some".parse::<AnchorSharing>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Config);
        assert_eq!(err.code, ErrorCode::UnknownSharingMode);

        let err = AnchorSharing::from_code(7).unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownSharingMode);
        assert!(err.details.unwrap().contains('7'));
    }

    #[test]
    fn test_from_json_partial() {
        let config = AutoLayoutConfig::from_json(
            r#"{"scatter": {"spring_k": 2.5, "planar": true},
                "optimizer": {"sharing": "no_sharing"}}"#,
        )
        .unwrap();

        assert!((config.scatter.spring_k - 2.5).abs() < f64::EPSILON);
        assert!(config.scatter.planar);
        assert!((config.scatter.friction_k - 0.5).abs() < f64::EPSILON);
        assert_eq!(config.optimizer.sharing, AnchorSharing::NoSharing);
        assert_eq!(config.optimizer.max_crossings_checked, 5);
    }

    #[test]
    fn test_from_json_unknown_sharing_mode() {
        let err = AutoLayoutConfig::from_json(r#"{"optimizer": {"sharing": "share_most"}}"#)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownSharingMode);
    }

    #[test]
    fn test_from_json_malformed() {
        let err = AutoLayoutConfig::from_json("{").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidConfig);
    }

    #[test]
    fn test_json_roundtrip_preserves_config() {
        let mut config = AutoLayoutConfig::default();
        config.optimizer.sharing = AnchorSharing::ShareSameOnly;
        config.scatter.seed = 7;

        let json = config.to_json().unwrap();
        assert!(json.contains("\"share_same_only\""));
        assert_eq!(AutoLayoutConfig::from_json(&json).unwrap(), config);
    }
}
