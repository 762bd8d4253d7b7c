// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dataset configuration loaded from environment variables.

use vtopo_core::ByteOrderTag;

/// Settings applied when datasets are created, opened and built.
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyConfig {
    /// Default node snapping distance for builds.
    pub node_threshold: f64,
    /// Byte order of newly created geometry files.
    pub byte_order: ByteOrderTag,
    /// Log build progress every this many lines (0 disables).
    pub progress_interval: usize,
    /// Write the topology file when a dataset is closed.
    pub save_topology: bool,
    /// Record changed lines and nodes after each edit.
    pub track_updates: bool,
}

impl TopologyConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`; unset or unparsable values keep
    /// their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            node_threshold: lookup("VTOPO_NODE_THRESHOLD")
                .and_then(|v| v.trim().parse().ok())
                .filter(|t: &f64| t.is_finite() && *t >= 0.0)
                .unwrap_or(defaults.node_threshold),
            byte_order: lookup("VTOPO_BYTE_ORDER")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.byte_order),
            progress_interval: lookup("VTOPO_PROGRESS_INTERVAL")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.progress_interval),
            save_topology: lookup("VTOPO_SAVE_TOPOLOGY")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.save_topology),
            track_updates: lookup("VTOPO_TRACK_UPDATES")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.track_updates),
        }
    }
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            node_threshold: 0.0,
            byte_order: ByteOrderTag::Little,
            progress_interval: 10_000,
            save_topology: true,
            track_updates: false,
        }
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: FxHashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn unset_values_use_defaults() {
        assert_eq!(TopologyConfig::from_lookup(|_| None), TopologyConfig::default());
    }

    #[test]
    fn values_are_parsed() {
        let cfg = TopologyConfig::from_lookup(lookup(&[
            ("VTOPO_NODE_THRESHOLD", "0.5"),
            ("VTOPO_BYTE_ORDER", "big"),
            ("VTOPO_PROGRESS_INTERVAL", "10"),
            ("VTOPO_SAVE_TOPOLOGY", "off"),
            ("VTOPO_TRACK_UPDATES", "yes"),
        ]));
        assert_eq!(cfg.node_threshold, 0.5);
        assert_eq!(cfg.byte_order, ByteOrderTag::Big);
        assert_eq!(cfg.progress_interval, 10);
        assert!(!cfg.save_topology);
        assert!(cfg.track_updates);
    }

    #[test]
    fn bad_values_fall_back() {
        let cfg = TopologyConfig::from_lookup(lookup(&[
            ("VTOPO_NODE_THRESHOLD", "-1"),
            ("VTOPO_BYTE_ORDER", "middle"),
            ("VTOPO_SAVE_TOPOLOGY", "maybe"),
        ]));
        assert_eq!(cfg, TopologyConfig::default());
    }
}
