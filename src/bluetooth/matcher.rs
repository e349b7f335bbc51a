// Copyright 2024 Speech2Prompt Contributors
// SPDX-License-Identifier: Apache-2.0

//! Device name matcher for paired device lookup.
//!
//! Cheap serial modules rarely keep their factory name exactly: "HC-06",
//! "hc06", "HC-06-A1" and "MyHC" all show up in the wild. Matching runs as an
//! ordered list of rules split into two passes. The first pass holds the
//! strict rules; the loose second pass only runs when the first finds
//! nothing. Within a pass the first device, in enumeration order, that
//! satisfies any rule wins.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::PairedDevice;

/// Order in which paired devices are visited when several could match.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EnumerationOrder {
    /// Whatever order the platform returns.
    #[default]
    Platform,
    /// Ascending hardware address, stable across runs.
    ByAddress,
}

/// A single name predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// Name contains the target verbatim (case-sensitive).
    ContainsTarget,
    /// Name starts with the prefix, ignoring case.
    StartsWithPrefix,
    /// Name without hyphens contains the target without hyphens, ignoring case.
    ContainsCompactTarget,
    /// Name contains the prefix anywhere, ignoring case.
    ContainsPrefix,
}

/// Rules per pass, in priority order.
const PASSES: [&[MatchRule]; 2] = [
    &[
        MatchRule::ContainsTarget,
        MatchRule::StartsWithPrefix,
        MatchRule::ContainsCompactTarget,
    ],
    &[MatchRule::ContainsPrefix],
];

/// Result of a paired device lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceMatch {
    Found(PairedDevice),
    NotFound,
}

impl DeviceMatch {
    pub fn into_option(self) -> Option<PairedDevice> {
        match self {
            DeviceMatch::Found(device) => Some(device),
            DeviceMatch::NotFound => None,
        }
    }
}

/// Name pattern a paired device must satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePattern {
    target: String,
    prefix: String,
    compact: String,
}

impl NamePattern {
    /// Build a pattern from the target name.
    ///
    /// The prefix is the run of leading ASCII letters of the target
    /// ("HC-06" gives "HC"); a target without one uses itself.
    pub fn new(target: impl Into<String>) -> Self {
        let target = target.into();
        let prefix: String = target
            .chars()
            .take_while(|c| c.is_ascii_alphabetic())
            .collect();
        let prefix = if prefix.is_empty() {
            target.clone()
        } else {
            prefix
        };
        let compact = target.replace('-', "").to_uppercase();

        Self {
            target,
            prefix: prefix.to_uppercase(),
            compact,
        }
    }

    /// Replace the derived prefix. A blank prefix would match every name,
    /// so it keeps the derived one.
    pub fn with_prefix(mut self, prefix: impl AsRef<str>) -> Self {
        let prefix = prefix.as_ref().trim();
        if prefix.is_empty() {
            debug!("Ignoring blank prefix for {}", self.target);
        } else {
            self.prefix = prefix.to_uppercase();
        }
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Check a name against one rule.
    pub fn matches(&self, rule: MatchRule, name: &str) -> bool {
        match rule {
            MatchRule::ContainsTarget => name.contains(&self.target),
            MatchRule::StartsWithPrefix => name.to_uppercase().starts_with(&self.prefix),
            MatchRule::ContainsCompactTarget => name
                .replace('-', "")
                .to_uppercase()
                .contains(&self.compact),
            MatchRule::ContainsPrefix => name.to_uppercase().contains(&self.prefix),
        }
    }

    /// Find the first matching device, strict rules first.
    pub fn find(&self, devices: &[PairedDevice], order: EnumerationOrder) -> DeviceMatch {
        let mut candidates: Vec<&PairedDevice> = devices.iter().collect();
        if order == EnumerationOrder::ByAddress {
            // Display is fixed-width uppercase hex, so this is numeric order.
            candidates.sort_by_key(|device| device.address.to_string());
        }

        for (pass, rules) in PASSES.iter().enumerate() {
            let hit = candidates.iter().find(|device| {
                rules.iter().any(|rule| self.matches(*rule, &device.name))
            });
            if let Some(device) = hit {
                debug!(
                    "Pass {} matched '{}' ({}) for pattern '{}'",
                    pass + 1,
                    device.name,
                    device.address,
                    self.target
                );
                return DeviceMatch::Found((*device).clone());
            }
        }

        debug!(
            "No paired device among {} matches '{}'",
            devices.len(),
            self.target
        );
        DeviceMatch::NotFound
    }
}

impl Default for NamePattern {
    fn default() -> Self {
        Self::new("HC-06")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluer::Address;

    fn device(name: &str, last: u8) -> PairedDevice {
        PairedDevice::new(name, Address::new([0x98, 0xD3, 0x31, 0x00, 0x00, last]))
    }

    fn find(names: &[&str]) -> Option<String> {
        let devices: Vec<PairedDevice> = names
            .iter()
            .enumerate()
            .map(|(i, name)| device(name, i as u8))
            .collect();
        NamePattern::default()
            .find(&devices, EnumerationOrder::Platform)
            .into_option()
            .map(|d| d.name)
    }

    #[test]
    fn test_prefix_derived_from_target() {
        let pattern = NamePattern::new("HC-06");
        assert_eq!(pattern.prefix(), "HC");
        assert_eq!(pattern.target(), "HC-06");

        assert_eq!(NamePattern::new("06-X").prefix(), "06-X");
        assert_eq!(NamePattern::new("HC-06").with_prefix("hm").prefix(), "HM");
    }

    #[test]
    fn test_blank_prefix_keeps_derived_one() {
        let pattern = NamePattern::new("HC-06").with_prefix("  ");
        assert_eq!(pattern.prefix(), "HC");

        let keyboard = PairedDevice::new("Keyboard", Address::new([1, 1, 1, 1, 1, 1]));
        assert_eq!(
            pattern.find(&[keyboard], EnumerationOrder::Platform),
            DeviceMatch::NotFound
        );
    }

    #[test]
    fn test_exact_name_found() {
        assert_eq!(find(&["Random", "HC-06"]).as_deref(), Some("HC-06"));
    }

    #[test]
    fn test_compact_name_found_in_first_pass() {
        assert_eq!(find(&["HC06sensor"]).as_deref(), Some("HC06sensor"));

        let pattern = NamePattern::default();
        assert!(pattern.matches(MatchRule::ContainsCompactTarget, "my-hc-06"));
        assert!(!pattern.matches(MatchRule::ContainsTarget, "HC06sensor"));
    }

    #[test]
    fn test_prefix_anywhere_only_in_second_pass() {
        let pattern = NamePattern::default();
        for rule in PASSES[0] {
            assert!(!pattern.matches(*rule, "MyHCdevice"), "{:?}", rule);
        }
        assert_eq!(find(&["MyHCdevice"]).as_deref(), Some("MyHCdevice"));
    }

    #[test]
    fn test_first_pass_beats_earlier_second_pass_candidate() {
        // "MyHCdevice" comes first but only satisfies the loose rule.
        assert_eq!(find(&["MyHCdevice", "hc-05"]).as_deref(), Some("hc-05"));
    }

    #[test]
    fn test_first_in_enumeration_order_wins() {
        assert_eq!(find(&["HC-05", "HC-06"]).as_deref(), Some("HC-05"));
    }

    #[test]
    fn test_no_match() {
        assert_eq!(find(&[]), None);
        assert_eq!(find(&["Headphones", "Keyboard"]), None);
    }

    #[test]
    fn test_by_address_order() {
        let devices = vec![device("HC-06 b", 0x20), device("HC-06 a", 0x10)];
        let pattern = NamePattern::default();

        let platform = pattern.find(&devices, EnumerationOrder::Platform);
        assert_eq!(platform, DeviceMatch::Found(devices[0].clone()));

        let sorted = pattern.find(&devices, EnumerationOrder::ByAddress);
        assert_eq!(sorted, DeviceMatch::Found(devices[1].clone()));
    }
}
