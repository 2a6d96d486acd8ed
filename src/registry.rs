//! Action registry: the fixed table from action name to primitive descriptor.
//!
//! The registry is built once at startup, checked for conflicting names while it is built,
//! and never mutated afterwards. Names are matched case-insensitively. When the lowercased
//! name misses, lookup retries once with camel case and separators normalized, so `MoveTo`
//! and `move to` still resolve to `move_to`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{PlanError, Result};

/// A parameter slot a primitive can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterSlot {
    Position,
    Object,
    Angle,
}

impl ParameterSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Position => "position",
            Self::Object => "object",
            Self::Angle => "angle",
        }
    }
}

impl fmt::Display for ParameterSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What an action lowers to: the primitive's name in the execution environment and the
/// slots a step must provide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveDescriptor {
    pub target: String,
    #[serde(default)]
    pub required: Vec<ParameterSlot>,
}

impl PrimitiveDescriptor {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            required: Vec::new(),
        }
    }

    pub fn requires(mut self, slot: ParameterSlot) -> Self {
        if !self.required.contains(&slot) {
            self.required.push(slot);
        }
        self
    }
}

impl fmt::Display for PrimitiveDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'", self.target)?;
        if !self.required.is_empty() {
            let slots: Vec<_> = self.required.iter().map(ParameterSlot::as_str).collect();
            write!(f, " requiring {}", slots.join(", "))?;
        }
        Ok(())
    }
}

/// Registry key form of an action name: trimmed and lowercased.
pub fn lowercase_action_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Fallback form of an action name: trimmed, camel case split, separators as `_`, lowercase.
pub fn normalize_action_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;

    for ch in name.trim().chars() {
        if ch.is_whitespace() || ch == '-' || ch == '_' {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            prev = Some('_');
            continue;
        }

        if ch.is_uppercase() {
            if matches!(prev, Some(p) if p.is_lowercase() || p.is_ascii_digit()) {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
        prev = Some(ch);
    }

    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Immutable name → primitive table.
///
/// Shared read-only by every lowering call; wrap it in an `Arc` to hand it across tasks.
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    actions: BTreeMap<String, PrimitiveDescriptor>,
    aliases: BTreeMap<String, String>,
}

impl ActionRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Builds a registry from `(name, primitive target)` pairs with no required slots.
    pub fn build<I, N, T>(mapping: I) -> Result<Self>
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: Into<String>,
    {
        mapping
            .into_iter()
            .fold(Self::builder(), |builder, (name, target)| {
                builder.action(name, target)
            })
            .build()
    }

    /// The robot-arm primitives whose targets are known.
    ///
    /// `rotate` and the gripper actions have no agreed target, so they are left to
    /// configuration.
    pub fn robot_arm() -> Result<Self> {
        RegistryBuilder::robot_arm().build()
    }

    /// Resolves a (possibly aliased) name to its canonical name and descriptor.
    ///
    /// The lowercased name is tried first; the normalized form only on a miss.
    pub fn resolve(&self, name: &str) -> Option<(&str, &PrimitiveDescriptor)> {
        let key = lowercase_action_name(name);
        if let Some(found) = self.lookup(&key) {
            return Some(found);
        }

        let normalized = normalize_action_name(name);
        if normalized == key {
            return None;
        }
        self.lookup(&normalized)
    }

    fn lookup(&self, key: &str) -> Option<(&str, &PrimitiveDescriptor)> {
        let canonical = self.aliases.get(key).map(String::as_str).unwrap_or(key);
        self.actions
            .get_key_value(canonical)
            .map(|(name, descriptor)| (name.as_str(), descriptor))
    }

    pub fn get(&self, name: &str) -> Option<&PrimitiveDescriptor> {
        self.resolve(name).map(|(_, descriptor)| descriptor)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Canonical actions in name order.
    pub fn actions(&self) -> impl Iterator<Item = (&str, &PrimitiveDescriptor)> {
        self.actions.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Aliases in name order, paired with the action they resolve to.
    pub fn aliases(&self) -> impl Iterator<Item = (&str, &str)> {
        self.aliases.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Every accepted name (actions and aliases), sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .actions
            .keys()
            .chain(self.aliases.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }
}

/// Collects registry entries; conflicts are only checked in [`RegistryBuilder::build`].
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    actions: Vec<(String, PrimitiveDescriptor)>,
    aliases: Vec<(String, String)>,
}

impl RegistryBuilder {
    /// Pre-populated with the robot-arm primitives and their common aliases.
    pub fn robot_arm() -> Self {
        Self::default()
            .action_with(
                "move_to",
                PrimitiveDescriptor::new("self.robot.move_to_position")
                    .requires(ParameterSlot::Position),
            )
            .action_with(
                "pick_up",
                PrimitiveDescriptor::new("self.robot.pick_object").requires(ParameterSlot::Object),
            )
            .action_with(
                "place",
                PrimitiveDescriptor::new("self.robot.place_object")
                    .requires(ParameterSlot::Position),
            )
            .alias("goto", "move_to")
            .alias("pickup", "pick_up")
            .alias("grab", "pick_up")
            .alias("place_on", "place")
    }

    pub fn action(self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.action_with(name, PrimitiveDescriptor::new(target))
    }

    pub fn action_with(mut self, name: impl Into<String>, descriptor: PrimitiveDescriptor) -> Self {
        self.actions.push((name.into(), descriptor));
        self
    }

    pub fn alias(mut self, alias: impl Into<String>, action: impl Into<String>) -> Self {
        self.aliases.push((alias.into(), action.into()));
        self
    }

    pub fn build(self) -> Result<ActionRegistry> {
        let mut actions: BTreeMap<String, PrimitiveDescriptor> = BTreeMap::new();

        for (raw_name, descriptor) in self.actions {
            let name = lowercase_action_name(&raw_name);
            if name.is_empty() {
                return Err(PlanError::InvalidRegistryEntry {
                    name: raw_name,
                    reason: "action name is empty".to_string(),
                });
            }
            if descriptor.target.trim().is_empty() {
                return Err(PlanError::InvalidRegistryEntry {
                    name,
                    reason: "primitive target is empty".to_string(),
                });
            }

            match actions.get(&name) {
                Some(existing) if *existing == descriptor => {
                    tracing::debug!(action = %name, "identical action re-registered");
                }
                Some(existing) => {
                    return Err(PlanError::DuplicateActionName {
                        name,
                        existing: existing.to_string(),
                        conflicting: descriptor.to_string(),
                    });
                }
                None => {
                    actions.insert(name, descriptor);
                }
            }
        }

        let mut aliases: BTreeMap<String, String> = BTreeMap::new();

        for (raw_alias, raw_action) in self.aliases {
            let alias = lowercase_action_name(&raw_alias);
            let action = lowercase_action_name(&raw_action);

            if alias.is_empty() {
                return Err(PlanError::InvalidRegistryEntry {
                    name: raw_alias,
                    reason: "alias is empty".to_string(),
                });
            }
            if !actions.contains_key(&action) {
                return Err(PlanError::InvalidRegistryEntry {
                    name: alias,
                    reason: format!("alias points at unregistered action '{action}'"),
                });
            }
            if let Some(existing) = actions.get(&alias) {
                // An alias spelled exactly like its own action is harmless.
                if alias == action {
                    continue;
                }
                return Err(PlanError::DuplicateActionName {
                    name: alias,
                    existing: existing.to_string(),
                    conflicting: format!("alias of '{action}'"),
                });
            }

            match aliases.get(&alias) {
                Some(existing) if *existing == action => {}
                Some(existing) => {
                    return Err(PlanError::DuplicateActionName {
                        name: alias,
                        existing: format!("alias of '{existing}'"),
                        conflicting: format!("alias of '{action}'"),
                    });
                }
                None => {
                    aliases.insert(alias, action);
                }
            }
        }

        tracing::debug!(
            actions = actions.len(),
            aliases = aliases.len(),
            "action registry built"
        );

        Ok(ActionRegistry { actions, aliases })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_handles_case_separators_and_camel_case() {
        assert_eq!(normalize_action_name("MOVE_TO"), "move_to");
        assert_eq!(normalize_action_name("pickup "), "pickup");
        assert_eq!(normalize_action_name("PlaceOn"), "place_on");
        assert_eq!(normalize_action_name("open-gripper"), "open_gripper");
        assert_eq!(normalize_action_name("  pick  up "), "pick_up");
        assert_eq!(normalize_action_name("unknown"), "unknown");
    }

    #[test]
    fn build_is_idempotent_for_identical_targets() {
        let registry = ActionRegistry::build([
            ("move_to", "arm.move_to"),
            ("MOVE_TO", "arm.move_to"),
        ])
        .expect("identical re-registration should succeed");

        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.get("move_to").map(|d| d.target.as_str()),
            Some("arm.move_to")
        );
    }

    #[test]
    fn build_rejects_conflicting_targets() {
        let err = ActionRegistry::build([("move_to", "arm.move_to"), ("Move_To", "arm.goto")])
            .expect_err("conflicting targets must fail");

        match err {
            PlanError::DuplicateActionName { name, .. } => assert_eq!(name, "move_to"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn lowercased_key_wins_over_camel_case_split() {
        let registry = ActionRegistry::build([("moveto", "arm.moveto")]).expect("registry");

        let (name, descriptor) = registry.resolve("moveTo").expect("case-insensitive match");
        assert_eq!(name, "moveto");
        assert_eq!(descriptor.target, "arm.moveto");
    }

    #[test]
    fn names_differing_only_in_case_conflict() {
        let err = ActionRegistry::build([("MoveTo", "arm.a"), ("moveto", "arm.b")])
            .expect_err("same lowercased name with different targets");

        match err {
            PlanError::DuplicateActionName { name, .. } => assert_eq!(name, "moveto"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn build_rejects_empty_names_and_targets() {
        assert!(matches!(
            ActionRegistry::build([("  ", "arm.move_to")]),
            Err(PlanError::InvalidRegistryEntry { .. })
        ));
        assert!(matches!(
            ActionRegistry::build([("move_to", "")]),
            Err(PlanError::InvalidRegistryEntry { .. })
        ));
    }

    #[test]
    fn aliases_resolve_to_their_canonical_action() {
        let registry = ActionRegistry::robot_arm().expect("default registry");

        let (name, descriptor) = registry.resolve("grab").expect("grab is an alias");
        assert_eq!(name, "pick_up");
        assert_eq!(descriptor.target, "self.robot.pick_object");

        assert_eq!(registry.resolve("PlaceOn").map(|(n, _)| n), Some("place"));
        assert_eq!(registry.resolve("goto").map(|(n, _)| n), Some("move_to"));
        assert!(registry.resolve("rotate").is_none());
    }

    #[test]
    fn alias_conflicts_are_duplicate_names() {
        let shadowing = ActionRegistry::builder()
            .action("move_to", "arm.move_to")
            .action("place", "arm.place")
            .alias("place", "move_to")
            .build();
        assert!(matches!(
            shadowing,
            Err(PlanError::DuplicateActionName { .. })
        ));

        let repointed = ActionRegistry::builder()
            .action("move_to", "arm.move_to")
            .action("place", "arm.place")
            .alias("go", "move_to")
            .alias("go", "place")
            .build();
        assert!(matches!(
            repointed,
            Err(PlanError::DuplicateActionName { .. })
        ));
    }

    #[test]
    fn alias_to_unknown_action_is_rejected() {
        let result = ActionRegistry::builder().alias("goto", "move_to").build();
        assert!(matches!(
            result,
            Err(PlanError::InvalidRegistryEntry { .. })
        ));
    }

    #[test]
    fn names_lists_actions_and_aliases() {
        let registry = ActionRegistry::robot_arm().expect("default registry");
        let names = registry.names();

        for expected in ["goto", "grab", "move_to", "pick_up", "pickup", "place", "place_on"] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }
}
