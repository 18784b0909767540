//! Introspection for debug tooling.
//!
//! [`DebugToggle`] erases a toggle's value type so a debug UI can list,
//! inspect and override toggles of any type through one interface. Values
//! cross this boundary in their value tree form.
//!
//! [`DebugRegistry`] is the shared list such a UI reads from.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{ToggleError, ToggleResult};
use crate::key::KeyPath;
use crate::resolve::ToggleKind;
use crate::toggle::{Group, Resolvable, Toggle, ToggleGroup};
use crate::value::Value;

// =============================================================================
// DebugToggle
// =============================================================================

/// One field of a group as seen by debug tooling.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugProperty {
    /// Absolute key of the property.
    pub key: KeyPath,
    /// Human-readable description.
    pub description: String,
    /// The property's value inside the group's effective value.
    pub value: Value,
    /// Candidate values to offer.
    pub candidates: Vec<Value>,
    /// Whether the override layer holds a value for this property.
    pub overridden: bool,
}

/// A type-erased view of a toggle.
pub trait DebugToggle: Send + Sync {
    /// The toggle key.
    fn key(&self) -> &KeyPath;

    /// Scalar or group.
    fn kind(&self) -> ToggleKind;

    /// Human-readable description.
    fn description(&self) -> &str;

    /// The effective value, or the default together with the error that
    /// prevented resolution.
    fn effective(&self) -> (Value, Option<ToggleError>);

    /// The value of the base provider, ignoring any override.
    fn base_value(&self) -> ToggleResult<Value>;

    /// The default value.
    fn default_value(&self) -> Value;

    /// Candidate values to offer.
    fn candidates(&self) -> Vec<Value>;

    /// Group properties. Empty for scalar toggles.
    fn children(&self) -> Vec<DebugProperty> {
        Vec::new()
    }

    /// Whether the override layer holds a value for this toggle.
    fn has_override(&self) -> bool;

    /// Stores a raw value in the override layer.
    fn override_with(&self, value: Value) -> ToggleResult<()>;

    /// Removes the override for this toggle.
    fn clear_override(&self) -> ToggleResult<()>;
}

impl<T: Resolvable> DebugToggle for Toggle<T> {
    fn key(&self) -> &KeyPath {
        Toggle::key(self)
    }

    fn kind(&self) -> ToggleKind {
        Toggle::kind(self)
    }

    fn description(&self) -> &str {
        Toggle::description(self)
    }

    fn effective(&self) -> (Value, Option<ToggleError>) {
        let resolved = self.resolve();
        (self.encode(&resolved.value), resolved.error)
    }

    fn base_value(&self) -> ToggleResult<Value> {
        Toggle::base_value(self).map(|value| self.encode(&value))
    }

    fn default_value(&self) -> Value {
        self.encode(Toggle::default_value(self))
    }

    fn candidates(&self) -> Vec<Value> {
        self.debug_values().iter().map(|v| self.encode(v)).collect()
    }

    fn has_override(&self) -> bool {
        Toggle::has_override(self)
    }

    fn override_with(&self, value: Value) -> ToggleResult<()> {
        debug!(key = %Toggle::key(self), value = %value, "Debug override");
        self.provider()
            .override_provider()
            .set_value(Toggle::key(self), value)
    }

    fn clear_override(&self) -> ToggleResult<()> {
        Toggle::clear_override(self)
    }
}

impl<G: ToggleGroup> DebugToggle for Group<G> {
    fn key(&self) -> &KeyPath {
        self.toggle().key()
    }

    fn kind(&self) -> ToggleKind {
        ToggleKind::Group
    }

    fn description(&self) -> &str {
        self.toggle().description()
    }

    fn effective(&self) -> (Value, Option<ToggleError>) {
        DebugToggle::effective(self.toggle())
    }

    fn base_value(&self) -> ToggleResult<Value> {
        DebugToggle::base_value(self.toggle())
    }

    fn default_value(&self) -> Value {
        DebugToggle::default_value(self.toggle())
    }

    fn candidates(&self) -> Vec<Value> {
        DebugToggle::candidates(self.toggle())
    }

    fn children(&self) -> Vec<DebugProperty> {
        let current = self.value_or_default();
        self.properties()
            .iter()
            .map(|property| DebugProperty {
                key: self.property_key(property.key().as_str()),
                description: property.description().to_string(),
                value: property.value_of(&current),
                candidates: property.debug_values().to_vec(),
                overridden: self.has_property_override(property.key().as_str()),
            })
            .collect()
    }

    fn has_override(&self) -> bool {
        DebugToggle::has_override(self.toggle())
    }

    fn override_with(&self, value: Value) -> ToggleResult<()> {
        DebugToggle::override_with(self.toggle(), value)
    }

    fn clear_override(&self) -> ToggleResult<()> {
        DebugToggle::clear_override(self.toggle())
    }
}

// =============================================================================
// DebugRegistry
// =============================================================================

/// A shared list of toggles exposed to debug tooling.
#[derive(Default, Clone)]
pub struct DebugRegistry {
    entries: Arc<RwLock<Vec<Arc<dyn DebugToggle>>>>,
}

impl fmt::Debug for DebugRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<String> = self
            .entries
            .read()
            .iter()
            .map(|entry| entry.key().to_string())
            .collect();
        f.debug_struct("DebugRegistry").field("keys", &keys).finish()
    }
}

impl DebugRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a toggle. A toggle already registered under the same key is
    /// replaced.
    pub fn register(&self, toggle: Arc<dyn DebugToggle>) {
        let mut entries = self.entries.write();
        if let Some(slot) = entries.iter_mut().find(|e| e.key() == toggle.key()) {
            debug!(key = %toggle.key(), "Replacing debug toggle");
            *slot = toggle;
        } else {
            info!(key = %toggle.key(), kind = toggle.kind().as_str(), "Registered debug toggle");
            entries.push(toggle);
        }
    }

    /// All registered toggles, in registration order.
    pub fn entries(&self) -> Vec<Arc<dyn DebugToggle>> {
        self.entries.read().clone()
    }

    /// Looks up a toggle by key.
    pub fn find(&self, key: &str) -> Option<Arc<dyn DebugToggle>> {
        self.entries
            .read()
            .iter()
            .find(|entry| entry.key().as_str() == key)
            .cloned()
    }

    /// Clears every override held for a registered toggle.
    pub fn clear_all(&self) -> ToggleResult<()> {
        for entry in self.entries() {
            if entry.has_override() {
                entry.clear_override()?;
            }
        }
        Ok(())
    }

    /// Number of registered toggles.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
