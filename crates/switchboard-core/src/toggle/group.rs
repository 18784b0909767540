//! Group toggles: composite values whose fields are overridable one by one.
//!
//! A group type lists its fields once, in a [`PropertyTable`] of
//! [`GroupProperty`] entries. Each entry pairs a key below the group's key
//! with a field accessor and a decode rule. Resolution runs the table over a
//! merged override-over-base decoder, so a field without an override keeps
//! reading from the base provider.
//!
//! ```rust
//! use std::sync::Arc;
//! use switchboard_core::{
//!     Group, GroupProperty, InMemoryProvider, MemoryStorage, OverridableProvider,
//!     PersistentProvider, PropertyTable, ToggleGroup,
//! };
//!
//! #[derive(Debug, Clone, PartialEq, Default)]
//! struct Checkout {
//!     flow: String,
//!     express: bool,
//! }
//!
//! impl ToggleGroup for Checkout {
//!     fn properties() -> PropertyTable<Self> {
//!         PropertyTable::new()
//!             .with(GroupProperty::value("flow", |c: &mut Checkout| &mut c.flow))
//!             .with(GroupProperty::value("express", |c: &mut Checkout| &mut c.express))
//!     }
//! }
//!
//! let defaults = InMemoryProvider::from_json(
//!     "defaults",
//!     r#"{"checkout": {"flow": "classic", "express": false}}"#,
//! )
//! .unwrap();
//! let overrides = PersistentProvider::new("overrides", MemoryStorage::new()).unwrap();
//! let provider = Arc::new(OverridableProvider::new(
//!     "local",
//!     Arc::new(defaults),
//!     Arc::new(overrides),
//! ));
//!
//! let checkout = Group::<Checkout>::new("checkout", provider);
//! checkout.set_property("express", true).unwrap();
//!
//! let value = checkout.value().unwrap();
//! assert_eq!(value.flow, "classic");
//! assert!(value.express);
//! ```

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use tracing::warn;

use super::value::{self, Resolvable, ToggleChoice, ToggleValue};
use super::{DecodeFn, EncodeFn, Toggle};
use crate::decoder::{ToggleDecoder, decode_field};
use crate::error::ToggleResult;
use crate::key::KeyPath;
use crate::provider::ToggleProvider;
use crate::resolve::ToggleKind;
use crate::tree;
use crate::value::Value;

type PropertyDecodeFn<G> =
    Arc<dyn Fn(&dyn ToggleDecoder, &KeyPath, &mut G) -> ToggleResult<()> + Send + Sync>;

// =============================================================================
// ToggleGroup
// =============================================================================

/// A composite toggle type.
pub trait ToggleGroup: Resolvable + Default {
    /// The statically declared fields of this group.
    fn properties() -> PropertyTable<Self>;
}

// =============================================================================
// GroupProperty
// =============================================================================

/// One field of a group: a key below the group key, a decode rule and an
/// encode rule bound to a field accessor.
pub struct GroupProperty<G> {
    key: KeyPath,
    description: String,
    debug_values: Vec<Value>,
    decode: PropertyDecodeFn<G>,
    encode: EncodeFn<G>,
}

impl<G> Clone for GroupProperty<G> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            description: self.description.clone(),
            debug_values: self.debug_values.clone(),
            decode: Arc::clone(&self.decode),
            encode: Arc::clone(&self.encode),
        }
    }
}

impl<G> fmt::Debug for GroupProperty<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupProperty")
            .field("key", &self.key)
            .field("description", &self.description)
            .finish()
    }
}

impl<G: Resolvable> GroupProperty<G> {
    /// A scalar field.
    pub fn value<T: ToggleValue>(key: impl Into<KeyPath>, field: fn(&mut G) -> &mut T) -> Self {
        Self::from_rules(
            key,
            Arc::new(move |decoder: &dyn ToggleDecoder, key: &KeyPath, group: &mut G| {
                *field(group) = decode_field(decoder, |layer| T::decode_from(layer, key))?;
                Ok(())
            }),
            Arc::new(move |group: &G| field(&mut group.clone()).to_value()),
        )
    }

    /// A field over a closed set of cases. Unknown raw values keep the
    /// field's default.
    pub fn choice<T: ToggleChoice>(key: impl Into<KeyPath>, field: fn(&mut G) -> &mut T) -> Self {
        Self::from_rules(
            key,
            Arc::new(move |decoder: &dyn ToggleDecoder, key: &KeyPath, group: &mut G| {
                let slot = field(group);
                *slot = decode_field(decoder, |layer| value::decode_choice(layer, key, slot))?;
                Ok(())
            }),
            Arc::new(move |group: &G| value::choice_value(field(&mut group.clone()))),
        )
        .with_debug_values(T::all_cases().iter().map(value::choice_value))
    }

    /// A nested group. Its keys resolve below this property's key.
    pub fn group<N: ToggleGroup>(key: impl Into<KeyPath>, field: fn(&mut G) -> &mut N) -> Self {
        let table = Arc::new(N::properties());
        let encode_table = Arc::clone(&table);
        Self::from_rules(
            key,
            Arc::new(move |decoder: &dyn ToggleDecoder, key: &KeyPath, group: &mut G| {
                let mut nested = decoder.boxed_clone();
                nested.set_key(decoder.key().join(key));
                let slot = field(group);
                *slot = table.decode(nested.as_ref(), slot.clone())?;
                Ok(())
            }),
            Arc::new(move |group: &G| encode_table.encode(field(&mut group.clone()))),
        )
    }

    fn from_rules(key: impl Into<KeyPath>, decode: PropertyDecodeFn<G>, encode: EncodeFn<G>) -> Self {
        Self {
            key: key.into(),
            description: String::new(),
            debug_values: Vec::new(),
            decode,
            encode,
        }
    }

    /// Sets the human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the candidate values offered by debug tooling.
    pub fn with_debug_values<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.debug_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// The key of this property, relative to its group.
    pub fn key(&self) -> &KeyPath {
        &self.key
    }

    /// The human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The candidate values offered by debug tooling.
    pub fn debug_values(&self) -> &[Value] {
        &self.debug_values
    }

    /// Reads this property out of `group` in value tree form.
    pub fn value_of(&self, group: &G) -> Value {
        (self.encode)(group)
    }
}

// =============================================================================
// PropertyTable
// =============================================================================

/// The ordered list of properties of a group type.
pub struct PropertyTable<G> {
    properties: Vec<GroupProperty<G>>,
}

impl<G> Default for PropertyTable<G> {
    fn default() -> Self {
        Self {
            properties: Vec::new(),
        }
    }
}

impl<G> fmt::Debug for PropertyTable<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.properties).finish()
    }
}

impl<G: Resolvable> PropertyTable<G> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a property.
    pub fn with(mut self, property: GroupProperty<G>) -> Self {
        self.properties.push(property);
        self
    }

    /// Iterates over the properties in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &GroupProperty<G>> {
        self.properties.iter()
    }

    /// Looks up a property by its relative key.
    pub fn get(&self, key: &str) -> Option<&GroupProperty<G>> {
        self.properties.iter().find(|p| p.key.as_str() == key)
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Returns `true` if the table has no properties.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Decodes every property into `group`, starting from `group`'s current
    /// field values. The first property that fails fails the whole decode.
    pub fn decode(&self, decoder: &dyn ToggleDecoder, mut group: G) -> ToggleResult<G> {
        for property in &self.properties {
            (property.decode)(decoder, &property.key, &mut group)?;
        }
        Ok(group)
    }

    /// Builds the value tree form of `group`, one entry per property.
    pub fn encode(&self, group: &G) -> Value {
        self.properties
            .iter()
            .fold(Value::empty_map(), |tree, property| {
                match tree::write(&tree, &property.key, property.value_of(group)) {
                    Ok(next) => next,
                    Err(error) => {
                        warn!(key = %property.key, error = %error, "Skipping unencodable property");
                        tree
                    }
                }
            })
    }
}

// =============================================================================
// Group
// =============================================================================

/// A toggle over a [`ToggleGroup`] type.
///
/// Dereferences to the underlying [`Toggle`], so every resolution and
/// override method is available.
#[derive(Clone)]
pub struct Group<G: ToggleGroup> {
    toggle: Toggle<G>,
    properties: Arc<PropertyTable<G>>,
}

impl<G: ToggleGroup> fmt::Debug for Group<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("toggle", &self.toggle)
            .field("properties", &self.properties)
            .finish()
    }
}

impl<G: ToggleGroup> Group<G> {
    /// Creates a group toggle at `key` with `G::default()` as its default.
    pub fn new(key: impl Into<KeyPath>, provider: Arc<dyn ToggleProvider>) -> Self {
        let properties = Arc::new(G::properties());
        let decode_table = Arc::clone(&properties);
        let encode_table = Arc::clone(&properties);

        let decode: DecodeFn<G> = Arc::new(move |decoder: &dyn ToggleDecoder, default: &G| {
            decode_table.decode(decoder, default.clone())
        });
        let encode: EncodeFn<G> = Arc::new(move |group: &G| encode_table.encode(group));

        Self {
            toggle: Toggle::with_rules(key, G::default(), provider, ToggleKind::Group, decode, encode),
            properties,
        }
    }

    /// Replaces the default value.
    pub fn with_default(mut self, default: G) -> Self {
        self.toggle = self.toggle.with_default(default);
        self
    }

    /// Sets the human-readable description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.toggle = self.toggle.with_description(description);
        self
    }

    /// Sets the candidate values offered by debug tooling.
    pub fn with_debug_values(mut self, values: impl IntoIterator<Item = G>) -> Self {
        self.toggle = self.toggle.with_debug_values(values);
        self
    }

    /// The underlying toggle.
    pub fn toggle(&self) -> &Toggle<G> {
        &self.toggle
    }

    /// The property table of `G`.
    pub fn properties(&self) -> &PropertyTable<G> {
        &self.properties
    }

    /// The absolute key of a property.
    pub fn property_key(&self, key: &str) -> KeyPath {
        self.toggle.key().child(key)
    }

    /// Overrides a single property, leaving the others untouched.
    pub fn set_property(&self, key: &str, value: impl Into<Value>) -> ToggleResult<()> {
        self.toggle
            .provider()
            .override_provider()
            .set_value(&self.property_key(key), value.into())
    }

    /// Removes the override for a single property.
    pub fn clear_property(&self, key: &str) -> ToggleResult<()> {
        self.toggle
            .provider()
            .override_provider()
            .clear_value(&self.property_key(key))
    }

    /// Returns `true` if the override layer holds a value for the property.
    pub fn has_property_override(&self, key: &str) -> bool {
        self.toggle
            .provider()
            .override_provider()
            .has_value(&self.property_key(key))
    }
}

impl<G: ToggleGroup> Deref for Group<G> {
    type Target = Toggle<G>;

    fn deref(&self) -> &Toggle<G> {
        &self.toggle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToggleError;
    use crate::provider::{InMemoryProvider, OverridableProvider, PersistentProvider};
    use crate::storage::MemoryStorage;
    use futures::StreamExt;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Default)]
    enum Speed {
        #[default]
        Slow,
        Fast,
    }

    impl ToggleChoice for Speed {
        fn all_cases() -> Vec<Self> {
            vec![Speed::Slow, Speed::Fast]
        }

        fn raw_value(&self) -> &str {
            match self {
                Speed::Slow => "slow",
                Speed::Fast => "fast",
            }
        }
    }

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Limits {
        max: u32,
    }

    impl ToggleGroup for Limits {
        fn properties() -> PropertyTable<Self> {
            PropertyTable::new().with(GroupProperty::value("max", |l: &mut Limits| &mut l.max))
        }
    }

    #[derive(Debug, Clone, PartialEq, Default)]
    struct Config {
        f: String,
        g: bool,
        speed: Speed,
        limits: Limits,
    }

    impl ToggleGroup for Config {
        fn properties() -> PropertyTable<Self> {
            PropertyTable::new()
                .with(GroupProperty::value("f", |c: &mut Config| &mut c.f).with_description("Flavor"))
                .with(GroupProperty::value("g", |c: &mut Config| &mut c.g))
                .with(GroupProperty::choice("speed", |c: &mut Config| &mut c.speed))
                .with(GroupProperty::group("limits", |c: &mut Config| &mut c.limits))
        }
    }

    fn local(defaults: serde_json::Value) -> Arc<dyn ToggleProvider> {
        let base = InMemoryProvider::new("defaults", defaults);
        let overrides = PersistentProvider::new("overrides", MemoryStorage::new()).unwrap();
        Arc::new(OverridableProvider::new(
            "local",
            Arc::new(base),
            Arc::new(overrides),
        ))
    }

    fn config_group() -> Group<Config> {
        Group::new(
            "config",
            local(json!({
                "config": {"f": "old", "g": false, "speed": "fast", "limits": {"max": 3}}
            })),
        )
    }

    #[test]
    fn test_partial_override_merges_with_base() {
        let group = config_group();
        group.set_property("g", true).unwrap();

        let value = group.value().unwrap();
        assert_eq!(value.f, "old");
        assert!(value.g);
        assert_eq!(value.speed, Speed::Fast);
        assert_eq!(value.limits, Limits { max: 3 });
        assert!(group.has_property_override("g"));
        assert!(!group.has_property_override("f"));
    }

    #[test]
    fn test_nested_group_property_override() {
        let group = config_group();
        group.set_property("limits.max", "9").unwrap();
        assert_eq!(group.value().unwrap().limits.max, 9);
        assert_eq!(group.base_value().unwrap().limits.max, 3);
    }

    #[test]
    fn test_malformed_override_field_falls_back_to_base() {
        let group = config_group();
        group.set_property("limits.max", "lots").unwrap();
        assert_eq!(group.value().unwrap().limits.max, 3);
    }

    #[test]
    fn test_field_missing_everywhere_fails_group() {
        let group = Group::<Config>::new("config", local(json!({"config": {"f": "x"}})))
            .with_default(Config {
                f: "fallback".into(),
                ..Config::default()
            });

        let resolved = group.resolve();
        assert_eq!(resolved.value.f, "fallback");
        assert_eq!(resolved.error, Some(ToggleError::key_not_found("config.g")));
    }

    #[test]
    fn test_unknown_choice_keeps_default() {
        let group = config_group();
        group.set_property("speed", "warp").unwrap();
        assert_eq!(group.value().unwrap().speed, Speed::Slow);
    }

    #[test]
    fn test_whole_group_override_round_trips() {
        let group = config_group();
        let replacement = Config {
            f: "new".into(),
            g: true,
            speed: Speed::Slow,
            limits: Limits { max: 42 },
        };
        group.set_override(&replacement).unwrap();
        assert_eq!(group.value().unwrap(), replacement);

        group.clear_override().unwrap();
        assert_eq!(group.value().unwrap().f, "old");
    }

    #[test]
    fn test_property_metadata() {
        let group = config_group();
        let properties = group.properties();
        assert_eq!(properties.len(), 4);
        assert_eq!(properties.get("f").unwrap().description(), "Flavor");
        assert_eq!(
            properties.get("speed").unwrap().debug_values(),
            &[Value::from("slow"), Value::from("fast")]
        );
        assert_eq!(group.property_key("limits.max").as_str(), "config.limits.max");
        assert_eq!(group.kind(), ToggleKind::Group);
    }

    #[test]
    fn test_encode_builds_nested_tree() {
        let table = Config::properties();
        let encoded = table.encode(&Config {
            f: "a".into(),
            g: true,
            speed: Speed::Fast,
            limits: Limits { max: 2 },
        });
        assert_eq!(
            serde_json::Value::from(encoded),
            json!({"f": "a", "g": true, "speed": "fast", "limits": {"max": "2"}})
        );
    }

    #[tokio::test]
    async fn test_group_stream_follows_property_overrides() {
        let group = config_group();
        let mut values = group.stream();

        let first = values.next().await.unwrap().unwrap();
        assert!(!first.g);

        group.set_property("g", true).unwrap();
        let second = values.next().await.unwrap().unwrap();
        assert!(second.g);
        assert_eq!(second.f, "old");
    }
}
