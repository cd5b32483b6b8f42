//! # Resolved Bodies & Store State
//!
//! A store never exposes the raw JSON it fetched. It exposes a [`ResolvedBody`]: the same
//! fields, except that every field named by a link descriptor now holds a child
//! [`RestStore`] instead of the placeholder identifier. Callers navigate relations through
//! the child store's own state.
//!
//! [`StoreState`] is what subscribers receive: the aggregated `loading` flag, the resolved
//! response, and the fetch error if there was one.

use crate::error::RestError;
use crate::store::RestStore;
use serde_json::{Map, Value};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One field of a resolved body.
#[derive(Debug, Clone)]
pub enum Field {
    /// Plain data, exactly as fetched.
    Value(Value),
    /// A relation, replaced by the store bound to its link target.
    Relation(RestStore),
}

impl Field {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Field::Value(value) => Some(value),
            Field::Relation(_) => None,
        }
    }

    pub fn as_store(&self) -> Option<&RestStore> {
        match self {
            Field::Value(_) => None,
            Field::Relation(store) => Some(store),
        }
    }

    /// Renders the field as JSON. Relations render as the child's current response.
    pub fn to_value(&self) -> Value {
        match self {
            Field::Value(value) => value.clone(),
            Field::Relation(store) => store.state().response.to_value(),
        }
    }
}

/// A resource body whose relation fields have been replaced by child stores.
#[derive(Debug, Clone, Default)]
pub struct ResolvedBody {
    fields: BTreeMap<String, Field>,
}

impl ResolvedBody {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a JSON object without resolving anything.
    pub fn from_object(object: Map<String, Value>) -> Self {
        Self {
            fields: object
                .into_iter()
                .map(|(name, value)| (name, Field::Value(value)))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        self.get(name).and_then(Field::as_value)
    }

    pub fn relation(&self, name: &str) -> Option<&RestStore> {
        self.get(name).and_then(Field::as_store)
    }

    pub fn insert(&mut self, name: impl Into<String>, field: Field) -> Option<Field> {
        self.fields.insert(name.into(), field)
    }

    pub fn remove(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, Field> {
        self.fields.iter()
    }

    /// Every child store held by this body.
    pub fn relations(&self) -> impl Iterator<Item = &RestStore> {
        self.fields.values().filter_map(Field::as_store)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(name, field)| (name.clone(), field.to_value()))
                .collect(),
        )
    }
}

impl<'a> IntoIterator for &'a ResolvedBody {
    type Item = (&'a String, &'a Field);
    type IntoIter = btree_map::Iter<'a, String, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// The two store variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// A single resource; bound to to-one relations.
    Entity,
    /// A list of resources; bound to to-many relations.
    Collection,
}

impl StoreKind {
    pub(crate) fn empty_response(self) -> Resolved {
        match self {
            StoreKind::Entity => Resolved::Entity(ResolvedBody::new()),
            StoreKind::Collection => Resolved::Collection(Vec::new()),
        }
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            StoreKind::Entity => "entity",
            StoreKind::Collection => "collection",
        }
    }
}

/// The response held by a store.
#[derive(Debug, Clone)]
pub enum Resolved {
    Entity(ResolvedBody),
    Collection(Vec<ResolvedBody>),
}

impl Resolved {
    pub fn as_entity(&self) -> Option<&ResolvedBody> {
        match self {
            Resolved::Entity(body) => Some(body),
            Resolved::Collection(_) => None,
        }
    }

    pub fn as_collection(&self) -> Option<&[ResolvedBody]> {
        match self {
            Resolved::Entity(_) => None,
            Resolved::Collection(items) => Some(items),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Resolved::Entity(body) => body.is_empty(),
            Resolved::Collection(items) => items.is_empty(),
        }
    }

    /// Every child store reachable from this response in one step.
    pub fn relations(&self) -> Vec<RestStore> {
        match self {
            Resolved::Entity(body) => body.relations().cloned().collect(),
            Resolved::Collection(items) => items
                .iter()
                .flat_map(ResolvedBody::relations)
                .cloned()
                .collect(),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Resolved::Entity(body) => body.to_value(),
            Resolved::Collection(items) => {
                Value::Array(items.iter().map(ResolvedBody::to_value).collect())
            }
        }
    }
}

/// A snapshot of a store, as delivered to subscribers.
#[derive(Debug, Clone)]
pub struct StoreState {
    /// True while the store's own fetch, or any child store, has not settled.
    pub loading: bool,
    pub response: Resolved,
    /// Set when the store's own fetch failed. A failed store is not loading.
    pub error: Option<Arc<RestError>>,
}

impl StoreState {
    /// The state of a store that has not fetched yet.
    pub fn initial(kind: StoreKind) -> Self {
        Self {
            loading: true,
            response: kind.empty_response(),
            error: None,
        }
    }

    pub fn settled(response: Resolved) -> Self {
        Self {
            loading: false,
            response,
            error: None,
        }
    }

    pub fn failed(kind: StoreKind, error: RestError) -> Self {
        Self {
            loading: false,
            response: kind.empty_response(),
            error: Some(Arc::new(error)),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&RestError> {
        self.error.as_deref()
    }

    /// JSON view of `{ loading, response }`.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "loading": self.loading,
            "response": self.response.to_value(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn test_plain_body_round_trips_to_json() {
        let body = ResolvedBody::from_object(object(json!({ "id": 1, "name": "author 1" })));
        assert_eq!(body.len(), 2);
        assert_eq!(body.value("id"), Some(&json!(1)));
        assert!(body.relation("id").is_none());
        assert_eq!(body.to_value(), json!({ "id": 1, "name": "author 1" }));
    }

    #[test]
    fn test_initial_state_per_kind() {
        let entity = StoreState::initial(StoreKind::Entity);
        assert!(entity.loading);
        assert_eq!(entity.to_value(), json!({ "loading": true, "response": {} }));

        let collection = StoreState::initial(StoreKind::Collection);
        assert_eq!(
            collection.to_value(),
            json!({ "loading": true, "response": [] })
        );
    }

    #[test]
    fn test_failed_state_is_not_loading() {
        let state = StoreState::failed(
            StoreKind::Entity,
            RestError::Status {
                method: "GET",
                url: "/api/".into(),
                status: 500,
            },
        );
        assert!(!state.loading);
        assert!(state.is_failed());
        assert!(state.error().is_some_and(RestError::is_transport));
    }
}
