//! # Relation Resolver
//!
//! Turns a fetched resource object into a [`ResolvedBody`]. Only fields explicitly named by a
//! link descriptor are touched:
//!
//! - a scalar identifier (number or string) becomes an entity [`RestStore`] bound to the
//!   link's `href` (to-one);
//! - a list of identifiers, empty lists included, becomes a collection [`RestStore`] bound to
//!   the `href` (to-many). The URL decides what gets fetched, not the identifiers.
//!
//! Everything else is left as fetched. A linked field whose value is neither shape, or a
//! link naming a field the body does not have, is logged and skipped; the rest of the body
//! still resolves.
//!
//! Constructing a child store starts its fetch, so resolving and fetching happen in one pass.

use crate::body::{Field, ResolvedBody, StoreKind};
use crate::client::LinkDescriptor;
use crate::config::StoreContext;
use crate::store::RestStore;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

/// How a placeholder value relates to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationShape {
    ToOne,
    ToMany,
}

impl RelationShape {
    pub fn store_kind(self) -> StoreKind {
        match self {
            RelationShape::ToOne => StoreKind::Entity,
            RelationShape::ToMany => StoreKind::Collection,
        }
    }
}

fn is_identifier(value: &Value) -> bool {
    matches!(value, Value::Number(_) | Value::String(_))
}

/// Classifies a placeholder value, or `None` when it is not an identifier or identifier list.
pub fn classify(value: &Value) -> Option<RelationShape> {
    match value {
        Value::Array(items) if items.iter().all(is_identifier) => Some(RelationShape::ToMany),
        value if is_identifier(value) => Some(RelationShape::ToOne),
        _ => None,
    }
}

/// Removes the reserved links field from `object` and decodes it.
///
/// A malformed field is dropped with a warning rather than failing the body.
pub fn take_links(object: &mut Map<String, Value>, links_field: &str) -> Vec<LinkDescriptor> {
    match object.remove(links_field) {
        None | Some(Value::Null) => Vec::new(),
        Some(raw) => serde_json::from_value(raw).unwrap_or_else(|e| {
            warn!(field = links_field, error = %e, "Ignoring malformed link descriptors");
            Vec::new()
        }),
    }
}

/// Resolves one resource object.
///
/// `extra_links` are descriptors supplied outside the body (see
/// [`RestResponse::links`](crate::RestResponse::links)); they are merged with the ones found
/// under the reserved links field. When two descriptors name the same relation the first one
/// wins.
pub fn resolve(
    mut object: Map<String, Value>,
    extra_links: &[LinkDescriptor],
    ctx: &StoreContext,
) -> ResolvedBody {
    let embedded = take_links(&mut object, &ctx.config.links_field);

    let mut targets: HashMap<&str, &str> = HashMap::new();
    for link in embedded.iter().chain(extra_links) {
        targets.entry(link.rel.as_str()).or_insert(link.href.as_str());
    }

    for rel in targets.keys() {
        if !object.contains_key(*rel) {
            debug!(rel, "Link has no matching field");
        }
    }

    let mut body = ResolvedBody::new();
    for (name, value) in object {
        let field = match targets.get(name.as_str()) {
            None => Field::Value(value),
            Some(href) => match classify(&value) {
                Some(shape) => {
                    debug!(rel = %name, href, ?shape, "Resolving relation");
                    Field::Relation(RestStore::new(*href, shape.store_kind(), ctx.clone()))
                }
                None => {
                    warn!(rel = %name, href, "Linked field is not an identifier, leaving as-is");
                    Field::Value(value)
                }
            },
        };
        body.insert(name, field);
    }
    body
}
