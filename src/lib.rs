//! # Rest Store
//!
//! Reactive client-side stores for REST resources whose bodies carry typed hyperlinks.
//!
//! Point a [`RestStore`] at a URL and it fetches the resource, finds the fields its link
//! descriptors name, and replaces each one with a child store bound to the link target. The
//! children fetch on their own, find their own relations, and so on. The parent's `loading`
//! flag only clears once everything reachable from it has settled.
//!
//! ## Architecture Overview
//!
//! The crate separates concerns into four layers:
//!
//! 1. **Transport Layer** ([`HttpRestClient`], [`FetchTransport`]) - the REST verbs, JSON in and out
//! 2. **Resolution Layer** ([`resolver`]) - which fields are relations, and which store each becomes
//! 3. **Store Layer** ([`RestStore`]) - fetch lifecycle, loading aggregation, mutations
//! 4. **Notification Layer** ([`SubscriptionRegistry`]) - fan-out of state changes to listeners
//!
//! ## Wire Format
//!
//! A resource declares its relations in a reserved field (default `__links`):
//!
//! ```json
//! {
//!   "__links": [{ "rel": "author", "href": "/authors/1" }],
//!   "id": 1,
//!   "author": 1
//! }
//! ```
//!
//! `author` holds a single identifier, so it becomes an entity store for `/authors/1`. A list
//! of identifiers (`"authors": [1, 2]`) becomes a collection store instead. Fields without a
//! link are never touched, whatever they look like.
//!
//! ## Example
//!
//! ```rust
//! use rest_store::mock::MockRestClient;
//! use rest_store::{RestStore, StoreContext};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = MockRestClient::new();
//!     client.expect_get("/books/1").return_ok(json!({
//!         "__links": [{ "rel": "authors", "href": "/books/1/authors" }],
//!         "id": 1,
//!         "authors": [1, 2]
//!     }));
//!     client.expect_get("/books/1/authors").return_ok(json!([
//!         { "id": 1, "name": "author 1" },
//!         { "id": 2, "name": "author 2" }
//!     ]));
//!
//!     let book = RestStore::entity("/books/1", StoreContext::new(Arc::new(client)));
//!     let state = book.settled().await;
//!
//!     assert_eq!(
//!         state.response.to_value(),
//!         json!({
//!             "id": 1,
//!             "authors": [{ "id": 1, "name": "author 1" }, { "id": 2, "name": "author 2" }]
//!         })
//!     );
//! }
//! ```
//!
//! ## Concurrency Model
//!
//! - Each store runs one Tokio task that is the only writer of its state
//! - Requests are the only suspension points; resolving, aggregating and publishing are synchronous
//! - Sibling fetches complete in any order; the aggregated flag converges regardless
//! - A store that never gets an answer stays loading; there are no built-in timeouts
//!
//! ## Errors
//!
//! A failed fetch is published as `{ loading: false, error: Some(..) }` rather than leaving
//! the store loading. A failed child counts as settled for its parent. Mutations with a
//! missing identifier are rejected before any request is sent. See [`RestError`].
//!
//! ## Testing
//!
//! [`mock::MockRestClient`] drives real stores from canned responses, and
//! [`mock::RestCollectionStoreMock`] stands in for a store in consumer code.

pub mod body;
pub mod client;
pub mod config;
pub mod error;
pub mod fetch;
pub mod message;
pub mod mock;
pub mod resolver;
pub mod store;
pub mod subscription;
pub mod tracing;

// Re-export core types for convenience
pub use body::{Field, Resolved, ResolvedBody, StoreKind, StoreState};
pub use client::{HttpRestClient, LinkDescriptor, RestResponse};
pub use config::{StoreConfig, StoreContext};
pub use error::RestError;
pub use fetch::FetchTransport;
pub use store::{ResourceStore, RestStore};
pub use subscription::{Listener, Subscription, SubscriptionRegistry};
