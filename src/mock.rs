//! # Test Doubles
//!
//! Two doubles, one per seam:
//!
//! | Double | Stands in for | Use it to test |
//! |--------|---------------|----------------|
//! | [`MockRestClient`] | [`HttpRestClient`] | Real stores without a server: relation graphs, loading aggregation, failures |
//! | [`RestCollectionStoreMock`] | [`ResourceStore`] | Consumer code that reads store state and calls mutations |
//!
//! ## MockRestClient
//!
//! Expectations are registered per method and URL and consumed in order. Sibling relation
//! fetches may arrive in any order, so matching is by `(method, url)` rather than by a single
//! global queue. Every request is recorded and can be inspected with
//! [`MockRestClient::calls`]. A request with no expectation left fails with
//! [`RestError::Unmocked`], which shows up as a failed store state instead of a hang.
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
//!     client.expect_get("/authors").return_ok(json!([{ "id": 1, "name": "author 1" }]));
//!
//!     let authors = RestStore::collection("/authors", StoreContext::new(Arc::new(client.clone())));
//!     let state = authors.settled().await;
//!
//!     assert_eq!(state.response.to_value(), json!([{ "id": 1, "name": "author 1" }]));
//!     client.verify();
//! }
//! ```
//!
//! ## Deferred Responses
//!
//! [`ExpectationBuilder::return_deferred`] hands back a [`Deferred`] that answers the request
//! later. This is how a test holds a child store in its loading state while it asserts on the
//! parent.
//!
//! ## RestCollectionStoreMock
//!
//! A collection store that never fetches. Its state is whatever it was seeded with (or
//! loading and empty), and `post`/`patch`/`delete` are spies: they record their payload and
//! answer with a stubbed value registered through `when_post`/`when_patch`/`when_delete`.

use crate::body::{Resolved, ResolvedBody, StoreKind, StoreState};
use crate::client::{HttpRestClient, RestResponse};
use crate::error::{json_kind, RestError};
use crate::store::ResourceStore;
use crate::subscription::{Listener, Subscription, SubscriptionRegistry};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::oneshot;

/// HTTP verbs known to the doubles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request seen by a double.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

// =============================================================================
// MOCK HTTP CLIENT
// =============================================================================

enum Reply {
    Ok(Value),
    Err(RestError),
    Deferred(oneshot::Receiver<Result<Value, RestError>>),
}

struct Expectation {
    method: Method,
    url: String,
    reply: Reply,
}

#[derive(Default)]
struct MockState {
    expectations: Vec<Expectation>,
    calls: Vec<RecordedCall>,
}

/// An [`HttpRestClient`] answering from registered expectations.
///
/// Clones share expectations and recorded calls, so a test can keep one clone for
/// assertions and hand another to the store.
#[derive(Clone, Default)]
pub struct MockRestClient {
    state: Arc<Mutex<MockState>>,
}

impl MockRestClient {
    /// Creates a mock client with no expectations.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn expect(&self, method: Method, url: impl Into<String>) -> ExpectationBuilder {
        ExpectationBuilder {
            method,
            url: url.into(),
            state: self.state.clone(),
        }
    }

    /// Expects a `get` of `url`.
    pub fn expect_get(&self, url: impl Into<String>) -> ExpectationBuilder {
        self.expect(Method::Get, url)
    }

    /// Expects a `post` to `url`.
    pub fn expect_post(&self, url: impl Into<String>) -> ExpectationBuilder {
        self.expect(Method::Post, url)
    }

    /// Expects a `patch` to `url`.
    pub fn expect_patch(&self, url: impl Into<String>) -> ExpectationBuilder {
        self.expect(Method::Patch, url)
    }

    /// Expects a `delete` at `url`. The stubbed value is ignored on success.
    pub fn expect_delete(&self, url: impl Into<String>) -> ExpectationBuilder {
        self.expect(Method::Delete, url)
    }

    /// Every request received so far, in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Number of requests received for `method` and `url`.
    pub fn call_count(&self, method: Method, url: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.method == method && call.url == url)
            .count()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let state = self.lock();
        if !state.expectations.is_empty() {
            let remaining: Vec<String> = state
                .expectations
                .iter()
                .map(|e| format!("{} {}", e.method, e.url))
                .collect();
            panic!(
                "Not all expectations were met. {} remaining: {}",
                remaining.len(),
                remaining.join(", ")
            );
        }
    }

    async fn answer(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Value, RestError> {
        let reply = {
            let mut state = self.lock();
            state.calls.push(RecordedCall {
                method,
                url: url.to_string(),
                body: body.cloned(),
            });
            let position = state
                .expectations
                .iter()
                .position(|e| e.method == method && e.url == url);
            match position {
                Some(index) => state.expectations.remove(index).reply,
                None => {
                    return Err(RestError::Unmocked {
                        method: method.as_str(),
                        url: url.to_string(),
                    })
                }
            }
        };
        match reply {
            Reply::Ok(value) => Ok(value),
            Reply::Err(e) => Err(e),
            Reply::Deferred(receiver) => receiver.await.unwrap_or_else(|_| {
                Err(RestError::Transport {
                    method: method.as_str(),
                    url: url.to_string(),
                    message: "deferred response dropped".to_string(),
                })
            }),
        }
    }
}

#[async_trait]
impl HttpRestClient for MockRestClient {
    async fn get(&self, url: &str) -> Result<RestResponse, RestError> {
        self.answer(Method::Get, url, None)
            .await
            .map(RestResponse::new)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, RestError> {
        self.answer(Method::Post, url, Some(body)).await
    }

    async fn patch(&self, url: &str, body: &Value) -> Result<Value, RestError> {
        self.answer(Method::Patch, url, Some(body)).await
    }

    async fn delete(&self, url: &str, body: &Value) -> Result<(), RestError> {
        self.answer(Method::Delete, url, Some(body)).await.map(|_| ())
    }
}

/// Builder for one expectation.
pub struct ExpectationBuilder {
    method: Method,
    url: String,
    state: Arc<Mutex<MockState>>,
}

impl ExpectationBuilder {
    fn push(self, reply: Reply) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.expectations.push(Expectation {
            method: self.method,
            url: self.url,
            reply,
        });
    }

    /// Sets the expectation to return a successful result.
    pub fn return_ok(self, value: Value) {
        self.push(Reply::Ok(value));
    }

    /// Sets the expectation to return an error.
    pub fn return_err(self, error: RestError) {
        self.push(Reply::Err(error));
    }

    /// Leaves the request pending until the returned handle is resolved.
    pub fn return_deferred(self) -> Deferred {
        let (sender, receiver) = oneshot::channel();
        self.push(Reply::Deferred(receiver));
        Deferred { sender }
    }
}

/// A pending response. Dropping it fails the request.
pub struct Deferred {
    sender: oneshot::Sender<Result<Value, RestError>>,
}

impl Deferred {
    pub fn resolve(self, value: Value) {
        let _ = self.sender.send(Ok(value));
    }

    pub fn reject(self, error: RestError) {
        let _ = self.sender.send(Err(error));
    }
}

// =============================================================================
// MOCK COLLECTION STORE
// =============================================================================

const MOCK_URL: &str = "<mock>";

struct Stub {
    method: Method,
    args: Value,
    returns: Value,
}

#[derive(Default)]
struct Spies {
    stubs: Vec<Stub>,
    calls: Vec<RecordedCall>,
}

/// A collection store double with spied mutations.
///
/// # Example
///
/// ```rust
/// use rest_store::mock::{Method, RestCollectionStoreMock};
/// use rest_store::ResourceStore;
/// use serde_json::json;
///
/// #[tokio::main]
/// async fn main() {
///     let mock = RestCollectionStoreMock::new();
///     mock.when_post(json!({ "foo": "bar" })).returns(json!({ "id": 1, "foo": "bar" }));
///
///     let created = mock.post(json!({ "foo": "bar" })).await.unwrap();
///
///     assert!(mock.was_called_with(Method::Post, &json!({ "foo": "bar" })));
///     assert_eq!(created, json!({ "id": 1, "foo": "bar" }));
/// }
/// ```
pub struct RestCollectionStoreMock {
    registry: SubscriptionRegistry<StoreState>,
    spies: Mutex<Spies>,
}

impl Default for RestCollectionStoreMock {
    fn default() -> Self {
        Self::new()
    }
}

impl RestCollectionStoreMock {
    /// A mock in its initial state: loading, with an empty response.
    pub fn new() -> Self {
        Self::with_state(StoreState::initial(StoreKind::Collection))
    }

    /// A settled mock whose response is `items`, which must be an array of objects.
    pub fn seeded(items: Value) -> Result<Self, RestError> {
        let response = items_to_response(items)?;
        Ok(Self::with_state(StoreState::settled(response)))
    }

    fn with_state(state: StoreState) -> Self {
        Self {
            registry: SubscriptionRegistry::new(state),
            spies: Mutex::new(Spies::default()),
        }
    }

    fn spies(&self) -> MutexGuard<'_, Spies> {
        self.spies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes `state` to subscribers, as a real store would.
    pub fn set_state(&self, state: StoreState) {
        self.registry.publish(state);
    }

    /// Stubs `post(args)`.
    pub fn when_post(&self, args: Value) -> StubBuilder<'_> {
        StubBuilder {
            mock: self,
            method: Method::Post,
            args,
        }
    }

    /// Stubs `patch(args)`.
    pub fn when_patch(&self, args: Value) -> StubBuilder<'_> {
        StubBuilder {
            mock: self,
            method: Method::Patch,
            args,
        }
    }

    /// Stubs `delete(args)`. The stubbed value must be an array of objects.
    pub fn when_delete(&self, args: Value) -> StubBuilder<'_> {
        StubBuilder {
            mock: self,
            method: Method::Delete,
            args,
        }
    }

    /// Every mutation call so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.spies().calls.clone()
    }

    pub fn was_called_with(&self, method: Method, args: &Value) -> bool {
        self.spies()
            .calls
            .iter()
            .any(|call| call.method == method && call.body.as_ref() == Some(args))
    }

    fn call(&self, method: Method, args: Value) -> Result<Value, RestError> {
        let mut spies = self.spies();
        let stubbed = spies
            .stubs
            .iter()
            .find(|stub| stub.method == method && stub.args == args)
            .map(|stub| stub.returns.clone());
        spies.calls.push(RecordedCall {
            method,
            url: MOCK_URL.to_string(),
            body: Some(args),
        });
        stubbed.ok_or(RestError::Unmocked {
            method: method.as_str(),
            url: MOCK_URL.to_string(),
        })
    }
}

#[async_trait]
impl ResourceStore for RestCollectionStoreMock {
    fn state(&self) -> StoreState {
        self.registry.current()
    }

    fn subscribe(&self, listener: Listener<StoreState>) -> Subscription {
        self.registry.subscribe(move |state| listener(state))
    }

    async fn post(&self, payload: Value) -> Result<Value, RestError> {
        self.call(Method::Post, payload)
    }

    async fn patch(&self, payload: Value) -> Result<Value, RestError> {
        self.call(Method::Patch, payload)
    }

    async fn delete(&self, payload: Value) -> Result<Resolved, RestError> {
        self.call(Method::Delete, payload).and_then(items_to_response)
    }
}

/// Builder for a mutation stub.
pub struct StubBuilder<'a> {
    mock: &'a RestCollectionStoreMock,
    method: Method,
    args: Value,
}

impl StubBuilder<'_> {
    pub fn returns(self, value: Value) {
        self.mock.spies().stubs.push(Stub {
            method: self.method,
            args: self.args,
            returns: value,
        });
    }
}

fn items_to_response(items: Value) -> Result<Resolved, RestError> {
    let unexpected = |expected, found: &Value| RestError::UnexpectedShape {
        url: MOCK_URL.to_string(),
        expected,
        found: json_kind(found),
    };
    match items {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(object) => Ok(ResolvedBody::from_object(object)),
                other => Err(unexpected("object", &other)),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Resolved::Collection),
        other => Err(unexpected("array", &other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_client_matches_by_method_and_url() {
        let mock = MockRestClient::new();
        mock.expect_get("/b").return_ok(json!({ "id": 2 }));
        mock.expect_get("/a").return_ok(json!({ "id": 1 }));

        let a = mock.get("/a").await.unwrap();
        let b = mock.get("/b").await.unwrap();

        assert_eq!(a.data, json!({ "id": 1 }));
        assert_eq!(b.data, json!({ "id": 2 }));
        assert_eq!(mock.call_count(Method::Get, "/a"), 1);
        mock.verify();
    }

    #[tokio::test]
    async fn test_mock_client_unmocked_request_fails() {
        let mock = MockRestClient::new();

        let err = mock.get("/nowhere").await.unwrap_err();

        assert!(matches!(err, RestError::Unmocked { method: "GET", .. }));
        assert_eq!(mock.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_mock_client_deferred() {
        let mock = MockRestClient::new();
        let deferred = mock.expect_get("/slow").return_deferred();

        let client = mock.clone();
        let request = tokio::spawn(async move { client.get("/slow").await });
        deferred.resolve(json!(true));

        let response = request.await.unwrap().unwrap();
        assert_eq!(response.data, json!(true));
    }

    #[tokio::test]
    async fn test_mock_client_dropped_deferred_fails() {
        let mock = MockRestClient::new();
        drop(mock.expect_get("/slow").return_deferred());

        let err = mock.get("/slow").await.unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    #[should_panic(expected = "Not all expectations were met")]
    fn test_verify_panics_on_leftovers() {
        let mock = MockRestClient::new();
        mock.expect_post("/a").return_ok(json!({}));
        mock.verify();
    }

    #[test]
    fn test_collection_mock_initial_state() {
        let mock = RestCollectionStoreMock::new();
        assert_eq!(
            mock.state().to_value(),
            json!({ "loading": true, "response": [] })
        );
    }

    #[test]
    fn test_collection_mock_rejects_non_object_seed() {
        assert!(RestCollectionStoreMock::seeded(json!([1])).is_err());
        assert!(RestCollectionStoreMock::seeded(json!({ "id": 1 })).is_err());
    }

    #[tokio::test]
    async fn test_collection_mock_unstubbed_call_is_recorded() {
        let mock = RestCollectionStoreMock::new();

        let err = mock.patch(json!({ "id": 1 })).await.unwrap_err();

        assert!(matches!(err, RestError::Unmocked { method: "PATCH", .. }));
        assert!(mock.was_called_with(Method::Patch, &json!({ "id": 1 })));
    }
}
