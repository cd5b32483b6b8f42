//! # Rest Store
//!
//! [`RestStore`] owns the fetch lifecycle of one REST resource, either a single entity or a
//! collection, and the live graph of child stores discovered through its link descriptors.
//!
//! ## Lifecycle
//!
//! 1. **Construct**: the store starts as `{ loading: true, response: empty }`, visible to
//!    subscribers immediately, and a worker task issues exactly one GET.
//! 2. **Resolve**: the body goes through the [resolver](crate::resolver). For a collection
//!    every element is resolved on its own, with its own link descriptors. Relation fields
//!    become child stores, which start their own fetches.
//! 3. **Aggregate**: the response is published at once, with `loading` still true while any
//!    child is loading. The worker watches every child and, each time one of them emits,
//!    recomputes `loading = any(child.loading)` and republishes the response. Because the
//!    value is recomputed from the children's current states, duplicate or out-of-order
//!    notifications converge to the same result.
//! 4. **Fail**: a failed fetch publishes `{ loading: false, error: Some(..) }`. A failed
//!    child counts as settled, so one broken relation never keeps its parent loading.
//!
//! ## Concurrency Model
//!
//! Each store has a worker task that is the sole writer of its state, in the spirit of an
//! actor: handles talk to it over an mpsc channel and get answers over oneshot channels.
//! Child notifications arrive through a [`Notify`], which coalesces bursts into a single
//! recomputation. The worker keeps only a weak reference to the store and stops once every
//! handle has been dropped.
//!
//! Relation cycles (A links to B links to A) are not detected. Each store in the cycle is
//! simply another independently fetched store.

use crate::body::{Resolved, ResolvedBody, StoreKind, StoreState};
use crate::client::{LinkDescriptor, RestResponse};
use crate::config::StoreContext;
use crate::error::{json_kind, RestError};
use crate::message::StoreRequest;
use crate::resolver::{resolve, take_links};
use crate::subscription::{Listener, Subscription, SubscriptionRegistry};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, oneshot, Notify};
use tracing::{debug, info, instrument, warn};

/// The contract shared by real stores and store test doubles.
///
/// Consumer code that only reads state, subscribes and issues mutations can take a
/// `&dyn ResourceStore` and be tested against
/// [`RestCollectionStoreMock`](crate::mock::RestCollectionStoreMock).
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Snapshot of the current state.
    fn state(&self) -> StoreState;

    /// Registers a listener; it is called right away with the current state.
    fn subscribe(&self, listener: Listener<StoreState>) -> Subscription;

    /// Creates an entity. The identifier field is not sent.
    async fn post(&self, payload: Value) -> Result<Value, RestError>;

    /// Partially updates an entity. The payload must carry the identifier field.
    async fn patch(&self, payload: Value) -> Result<Value, RestError>;

    /// Deletes an entity and resolves to the store's response afterwards.
    async fn delete(&self, payload: Value) -> Result<Resolved, RestError>;
}

struct StoreInner {
    url: String,
    kind: StoreKind,
    ctx: StoreContext,
    registry: SubscriptionRegistry<StoreState>,
    sender: mpsc::Sender<StoreRequest>,
}

/// A reactive store bound to one URL.
///
/// Cloning is cheap and every clone observes the same state.
///
/// Constructing a store spawns its worker with [`tokio::spawn`], so it must happen inside a
/// Tokio runtime.
///
/// # Example
///
/// ```rust
/// use rest_store::mock::MockRestClient;
/// use rest_store::{RestStore, StoreContext};
/// use serde_json::json;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() {
///     let client = MockRestClient::new();
///     client.expect_get("/posts/1").return_ok(json!({
///         "__links": [{ "rel": "author", "href": "/authors/1" }],
///         "id": 1,
///         "author": 1
///     }));
///     client.expect_get("/authors/1").return_ok(json!({ "id": 1, "name": "author 1" }));
///
///     let post = RestStore::entity("/posts/1", StoreContext::new(Arc::new(client)));
///     let state = post.settled().await;
///
///     let author = state.response.as_entity().unwrap().relation("author").unwrap();
///     assert_eq!(author.state().response.to_value(), json!({ "id": 1, "name": "author 1" }));
/// }
/// ```
#[derive(Clone)]
pub struct RestStore {
    inner: Arc<StoreInner>,
}

impl RestStore {
    /// Creates a store of the given kind and starts fetching `url`.
    pub fn new(url: impl Into<String>, kind: StoreKind, ctx: StoreContext) -> Self {
        Self::start(url.into(), kind, ctx, StoreState::initial(kind), false)
    }

    /// Creates a store for a single resource.
    pub fn entity(url: impl Into<String>, ctx: StoreContext) -> Self {
        Self::new(url, StoreKind::Entity, ctx)
    }

    /// Creates a store for a list of resources.
    pub fn collection(url: impl Into<String>, ctx: StoreContext) -> Self {
        Self::new(url, StoreKind::Collection, ctx)
    }

    /// Creates an already-settled store from `data`, without fetching.
    ///
    /// Relations in the seed are not resolved. Mutations still go to `url`.
    pub fn seeded(
        url: impl Into<String>,
        kind: StoreKind,
        data: Value,
        ctx: StoreContext,
    ) -> Result<Self, RestError> {
        let url = url.into();
        let response = match split_shape(kind, &url, data)? {
            Shape::One(mut object) => {
                take_links(&mut object, &ctx.config.links_field);
                Resolved::Entity(ResolvedBody::from_object(object))
            }
            Shape::Many(items) => Resolved::Collection(
                items
                    .into_iter()
                    .map(|mut object| {
                        take_links(&mut object, &ctx.config.links_field);
                        ResolvedBody::from_object(object)
                    })
                    .collect(),
            ),
        };
        Ok(Self::start(
            url,
            kind,
            ctx,
            StoreState::settled(response),
            true,
        ))
    }

    fn start(
        url: String,
        kind: StoreKind,
        ctx: StoreContext,
        initial: StoreState,
        seeded: bool,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(ctx.config.buffer_size);
        let loading = initial.loading;
        let response = initial.response.clone();
        let inner = Arc::new(StoreInner {
            url,
            kind,
            ctx,
            registry: SubscriptionRegistry::new(initial),
            sender,
        });
        let worker = Worker {
            store: Arc::downgrade(&inner),
            url: inner.url.clone(),
            kind,
            ctx: inner.ctx.clone(),
            receiver,
            changed: Arc::new(Notify::new()),
            loading,
            response,
            error: None,
            subscriptions: Vec::new(),
        };
        tokio::spawn(worker.run(seeded));
        Self { inner }
    }

    pub fn url(&self) -> &str {
        &self.inner.url
    }

    pub fn kind(&self) -> StoreKind {
        self.inner.kind
    }

    pub fn state(&self) -> StoreState {
        self.inner.registry.current()
    }

    /// The current state as `{ "loading": .., "response": .. }`.
    pub fn to_value(&self) -> Value {
        self.state().to_value()
    }

    /// Registers `listener`, calling it synchronously with the current state first.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StoreState) + Send + Sync + 'static,
    {
        self.inner.registry.subscribe(listener)
    }

    /// Registers `listener` for future states only.
    pub(crate) fn subscribe_changes<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&StoreState) + Send + Sync + 'static,
    {
        self.inner.registry.subscribe_changes(listener)
    }

    /// Waits until the store and everything reachable from it has settled.
    ///
    /// Returns at once, without any request, when the store has already settled.
    pub async fn settled(&self) -> StoreState {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe(move |state| {
            let _ = tx.send(state.clone());
        });
        while let Some(state) = rx.recv().await {
            if !state.loading {
                subscription.unsubscribe();
                return state;
            }
        }
        self.state()
    }

    /// Creates an entity via POST and resolves to the created body.
    ///
    /// The result is not merged into this store's response.
    #[instrument(skip(self, payload), fields(url = %self.inner.url))]
    pub async fn post(&self, payload: Value) -> Result<Value, RestError> {
        let mut object = into_object(payload)?;
        object.remove(&self.inner.ctx.config.id_field);
        debug!("Sending request");
        self.inner
            .ctx
            .client
            .post(&self.inner.url, &Value::Object(object))
            .await
    }

    /// Updates an entity via PATCH and resolves to the updated body.
    #[instrument(skip(self, payload), fields(url = %self.inner.url))]
    pub async fn patch(&self, payload: Value) -> Result<Value, RestError> {
        let object = into_object(payload)?;
        require_id(&object, &self.inner.ctx.config.id_field)?;
        debug!("Sending request");
        self.inner
            .ctx
            .client
            .patch(&self.inner.url, &Value::Object(object))
            .await
    }

    /// Deletes an entity via DELETE, then removes it from this store.
    ///
    /// A collection drops the first element with a matching identifier and keeps the order
    /// of the rest; an entity store is cleared. Resolves to the response after removal.
    #[instrument(skip(self, payload), fields(url = %self.inner.url))]
    pub async fn delete(&self, payload: Value) -> Result<Resolved, RestError> {
        let object = into_object(payload)?;
        let id_field = &self.inner.ctx.config.id_field;
        let id = require_id(&object, id_field)?.clone();

        let mut body = Map::new();
        body.insert(id_field.clone(), id.clone());
        debug!(%id, "Sending request");
        self.inner
            .ctx
            .client
            .delete(&self.inner.url, &Value::Object(body))
            .await?;

        let (respond_to, response) = oneshot::channel();
        let request = match self.inner.kind {
            StoreKind::Collection => StoreRequest::RemoveItem { id, respond_to },
            StoreKind::Entity => StoreRequest::Clear { respond_to },
        };
        self.inner
            .sender
            .send(request)
            .await
            .map_err(|_| RestError::StoreClosed)?;
        response.await.map_err(|_| RestError::StoreDropped)?
    }
}

#[async_trait]
impl ResourceStore for RestStore {
    fn state(&self) -> StoreState {
        RestStore::state(self)
    }

    fn subscribe(&self, listener: Listener<StoreState>) -> Subscription {
        RestStore::subscribe(self, move |state| listener(state))
    }

    async fn post(&self, payload: Value) -> Result<Value, RestError> {
        RestStore::post(self, payload).await
    }

    async fn patch(&self, payload: Value) -> Result<Value, RestError> {
        RestStore::patch(self, payload).await
    }

    async fn delete(&self, payload: Value) -> Result<Resolved, RestError> {
        RestStore::delete(self, payload).await
    }
}

impl fmt::Debug for RestStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestStore")
            .field("url", &self.inner.url)
            .field("kind", &self.inner.kind)
            .field("loading", &self.state().loading)
            .finish()
    }
}

pub(crate) fn into_object(payload: Value) -> Result<Map<String, Value>, RestError> {
    match payload {
        Value::Object(object) => Ok(object),
        other => Err(RestError::InvalidPayload(format!(
            "expected an object, found {}",
            json_kind(&other)
        ))),
    }
}

pub(crate) fn require_id<'a>(
    object: &'a Map<String, Value>,
    id_field: &str,
) -> Result<&'a Value, RestError> {
    match object.get(id_field) {
        Some(id) if !id.is_null() => Ok(id),
        _ => Err(RestError::MissingIdentifier {
            field: id_field.to_string(),
        }),
    }
}

enum Shape {
    One(Map<String, Value>),
    Many(Vec<Map<String, Value>>),
}

fn split_shape(kind: StoreKind, url: &str, data: Value) -> Result<Shape, RestError> {
    let unexpected = |expected, found: &Value| RestError::UnexpectedShape {
        url: url.to_string(),
        expected,
        found: json_kind(found),
    };
    match (kind, data) {
        (StoreKind::Entity, Value::Object(object)) => Ok(Shape::One(object)),
        (StoreKind::Entity, other) => Err(unexpected("object", &other)),
        (StoreKind::Collection, Value::Array(items)) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(object) => Ok(object),
                other => Err(unexpected("object", &other)),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Shape::Many),
        (StoreKind::Collection, other) => Err(unexpected("array", &other)),
    }
}

/// The task that owns a store's state.
struct Worker {
    store: Weak<StoreInner>,
    url: String,
    kind: StoreKind,
    ctx: StoreContext,
    receiver: mpsc::Receiver<StoreRequest>,
    changed: Arc<Notify>,
    loading: bool,
    response: Resolved,
    error: Option<Arc<RestError>>,
    subscriptions: Vec<Subscription>,
}

impl Worker {
    async fn run(mut self, seeded: bool) {
        let kind = self.kind.name();
        if !seeded {
            info!(url = %self.url, kind, "Fetching");
            let result = self.ctx.client.get(&self.url).await;
            if !self.settle_fetch(result) {
                return;
            }
        }

        loop {
            tokio::select! {
                request = self.receiver.recv() => match request {
                    Some(request) => {
                        if !self.handle(request) {
                            break;
                        }
                    }
                    None => break,
                },
                () = self.changed.notified() => {
                    if !self.recompute() {
                        break;
                    }
                }
            }
        }

        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
        debug!(url = %self.url, kind, "Worker stopped");
    }

    /// Applies the GET result. Returns false when the store is gone.
    fn settle_fetch(&mut self, result: Result<RestResponse, RestError>) -> bool {
        let kind = self.kind.name();
        match result.and_then(|response| self.build(response)) {
            Ok(response) => {
                self.response = response;
                let children = self.response.relations();
                // Watch before reading, so a child settling in between is not missed.
                for child in &children {
                    let changed = self.changed.clone();
                    self.subscriptions
                        .push(child.subscribe_changes(move |_| changed.notify_one()));
                }
                self.loading = children.iter().any(|child| child.state().loading);
                info!(
                    url = %self.url,
                    kind,
                    children = children.len(),
                    loading = self.loading,
                    "Fetched"
                );
                self.publish()
            }
            Err(e) => {
                warn!(url = %self.url, kind, error = %e, "Fetch failed");
                let StoreState {
                    loading,
                    response,
                    error,
                } = StoreState::failed(self.kind, e);
                self.loading = loading;
                self.response = response;
                self.error = error;
                self.publish()
            }
        }
    }

    fn build(&self, response: RestResponse) -> Result<Resolved, RestError> {
        let RestResponse { data, links } = response;
        Ok(match split_shape(self.kind, &self.url, data)? {
            Shape::One(object) => Resolved::Entity(resolve(object, &links, &self.ctx)),
            Shape::Many(items) => {
                if !links.is_empty() {
                    debug!(url = %self.url, "Ignoring response-level links for a collection");
                }
                let no_links: &[LinkDescriptor] = &[];
                Resolved::Collection(
                    items
                        .into_iter()
                        .map(|item| resolve(item, no_links, &self.ctx))
                        .collect(),
                )
            }
        })
    }

    /// Recomputes the aggregated flag and republishes. Returns false when the store is gone.
    ///
    /// Every child emission is republished, even when the flag is unchanged, since relation
    /// fields render the child's current response.
    fn recompute(&mut self) -> bool {
        if self.error.is_some() {
            return true;
        }
        let loading = self
            .response
            .relations()
            .iter()
            .any(|child| child.state().loading);
        debug!(url = %self.url, loading, "Child changed");
        if self.loading && !loading {
            info!(url = %self.url, kind = self.kind.name(), "Settled");
        }
        self.loading = loading;
        self.publish()
    }

    fn handle(&mut self, request: StoreRequest) -> bool {
        match request {
            StoreRequest::RemoveItem { id, respond_to } => {
                let id_field = &self.ctx.config.id_field;
                let removed = match &mut self.response {
                    Resolved::Collection(items) => {
                        match items.iter().position(|item| item.value(id_field) == Some(&id)) {
                            Some(index) => {
                                items.remove(index);
                                true
                            }
                            None => false,
                        }
                    }
                    Resolved::Entity(_) => false,
                };
                debug!(url = %self.url, %id, removed, "Remove");
                if removed {
                    self.loading = self.error.is_none()
                        && self
                            .response
                            .relations()
                            .iter()
                            .any(|child| child.state().loading);
                    if !self.publish() {
                        return false;
                    }
                }
                let _ = respond_to.send(Ok(self.response.clone()));
            }
            StoreRequest::Clear { respond_to } => {
                debug!(url = %self.url, "Clear");
                self.response = self.kind.empty_response();
                self.loading = false;
                if !self.publish() {
                    return false;
                }
                let _ = respond_to.send(Ok(self.response.clone()));
            }
        }
        true
    }

    fn publish(&self) -> bool {
        let Some(store) = self.store.upgrade() else {
            return false;
        };
        store.registry.publish(StoreState {
            loading: self.loading,
            response: self.response.clone(),
            error: self.error.clone(),
        });
        true
    }
}
