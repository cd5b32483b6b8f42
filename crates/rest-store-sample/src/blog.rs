//! # Blog Wiring
//!
//! Picks the transport for the sample and opens the stores it reads.
//!
//! With `REST_STORE_BASE_URL` set, stores talk to a real server through
//! [`FetchTransport`]. Without it, a [`MockRestClient`] serves a small fixture graph:
//!
//! ```text
//! /posts            -> [post 1, post 2]
//! post.author       -> /authors/{id}     (to-one)
//! post.tags         -> /posts/{id}/tags  (to-many)
//! ```

use rest_store::mock::MockRestClient;
use rest_store::{FetchTransport, RestError, RestStore, StoreContext};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Environment variable naming the server root.
pub const BASE_URL_ENV: &str = "REST_STORE_BASE_URL";

pub const POSTS_URL: &str = "/posts";

/// The stores the sample works with.
pub struct Blog {
    pub ctx: StoreContext,
    pub posts: RestStore,
}

impl Blog {
    /// Opens the post collection. Children are created as the posts resolve.
    pub fn open(ctx: StoreContext) -> Self {
        let posts = RestStore::collection(POSTS_URL, ctx.clone());
        Self { ctx, posts }
    }
}

/// Builds the context from the environment, falling back to fixtures.
pub fn context_from_env() -> Result<StoreContext, RestError> {
    match std::env::var(BASE_URL_ENV) {
        Ok(base_url) => {
            info!(%base_url, "Using HTTP transport");
            let transport = FetchTransport::with_base_url(&base_url)?;
            Ok(StoreContext::new(Arc::new(transport)))
        }
        Err(_) => {
            info!("{BASE_URL_ENV} not set, serving fixtures");
            let client = MockRestClient::new();
            fixtures(&client);
            Ok(StoreContext::new(Arc::new(client)))
        }
    }
}

/// Registers the fixture graph, plus one `post` and one `delete` on the collection.
pub fn fixtures(client: &MockRestClient) {
    client.expect_get(POSTS_URL).return_ok(json!([
        {
            "__links": [
                { "rel": "author", "href": "/authors/1" },
                { "rel": "tags", "href": "/posts/1/tags" }
            ],
            "id": 1,
            "title": "Reactive stores",
            "author": 1,
            "tags": [1, 2]
        },
        {
            "__links": [
                { "rel": "author", "href": "/authors/2" },
                { "rel": "tags", "href": "/posts/2/tags" }
            ],
            "id": 2,
            "title": "Typed hyperlinks",
            "author": 2,
            "tags": []
        }
    ]));
    client
        .expect_get("/authors/1")
        .return_ok(json!({ "id": 1, "name": "Ada" }));
    client
        .expect_get("/authors/2")
        .return_ok(json!({ "id": 2, "name": "Grace" }));
    client.expect_get("/posts/1/tags").return_ok(json!([
        { "id": 1, "label": "rust" },
        { "id": 2, "label": "rest" }
    ]));
    client.expect_get("/posts/2/tags").return_ok(json!([]));
    client
        .expect_post(POSTS_URL)
        .return_ok(json!({ "id": 3, "title": "Draft", "author": 1 }));
    client.expect_delete(POSTS_URL).return_ok(json!(null));
}
