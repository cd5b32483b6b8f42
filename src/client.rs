//! # HttpRestClient Trait
//!
//! The capability every store uses to talk to the outside world. Stores never build HTTP
//! requests themselves; they hold an `Arc<dyn HttpRestClient>` and call the four verbs on it.
//! [`FetchTransport`](crate::FetchTransport) is the production implementation and
//! [`MockRestClient`](crate::mock::MockRestClient) the test double.
use crate::error::RestError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declares that the field named `rel` is a placeholder whose data lives at `href`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkDescriptor {
    pub rel: String,
    pub href: String,
}

impl LinkDescriptor {
    pub fn new(rel: impl Into<String>, href: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            href: href.into(),
        }
    }
}

/// The result of a GET: the decoded body plus any link metadata the transport found
/// outside of it.
///
/// Most APIs embed their links inside `data` (under the reserved links field), in which case
/// `links` stays empty.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RestResponse {
    pub data: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkDescriptor>,
}

impl RestResponse {
    pub fn new(data: Value) -> Self {
        Self {
            data,
            links: Vec::new(),
        }
    }

    pub fn with_links(mut self, links: Vec<LinkDescriptor>) -> Self {
        self.links = links;
        self
    }
}

/// Performs the REST verbs a store needs.
///
/// All bodies are JSON. Implementations report network errors and non-success statuses as
/// transport errors (see [`RestError::is_transport`]).
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use rest_store::{HttpRestClient, RestError, RestResponse};
/// use serde_json::{json, Value};
///
/// struct Fixed;
///
/// #[async_trait]
/// impl HttpRestClient for Fixed {
///     async fn get(&self, _url: &str) -> Result<RestResponse, RestError> {
///         Ok(RestResponse::new(json!({ "id": 1 })))
///     }
///     async fn post(&self, _url: &str, body: &Value) -> Result<Value, RestError> {
///         Ok(body.clone())
///     }
///     async fn patch(&self, _url: &str, body: &Value) -> Result<Value, RestError> {
///         Ok(body.clone())
///     }
///     async fn delete(&self, _url: &str, _body: &Value) -> Result<(), RestError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait HttpRestClient: Send + Sync + 'static {
    /// Fetch the resource at `url`.
    async fn get(&self, url: &str) -> Result<RestResponse, RestError>;

    /// Create a resource; resolves to the created entity.
    async fn post(&self, url: &str, body: &Value) -> Result<Value, RestError>;

    /// Partially update a resource; resolves to the updated entity.
    async fn patch(&self, url: &str, body: &Value) -> Result<Value, RestError>;

    /// Delete the resource identified by `body`.
    async fn delete(&self, url: &str, body: &Value) -> Result<(), RestError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_link_descriptor_wire_shape() {
        let link: LinkDescriptor =
            serde_json::from_value(json!({ "rel": "author", "href": ":author-api:" })).unwrap();
        assert_eq!(link, LinkDescriptor::new("author", ":author-api:"));
    }

    #[test]
    fn test_response_links_default_to_empty() {
        let response: RestResponse = serde_json::from_value(json!({ "data": true })).unwrap();
        assert_eq!(response.data, json!(true));
        assert!(response.links.is_empty());
    }
}
