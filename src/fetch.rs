//! # Fetch Transport
//!
//! The production [`HttpRestClient`], built on `reqwest`. It can also be used directly as a
//! small typed JSON client:
//!
//! ```rust,no_run
//! use rest_store::FetchTransport;
//!
//! # async fn run() -> Result<(), rest_store::RestError> {
//! let transport = FetchTransport::with_base_url("http://localhost:8080")?;
//! let healthy: bool = transport.get("/api/").await?;
//! # Ok(())
//! # }
//! ```
//!
//! Every request sends `Accept: application/json`. Requests with a body also send
//! `Content-Type: application/json`, with the body JSON-encoded. Non-success statuses are
//! reported as [`RestError::Status`].

use crate::client::{HttpRestClient, RestResponse};
use crate::error::RestError;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

const APPLICATION_JSON: &str = "application/json";

/// HTTP transport speaking JSON.
#[derive(Debug, Clone, Default)]
pub struct FetchTransport {
    client: reqwest::Client,
    base_url: Option<Url>,
}

impl FetchTransport {
    /// A transport for absolute URLs.
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport that joins relative paths such as `/api/` onto `base_url`.
    pub fn with_base_url(base_url: &str) -> Result<Self, RestError> {
        let base_url = Url::parse(base_url).map_err(|e| RestError::InvalidUrl {
            url: base_url.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: Some(base_url),
        })
    }

    /// Replaces the underlying `reqwest` client (timeouts, proxies, TLS).
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    fn url(&self, url: &str) -> Result<Url, RestError> {
        let parsed = match &self.base_url {
            Some(base) => base.join(url),
            None => Url::parse(url),
        };
        parsed.map_err(|e| RestError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    /// GETs `url` and decodes the JSON body.
    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, RestError> {
        let text = self.send(Method::GET, url, None).await?;
        decode(url, &text)
    }

    /// POSTs `body` and decodes the JSON response.
    pub async fn post<T, B>(&self, url: &str, body: &B) -> Result<T, RestError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let text = self
            .send(Method::POST, url, Some(encode(url, body)?))
            .await?;
        decode(url, &text)
    }

    /// PATCHes `body` and decodes the JSON response.
    pub async fn patch<T, B>(&self, url: &str, body: &B) -> Result<T, RestError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let text = self
            .send(Method::PATCH, url, Some(encode(url, body)?))
            .await?;
        decode(url, &text)
    }

    /// DELETEs with `body`. Whatever the server answers with is discarded.
    pub async fn delete<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<(), RestError> {
        self.send(Method::DELETE, url, Some(encode(url, body)?))
            .await
            .map(|_| ())
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<Vec<u8>>,
    ) -> Result<String, RestError> {
        let verb = method_name(&method);
        let target = self.url(url)?;
        debug!(method = verb, url = %target, "Sending request");

        let mut request = self
            .client
            .request(method, target)
            .header(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON))
                .body(body);
        }

        let response = request.send().await.map_err(|e| RestError::Transport {
            method: verb,
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(method = verb, url, status = status.as_u16(), "Request failed");
            return Err(RestError::Status {
                method: verb,
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| RestError::Transport {
            method: verb,
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl HttpRestClient for FetchTransport {
    async fn get(&self, url: &str) -> Result<RestResponse, RestError> {
        FetchTransport::get::<Value>(self, url)
            .await
            .map(RestResponse::new)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, RestError> {
        FetchTransport::post::<Value, Value>(self, url, body).await
    }

    async fn patch(&self, url: &str, body: &Value) -> Result<Value, RestError> {
        FetchTransport::patch::<Value, Value>(self, url, body).await
    }

    async fn delete(&self, url: &str, body: &Value) -> Result<(), RestError> {
        FetchTransport::delete::<Value>(self, url, body).await
    }
}

fn method_name(method: &Method) -> &'static str {
    [
        (Method::GET, "GET"),
        (Method::POST, "POST"),
        (Method::PATCH, "PATCH"),
        (Method::DELETE, "DELETE"),
    ]
    .into_iter()
    .find_map(|(known, name)| (known == *method).then_some(name))
    .unwrap_or("HTTP")
}

fn encode<B: Serialize + ?Sized>(url: &str, body: &B) -> Result<Vec<u8>, RestError> {
    serde_json::to_vec(body).map_err(|e| RestError::InvalidPayload(format!("{url}: {e}")))
}

fn decode<T: DeserializeOwned>(url: &str, text: &str) -> Result<T, RestError> {
    serde_json::from_str(text).map_err(|e| RestError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}
