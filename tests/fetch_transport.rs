use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use rest_store::{FetchTransport, HttpRestClient, RestError, RestStore, StoreContext};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

/// What the server saw for one request.
#[derive(Debug, Clone)]
struct Seen {
    method: Method,
    accept: Option<String>,
    content_type: Option<String>,
    body: String,
}

type Log = Arc<Mutex<Vec<Seen>>>;

async fn echo(
    State(log): State<Log>,
    method: Method,
    headers: HeaderMap,
    body: String,
) -> Json<Value> {
    let value_of = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    log.lock().unwrap().push(Seen {
        method: method.clone(),
        accept: value_of(header::ACCEPT),
        content_type: value_of(header::CONTENT_TYPE),
        body: body.clone(),
    });
    let sent: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
    Json(json!({ "method": method.as_str(), "sent": sent }))
}

async fn spawn_server() -> (SocketAddr, Log) {
    let log: Log = Arc::default();
    let app = Router::new()
        .route("/api/", get(|| async { Json(true) }))
        .route(
            "/api/items",
            get(echo).post(echo).patch(echo).delete(echo),
        )
        .route(
            "/api/missing",
            get(|| async { StatusCode::NOT_FOUND }),
        )
        .route("/api/garbage", get(|| async { "{not json" }))
        .route(
            "/api/posts/1",
            get(|| async {
                Json(json!({
                    "__links": [{ "rel": "author", "href": "/api/authors/1" }],
                    "id": 1,
                    "author": 1
                }))
            }),
        )
        .route(
            "/api/authors/1",
            get(|| async { Json(json!({ "id": 1, "name": "author 1" })) }),
        )
        .with_state(log.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, log)
}

fn transport(addr: SocketAddr) -> FetchTransport {
    FetchTransport::with_base_url(&format!("http://{addr}")).unwrap()
}

#[tokio::test]
async fn test_get_decodes_json() {
    let (addr, _) = spawn_server().await;

    let healthy: bool = transport(addr).get("/api/").await.unwrap();

    assert!(healthy);
}

#[tokio::test]
async fn test_absolute_url_without_base() {
    let (addr, _) = spawn_server().await;

    let healthy: bool = FetchTransport::new()
        .get(&format!("http://{addr}/api/"))
        .await
        .unwrap();

    assert!(healthy);
}

#[tokio::test]
async fn test_post_sends_json_body_and_headers() {
    let (addr, log) = spawn_server().await;

    let answer: Value = transport(addr)
        .post("/api/items", &json!({ "foo": "bar" }))
        .await
        .unwrap();

    assert_eq!(answer, json!({ "method": "POST", "sent": { "foo": "bar" } }));
    let seen = log.lock().unwrap()[0].clone();
    assert_eq!(seen.method, Method::POST);
    assert_eq!(seen.accept.as_deref(), Some("application/json"));
    assert_eq!(seen.content_type.as_deref(), Some("application/json"));
    assert_eq!(seen.body, r#"{"foo":"bar"}"#);
}

#[tokio::test]
async fn test_patch_sends_json_body_and_headers() {
    let (addr, log) = spawn_server().await;

    let answer: Value = transport(addr)
        .patch("/api/items", &json!({ "foo": "bar" }))
        .await
        .unwrap();

    assert_eq!(answer["method"], json!("PATCH"));
    let seen = log.lock().unwrap()[0].clone();
    assert_eq!(seen.method, Method::PATCH);
    assert_eq!(seen.content_type.as_deref(), Some("application/json"));
    assert_eq!(seen.body, r#"{"foo":"bar"}"#);
}

#[tokio::test]
async fn test_delete_sends_json_body_and_discards_answer() {
    let (addr, log) = spawn_server().await;

    transport(addr)
        .delete("/api/items", &json!({ "foo": "bar" }))
        .await
        .unwrap();

    let seen = log.lock().unwrap()[0].clone();
    assert_eq!(seen.method, Method::DELETE);
    assert_eq!(seen.accept.as_deref(), Some("application/json"));
    assert_eq!(seen.content_type.as_deref(), Some("application/json"));
    assert_eq!(seen.body, r#"{"foo":"bar"}"#);
}

#[tokio::test]
async fn test_get_accepts_json_without_body() {
    let (addr, log) = spawn_server().await;

    let _: Value = transport(addr).get("/api/items").await.unwrap();

    let seen = log.lock().unwrap()[0].clone();
    assert_eq!(seen.method, Method::GET);
    assert_eq!(seen.accept.as_deref(), Some("application/json"));
    assert!(seen.body.is_empty());
    assert!(seen.content_type.is_none());
}

#[tokio::test]
async fn test_error_status() {
    let (addr, _) = spawn_server().await;

    let err = transport(addr).get::<Value>("/api/missing").await.unwrap_err();

    assert!(matches!(
        err,
        RestError::Status { method: "GET", status: 404, .. }
    ));
    assert!(err.is_transport());
}

#[tokio::test]
async fn test_undecodable_body() {
    let (addr, _) = spawn_server().await;

    let err = transport(addr).get::<Value>("/api/garbage").await.unwrap_err();

    assert!(matches!(err, RestError::Decode { .. }));
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = transport(addr).get::<Value>("/api/").await.unwrap_err();

    assert!(matches!(err, RestError::Transport { method: "GET", .. }));
}

#[tokio::test]
async fn test_http_rest_client_wraps_body_without_links() {
    let (addr, _) = spawn_server().await;
    let client: &dyn HttpRestClient = &transport(addr);

    let response = client.get("/api/").await.unwrap();

    assert_eq!(response.data, json!(true));
    assert!(response.links.is_empty());
}

#[tokio::test]
async fn test_store_over_http() {
    let (addr, _) = spawn_server().await;
    let ctx = StoreContext::new(Arc::new(transport(addr)));

    let post = RestStore::entity("/api/posts/1", ctx);
    let state = post.settled().await;

    assert_eq!(
        state.response.to_value(),
        json!({ "id": 1, "author": { "id": 1, "name": "author 1" } })
    );
}
