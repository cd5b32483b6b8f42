//! # Observability & Tracing
//!
//! Stores log their whole lifecycle through the `tracing` crate with structured fields, so
//! the path of a relation graph can be followed in the logs:
//!
//! - **Fetch**: `Fetching` when a store issues its GET, `Fetched` with the number of child
//!   stores and the aggregated flag, `Fetch failed` with the error.
//! - **Aggregation**: `Child changed` for every recomputation, `Settled` when the flag clears.
//! - **Resolution**: `Resolving relation` per linked field, and a warning for linked fields
//!   that are not identifiers.
//! - **Mutations**: one span per `post`/`patch`/`delete`, carrying the store URL.
//!
//! ## Usage
//!
//! ```bash
//! # Fetches and settles
//! RUST_LOG=info cargo run -p rest-store-sample
//!
//! # Every relation and child notification
//! RUST_LOG=debug cargo run -p rest-store-sample
//!
//! # Only this crate
//! RUST_LOG=rest_store=debug cargo run -p rest-store-sample
//! ```
//!
//! With `RUST_LOG=info` a post with one author settles like this:
//!
//! ```text
//! INFO Fetching url=/posts/1 kind="entity"
//! INFO Fetching url=/authors/1 kind="entity"
//! INFO Fetched url=/posts/1 kind="entity" children=1 loading=true
//! INFO Fetched url=/authors/1 kind="entity" children=0 loading=false
//! INFO Settled url=/posts/1 kind="entity"
//! ```

/// Installs a compact `fmt` subscriber filtered by `RUST_LOG`.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
