//! # Store Requests
//!
//! Messages a [`RestStore`](crate::RestStore) handle sends to its worker task. The worker is
//! the only writer of the store's state, so anything that changes the published response
//! after the initial fetch goes through this channel.

use crate::body::Resolved;
use crate::error::RestError;
use serde_json::Value;
use tokio::sync::oneshot;

/// Type alias for the one-shot response channel used by store workers.
pub type Response<T> = oneshot::Sender<Result<T, RestError>>;

#[derive(Debug)]
pub enum StoreRequest {
    /// Drop the first collection element whose identifier equals `id`.
    RemoveItem {
        id: Value,
        respond_to: Response<Resolved>,
    },
    /// Reset an entity store's response to an empty body.
    Clear { respond_to: Response<Resolved> },
}
