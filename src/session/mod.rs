//! The client-session trait seam.
//!
//! The index consumes a narrow slice of the client SDK: one account-data
//! record with live updates, per-room membership views, and a best-effort
//! account-data write. Everything behind these traits (transport, sync
//! engine, encryption) belongs to the SDK and is out of scope here.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::SessionError;
use crate::types::{Membership, UserId};

pub mod memory;

/// Account-data event type the direct map is stored under.
pub const DIRECT_MAP_EVENT_TYPE: &str = "slirc.direct";

/// A live account-data update delivered by the session.
#[derive(Clone, Debug)]
pub struct AccountDataEvent {
    /// Event type string identifying the record.
    pub event_type: String,
    /// Raw record content. Consumers treat this as untrusted.
    pub content: Value,
}

/// Read-only view of a single room, as known to the session.
pub trait RoomView: Send + Sync {
    /// The session user's own membership state in this room.
    fn local_membership(&self) -> Membership;

    /// Number of members currently joined or invited.
    fn joined_and_invited_count(&self) -> usize;

    /// The user who invited the session user, when this room is a pending
    /// direct-message invite.
    fn dm_inviter(&self) -> Option<UserId>;

    /// Best-guess "other participant" for this room.
    ///
    /// The heuristic (invite history, member timelines) lives in the
    /// session layer; callers treat it as an opaque oracle.
    fn guess_partner(&self) -> Option<UserId>;
}

/// The slice of a client session consumed by the index.
#[async_trait]
pub trait ClientSession: Send + Sync {
    /// The session's own user id.
    fn user_id(&self) -> UserId;

    /// Current content of a named account-data record, if present.
    fn account_data(&self, event_type: &str) -> Option<Value>;

    /// Look up a room the session knows about.
    fn room(&self, room_id: &str) -> Option<Arc<dyn RoomView>>;

    /// Subscribe to account-data change notifications.
    fn subscribe_account_data(&self) -> broadcast::Receiver<AccountDataEvent>;

    /// Write an account-data record.
    ///
    /// Best effort: the index never awaits this from a query path and
    /// assumes no delivery guarantee.
    async fn set_account_data(&self, event_type: &str, content: Value)
        -> Result<(), SessionError>;
}
