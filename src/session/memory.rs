//! In-memory client session.
//!
//! `MemorySession` implements the full session seam without a network
//! stack. Integration tests script it directly; embedders can use it to
//! drive the index from state they already hold.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::SessionError;
use crate::session::{AccountDataEvent, ClientSession, RoomView};
use crate::types::{Membership, RoomId, UserId};

/// Capacity of the account-data broadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// An in-memory room with scriptable membership and heuristics.
#[derive(Debug)]
pub struct MemoryRoom {
    /// Room identifier.
    pub id: RoomId,
    /// Creation time (Unix timestamp).
    pub created: i64,
    session_user: UserId,
    members: RwLock<HashMap<UserId, Membership>>,
    inviter: RwLock<Option<UserId>>,
    partner_guess: RwLock<Option<UserId>>,
}

impl MemoryRoom {
    fn new(id: RoomId, session_user: UserId) -> Self {
        Self {
            id,
            created: chrono::Utc::now().timestamp(),
            session_user,
            members: RwLock::new(HashMap::new()),
            inviter: RwLock::new(None),
            partner_guess: RwLock::new(None),
        }
    }

    /// Set a member's membership state.
    pub fn set_membership(&self, user_id: impl Into<UserId>, membership: Membership) {
        self.members.write().insert(user_id.into(), membership);
    }

    /// Record who invited the session user to this room.
    pub fn set_inviter(&self, user_id: impl Into<UserId>) {
        *self.inviter.write() = Some(user_id.into());
    }

    /// Script the "other participant" heuristic for this room.
    pub fn set_partner_guess(&self, user_id: impl Into<UserId>) {
        *self.partner_guess.write() = Some(user_id.into());
    }

    /// Membership state for one user.
    pub fn membership(&self, user_id: &str) -> Membership {
        self.members.read().get(user_id).copied().unwrap_or_default()
    }
}

impl RoomView for MemoryRoom {
    fn local_membership(&self) -> Membership {
        self.membership(&self.session_user)
    }

    fn joined_and_invited_count(&self) -> usize {
        self.members
            .read()
            .values()
            .filter(|m| matches!(m, Membership::Join | Membership::Invite))
            .count()
    }

    fn dm_inviter(&self) -> Option<UserId> {
        self.inviter.read().clone()
    }

    fn guess_partner(&self) -> Option<UserId> {
        self.partner_guess.read().clone()
    }
}

/// An in-process client session backed by plain collections.
pub struct MemorySession {
    user_id: UserId,
    rooms: DashMap<RoomId, Arc<MemoryRoom>>,
    account_data: RwLock<HashMap<String, Value>>,
    events: broadcast::Sender<AccountDataEvent>,
}

impl MemorySession {
    /// Create a session for the given user.
    pub fn new(user_id: impl Into<UserId>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            user_id: user_id.into(),
            rooms: DashMap::new(),
            account_data: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Add a room and return its handle for scripting.
    pub fn add_room(&self, room_id: impl Into<RoomId>) -> Arc<MemoryRoom> {
        let room_id = room_id.into();
        let room = Arc::new(MemoryRoom::new(room_id.clone(), self.user_id.clone()));
        self.rooms.insert(room_id, Arc::clone(&room));
        room
    }

    /// Store an account-data record and notify subscribers.
    pub fn put_account_data(&self, event_type: impl Into<String>, content: Value) {
        let event_type = event_type.into();
        self.account_data
            .write()
            .insert(event_type.clone(), content.clone());
        // No subscribers yet is fine; the record is still stored.
        let _ = self.events.send(AccountDataEvent {
            event_type,
            content,
        });
    }
}

#[async_trait]
impl ClientSession for MemorySession {
    fn user_id(&self) -> UserId {
        self.user_id.clone()
    }

    fn account_data(&self, event_type: &str) -> Option<Value> {
        self.account_data.read().get(event_type).cloned()
    }

    fn room(&self, room_id: &str) -> Option<Arc<dyn RoomView>> {
        self.rooms
            .get(room_id)
            .map(|room| Arc::clone(room.value()) as Arc<dyn RoomView>)
    }

    fn subscribe_account_data(&self) -> broadcast::Receiver<AccountDataEvent> {
        self.events.subscribe()
    }

    async fn set_account_data(
        &self,
        event_type: &str,
        content: Value,
    ) -> Result<(), SessionError> {
        self.put_account_data(event_type.to_owned(), content);
        Ok(())
    }
}
