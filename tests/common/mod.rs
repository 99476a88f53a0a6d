//! Integration test common infrastructure.
//!
//! Provides a call-counting session wrapper and payload builders for
//! asserting on index rebuild and write-back behavior.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::broadcast;

use slirc_dm::{
    AccountDataEvent, ClientSession, MemorySession, RoomView, SessionError, UserId,
};

/// Session wrapper that counts accessor calls.
///
/// Delegates everything to an inner [`MemorySession`] while recording how
/// often the index consulted each seam, so tests can prove an index was
/// (or was not) rebuilt.
pub struct ProbeSession {
    pub inner: Arc<MemorySession>,
    pub user_id_calls: AtomicUsize,
    pub room_calls: AtomicUsize,
    pub writes: AtomicUsize,
}

impl ProbeSession {
    pub fn new(inner: Arc<MemorySession>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            user_id_calls: AtomicUsize::new(0),
            room_calls: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ClientSession for ProbeSession {
    fn user_id(&self) -> UserId {
        self.user_id_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.user_id()
    }

    fn account_data(&self, event_type: &str) -> Option<Value> {
        self.inner.account_data(event_type)
    }

    fn room(&self, room_id: &str) -> Option<Arc<dyn RoomView>> {
        self.room_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.room(room_id)
    }

    fn subscribe_account_data(&self) -> broadcast::Receiver<AccountDataEvent> {
        self.inner.subscribe_account_data()
    }

    async fn set_account_data(
        &self,
        event_type: &str,
        content: Value,
    ) -> Result<(), SessionError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_account_data(event_type, content).await
    }
}

/// Build a direct-map payload from literal entries.
pub fn direct_map(entries: &[(&str, &[&str])]) -> Value {
    let mut object = serde_json::Map::new();
    for (user_id, rooms) in entries {
        object.insert((*user_id).to_owned(), json!(rooms));
    }
    Value::Object(object)
}

/// Poll until `predicate` holds, panicking after two seconds.
pub async fn wait_until<F: Fn() -> bool>(predicate: F, what: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !predicate() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
