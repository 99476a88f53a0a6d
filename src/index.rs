//! The direct-message index.
//!
//! Maintains a bidirectional view over the account-level direct map so that
//! "rooms for user" and "user for room" lookups are both cheap, follows
//! live updates to the record, and opportunistically repairs rooms the
//! record mis-files under the session user's own id.
//!
//! Derived state is rebuilt lazily: change notifications only drop the
//! caches, and the next query pays the rebuild. Callers that never ask for
//! the room-side index never pay the inversion cost.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::IndexConfig;
use crate::session::ClientSession;
use crate::types::{DirectMap, Membership, RoomId, UserId};

/// A lookup target for common-room queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DmTarget {
    /// A user id, resolvable against the direct map.
    User(UserId),
    /// A third-party address (e.g. email). Not resolvable against the
    /// direct map; always contributes an empty room list.
    ThirdParty(String),
}

/// Index state behind one lock: the record copy and the lazy caches.
#[derive(Default)]
struct Inner {
    /// Private copy of the account-level record.
    map: DirectMap,
    /// room id -> user id, inverted from the repaired map. `None` until
    /// first use or after invalidation.
    room_to_user: Option<HashMap<RoomId, UserId>>,
    /// user id -> rooms, the record after the self-chat repair pass.
    user_to_rooms: Option<BTreeMap<UserId, Vec<RoomId>>>,
    /// Whether this process already pushed a corrected map upstream.
    sent_repair_patch: bool,
}

/// Bidirectional index over the direct-conversation map.
///
/// One index is bound to one client session. Callers share it as
/// `Arc<DmIndex>`; tests inject fake sessions through the
/// [`ClientSession`] seam.
pub struct DmIndex {
    session: Arc<dyn ClientSession>,
    config: IndexConfig,
    inner: Arc<RwLock<Inner>>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl DmIndex {
    /// Create an index bound to a session with default options.
    ///
    /// Reads the current direct map from the session's account data;
    /// an absent or malformed record is treated as empty.
    pub fn new(session: Arc<dyn ClientSession>) -> Self {
        Self::with_config(session, IndexConfig::default())
    }

    /// Create an index with explicit options.
    pub fn with_config(session: Arc<dyn ClientSession>, config: IndexConfig) -> Self {
        let map = session
            .account_data(&config.event_type)
            .map(|content| DirectMap::from_payload(&content))
            .unwrap_or_default();
        Self {
            session,
            config,
            inner: Arc::new(RwLock::new(Inner {
                map,
                ..Inner::default()
            })),
            listener: Mutex::new(None),
        }
    }

    /// Begin following live account-data updates.
    ///
    /// The room-side index is rebuilt immediately; afterwards a detached
    /// task applies matching account-data events as they arrive. Calling
    /// `start` again replaces the previous subscription.
    pub fn start(&self) {
        {
            let mut inner = self.inner.write();
            self.ensure_room_to_user(&mut inner);
        }

        let mut rx = self.session.subscribe_account_data();
        let session = Arc::clone(&self.session);
        let event_type = self.config.event_type.clone();
        let shared = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) if event.event_type == event_type => {
                        Self::apply_update(&shared, &event.content);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "account data stream lagged, resyncing from session");
                        if let Some(content) = session.account_data(&event_type) {
                            Self::apply_update(&shared, &content);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        if let Some(old) = self.listener.lock().replace(handle) {
            old.abort();
        }
    }

    /// Stop following updates.
    ///
    /// Only future notifications are suppressed; an event already
    /// delivered before the unsubscribe still applies.
    pub fn stop(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.abort();
        }
    }

    /// Replace the stored map with a fresh copy and drop derived state.
    fn apply_update(shared: &RwLock<Inner>, content: &Value) {
        let map = DirectMap::from_payload(content);
        let mut inner = shared.write();
        inner.map = map;
        inner.room_to_user = None;
        inner.user_to_rooms = None;
        debug!(users = inner.map.len(), "direct map updated, derived indexes dropped");
    }

    /// Rooms shared with the given user, in record order.
    ///
    /// Returns an empty list for users with no shared history; never fails.
    pub fn rooms_for_user(&self, user_id: &str) -> Vec<RoomId> {
        {
            let inner = self.inner.read();
            if let Some(user_to_rooms) = &inner.user_to_rooms {
                return user_to_rooms.get(user_id).cloned().unwrap_or_default();
            }
        }
        let mut inner = self.inner.write();
        self.ensure_user_to_rooms(&mut inner);
        inner
            .user_to_rooms
            .as_ref()
            .and_then(|m| m.get(user_id))
            .cloned()
            .unwrap_or_default()
    }

    /// The direct-message partner recorded for a room.
    ///
    /// Falls back to the room's invite hint, which covers pending invites
    /// the map has not caught up with yet.
    pub fn user_for_room(&self, room_id: &str) -> Option<UserId> {
        let mapped = {
            let inner = self.inner.read();
            inner
                .room_to_user
                .as_ref()
                .map(|room_to_user| room_to_user.get(room_id).cloned())
        };
        let mapped = match mapped {
            Some(mapped) => mapped,
            None => {
                let mut inner = self.inner.write();
                self.ensure_room_to_user(&mut inner);
                inner
                    .room_to_user
                    .as_ref()
                    .and_then(|m| m.get(room_id))
                    .cloned()
            }
        };
        match mapped {
            Some(user_id) => Some(user_id),
            None => self
                .session
                .room(room_id)
                .and_then(|room| room.dm_inviter()),
        }
    }

    /// The first room every target shares and the session has joined.
    ///
    /// Third-party targets (email invites) cannot appear in the direct map
    /// and make the lookup fall through to `None`.
    pub fn direct_room_for_targets(&self, targets: &[DmTarget]) -> Option<RoomId> {
        let mut candidates: Option<Vec<RoomId>> = None;
        for target in targets {
            let rooms = match target {
                DmTarget::User(user_id) => self.rooms_for_user(user_id),
                DmTarget::ThirdParty(_) => Vec::new(),
            };
            candidates = Some(match candidates {
                None => rooms,
                Some(existing) => existing
                    .into_iter()
                    .filter(|room_id| rooms.contains(room_id))
                    .collect(),
            });
        }
        candidates?.into_iter().find(|room_id| {
            self.session
                .room(room_id)
                .is_some_and(|room| room.local_membership() == Membership::Join)
        })
    }

    /// Map of partner -> room for rooms that are still true 1:1 chats.
    ///
    /// Rooms that have grown into group conversations are excluded. When
    /// the room-side index has never been built this returns empty without
    /// forcing a build.
    pub fn unique_rooms_by_partner(&self) -> HashMap<UserId, RoomId> {
        let inner = self.inner.read();
        let Some(room_to_user) = &inner.room_to_user else {
            return HashMap::new();
        };
        room_to_user
            .iter()
            .filter(|(room_id, _)| {
                self.session
                    .room(room_id)
                    .is_some_and(|room| room.joined_and_invited_count() == 2)
            })
            .map(|(room_id, user_id)| (user_id.clone(), room_id.clone()))
            .collect()
    }

    /// Every room id referenced anywhere in the raw map, de-duplicated.
    ///
    /// Works off the stored record directly; does not build the indexes.
    pub fn referenced_room_ids(&self) -> HashSet<RoomId> {
        let inner = self.inner.read();
        inner
            .map
            .iter()
            .flat_map(|(_, rooms)| rooms.iter().cloned())
            .collect()
    }

    /// Build the repaired forward index if it is not already built.
    fn ensure_user_to_rooms(&self, inner: &mut Inner) {
        if inner.user_to_rooms.is_some() {
            return;
        }
        if self.config.repair_self_chats {
            self.repair_self_chats(inner);
        }
        inner.user_to_rooms = Some(
            inner
                .map
                .iter()
                .map(|(user_id, rooms)| (user_id.clone(), rooms.clone()))
                .collect(),
        );
    }

    /// Build the inverted index if it is not already built.
    ///
    /// Inverts the repaired forward index, so building the room side also
    /// builds (and repairs) the user side. Last writer wins when the
    /// record lists one room under several users.
    fn ensure_room_to_user(&self, inner: &mut Inner) {
        if inner.room_to_user.is_some() {
            return;
        }
        self.ensure_user_to_rooms(inner);
        let mut inverted = HashMap::new();
        if let Some(user_to_rooms) = &inner.user_to_rooms {
            for (user_id, rooms) in user_to_rooms {
                for room_id in rooms {
                    inverted.insert(room_id.clone(), user_id.clone());
                }
            }
        }
        inner.room_to_user = Some(inverted);
    }

    /// Reassign rooms the record lists under the session user's own id.
    ///
    /// Historical client bugs filed some direct rooms against the account
    /// owner instead of the counterpart. The session's partner heuristic
    /// decides where each such room belongs; rooms with no better owner
    /// stay put. The corrected record is pushed upstream once per process,
    /// best effort.
    fn repair_self_chats(&self, inner: &mut Inner) {
        let me = self.session.user_id();
        let self_rooms = match inner.map.rooms_of(&me) {
            Some(rooms) if !rooms.is_empty() => rooms.to_vec(),
            _ => return,
        };

        let mut reassigned: Vec<(UserId, RoomId)> = Vec::new();
        for room_id in &self_rooms {
            let Some(room) = self.session.room(room_id) else {
                continue;
            };
            match room.guess_partner() {
                Some(partner) if partner != me => reassigned.push((partner, room_id.clone())),
                _ => {}
            }
        }

        if reassigned.is_empty() {
            // All of them are legitimate notes-to-self.
            debug!(
                rooms = self_rooms.len(),
                "self-filed rooms have no better owner, leaving map untouched"
            );
            return;
        }

        let kept: Vec<RoomId> = self_rooms
            .iter()
            .filter(|room_id| !reassigned.iter().any(|(_, moved)| moved == *room_id))
            .cloned()
            .collect();
        inner.map.insert(me.clone(), kept);
        for (partner, room_id) in &reassigned {
            inner.map.push_room(partner, room_id.clone());
        }

        warn!(
            moved = reassigned.len(),
            "direct map listed rooms under the account owner's own id, reassigned to partners"
        );

        if self.config.write_back_repairs && !inner.sent_repair_patch {
            inner.sent_repair_patch = true;
            self.spawn_write_back(inner.map.clone());
        }
    }

    /// Push the corrected map upstream as a detached task.
    ///
    /// The result is logged and discarded: queries never wait on this and
    /// failures are not retried this process lifetime.
    fn spawn_write_back(&self, map: DirectMap) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("no async runtime, corrected direct map not written back");
            return;
        };
        let session = Arc::clone(&self.session);
        let event_type = self.config.event_type.clone();
        runtime.spawn(async move {
            match session.set_account_data(&event_type, map.to_payload()).await {
                Ok(()) => debug!("corrected direct map written back"),
                Err(err) => warn!(
                    code = err.error_code(),
                    error = %err,
                    "corrected direct map write-back failed"
                ),
            }
        });
    }
}

impl Drop for DmIndex {
    fn drop(&mut self) {
        self.stop();
    }
}
