//! Identifier and record types for the direct-conversation index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Unique user identifier.
pub type UserId = String;

/// Unique room identifier.
pub type RoomId = String;

/// Local membership state for a user in a room.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Membership {
    /// Active participant.
    Join,
    /// Invited but not yet joined.
    Invite,
    /// Left the room.
    Leave,
    /// Removed and barred from rejoining.
    Ban,
    /// No known relationship with the room.
    #[default]
    None,
}

impl Membership {
    /// Get the string representation of this membership state.
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Invite => "invite",
            Self::Leave => "leave",
            Self::Ban => "ban",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for Membership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The per-account direct-conversation record.
///
/// Maps each user id to the rooms that are direct conversations with that
/// user, in record order. The record is owned by the server and synced by
/// the client; this type is the index's private mutable copy of it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectMap(BTreeMap<UserId, Vec<RoomId>>);

impl DirectMap {
    /// Decode an account-data payload.
    ///
    /// The payload is untrusted: a non-object payload decodes to an empty
    /// map, and values that are not arrays of strings are dropped entry by
    /// entry. Never fails.
    pub fn from_payload(content: &Value) -> Self {
        let mut map = BTreeMap::new();
        if let Some(object) = content.as_object() {
            for (user_id, rooms) in object {
                let Some(entries) = rooms.as_array() else {
                    continue;
                };
                let rooms = entries
                    .iter()
                    .filter_map(|entry| entry.as_str().map(str::to_owned))
                    .collect();
                map.insert(user_id.clone(), rooms);
            }
        }
        Self(map)
    }

    /// Encode the map as an account-data payload.
    pub fn to_payload(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(user_id, rooms)| {
                    let rooms = rooms.iter().cloned().map(Value::String).collect();
                    (user_id.clone(), Value::Array(rooms))
                })
                .collect(),
        )
    }

    /// Rooms listed for a user, if any.
    pub fn rooms_of(&self, user_id: &str) -> Option<&[RoomId]> {
        self.0.get(user_id).map(Vec::as_slice)
    }

    /// Replace the room list for a user.
    pub fn insert(&mut self, user_id: UserId, rooms: Vec<RoomId>) {
        self.0.insert(user_id, rooms);
    }

    /// Append a room to a user's list, creating the list if absent.
    /// Rooms already listed are not duplicated.
    pub fn push_room(&mut self, user_id: &str, room_id: RoomId) {
        let rooms = self.0.entry(user_id.to_owned()).or_default();
        if !rooms.contains(&room_id) {
            rooms.push(room_id);
        }
    }

    /// Iterate over all entries in user-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&UserId, &Vec<RoomId>)> {
        self.0.iter()
    }

    /// Number of users with an entry.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map has no entries at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(UserId, Vec<RoomId>)> for DirectMap {
    fn from_iter<I: IntoIterator<Item = (UserId, Vec<RoomId>)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_membership_display() {
        assert_eq!(Membership::Join.to_string(), "join");
        assert_eq!(Membership::Invite.as_str(), "invite");
        assert_eq!(Membership::default(), Membership::None);
    }

    #[test]
    fn test_decode_well_formed_payload() {
        let map = DirectMap::from_payload(&json!({
            "alice": ["r-1", "r-2"],
            "bob": ["r-3"],
        }));
        assert_eq!(map.rooms_of("alice"), Some(&["r-1".to_string(), "r-2".to_string()][..]));
        assert_eq!(map.rooms_of("bob"), Some(&["r-3".to_string()][..]));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_decode_non_object_payload() {
        assert!(DirectMap::from_payload(&json!("garbage")).is_empty());
        assert!(DirectMap::from_payload(&json!(42)).is_empty());
        assert!(DirectMap::from_payload(&Value::Null).is_empty());
    }

    #[test]
    fn test_decode_drops_malformed_entries() {
        let map = DirectMap::from_payload(&json!({
            "alice": ["r-1", 7, {"nested": true}, "r-2"],
            "bob": "not-an-array",
        }));
        // Non-string room entries are skipped, non-array values dropped whole.
        assert_eq!(map.rooms_of("alice"), Some(&["r-1".to_string(), "r-2".to_string()][..]));
        assert_eq!(map.rooms_of("bob"), None);
    }

    #[test]
    fn test_payload_encode() {
        let map: DirectMap = [("alice".to_string(), vec!["r-1".to_string()])]
            .into_iter()
            .collect();
        assert_eq!(map.to_payload(), json!({ "alice": ["r-1"] }));
    }

    #[test]
    fn test_push_room_dedup() {
        let mut map = DirectMap::default();
        map.push_room("alice", "r-1".to_string());
        map.push_room("alice", "r-1".to_string());
        map.push_room("alice", "r-2".to_string());
        assert_eq!(map.rooms_of("alice"), Some(&["r-1".to_string(), "r-2".to_string()][..]));
    }
}
