//! # slirc-dm
//!
//! Client-side direct-conversation index for Straylight chat clients.
//!
//! A chat account carries a single "direct map" record listing, per user,
//! the rooms that are direct conversations with that user. The record is
//! owned by the server and synced by the client SDK. This crate maintains
//! a bidirectional in-memory view over it so that both "rooms for user"
//! and "user for room" lookups are cheap, follows live updates to the
//! record, and repairs a known corruption pattern where direct rooms end
//! up filed under the account owner's own id.
//!
//! The client SDK is consumed through the [`ClientSession`] trait seam;
//! transport, sync, and encryption stay on the SDK's side of that line.
//!
//! ## Quick start
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use slirc_dm::{DmIndex, MemorySession, DIRECT_MAP_EVENT_TYPE};
//!
//! let session = Arc::new(MemorySession::new("alice"));
//! session.put_account_data(DIRECT_MAP_EVENT_TYPE, json!({ "bob": ["r-1"] }));
//!
//! let index = DmIndex::new(session);
//! assert_eq!(index.rooms_for_user("bob"), vec!["r-1".to_string()]);
//! assert_eq!(index.user_for_room("r-1"), Some("bob".to_string()));
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod index;
pub mod session;
pub mod types;

pub use self::config::IndexConfig;
pub use self::error::SessionError;
pub use self::index::{DmIndex, DmTarget};
pub use self::session::memory::{MemoryRoom, MemorySession};
pub use self::session::{AccountDataEvent, ClientSession, RoomView, DIRECT_MAP_EVENT_TYPE};
pub use self::types::{DirectMap, Membership, RoomId, UserId};
