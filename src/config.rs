//! Index configuration.

use serde::Deserialize;

use crate::session::DIRECT_MAP_EVENT_TYPE;

/// Options controlling the direct-message index.
///
/// The embedding client owns configuration files; this struct is handed in
/// at construction. All fields have working defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Account-data event type the direct map is stored under.
    #[serde(default = "default_event_type")]
    pub event_type: String,

    /// Run the self-chat repair pass during index rebuilds.
    #[serde(default = "default_true")]
    pub repair_self_chats: bool,

    /// Push the corrected map back to account data after the first repair.
    #[serde(default = "default_true")]
    pub write_back_repairs: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            event_type: default_event_type(),
            repair_self_chats: true,
            write_back_repairs: true,
        }
    }
}

fn default_event_type() -> String {
    DIRECT_MAP_EVENT_TYPE.to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.event_type, DIRECT_MAP_EVENT_TYPE);
        assert!(config.repair_self_chats);
        assert!(config.write_back_repairs);
    }

    #[test]
    fn test_deserialize_empty_object() {
        let config: IndexConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.event_type, DIRECT_MAP_EVENT_TYPE);
        assert!(config.write_back_repairs);
    }

    #[test]
    fn test_deserialize_overrides() {
        let config: IndexConfig =
            serde_json::from_str(r#"{ "event_type": "x.direct", "repair_self_chats": false }"#)
                .unwrap();
        assert_eq!(config.event_type, "x.direct");
        assert!(!config.repair_self_chats);
        assert!(config.write_back_repairs);
    }
}
