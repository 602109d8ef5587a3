//! Core types for the Atelier workbench gateway.
//!
//! Defines the domain types shared between the worker and gateway crates:
//! session identifiers, session and workbench option records, start paths,
//! and query maps.

#![warn(clippy::pedantic)]
#![deny(clippy::unwrap_used)]

pub mod id;
pub mod options;
pub mod query;

pub use id::SessionId;
pub use options::{SessionOptions, StartPath, UserInfo, WorkbenchOptions};
pub use query::Query;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_display_is_uuid() {
        let id = SessionId::new();
        let s = id.to_string();
        assert_eq!(s.len(), 36, "expected hyphenated UUID, got {s}");
        assert_eq!(s, id.as_uuid().to_string());
    }

    #[test]
    fn session_ids_are_unique_per_call() {
        let a = SessionId::new();
        let b = SessionId::new();
        assert_ne!(a, b, "two generated session ids must differ");
    }

    #[test]
    fn session_id_serializes_as_bare_uuid_string() {
        let id = SessionId::new();
        let json = match serde_json::to_string(&id) {
            Ok(s) => s,
            Err(e) => panic!("serialization failed: {e}"),
        };
        assert_eq!(json, format!("\"{id}\""), "SessionId must serialize transparently");
    }

    #[test]
    fn start_path_round_trips_through_json() {
        let path = StartPath { url: "/tmp/project".to_owned(), workspace: false };
        let json = match serde_json::to_string(&path) {
            Ok(s) => s,
            Err(e) => panic!("serialization failed: {e}"),
        };
        let back: StartPath = match serde_json::from_str(&json) {
            Ok(p) => p,
            Err(e) => panic!("deserialization failed: {e}"),
        };
        assert_eq!(back, path);
    }

    #[test]
    fn workbench_options_fields_default_to_null() {
        let options: WorkbenchOptions = match serde_json::from_str("{}") {
            Ok(o) => o,
            Err(e) => panic!("deserialization failed: {e}"),
        };
        assert!(options.product_configuration.is_null());
        assert!(options.workbench_web_configuration.is_null());
        assert!(options.nls_configuration.is_null());
        assert!(options.remote_user_data_uri.is_null());
    }

    #[test]
    fn user_info_new_accepts_str_and_string() {
        assert_eq!(UserInfo::new("ada").user, "ada");
        assert_eq!(UserInfo::new(String::from("ada")).user, "ada");
    }
}
