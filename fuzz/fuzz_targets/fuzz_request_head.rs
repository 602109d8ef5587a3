//! Fuzz target: HTTP request-head parser.
//!
//! The accept loop hands attacker-controlled bytes straight to
//! `RequestHead::parse`; it must reject garbage with errors, never panics.

#![no_main]

use atelier_gateway::http::RequestHead;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(head) = RequestHead::parse(data) {
        // Accessors on an accepted head must also be panic-free.
        let _ = head.is_upgrade();
        let _ = head.header("sec-websocket-key");
        let _ = head.query.first("path");
    }
});
