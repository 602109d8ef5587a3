//! Fuzz target: query-string parser.
//!
//! Query strings come straight off the wire and feed both routing and the
//! socket handoff message; parsing must never panic.

#![no_main]

use atelier_core::Query;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(raw) = std::str::from_utf8(data) {
        let query = Query::parse(raw);
        let _ = query.first("path");
        let _ = query.is_empty();
    }
});
