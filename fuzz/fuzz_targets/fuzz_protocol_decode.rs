//! Fuzz target: handshake codec line decoder.
//!
//! Worker output is untrusted from the gateway's perspective; a corrupt
//! line must surface as a codec error, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(line) = std::str::from_utf8(data) {
        let _ = atelier_worker::protocol::decode_line(line);
    }
});
