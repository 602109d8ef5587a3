//! Handshake codec: the typed messages exchanged with the worker over IPC.
//!
//! Messages travel as single JSON lines tagged by a `type` field. The
//! `socket` message is special: it is paired out-of-band with a transferred
//! file descriptor carrying the upgraded connection.

use atelier_core::{Query, SessionId, SessionOptions, WorkbenchOptions};
use serde::{Deserialize, Serialize};

use crate::WorkerError;

/// Messages sent from the gateway to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayMessage {
    /// Begin a logical workbench session. `id` correlates the eventual
    /// `options` reply.
    Init {
        id: SessionId,
        options: SessionOptions,
    },
    /// Routing metadata for a socket transferred alongside this message.
    Socket { query: Query },
}

/// Messages received from the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerMessage {
    /// One-time signal that a freshly started worker accepts messages.
    Ready,
    /// Reply to `init`, echoing the request id. Consumers ignore replies
    /// whose id matches no outstanding request of theirs, because sessions race
    /// concurrently and share one channel.
    Options {
        id: SessionId,
        options: WorkbenchOptions,
    },
}

/// Encodes a message as one newline-terminated JSON line.
///
/// # Errors
/// Returns [`WorkerError::Codec`] if serialization fails.
pub fn encode_line<T: Serialize>(message: &T) -> Result<Vec<u8>, WorkerError> {
    let mut line = serde_json::to_vec(message).map_err(|e| WorkerError::Codec(e.to_string()))?;
    line.push(b'\n');
    Ok(line)
}

/// Decodes one line into a worker message.
///
/// # Errors
/// Returns [`WorkerError::Codec`] on malformed input; never panics.
pub fn decode_line(line: &str) -> Result<WorkerMessage, WorkerError> {
    serde_json::from_str(line).map_err(|e| WorkerError::Codec(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_decodes_from_bare_type_tag() {
        let message = match decode_line(r#"{"type":"ready"}"#) {
            Ok(m) => m,
            Err(e) => panic!("decode failed: {e}"),
        };
        assert_eq!(message, WorkerMessage::Ready);
    }

    #[test]
    fn options_reply_round_trips_with_id() {
        let id = SessionId::new();
        let reply = WorkerMessage::Options { id, options: WorkbenchOptions::default() };
        let line = match encode_line(&reply) {
            Ok(l) => l,
            Err(e) => panic!("encode failed: {e}"),
        };
        assert_eq!(*line.last().expect("line is non-empty"), b'\n');
        let text = std::str::from_utf8(&line[..line.len() - 1]).expect("line is UTF-8");
        assert!(text.contains(r#""type":"options""#), "missing type tag: {text}");
        let back = match decode_line(text) {
            Ok(m) => m,
            Err(e) => panic!("decode failed: {e}"),
        };
        assert_eq!(back, reply);
    }

    #[test]
    fn init_encodes_type_id_and_options() {
        let id = SessionId::new();
        let message = GatewayMessage::Init {
            id,
            options: SessionOptions { remote_authority: "localhost:8080".to_owned(), ..Default::default() },
        };
        let line = match encode_line(&message) {
            Ok(l) => l,
            Err(e) => panic!("encode failed: {e}"),
        };
        let text = String::from_utf8(line).expect("line is UTF-8");
        assert!(text.contains(r#""type":"init""#), "missing type tag: {text}");
        assert!(text.contains(&id.to_string()), "missing correlation id: {text}");
        assert!(text.contains("localhost:8080"), "missing options payload: {text}");
    }

    #[test]
    fn socket_message_carries_the_query_map() {
        let mut query = Query::new();
        query.insert("reconnection_token", "abc");
        let line = match encode_line(&GatewayMessage::Socket { query }) {
            Ok(l) => l,
            Err(e) => panic!("encode failed: {e}"),
        };
        let text = String::from_utf8(line).expect("line is UTF-8");
        assert!(text.contains(r#""type":"socket""#), "missing type tag: {text}");
        assert!(text.contains("reconnection_token"), "missing query: {text}");
    }

    #[test]
    fn unknown_type_is_a_codec_error_not_a_panic() {
        let result = decode_line(r#"{"type":"telemetry"}"#);
        assert!(matches!(result, Err(WorkerError::Codec(_))), "got: {result:?}");
    }

    #[test]
    fn malformed_json_is_a_codec_error() {
        let result = decode_line("{nope");
        assert!(matches!(result, Err(WorkerError::Codec(_))), "got: {result:?}");
    }

    proptest::proptest! {
        #[test]
        fn proptest_decode_never_panics(line in ".{0,512}") {
            let _ = decode_line(&line);
        }
    }
}
