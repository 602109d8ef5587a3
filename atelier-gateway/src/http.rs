//! Minimal HTTP/1.1 request-head handling for the accept loop.
//!
//! The accept loop only needs enough of the request to route it: the
//! request line, the headers, and the query string. Everything else is
//! left to the full HTTP stack (for plain requests) or to the worker (for
//! upgraded sockets). Crucially, the head is located via `peek`, so no
//! byte beyond it is ever consumed here.

use std::io;

use tokio::net::TcpStream;

use atelier_core::Query;

use crate::error::GatewayError;

/// Upper bound on the request head; anything larger is rejected.
pub const MAX_HEAD_BYTES: usize = 16 * 1024;

/// Parsed HTTP/1.1 request head.
#[derive(Debug, Clone)]
pub struct RequestHead {
    /// Request method, uppercased as received.
    pub method: String,
    /// Path component of the request target.
    pub path: String,
    /// Decoded query parameters.
    pub query: Query,
    headers: Vec<(String, String)>,
}

impl RequestHead {
    /// Parse a complete request head (bytes up to and including the blank
    /// line).
    ///
    /// # Errors
    /// Returns [`GatewayError::InvalidRequest`] on anything that is not a
    /// well-formed HTTP/1.x head.
    pub fn parse(raw: &[u8]) -> Result<Self, GatewayError> {
        let text = std::str::from_utf8(raw)
            .map_err(|_| GatewayError::InvalidRequest("request head is not UTF-8".to_owned()))?;
        let mut lines = text.split("\r\n");

        let request_line = lines
            .next()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| GatewayError::InvalidRequest("empty request head".to_owned()))?;
        let mut parts = request_line.split(' ');
        let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(target), Some(version), None) => (method, target, version),
            _ => {
                return Err(GatewayError::InvalidRequest(format!(
                    "malformed request line: {request_line}"
                )))
            }
        };
        if !version.starts_with("HTTP/1.") {
            return Err(GatewayError::InvalidRequest(format!(
                "unsupported protocol version: {version}"
            )));
        }

        let (path, raw_query) = match target.split_once('?') {
            Some((path, query)) => (path, query),
            None => (target, ""),
        };

        let mut headers = Vec::new();
        for line in lines {
            if line.is_empty() {
                continue;
            }
            let (name, value) = line.split_once(':').ok_or_else(|| {
                GatewayError::InvalidRequest(format!("malformed header line: {line}"))
            })?;
            headers.push((name.trim().to_ascii_lowercase(), value.trim().to_owned()));
        }

        Ok(Self {
            method: method.to_owned(),
            path: path.to_owned(),
            query: Query::parse(raw_query),
            headers,
        })
    }

    /// First value of `name` (case-insensitive), if present.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    /// `true` when the request asks for a WebSocket upgrade.
    #[must_use]
    pub fn is_upgrade(&self) -> bool {
        let connection_upgrades = self
            .header("connection")
            .is_some_and(|v| v.split(',').any(|t| t.trim().eq_ignore_ascii_case("upgrade")));
        let upgrade_websocket = self
            .header("upgrade")
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"));
        connection_upgrades && upgrade_websocket
    }
}

/// Locate the request head on `stream` without consuming it.
///
/// Returns the head's byte length and a copy of its bytes, or `None` when
/// the peer closed before sending a complete head. The bytes themselves
/// remain unread on the socket.
///
/// # Errors
/// Returns an error when the head exceeds [`MAX_HEAD_BYTES`] or the socket
/// fails.
pub async fn peek_request_head(stream: &TcpStream) -> Result<Option<(usize, Vec<u8>)>, io::Error> {
    let mut buf = vec![0u8; MAX_HEAD_BYTES];
    let mut seen = 0usize;
    loop {
        let n = stream.peek(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        if let Some(end) = head_end(&buf[..n]) {
            buf.truncate(end);
            return Ok(Some((end, buf)));
        }
        if n >= MAX_HEAD_BYTES {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "request head exceeds limit",
            ));
        }
        if n == seen {
            // Readiness fires instantly while partial data sits in the
            // kernel buffer; back off briefly until more arrives.
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        seen = n;
    }
}

/// Index one past the `\r\n\r\n` terminator, if present.
fn head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}
