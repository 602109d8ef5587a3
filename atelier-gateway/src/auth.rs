//! Authentication seam for the gateway.
//!
//! The gateway only needs a yes/no answer plus the user's identity; how
//! credentials are issued (the login flow) lives elsewhere.

use atelier_core::UserInfo;

/// Name of the session cookie carrying the auth token.
pub const SESSION_COOKIE: &str = "atelier_session";

/// Decides whether a request is authenticated.
pub trait Authenticator: Send + Sync {
    /// Identity of the requester, or `None` when the request carries no
    /// valid credentials. `cookie_header` is the raw `Cookie` header, when
    /// present.
    fn authenticate(&self, cookie_header: Option<&str>) -> Option<UserInfo>;
}

/// Token authentication: the session cookie must equal the configured
/// secret.
pub struct TokenAuth {
    token: String,
}

impl TokenAuth {
    /// Create an authenticator expecting the given token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl Authenticator for TokenAuth {
    fn authenticate(&self, cookie_header: Option<&str>) -> Option<UserInfo> {
        let value = cookie_value(cookie_header?, SESSION_COOKIE)?;
        if value == self.token {
            Some(UserInfo::new("default"))
        } else {
            None
        }
    }
}

/// Open access for deployments that disable authentication.
pub struct OpenAuth;

impl Authenticator for OpenAuth {
    fn authenticate(&self, _cookie_header: Option<&str>) -> Option<UserInfo> {
        Some(UserInfo::new("default"))
    }
}

/// Extract one cookie's value from a raw `Cookie` header.
#[must_use]
pub fn cookie_value<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}
