//! Credentials and the authenticated session value.

use std::fmt;

use crate::SessionError;

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// What the caller hands in: an API token and, optionally, the web
/// session cookie some REST endpoints want alongside it.
///
/// `Debug` redacts both secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
    web_session: Option<String>,
}

impl Credentials {
    /// Wraps an API token.
    ///
    /// # Errors
    /// Returns `SessionError::MissingToken` for an empty or blank token.
    pub fn new(token: impl Into<String>) -> Result<Self, SessionError> {
        let token = token.into();
        let token = token.trim();
        if token.is_empty() {
            return Err(SessionError::MissingToken);
        }
        Ok(Self {
            token: token.to_owned(),
            web_session: None,
        })
    }

    /// Attaches the web session cookie value.
    pub fn with_web_session(mut self, cookie: impl Into<String>) -> Self {
        let cookie = cookie.into();
        self.web_session = (!cookie.is_empty()).then_some(cookie);
        self
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn web_session(&self) -> Option<&str> {
        self.web_session.as_deref()
    }

    /// Headers for plain REST calls: `authorization: Token <t>`, plus the
    /// web session cookie when one was supplied.
    pub fn http_headers(&self) -> Vec<(String, String)> {
        let mut headers = vec![(
            "authorization".to_owned(),
            format!("Token {}", self.token),
        )];
        if let Some(cookie) = &self.web_session {
            headers.push(("cookie".to_owned(), cookie.clone()));
        }
        headers
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("web_session", &self.web_session.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// AccountProfile
// ---------------------------------------------------------------------------

/// The account a token belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountProfile {
    /// Numeric account id, kept as the decimal string the duplex protocol
    /// uses for `author_id` / `creator_id`.
    pub account_id: String,
    pub username: String,
    /// Display name sent as `user_name` on generation requests.
    pub display_name: String,
}

// ---------------------------------------------------------------------------
// AuthenticatedSession
// ---------------------------------------------------------------------------

/// Credentials that have been checked against the service, together with
/// the account they resolved to. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedSession {
    credentials: Credentials,
    profile: AccountProfile,
}

impl AuthenticatedSession {
    pub fn new(credentials: Credentials, profile: AccountProfile) -> Self {
        tracing::debug!(account_id = %profile.account_id, "session established");
        Self {
            credentials,
            profile,
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn profile(&self) -> &AccountProfile {
        &self.profile
    }

    pub fn account_id(&self) -> &str {
        &self.profile.account_id
    }

    /// Headers for plain REST calls.
    pub fn http_headers(&self) -> Vec<(String, String)> {
        self.credentials.http_headers()
    }

    /// Headers for the duplex upgrade request. The socket endpoint reads the
    /// token from a cookie rather than the `authorization` header.
    pub fn duplex_headers(&self, user_agent: &str) -> Vec<(String, String)> {
        vec![
            (
                "Cookie".to_owned(),
                format!("HTTP_AUTHORIZATION=\"Token {}\"", self.credentials.token),
            ),
            ("User-Agent".to_owned(), user_agent.to_owned()),
        ]
    }
}
