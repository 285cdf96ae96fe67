//! Caller identity for Parley.
//!
//! Authentication is an explicit step, not ambient client state:
//!
//! 1. The caller builds immutable [`Credentials`] (API token, optional web
//!    session cookie).
//! 2. An [`Authenticator`] resolves them into an [`AuthenticatedSession`]
//!    carrying the account the token belongs to.
//! 3. Everything that talks to the service borrows the session to build its
//!    request headers.
//!
//! ```text
//! Client (above)  ← holds one AuthenticatedSession per instance
//!     ↕
//! Session (this crate)  ← credentials, account profile, auth headers
//! ```

mod auth;
mod error;
mod session;

pub use auth::Authenticator;
pub use error::SessionError;
pub use session::{AccountProfile, AuthenticatedSession, Credentials};
