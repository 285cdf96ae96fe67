//! The authenticate step.
//!
//! Resolving a token to an account needs a round trip to the service, which
//! this crate does not know how to make. [`Authenticator`] is the seam: the
//! `parley` crate implements it over its REST transport, and tests implement
//! it with a fixed profile.

use std::future::Future;

use crate::{AuthenticatedSession, Credentials, SessionError};

/// Turns [`Credentials`] into an [`AuthenticatedSession`].
///
/// # Example
///
/// ```rust
/// use parley_session::{
///     AccountProfile, AuthenticatedSession, Authenticator, Credentials,
///     SessionError,
/// };
///
/// /// Accepts every token as the same account. Offline use only.
/// struct FixedAccount;
///
/// impl Authenticator for FixedAccount {
///     async fn authenticate(
///         &self,
///         credentials: Credentials,
///     ) -> Result<AuthenticatedSession, SessionError> {
///         Ok(AuthenticatedSession::new(
///             credentials,
///             AccountProfile {
///                 account_id: "1".into(),
///                 username: "dev".into(),
///                 display_name: "Dev".into(),
///             },
///         ))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Checks `credentials` against the service and returns the session.
    ///
    /// # Returns
    /// - `Ok(AuthenticatedSession)` on success
    /// - `Err(SessionError::AuthFailed)` if the token was rejected
    /// - `Err(SessionError::ProfileUnavailable)` if the account lookup
    ///   itself failed
    fn authenticate(
        &self,
        credentials: Credentials,
    ) -> impl Future<Output = Result<AuthenticatedSession, SessionError>> + Send;
}
