//! The `Client` facade.
//!
//! Ties the layers together: session → REST helpers, and session →
//! duplex endpoint → turn-exchange engine.

use std::sync::Arc;

use parley_exchange::TurnExchange;
use parley_protocol::{Chat, Turn, TurnKey};
use parley_session::{AuthenticatedSession, Authenticator, Credentials, SessionError};
use parley_transport::{
    ConnectionState, Dialer, DuplexEndpoint, HttpTransport, ReqwestTransport,
    WebSocketDialer,
};

use crate::paging::Page;
use crate::rest::RestApi;
use crate::{ClientConfig, ParleyError};

/// [`Authenticator`] that resolves a token through the account endpoint.
pub struct AccountLookup<H> {
    http: Arc<H>,
    config: ClientConfig,
}

impl<H: HttpTransport> AccountLookup<H> {
    pub fn new(http: Arc<H>, config: ClientConfig) -> Self {
        Self { http, config }
    }
}

impl<H: HttpTransport> Authenticator for AccountLookup<H> {
    async fn authenticate(
        &self,
        credentials: Credentials,
    ) -> Result<AuthenticatedSession, SessionError> {
        let rest = RestApi::for_credentials(Arc::clone(&self.http), &self.config, &credentials);
        let profile = rest.fetch_me().await.map_err(|e| match e {
            ParleyError::Session(e) => e,
            other => SessionError::ProfileUnavailable(other.to_string()),
        })?;
        Ok(AuthenticatedSession::new(credentials, profile))
    }
}

/// An authenticated connection to the chat service.
///
/// Duplex operations (`send_message`, `create_chat`, ...) share one socket
/// that is opened on first use and run one at a time in call order. REST
/// helpers (`fetch_histories`, `archive_chat`, ...) go over HTTP and are
/// never queued behind them.
///
/// # Example
///
/// ```rust,no_run
/// use parley::{Client, ClientConfig, Credentials};
///
/// # async fn demo() -> Result<(), parley::ParleyError> {
/// let client = Client::connect(ClientConfig::default(), Credentials::new("token")?).await?;
/// let reply = client.send_message("character-id", "chat-id", "hi").await?;
/// println!("{}", reply.primary_candidate().map(|c| c.text.as_str()).unwrap_or(""));
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Client<D: Dialer = WebSocketDialer, H: HttpTransport = ReqwestTransport> {
    config: ClientConfig,
    session: AuthenticatedSession,
    rest: RestApi<H>,
    exchange: TurnExchange<D>,
}

impl Client {
    /// Authenticates `credentials` and returns a client speaking WebSocket
    /// and HTTPS. No socket is opened yet.
    pub async fn connect(
        config: ClientConfig,
        credentials: Credentials,
    ) -> Result<Self, ParleyError> {
        let http = ReqwestTransport::new(&config.user_agent, config.http_timeout)?;
        Self::authenticate(config, credentials, WebSocketDialer::default(), http).await
    }
}

impl<D: Dialer, H: HttpTransport> Client<D, H> {
    /// Authenticates through the account endpoint using `http`, then builds
    /// a client over `dialer`.
    pub async fn authenticate(
        config: ClientConfig,
        credentials: Credentials,
        dialer: D,
        http: H,
    ) -> Result<Self, ParleyError> {
        let http = Arc::new(http);
        let session = AccountLookup::new(Arc::clone(&http), config.clone())
            .authenticate(credentials)
            .await?;
        tracing::info!(
            account_id = %session.account_id(),
            username = %session.profile().username,
            "authenticated"
        );
        Ok(Self::build(config, session, dialer, http))
    }

    /// Builds a client around a session that was authenticated elsewhere.
    pub fn from_session(
        config: ClientConfig,
        session: AuthenticatedSession,
        dialer: D,
        http: H,
    ) -> Self {
        Self::build(config, session, dialer, Arc::new(http))
    }

    fn build(
        config: ClientConfig,
        session: AuthenticatedSession,
        dialer: D,
        http: Arc<H>,
    ) -> Self {
        let endpoint = session
            .duplex_headers(&config.user_agent)
            .into_iter()
            .fold(DuplexEndpoint::new(config.duplex_url.clone()), |ep, (k, v)| {
                ep.with_header(k, v)
            });
        let rest = RestApi::new(http, &config, &session);
        let exchange =
            TurnExchange::new(dialer, endpoint, session.clone(), config.exchange.clone());

        Self {
            config,
            session,
            rest,
            exchange,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &AuthenticatedSession {
        &self.session
    }

    /// The REST helpers on their own, for callers that want to hand them
    /// to another task.
    pub fn rest(&self) -> &RestApi<H> {
        &self.rest
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.exchange.connection_state()
    }

    // -----------------------------------------------------------------------
    // Duplex operations
    // -----------------------------------------------------------------------

    /// Sends `text` to `character_id` in `chat_id` and returns the
    /// character's finished reply turn.
    pub async fn send_message(
        &self,
        character_id: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<Turn, ParleyError> {
        Ok(self.exchange.send_message(character_id, chat_id, text).await?)
    }

    /// Starts a new chat with `character_id`. With `with_greeting`, the
    /// character's greeting turn is returned too.
    pub async fn create_chat(
        &self,
        character_id: &str,
        with_greeting: bool,
    ) -> Result<(Chat, Option<Turn>), ParleyError> {
        Ok(self.exchange.create_chat(character_id, with_greeting).await?)
    }

    pub async fn regenerate(
        &self,
        character_id: &str,
        key: &TurnKey,
    ) -> Result<Turn, ParleyError> {
        Ok(self.exchange.regenerate(character_id, key).await?)
    }

    pub async fn edit_turn(
        &self,
        key: &TurnKey,
        candidate_id: &str,
        text: &str,
    ) -> Result<Turn, ParleyError> {
        Ok(self.exchange.edit_turn(key, candidate_id, text).await?)
    }

    pub async fn set_primary_candidate(
        &self,
        key: &TurnKey,
        candidate_id: &str,
    ) -> Result<(), ParleyError> {
        Ok(self.exchange.set_primary_candidate(key, candidate_id).await?)
    }

    pub async fn delete_turns(
        &self,
        chat_id: &str,
        turn_ids: &[String],
    ) -> Result<(), ParleyError> {
        Ok(self.exchange.delete_turns(chat_id, turn_ids).await?)
    }

    /// Pins a turn. `NotApplied` if the service returns it still unpinned.
    pub async fn pin_turn(&self, key: &TurnKey) -> Result<Turn, ParleyError> {
        Ok(self.exchange.set_pinned(key, true).await?)
    }

    /// Unpins a turn. `NotApplied` if the service returns it still pinned.
    pub async fn unpin_turn(&self, key: &TurnKey) -> Result<Turn, ParleyError> {
        Ok(self.exchange.set_pinned(key, false).await?)
    }

    /// Closes the duplex socket. Idempotent; a later duplex operation
    /// reconnects.
    pub async fn close(&self) -> Result<(), ParleyError> {
        Ok(self.exchange.close().await?)
    }

    // -----------------------------------------------------------------------
    // REST helpers
    // -----------------------------------------------------------------------

    pub async fn ping(&self) -> Result<bool, ParleyError> {
        self.rest.ping().await
    }

    pub async fn fetch_histories(
        &self,
        character_id: &str,
        preview_turns: u32,
    ) -> Result<Vec<Chat>, ParleyError> {
        self.rest.fetch_histories(character_id, preview_turns).await
    }

    pub async fn fetch_recent_chat(
        &self,
        character_id: &str,
    ) -> Result<Option<Chat>, ParleyError> {
        self.rest.fetch_recent_chat(character_id).await
    }

    pub async fn fetch_chat(&self, chat_id: &str) -> Result<Chat, ParleyError> {
        self.rest.fetch_chat(chat_id).await
    }

    pub async fn fetch_messages(
        &self,
        chat_id: &str,
        next_token: Option<&str>,
    ) -> Result<Page<Turn>, ParleyError> {
        self.rest.fetch_messages(chat_id, next_token).await
    }

    pub async fn fetch_all_messages(&self, chat_id: &str) -> Result<Vec<Turn>, ParleyError> {
        self.rest.fetch_all_messages(chat_id).await
    }

    pub async fn archive_chat(&self, chat_id: &str) -> Result<(), ParleyError> {
        self.rest.archive_chat(chat_id).await
    }

    pub async fn unarchive_chat(&self, chat_id: &str) -> Result<(), ParleyError> {
        self.rest.unarchive_chat(chat_id).await
    }

    pub async fn copy_chat(
        &self,
        chat_id: &str,
        end_turn_id: &str,
    ) -> Result<String, ParleyError> {
        self.rest.copy_chat(chat_id, end_turn_id).await
    }

    pub async fn rename_chat(&self, chat_id: &str, name: &str) -> Result<(), ParleyError> {
        self.rest.rename_chat(chat_id, name).await
    }

    pub async fn rate_candidate(
        &self,
        key: &TurnKey,
        candidate_id: &str,
        stars: u8,
    ) -> Result<(), ParleyError> {
        self.rest.rate_candidate(key, candidate_id, stars).await
    }
}
