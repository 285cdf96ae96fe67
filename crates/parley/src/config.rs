//! Client configuration.

use std::time::Duration;

use parley_exchange::ExchangeConfig;

/// Where the service lives and how the client talks to it.
///
/// Immutable once a [`Client`](crate::Client) is built. Start from
/// [`ClientConfig::default()`] or [`ClientConfig::builder()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the chat REST API (histories, turns, archive, ...).
    pub neo_base_url: String,
    /// Base URL of the account REST API.
    pub account_base_url: String,
    /// `wss://` URL of the duplex endpoint.
    pub duplex_url: String,
    /// `User-Agent` for both HTTP and the socket handshake.
    pub user_agent: String,
    /// Per-request timeout of plain HTTP calls.
    pub http_timeout: Duration,
    /// Engine tuning: reply timeout, stale window, origin tag.
    pub exchange: ExchangeConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            neo_base_url: "https://neo.character.ai/".to_string(),
            account_base_url: "https://plus.character.ai/".to_string(),
            duplex_url: "wss://neo.character.ai/ws/".to_string(),
            user_agent: concat!("parley/", env!("CARGO_PKG_VERSION")).to_string(),
            http_timeout: Duration::from_secs(30),
            exchange: ExchangeConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }
}

/// Builder for [`ClientConfig`].
///
/// ```rust
/// use std::time::Duration;
/// use parley::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .reply_timeout(Duration::from_secs(20))
///     .user_agent("my-bot/1.0")
///     .build();
/// assert_eq!(config.exchange.reply_timeout, Duration::from_secs(20));
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    pub fn neo_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.neo_base_url = url.into();
        self
    }

    pub fn account_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.account_base_url = url.into();
        self
    }

    pub fn duplex_url(mut self, url: impl Into<String>) -> Self {
        self.config.duplex_url = url.into();
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.config.http_timeout = timeout;
        self
    }

    /// How long a duplex operation waits for its reply.
    pub fn reply_timeout(mut self, timeout: Duration) -> Self {
        self.config.exchange.reply_timeout = timeout;
        self
    }

    /// How long late replies to a timed-out operation are discarded.
    ///
    /// See [`ExchangeConfig::stale_window`] for how this interacts with
    /// retries in the same chat.
    pub fn stale_window(mut self, window: Duration) -> Self {
        self.config.exchange.stale_window = window;
        self
    }

    /// `origin_id` stamped on every envelope.
    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.config.exchange.origin = origin.into();
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default_endpoints() {
        let config = ClientConfig::default();
        assert_eq!(config.duplex_url, "wss://neo.character.ai/ws/");
        assert_eq!(config.exchange.reply_timeout, Duration::from_secs(60));
        assert!(config.user_agent.starts_with("parley/"));
    }

    #[test]
    fn test_builder_overrides_only_given_fields() {
        let config = ClientConfig::builder()
            .duplex_url("ws://127.0.0.1:9000/ws/")
            .stale_window(Duration::from_secs(5))
            .origin("cli")
            .build();

        assert_eq!(config.duplex_url, "ws://127.0.0.1:9000/ws/");
        assert_eq!(config.exchange.stale_window, Duration::from_secs(5));
        assert_eq!(config.exchange.origin, "cli");
        assert_eq!(config.neo_base_url, "https://neo.character.ai/");
    }
}
