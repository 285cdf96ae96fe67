//! REST-only chat helpers.
//!
//! These calls go over plain HTTP, are not serialised behind the duplex
//! lane, and may run concurrently with each other and with an in-flight
//! duplex operation. Every reply is checked against the service's error
//! envelope before it is decoded:
//!
//! 1. non-2xx status → `Server("HTTP <code>")`
//! 2. `{"detail": "Auth"}` → `Session(AuthFailed)`
//! 3. `{"command": "neo_error"}` → `Server(comment)`
//! 4. `status` present and not `"OK"` → `Server(error or status)`
//! 5. non-empty `error` → `Server(error)`

use std::sync::Arc;

use parley_protocol::{tag, Chat, ProtocolError, Turn, TurnKey};
use parley_session::{AccountProfile, AuthenticatedSession, Credentials, SessionError};
use parley_transport::{HttpRequest, HttpTransport, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::paging::{collect_pages, Page, PageSource};
use crate::{ClientConfig, ParleyError};

/// Preview turns requested per chat when the caller passes zero.
pub const DEFAULT_PREVIEW_TURNS: u32 = 2;

/// Typed REST calls against the chat and account APIs.
///
/// Cheap to clone; the transport is shared.
#[derive(Debug)]
pub struct RestApi<H> {
    http: Arc<H>,
    neo_base_url: String,
    account_base_url: String,
    headers: Vec<(String, String)>,
}

impl<H> Clone for RestApi<H> {
    fn clone(&self) -> Self {
        Self {
            http: Arc::clone(&self.http),
            neo_base_url: self.neo_base_url.clone(),
            account_base_url: self.account_base_url.clone(),
            headers: self.headers.clone(),
        }
    }
}

impl<H: HttpTransport> RestApi<H> {
    /// REST calls on behalf of an established session.
    pub fn new(http: Arc<H>, config: &ClientConfig, session: &AuthenticatedSession) -> Self {
        Self::with_headers(http, config, session.http_headers())
    }

    /// REST calls with bare credentials, before an account is known.
    pub(crate) fn for_credentials(
        http: Arc<H>,
        config: &ClientConfig,
        credentials: &Credentials,
    ) -> Self {
        Self::with_headers(http, config, credentials.http_headers())
    }

    fn with_headers(
        http: Arc<H>,
        config: &ClientConfig,
        headers: Vec<(String, String)>,
    ) -> Self {
        Self {
            http,
            neo_base_url: config.neo_base_url.clone(),
            account_base_url: config.account_base_url.clone(),
            headers,
        }
    }

    // -----------------------------------------------------------------------
    // Account
    // -----------------------------------------------------------------------

    /// Looks up the account the credentials belong to.
    ///
    /// # Errors
    /// `Session(AuthFailed)` when the service rejects the token.
    pub async fn fetch_me(&self) -> Result<AccountProfile, ParleyError> {
        let url = endpoint(&self.account_base_url, &["chat", "user", ""], &[])?;
        let reply: MeReply = self.call(Method::Get, url, None).await?;
        let account = reply.user;
        Ok(AccountProfile {
            account_id: account.user.id.into_string(),
            username: account.user.username,
            display_name: account.name,
        })
    }

    /// Returns `true` if the chat service answers `ping/` with 200.
    ///
    /// Any other status is `Ok(false)`; only transport failures are errors.
    pub async fn ping(&self) -> Result<bool, ParleyError> {
        let request = HttpRequest::new(Method::Get, self.neo(&["ping", ""])?)
            .with_headers(self.headers.iter().cloned());
        let response = self.http.request(request).await?;
        Ok(response.status == 200)
    }

    // -----------------------------------------------------------------------
    // Chats
    // -----------------------------------------------------------------------

    /// Lists the caller's chats with `character_id`, newest first, each with
    /// up to `preview_turns` preview turns (zero means the default of two).
    pub async fn fetch_histories(
        &self,
        character_id: &str,
        preview_turns: u32,
    ) -> Result<Vec<Chat>, ParleyError> {
        require("character id", character_id)?;
        let preview = if preview_turns == 0 {
            DEFAULT_PREVIEW_TURNS
        } else {
            preview_turns
        };
        let preview = preview.to_string();
        let url = endpoint(
            &self.neo_base_url,
            &["chats", ""],
            &[("character_ids", character_id), ("num_preview_turns", preview.as_str())],
        )?;
        let reply: ChatsReply = self.call(Method::Get, url, None).await?;
        Ok(reply.chats)
    }

    /// The most recent chat with `character_id`, if any.
    pub async fn fetch_recent_chat(
        &self,
        character_id: &str,
    ) -> Result<Option<Chat>, ParleyError> {
        require("character id", character_id)?;
        let url = self.neo(&["chats", "recent", character_id])?;
        let reply: ChatsReply = self.call(Method::Get, url, None).await?;
        Ok(reply.chats.into_iter().next())
    }

    pub async fn fetch_chat(&self, chat_id: &str) -> Result<Chat, ParleyError> {
        require("chat id", chat_id)?;
        let url = self.neo(&["chat", chat_id, ""])?;
        let reply: ChatEnvelope = self.call(Method::Get, url, None).await?;
        Ok(reply.chat)
    }

    /// One page of a chat's turns, newest first. Pass the previous page's
    /// `next_token` to continue.
    pub async fn fetch_messages(
        &self,
        chat_id: &str,
        next_token: Option<&str>,
    ) -> Result<Page<Turn>, ParleyError> {
        require("chat id", chat_id)?;
        let query: Vec<(&str, &str)> = next_token
            .filter(|t| !t.is_empty())
            .map(|t| ("next_token", t))
            .into_iter()
            .collect();
        let url = endpoint(&self.neo_base_url, &["turns", chat_id, ""], &query)?;
        let reply: TurnsReply = self.call(Method::Get, url, None).await?;
        Ok(Page {
            items: reply.turns,
            next_token: reply.meta.next_token,
        })
    }

    /// Every turn of a chat, following continuation tokens to the end.
    pub async fn fetch_all_messages(&self, chat_id: &str) -> Result<Vec<Turn>, ParleyError> {
        require("chat id", chat_id)?;
        let source = MessagePages { rest: self, chat_id };
        collect_pages(&source, None).await
    }

    pub async fn archive_chat(&self, chat_id: &str) -> Result<(), ParleyError> {
        require("chat id", chat_id)?;
        let url = self.neo(&["chat", chat_id, "archive"])?;
        self.call::<Value>(Method::Patch, url, None).await?;
        Ok(())
    }

    pub async fn unarchive_chat(&self, chat_id: &str) -> Result<(), ParleyError> {
        require("chat id", chat_id)?;
        let url = self.neo(&["chat", chat_id, "unarchive"])?;
        self.call::<Value>(Method::Patch, url, None).await?;
        Ok(())
    }

    /// Copies a chat up to and including `end_turn_id`; returns the new
    /// chat's id.
    pub async fn copy_chat(
        &self,
        chat_id: &str,
        end_turn_id: &str,
    ) -> Result<String, ParleyError> {
        require("chat id", chat_id)?;
        require("turn id", end_turn_id)?;
        let url = self.neo(&["chat", chat_id, "copy"])?;
        let reply: CopyReply = self
            .call(Method::Post, url, Some(json!({ "end_turn_id": end_turn_id })))
            .await?;
        if reply.new_chat_id.is_empty() {
            return Err(ProtocolError::InvalidMessage("copy reply without new_chat_id".into()).into());
        }
        Ok(reply.new_chat_id)
    }

    pub async fn rename_chat(&self, chat_id: &str, name: &str) -> Result<(), ParleyError> {
        require("chat id", chat_id)?;
        require("chat name", name)?;
        let url = self.neo(&["chat", chat_id, "update_name"])?;
        self.call::<Value>(Method::Patch, url, Some(json!({ "name": name })))
            .await?;
        Ok(())
    }

    /// Gives a candidate a star rating from 0 to 4.
    pub async fn rate_candidate(
        &self,
        key: &TurnKey,
        candidate_id: &str,
        stars: u8,
    ) -> Result<(), ParleyError> {
        require("chat id", &key.chat_id)?;
        require("turn id", &key.turn_id)?;
        require("candidate id", candidate_id)?;
        if stars > 4 {
            return Err(ParleyError::Validation(format!(
                "rating must be between 0 and 4, got {stars}"
            )));
        }

        let body = RateRequest {
            turn_key: key,
            candidate_id,
            annotation: Annotation {
                annotation_type: "star",
                annotation_value: stars,
            },
        };
        let body = serde_json::to_value(&body).map_err(ProtocolError::Encode)?;
        self.call::<Value>(Method::Post, self.neo(&["annotation", "create"])?, Some(body))
            .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    fn neo(&self, segments: &[&str]) -> Result<String, ParleyError> {
        endpoint(&self.neo_base_url, segments, &[])
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        url: String,
        body: Option<Value>,
    ) -> Result<T, ParleyError> {
        let mut request =
            HttpRequest::new(method, url).with_headers(self.headers.iter().cloned());
        if let Some(body) = body {
            let bytes = serde_json::to_vec(&body).map_err(ProtocolError::Encode)?;
            request = request
                .with_header("content-type", "application/json")
                .with_body(bytes);
        }

        let url = request.url.clone();
        let response = self.http.request(request).await?;
        tracing::debug!(%method, %url, status = response.status, "rest reply");

        if !response.is_success() {
            return Err(ParleyError::server(format!("HTTP {}", response.status)));
        }

        let value: Value = if response.body.iter().all(u8::is_ascii_whitespace) {
            Value::Object(Default::default())
        } else {
            serde_json::from_slice(&response.body).map_err(ProtocolError::Decode)?
        };
        check_envelope(&value)?;
        serde_json::from_value(value).map_err(|e| ProtocolError::Decode(e).into())
    }
}

/// Appends `segments` to `base`, percent-encoding each one, then
/// form-encodes `query`. An empty last segment keeps the trailing slash the
/// service routes on.
fn endpoint(
    base: &str,
    segments: &[&str],
    query: &[(&str, &str)],
) -> Result<String, ParleyError> {
    let mut url = Url::parse(base)
        .map_err(|e| ParleyError::Validation(format!("invalid base url {base:?}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| ParleyError::Validation(format!("base url {base:?} cannot carry a path")))?
        .pop_if_empty()
        .extend(segments);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url.into())
}

/// Maps the service's in-body error conventions onto [`ParleyError`].
fn check_envelope(value: &Value) -> Result<(), ParleyError> {
    let text = |key: &str| value.get(key).and_then(Value::as_str);

    if text("detail") == Some("Auth") {
        return Err(SessionError::AuthFailed("token rejected".into()).into());
    }
    if text("command") == Some(tag::NEO_ERROR) {
        let comment = text("comment").filter(|c| !c.is_empty());
        return Err(ParleyError::server(comment.unwrap_or("unspecified service error")));
    }
    if let Some(status) = text("status") {
        if status != "OK" {
            let message = text("error").filter(|e| !e.is_empty()).unwrap_or(status);
            return Err(ParleyError::server(message));
        }
    }
    if let Some(error) = text("error").filter(|e| !e.is_empty()) {
        return Err(ParleyError::server(error));
    }
    Ok(())
}

fn require(what: &str, value: &str) -> Result<(), ParleyError> {
    if value.trim().is_empty() {
        return Err(ParleyError::Validation(format!("{what} must not be empty")));
    }
    Ok(())
}

struct MessagePages<'a, H> {
    rest: &'a RestApi<H>,
    chat_id: &'a str,
}

impl<H: HttpTransport> PageSource<Turn> for MessagePages<'_, H> {
    async fn fetch_page(&self, token: Option<&str>) -> Result<Page<Turn>, ParleyError> {
        self.rest.fetch_messages(self.chat_id, token).await
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct MeReply {
    user: MeAccount,
}

#[derive(Deserialize)]
struct MeAccount {
    user: MeUser,
    #[serde(default)]
    name: String,
}

#[derive(Deserialize)]
struct MeUser {
    id: AccountId,
    #[serde(default)]
    username: String,
}

/// The account endpoint has served the id both as a number and a string.
#[derive(Deserialize)]
#[serde(untagged)]
enum AccountId {
    Number(u64),
    Text(String),
}

impl AccountId {
    fn into_string(self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s,
        }
    }
}

#[derive(Deserialize)]
struct ChatsReply {
    #[serde(default)]
    chats: Vec<Chat>,
}

#[derive(Deserialize)]
struct ChatEnvelope {
    chat: Chat,
}

#[derive(Deserialize)]
struct TurnsReply {
    #[serde(default)]
    turns: Vec<Turn>,
    #[serde(default)]
    meta: TurnsMeta,
}

#[derive(Deserialize, Default)]
struct TurnsMeta {
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Deserialize)]
struct CopyReply {
    #[serde(default)]
    new_chat_id: String,
}

#[derive(Serialize)]
struct RateRequest<'a> {
    turn_key: &'a TurnKey,
    candidate_id: &'a str,
    annotation: Annotation,
}

#[derive(Serialize)]
struct Annotation {
    annotation_type: &'static str,
    annotation_value: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_envelope_plain_object_passes() {
        assert!(check_envelope(&json!({"chats": []})).is_ok());
        assert!(check_envelope(&json!({"status": "OK", "error": ""})).is_ok());
    }

    #[test]
    fn test_check_envelope_detail_auth_returns_auth_failed() {
        let err = check_envelope(&json!({"detail": "Auth"})).unwrap_err();
        assert!(matches!(err, ParleyError::Session(SessionError::AuthFailed(_))));
    }

    #[test]
    fn test_check_envelope_neo_error_uses_comment() {
        let err = check_envelope(&json!({"command": "neo_error", "comment": "chat gone"}))
            .unwrap_err();
        assert!(matches!(err, ParleyError::Server { ref message } if message == "chat gone"));
    }

    #[test]
    fn test_check_envelope_bad_status_prefers_error_text() {
        let with_error =
            check_envelope(&json!({"status": "FAILED", "error": "not yours"})).unwrap_err();
        let bare = check_envelope(&json!({"status": "FAILED"})).unwrap_err();

        assert!(matches!(with_error, ParleyError::Server { ref message } if message == "not yours"));
        assert!(matches!(bare, ParleyError::Server { ref message } if message == "FAILED"));
    }

    #[test]
    fn test_check_envelope_error_without_status_returns_server() {
        let err = check_envelope(&json!({"error": "rate limited"})).unwrap_err();
        assert!(matches!(err, ParleyError::Server { ref message } if message == "rate limited"));
    }

    #[test]
    fn test_endpoint_encodes_segments_and_query() {
        let url = endpoint(
            "http://neo.test/",
            &["turns", "c/1 x", ""],
            &[("next_token", "a+b/c=&d#e")],
        )
        .unwrap();
        assert_eq!(
            url,
            "http://neo.test/turns/c%2F1%20x/?next_token=a%2Bb%2Fc%3D%26d%23e"
        );
    }

    #[test]
    fn test_endpoint_without_query_keeps_trailing_slash() {
        assert_eq!(
            endpoint("http://127.0.0.1:80", &["ping", ""], &[]).unwrap(),
            "http://127.0.0.1/ping/"
        );
        assert_eq!(
            endpoint("http://neo.test/", &["chat", "c1", "archive"], &[]).unwrap(),
            "http://neo.test/chat/c1/archive"
        );
    }

    #[test]
    fn test_endpoint_invalid_base_returns_validation() {
        let err = endpoint("not a url", &["ping", ""], &[]).unwrap_err();
        assert!(matches!(err, ParleyError::Validation(_)));
    }

    #[test]
    fn test_account_id_accepts_number_and_string() {
        let numeric: MeReply =
            serde_json::from_value(json!({"user": {"user": {"id": 42, "username": "ada"}, "name": "Ada"}}))
                .unwrap();
        let text: MeReply =
            serde_json::from_value(json!({"user": {"user": {"id": "43"}}})).unwrap();

        assert_eq!(numeric.user.user.id.into_string(), "42");
        assert_eq!(numeric.user.name, "Ada");
        assert_eq!(text.user.user.id.into_string(), "43");
    }

    #[test]
    fn test_rate_request_wire_shape() {
        let key = TurnKey::new("c1", "t1");
        let body = RateRequest {
            turn_key: &key,
            candidate_id: "cand1",
            annotation: Annotation {
                annotation_type: "star",
                annotation_value: 3,
            },
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "turn_key": {"chat_id": "c1", "turn_id": "t1"},
                "candidate_id": "cand1",
                "annotation": {"annotation_type": "star", "annotation_value": 3}
            })
        );
    }
}
