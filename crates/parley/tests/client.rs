//! End-to-end tests for `Client`.
//!
//! Duplex operations run against a real `tokio-tungstenite` server on a
//! loopback port; REST helpers run against an in-memory `HttpTransport`
//! that answers from a closure and records every request.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parley::{
    AccountProfile, AuthenticatedSession, Client, ClientConfig, ConnectionState,
    Credentials, HttpTransport, ParleyError, SessionError, TransportError, TurnKey,
    WebSocketDialer,
};
use parley_transport::{HttpRequest, HttpResponse, Method};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Loopback duplex service
// =========================================================================

struct Service {
    url: String,
    requests: mpsc::UnboundedReceiver<Value>,
    replies: mpsc::UnboundedSender<String>,
}

impl Service {
    /// Accepts one WebSocket client and relays frames both ways.
    async fn spawn() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}/ws/", listener.local_addr().unwrap());
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            loop {
                tokio::select! {
                    incoming = ws.next() => match incoming {
                        Some(Ok(msg)) if msg.is_text() => {
                            let value: Value = serde_json::from_slice(&msg.into_data()).unwrap();
                            if req_tx.send(value).is_err() {
                                break;
                            }
                        }
                        Some(Ok(_)) => {}
                        _ => break,
                    },
                    outgoing = reply_rx.recv() => match outgoing {
                        Some(text) => {
                            if ws.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        Self {
            url,
            requests: req_rx,
            replies: reply_tx,
        }
    }

    async fn next_request(&mut self) -> Value {
        tokio::time::timeout(Duration::from_secs(5), self.requests.recv())
            .await
            .expect("service waited too long for a request")
            .expect("client hung up")
    }

    /// `true` if no request arrives within `window`.
    async fn quiet_for(&mut self, window: Duration) -> bool {
        tokio::time::timeout(window, self.requests.recv()).await.is_err()
    }

    fn push(&self, frame: Value) {
        self.replies.send(frame.to_string()).unwrap();
    }
}

fn turn(chat: &str, turn: &str, cand: &str, text: &str, pinned: bool) -> Value {
    json!({
        "turn_key": { "chat_id": chat, "turn_id": turn },
        "author": { "author_id": "ch1", "name": "Character", "is_human": false },
        "candidates": [
            { "candidate_id": cand, "raw_content": text, "is_final": true }
        ],
        "primary_candidate_id": cand,
        "is_pinned": pinned
    })
}

// =========================================================================
// In-memory HTTP
// =========================================================================

type Responder = dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync;

struct MockHttp {
    responder: Box<Responder>,
    log: Arc<Mutex<Vec<HttpRequest>>>,
}

impl MockHttp {
    fn new(
        responder: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    ) -> (Self, Arc<Mutex<Vec<HttpRequest>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mock = Self {
            responder: Box::new(responder),
            log: Arc::clone(&log),
        };
        (mock, log)
    }
}

impl HttpTransport for MockHttp {
    async fn request(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let response = (self.responder)(&request);
        self.log.lock().unwrap().push(request);
        Ok(response)
    }
}

fn reply(status: u16, body: Value) -> HttpResponse {
    HttpResponse {
        status,
        body: serde_json::to_vec(&body).unwrap(),
    }
}

fn me_reply() -> HttpResponse {
    reply(
        200,
        json!({ "user": { "user": { "id": 42, "username": "ada" }, "name": "Ada" } }),
    )
}

// =========================================================================
// Setup
// =========================================================================

fn config(duplex_url: &str) -> ClientConfig {
    ClientConfig::builder()
        .duplex_url(duplex_url)
        .neo_base_url("http://neo.test/")
        .account_base_url("http://plus.test/")
        .reply_timeout(Duration::from_secs(5))
        .build()
}

fn session() -> AuthenticatedSession {
    AuthenticatedSession::new(
        Credentials::new("secret").unwrap(),
        AccountProfile {
            account_id: "42".into(),
            username: "ada".into(),
            display_name: "Ada".into(),
        },
    )
}

fn duplex_client(config: ClientConfig) -> Client<WebSocketDialer, MockHttp> {
    let (http, _) = MockHttp::new(|_| reply(404, json!({})));
    Client::from_session(config, session(), WebSocketDialer::default(), http)
}

fn rest_client(
    responder: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
) -> (Client<WebSocketDialer, MockHttp>, Arc<Mutex<Vec<HttpRequest>>>) {
    let (http, log) = MockHttp::new(responder);
    let client = Client::from_session(
        config("ws://127.0.0.1:9/ws/"),
        session(),
        WebSocketDialer::default(),
        http,
    );
    (client, log)
}

// =========================================================================
// Duplex operations
// =========================================================================

#[tokio::test]
async fn test_authenticated_client_sends_message_and_returns_reply() {
    let mut service = Service::spawn().await;
    let (http, log) = MockHttp::new(|req| {
        if req.url == "http://plus.test/chat/user/" {
            me_reply()
        } else {
            reply(404, json!({}))
        }
    });

    let client = Client::authenticate(
        config(&service.url),
        Credentials::new("secret").unwrap(),
        WebSocketDialer::default(),
        http,
    )
    .await
    .expect("authenticate");
    assert_eq!(client.session().account_id(), "42");
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
    assert_eq!(log.lock().unwrap()[0].headers[0].1, "Token secret");

    let (result, ()) = tokio::join!(client.send_message("ch1", "c1", "hi"), async {
        let req = service.next_request().await;
        assert_eq!(req["command"], "create_and_generate_turn");
        assert_eq!(req["origin_id"], "web-next");
        assert_eq!(req["payload"]["character_id"], "ch1");
        assert_eq!(req["payload"]["user_name"], "Ada");
        assert_eq!(req["payload"]["turn"]["turn_key"]["chat_id"], "c1");
        assert_eq!(req["payload"]["turn"]["author"]["author_id"], "42");
        assert_eq!(req["payload"]["turn"]["candidates"][0]["raw_content"], "hi");

        service.push(json!({ "command": "ping" }));
        service.push(json!({
            "command": "add_turn",
            "payload": { "turn": turn("c1", "t2", "cand1", "hello back", false) }
        }));
    });

    let turn = result.expect("send_message");
    assert_eq!(turn.primary_candidate_id, "cand1");
    assert_eq!(turn.primary_candidate().unwrap().text, "hello back");
    assert_eq!(client.connection_state(), ConnectionState::Connected);

    client.close().await.unwrap();
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_concurrent_operations_send_one_envelope_at_a_time() {
    let mut service = Service::spawn().await;
    let client = duplex_client(config(&service.url));
    let key = TurnKey::new("c1", "t1");

    let (first, second, ()) = tokio::join!(
        client.set_primary_candidate(&key, "a"),
        client.set_primary_candidate(&key, "b"),
        async {
            let req = service.next_request().await;
            assert_eq!(req["payload"]["candidate_id"], "a");
            assert!(
                service.quiet_for(Duration::from_millis(150)).await,
                "second envelope sent before the first operation finished"
            );
            service.push(json!({ "command": "ok" }));

            let req = service.next_request().await;
            assert_eq!(req["payload"]["candidate_id"], "b");
            service.push(json!({ "command": "ok" }));
        }
    );

    first.expect("first operation");
    second.expect("second operation");
}

#[tokio::test]
async fn test_pin_turn_reply_still_unpinned_returns_not_applied() {
    let mut service = Service::spawn().await;
    let client = duplex_client(config(&service.url));
    let key = TurnKey::new("c1", "t1");

    let (result, ()) = tokio::join!(client.pin_turn(&key), async {
        let req = service.next_request().await;
        assert_eq!(req["command"], "set_turn_pin");
        assert_eq!(req["payload"]["is_pinned"], true);
        service.push(json!({
            "command": "update_turn",
            "payload": { "turn": turn("c1", "t1", "cand1", "text", false) }
        }));
    });

    assert!(matches!(result, Err(ParleyError::NotApplied(_))));
}

#[tokio::test]
async fn test_server_error_frame_surfaces_comment() {
    let mut service = Service::spawn().await;
    let client = duplex_client(config(&service.url));
    let turn_ids = ["t1".to_string()];

    let (result, ()) = tokio::join!(client.delete_turns("c1", &turn_ids), async {
        service.next_request().await;
        service.push(json!({ "command": "neo_error", "comment": "turn not found" }));
    });

    assert!(matches!(
        result,
        Err(ParleyError::Server { ref message }) if message == "turn not found"
    ));
}

#[tokio::test]
async fn test_timeout_then_next_operation_discards_late_reply() {
    let mut service = Service::spawn().await;
    let client = duplex_client(
        ClientConfig::builder()
            .duplex_url(service.url.clone())
            .reply_timeout(Duration::from_millis(200))
            .build(),
    );

    let (first, ()) = tokio::join!(client.send_message("ch1", "c1", "hi"), async {
        service.next_request().await;
    });
    assert!(matches!(first, Err(ParleyError::Timeout { .. })));
    assert_eq!(client.connection_state(), ConnectionState::Connected);

    let (second, ()) = tokio::join!(client.send_message("ch1", "c1", "again"), async {
        let req = service.next_request().await;
        assert_eq!(req["payload"]["turn"]["candidates"][0]["raw_content"], "again");
        service.push(json!({
            "command": "add_turn",
            "payload": { "turn": turn("c1", "t2", "cand-late", "late", false) }
        }));
        service.push(json!({
            "command": "add_turn",
            "payload": { "turn": turn("c1", "t3", "cand-fresh", "fresh", false) }
        }));
    });

    let turn = second.expect("second operation");
    assert_eq!(turn.primary_candidate().unwrap().text, "fresh");
}

#[tokio::test]
async fn test_invalid_arguments_rejected_without_dialing() {
    let client = duplex_client(config("ws://127.0.0.1:9/ws/"));

    let empty_text = client.send_message("ch1", "c1", "  ").await;
    let no_turns = client.delete_turns("c1", &[]).await;
    let bad_key = client.unpin_turn(&TurnKey::new("c1", "")).await;

    assert!(matches!(empty_text, Err(ParleyError::Validation(_))));
    assert!(matches!(no_turns, Err(ParleyError::Validation(_))));
    assert!(matches!(bad_key, Err(ParleyError::Validation(_))));
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_unreachable_service_returns_connection_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws/", listener.local_addr().unwrap());
    drop(listener);
    let client = duplex_client(config(&url));

    let result = client.create_chat("ch1", false).await;

    assert!(matches!(result, Err(ParleyError::Connection(_))));
    assert_eq!(client.connection_state(), ConnectionState::Disconnected);
}

// =========================================================================
// Authentication
// =========================================================================

#[tokio::test]
async fn test_authenticate_rejected_token_returns_auth_failed() {
    let (http, _) = MockHttp::new(|_| reply(200, json!({ "detail": "Auth" })));

    let result = Client::authenticate(
        config("ws://127.0.0.1:9/ws/"),
        Credentials::new("stale").unwrap(),
        WebSocketDialer::default(),
        http,
    )
    .await;

    assert!(matches!(
        result,
        Err(ParleyError::Session(SessionError::AuthFailed(_)))
    ));
}

#[tokio::test]
async fn test_authenticate_server_outage_returns_profile_unavailable() {
    let (http, _) = MockHttp::new(|_| reply(503, json!({})));

    let result = Client::authenticate(
        config("ws://127.0.0.1:9/ws/"),
        Credentials::new("secret").unwrap(),
        WebSocketDialer::default(),
        http,
    )
    .await;

    assert!(matches!(
        result,
        Err(ParleyError::Session(SessionError::ProfileUnavailable(_)))
    ));
}

// =========================================================================
// REST helpers
// =========================================================================

#[tokio::test]
async fn test_archive_chat_error_envelopes_map_to_server_error() {
    let (client, log) = rest_client(|req| match req.url.as_str() {
        "http://neo.test/chat/c1/archive" => {
            reply(200, json!({ "status": "FAILED", "error": "not yours" }))
        }
        _ => reply(500, json!({})),
    });

    let refused = client.archive_chat("c1").await;
    let broken = client.unarchive_chat("c1").await;

    assert!(matches!(refused, Err(ParleyError::Server { ref message }) if message == "not yours"));
    assert!(matches!(broken, Err(ParleyError::Server { ref message }) if message == "HTTP 500"));

    let log = log.lock().unwrap();
    assert_eq!(log[0].method, Method::Patch);
    assert!(log[0]
        .headers
        .iter()
        .any(|(k, v)| k == "authorization" && v == "Token secret"));
    assert_eq!(log[1].url, "http://neo.test/chat/c1/unarchive");
}

#[tokio::test]
async fn test_fetch_all_messages_follows_tokens_until_empty() {
    let (client, log) = rest_client(|req| match req.url.as_str() {
        "http://neo.test/turns/c1/" => reply(
            200,
            json!({ "turns": [turn("c1", "t2", "x", "newer", false)], "meta": { "next_token": "a" } }),
        ),
        "http://neo.test/turns/c1/?next_token=a" => reply(
            200,
            json!({ "turns": [turn("c1", "t1", "y", "older", false)], "meta": { "next_token": "" } }),
        ),
        _ => reply(404, json!({})),
    });

    let turns = client.fetch_all_messages("c1").await.expect("fetch_all_messages");

    let ids: Vec<_> = turns.iter().map(|t| t.turn_key.turn_id.as_str()).collect();
    assert_eq!(ids, ["t2", "t1"]);
    assert_eq!(log.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_fetch_all_messages_encodes_opaque_token() {
    let (client, log) = rest_client(|req| match req.url.as_str() {
        "http://neo.test/turns/c1/" => reply(
            200,
            json!({ "turns": [turn("c1", "t2", "x", "newer", false)], "meta": { "next_token": "a+b/c=&d" } }),
        ),
        "http://neo.test/turns/c1/?next_token=a%2Bb%2Fc%3D%26d" => reply(
            200,
            json!({ "turns": [turn("c1", "t1", "y", "older", false)], "meta": {} }),
        ),
        _ => reply(404, json!({})),
    });

    let turns = client.fetch_all_messages("c1").await.expect("fetch_all_messages");

    assert_eq!(turns.len(), 2);
    assert_eq!(
        log.lock().unwrap()[1].url,
        "http://neo.test/turns/c1/?next_token=a%2Bb%2Fc%3D%26d"
    );
}

#[tokio::test]
async fn test_fetch_histories_encodes_character_id() {
    let (client, log) = rest_client(|_| reply(200, json!({ "chats": [] })));

    let chats = client.fetch_histories("a&b=c", 3).await.expect("fetch_histories");

    assert!(chats.is_empty());
    assert_eq!(
        log.lock().unwrap()[0].url,
        "http://neo.test/chats/?character_ids=a%26b%3Dc&num_preview_turns=3"
    );
}

#[tokio::test]
async fn test_fetch_histories_defaults_preview_and_decodes_chats() {
    let (client, log) = rest_client(|_| {
        reply(
            200,
            json!({ "chats": [{ "chat_id": "c1", "character_id": "ch1", "type": "TYPE_ONE_ON_ONE" }] }),
        )
    });

    let chats = client.fetch_histories("ch1", 0).await.expect("fetch_histories");

    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0].chat_type, "TYPE_ONE_ON_ONE");
    assert_eq!(
        log.lock().unwrap()[0].url,
        "http://neo.test/chats/?character_ids=ch1&num_preview_turns=2"
    );
}

#[tokio::test]
async fn test_copy_chat_posts_end_turn_and_returns_new_id() {
    let (client, log) = rest_client(|_| reply(200, json!({ "new_chat_id": "c2" })));

    let new_id = client.copy_chat("c1", "t9").await.expect("copy_chat");

    assert_eq!(new_id, "c2");
    let log = log.lock().unwrap();
    assert_eq!(log[0].method, Method::Post);
    let body: Value = serde_json::from_slice(log[0].body.as_deref().unwrap()).unwrap();
    assert_eq!(body, json!({ "end_turn_id": "t9" }));
    assert!(log[0]
        .headers
        .iter()
        .any(|(k, v)| k == "content-type" && v == "application/json"));
}

#[tokio::test]
async fn test_rate_candidate_out_of_range_rejected_before_request() {
    let (client, log) = rest_client(|_| reply(200, json!({})));

    let result = client.rate_candidate(&TurnKey::new("c1", "t1"), "cand1", 5).await;

    assert!(matches!(result, Err(ParleyError::Validation(_))));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_ping_reports_status_without_failing() {
    let (up, _) = rest_client(|_| HttpResponse { status: 200, body: b"pong".to_vec() });
    let (down, _) = rest_client(|_| reply(503, json!({})));

    assert!(up.ping().await.unwrap());
    assert!(!down.ping().await.unwrap());
}
