//! HTTP request handlers.

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Html;
use axum::Json;
use futures::Stream;
use serde::de::DeserializeOwned;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, info, instrument, warn};

use radio_ipc::{
    AnswerResponse, CurrentGenre, GenreChanged, GenreRequest, Notification, NotifyAccepted,
    RelayStats, SessionDescription,
};
use radio_engine::Relay;
use radio_transport::SessionId;

use crate::error::ApiError;
use crate::AppState;

const INDEX_HTML: &str = include_str!("../static/index.html");

fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    Ok(serde_json::from_slice(body)?)
}

/// Serve the browser client.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Answer any non-CORS OPTIONS request.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

/// Negotiate a new playback session.
#[instrument(name = "http_offer", skip_all)]
pub async fn offer(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<AnswerResponse>, ApiError> {
    let offer: SessionDescription = parse_json(&body)?;
    debug!(sdp_len = offer.sdp.len(), "Offer received");

    let session = state.relay.negotiate(offer).await?;
    info!(session_id = %session.id, "Answer sent");

    Ok(Json(AnswerResponse {
        sdp_type: "answer".to_string(),
        sdp: session.answer.sdp,
        session_id: session.id.to_string(),
    }))
}

/// Change the current genre.
#[instrument(name = "http_set_genre", skip_all)]
pub async fn set_genre(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<GenreChanged>, ApiError> {
    let request: GenreRequest = parse_json(&body)?;
    state.relay.set_genre(&request.genre).await?;

    Ok(Json(GenreChanged {
        status: "success".to_string(),
        genre: request.genre,
    }))
}

/// Report the current genre.
pub async fn current_genre(State(state): State<AppState>) -> Json<CurrentGenre> {
    Json(CurrentGenre {
        genre: state.relay.genre(),
    })
}

/// Detaches an event stream from the hub once its response is dropped.
struct Subscription {
    relay: Arc<Relay>,
    id: SessionId,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.relay.unsubscribe(self.id) {
            debug!(subscriber = %self.id, "Event stream closed");
        }
    }
}

/// Stream notifications as server-sent events.
pub async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (id, rx) = state.relay.subscribe();
    debug!(subscriber = %id, "Event stream opened");
    let subscription = Subscription {
        relay: Arc::clone(&state.relay),
        id,
    };

    let stream = ReceiverStream::new(rx).filter_map(move |message| {
        let _subscription = &subscription;
        match Event::default().json_data(&message) {
            Ok(event) => Some(Ok::<_, Infallible>(
                event.event(message.notification.kind()),
            )),
            Err(e) => {
                warn!("Failed to serialize notification: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Publish a notification to every event stream.
#[instrument(name = "http_notify", skip_all)]
pub async fn notify(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<NotifyAccepted>, ApiError> {
    let notification: Notification = parse_json(&body)?;
    let report = state.relay.notify(notification);

    Ok(Json(NotifyAccepted {
        status: "success".to_string(),
        delivered: report.delivered,
    }))
}

/// Report relay counters.
pub async fn stats(State(state): State<AppState>) -> Json<RelayStats> {
    Json(state.relay.stats())
}

/// Tear down a session.
#[instrument(name = "http_close_session", skip_all)]
pub async fn close_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id: SessionId = id
        .parse()
        .map_err(|_| ApiError::NotFound(format!("Session not found: {id}")))?;

    state.relay.close_session(id)?;
    info!(session_id = %id, "Session closed by client");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{header, Method, Request, Response};
    use axum::Router;
    use radio_engine::Relay;
    use radio_ipc::RelayConfig;
    use tower::ServiceExt;

    use crate::router;

    struct Harness {
        _dir: tempfile::TempDir,
        relay: Arc<Relay>,
        app: Router,
        signal_path: std::path::PathBuf,
    }

    fn harness_with(signal_path: impl Fn(&std::path::Path) -> std::path::PathBuf) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let signal_path = signal_path(dir.path());
        let config = RelayConfig {
            pipe_path: dir.path().join("audio_pipe").display().to_string(),
            signal_path: signal_path.display().to_string(),
            ice_servers: Vec::new(),
            reconnect_delay_ms: 10,
            ..RelayConfig::default()
        };
        let relay = Relay::start(config).unwrap();
        let app = router(Arc::clone(&relay));
        Harness {
            _dir: dir,
            relay,
            app,
            signal_path,
        }
    }

    fn harness() -> Harness {
        harness_with(|dir| dir.join("genre_request.txt"))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: &str) -> Response<Body> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        app.clone().oneshot(request).await.unwrap()
    }

    async fn json(response: Response<Body>) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_set_and_get_genre() {
        let h = harness();

        let response = send(&h.app, Method::POST, "/genre", r#"{"genre":"jazz"}"#).await;
        assert_eq!(response.status(), 200);
        let body = json(response).await;
        assert_eq!(body["status"], "success");
        assert_eq!(body["genre"], "jazz");

        let response = send(&h.app, Method::GET, "/current-genre", "").await;
        assert_eq!(json(response).await["genre"], "jazz");
        assert_eq!(
            std::fs::read_to_string(&h.signal_path).unwrap(),
            "SMOOTH:jazz"
        );

        h.relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_genre_is_rejected() {
        let h = harness();

        for body in ["not json", r#"{"name":"jazz"}"#, r#"{"genre":7}"#, ""] {
            let response = send(&h.app, Method::POST, "/genre", body).await;
            assert_eq!(response.status(), 400, "body {body:?}");
        }

        assert_eq!(h.relay.genre(), "lofi hip hop");
        assert!(!h.signal_path.exists());

        h.relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_signal_write_failure_is_server_error() {
        let h = harness_with(|dir| dir.join("missing").join("genre_request.txt"));

        let response = send(&h.app, Method::POST, "/genre", r#"{"genre":"jazz"}"#).await;

        assert_eq!(response.status(), 500);
        assert!(json(response).await["error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to change genre"));

        h.relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let h = harness();

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/offer")
            .header(header::ORIGIN, "http://example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();
        let response = h.app.clone().oneshot(request).await.unwrap();

        assert_eq!(response.status(), 200);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());

        h.relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_bare_options_is_ok() {
        let h = harness();

        let response = send(&h.app, Method::OPTIONS, "/genre", "").await;
        assert_eq!(response.status(), 200);

        h.relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_cross_origin_response_headers() {
        let h = harness();

        let request = Request::builder()
            .uri("/current-genre")
            .header(header::ORIGIN, "http://example.com")
            .body(Body::empty())
            .unwrap();
        let response = h.app.clone().oneshot(request).await.unwrap();

        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );

        h.relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_malformed_offer_is_client_error() {
        let h = harness();

        let response = send(&h.app, Method::POST, "/offer", "{}").await;
        assert_eq!(response.status(), 400);

        let response = send(
            &h.app,
            Method::POST,
            "/offer",
            r#"{"type":"offer","sdp":"garbage"}"#,
        )
        .await;
        assert_eq!(response.status(), 400);
        assert_eq!(h.relay.stats().active_sessions, 0);

        h.relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_negotiation_is_server_error() {
        let h = harness();
        // Parses as SDP but carries no DTLS fingerprint.
        let sdp = [
            "v=0",
            "o=- 4215775240449105457 2 IN IP4 127.0.0.1",
            "s=-",
            "t=0 0",
            "a=group:BUNDLE 0",
            "m=audio 9 UDP/TLS/RTP/SAVPF 111",
            "c=IN IP4 0.0.0.0",
            "a=ice-ufrag:Fh3k",
            "a=ice-pwd:p0T8s2KqL9xVwZ4mN7rB1cYd",
            "a=setup:actpass",
            "a=mid:0",
            "a=recvonly",
            "a=rtcp-mux",
            "a=rtpmap:111 opus/48000/2",
            "",
        ]
        .join("\r\n");
        let body = serde_json::json!({ "type": "offer", "sdp": sdp }).to_string();

        let response = send(&h.app, Method::POST, "/offer", &body).await;

        assert_eq!(response.status(), 500);
        assert!(json(response).await["error"].is_string());
        let stats = h.relay.stats();
        assert_eq!(stats.active_sessions, 0);
        assert_eq!(stats.sessions_opened, 0);
        assert_eq!(stats.sessions_closed, 1);

        h.relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_index_page() {
        let h = harness();

        let response = send(&h.app, Method::GET, "/", "").await;
        assert_eq!(response.status(), 200);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html"));

        h.relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_notify_reaches_subscribers() {
        let h = harness();
        let (_id, mut rx) = h.relay.subscribe();

        let response = send(
            &h.app,
            Method::POST,
            "/notify",
            r#"{"type":"host_speech","script_text":"Hello listeners"}"#,
        )
        .await;
        assert_eq!(response.status(), 200);
        assert_eq!(json(response).await["delivered"], 1);
        assert_eq!(rx.try_recv().unwrap().notification.kind(), "host_speech");

        let response = send(&h.app, Method::POST, "/notify", r#"{"type":"unknown"}"#).await;
        assert_eq!(response.status(), 400);

        h.relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_event_stream_detaches_when_dropped() {
        let h = harness();
        let notification = r#"{"type":"virtual_comment","text":"nice track"}"#;

        let stream = send(&h.app, Method::GET, "/events", "").await;
        assert_eq!(stream.status(), 200);
        assert!(stream.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream"));

        let response = send(&h.app, Method::POST, "/notify", notification).await;
        assert_eq!(json(response).await["delivered"], 1);

        drop(stream);
        let response = send(&h.app, Method::POST, "/notify", notification).await;
        assert_eq!(json(response).await["delivered"], 0);

        h.relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_close_unknown_session() {
        let h = harness();

        let response = send(&h.app, Method::DELETE, "/session/s-404", "").await;
        assert_eq!(response.status(), 404);

        let response = send(&h.app, Method::DELETE, "/session/nonsense", "").await;
        assert_eq!(response.status(), 404);

        h.relay.shutdown().await;
    }

    #[tokio::test]
    async fn test_stats() {
        let h = harness();

        let response = send(&h.app, Method::GET, "/stats", "").await;
        assert_eq!(response.status(), 200);
        let body = json(response).await;
        assert_eq!(body["genre"], "lofi hip hop");
        assert_eq!(body["active_sessions"], 0);

        h.relay.shutdown().await;
    }
}
