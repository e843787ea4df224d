//! Local proxy that puts the offline router in front of a browser
//!
//! Every request to the listener is routed exactly as the installed app
//! would route it. The dashboard posts control messages to
//! `/__filedash/control`, listens for router events on the
//! `/__filedash/events` websocket and can trigger a reinstall with
//! `POST /__filedash/install`.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{
        DefaultBodyLimit, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use colored::Colorize;
use tokio::net::TcpListener;
use tokio::sync::broadcast::{self, error::RecvError};
use url::Url;

use crate::cli::CommandContext;
use crate::cli::context::LiveRouter;
use crate::cli::fetch::describe;
use crate::error::{Error, Result};
use crate::fetch::{self, Request, RequestMode};
use crate::router::{ControlHandle, ControlMessage, Routed, RouterEvent};

/// Path the dashboard posts control messages to
pub const CONTROL_PATH: &str = "/__filedash/control";

/// Websocket path that streams router events to open pages
pub const EVENTS_PATH: &str = "/__filedash/events";

/// Path that reinstalls the precache manifest
pub const INSTALL_PATH: &str = "/__filedash/install";

/// Response header naming where the body came from
const SOURCE_HEADER: &str = "x-filedash-source";

/// Largest request body the proxy accepts (shared files included)
const MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

/// Hop-by-hop and framing headers that must not be forwarded
const SKIPPED_HEADERS: [&str; 5] = [
    "host",
    "connection",
    "content-length",
    "transfer-encoding",
    "accept-encoding",
];

#[derive(Clone)]
struct ServeState {
    router: Arc<LiveRouter>,
    control: ControlHandle,
    manifest: Arc<[Url]>,
}

/// Run `serve` until Ctrl+C
pub async fn run(ctx: &CommandContext, port: u16) -> Result<()> {
    let router = ctx.router()?;
    let (control, mailbox) = router.spawn_control();
    let origin = ctx.config.origin_url()?;
    let manifest: Arc<[Url]> = ctx.config.precache_urls()?.into();

    let app = Router::new()
        .route(CONTROL_PATH, post(control_message))
        .route(EVENTS_PATH, get(events_socket))
        .route(INSTALL_PATH, post(install_version))
        .fallback(route_request)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(ServeState {
            router,
            control,
            manifest,
        });

    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    let addr = listener.local_addr()?;
    log::info!("Serving {} on {}", origin, addr);
    println!(
        "{} Routing {} through http://{}",
        "✓".green(),
        origin.as_str().bold(),
        addr
    );
    println!("  Press Ctrl+C to stop");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Error::Other(format!("Server error: {}", e)))?;

    // The last handle went away with the app, so the mailbox drains and ends
    if let Err(e) = mailbox.await {
        log::warn!("Router mailbox task failed: {}", e);
    }
    println!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    log::info!("Received Ctrl+C, shutting down");
}

async fn control_message(
    State(state): State<ServeState>,
    Json(message): Json<ControlMessage>,
) -> impl IntoResponse {
    match state.control.send(message).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(e) => {
            log::warn!("Dropping control message: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

async fn install_version(State(state): State<ServeState>) -> impl IntoResponse {
    let report = state.router.install(&state.manifest, |_, _| {}).await;
    Json(report.to_json())
}

async fn events_socket(ws: WebSocketUpgrade, State(state): State<ServeState>) -> Response {
    let events = state.router.subscribe();
    ws.on_upgrade(move |socket| forward_events(socket, events))
}

async fn forward_events(mut socket: WebSocket, mut events: broadcast::Receiver<RouterEvent>) {
    log::debug!("Event listener connected");
    loop {
        tokio::select! {
            frame = next_event_frame(&mut events) => {
                let Some(frame) = frame else { break };
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    log::debug!("Event listener disconnected");
}

/// Wait for the next router event in its wire form.
///
/// Returns `None` once the router is gone. Events missed by a slow
/// listener are skipped.
async fn next_event_frame(events: &mut broadcast::Receiver<RouterEvent>) -> Option<String> {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(frame) => return Some(frame),
                Err(e) => log::warn!("Could not encode {:?}: {}", event, e),
            },
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Event listener fell behind, {} events skipped", skipped)
            }
            Err(RecvError::Closed) => return None,
        }
    }
}

async fn route_request(
    State(state): State<ServeState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match to_request(&state.router.rules().origin, &method, &uri, &headers, body) {
        Ok(request) => request,
        Err(e) => return (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    };

    log::debug!("{} {}", request.method, request.url);
    match state.router.handle(request).await {
        Ok(routed) => to_response(routed),
        Err(e) => {
            log::warn!("{} {} failed: {}", method, uri, e);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

/// Translate an incoming proxy request into a router request on `origin`
fn to_request(
    origin: &url::Url,
    method: &Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Request> {
    let target = uri.path_and_query().map_or("/", |pq| pq.as_str());
    let url = origin
        .join(target)
        .map_err(|e| Error::Other(format!("Invalid request target '{}': {}", target, e)))?;

    let mode = match headers.get("sec-fetch-mode").and_then(|v| v.to_str().ok()) {
        Some("navigate") => RequestMode::Navigate,
        _ => RequestMode::default(),
    };

    let forwarded = headers
        .iter()
        .filter(|(name, _)| !SKIPPED_HEADERS.contains(&name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();

    Ok(Request {
        method: method.clone(),
        url,
        headers: forwarded,
        body: body.to_vec(),
        mode,
    })
}

fn to_response(routed: Routed) -> Response {
    let fetch::Response {
        status,
        headers,
        body,
        ..
    } = routed.response;

    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;

    let out = response.headers_mut();
    for (name, value) in headers {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) else {
            continue;
        };
        if name == header::CONTENT_LENGTH || name == header::TRANSFER_ENCODING {
            continue;
        }
        out.append(name, value);
    }
    if let Ok(source) = HeaderValue::from_str(&describe(routed.source)) {
        out.insert(SOURCE_HEADER, source);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Source;

    fn origin() -> url::Url {
        url::Url::parse("https://files.example.com/").unwrap()
    }

    #[test]
    fn test_to_request_joins_origin_and_filters_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("localhost:4173"));
        headers.insert("accept", HeaderValue::from_static("text/html"));
        headers.insert("sec-fetch-mode", HeaderValue::from_static("navigate"));
        let uri: Uri = "/dashboard/files?page=2".parse().unwrap();

        let request = to_request(&origin(), &Method::GET, &uri, &headers, Bytes::new()).unwrap();

        assert_eq!(
            request.url.as_str(),
            "https://files.example.com/dashboard/files?page=2"
        );
        assert_eq!(request.mode, RequestMode::Navigate);
        assert_eq!(request.header("accept"), Some("text/html"));
        assert_eq!(request.header("host"), None);
        assert!(request.body.is_empty());
    }

    #[test]
    fn test_to_request_keeps_post_body() {
        let uri: Uri = "/dashboard/upload".parse().unwrap();
        let request = to_request(
            &origin(),
            &Method::POST,
            &uri,
            &HeaderMap::new(),
            Bytes::from_static(b"payload"),
        )
        .unwrap();

        assert_eq!(request.method, reqwest::Method::POST);
        assert_eq!(request.body, b"payload".to_vec());
        assert_eq!(request.mode, RequestMode::default());
    }

    #[test]
    fn test_to_response_marks_source() {
        let routed = Routed::new(
            fetch::Response::new("https://files.example.com/app.js", 200, "console.log(1)")
                .with_header("content-type", "text/javascript"),
            Source::Network,
        );

        let response = to_response(routed);
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/javascript");
        assert_eq!(response.headers()[SOURCE_HEADER], "network");
    }

    #[tokio::test]
    async fn test_install_reaches_event_listeners() {
        let (router, _fetcher, _dir) = crate::router::tests::test_router();
        let mut events = router.subscribe();

        let report = router.install(&[], |_, _| {}).await;
        assert_eq!(report.notified, 1);
        assert_eq!(report.to_json()["notified"], 1);

        let frame = next_event_frame(&mut events).await.unwrap();
        let wire: serde_json::Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(wire, serde_json::json!({"v": 1, "op": 0, "d": true}));
    }

    #[tokio::test]
    async fn test_event_frames_end_with_the_router() {
        let (router, _fetcher, _dir) = crate::router::tests::test_router();
        let mut events = router.subscribe();
        drop(router);

        assert_eq!(next_event_frame(&mut events).await, None);
    }

    #[test]
    fn test_to_response_invalid_status_becomes_bad_gateway() {
        let routed = Routed::new(
            fetch::Response::new("https://thumbs.example.com/a.png", 42, Vec::new()),
            Source::Network,
        );

        assert_eq!(to_response(routed).status(), StatusCode::BAD_GATEWAY);
    }
}
