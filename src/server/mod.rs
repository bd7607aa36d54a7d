//! HTTP and WebSocket surface
//!
//! Serves the embedded console page, a health endpoint, and the `/ws` route
//! that owns the lifetime of each session: one socket, one session actor,
//! one outbound sender task. When the socket closes, the request channel
//! closes, and the session takes any running process down with it.

use crate::catalog::ClientRequest;
use crate::config::ServerConfig;
use crate::session::{ServerEvent, Session};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::HeaderMap,
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub mod geo;

/// Bind the configured address and serve until shutdown.
pub async fn run(config: ServerConfig) -> crate::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("network toolbox listening on http://{addr}");
    serve(listener, config).await
}

/// Serve on an already-bound listener. Split out so tests can bind port 0
/// and discover the address themselves.
pub async fn serve(listener: TcpListener, config: ServerConfig) -> crate::Result<()> {
    let app = router(config);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

pub fn router(config: ServerConfig) -> Router {
    Router::new()
        .route("/", get(console))
        .route("/ws", get(ws_handler))
        .route("/api/health", get(health))
        .layer(CorsLayer::permissive())
        .with_state(Arc::new(config))
}

async fn console() -> Html<&'static str> {
    Html(include_str!("console.html"))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
    }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(config): State<Arc<ServerConfig>>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let ip = client_ip(&headers, peer);
    ws.on_upgrade(move |socket| handle_socket(socket, config, ip))
        .into_response()
}

/// Proxy-aware client address: first `x-forwarded-for` entry if present,
/// else the peer address, with the IPv4-mapped prefix stripped either way.
fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty());

    let ip = match forwarded {
        Some(forwarded) => forwarded.to_string(),
        None => peer.ip().to_string(),
    };
    ip.strip_prefix("::ffff:").unwrap_or(&ip).to_string()
}

/// One WebSocket connection: one session actor, one sender task, one
/// fire-and-forget geolocation lookup.
async fn handle_socket(socket: WebSocket, config: Arc<ServerConfig>, ip: String) {
    let session_id = Uuid::new_v4();
    info!(%session_id, %ip, "client connected");

    let (mut sink, mut stream) = socket.split();
    let (event_tx, mut event_rx) = mpsc::channel::<ServerEvent>(256);
    let (request_tx, request_rx) = mpsc::channel::<ClientRequest>(32);

    // outbound: drain session events onto the socket
    let send_task = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            let payload = match serde_json::to_string(&event) {
                Ok(payload) => payload,
                Err(error) => {
                    warn!("failed to serialize event: {error}");
                    continue;
                }
            };
            if sink.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // independent of the session state machine: resolve the client's
    // approximate location once, degrade to unknown, never retry
    let geo_tx = event_tx.clone();
    let geo_ip = ip.clone();
    let geoip_enabled = config.geoip;
    tokio::spawn(async move {
        let location = if geoip_enabled {
            geo::lookup(&geo_ip).await
        } else {
            geo::UNKNOWN_LOCATION.to_string()
        };
        let _ = geo_tx
            .send(ServerEvent::ClientInfo {
                ip: geo_ip,
                location,
            })
            .await;
    });

    let session = Session::new(session_id, request_rx, event_tx.clone());
    let session_task = tokio::spawn(session.run());

    // inbound: parse frames into requests on this task
    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(frame)) => match serde_json::from_str::<ClientRequest>(&frame) {
                Ok(request) => {
                    if request_tx.send(request).await.is_err() {
                        break;
                    }
                }
                Err(error) => {
                    debug!(%session_id, "unparseable frame: {error}");
                    let _ = event_tx
                        .send(ServerEvent::Error {
                            message: format!("unrecognized request: {error}"),
                        })
                        .await;
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // binary and ping/pong frames are ignored
            Err(error) => {
                debug!(%session_id, "socket error: {error}");
                break;
            }
        }
    }

    // closing the request channel is the teardown signal; the session
    // terminates any active run before exiting
    drop(request_tx);
    drop(event_tx);
    let _ = session_task.await;
    send_task.abort();
    info!(%session_id, "client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "198.51.100.7:52100".parse().unwrap()
    }

    #[test]
    fn client_ip_prefers_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        assert_eq!(client_ip(&headers, peer()), "203.0.113.9");
    }

    #[test]
    fn client_ip_falls_back_to_peer_address() {
        assert_eq!(client_ip(&HeaderMap::new(), peer()), "198.51.100.7");
    }

    #[test]
    fn client_ip_strips_ipv4_mapped_prefix() {
        let peer: SocketAddr = "[::ffff:203.0.113.9]:52100".parse().unwrap();
        assert_eq!(client_ip(&HeaderMap::new(), peer), "203.0.113.9");
    }

    #[test]
    fn client_ip_ignores_empty_forwarded_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "  ".parse().unwrap());
        assert_eq!(client_ip(&HeaderMap::new(), peer()), "198.51.100.7");
        assert_eq!(client_ip(&headers, peer()), "198.51.100.7");
    }
}
