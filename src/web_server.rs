//! Web Server
//!
//! `GET /ws` upgrades to a listener session; every other path is served from
//! the frontend directory, falling back to the bootstrap page.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    http::HeaderMap,
    response::Response,
    routing::get,
    Router,
};
use futures_util::StreamExt;
use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};

use crate::gpio::PinSimulator;
use crate::messaging::InboundMessage;
use crate::session::{SessionRegistry, WsConnection};

/// Shared state passed to request handlers
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    /// Present only in simulated GPIO mode
    pub simulator: Option<Arc<PinSimulator>>,
}

impl AppState {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            simulator: None,
        }
    }

    pub fn with_simulator(mut self, simulator: Arc<PinSimulator>) -> Self {
        self.simulator = Some(simulator);
        self
    }
}

/// Build the application router
pub fn router(state: AppState, frontend_root: &Path, bootstrap_page: &Path) -> Router {
    let frontend = ServeDir::new(frontend_root).fallback(ServeFile::new(bootstrap_page));

    Router::new()
        .route("/ws", get(handle_websocket))
        .fallback_service(frontend)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve until the listener fails or the future is dropped
pub async fn serve(listener: TcpListener, app: Router) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{}", addr);
    }
    axum::serve(listener, app).await
}

async fn handle_websocket(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let key = headers
        .get("sec-websocket-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    ws.on_upgrade(move |socket| handle_socket(socket, key, state))
}

/// Register the socket as a session and drain its read half
async fn handle_socket(socket: WebSocket, key: String, state: AppState) {
    let (sink, mut stream) = socket.split();
    let connection = Arc::new(WsConnection::spawn(sink));
    let id = state.registry.create(key, connection);

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                handle_inbound(text.as_str(), state.simulator.as_deref()).await;
            }
            Ok(Message::Close(_)) => {
                debug!("Client closed connection, session={}", id);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket read failed, session={}: {}", id, e);
                break;
            }
        }
    }

    state.registry.close(id);
}

/// Route a client text frame. Only simulated mode accepts input.
pub async fn handle_inbound(text: &str, simulator: Option<&PinSimulator>) {
    let Some(simulator) = simulator else {
        debug!("Ignoring inbound message, simulated GPIO disabled");
        return;
    };

    match InboundMessage::decode(text) {
        Ok(InboundMessage::SimulatePin { pin }) if !pin.is_valid() => {
            warn!("Rejecting simulated pin, number={} value={}", pin.number, pin.value);
        }
        Ok(InboundMessage::SimulatePin { pin }) => {
            if let Err(e) = simulator.inject(pin).await {
                warn!("Unable to inject simulated pin, number={}: {}", pin.number, e);
            }
        }
        Err(e) => warn!("Unrecognized inbound message: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::{event_stream, Pin};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn frontend() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>ezbox</html>").unwrap();
        std::fs::write(dir.path().join("app.js"), "console.log('hi')").unwrap();
        dir
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_serves_frontend_files() {
        let dir = frontend();
        let state = AppState::new(Arc::new(SessionRegistry::new()));
        let app = router(state, dir.path(), &dir.path().join("index.html"));

        let (status, body) = get(app, "/app.js").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "console.log('hi')");
    }

    #[tokio::test]
    async fn test_unknown_path_falls_back_to_bootstrap_page() {
        let dir = frontend();
        let state = AppState::new(Arc::new(SessionRegistry::new()));
        let app = router(state, dir.path(), &dir.path().join("index.html"));

        let (status, body) = get(app, "/channels/3").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "<html>ezbox</html>");
    }

    #[tokio::test]
    async fn test_ws_requires_upgrade() {
        let dir = frontend();
        let registry = Arc::new(SessionRegistry::new());
        let app = router(AppState::new(registry.clone()), dir.path(), &dir.path().join("index.html"));

        let (status, _) = get(app, "/ws").await;
        assert!(status.is_client_error());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_inbound_simulate_pin_is_injected() {
        let (tx, mut rx) = event_stream();
        let simulator = PinSimulator::new(tx);

        handle_inbound(r#"{"type":"SimulatePin","pin":{"number":17,"value":1}}"#, Some(&simulator)).await;

        assert_eq!(rx.next().await, Some(Pin::new(17, 1)));
        assert_eq!(simulator.get(17).await, Some(Pin::new(17, 1)));
    }

    #[tokio::test]
    async fn test_inbound_invalid_input_is_dropped() {
        let (tx, _rx) = event_stream();
        let simulator = PinSimulator::new(tx);

        handle_inbound(r#"{"type":"SimulatePin","pin":{"number":17,"value":5}}"#, Some(&simulator)).await;
        handle_inbound("not json", Some(&simulator)).await;
        handle_inbound(r#"{"type":"SimulatePin","pin":{"number":4,"value":1}}"#, None).await;

        assert!(simulator.snapshot().await.is_empty());
    }
}
