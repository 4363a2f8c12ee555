//! `RelayServer`: Axum HTTP + `WebSocket` listener.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::registry::Registry;
use crate::websocket::transport::split_websocket;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live connections.
    pub registry: Arc<Registry>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus render handle.
    pub metrics: PrometheusHandle,
}

/// The relay server.
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<Registry>,
    shutdown: Arc<ShutdownCoordinator>,
    metrics: PrometheusHandle,
    start_time: Instant,
}

impl RelayServer {
    /// Create a new server with an empty registry.
    pub fn new(config: ServerConfig, metrics: PrometheusHandle) -> Self {
        let registry = Arc::new(Registry::new(config.relay.clone()));
        let shutdown = Arc::new(ShutdownCoordinator::new(Arc::clone(&registry)));
        Self {
            config,
            registry,
            shutdown,
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: self.registry.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        Router::new()
            .route(&self.config.ws_path, get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
    }

    /// Bind the listener and serve in a background task.
    ///
    /// Returns the bound address and the serve task's handle. The task ends
    /// once [`stop`](Self::stop) is called.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(%addr, path = %self.config.ws_path, "relay listening");
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, router)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server error");
            }
        });
        Ok((addr, handle))
    }

    /// Serve until [`stop`](Self::stop) is called.
    ///
    /// Fails if the listener cannot be bound.
    pub async fn start(&self) -> std::io::Result<()> {
        let (_, handle) = self.listen().await?;
        handle.await.map_err(std::io::Error::other)
    }

    /// Stop accepting sockets and close every registered connection.
    ///
    /// Returns once the closing pass completes. Use
    /// [`ShutdownCoordinator::graceful_shutdown`] to also wait for connection
    /// tasks and the serve task.
    pub async fn stop(&self) {
        let closed = self.shutdown.close_all().await;
        info!(closed, "relay stopped");
    }

    /// Get the connection registry.
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| onboard(socket, state))
}

async fn onboard(socket: WebSocket, state: AppState) {
    if state.shutdown.is_shutting_down() {
        warn!("rejecting socket during shutdown");
        return;
    }
    let (sink, stream) = split_websocket(socket);
    if let Err(e) = state.registry.accept(sink, stream).await {
        error!(error = %e, "failed to onboard connection");
    }
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.registry.connection_count(),
    ))
}

async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.render()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::detached_handle;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn make_server() -> RelayServer {
        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            ..ServerConfig::default()
        };
        RelayServer::new(config, detached_handle())
    }

    async fn get_body(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 100_000)
            .await
            .unwrap();
        (status, body.to_vec())
    }

    #[test]
    fn accessors() {
        let server = make_server();
        assert_eq!(server.config().host, "127.0.0.1");
        assert_eq!(server.registry().connection_count(), 0);
        assert!(!server.shutdown().is_shutting_down());
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let server = make_server();
        let (status, body) = get_body(server.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);

        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "ok");
        assert_eq!(parsed["connections"], 0);
        assert!(parsed.get("uptime_secs").is_some());
    }

    #[tokio::test]
    async fn metrics_endpoint_renders() {
        let server = make_server();
        let (status, _) = get_body(server.router(), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn ws_route_requires_upgrade() {
        let server = make_server();
        let (status, _) = get_body(server.router(), "/ws").await;
        assert!(status.is_client_error());
        assert_ne!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn ws_route_follows_config() {
        let config = ServerConfig {
            ws_path: "/relay".into(),
            ..ServerConfig::default()
        };
        let server = RelayServer::new(config, detached_handle());
        let (status, _) = get_body(server.router(), "/ws").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get_body(server.router(), "/relay").await;
        assert_ne!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let server = make_server();
        let (status, _) = get_body(server.router(), "/nonexistent").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listen_then_stop_ends_serve_task() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);

        server.stop().await;
        assert!(server.shutdown().is_shutting_down());
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn graceful_shutdown_with_live_connection() {
        use futures::StreamExt;

        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
            .await
            .unwrap();
        for _ in 0..100 {
            if server.registry().connection_count() == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(server.registry().connection_count(), 1);

        let report = server
            .shutdown()
            .graceful_shutdown(handle, Some(std::time::Duration::from_secs(5)))
            .await;
        assert_eq!(report.closed, 1);
        assert!(report.is_clean());
        while let Some(Ok(msg)) = ws.next().await {
            if msg.is_close() {
                break;
            }
        }
    }

    #[tokio::test]
    async fn listen_on_taken_port_fails() {
        let server = make_server();
        let (addr, _handle) = server.listen().await.unwrap();

        let config = ServerConfig {
            host: "127.0.0.1".into(),
            port: addr.port(),
            ..ServerConfig::default()
        };
        let second = RelayServer::new(config, detached_handle());
        assert!(second.start().await.is_err());
        server.stop().await;
    }
}
