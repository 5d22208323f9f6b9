use std::future::Future;
use std::net::SocketAddr;

use axum::{
    extract::State,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{deregister_handler, heartbeat_handler, lookup_handler, register_handler};
use super::tracing::tracing_middleware;
use crate::registry::ServiceRegistry;

/// Gateway server configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Address to listen on.
    pub addr: SocketAddr,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 4214)),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// Live service instances.
    pub services: usize,
}

/// HTTP/JSON front end for a [`ServiceRegistry`].
pub struct GatewayServer {
    config: GatewayConfig,
    registry: ServiceRegistry,
}

impl GatewayServer {
    /// Create a new gateway server.
    pub fn new(config: GatewayConfig, registry: ServiceRegistry) -> Self {
        Self { config, registry }
    }

    /// Get the registry served by this gateway.
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Build the Axum router.
    pub fn router(&self) -> Router {
        router(self.registry.clone())
    }

    /// Get the socket address to bind to.
    pub fn addr(&self) -> SocketAddr {
        self.config.addr
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        let listener = TcpListener::bind(self.addr()).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), std::io::Error> {
        tracing::info!("Gateway server listening on {}", listener.local_addr()?);

        axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown)
        .await
    }
}

/// Build the registry routes around `registry`.
pub fn router(registry: ServiceRegistry) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/register", post(register_handler))
        .route("/deregister", post(deregister_handler))
        .route("/lookup", post(lookup_handler))
        .route("/heartbeat", post(heartbeat_handler))
        .with_state(registry)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(tracing_middleware)),
        )
}

/// Health check handler.
async fn health_handler(State(registry): State<ServiceRegistry>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services: registry.len(),
    })
}
