//! Process runtime: wires configuration, the registry and the HTTP gateway
//! together and handles graceful shutdown.

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use waypost_core::config::WaypostConfig;
use waypost_core::error::Result;
use waypost_runtime::gateway::{GatewayConfig, GatewayServer};
use waypost_runtime::registry::ServiceRegistry;

/// Prelude module for common imports.
pub mod prelude {
    pub use waypost_core::config::WaypostConfig;
    pub use waypost_core::error::{Result, WaypostError};
    pub use waypost_core::{ServiceId, ServiceInfo};
    pub use waypost_runtime::client::{ClientConfig, RegistryClient};
    pub use waypost_runtime::registry::ServiceRegistry;

    pub use crate::{Waypost, WaypostBuilder};
}

/// A configured registry server.
pub struct Waypost {
    config: WaypostConfig,
    registry: ServiceRegistry,
    shutdown_tx: broadcast::Sender<()>,
    shutdown_rx: broadcast::Receiver<()>,
}

impl Waypost {
    /// Create a new builder.
    pub fn builder() -> WaypostBuilder {
        WaypostBuilder::new()
    }

    /// Get the configuration.
    pub fn config(&self) -> &WaypostConfig {
        &self.config
    }

    /// Get the registry this server exposes.
    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn run(self) -> Result<()> {
        let addr = self.config.server.bind_addr()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until Ctrl-C or [`Waypost::shutdown`].
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        tracing::info!("waypost starting");

        self.registry
            .set_timeout(self.config.registry.lease_timeout());

        let gateway = GatewayServer::new(
            GatewayConfig {
                addr: listener.local_addr()?,
            },
            self.registry.clone(),
        );

        let mut shutdown_rx = self.shutdown_rx;
        let signal = async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received shutdown signal");
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Received shutdown notification");
                }
            }
        };

        tracing::info!(
            lease_timeout = ?self.registry.timeout(),
            "Service registry ready"
        );

        gateway.serve(listener, signal).await?;

        let dropped = self.registry.shutdown();
        tracing::info!(services = dropped, "waypost stopped");
        Ok(())
    }

    /// Get a handle that stops a running server.
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Request shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Builder for configuring the runtime.
pub struct WaypostBuilder {
    config: Option<WaypostConfig>,
    registry: Option<ServiceRegistry>,
}

impl WaypostBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: None,
            registry: None,
        }
    }

    /// Set the configuration. Defaults are used when unset.
    pub fn config(mut self, config: WaypostConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Serve an existing registry instead of a fresh one.
    pub fn registry(mut self, registry: ServiceRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the runtime.
    pub fn build(self) -> Result<Waypost> {
        let config = self.config.unwrap_or_default();
        config.server.bind_addr()?;
        config.registry.validate()?;

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        Ok(Waypost {
            registry: self
                .registry
                .unwrap_or_else(|| ServiceRegistry::with_timeout(config.registry.lease_timeout())),
            config,
            shutdown_tx,
            shutdown_rx,
        })
    }
}

impl Default for WaypostBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_builder_defaults() {
        let waypost = WaypostBuilder::new().build().unwrap();
        assert_eq!(waypost.config().server.port, 4214);
        assert_eq!(waypost.registry().timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_builder_rejects_bad_bind_address() {
        let mut config = WaypostConfig::default();
        config.server.host = "not an address".to_string();
        assert!(Waypost::builder().config(config).build().is_err());
    }

    #[test]
    fn test_builder_rejects_zero_lease_timeout() {
        let mut config = WaypostConfig::default();
        config.registry.lease_timeout_secs = 0;
        let err = Waypost::builder().config(config).build().err().unwrap();
        assert!(matches!(err, waypost_core::WaypostError::Config(_)));
    }

    #[test]
    fn test_builder_uses_configured_timeout() {
        let mut config = WaypostConfig::default();
        config.registry.lease_timeout_secs = 7;
        let waypost = Waypost::builder().config(config).build().unwrap();
        assert_eq!(waypost.registry().timeout(), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_serve_and_shutdown_clears_registry() {
        let registry = ServiceRegistry::new();
        let waypost = Waypost::builder()
            .registry(registry.clone())
            .build()
            .unwrap();
        let stop = waypost.shutdown_handle();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = tokio::spawn(waypost.serve(listener));

        registry.register("svc", "http://a:1");
        assert_eq!(registry.len(), 1);

        stop.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(registry.is_empty());
    }
}
