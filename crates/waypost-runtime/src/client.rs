//! Client for services that register themselves with a waypost server.
//!
//! After [`RegistryClient::register`] succeeds the client keeps the lease alive
//! with a background heartbeat loop until [`RegistryClient::deregister`] is
//! called or the client is dropped.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use waypost_core::message::{
    DeregisterRequest, DeregisterResponse, HeartbeatRequest, HeartbeatResponse, LookupRequest,
    LookupResponse, RegisterRequest, RegisterResponse,
};
use waypost_core::{Result, WaypostError};

/// Registry client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the waypost server, e.g. `http://localhost:4214`.
    pub server_url: String,
    /// Interval between heartbeats. Keep it well under the server's lease.
    pub heartbeat_interval: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:4214".to_string(),
            // Two-thirds of the server's default 30s lease.
            heartbeat_interval: Duration::from_secs(20),
            request_timeout: Duration::from_secs(10),
        }
    }
}

struct Registration {
    id: String,
    shutdown: CancellationToken,
    heartbeat: JoinHandle<()>,
}

/// Registers one service instance and keeps its lease alive.
pub struct RegistryClient {
    http: reqwest::Client,
    config: ClientConfig,
    name: String,
    address: Option<String>,
    registration: Mutex<Option<Registration>>,
}

impl RegistryClient {
    /// Create a client for the service `name` reachable at `address`.
    ///
    /// With no address the server records the caller's origin instead.
    pub fn new(
        config: ClientConfig,
        name: impl Into<String>,
        address: Option<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| WaypostError::Http(e.to_string()))?;

        Ok(Self {
            http,
            config,
            name: name.into(),
            address,
            registration: Mutex::new(None),
        })
    }

    /// The id assigned by the server, if registered.
    pub async fn id(&self) -> Option<String> {
        self.registration.lock().await.as_ref().map(|r| r.id.clone())
    }

    pub async fn is_registered(&self) -> bool {
        self.registration.lock().await.is_some()
    }

    /// Register with the server and start heartbeating. Returns the new id.
    pub async fn register(&self) -> Result<String> {
        let mut registration = self.registration.lock().await;
        if registration.is_some() {
            return Err(WaypostError::InvalidState(
                "client is already registered".to_string(),
            ));
        }

        let request = RegisterRequest {
            name: self.name.clone(),
            address: self.address.clone(),
            port: None,
        };
        let response: RegisterResponse = post(&self.http, &self.url("/register"), &request).await?;
        if !response.success {
            return Err(WaypostError::Http("server refused registration".to_string()));
        }

        tracing::info!(service_id = %response.id, name = %self.name, "Registered with waypost");

        let shutdown = CancellationToken::new();
        let heartbeat = tokio::spawn(heartbeat_loop(
            self.http.clone(),
            self.url("/heartbeat"),
            response.id.clone(),
            self.config.heartbeat_interval,
            shutdown.clone(),
        ));

        *registration = Some(Registration {
            id: response.id.clone(),
            shutdown,
            heartbeat,
        });

        Ok(response.id)
    }

    /// Stop heartbeating and remove the registration from the server.
    ///
    /// Returns whether the server still knew the id.
    pub async fn deregister(&self) -> Result<bool> {
        let registration = self
            .registration
            .lock()
            .await
            .take()
            .ok_or_else(|| WaypostError::InvalidState("client is not registered".to_string()))?;

        registration.shutdown.cancel();
        if let Err(e) = registration.heartbeat.await {
            tracing::warn!("Heartbeat task ended abnormally: {}", e);
        }

        let request = DeregisterRequest {
            id: registration.id.clone(),
        };
        let response: DeregisterResponse =
            post(&self.http, &self.url("/deregister"), &request).await?;

        tracing::info!(service_id = %registration.id, success = response.success, "Deregistered from waypost");
        Ok(response.success)
    }

    /// Send one heartbeat now. Returns whether the server still knew the id.
    pub async fn heartbeat(&self) -> Result<bool> {
        let id = self
            .id()
            .await
            .ok_or_else(|| WaypostError::InvalidState("client is not registered".to_string()))?;
        send_heartbeat(&self.http, &self.url("/heartbeat"), &id).await
    }

    /// Resolve a service name to one live address.
    pub async fn lookup(&self, name: &str) -> Result<Option<String>> {
        let request = LookupRequest {
            name: name.to_string(),
        };
        let response: LookupResponse = post(&self.http, &self.url("/lookup"), &request).await?;
        Ok(response.success.then_some(response.address))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.server_url.trim_end_matches('/'), path)
    }
}

impl Drop for RegistryClient {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.get_mut().take() {
            registration.shutdown.cancel();
        }
    }
}

async fn heartbeat_loop(
    http: reqwest::Client,
    url: String,
    id: String,
    interval: Duration,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                tracing::debug!(service_id = %id, "Heartbeat loop shutting down");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                match send_heartbeat(&http, &url, &id).await {
                    Ok(true) => {}
                    Ok(false) => {
                        tracing::warn!(service_id = %id, "Server no longer knows this registration");
                    }
                    Err(e) => {
                        tracing::warn!(service_id = %id, "Failed to send heartbeat: {}", e);
                    }
                }
            }
        }
    }
}

async fn send_heartbeat(http: &reqwest::Client, url: &str, id: &str) -> Result<bool> {
    let request = HeartbeatRequest { id: id.to_string() };
    let response: HeartbeatResponse = post(http, url, &request).await?;
    Ok(response.success)
}

async fn post<Req, Resp>(http: &reqwest::Client, url: &str, body: &Req) -> Result<Resp>
where
    Req: Serialize + ?Sized,
    Resp: DeserializeOwned,
{
    let response = http
        .post(url)
        .json(body)
        .send()
        .await
        .map_err(|e| WaypostError::Http(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(WaypostError::Http(format!("{} returned {}", url, status)));
    }

    response
        .json::<Resp>()
        .await
        .map_err(|e| WaypostError::Serialization(e.to_string()))
}
