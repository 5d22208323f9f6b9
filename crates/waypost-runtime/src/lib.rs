pub mod client;
pub mod gateway;
pub mod registry;

pub use client::{ClientConfig, RegistryClient};
pub use gateway::{ApiError, GatewayConfig, GatewayServer, HealthResponse};
pub use registry::{ServiceRegistry, DEFAULT_LEASE_TIMEOUT};
