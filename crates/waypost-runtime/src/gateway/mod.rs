mod client_addr;
mod handlers;
mod response;
mod server;
mod tracing;

pub use client_addr::{default_address, ClientAddr};
pub use response::ApiError;
pub use server::{router, GatewayConfig, GatewayServer, HealthResponse};
pub use tracing::{tracing_middleware, TracingState, REQUEST_ID_HEADER};
