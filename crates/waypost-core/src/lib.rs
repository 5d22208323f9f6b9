pub mod config;
pub mod error;
pub mod message;
pub mod service;

pub use config::WaypostConfig;
pub use error::{Result, WaypostError};
pub use service::{ServiceId, ServiceInfo};
