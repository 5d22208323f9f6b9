//! The lease-based service directory.
//!
//! [`ServiceRegistry`] composes an entry store (id and name indices behind one
//! lock) with one lease watcher task per entry.

mod lease;
mod service_registry;
mod store;

pub use lease::DEFAULT_LEASE_TIMEOUT;
pub use service_registry::ServiceRegistry;
