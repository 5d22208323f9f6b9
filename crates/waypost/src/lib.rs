//! waypost - a lease-based service directory.
//!
//! Services register a name and address, keep their entry alive with
//! heartbeats, and resolve other services by name.

mod runtime;

pub use waypost_core;
pub use waypost_runtime;

pub use runtime::prelude;
pub use runtime::{Waypost, WaypostBuilder};
