mod entry;

pub use entry::{ServiceId, ServiceInfo};
