//! Hosts tracked by a run and the registry that owns them.

mod host;
mod registry;

pub use host::{Host, HostId};
pub use registry::HostRegistry;
