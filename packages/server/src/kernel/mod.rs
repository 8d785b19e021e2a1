//! Kernel module - server infrastructure and dependencies.

pub mod deps;
pub mod host_lookup;
pub mod stream_hub;
pub mod test_dependencies;
pub mod traits;

pub use deps::ServerDeps;
pub use host_lookup::{
    capture_host, CommandHostLookup, DisabledHostLookup, HostCapture, LookupError, DEFAULT_HOST,
    INVALID_IP,
};
pub use stream_hub::StreamHub;
pub use test_dependencies::{MockHostLookup, TestDependencies};
pub use traits::*;
