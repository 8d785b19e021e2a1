// Infrastructure capability traits.
//
// These are INFRASTRUCTURE traits only - no business logic.
// Naming convention: Base* for trait names (e.g., BaseHostLookup)

use async_trait::async_trait;

use super::host_lookup::LookupError;

/// Resolves a client IPv4 address to a workstation host name.
#[async_trait]
pub trait BaseHostLookup: Send + Sync {
    async fn resolve(&self, ip: &str) -> Result<String, LookupError>;
}
