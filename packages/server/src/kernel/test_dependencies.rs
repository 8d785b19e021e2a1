// TestDependencies - mock implementations for testing
//
// Builds ServerDeps around the in-memory ticket store and a scripted host lookup.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{BaseHostLookup, LookupError, ServerDeps, StreamHub};
use crate::domains::tickets::models::Ticket;
use crate::domains::tickets::store::InMemoryTicketStore;

// =============================================================================
// Mock Host Lookup
// =============================================================================

/// Answers from a fixed table; unknown addresses fail with `LookupError::Empty`.
#[derive(Clone, Default)]
pub struct MockHostLookup {
    hosts: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockHostLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(self, ip: &str, host: &str) -> Self {
        self.hosts
            .lock()
            .unwrap()
            .insert(ip.to_string(), host.to_string());
        self
    }

    /// Addresses passed to `resolve`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BaseHostLookup for MockHostLookup {
    async fn resolve(&self, ip: &str) -> Result<String, LookupError> {
        self.calls.lock().unwrap().push(ip.to_string());
        self.hosts
            .lock()
            .unwrap()
            .get(ip)
            .cloned()
            .ok_or(LookupError::Empty)
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

pub struct TestDependencies {
    pub store: Arc<InMemoryTicketStore>,
    pub stream_hub: StreamHub,
    pub host_lookup: MockHostLookup,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            store: Arc::new(InMemoryTicketStore::new()),
            stream_hub: StreamHub::new(),
            host_lookup: MockHostLookup::new(),
        }
    }

    /// Start from tickets that already exist, e.g. numbering continues after them.
    pub fn with_tickets(tickets: Vec<Ticket>) -> Self {
        Self {
            store: Arc::new(InMemoryTicketStore::with_tickets(tickets)),
            ..Self::new()
        }
    }

    pub fn with_host_lookup(mut self, lookup: MockHostLookup) -> Self {
        self.host_lookup = lookup;
        self
    }

    pub fn server_deps(&self) -> ServerDeps {
        ServerDeps::new(
            self.store.clone(),
            self.stream_hub.clone(),
            Arc::new(self.host_lookup.clone()),
        )
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
