//! Server dependencies shared by actions and routes.
//!
//! Storage and external capabilities sit behind traits so tests can swap in
//! the in-memory store and mock lookups.

use std::sync::Arc;

use crate::domains::tickets::store::TicketStore;
use crate::kernel::{stream_hub::StreamHub, BaseHostLookup};

#[derive(Clone)]
pub struct ServerDeps {
    pub store: Arc<dyn TicketStore>,
    /// In-process pub/sub hub for real-time streaming to SSE endpoints
    pub stream_hub: StreamHub,
    pub host_lookup: Arc<dyn BaseHostLookup>,
}

impl ServerDeps {
    pub fn new(
        store: Arc<dyn TicketStore>,
        stream_hub: StreamHub,
        host_lookup: Arc<dyn BaseHostLookup>,
    ) -> Self {
        Self {
            store,
            stream_hub,
            host_lookup,
        }
    }
}
