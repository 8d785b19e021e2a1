// Helpdesk - API Core
//
// Backend for IT-support tickets: creation, assignment, resolution and a live
// change feed for dashboards.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
