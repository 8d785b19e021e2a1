use axum::{extract::Extension, Json};

use crate::kernel::{capture_host, HostCapture};
use crate::server::app::AppState;
use crate::server::middleware::ClientIp;

/// Report the caller's IPv4 address and workstation name for the ticket form.
///
/// Always answers 200; lookup problems show up as placeholder host names.
pub async fn capture_handler(
    Extension(state): Extension<AppState>,
    client_ip: Option<Extension<ClientIp>>,
) -> Json<HostCapture> {
    let raw = client_ip.map(|Extension(ClientIp(ip))| ip).unwrap_or_default();
    Json(capture_host(state.deps.host_lookup.as_ref(), &raw).await)
}
