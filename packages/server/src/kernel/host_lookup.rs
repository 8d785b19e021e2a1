//! Hostname lookup for the ticket capture form.
//!
//! The actual network scan is an external program (configured through
//! `HOST_LOOKUP_COMMAND`). The lookup never fails the request: callers go
//! through [`capture_host`], which turns every failure into a placeholder.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use super::traits::BaseHostLookup;

/// Host name reported when the caller's address is not IPv4.
pub const INVALID_IP: &str = "INVALID_IP";

/// Host name reported when the lookup itself fails.
pub const DEFAULT_HOST: &str = "DEFAULT";

/// Token replaced by the client IP inside command arguments.
const IP_PLACEHOLDER: &str = "{ip}";

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("Host lookup is not configured")]
    Disabled,

    #[error("Failed to run lookup command: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Lookup command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Lookup command exited with {0}")]
    Failed(String),

    #[error("Lookup command returned no host name")]
    Empty,
}

/// Runs an external program and reads the host name from its stdout.
///
/// Arguments containing `{ip}` get the address substituted; if none does, the
/// address is appended as the last argument.
#[derive(Debug, Clone)]
pub struct CommandHostLookup {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandHostLookup {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Parse a whitespace-separated command line. `None` if it is blank.
    pub fn from_command_line(line: &str, timeout: Duration) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect(), timeout))
    }

    fn args_for(&self, ip: &str) -> Vec<String> {
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(IP_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(IP_PLACEHOLDER, ip)
                } else {
                    arg.clone()
                }
            })
            .collect();
        if !substituted {
            args.push(ip.to_string());
        }
        args
    }
}

#[async_trait]
impl BaseHostLookup for CommandHostLookup {
    async fn resolve(&self, ip: &str) -> Result<String, LookupError> {
        let args = self.args_for(ip);
        debug!(program = %self.program, ?args, "Running host lookup");

        let output = Command::new(&self.program)
            .args(&args)
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(self.timeout, output)
            .await
            .map_err(|_| LookupError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(LookupError::Failed(output.status.to_string()));
        }

        let host = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if host.is_empty() {
            return Err(LookupError::Empty);
        }
        Ok(host)
    }
}

/// Used when no lookup command is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledHostLookup;

#[async_trait]
impl BaseHostLookup for DisabledHostLookup {
    async fn resolve(&self, _ip: &str) -> Result<String, LookupError> {
        Err(LookupError::Disabled)
    }
}

/// Response body of the capture endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostCapture {
    pub ip: String,
    pub host_name: String,
}

/// Normalize a raw client address to IPv4.
///
/// Takes the first entry of a forwarded list and strips the IPv4-mapped IPv6
/// prefix (`::ffff:`).
pub fn normalize_client_ip(raw: &str) -> Option<Ipv4Addr> {
    let first = raw.split(',').next()?.trim();
    let candidate = first.strip_prefix("::ffff:").unwrap_or(first);
    candidate.parse().ok()
}

/// Resolve the host for a client address, substituting placeholders on failure.
pub async fn capture_host(lookup: &dyn BaseHostLookup, raw_ip: &str) -> HostCapture {
    let Some(ip) = normalize_client_ip(raw_ip) else {
        let ip = raw_ip.trim();
        debug!(ip, "Client address is not IPv4");
        return HostCapture {
            ip: ip.strip_prefix("::ffff:").unwrap_or(ip).to_string(),
            host_name: INVALID_IP.to_string(),
        };
    };

    let ip = ip.to_string();
    let host_name = match lookup.resolve(&ip).await {
        Ok(host) => host,
        Err(LookupError::Disabled) => DEFAULT_HOST.to_string(),
        Err(e) => {
            warn!(ip = %ip, error = %e, "Host lookup failed");
            DEFAULT_HOST.to_string()
        }
    };

    HostCapture { ip, host_name }
}
