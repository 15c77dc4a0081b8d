//! Echo backend
//!
//! Answers every request with JSON describing the request it received, the
//! shape the round tripper decodes into a `CapturedRequest`.
//!
//! Identity comes from the environment when run as a binary:
//! - `ECHO_PORT`: listen port (default 3000)
//! - `NAMESPACE`: reported namespace
//! - `POD_NAME`: reported pod name

use crate::roundtrip::decode::protocol_string;
use crate::roundtrip::CapturedRequest;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri, Version};
use axum::{Json, Router};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

pub const DEFAULT_ECHO_PORT: u16 = 3000;

/// Where the echo backend claims to run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EchoIdentity {
    pub namespace: String,
    pub pod: String,
}

impl EchoIdentity {
    /// Identity from `NAMESPACE` and `POD_NAME`, empty when unset
    pub fn from_env() -> Self {
        Self {
            namespace: std::env::var("NAMESPACE").unwrap_or_default(),
            pod: std::env::var("POD_NAME").unwrap_or_default(),
        }
    }
}

async fn echo(
    State(identity): State<EchoIdentity>,
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
) -> Json<CapturedRequest> {
    let host = headers
        .get(axum::http::header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_default();

    let mut echoed: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in &headers {
        echoed
            .entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    Json(CapturedRequest {
        path: uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string()),
        host,
        method: method.as_str().to_string(),
        protocol: protocol_string(version).to_string(),
        headers: echoed,
        namespace: identity.namespace,
        pod: identity.pod,
    })
}

/// Router answering any method on any path with echo metadata
pub fn echo_router(identity: EchoIdentity) -> Router {
    Router::new().fallback(echo).with_state(identity)
}

/// Serve the echo backend on an already bound listener
///
/// Runs until the server fails.
pub async fn serve_echo(listener: TcpListener, identity: EchoIdentity) -> Result<(), std::io::Error> {
    axum::serve(listener, echo_router(identity))
        .await
        .map_err(std::io::Error::other)
}

/// Run the echo backend on `port` across all interfaces
pub async fn run_echo_server(port: u16, identity: EchoIdentity) -> Result<(), std::io::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!(port = %port, namespace = %identity.namespace, pod = %identity.pod, "Echo server listening");

    serve_echo(listener, identity).await
}

#[cfg(test)]
#[path = "echo_test.rs"]
mod tests;
