//! Captured HTTP round trips
//!
//! A round trip issues exactly one request through a transport chosen per
//! request and returns what the backend saw ([`CapturedRequest`]) alongside
//! what the client saw ([`CapturedResponse`]).
//!
//! - [`transport`] - pick plain HTTP, mutual TLS, or h2c prior knowledge
//! - [`executor`] - run the call under a deadline
//! - [`decode`] - turn the raw response into captures
//! - [`dump`] - optional request/response dumps for debugging

pub mod decode;
pub mod dump;
pub mod executor;
pub mod transport;

pub use decode::{decode_response, DecodeError, RawResponse};
pub use dump::{DiagnosticSink, TracingSink};
pub use executor::DefaultRoundTripper;
pub use transport::{select_transport, Transport, TransportError};

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode, Url};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Wire protocol requested for a round trip
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protocol {
    /// Whatever the client negotiates (HTTP/1.1, or HTTP/2 over ALPN)
    #[default]
    Default,
    /// HTTP/2 over cleartext TCP without upgrade or ALPN
    H2cPriorKnowledge,
}

/// Client certificate material for mutual TLS
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TlsMaterial {
    /// Expected server name, used for SNI and certificate verification
    pub server_name: String,
    pub cert_pem: Vec<u8>,
    pub key_pem: Vec<u8>,
}

/// One HTTP call to make through the gateway
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    /// Virtual host sent in the Host header when it differs from the dial target
    pub host: Option<String>,
    /// Only the first value of each header is sent
    pub headers: BTreeMap<String, Vec<String>>,
    pub protocol: Protocol,
    pub tls: Option<TlsMaterial>,
    pub unfollow_redirect: bool,
}

impl Request {
    /// GET request for `url` with no headers, TLS, or host override
    pub fn new(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            host: None,
            headers: BTreeMap::new(),
            protocol: Protocol::Default,
            tls: None,
            unfollow_redirect: false,
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), vec![value.into()]);
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_tls(mut self, tls: TlsMaterial) -> Self {
        self.tls = Some(tls);
        self
    }

    pub fn unfollow_redirect(mut self) -> Self {
        self.unfollow_redirect = true;
        self
    }
}

/// The request as the echo backend reported receiving it
///
/// When the response is not JSON only `method` is filled in, with the method
/// that was sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapturedRequest {
    pub path: String,
    pub host: String,
    pub method: String,
    #[serde(rename = "proto")]
    pub protocol: String,
    #[serde(deserialize_with = "null_as_default")]
    pub headers: BTreeMap<String, Vec<String>>,
    pub namespace: String,
    pub pod: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Target of a redirect, split out of the resolved `Location` header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectRequest {
    pub scheme: String,
    pub host: String,
    /// Empty when the location carries no explicit (non-default) port
    pub port: String,
    pub path: String,
}

/// The response as the client saw it
#[derive(Debug, Clone, Default)]
pub struct CapturedResponse {
    pub status_code: u16,
    pub content_length: Option<u64>,
    /// Protocol version, e.g. `HTTP/1.1` or `HTTP/2.0`
    pub protocol: String,
    pub headers: HeaderMap,
    /// DER encoded certificates presented by the server
    pub peer_certificates: Vec<Vec<u8>>,
    pub redirect_request: Option<RedirectRequest>,
}

/// Errors from a single round trip
///
/// Network and timeout failures come through untouched in `Http`.
#[derive(Debug, Error)]
pub enum RoundTripError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("failed to resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl RoundTripError {
    /// True when the call hit its deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, RoundTripError::Http(e) if e.is_timeout())
    }
}

/// Makes requests within conformance tests
///
/// Implementations may be swapped for scenarios that need a different client.
#[async_trait]
pub trait RoundTripper: Send + Sync {
    /// Issue `request` and capture both sides of the exchange
    ///
    /// HTTP error statuses are not errors; they come back in the captured
    /// response.
    async fn capture_round_trip(
        &self,
        request: &Request,
        sink: Option<&dyn DiagnosticSink>,
    ) -> Result<(CapturedRequest, CapturedResponse), RoundTripError>;
}

/// Returns true if `status` is one of the redirect codes
///
/// The set is closed: 300-308 without 306.
pub fn is_redirect(status: u16) -> bool {
    matches!(status, 300..=305 | 307 | 308)
}

/// Returns true if `status` reports a timeout (408 or 504)
pub fn is_timeout_error(status: u16) -> bool {
    status == StatusCode::REQUEST_TIMEOUT.as_u16() || status == StatusCode::GATEWAY_TIMEOUT.as_u16()
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
