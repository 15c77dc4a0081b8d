//! Expected responses and eventual consistency
//!
//! Scenarios describe what they send and what they expect back as an
//! [`ExpectedResponse`]. This module turns that into a round trip request,
//! compares the captures against it, and retries until the gateway has
//! converged on the expected behaviour.

mod compare;
mod converge;

pub use compare::compare_request;
pub use converge::{await_convergence, make_request_and_expect_eventually_consistent_response};

use crate::roundtrip::{Protocol, RedirectRequest, Request};
use reqwest::{Method, Url};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpectationError {
    #[error("invalid request URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid method {0:?}")]
    InvalidMethod(String),

    #[error("expected status code to be {expected}, got {actual}")]
    StatusCode { expected: u16, actual: u16 },

    #[error("expected host to be {expected}, got {actual}")]
    Host { expected: String, actual: String },

    #[error("expected path to be {expected}, got {actual}")]
    Path { expected: String, actual: String },

    #[error("expected method to be {expected}, got {actual}")]
    Method { expected: String, actual: String },

    #[error("expected namespace to be {expected}, got {actual}")]
    Namespace { expected: String, actual: String },

    #[error("no headers captured, expected {0}")]
    NoHeaders(usize),

    #[error("expected {0} header to be set")]
    HeaderMissing(String),

    #[error("expected {name} header to be set to {expected}, got {actual}")]
    HeaderValue {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("expected {name} header to not be set, got {actual}")]
    HeaderPresent { name: String, actual: String },

    #[error("expected pod name to start with {expected}, got {actual}")]
    Pod { expected: String, actual: String },

    #[error("redirect status {0} captured without a redirect target")]
    MissingRedirect(u16),

    #[error("expected redirected hostname to be {expected:?}, got {actual:?}")]
    RedirectHost { expected: String, actual: String },

    #[error("expected redirected port to be {expected}, got {actual:?}")]
    RedirectPort { expected: String, actual: String },

    #[error("expected redirected scheme to be {expected:?}, got {actual:?}")]
    RedirectScheme { expected: String, actual: String },

    #[error("expected redirected path to be {expected:?}, got {actual:?}")]
    RedirectPath { expected: String, actual: String },

    #[error("timed out after {elapsed_secs}s waiting for {required} consecutive successes")]
    NotConverged { elapsed_secs: u64, required: u32 },
}

/// What a scenario sends through the gateway
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectRequest {
    pub host: String,
    /// Empty means GET
    pub method: String,
    /// Path, optionally with a query string
    pub path: String,
    pub headers: BTreeMap<String, String>,
    pub protocol: Protocol,
    pub unfollow_redirect: bool,
}

/// What the backend should see after the gateway is done with the request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedRequest {
    pub request: ExpectRequest,
    /// Headers that must not reach the backend
    pub absent_headers: Vec<String>,
}

/// What the client should get back
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectResponse {
    pub status_code: u16,
    /// Expected values, comma joined when repeated; empty means "present, any value"
    pub headers: BTreeMap<String, String>,
    pub absent_headers: Vec<String>,
}

/// One request and everything a scenario expects to observe about it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpectedResponse {
    pub request: ExpectRequest,
    /// Defaults to `request` when not set
    pub expected_request: Option<ExpectedRequest>,
    pub response: ExpectResponse,
    pub redirect_request: Option<RedirectRequest>,
    /// Prefix of the pod name that must serve the request
    pub backend: String,
    pub namespace: String,
}

/// Build the round trip request for `expected` against gateway `gw_addr`
///
/// `gw_addr` is `host:port` and `scheme` is `http` or `https`.
pub fn make_request(
    expected: &ExpectedResponse,
    gw_addr: &str,
    scheme: &str,
) -> Result<Request, ExpectationError> {
    let raw = format!("{}://{}{}", scheme, gw_addr, expected.request.path);
    let url = Url::parse(&raw).map_err(|e| ExpectationError::InvalidUrl {
        url: raw.clone(),
        reason: e.to_string(),
    })?;

    let method = if expected.request.method.is_empty() {
        Method::GET
    } else {
        Method::from_bytes(expected.request.method.as_bytes())
            .map_err(|_| ExpectationError::InvalidMethod(expected.request.method.clone()))?
    };

    let mut request = Request::new(url)
        .with_method(method)
        .with_protocol(expected.request.protocol);

    if !expected.request.host.is_empty() {
        request = request.with_host(expected.request.host.clone());
    }
    for (name, value) in &expected.request.headers {
        request = request.with_header(name.clone(), value.clone());
    }
    if expected.request.unfollow_redirect {
        request = request.unfollow_redirect();
    }

    Ok(request)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
