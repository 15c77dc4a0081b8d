//! Response decoding
//!
//! Turns a raw response into the captured request/response pair. Bodies
//! declared as gzip are inflated before anything looks at them. Bodies
//! declared as JSON must parse as echo metadata; anything else yields a
//! capture holding only the method that was sent.

use super::{is_redirect, CapturedRequest, CapturedResponse, RedirectRequest};
use flate2::read::MultiGzDecoder;
use percent_encoding::percent_decode_str;
use reqwest::header::{HeaderMap, CONTENT_ENCODING, CONTENT_TYPE, LOCATION};
use reqwest::{Method, Url, Version};
use std::io::Read;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to decompress gzip body: {0}")]
    Gzip(#[source] std::io::Error),

    #[error("unexpected error reading response: {0}")]
    Json(#[source] serde_json::Error),

    #[error("redirect response {0} has no Location header")]
    MissingLocation(u16),

    #[error("invalid Location header {location:?}: {reason}")]
    InvalidLocation { location: String, reason: String },
}

/// Everything the decoder needs from a finished HTTP exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub version: Version,
    pub headers: HeaderMap,
    pub content_length: Option<u64>,
    /// URL of the request that produced this response; relative redirects resolve against it
    pub url: Url,
    pub peer_certificates: Vec<Vec<u8>>,
    /// Body as received, before content decoding
    pub body: Vec<u8>,
}

/// Decode `raw` into captures, given the `method` the request was sent with
///
/// # Errors
/// * `Gzip` - body declared gzip but did not inflate
/// * `Json` - body declared JSON but did not parse
/// * `MissingLocation` / `InvalidLocation` - redirect status without a usable target
pub fn decode_response(
    method: &Method,
    raw: RawResponse,
) -> Result<(CapturedRequest, CapturedResponse), DecodeError> {
    let body = if is_gzip(&raw.headers) {
        gunzip(&raw.body)?
    } else {
        raw.body
    };

    let captured_request = if is_json(&raw.headers) {
        serde_json::from_slice(&body).map_err(DecodeError::Json)?
    } else {
        // Not an echo backend: assume it received what was sent
        CapturedRequest {
            method: method.as_str().to_string(),
            ..Default::default()
        }
    };

    let redirect_request = if is_redirect(raw.status) {
        Some(redirect_target(raw.status, &raw.headers, &raw.url)?)
    } else {
        None
    };

    let captured_response = CapturedResponse {
        status_code: raw.status,
        content_length: raw.content_length,
        protocol: protocol_string(raw.version).to_string(),
        headers: raw.headers,
        peer_certificates: raw.peer_certificates,
        redirect_request,
    };

    Ok((captured_request, captured_response))
}

/// Protocol version as `HTTP/<major>.<minor>`
pub fn protocol_string(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

fn first_value<'a>(headers: &'a HeaderMap, name: reqwest::header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

fn is_gzip(headers: &HeaderMap) -> bool {
    first_value(headers, CONTENT_ENCODING).is_some_and(|v| v.eq_ignore_ascii_case("gzip"))
}

// Compares the media type only, so `application/json; charset=utf-8` still counts
fn is_json(headers: &HeaderMap) -> bool {
    first_value(headers, CONTENT_TYPE)
        .map(|v| v.split(';').next().unwrap_or_default().trim())
        .is_some_and(|essence| essence.eq_ignore_ascii_case("application/json"))
}

fn gunzip(body: &[u8]) -> Result<Vec<u8>, DecodeError> {
    // Concatenated members are one stream, not trailing garbage
    let mut decoder = MultiGzDecoder::new(body);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(DecodeError::Gzip)?;
    Ok(decompressed)
}

fn redirect_target(
    status: u16,
    headers: &HeaderMap,
    base: &Url,
) -> Result<RedirectRequest, DecodeError> {
    let location = headers
        .get(LOCATION)
        .ok_or(DecodeError::MissingLocation(status))?;
    let location = location
        .to_str()
        .map_err(|e| DecodeError::InvalidLocation {
            location: String::from_utf8_lossy(location.as_bytes()).into_owned(),
            reason: e.to_string(),
        })?;

    let target = base
        .join(location)
        .map_err(|e| DecodeError::InvalidLocation {
            location: location.to_string(),
            reason: e.to_string(),
        })?;

    let host = target
        .host_str()
        .unwrap_or_default()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();

    // Url drops a scheme default port, so an explicit one is read from the header itself
    let port = location_authority(location)
        .and_then(explicit_port)
        .map(str::to_string)
        .or_else(|| target.port().map(|p| p.to_string()))
        .unwrap_or_default();

    Ok(RedirectRequest {
        scheme: target.scheme().to_string(),
        host,
        port,
        path: percent_decode_str(target.path())
            .decode_utf8_lossy()
            .into_owned(),
    })
}

/// Authority of an absolute or scheme-relative Location, without userinfo
fn location_authority(location: &str) -> Option<&str> {
    let rest = match location.find("://") {
        Some(i)
            if i > 0
                && location[..i]
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) =>
        {
            &location[i + 3..]
        }
        _ => location.strip_prefix("//")?,
    };
    let end = rest
        .find(|c: char| matches!(c, '/' | '?' | '#'))
        .unwrap_or(rest.len());
    let authority = &rest[..end];
    Some(authority.rsplit_once('@').map_or(authority, |(_, host)| host))
}

fn explicit_port(authority: &str) -> Option<&str> {
    // Colons inside an IPv6 literal are not a port separator
    let host_end = authority.rfind(']').map_or(0, |i| i + 1);
    authority[host_end..]
        .rsplit_once(':')
        .map(|(_, port)| port)
        .filter(|port| !port.is_empty())
}

#[cfg(test)]
#[path = "decode_test.rs"]
mod tests;
