//! Compare captures against an expectation

use super::{ExpectationError, ExpectedRequest, ExpectedResponse};
use crate::roundtrip::{is_redirect, is_timeout_error, CapturedRequest, CapturedResponse, Request};
use reqwest::header::HeaderMap;
use std::collections::BTreeMap;
use tracing::info;

/// Check one round trip against `expected`
///
/// Timeout statuses (408/504) match each other. Backend-side checks only
/// apply to 200 responses; redirect checks only to redirect statuses.
pub fn compare_request(
    request: &Request,
    captured_request: &CapturedRequest,
    captured_response: &CapturedResponse,
    expected: &ExpectedResponse,
) -> Result<(), ExpectationError> {
    let status = captured_response.status_code;

    if is_timeout_error(status) && is_timeout_error(expected.response.status_code) {
        return Ok(());
    }
    if expected.response.status_code != status {
        return Err(ExpectationError::StatusCode {
            expected: expected.response.status_code,
            actual: status,
        });
    }

    if status == 200 {
        compare_backend(captured_request, captured_response, expected)
    } else if is_redirect(status) {
        compare_redirect(request, captured_response, expected)
    } else {
        Ok(())
    }
}

fn compare_backend(
    captured_request: &CapturedRequest,
    captured_response: &CapturedResponse,
    expected: &ExpectedResponse,
) -> Result<(), ExpectationError> {
    // Unless told otherwise, the backend should see what was sent
    let expected_request = expected
        .expected_request
        .clone()
        .unwrap_or_else(|| ExpectedRequest {
            request: expected.request.clone(),
            absent_headers: Vec::new(),
        });
    let expected_method = if expected_request.request.method.is_empty() {
        "GET"
    } else {
        expected_request.request.method.as_str()
    };

    if !expected_request.request.host.is_empty()
        && expected_request.request.host != captured_request.host
    {
        return Err(ExpectationError::Host {
            expected: expected_request.request.host.clone(),
            actual: captured_request.host.clone(),
        });
    }
    if expected_request.request.path != captured_request.path {
        return Err(ExpectationError::Path {
            expected: expected_request.request.path.clone(),
            actual: captured_request.path.clone(),
        });
    }
    if expected_method != captured_request.method {
        return Err(ExpectationError::Method {
            expected: expected_method.to_string(),
            actual: captured_request.method.clone(),
        });
    }
    if expected.namespace != captured_request.namespace {
        return Err(ExpectationError::Namespace {
            expected: expected.namespace.clone(),
            actual: captured_request.namespace.clone(),
        });
    }

    let request_headers = lowercase_keys(&captured_request.headers);

    if !expected_request.request.headers.is_empty() {
        if captured_request.headers.is_empty() {
            return Err(ExpectationError::NoHeaders(
                expected_request.request.headers.len(),
            ));
        }
        for (name, expected_value) in &expected_request.request.headers {
            let actual = request_headers
                .get(&name.to_lowercase())
                .ok_or_else(|| ExpectationError::HeaderMissing(name.clone()))?;
            if actual != expected_value {
                return Err(ExpectationError::HeaderValue {
                    name: name.clone(),
                    expected: expected_value.clone(),
                    actual: actual.clone(),
                });
            }
        }
    }

    if !expected.response.headers.is_empty() {
        if captured_response.headers.is_empty() {
            return Err(ExpectationError::NoHeaders(expected.response.headers.len()));
        }
        for (name, expected_value) in &expected.response.headers {
            let actual = joined(&captured_response.headers, name)
                .ok_or_else(|| ExpectationError::HeaderMissing(name.clone()))?;
            // Empty expectation only checks presence
            if !expected_value.is_empty() && &actual != expected_value {
                return Err(ExpectationError::HeaderValue {
                    name: name.clone(),
                    expected: expected_value.clone(),
                    actual,
                });
            }
        }
    }

    for name in &expected.response.absent_headers {
        if let Some(actual) = joined(&captured_response.headers, name) {
            return Err(ExpectationError::HeaderPresent {
                name: name.clone(),
                actual,
            });
        }
    }

    for name in &expected_request.absent_headers {
        if let Some(actual) = request_headers.get(&name.to_lowercase()) {
            return Err(ExpectationError::HeaderPresent {
                name: name.clone(),
                actual: actual.clone(),
            });
        }
    }

    if !captured_request.pod.starts_with(&expected.backend) {
        return Err(ExpectationError::Pod {
            expected: expected.backend.clone(),
            actual: captured_request.pod.clone(),
        });
    }

    Ok(())
}

fn compare_redirect(
    request: &Request,
    captured_response: &CapturedResponse,
    expected: &ExpectedResponse,
) -> Result<(), ExpectationError> {
    let Some(expected_redirect) = &expected.redirect_request else {
        return Ok(());
    };
    let actual = captured_response
        .redirect_request
        .as_ref()
        .ok_or(ExpectationError::MissingRedirect(captured_response.status_code))?;

    // Unset expectations default to what the gateway could not have changed
    let expected_host = or_default(&expected_redirect.host, &actual.host);
    let expected_scheme = or_default(&expected_redirect.scheme, request.url.scheme());
    let expected_path = or_default(&expected_redirect.path, request.url.path());

    if expected_host != actual.host {
        return Err(ExpectationError::RedirectHost {
            expected: expected_host.to_string(),
            actual: actual.host.clone(),
        });
    }

    let scheme = actual.scheme.to_lowercase();
    if expected_redirect.port.is_empty() {
        // Well known schemes may leave the port out
        let default_port = match scheme.as_str() {
            "http" => Some("80"),
            "https" => Some("443"),
            _ => None,
        };
        match default_port {
            Some(port) if !actual.port.is_empty() && actual.port != port => {
                return Err(ExpectationError::RedirectPort {
                    expected: format!("{} or not set", port),
                    actual: actual.port.clone(),
                });
            }
            Some(_) => {}
            None => info!(scheme = %actual.scheme, "Can't validate redirect port for unrecognized scheme"),
        }
    } else if expected_redirect.port != actual.port {
        return Err(ExpectationError::RedirectPort {
            expected: format!("{:?}", expected_redirect.port),
            actual: actual.port.clone(),
        });
    }

    if expected_scheme != actual.scheme {
        return Err(ExpectationError::RedirectScheme {
            expected: expected_scheme.to_string(),
            actual: actual.scheme.clone(),
        });
    }
    if expected_path != actual.path {
        return Err(ExpectationError::RedirectPath {
            expected: expected_path.to_string(),
            actual: actual.path.clone(),
        });
    }

    Ok(())
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.is_empty() {
        default
    } else {
        value
    }
}

fn lowercase_keys(headers: &BTreeMap<String, Vec<String>>) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, values)| (name.to_lowercase(), values.join(",")))
        .collect()
}

fn joined(headers: &HeaderMap, name: &str) -> Option<String> {
    let values: Vec<String> = headers
        .get_all(name.to_lowercase().as_str())
        .iter()
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(","))
    }
}

#[cfg(test)]
#[path = "compare_test.rs"]
mod tests;
