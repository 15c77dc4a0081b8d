//! Tests for capture comparison

use super::*;
use crate::expectation::{ExpectRequest, ExpectResponse};
use crate::roundtrip::RedirectRequest;
use reqwest::header::HeaderValue;
use reqwest::Url;

fn request(path: &str) -> Request {
    Request::new(Url::parse(&format!("http://10.0.0.1{}", path)).unwrap())
}

fn echoed(path: &str) -> CapturedRequest {
    CapturedRequest {
        path: path.to_string(),
        host: "10.0.0.1".to_string(),
        method: "GET".to_string(),
        namespace: "gateway-conformance-infra".to_string(),
        pod: "infra-backend-v1-abc".to_string(),
        headers: [("X-Echo".to_string(), vec!["a".to_string(), "b".to_string()])].into(),
        ..Default::default()
    }
}

fn response(status: u16) -> CapturedResponse {
    let mut headers = HeaderMap::new();
    headers.append("content-encoding", HeaderValue::from_static("gzip"));
    headers.append("x-multi", HeaderValue::from_static("1"));
    headers.append("x-multi", HeaderValue::from_static("2"));
    CapturedResponse {
        status_code: status,
        headers,
        ..Default::default()
    }
}

fn expect_ok(path: &str) -> ExpectedResponse {
    ExpectedResponse {
        request: ExpectRequest {
            path: path.to_string(),
            ..Default::default()
        },
        response: ExpectResponse {
            status_code: 200,
            ..Default::default()
        },
        backend: "infra-backend-v1".to_string(),
        namespace: "gateway-conformance-infra".to_string(),
        ..Default::default()
    }
}

#[test]
fn test_matching_capture_passes() {
    let result = compare_request(&request("/"), &echoed("/"), &response(200), &expect_ok("/"));

    assert_eq!(result, Ok(()));
}

#[test]
fn test_status_mismatch() {
    let result = compare_request(&request("/"), &echoed("/"), &response(404), &expect_ok("/"));

    assert_eq!(
        result,
        Err(ExpectationError::StatusCode {
            expected: 200,
            actual: 404
        })
    );
}

#[test]
fn test_timeout_statuses_match_each_other() {
    let mut expected = expect_ok("/");
    expected.response.status_code = 504;

    let result = compare_request(&request("/"), &echoed("/"), &response(408), &expected);

    assert_eq!(result, Ok(()));
}

#[test]
fn test_path_mismatch() {
    let result = compare_request(
        &request("/"),
        &echoed("/other"),
        &response(200),
        &expect_ok("/"),
    );

    assert!(matches!(result, Err(ExpectationError::Path { .. })));
}

#[test]
fn test_expected_request_overrides_sent_request() {
    // ARRANGE: gateway rewrites /prefix/one to /one
    let mut expected = expect_ok("/prefix/one");
    expected.expected_request = Some(ExpectedRequest {
        request: ExpectRequest {
            path: "/one".to_string(),
            ..Default::default()
        },
        absent_headers: Vec::new(),
    });

    // ACT
    let result = compare_request(
        &request("/prefix/one"),
        &echoed("/one"),
        &response(200),
        &expected,
    );

    // ASSERT: backend saw the rewritten path
    assert_eq!(result, Ok(()));
}

#[test]
fn test_method_defaults_to_get() {
    let mut captured = echoed("/");
    captured.method = "POST".to_string();

    let result = compare_request(&request("/"), &captured, &response(200), &expect_ok("/"));

    assert_eq!(
        result,
        Err(ExpectationError::Method {
            expected: "GET".to_string(),
            actual: "POST".to_string()
        })
    );
}

#[test]
fn test_namespace_and_pod_checks() {
    let mut captured = echoed("/");
    captured.namespace = "other".to_string();
    let result = compare_request(&request("/"), &captured, &response(200), &expect_ok("/"));
    assert!(matches!(result, Err(ExpectationError::Namespace { .. })));

    let mut captured = echoed("/");
    captured.pod = "infra-backend-v2-xyz".to_string();
    let result = compare_request(&request("/"), &captured, &response(200), &expect_ok("/"));
    assert!(matches!(result, Err(ExpectationError::Pod { .. })));
}

#[test]
fn test_request_headers_compare_case_insensitively_and_joined() {
    let mut expected = expect_ok("/");
    expected.expected_request = Some(ExpectedRequest {
        request: ExpectRequest {
            path: "/".to_string(),
            headers: [("x-echo".to_string(), "a,b".to_string())].into(),
            ..Default::default()
        },
        absent_headers: vec!["X-Removed".to_string()],
    });

    let result = compare_request(&request("/"), &echoed("/"), &response(200), &expected);

    assert_eq!(result, Ok(()));
}

#[test]
fn test_absent_request_header_present() {
    let mut expected = expect_ok("/");
    expected.expected_request = Some(ExpectedRequest {
        request: ExpectRequest {
            path: "/".to_string(),
            ..Default::default()
        },
        absent_headers: vec!["x-echo".to_string()],
    });

    let result = compare_request(&request("/"), &echoed("/"), &response(200), &expected);

    assert!(matches!(result, Err(ExpectationError::HeaderPresent { .. })));
}

#[test]
fn test_missing_request_header() {
    let mut expected = expect_ok("/");
    expected.request.headers = [("x-missing".to_string(), "1".to_string())].into();

    let result = compare_request(&request("/"), &echoed("/"), &response(200), &expected);

    assert_eq!(
        result,
        Err(ExpectationError::HeaderMissing("x-missing".to_string()))
    );
}

#[test]
fn test_response_headers_empty_value_checks_presence_only() {
    let mut expected = expect_ok("/");
    expected.response.headers = [
        ("Content-Encoding".to_string(), String::new()),
        ("x-multi".to_string(), "1,2".to_string()),
    ]
    .into();

    let result = compare_request(&request("/"), &echoed("/"), &response(200), &expected);

    assert_eq!(result, Ok(()));
}

#[test]
fn test_response_header_value_mismatch() {
    let mut expected = expect_ok("/");
    expected.response.headers = [("content-encoding".to_string(), "br".to_string())].into();

    let result = compare_request(&request("/"), &echoed("/"), &response(200), &expected);

    assert_eq!(
        result,
        Err(ExpectationError::HeaderValue {
            name: "content-encoding".to_string(),
            expected: "br".to_string(),
            actual: "gzip".to_string(),
        })
    );
}

#[test]
fn test_absent_response_header_present() {
    let mut expected = expect_ok("/");
    expected.response.absent_headers = vec!["Content-Encoding".to_string()];

    let result = compare_request(&request("/"), &echoed("/"), &response(200), &expected);

    assert!(matches!(result, Err(ExpectationError::HeaderPresent { .. })));
}

fn redirect_response(status: u16, target: RedirectRequest) -> CapturedResponse {
    CapturedResponse {
        status_code: status,
        redirect_request: Some(target),
        ..Default::default()
    }
}

fn expect_redirect(status: u16, redirect: RedirectRequest) -> ExpectedResponse {
    ExpectedResponse {
        response: ExpectResponse {
            status_code: status,
            ..Default::default()
        },
        redirect_request: Some(redirect),
        ..Default::default()
    }
}

#[test]
fn test_redirect_defaults_to_request_scheme_and_path() {
    let captured = redirect_response(
        302,
        RedirectRequest {
            scheme: "http".to_string(),
            host: "example.org".to_string(),
            port: "80".to_string(),
            path: "/same".to_string(),
        },
    );

    let result = compare_request(
        &request("/same"),
        &CapturedRequest::default(),
        &captured,
        &expect_redirect(302, RedirectRequest::default()),
    );

    assert_eq!(result, Ok(()));
}

#[test]
fn test_redirect_unexpected_port_for_https() {
    // ARRANGE: https redirect to a non-default port, no port expected
    let captured = redirect_response(
        301,
        RedirectRequest {
            scheme: "https".to_string(),
            host: "example.org".to_string(),
            port: "8443".to_string(),
            path: "/".to_string(),
        },
    );
    let expected = expect_redirect(
        301,
        RedirectRequest {
            scheme: "https".to_string(),
            ..Default::default()
        },
    );

    // ACT
    let result = compare_request(&request("/"), &CapturedRequest::default(), &captured, &expected);

    // ASSERT: only 443 or no port passes
    assert!(matches!(result, Err(ExpectationError::RedirectPort { .. })));
}

#[test]
fn test_redirect_explicit_expectations() {
    // ARRANGE: everything matches except the host
    let captured = redirect_response(
        308,
        RedirectRequest {
            scheme: "https".to_string(),
            host: "example.org".to_string(),
            port: "8443".to_string(),
            path: "/new".to_string(),
        },
    );
    let expected = expect_redirect(
        308,
        RedirectRequest {
            scheme: "https".to_string(),
            host: "example.com".to_string(),
            port: "8443".to_string(),
            path: "/new".to_string(),
        },
    );

    // ACT
    let result = compare_request(&request("/"), &CapturedRequest::default(), &captured, &expected);

    // ASSERT
    assert_eq!(
        result,
        Err(ExpectationError::RedirectHost {
            expected: "example.com".to_string(),
            actual: "example.org".to_string(),
        })
    );
}

#[test]
fn test_redirect_without_expectation_passes() {
    let captured = response(302);
    let mut expected = expect_ok("/");
    expected.response.status_code = 302;

    let result = compare_request(&request("/"), &CapturedRequest::default(), &captured, &expected);

    assert_eq!(result, Ok(()));
}

#[test]
fn test_other_statuses_skip_backend_checks() {
    let mut expected = expect_ok("/");
    expected.response.status_code = 403;

    let result = compare_request(
        &request("/"),
        &CapturedRequest::default(),
        &response(403),
        &expected,
    );

    assert_eq!(result, Ok(()));
}
