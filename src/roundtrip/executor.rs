//! Round trip execution
//!
//! One call, one freshly built client, one deadline. Failures are returned
//! as they come; nothing here retries.

use super::decode::{decode_response, RawResponse};
use super::dump::{dump_request, dump_response, format_dump, DiagnosticSink, TracingSink};
use super::transport::{select_transport, Transport, TransportError};
use super::{CapturedRequest, CapturedResponse, Request, RoundTripError, RoundTripper};
use crate::config::TimeoutConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, HOST};
use reqwest::tls::TlsInfo;
use reqwest::Url;
use std::net::SocketAddr;
use tracing::debug;

/// The round tripper used unless a scenario brings its own
#[derive(Debug, Clone, Default)]
pub struct DefaultRoundTripper {
    /// Dump every request and response to the diagnostic sink
    pub debug: bool,
    pub timeout_config: TimeoutConfig,
}

impl DefaultRoundTripper {
    pub fn new(timeout_config: TimeoutConfig, debug: bool) -> Self {
        Self {
            debug,
            timeout_config,
        }
    }

    async fn round_trip(
        &self,
        request: &Request,
        transport: Transport,
        sink: &dyn DiagnosticSink,
    ) -> Result<(CapturedRequest, CapturedResponse), RoundTripError> {
        // With a TLS server name, dial the URL host but speak to the server name
        let (url, dial_addrs, host) = match transport.server_name() {
            Some(server_name) if request.url.host_str() != Some(server_name) => {
                let dial_addrs = resolve(&request.url).await?;
                let mut url = request.url.clone();
                url.set_host(Some(server_name))
                    .map_err(|e| TransportError::InvalidServerName {
                        server_name: server_name.to_string(),
                        reason: e.to_string(),
                    })?;
                let host = request
                    .host
                    .clone()
                    .or_else(|| Some(request.url.authority().to_string()));
                (url, dial_addrs, host)
            }
            _ => (request.url.clone(), Vec::new(), request.host.clone()),
        };

        let client = transport.into_client(
            self.timeout_config.request_timeout,
            request.unfollow_redirect,
            &dial_addrs,
        )?;

        let mut http_request = client.request(request.method.clone(), url).build()?;

        if let Some(host) = host.filter(|h| !h.is_empty()) {
            http_request
                .headers_mut()
                .insert(HOST, header_value(HOST.as_str(), &host)?);
        }

        for (name, values) in &request.headers {
            let Some(value) = values.first() else {
                continue;
            };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                TransportError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                }
            })?;
            http_request
                .headers_mut()
                .insert(header_name, header_value(name, value)?);
        }

        if self.debug {
            sink.record(&format!(
                "Sending Request:\n{}\n\n",
                format_dump(&dump_request(&http_request), "< ")
            ));
        }

        let response = client.execute(http_request).await?;

        let peer_certificates = response
            .extensions()
            .get::<TlsInfo>()
            .and_then(TlsInfo::peer_certificate)
            .map(|der| vec![der.to_vec()])
            .unwrap_or_default();
        let status = response.status().as_u16();
        let version = response.version();
        let headers = response.headers().clone();
        let content_length = response.content_length();
        let response_url = response.url().clone();
        let body = response.bytes().await?.to_vec();

        let raw = RawResponse {
            status,
            version,
            headers,
            content_length,
            url: response_url,
            peer_certificates,
            body,
        };

        if self.debug {
            sink.record(&format!(
                "Received Response:\n{}\n\n",
                format_dump(&dump_response(&raw), "< ")
            ));
        }

        debug!(
            method = %request.method,
            url = %request.url,
            status = status,
            "Round trip complete"
        );

        Ok(decode_response(&request.method, raw)?)
    }
}

#[async_trait]
impl RoundTripper for DefaultRoundTripper {
    async fn capture_round_trip(
        &self,
        request: &Request,
        sink: Option<&dyn DiagnosticSink>,
    ) -> Result<(CapturedRequest, CapturedResponse), RoundTripError> {
        let transport = select_transport(request)?;
        self.round_trip(request, transport, sink.unwrap_or(&TracingSink))
            .await
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, TransportError> {
    HeaderValue::from_str(value).map_err(|e| TransportError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

async fn resolve(url: &Url) -> Result<Vec<SocketAddr>, RoundTripError> {
    let host = url
        .host_str()
        .unwrap_or_default()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_string();
    let port = url.port_or_known_default().unwrap_or(443);

    let addrs = tokio::net::lookup_host((host.as_str(), port))
        .await
        .map_err(|source| RoundTripError::Resolve {
            host: host.clone(),
            source,
        })?;
    Ok(addrs.collect())
}
