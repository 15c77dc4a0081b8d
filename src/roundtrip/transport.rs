//! Transport selection
//!
//! Picks how a request goes on the wire. Selection only inspects the request
//! and parses certificate material; no connection is made here.

use super::{Protocol, Request, TlsMaterial};
use reqwest::redirect::Policy;
use reqwest::{Certificate, Client, ClientBuilder, Identity};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Contradictory or unusable request configuration
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request has configured cert and key but h2 prior knowledge is not encrypted")]
    TlsWithH2cPriorKnowledge,

    #[error("server name required for TLS")]
    MissingServerName,

    #[error("invalid server name {server_name:?}: {reason}")]
    InvalidServerName { server_name: String, reason: String },

    #[error("invalid client certificate: {0}")]
    InvalidCertificate(#[source] reqwest::Error),

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
}

/// How a single round trip reaches the server
pub enum Transport {
    /// HTTP/1.1 (or ALPN negotiated HTTP/2 for https) with keep-alive disabled
    Plain,
    /// Client certificate auth, trusting only the supplied certificates
    MutualTls {
        server_name: String,
        identity: Identity,
        roots: Vec<Certificate>,
    },
    /// HTTP/2 straight over TCP, no upgrade or ALPN
    H2cPriorKnowledge,
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Plain => f.write_str("Plain"),
            Transport::MutualTls { server_name, .. } => f
                .debug_struct("MutualTls")
                .field("server_name", server_name)
                .finish_non_exhaustive(),
            Transport::H2cPriorKnowledge => f.write_str("H2cPriorKnowledge"),
        }
    }
}

/// Choose the transport for `request`
///
/// # Errors
/// * `TlsWithH2cPriorKnowledge` - TLS material combined with h2c prior knowledge
/// * `MissingServerName` - TLS material without a server name
/// * `InvalidCertificate` - cert/key PEM could not be parsed
pub fn select_transport(request: &Request) -> Result<Transport, TransportError> {
    match request.protocol {
        Protocol::H2cPriorKnowledge => {
            if request.tls.is_some() {
                return Err(TransportError::TlsWithH2cPriorKnowledge);
            }
            Ok(Transport::H2cPriorKnowledge)
        }
        Protocol::Default => match &request.tls {
            Some(tls) => mutual_tls(tls),
            None => Ok(Transport::Plain),
        },
    }
}

fn mutual_tls(tls: &TlsMaterial) -> Result<Transport, TransportError> {
    if tls.server_name.is_empty() {
        return Err(TransportError::MissingServerName);
    }

    // rustls wants the certificate chain and private key in one PEM buffer
    let mut pem = Vec::with_capacity(tls.cert_pem.len() + tls.key_pem.len() + 1);
    pem.extend_from_slice(&tls.cert_pem);
    if !pem.ends_with(b"\n") {
        pem.push(b'\n');
    }
    pem.extend_from_slice(&tls.key_pem);

    let identity = Identity::from_pem(&pem).map_err(TransportError::InvalidCertificate)?;
    // Every certificate in the chain is trusted, so a leaf followed by its CA works
    let roots =
        Certificate::from_pem_bundle(&tls.cert_pem).map_err(TransportError::InvalidCertificate)?;

    Ok(Transport::MutualTls {
        server_name: tls.server_name.clone(),
        identity,
        roots,
    })
}

impl Transport {
    /// Server name to present over TLS, if any
    pub fn server_name(&self) -> Option<&str> {
        match self {
            Transport::MutualTls { server_name, .. } => Some(server_name),
            _ => None,
        }
    }

    /// Build the one-shot client for this transport
    ///
    /// * `timeout` - hard deadline covering connect, request, and body
    /// * `unfollow_redirect` - return the first response instead of following `Location`
    /// * `dial_addrs` - where to connect for the TLS server name, when it is not the URL host
    pub fn into_client(
        self,
        timeout: Duration,
        unfollow_redirect: bool,
        dial_addrs: &[SocketAddr],
    ) -> Result<Client, TransportError> {
        let redirect = if unfollow_redirect {
            Policy::none()
        } else {
            Policy::default()
        };

        let builder = Client::builder()
            .timeout(timeout)
            .redirect(redirect)
            .tls_info(true);

        let builder = match self {
            Transport::Plain => without_keep_alive(builder),
            Transport::MutualTls {
                server_name,
                identity,
                roots,
            } => {
                let builder = roots.into_iter().fold(
                    without_keep_alive(builder)
                        .use_rustls_tls()
                        .tls_built_in_root_certs(false),
                    ClientBuilder::add_root_certificate,
                );
                let builder = builder.identity(identity);
                if dial_addrs.is_empty() {
                    builder
                } else {
                    builder.resolve_to_addrs(&server_name, dial_addrs)
                }
            }
            Transport::H2cPriorKnowledge => builder.http2_prior_knowledge(),
        };

        builder.build().map_err(TransportError::ClientBuild)
    }
}

// Every call builds its own client, so idle pooled connections would only
// pile up open sockets against the gateway over a long run.
fn without_keep_alive(builder: ClientBuilder) -> ClientBuilder {
    builder.pool_max_idle_per_host(0)
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
