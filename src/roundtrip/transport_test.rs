//! Tests for transport selection

use super::*;
use reqwest::Url;

const CERT_PEM: &[u8] = include_bytes!("../../tests/testdata/cert.pem");
const KEY_PEM: &[u8] = include_bytes!("../../tests/testdata/key.pem");

fn request() -> Request {
    Request::new(Url::parse("http://10.0.0.1/echo").unwrap())
}

fn tls(server_name: &str) -> TlsMaterial {
    TlsMaterial {
        server_name: server_name.to_string(),
        cert_pem: CERT_PEM.to_vec(),
        key_pem: KEY_PEM.to_vec(),
    }
}

#[test]
fn test_default_protocol_without_tls_is_plain() {
    let transport = select_transport(&request()).unwrap();

    assert!(matches!(transport, Transport::Plain));
    assert_eq!(transport.server_name(), None);
}

#[test]
fn test_h2c_prior_knowledge_without_tls() {
    let request = request().with_protocol(Protocol::H2cPriorKnowledge);

    let transport = select_transport(&request).unwrap();

    assert!(matches!(transport, Transport::H2cPriorKnowledge));
}

#[test]
fn test_h2c_prior_knowledge_rejects_tls_material() {
    // Valid, incomplete, and nameless TLS material are all rejected the same way
    for material in [
        tls("gateway.example.com"),
        tls(""),
        TlsMaterial::default(),
    ] {
        let request = request()
            .with_protocol(Protocol::H2cPriorKnowledge)
            .with_tls(material);

        let err = select_transport(&request).unwrap_err();

        assert!(
            matches!(err, TransportError::TlsWithH2cPriorKnowledge),
            "unexpected error: {err}"
        );
    }
}

#[test]
fn test_tls_without_server_name_is_rejected() {
    let request = request().with_tls(tls(""));

    let err = select_transport(&request).unwrap_err();

    assert!(matches!(err, TransportError::MissingServerName));
}

#[test]
fn test_tls_with_unparseable_key_is_rejected() {
    let request = request().with_tls(TlsMaterial {
        server_name: "gateway.example.com".to_string(),
        cert_pem: CERT_PEM.to_vec(),
        key_pem: b"not a key".to_vec(),
    });

    let err = select_transport(&request).unwrap_err();

    assert!(matches!(err, TransportError::InvalidCertificate(_)));
}

#[test]
fn test_tls_material_selects_mutual_tls() {
    let request = request().with_tls(tls("gateway.example.com"));

    let transport = select_transport(&request).unwrap();

    assert_eq!(transport.server_name(), Some("gateway.example.com"));
    assert!(format!("{:?}", transport).contains("gateway.example.com"));
}

#[test]
fn test_every_transport_builds_a_client() {
    let dial = ["127.0.0.1:8443".parse().unwrap()];
    let transports = [
        select_transport(&request()).unwrap(),
        select_transport(&request().with_protocol(Protocol::H2cPriorKnowledge)).unwrap(),
        select_transport(&request().with_tls(tls("gateway.example.com"))).unwrap(),
    ];

    for transport in transports {
        let client = transport.into_client(Duration::from_secs(1), true, &dial);
        assert!(client.is_ok(), "client build failed: {:?}", client.err());
    }
}
