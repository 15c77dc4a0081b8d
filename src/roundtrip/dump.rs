//! Request/response dumps for debugging failed scenarios

use super::decode::{protocol_string, RawResponse};
use reqwest::header::HeaderMap;
use tracing::debug;

/// Receives human-readable dumps of the traffic a round trip produced
///
/// Passed explicitly to each round trip so a scenario can route dumps into
/// its own output.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, message: &str);
}

/// Sink that forwards dumps to `tracing` at debug level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn record(&self, message: &str) {
        debug!(target: "gwconform::dump", "{}", message);
    }
}

/// Prefix every line of `dump` with `prefix`
pub fn format_dump(dump: &str, prefix: &str) -> String {
    dump.lines()
        .map(|line| format!("{}{}", prefix, line))
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn dump_request(request: &reqwest::Request) -> String {
    let url = request.url();
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }

    let mut dump = format!(
        "{} {} {}\n",
        request.method(),
        target,
        protocol_string(request.version())
    );
    if !request.headers().contains_key(reqwest::header::HOST) {
        dump.push_str(&format!("host: {}\n", url.authority()));
    }
    push_headers(&mut dump, request.headers());
    dump
}

pub(crate) fn dump_response(response: &RawResponse) -> String {
    let mut dump = format!("{} {}\n", protocol_string(response.version), response.status);
    push_headers(&mut dump, &response.headers);
    dump.push('\n');
    dump.push_str(&String::from_utf8_lossy(&response.body));
    dump
}

fn push_headers(dump: &mut String, headers: &HeaderMap) {
    for (name, value) in headers {
        dump.push_str(&format!(
            "{}: {}\n",
            name,
            String::from_utf8_lossy(value.as_bytes())
        ));
    }
}

#[cfg(test)]
#[path = "dump_test.rs"]
mod tests;
