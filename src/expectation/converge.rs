//! Waiting for the gateway to converge

use super::{compare_request, make_request, ExpectationError, ExpectedResponse};
use crate::config::TimeoutConfig;
use crate::roundtrip::{DiagnosticSink, RoundTripper};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Poll `attempt` until it succeeds `threshold` times in a row
///
/// `attempt` receives the time elapsed since the first attempt. A failure
/// resets the streak. Gives up once `max_time_to_consistency` has passed.
pub async fn await_convergence<F, Fut>(
    timeouts: &TimeoutConfig,
    mut attempt: F,
) -> Result<(), ExpectationError>
where
    F: FnMut(Duration) -> Fut,
    Fut: Future<Output = bool>,
{
    let start = Instant::now();
    let mut successes = 0u32;

    loop {
        let elapsed = start.elapsed();
        if elapsed > timeouts.max_time_to_consistency {
            return Err(ExpectationError::NotConverged {
                elapsed_secs: elapsed.as_secs(),
                required: timeouts.required_consecutive_successes,
            });
        }

        if attempt(elapsed).await {
            successes += 1;
            if successes >= timeouts.required_consecutive_successes {
                return Ok(());
            }
        } else {
            successes = 0;
        }

        tokio::time::sleep(timeouts.poll_interval).await;
    }
}

/// Send `expected` through the gateway until it consistently gets the expected result
pub async fn make_request_and_expect_eventually_consistent_response(
    round_tripper: &dyn RoundTripper,
    timeouts: &TimeoutConfig,
    gw_addr: &str,
    expected: &ExpectedResponse,
    sink: Option<&dyn DiagnosticSink>,
) -> Result<(), ExpectationError> {
    let request = make_request(expected, gw_addr, "http")?;
    let request = &request;

    await_convergence(timeouts, |elapsed| async move {
        let (captured_request, captured_response) =
            match round_tripper.capture_round_trip(request, sink).await {
                Ok(captured) => captured,
                Err(e) => {
                    warn!(error = %e, elapsed = ?elapsed, "Request failed, not ready yet");
                    return false;
                }
            };

        match compare_request(request, &captured_request, &captured_response, expected) {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, path = %request.url.path(), elapsed = ?elapsed, "Response expectation failed, not ready yet");
                false
            }
        }
    })
    .await?;

    info!(url = %request.url, "Request passed");
    Ok(())
}

#[cfg(test)]
#[path = "converge_test.rs"]
mod tests;
