use rand::Rng;
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use super::types::ServiceError;

/// Retry schedule: 3 retries with exponential backoff from 1s, plus jitter.
const RETRY_BASE_DELAY_SECS: u64 = 1;
const MAX_RETRIES: usize = 3;
const RETRY_JITTER_DIVISOR: u128 = 4; // + up to 25% jitter

fn is_retriable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retriable_send_error(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body()
}

fn retry_base_delay(attempt: usize) -> Duration {
    let multiplier = 1u64.checked_shl(attempt as u32).unwrap_or(u64::MAX);
    Duration::from_secs(RETRY_BASE_DELAY_SECS.saturating_mul(multiplier))
}

fn add_jitter(delay: Duration) -> Duration {
    let max_jitter_ms = delay.as_millis() / RETRY_JITTER_DIVISOR;
    if max_jitter_ms == 0 {
        return delay;
    }

    let max_jitter_ms = std::cmp::min(max_jitter_ms, u128::from(u64::MAX)) as u64;
    let jitter_ms = rand::thread_rng().gen_range(0..=max_jitter_ms);
    delay + Duration::from_millis(jitter_ms)
}

/// Send a request, retrying transient failures.
///
/// Non-retriable error statuses are returned as responses so the caller can
/// read the body; only transport errors become `Err`.
pub(super) async fn send_with_retry(
    endpoint: &str,
    mut make_request: impl FnMut() -> reqwest::RequestBuilder,
) -> Result<reqwest::Response, ServiceError> {
    let max_attempts = MAX_RETRIES + 1;
    let mut attempt = 0;

    loop {
        match make_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() || !is_retriable_status(status) || attempt >= MAX_RETRIES {
                    return Ok(response);
                }

                let base_delay = retry_base_delay(attempt);
                let delay = add_jitter(base_delay);
                debug!(
                    "{} returned status {}; retrying in {:?} (attempt {}/{})",
                    endpoint,
                    status,
                    delay,
                    attempt + 1,
                    max_attempts
                );
                let _ = response.bytes().await;
                sleep(delay).await;
            }
            Err(err) => {
                if !is_retriable_send_error(&err) || attempt >= MAX_RETRIES {
                    return Err(ServiceError::Transport {
                        endpoint: endpoint.to_string(),
                        attempts: attempt + 1,
                        source: err,
                    });
                }

                let base_delay = retry_base_delay(attempt);
                let delay = add_jitter(base_delay);
                debug!(
                    "{} request error: {}; retrying in {:?} (attempt {}/{})",
                    endpoint,
                    err,
                    delay,
                    attempt + 1,
                    max_attempts
                );
                sleep(delay).await;
            }
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles() {
        assert_eq!(retry_base_delay(0), Duration::from_secs(1));
        assert_eq!(retry_base_delay(1), Duration::from_secs(2));
        assert_eq!(retry_base_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_jitter_is_bounded() {
        let base = Duration::from_secs(4);
        for _ in 0..20 {
            let delay = add_jitter(base);
            assert!(delay >= base);
            assert!(delay <= base + Duration::from_secs(1));
        }
    }

    #[test]
    fn test_retriable_statuses() {
        assert!(is_retriable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retriable_status(StatusCode::BAD_GATEWAY));
        assert!(!is_retriable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retriable_status(StatusCode::BAD_REQUEST));
    }
}
