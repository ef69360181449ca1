//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap upstream calls with a deadline
//! - Cancel the wrapped future cleanly on expiry (it is dropped)
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Expiry becomes `UpstreamTimeout`, distinct from other failures

use std::future::Future;
use std::time::Duration;

use crate::error::{GatewayError, GatewayResult};

/// Run `call` with a deadline. Expiry yields `UpstreamTimeout` for `target`.
pub async fn with_deadline<T, F>(deadline: Duration, target: &str, call: F) -> GatewayResult<T>
where
    F: Future<Output = GatewayResult<T>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::UpstreamTimeout {
            target: target.to_string(),
            timeout_ms: deadline.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn expiry_is_upstream_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok::<_, GatewayError>("late")
        };
        let err = with_deadline(Duration::from_secs(1), "http://httpbin.org:80", slow)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamTimeout { timeout_ms: 1000, .. }));

        let fast = async { Ok::<_, GatewayError>("on time") };
        assert_eq!(with_deadline(Duration::from_secs(1), "t", fast).await.unwrap(), "on time");
    }
}
