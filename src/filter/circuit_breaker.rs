//! Circuit breaker filter: guards the forward call and serves the fallback.
//!
//! # Flow
//! ```text
//! try_acquire ── BreakerOpen ───────────────────────────────┐
//!     │ permit                                              │
//!     ▼                                                     ▼
//! forward under call_timeout ── failure / timeout ──▶ fallback endpoint
//!     │ response (any status)                        (pre-breaker snapshot)
//!     ▼
//! record Success
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::error::{GatewayError, GatewayResult};
use crate::filter::BreakerStep;
use crate::gateway::{GatewayRequest, GatewayResponse, LocalEndpoints};
use crate::resilience::timeouts::with_deadline;
use crate::resilience::{CallOutcome, CircuitBreaker};

/// Run `call` through `breaker`. Open breakers and failed calls fall back to
/// the local endpoint named by the breaker settings.
pub async fn execute<F>(
    breaker: &Arc<CircuitBreaker>,
    step: BreakerStep,
    endpoints: &LocalEndpoints,
    target: &str,
    call: F,
) -> GatewayResult<GatewayResponse>
where
    F: Future<Output = GatewayResult<GatewayResponse>>,
{
    let permit = match breaker.try_acquire() {
        Ok(permit) => permit,
        Err(err) => {
            tracing::debug!(breaker = %breaker.name(), "Short-circuited, serving fallback");
            return fallback(step, endpoints, &err);
        }
    };

    match with_deadline(step.settings.call_timeout, target, call).await {
        Ok(response) => {
            permit.record(CallOutcome::Success);
            Ok(response)
        }
        Err(err) if !err.is_upstream_failure() => {
            // Not the upstream's fault; leave the window alone.
            permit.release();
            Err(err)
        }
        Err(err @ GatewayError::Cancelled { .. }) => {
            permit.record(CallOutcome::Failure);
            Err(err)
        }
        Err(err) => {
            let outcome = match err {
                GatewayError::UpstreamTimeout { .. } => CallOutcome::Timeout,
                _ => CallOutcome::Failure,
            };
            permit.record(outcome);
            tracing::warn!(breaker = %breaker.name(), error = %err, "Upstream call failed, serving fallback");
            fallback(step, endpoints, &err)
        }
    }
}

/// Dispatch the pre-breaker snapshot to the fallback endpoint in process.
fn fallback(step: BreakerStep, endpoints: &LocalEndpoints, cause: &GatewayError) -> GatewayResult<GatewayResponse> {
    let BreakerStep {
        settings,
        fallback_request,
    } = step;
    let request = redirect_to_fallback(fallback_request, &settings.fallback_path)?;

    endpoints.serve(request.path()).ok_or_else(|| {
        tracing::error!(path = %settings.fallback_path, cause = %cause, "Fallback endpoint missing");
        GatewayError::FallbackNotFound {
            path: settings.fallback_path.clone(),
        }
    })
}

fn redirect_to_fallback(mut request: GatewayRequest, path: &str) -> GatewayResult<GatewayRequest> {
    tracing::debug!(method = %request.method, from = %request.uri, to = %path, "Forwarding to fallback");
    request.set_path(path, "circuit_breaker")?;
    Ok(request)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::StatusCode;

    use super::*;
    use crate::config::EndpointConfig;
    use crate::resilience::{BreakerState, CircuitBreakerSettings};

    fn settings() -> Arc<CircuitBreakerSettings> {
        Arc::new(CircuitBreakerSettings {
            name: "mycmd".into(),
            failure_threshold: 0.5,
            window_size: 2,
            minimum_calls: 2,
            cooldown: Duration::from_secs(5),
            call_timeout: Duration::from_secs(1),
            fallback_path: "/fallback".into(),
        })
    }

    fn step(settings: &Arc<CircuitBreakerSettings>) -> BreakerStep {
        BreakerStep {
            settings: Arc::clone(settings),
            fallback_request: GatewayRequest::get("/delay/3"),
        }
    }

    fn unreachable() -> GatewayError {
        GatewayError::UpstreamUnreachable {
            target: "http://httpbin.org:80".into(),
            message: "connection refused".into(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_upstream_times_out_into_fallback() {
        let settings = settings();
        let breaker = Arc::new(CircuitBreaker::new((*settings).clone()));
        let endpoints = LocalEndpoints::from_config(&[EndpointConfig::fallback()]);

        let slow = async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Ok::<_, GatewayError>(GatewayResponse::text(StatusCode::OK, "late"))
        };
        let response = execute(&breaker, step(&settings), &endpoints, "upstream", slow)
            .await
            .unwrap();

        assert_eq!(response.body, "fallback");
        assert_eq!(breaker.snapshot().stats.timeouts, 1);
    }

    #[tokio::test]
    async fn upstream_error_status_is_not_a_failure() {
        let settings = settings();
        let breaker = Arc::new(CircuitBreaker::new((*settings).clone()));
        let endpoints = LocalEndpoints::from_config(&[EndpointConfig::fallback()]);

        for _ in 0..3 {
            let call = async { Ok::<_, GatewayError>(GatewayResponse::text(StatusCode::SERVICE_UNAVAILABLE, "down")) };
            let response = execute(&breaker, step(&settings), &endpoints, "upstream", call)
                .await
                .unwrap();
            assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        }
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test]
    async fn open_breaker_skips_the_call() {
        let settings = settings();
        let breaker = Arc::new(CircuitBreaker::new((*settings).clone()));
        let endpoints = LocalEndpoints::from_config(&[EndpointConfig::fallback()]);

        for _ in 0..2 {
            let call = async { Err::<GatewayResponse, _>(unreachable()) };
            execute(&breaker, step(&settings), &endpoints, "upstream", call)
                .await
                .unwrap();
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        let call = async { Ok::<_, GatewayError>(GatewayResponse::text(StatusCode::OK, "upstream")) };
        let response = execute(&breaker, step(&settings), &endpoints, "upstream", call)
            .await
            .unwrap();
        assert_eq!(response.body, "fallback");
        assert_eq!(breaker.snapshot().stats.rejected, 1);
    }

    #[tokio::test]
    async fn non_upstream_error_propagates_without_a_failure() {
        let settings = settings();
        let breaker = Arc::new(CircuitBreaker::new((*settings).clone()));
        let endpoints = LocalEndpoints::from_config(&[EndpointConfig::fallback()]);

        for _ in 0..3 {
            let call = async { Err::<GatewayResponse, _>(GatewayError::filter("prefix_path", "bad uri")) };
            let err = execute(&breaker, step(&settings), &endpoints, "upstream", call)
                .await
                .unwrap_err();
            assert!(matches!(err, GatewayError::Filter { .. }));
        }
        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, BreakerState::Closed);
        assert_eq!(snapshot.stats.calls(), 0);
        assert_eq!(snapshot.window_calls, 0);
    }

    #[tokio::test]
    async fn missing_fallback_endpoint_is_an_error() {
        let settings = settings();
        let breaker = Arc::new(CircuitBreaker::new((*settings).clone()));
        let endpoints = LocalEndpoints::default();

        let call = async { Err::<GatewayResponse, _>(unreachable()) };
        let err = execute(&breaker, step(&settings), &endpoints, "upstream", call)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::FallbackNotFound { .. }));
    }
}
