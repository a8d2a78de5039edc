use std::time::Duration;

use provider_core::{ErrorKind, FetchPayload, InvocationRequest, ProviderError, TimeoutPolicy};

use crate::gateway::WorkerGateway;

/// Diagnostic emitted by endpoints that do not accept a `timeout`
/// parameter. The parameter is dropped and the call replayed once.
const TIMEOUT_KWARG_DIAGNOSTIC: &str = "unexpected keyword argument 'timeout'";

/// Retrying front door over the gateway. Owns the timeout policy; one
/// budget is resolved per request and shared by every attempt.
#[derive(Debug, Clone)]
pub struct RetryClient {
    gateway: WorkerGateway,
    policy: TimeoutPolicy,
}

impl RetryClient {
    pub fn new(gateway: WorkerGateway) -> Self {
        Self {
            gateway,
            policy: TimeoutPolicy::new(),
        }
    }

    pub fn with_policy(mut self, policy: TimeoutPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &TimeoutPolicy {
        &self.policy
    }

    /// Run a request to completion: budget resolution, attempts, backoff.
    /// Non-retryable failures short-circuit; the final attempt's error is
    /// returned verbatim.
    pub async fn invoke_with_retry(
        &self,
        request: &InvocationRequest,
    ) -> Result<FetchPayload, ProviderError> {
        let budget = self
            .policy
            .budget_for(&request.endpoint, request.timeout_override);
        let attempts = request.max_retries.max(1);
        let mut params = request.params.clone();

        let mut attempt = 0;
        loop {
            match self
                .gateway
                .invoke_once(&request.endpoint, &params, budget)
                .await
            {
                Ok(payload) => return Ok(payload),
                Err(err) if !err.is_retryable() => {
                    // Some endpoints reject the timeout parameter outright;
                    // replay once without it instead of failing the call.
                    if is_timeout_kwarg_rejection(&err) && params.remove("timeout").is_some() {
                        tracing::warn!(
                            endpoint = %request.endpoint,
                            "endpoint rejects the timeout parameter, replaying without it"
                        );
                        continue;
                    }
                    return Err(err);
                }
                Err(err) => {
                    attempt += 1;
                    if attempt >= attempts {
                        return Err(err);
                    }
                    let wait = backoff_wait(err.kind(), request.backoff_base, attempt);
                    tracing::warn!(
                        endpoint = %request.endpoint,
                        attempt,
                        max_attempts = attempts,
                        kind = %err.kind(),
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "attempt failed, backing off"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }
}

/// Delay before the next attempt. SSL failures get a longer leash since
/// the upstream TLS frontends recover slowly.
fn backoff_wait(kind: ErrorKind, base: f64, attempt: u32) -> Duration {
    let grown = base.powi(attempt as i32);
    let secs = if kind == ErrorKind::Ssl {
        (grown * 2.0).min(15.0)
    } else {
        grown.min(8.0)
    };
    Duration::from_secs_f64(secs)
}

fn is_timeout_kwarg_rejection(err: &ProviderError) -> bool {
    matches!(
        err,
        ProviderError::Call { message, .. } if message.contains(TIMEOUT_KWARG_DIAGNOSTIC)
    )
}
