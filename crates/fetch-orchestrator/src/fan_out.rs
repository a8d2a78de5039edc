use std::collections::BTreeMap;
use std::sync::Arc;

use provider_core::{ErrorKind, FetchPayload, InvocationRequest, ProviderError};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use worker_gateway::RetryClient;

/// One slot in a fan-out batch. The name keys the result map and is the
/// caller's handle, independent of the endpoint.
#[derive(Debug, Clone)]
pub struct NamedFetch {
    pub name: String,
    pub request: InvocationRequest,
}

impl NamedFetch {
    pub fn new(name: impl Into<String>, request: InvocationRequest) -> Self {
        Self {
            name: name.into(),
            request,
        }
    }
}

/// Run a batch of fetches concurrently under the pool. The result map
/// holds exactly one entry per input name: `Some` on success, `None`
/// on any failure. One slot failing never aborts the others.
pub async fn fan_out(
    client: Arc<RetryClient>,
    pool: Arc<Semaphore>,
    fetches: Vec<NamedFetch>,
) -> BTreeMap<String, Option<FetchPayload>> {
    let mut results: BTreeMap<String, Option<FetchPayload>> =
        fetches.iter().map(|f| (f.name.clone(), None)).collect();

    let mut tasks = JoinSet::new();
    for fetch in fetches {
        let client = Arc::clone(&client);
        let pool = Arc::clone(&pool);
        tasks.spawn(async move {
            // a closed pool means shutdown; the slot is abandoned, not
            // run outside the bound
            let _permit = match pool.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return (
                        fetch.name,
                        fetch.request.endpoint,
                        Err(ProviderError::Call {
                            kind: ErrorKind::ProcessFailure,
                            message: "fan-out pool closed before the slot ran".to_string(),
                            hints: vec![],
                        }),
                    )
                }
            };
            let outcome = client.invoke_with_retry(&fetch.request).await;
            (fetch.name, fetch.request.endpoint, outcome)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, _, Ok(payload))) => {
                results.insert(name, Some(payload));
            }
            Ok((name, endpoint, Err(err))) => {
                tracing::warn!(slot = %name, endpoint = %endpoint, error = %err, "fan-out slot failed");
            }
            Err(join_err) => {
                // the slot stays None; the name was registered upfront
                tracing::error!(error = %join_err, "fan-out task panicked");
            }
        }
    }

    results
}
