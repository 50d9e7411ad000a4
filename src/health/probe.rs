//! Probe contract and the HTTP probe used by the daemon.
//!
//! A probe performs one health check for one service. It knows how to reach
//! its backend; the engine only sees the canonical `ServiceResult` or a
//! `TransportError`, which the poller classifies.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::Deserialize;

use crate::health::classifier::classify_payload;
use crate::health::types::{ServiceResult, ServiceStatus};
use crate::resilience::retries::{get_with_retry, RetryPolicy};
use crate::resilience::timeouts::TransportError;

/// Outcome of one probe call before classification.
pub type ProbeOutcome = Result<ServiceResult, TransportError>;

/// One health check for one service.
pub trait Probe: Send + Sync {
    /// Run the check. `timeout` bounds each network attempt.
    fn check(&self, timeout: Duration) -> BoxFuture<'_, ProbeOutcome>;
}

/// Probe backed by a closure.
pub struct FnProbe<F>(F);

/// Wrap a closure `Fn(Duration) -> impl Future<Output = ProbeOutcome>` as a probe.
pub fn probe_fn<F, Fut>(f: F) -> FnProbe<F>
where
    F: Fn(Duration) -> Fut + Send + Sync,
    Fut: Future<Output = ProbeOutcome> + Send + 'static,
{
    FnProbe(f)
}

impl<F, Fut> Probe for FnProbe<F>
where
    F: Fn(Duration) -> Fut + Send + Sync,
    Fut: Future<Output = ProbeOutcome> + Send + 'static,
{
    fn check(&self, timeout: Duration) -> BoxFuture<'_, ProbeOutcome> {
        Box::pin((self.0)(timeout))
    }
}

/// GETs a health endpoint and reads a `{status, message, metrics}` body.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, client: reqwest::Client, retry: RetryPolicy) -> Self {
        Self {
            url: url.into(),
            client,
            retry,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn run(&self, timeout: Duration) -> ProbeOutcome {
        let response = get_with_retry(&self.client, &self.url, timeout, &self.retry).await?;
        let body = match tokio::time::timeout(timeout, response.text()).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => return Err(TransportError::from_reqwest(&e, timeout)),
            Err(_) => return Err(TransportError::timeout(timeout)),
        };
        Ok(parse_health_body(&body))
    }
}

impl Probe for HttpProbe {
    fn check(&self, timeout: Duration) -> BoxFuture<'_, ProbeOutcome> {
        Box::pin(self.run(timeout))
    }
}

#[derive(Debug, Deserialize)]
struct HealthPayload {
    status: Option<String>,
    message: Option<String>,
    metrics: Option<serde_json::Value>,
}

/// Turn a 2xx body into a result. Bodies without a status string count as `Up`.
pub fn parse_health_body(body: &str) -> ServiceResult {
    let Ok(payload) = serde_json::from_str::<HealthPayload>(body) else {
        return ServiceResult::new(ServiceStatus::Up, "Service responded");
    };

    let metrics: BTreeMap<String, serde_json::Value> = match payload.metrics {
        Some(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    };

    match payload.status {
        Some(status) => classify_payload(&status, payload.message.as_deref(), metrics),
        None => ServiceResult::new(
            ServiceStatus::Up,
            payload.message.unwrap_or_else(|| "Service responded".to_string()),
        )
        .with_metrics(metrics),
    }
}
