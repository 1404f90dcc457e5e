//! Shared network session handed to every command.

use std::fmt;
use std::sync::Arc;

use ferry_core::{Request, Response, Transport, TransportError};
use ferry_telemetry::Metrics;

use crate::retry::RetryGovernor;

/// Transport handle plus the retry policy and optional metrics applied to its calls.
#[derive(Clone)]
pub struct Session {
    transport: Arc<dyn Transport>,
    retry: RetryGovernor,
    metrics: Option<Metrics>,
}

impl Session {
    /// Wrap a transport with the default retry policy.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            retry: RetryGovernor::default(),
            metrics: None,
        }
    }

    /// Replace the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryGovernor) -> Self {
        self.retry = retry;
        self
    }

    /// Attach a metrics registry.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Active retry policy.
    #[must_use]
    pub const fn retry(&self) -> &RetryGovernor {
        &self.retry
    }

    /// Attached metrics registry.
    #[must_use]
    pub const fn metrics(&self) -> Option<&Metrics> {
        self.metrics.as_ref()
    }

    /// Issue `request` through the retry governor.
    ///
    /// # Errors
    ///
    /// Returns the transport failure that ended the call.
    pub async fn call(
        &self,
        operation: &'static str,
        request: &Request,
    ) -> Result<Response, TransportError> {
        let mut calls = 0_u32;
        let transport = &self.transport;
        let result = self
            .retry
            .run(operation, || {
                calls += 1;
                transport.call(request)
            })
            .await;
        if let Some(metrics) = &self.metrics {
            for _ in 1..calls {
                metrics.inc_retry(operation);
            }
        }
        result
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Session")
            .field("retry", &self.retry)
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}
