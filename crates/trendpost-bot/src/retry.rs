use std::future::Future;
use std::time::Duration;

use backon::{ConstantBuilder, Retryable as _};
use tracing::warn;
use trendpost_util_error::FmtCompact as _;

use crate::LOG_TARGET;
use crate::http::{HttpError, HttpResult};

/// Fixed-delay retry for calls that are safe to repeat.
///
/// Only [transient](HttpError::is_transient) failures are retried; the
/// first permanent failure is returned as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Listing page and catalog reads.
    pub const READ: Self = Self {
        max_retries: 3,
        delay: Duration::from_secs(3),
    };

    /// The final create-post call.
    pub const PUBLISH: Self = Self {
        max_retries: 3,
        delay: Duration::from_secs(5),
    };

    /// Same attempt count, no waiting in between.
    pub const fn without_delay(self) -> Self {
        Self {
            delay: Duration::ZERO,
            ..self
        }
    }

    fn backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(self.max_retries)
    }

    pub async fn run<T, F, Fut>(&self, what: &str, op: F) -> HttpResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = HttpResult<T>>,
    {
        op.retry(self.backoff())
            .when(HttpError::is_transient)
            .notify(|err, after| {
                warn!(
                    target: LOG_TARGET,
                    %what,
                    err = %err.fmt_compact(),
                    retry_in = ?after,
                    "Transient failure, retrying"
                )
            })
            .await
    }
}
