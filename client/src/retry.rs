// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use crate::Error;
use rand::Rng;
use std::fmt::Debug;
use std::time::Duration;

/// The verdict a retry policy hands back for one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// Retry after waiting this long.
    Retry(Duration),
    /// Give up and surface the error.
    DontRetry,
}

/// Decides whether and when a failed attempt is retried.
///
/// Policies are stateless between calls: the attempt counter is passed in,
/// starting at 0 for the first try. A policy stops retrying once
/// `attempt >= max_retries`, so `max_retries = 4` yields at most five
/// attempts total.
pub trait RetryPolicy: Debug + Send + Sync {
    /// Classify `error` after `attempt` and return the wait verdict.
    fn retry_wait_time(&self, error: &Error, attempt: u32) -> RetryAction;
}

/// Never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn retry_wait_time(&self, _: &Error, _: u32) -> RetryAction {
        RetryAction::DontRetry
    }
}

/// Plain exponential backoff: `base * 2^attempt`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialRetry {
    base: Duration,
    max_retries: u32,
}

impl Default for ExponentialRetry {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            max_retries: 4,
        }
    }
}

impl ExponentialRetry {
    /// Create a policy with the given base delay and retry cap.
    pub fn new(base: Duration, max_retries: u32) -> Self {
        Self { base, max_retries }
    }

    fn ceiling_delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(1u32 << attempt.min(31))
    }
}

impl RetryPolicy for ExponentialRetry {
    fn retry_wait_time(&self, error: &Error, attempt: u32) -> RetryAction {
        if attempt >= self.max_retries || !error.is_retryable() {
            return RetryAction::DontRetry;
        }
        RetryAction::Retry(self.ceiling_delay(attempt))
    }
}

/// Exponential backoff with full jitter, the default policy.
///
/// The delay for attempt `n` is drawn uniformly from
/// `[base * 2^n / 2, base * 2^n)`, which spreads recovering clients out
/// instead of synchronizing them on the same instant.
#[derive(Debug, Clone, Copy)]
pub struct JitterRetry {
    inner: ExponentialRetry,
}

impl Default for JitterRetry {
    fn default() -> Self {
        Self {
            inner: ExponentialRetry::default(),
        }
    }
}

impl JitterRetry {
    /// Create a policy with the given base delay and retry cap.
    pub fn new(base: Duration, max_retries: u32) -> Self {
        Self {
            inner: ExponentialRetry::new(base, max_retries),
        }
    }
}

impl RetryPolicy for JitterRetry {
    fn retry_wait_time(&self, error: &Error, attempt: u32) -> RetryAction {
        match self.inner.retry_wait_time(error, attempt) {
            RetryAction::Retry(ceiling) => {
                let ceiling_ms = ceiling.as_millis().max(1) as u64;
                let jittered = rand::thread_rng().gen_range(ceiling_ms / 2..ceiling_ms);
                RetryAction::Retry(Duration::from_millis(jittered))
            }
            RetryAction::DontRetry => RetryAction::DontRetry,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ServiceError, ServiceErrorKind};

    fn http_503() -> Error {
        Error::Service(ServiceError {
            status: 503,
            code: "ServiceUnavailable".into(),
            message: String::new(),
            kind: ServiceErrorKind::Server,
            raw_body: None,
        })
    }

    fn http_400() -> Error {
        Error::Service(ServiceError {
            status: 400,
            code: "ValidationError".into(),
            message: String::new(),
            kind: ServiceErrorKind::Client,
            raw_body: None,
        })
    }

    #[test]
    fn test_no_retry() {
        assert_eq!(
            NoRetry.retry_wait_time(&http_503(), 0),
            RetryAction::DontRetry
        );
    }

    #[test]
    fn test_exponential_delays() {
        let policy = ExponentialRetry::new(Duration::from_secs(1), 4);
        for attempt in 0..4 {
            assert_eq!(
                policy.retry_wait_time(&http_503(), attempt),
                RetryAction::Retry(Duration::from_secs(1 << attempt))
            );
        }
        // Attempt 4 is the fifth try; the policy gives up.
        assert_eq!(
            policy.retry_wait_time(&http_503(), 4),
            RetryAction::DontRetry
        );
    }

    #[test]
    fn test_client_error_never_retried() {
        let policy = JitterRetry::default();
        assert_eq!(policy.retry_wait_time(&http_400(), 0), RetryAction::DontRetry);
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = JitterRetry::new(Duration::from_secs(1), 4);
        for attempt in 0..4u32 {
            for _ in 0..50 {
                match policy.retry_wait_time(&http_503(), attempt) {
                    RetryAction::Retry(delay) => {
                        let ceiling = Duration::from_secs(1 << attempt);
                        assert!(delay >= ceiling / 2, "attempt {attempt}: {delay:?}");
                        assert!(delay < ceiling, "attempt {attempt}: {delay:?}");
                    }
                    RetryAction::DontRetry => panic!("attempt {attempt} should retry"),
                }
            }
        }
    }

    #[test]
    fn test_throttling_is_retryable() {
        let policy = JitterRetry::default();
        let throttled = Error::Service(ServiceError {
            status: 429,
            code: "Throttling".into(),
            message: String::new(),
            kind: ServiceErrorKind::Client,
            raw_body: None,
        });
        assert!(matches!(
            policy.retry_wait_time(&throttled, 0),
            RetryAction::Retry(_)
        ));
    }
}
