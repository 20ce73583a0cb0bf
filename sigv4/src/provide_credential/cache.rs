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

use crate::Credential;
use async_trait::async_trait;
use awsreq_core::{Context, Error, ProvideCredential, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type SharedFetch = Shared<BoxFuture<'static, std::result::Result<Credential, Arc<Error>>>>;

/// How much remaining lifetime a cached credential must have to be served
/// without a refresh.
const DEFAULT_EXPIRY_GUARD: Duration = Duration::from_secs(180);

struct CacheState {
    current: Option<Credential>,
    in_flight: Option<SharedFetch>,
}

/// CachedCredentialProvider caches the credential of an inner provider and
/// deduplicates concurrent refreshes.
///
/// The cache holds `{ current, in_flight }` behind a single mutex. A call
/// first serves `current` when its remaining lifetime exceeds the guard
/// window; otherwise it joins the in-flight refresh if one exists, or starts
/// one. At most one fetch runs at any instant and every concurrent caller
/// observes its result.
///
/// The refresh runs on a detached task: a caller dropping its future does not
/// cancel a refresh other callers may be waiting on. On completion the task
/// clears `in_flight` before publishing `current`, both under the lock.
pub struct CachedCredentialProvider {
    inner: Arc<dyn ProvideCredential<Credential = Credential>>,
    expiry_guard: Duration,
    state: Arc<Mutex<CacheState>>,
}

impl CachedCredentialProvider {
    /// Wrap the given provider with caching and singleflight refresh.
    pub fn new(inner: impl ProvideCredential<Credential = Credential>) -> Self {
        Self {
            inner: Arc::new(inner),
            expiry_guard: DEFAULT_EXPIRY_GUARD,
            state: Arc::new(Mutex::new(CacheState {
                current: None,
                in_flight: None,
            })),
        }
    }

    /// Set the guard window a cached credential must outlive to be served.
    pub fn with_expiry_guard(mut self, guard: Duration) -> Self {
        self.expiry_guard = guard;
        self
    }

    fn start_fetch(&self, ctx: Context) -> SharedFetch {
        let provider = self.inner.clone();
        let state = self.state.clone();

        let handle = tokio::spawn(async move {
            let outcome = match provider.provide_credential(&ctx).await {
                Ok(Some(cred)) => Ok(cred),
                Ok(None) => Err(Arc::new(Error::credential_invalid(
                    "no credential source in the chain returned credentials",
                ))),
                Err(e) => Err(Arc::new(e)),
            };

            let mut state = state.lock().expect("lock poisoned");
            state.in_flight = None;
            if let Ok(cred) = &outcome {
                state.current = Some(cred.clone());
            }
            outcome
        });

        async move {
            handle.await.unwrap_or_else(|e| {
                Err(Arc::new(
                    Error::unexpected("credential refresh task aborted").with_source(e),
                ))
            })
        }
        .boxed()
        .shared()
    }
}

impl Debug for CachedCredentialProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedCredentialProvider")
            .field("inner", &self.inner)
            .field("expiry_guard", &self.expiry_guard)
            .finish()
    }
}

#[async_trait]
impl ProvideCredential for CachedCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        let fetch = {
            let mut state = self.state.lock().expect("lock poisoned");

            if let Some(cred) = &state.current {
                if !cred.is_expiring_within(self.expiry_guard) {
                    return Ok(Some(cred.clone()));
                }
            }

            match &state.in_flight {
                Some(fetch) => fetch.clone(),
                None => {
                    let fetch = self.start_fetch(ctx.clone());
                    state.in_flight = Some(fetch.clone());
                    fetch
                }
            }
            // The lock is released here, before the await below.
        };

        match fetch.await {
            Ok(cred) => Ok(Some(cred)),
            Err(e) => Err(Error::unexpected("credential refresh failed").with_source(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use awsreq_core::time::now;
    use awsreq_file_read_tokio::TokioFileRead;
    use awsreq_http_send_reqwest::ReqwestHttpSend;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct CountingProvider {
        calls: Arc<AtomicUsize>,
        lifetime: chrono::TimeDelta,
    }

    #[async_trait]
    impl ProvideCredential for CountingProvider {
        type Credential = Credential;

        async fn provide_credential(&self, _: &Context) -> Result<Option<Self::Credential>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            // Give concurrent callers a chance to pile onto the same fetch.
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(Some(Credential {
                expires_in: Some(now() + self.lifetime),
                ..Credential::new(&format!("akid-{n}"), "secret")
            }))
        }
    }

    fn test_ctx() -> Context {
        Context::new(TokioFileRead, ReqwestHttpSend::default())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_callers_share_one_fetch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CachedCredentialProvider::new(CountingProvider {
            calls: calls.clone(),
            lifetime: chrono::TimeDelta::try_hours(1).unwrap(),
        });
        let ctx = test_ctx();

        let (a, b, c) = tokio::join!(
            provider.provide_credential(&ctx),
            provider.provide_credential(&ctx),
            provider.provide_credential(&ctx),
        );

        let a = a.unwrap().unwrap();
        let b = b.unwrap().unwrap();
        let c = c.unwrap().unwrap();
        assert_eq!(a.access_key_id, b.access_key_id);
        assert_eq!(b.access_key_id, c.access_key_id);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fresh_credential_served_from_cache() {
        let calls = Arc::new(AtomicUsize::new(0));
        let provider = CachedCredentialProvider::new(CountingProvider {
            calls: calls.clone(),
            lifetime: chrono::TimeDelta::try_hours(1).unwrap(),
        });
        let ctx = test_ctx();

        provider.provide_credential(&ctx).await.unwrap();
        provider.provide_credential(&ctx).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expiring_credential_triggers_refresh() {
        let calls = Arc::new(AtomicUsize::new(0));
        // Lifetime inside the guard window: every call refreshes.
        let provider = CachedCredentialProvider::new(CountingProvider {
            calls: calls.clone(),
            lifetime: chrono::TimeDelta::try_seconds(30).unwrap(),
        });
        let ctx = test_ctx();

        provider.provide_credential(&ctx).await.unwrap();
        provider.provide_credential(&ctx).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
