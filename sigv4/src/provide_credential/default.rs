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

use crate::provide_credential::{
    EcsCredentialProvider, EnvCredentialProvider, ImdsCredentialProvider,
    ProfileCredentialProvider,
};
use crate::Credential;
use async_trait::async_trait;
use awsreq_core::{Context, ProvideCredential, ProvideCredentialChain, Result};

/// DefaultCredentialProvider is a loader that will try to load credential via default chains.
///
/// Resolution order:
///
/// 1. Environment variables
/// 2. Shared config (`~/.aws/credentials`, `~/.aws/config`)
/// 3. ECS (IAM Roles for Tasks) container credentials
/// 4. EC2 IMDSv2 (with IMDSv1 fallback)
#[derive(Debug)]
pub struct DefaultCredentialProvider {
    chain: ProvideCredentialChain<Credential>,
}

impl Default for DefaultCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultCredentialProvider {
    /// Create a new `DefaultCredentialProvider` instance using the default chain.
    pub fn new() -> Self {
        let chain = ProvideCredentialChain::new()
            .push(EnvCredentialProvider::new())
            .push(ProfileCredentialProvider::new())
            .push(EcsCredentialProvider::new())
            .push(ImdsCredentialProvider::new());

        Self { chain }
    }

    /// Create with a custom credential chain.
    pub fn with_chain(chain: ProvideCredentialChain<Credential>) -> Self {
        Self { chain }
    }

    /// Add a credential provider to the front of the default chain.
    ///
    /// This allows adding a high-priority credential source that will be tried
    /// before all other providers in the default chain.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use awsreq_sigv4::{DefaultCredentialProvider, StaticCredentialProvider};
    ///
    /// let provider = DefaultCredentialProvider::new()
    ///     .push_front(StaticCredentialProvider::new("access_key_id", "secret_access_key"));
    /// ```
    pub fn push_front(
        mut self,
        provider: impl ProvideCredential<Credential = Credential> + 'static,
    ) -> Self {
        self.chain = self.chain.push_front(provider);
        self
    }
}

#[async_trait]
impl ProvideCredential for DefaultCredentialProvider {
    type Credential = Credential;

    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>> {
        self.chain.provide_credential(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY};
    use crate::StaticCredentialProvider;
    use awsreq_core::StaticEnv;
    use awsreq_file_read_tokio::TokioFileRead;
    use awsreq_http_send_reqwest::ReqwestHttpSend;
    use std::collections::HashMap;

    fn ctx_with_envs(envs: HashMap<String, String>) -> Context {
        Context::new(TokioFileRead, ReqwestHttpSend::default()).with_env(StaticEnv {
            home_dir: None,
            envs,
        })
    }

    #[tokio::test]
    async fn test_default_chain_without_env() {
        let _ = env_logger::builder().is_test(true).try_init();

        // The hermetic environment has no credential source at all; IMDS is
        // disabled so the chain terminates without touching the network.
        let ctx = ctx_with_envs(HashMap::from([(
            crate::constants::AWS_EC2_METADATA_DISABLED.to_string(),
            "true".to_string(),
        )]));

        let chain = ProvideCredentialChain::new()
            .push(EnvCredentialProvider::new())
            .push(ProfileCredentialProvider::new().with_credentials_file("/non/existent"))
            .push(EcsCredentialProvider::new())
            .push(crate::ImdsCredentialProvider::new().disabled());
        let provider = DefaultCredentialProvider::with_chain(chain);

        let cred = provider.provide_credential(&ctx).await.unwrap();
        assert!(cred.is_none());
    }

    #[tokio::test]
    async fn test_default_chain_with_env() {
        let _ = env_logger::builder().is_test(true).try_init();

        let ctx = ctx_with_envs(HashMap::from([
            (AWS_ACCESS_KEY_ID.to_string(), "access_key_id".to_string()),
            (
                AWS_SECRET_ACCESS_KEY.to_string(),
                "secret_access_key".to_string(),
            ),
        ]));

        let provider = DefaultCredentialProvider::new();
        let cred = provider
            .provide_credential(&ctx)
            .await
            .unwrap()
            .expect("must load succeed");
        assert_eq!("access_key_id", cred.access_key_id);
        assert_eq!("secret_access_key", cred.secret_access_key);
    }

    #[tokio::test]
    async fn test_push_front_takes_precedence() {
        let _ = env_logger::builder().is_test(true).try_init();

        let ctx = ctx_with_envs(HashMap::from([
            (AWS_ACCESS_KEY_ID.to_string(), "env_access_key".to_string()),
            (
                AWS_SECRET_ACCESS_KEY.to_string(),
                "env_secret_key".to_string(),
            ),
        ]));

        let provider = DefaultCredentialProvider::new()
            .push_front(StaticCredentialProvider::new("static_access_key", "static_secret_key"));

        let cred = provider
            .provide_credential(&ctx)
            .await
            .unwrap()
            .expect("credential must exist");
        assert_eq!("static_access_key", cred.access_key_id);
        assert_eq!("static_secret_key", cred.secret_access_key);
    }
}
