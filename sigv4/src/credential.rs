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

use awsreq_core::time::{now, DateTime};
use awsreq_core::utils::Redact;
use awsreq_core::SigningCredential;
use std::fmt::{Debug, Formatter};
use std::time::Duration;

/// Credential that holds the access_key and secret_key.
#[derive(Default, Clone)]
pub struct Credential {
    /// Access key id for aws services.
    pub access_key_id: String,
    /// Secret access key for aws services.
    pub secret_access_key: String,
    /// Session token for aws services.
    pub session_token: Option<String>,
    /// Expiration time for this credential.
    pub expires_in: Option<DateTime>,
}

impl Credential {
    /// Create a credential from a key pair, without a session token.
    pub fn new(access_key_id: &str, secret_access_key: &str) -> Self {
        Self {
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: None,
            expires_in: None,
        }
    }

    /// Whether the credential expires within the given window.
    ///
    /// A credential without an expiration never expires.
    pub fn is_expiring_within(&self, window: Duration) -> bool {
        match self.expires_in {
            Some(expires_in) => {
                expires_in
                    <= now() + chrono::TimeDelta::from_std(window).unwrap_or(chrono::TimeDelta::MAX)
            }
            None => false,
        }
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_key_id", &Redact::from(&self.access_key_id))
            .field("secret_access_key", &Redact::from(&self.secret_access_key))
            .field("session_token", &Redact::from(&self.session_token))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

impl SigningCredential for Credential {
    fn is_valid(&self) -> bool {
        if self.access_key_id.is_empty() || self.secret_access_key.is_empty() {
            return false;
        }
        // Take 120s as buffer to avoid edge cases.
        if let Some(valid) = self
            .expires_in
            .map(|v| v > now() + chrono::TimeDelta::try_minutes(2).expect("in bounds"))
        {
            return valid;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid() {
        assert!(Credential::new("akid", "secret").is_valid());
        assert!(!Credential::default().is_valid());

        let expired = Credential {
            expires_in: Some(now() - chrono::TimeDelta::try_minutes(1).unwrap()),
            ..Credential::new("akid", "secret")
        };
        assert!(!expired.is_valid());

        let live = Credential {
            expires_in: Some(now() + chrono::TimeDelta::try_hours(1).unwrap()),
            ..Credential::new("akid", "secret")
        };
        assert!(live.is_valid());
    }

    #[test]
    fn test_is_expiring_within() {
        let cred = Credential {
            expires_in: Some(now() + chrono::TimeDelta::try_minutes(2).unwrap()),
            ..Credential::new("akid", "secret")
        };
        assert!(cred.is_expiring_within(Duration::from_secs(180)));
        assert!(!cred.is_expiring_within(Duration::from_secs(60)));

        assert!(!Credential::new("akid", "secret").is_expiring_within(Duration::from_secs(180)));
    }

    #[test]
    fn test_debug_redacts() {
        let cred = Credential::new("AKIDEXAMPLEKEYID", "super-secret-value");
        let out = format!("{cred:?}");
        assert!(!out.contains("super-secret-value"));
        assert!(out.contains("***"));
    }
}
