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

use bytes::Bytes;
use std::str::FromStr;
use std::time::Duration;

/// Errors surfaced by the client runtime.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The client or service configuration is unusable.
    #[error("client configuration error: {message}")]
    Config {
        /// What is wrong with the configuration.
        message: String,
    },

    /// No credential source produced a usable credential.
    #[error("credential resolution failed: {message}")]
    Credential {
        /// Why resolution failed.
        message: String,
        /// The underlying provider error, when one exists.
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The request never produced an HTTP response.
    #[error("transport error: {message}")]
    Transport {
        /// What failed at the transport level.
        message: String,
        /// Whether a retry may succeed.
        transient: bool,
        /// The underlying transport error.
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The service answered with a non-2xx response.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// The response could not be decoded into the requested shape.
    #[error("failed to decode response: {message}")]
    Protocol {
        /// What could not be decoded.
        message: String,
        /// The underlying decode error.
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A waiter gave up before its acceptors converged.
    #[error("waiter timed out after {max_wait:?}")]
    WaiterTimeout {
        /// The configured wait budget.
        max_wait: Duration,
    },

    /// A waiter acceptor matched the failure state on a response.
    #[error("waiter reached failure state")]
    WaiterFailed,

    /// The client was used after `shutdown`.
    #[error("client already shut down")]
    AlreadyShutdown,
}

impl Error {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn protocol_with(message: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Error::Protocol {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Whether the retry policy should consider this error at all.
    ///
    /// Retryable classes: transient transport failures, HTTP 5xx, and
    /// HTTP 429 throttling.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport { transient, .. } => *transient,
            Error::Service(err) => err.status >= 500 || err.status == 429,
            _ => false,
        }
    }
}

impl From<awsreq_core::Error> for Error {
    fn from(err: awsreq_core::Error) -> Self {
        use awsreq_core::ErrorKind;
        match err.kind() {
            ErrorKind::ConfigInvalid | ErrorKind::RequestInvalid => Error::Config {
                message: err.to_string(),
            },
            ErrorKind::CredentialInvalid
            | ErrorKind::CredentialExpired
            | ErrorKind::CredentialDenied => Error::Credential {
                message: err.to_string(),
                source: Some(err.into()),
            },
            ErrorKind::Unexpected => {
                let transient = err.is_retryable();
                Error::Transport {
                    message: err.to_string(),
                    transient,
                    source: Some(err.into()),
                }
            }
        }
    }
}

/// A decoded non-2xx service response.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{code} (http status {status}): {message}")]
pub struct ServiceError {
    /// The HTTP status code of the response.
    pub status: u16,
    /// The error code, with any `Exception` suffix and namespace stripped.
    pub code: String,
    /// The human readable message from the response.
    pub message: String,
    /// Which taxonomy the code matched.
    pub kind: ServiceErrorKind,
    /// The undecodable body, kept when no structured error was found.
    pub raw_body: Option<Bytes>,
}

impl PartialEq for ServiceError {
    fn eq(&self, other: &Self) -> bool {
        self.status == other.status
            && self.code == other.code
            && self.message == other.message
            && self.kind == other.kind
    }
}

/// The taxonomy a decoded error code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceErrorKind {
    /// A service-specific code listed in the config's possible error codes.
    Service,
    /// One of the common 4xx client error codes.
    Client,
    /// One of the common 5xx server error codes.
    Server,
    /// A structured error whose code matched no known taxonomy.
    Generic,
    /// The response carried no decodable error structure at all.
    Unhandled,
}

/// The common AWS 4xx error codes shared by every service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ClientErrorCode {
    AccessDenied,
    IncompleteSignature,
    InvalidAction,
    InvalidClientTokenId,
    InvalidParameterCombination,
    InvalidParameterValue,
    InvalidQueryParameter,
    MalformedQueryString,
    MissingAction,
    MissingAuthenticationToken,
    MissingParameter,
    OptInRequired,
    RequestExpired,
    Throttling,
    ValidationError,
}

impl FromStr for ClientErrorCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use ClientErrorCode::*;
        Ok(match s {
            "AccessDenied" => AccessDenied,
            "IncompleteSignature" => IncompleteSignature,
            "InvalidAction" => InvalidAction,
            "InvalidClientTokenId" => InvalidClientTokenId,
            "InvalidParameterCombination" => InvalidParameterCombination,
            "InvalidParameterValue" => InvalidParameterValue,
            "InvalidQueryParameter" => InvalidQueryParameter,
            "MalformedQueryString" => MalformedQueryString,
            "MissingAction" => MissingAction,
            "MissingAuthenticationToken" => MissingAuthenticationToken,
            "MissingParameter" => MissingParameter,
            "OptInRequired" => OptInRequired,
            "RequestExpired" => RequestExpired,
            "Throttling" => Throttling,
            "ValidationError" => ValidationError,
            _ => return Err(()),
        })
    }
}

/// The common AWS 5xx error codes shared by every service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ServerErrorCode {
    InternalFailure,
    ServiceUnavailable,
}

impl FromStr for ServerErrorCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "InternalFailure" => ServerErrorCode::InternalFailure,
            "ServiceUnavailable" => ServerErrorCode::ServiceUnavailable,
            _ => return Err(()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        let throttled = Error::Service(ServiceError {
            status: 429,
            code: "Throttling".into(),
            message: "slow down".into(),
            kind: ServiceErrorKind::Client,
            raw_body: None,
        });
        assert!(throttled.is_retryable());

        let unavailable = Error::Service(ServiceError {
            status: 503,
            code: "ServiceUnavailable".into(),
            message: String::new(),
            kind: ServiceErrorKind::Server,
            raw_body: None,
        });
        assert!(unavailable.is_retryable());

        let bad_request = Error::Service(ServiceError {
            status: 400,
            code: "ValidationError".into(),
            message: String::new(),
            kind: ServiceErrorKind::Client,
            raw_body: None,
        });
        assert!(!bad_request.is_retryable());

        let timeout = Error::Transport {
            message: "request timed out".into(),
            transient: true,
            source: None,
        };
        assert!(timeout.is_retryable());

        assert!(!Error::AlreadyShutdown.is_retryable());
    }

    #[test]
    fn test_code_taxonomies() {
        assert_eq!(
            "Throttling".parse::<ClientErrorCode>(),
            Ok(ClientErrorCode::Throttling)
        );
        assert!("NoSuchBucket".parse::<ClientErrorCode>().is_err());
        assert_eq!(
            "ServiceUnavailable".parse::<ServerErrorCode>(),
            Ok(ServerErrorCode::ServiceUnavailable)
        );
    }
}
