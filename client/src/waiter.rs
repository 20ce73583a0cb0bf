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
use std::future::Future;
use std::time::{Duration, Instant};

/// What an acceptor concludes when its matcher fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptorState {
    /// The watched state converged; stop polling and return.
    Success,
    /// The watched state can never converge; stop polling and fail.
    Failure,
    /// Keep polling.
    Retry,
}

/// A matcher over one poll result.
///
/// Matchers hold typed accessors into the output shape, so the waiter never
/// inspects wire data itself.
pub enum Matcher<O> {
    /// Matches against the decoded output.
    Output(Box<dyn Fn(&O) -> bool + Send + Sync>),
    /// Matches a surfaced service error by code.
    ErrorCode(String),
    /// Matches a surfaced service error by HTTP status.
    ErrorStatus(u16),
}

impl<O> Matcher<O> {
    /// Equality against a single field.
    pub fn path<T, F>(getter: F, expected: T) -> Self
    where
        T: PartialEq + Send + Sync + 'static,
        F: Fn(&O) -> Option<T> + Send + Sync + 'static,
    {
        Matcher::Output(Box::new(move |output| {
            getter(output).is_some_and(|value| value == expected)
        }))
    }

    /// Existential match over an array member.
    pub fn any_path<A, T, F, G>(array: F, element: G, expected: T) -> Self
    where
        T: PartialEq + Send + Sync + 'static,
        F: Fn(&O) -> Vec<A> + Send + Sync + 'static,
        G: Fn(&A) -> Option<T> + Send + Sync + 'static,
    {
        Matcher::Output(Box::new(move |output| {
            array(output)
                .iter()
                .any(|item| element(item).is_some_and(|value| value == expected))
        }))
    }

    /// Universal match over an array member.
    ///
    /// An empty array does not match.
    pub fn all_path<A, T, F, G>(array: F, element: G, expected: T) -> Self
    where
        T: PartialEq + Send + Sync + 'static,
        F: Fn(&O) -> Vec<A> + Send + Sync + 'static,
        G: Fn(&A) -> Option<T> + Send + Sync + 'static,
    {
        Matcher::Output(Box::new(move |output| {
            let items = array(output);
            !items.is_empty()
                && items
                    .iter()
                    .all(|item| element(item).is_some_and(|value| value == expected))
        }))
    }

    /// Matches the surfaced error's code.
    pub fn error_code(code: impl Into<String>) -> Self {
        Matcher::ErrorCode(code.into())
    }

    /// Matches the surfaced error's HTTP status.
    pub fn error_status(status: u16) -> Self {
        Matcher::ErrorStatus(status)
    }

    fn matches(&self, result: &Result<O, Error>) -> bool {
        match (self, result) {
            (Matcher::Output(predicate), Ok(output)) => predicate(output),
            (Matcher::ErrorCode(code), Err(Error::Service(err))) => &err.code == code,
            (Matcher::ErrorStatus(status), Err(Error::Service(err))) => err.status == *status,
            _ => false,
        }
    }
}

impl<O> std::fmt::Debug for Matcher<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Matcher::Output(_) => f.write_str("Output(..)"),
            Matcher::ErrorCode(code) => f.debug_tuple("ErrorCode").field(code).finish(),
            Matcher::ErrorStatus(status) => f.debug_tuple("ErrorStatus").field(status).finish(),
        }
    }
}

/// An acceptor pairs a matcher with the state it selects.
#[derive(Debug)]
pub struct Acceptor<O> {
    /// The state selected when the matcher fires.
    pub state: AcceptorState,
    /// The matcher applied to each poll result.
    pub matcher: Matcher<O>,
}

/// Timing bounds for a waiter.
#[derive(Debug, Clone, Copy)]
pub struct WaiterOptions {
    /// The initial delay between polls.
    pub min_delay: Duration,
    /// The ceiling the exponential poll delay grows to.
    pub max_delay: Duration,
    /// The total time budget before the waiter gives up.
    pub max_wait: Duration,
}

impl Default for WaiterOptions {
    fn default() -> Self {
        Self {
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(120),
            max_wait: Duration::from_secs(300),
        }
    }
}

/// Polls an operation until an acceptor converges.
///
/// The delay between polls is `min(max_delay, min_delay * 2^retries)`. The
/// waiter fails with [`Error::WaiterTimeout`] once the cumulative elapsed
/// time would exceed `max_wait`.
pub struct Waiter<O> {
    acceptors: Vec<Acceptor<O>>,
    options: WaiterOptions,
}

impl<O> Waiter<O> {
    /// Create a waiter with the given timing bounds.
    pub fn new(options: WaiterOptions) -> Self {
        Self {
            acceptors: Vec::new(),
            options,
        }
    }

    /// Add an acceptor. Acceptors are evaluated in insertion order.
    pub fn with_acceptor(mut self, state: AcceptorState, matcher: Matcher<O>) -> Self {
        self.acceptors.push(Acceptor { state, matcher });
        self
    }

    /// Poll `command` until an acceptor matches success or failure.
    ///
    /// Returns the final output for a success matched on a response, or
    /// `None` for a success matched on an error (waiting for deletion). An
    /// error no acceptor claims propagates immediately.
    pub async fn wait<F, Fut>(&self, mut command: F) -> Result<Option<O>, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<O, Error>>,
    {
        let started = Instant::now();
        let mut retries: u32 = 0;

        loop {
            let result = command().await;

            let state = self
                .acceptors
                .iter()
                .find(|acceptor| acceptor.matcher.matches(&result))
                .map(|acceptor| acceptor.state);

            match (state, result) {
                (Some(AcceptorState::Success), Ok(output)) => return Ok(Some(output)),
                (Some(AcceptorState::Success), Err(_)) => return Ok(None),
                (Some(AcceptorState::Failure), Err(err)) => return Err(err),
                (Some(AcceptorState::Failure), Ok(_)) => return Err(Error::WaiterFailed),
                (Some(AcceptorState::Retry), _) | (None, Ok(_)) => {}
                // An error no acceptor claims propagates.
                (None, Err(err)) => return Err(err),
            }

            let delay = std::cmp::min(
                self.options.max_delay,
                self.options
                    .min_delay
                    .saturating_mul(1u32 << retries.min(31)),
            );
            retries += 1;

            if started.elapsed() + delay > self.options.max_wait {
                return Err(Error::WaiterTimeout {
                    max_wait: self.options.max_wait,
                });
            }
            tokio::time::sleep(delay).await;
        }
    }
}
