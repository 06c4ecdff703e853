//! Remote execution sessions.
//!
//! The [`Connector`] / [`Session`] traits decouple orchestration from the
//! transport. [`HttpConnector`] talks JSON over HTTP to the execution service;
//! tests use scripted connectors that never touch the network.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::core::dialect::Dialect;
use crate::core::types::RemoteFailure;
use crate::error::RunError;

/// Why a submission did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    /// The runtime ran the code and reported an error.
    #[error("{}", render_failure(.0))]
    Execution(RemoteFailure),
    /// The session itself broke (transport error, protocol error, lost session).
    #[error("{0}")]
    Infrastructure(String),
}

fn render_failure(failure: &RemoteFailure) -> String {
    match &failure.category {
        Some(category) => format!("{category}: {}", failure.message),
        None => failure.message.clone(),
    }
}

/// An open session that runs code and blocks until the runtime answers.
pub trait Session {
    fn run(&mut self, code: &str) -> Result<(), SubmitError>;
}

/// Opens sessions; one call is one connection attempt.
pub trait Connector {
    type Session: Session;

    /// `host:port` (or URL) used in diagnostics.
    fn endpoint(&self) -> String;

    fn connect(&self, dialect: Dialect) -> Result<Self::Session>;
}

/// How hard to try before giving up on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub delay: Duration,
}

/// Connect, retrying up to `policy.max_retries` more times after a failure.
#[instrument(skip_all, fields(endpoint = %connector.endpoint(), dialect = %dialect, max_retries = policy.max_retries))]
pub fn connect_with_retry<C: Connector>(
    connector: &C,
    dialect: Dialect,
    policy: &RetryPolicy,
) -> Result<C::Session, RunError> {
    let attempts = policy.max_retries.saturating_add(1);
    let mut last_error = String::new();
    for attempt in 1..=attempts {
        match connector.connect(dialect) {
            Ok(session) => {
                info!(attempt, "connected");
                return Ok(session);
            }
            Err(err) => {
                last_error = format!("{err:#}");
                warn!(attempt, attempts, err = %last_error, "connection attempt failed");
                if attempt < attempts && !policy.delay.is_zero() {
                    thread::sleep(policy.delay);
                }
            }
        }
    }
    Err(RunError::Connection {
        endpoint: connector.endpoint(),
        attempts,
        last_error,
    })
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    dialect: &'a str,
}

#[derive(Deserialize)]
struct CreateSessionResponse {
    session_id: String,
}

#[derive(Serialize)]
struct RunRequest<'a> {
    code: &'a str,
}

#[derive(Deserialize)]
struct RunResponse {
    success: bool,
    #[serde(default)]
    error: Option<RemoteFailure>,
}

/// Connector for the HTTP execution service.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpConnector {
    /// `host` may be a bare host name or a full `http(s)://` URL prefix.
    pub fn new(host: &str, port: u16, connect_timeout: Duration) -> Result<Self> {
        let host = host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            Self::with_base_url(&format!("{host}:{port}"), connect_timeout)
        } else {
            Self::with_base_url(&format!("http://{host}:{port}"), connect_timeout)
        }
    }

    pub fn with_base_url(base_url: &str, connect_timeout: Duration) -> Result<Self> {
        // Submissions block until the runtime finishes; only connecting is bounded.
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(None::<Duration>)
            .build()
            .context("build http client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

impl Connector for HttpConnector {
    type Session = HttpSession;

    fn endpoint(&self) -> String {
        self.base_url.clone()
    }

    fn connect(&self, dialect: Dialect) -> Result<HttpSession> {
        let url = format!("{}/sessions", self.base_url);
        debug!(%url, %dialect, "opening session");
        let created: CreateSessionResponse = self
            .client
            .post(&url)
            .json(&CreateSessionRequest {
                dialect: dialect.as_str(),
            })
            .send()
            .with_context(|| format!("POST {url}"))?
            .error_for_status()
            .with_context(|| format!("POST {url}"))?
            .json()
            .context("decode session response")?;
        Ok(HttpSession {
            client: self.client.clone(),
            run_url: format!("{}/sessions/{}/run", self.base_url, created.session_id),
        })
    }
}

/// Session handle on the HTTP execution service.
#[derive(Debug)]
pub struct HttpSession {
    client: reqwest::blocking::Client,
    run_url: String,
}

impl Session for HttpSession {
    fn run(&mut self, code: &str) -> Result<(), SubmitError> {
        let response = self
            .client
            .post(&self.run_url)
            .json(&RunRequest { code })
            .send()
            .map_err(|err| SubmitError::Infrastructure(format!("POST {}: {err}", self.run_url)))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(SubmitError::Infrastructure(format!(
                "POST {} returned {status}: {}",
                self.run_url,
                body.trim()
            )));
        }
        let outcome: RunResponse = response
            .json()
            .map_err(|err| SubmitError::Infrastructure(format!("decode run response: {err}")))?;
        if outcome.success {
            return Ok(());
        }
        Err(SubmitError::Execution(outcome.error.unwrap_or(RemoteFailure {
            category: None,
            message: "runtime reported failure without detail".to_string(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FlakyConnector {
        failures: u32,
        calls: Cell<u32>,
    }

    #[derive(Debug)]
    struct NullSession;

    impl Session for NullSession {
        fn run(&mut self, _code: &str) -> Result<(), SubmitError> {
            Ok(())
        }
    }

    impl Connector for FlakyConnector {
        type Session = NullSession;

        fn endpoint(&self) -> String {
            "localhost:10000".to_string()
        }

        fn connect(&self, _dialect: Dialect) -> Result<NullSession> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if call <= self.failures {
                anyhow::bail!("connection refused (attempt {call})");
            }
            Ok(NullSession)
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            delay: Duration::ZERO,
        }
    }

    #[test]
    fn retries_until_connected() {
        let connector = FlakyConnector {
            failures: 2,
            calls: Cell::new(0),
        };
        connect_with_retry(&connector, Dialect::Python, &policy(3)).expect("connect");
        assert_eq!(connector.calls.get(), 3);
    }

    #[test]
    fn gives_up_after_max_retries() {
        let connector = FlakyConnector {
            failures: u32::MAX,
            calls: Cell::new(0),
        };
        let err = connect_with_retry(&connector, Dialect::Python, &policy(2)).unwrap_err();
        assert_eq!(connector.calls.get(), 3);
        match err {
            RunError::Connection {
                attempts,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("attempt 3"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn execution_failure_renders_category() {
        let err = SubmitError::Execution(RemoteFailure {
            category: Some("NameError".to_string()),
            message: "name 'x' is not defined".to_string(),
        });
        assert_eq!(err.to_string(), "NameError: name 'x' is not defined");
    }

    #[test]
    fn http_base_url_accepts_scheme() {
        let plain = HttpConnector::new("localhost", 10000, Duration::from_secs(1)).expect("client");
        assert_eq!(plain.endpoint(), "http://localhost:10000");
        let full = HttpConnector::new("https://runtime.local/", 443, Duration::from_secs(1))
            .expect("client");
        assert_eq!(full.endpoint(), "https://runtime.local:443");
    }
}
