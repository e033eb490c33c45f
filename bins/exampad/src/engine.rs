/// Execution Client - Remote Code Execution
///
/// **Core Responsibility:**
/// Submit the editor buffer (plus optional stdin) to the remote execution
/// service and return one classified outcome.
///
/// **Critical Architectural Boundary:**
/// - The transport knows HOW to reach the service (HTTP here, a script in tests)
/// - The client owns the limits: content policy, cooldown gate, timeout, retry
/// - Classification of the response lives in the evaluator
///
/// **Execution Rules:**
/// 1. Content policy is checked first; a violation never reaches the network
/// 2. Every attempt is wrapped in a hard timeout; expiry drops the in-flight
///    request and is reported as a timeout, distinct from other failures
/// 3. Any failure (timeout included) is retried once; the second failure
///    propagates
/// 4. "Run" actions pass a process-wide cooldown gate; the test runner passes
///    it once per whole test run, not per test case

use crate::config::RuntimeTable;
use crate::evaluator::{classify, ExecutionOutcome};
use crate::policy::{ContentPolicy, PolicyViolation};
use async_trait::async_trait;
use exampad_common::config::ExamConfig;
use exampad_common::types::{ExecutionRequest, ExecutionResponse, Language};
use reqwest::header::CONTENT_TYPE;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error(transparent)]
    Policy(#[from] PolicyViolation),
    #[error("run rejected by cooldown ({remaining_ms}ms remaining)")]
    Cooldown { remaining_ms: u64 },
    #[error("execution timed out after {0}ms")]
    Timeout(u64),
    #[error("execution request failed: {0}")]
    Transport(String),
    #[error("no runtime configured for language: {0}")]
    UnknownLanguage(String),
}

impl ExecError {
    /// Rejected before any network call; never retried
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            ExecError::Policy(_) | ExecError::Cooldown { .. } | ExecError::UnknownLanguage(_)
        )
    }

    /// Text for the output pane
    pub fn user_message(&self) -> String {
        match self {
            ExecError::Policy(violation) => violation.to_string(),
            ExecError::Cooldown { .. } => {
                "Please wait a moment before running your code again.".to_string()
            }
            ExecError::Timeout(_) => {
                "Execution timed out. Please try again or check your network connection."
                    .to_string()
            }
            ExecError::Transport(message) => format!("Error: {}", message),
            ExecError::UnknownLanguage(language) => {
                format!("Error: language '{}' is not supported", language)
            }
        }
    }
}

/// How a request reaches the execution service
#[async_trait]
pub trait ExecutionTransport: Send + Sync {
    async fn submit(&self, request: &ExecutionRequest) -> Result<ExecutionResponse, ExecError>;
}

/// JSON-over-HTTP transport for a Piston-compatible service
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ExecutionTransport for HttpTransport {
    async fn submit(&self, request: &ExecutionRequest) -> Result<ExecutionResponse, ExecError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| ExecError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ExecError::Transport(format!("status {}: {}", status, text)));
        }

        response
            .json::<ExecutionResponse>()
            .await
            .map_err(|e| ExecError::Transport(format!("invalid response: {}", e)))
    }
}

/// Rate-limited, retrying execution client for one editor instance
pub struct ExecutionClient {
    transport: Arc<dyn ExecutionTransport>,
    runtimes: RuntimeTable,
    policy: ContentPolicy,
    timeout: Duration,
    cooldown: Duration,
    max_retries: u32,
    last_run: Option<Instant>,
}

impl ExecutionClient {
    pub fn new(transport: Arc<dyn ExecutionTransport>, runtimes: RuntimeTable, config: &ExamConfig) -> Self {
        Self {
            transport,
            runtimes,
            policy: ContentPolicy::from_config(config),
            timeout: config.timeout(),
            cooldown: config.cooldown(),
            max_retries: config.max_retries,
            last_run: None,
        }
    }

    /// Client talking HTTP to the configured endpoint
    pub fn http(runtimes: RuntimeTable, config: &ExamConfig) -> Self {
        Self::new(Arc::new(HttpTransport::new(config.endpoint.clone())), runtimes, config)
    }

    /// Cooldown gate for a user-initiated Run / Run Tests action.
    ///
    /// Accepting stamps the gate; rejecting leaves it untouched.
    pub fn acquire_run_slot(&mut self) -> Result<(), ExecError> {
        let now = Instant::now();
        if let Some(last) = self.last_run {
            let elapsed = now.duration_since(last);
            if elapsed < self.cooldown {
                let remaining_ms = (self.cooldown - elapsed).as_millis() as u64;
                warn!(remaining_ms, "Run rejected by cooldown");
                return Err(ExecError::Cooldown { remaining_ms });
            }
        }
        self.last_run = Some(now);
        Ok(())
    }

    /// Execute without touching the cooldown gate; callers acting on a
    /// user's Run pass `acquire_run_slot` first
    #[instrument(skip(self, language, source, stdin), fields(language = %language, source_chars = source.chars().count()))]
    pub async fn execute(
        &self,
        language: Language,
        source: &str,
        stdin: &str,
    ) -> Result<ExecutionOutcome, ExecError> {
        if let Err(violation) = self.policy.check(source, stdin) {
            warn!(reason = %violation, "Execution rejected by content policy");
            return Err(violation.into());
        }
        let runtime = self.runtimes.get(&language)?;
        let request = ExecutionRequest::new(&runtime.language, &runtime.version, source, stdin);

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!(attempt, version = %runtime.version, "Submitting execution request");

            match self.attempt(&request).await {
                Ok(response) => {
                    let outcome = classify(&response);
                    info!(attempt, outcome = outcome_kind(&outcome), "Execution completed");
                    return Ok(outcome);
                }
                Err(e) if attempt <= self.max_retries => {
                    warn!(attempt, error = %e, "Execution attempt failed, retrying");
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Execution failed");
                    return Err(e);
                }
            }
        }
    }

    async fn attempt(&self, request: &ExecutionRequest) -> Result<ExecutionResponse, ExecError> {
        // Dropping the submit future on expiry aborts the in-flight request
        match tokio::time::timeout(self.timeout, self.transport.submit(request)).await {
            Ok(result) => result,
            Err(_) => Err(ExecError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

fn outcome_kind(outcome: &ExecutionOutcome) -> &'static str {
    match outcome {
        ExecutionOutcome::CompileError(_) => "compile_error",
        ExecutionOutcome::RuntimeError(_) => "runtime_error",
        ExecutionOutcome::Output(_) => "output",
        ExecutionOutcome::NoOutput => "no_output",
        ExecutionOutcome::ServiceError(_) => "service_error",
    }
}
