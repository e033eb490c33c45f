/// Scenario tests for the execution client and test runner
///
/// These tests replace the execution service with scripted transports and
/// run on tokio's paused clock, so timeouts and cooldowns are exercised
/// without waiting:
/// 1. Retry happens exactly once, for timeouts and transport failures alike
/// 2. Local rejections (policy, cooldown) never reach the transport
/// 3. The test runner checks the cooldown once per run and executes
///    test cases in order

use crate::config::RuntimeTable;
use crate::engine::{ExecError, ExecutionClient, ExecutionTransport};
use async_trait::async_trait;
use exampad_common::config::ExamConfig;
use exampad_common::types::{ExecutionRequest, ExecutionResponse};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) enum Reply {
    Respond(ExecutionResponse),
    Fail(&'static str),
    Hang,
}

/// Transport that plays back a fixed list of replies
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ExecutionRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<ExecutionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionTransport for ScriptedTransport {
    async fn submit(&self, request: &ExecutionRequest) -> Result<ExecutionResponse, ExecError> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(message)) => Err(ExecError::Transport(message.to_string())),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(ExecError::Transport("no scripted reply".to_string())),
        }
    }
}

/// Transport standing in for a program that prints the sum of the integers
/// on stdin
pub(crate) struct SumProgram {
    calls: AtomicUsize,
}

impl SumProgram {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExecutionTransport for SumProgram {
    async fn submit(&self, request: &ExecutionRequest) -> Result<ExecutionResponse, ExecError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let sum: i64 = request
            .stdin
            .split_whitespace()
            .filter_map(|token| token.parse::<i64>().ok())
            .sum();
        Ok(ExecutionResponse::with_output(&format!("{}\n", sum)))
    }
}

pub(crate) fn client_with(transport: Arc<dyn ExecutionTransport>) -> ExecutionClient {
    ExecutionClient::new(transport, RuntimeTable::builtin(), &ExamConfig::default())
}

#[cfg(test)]
mod execution_client_tests {
    use super::*;
    use crate::evaluator::ExecutionOutcome;
    use crate::policy::PolicyViolation;
    use crate::runner::TestRunner;
    use exampad_common::types::{Language, StageOutput, TestCase, TestSummary};
    use std::time::Duration;
    use tokio::time::Instant;

    async fn gated_run(
        client: &mut ExecutionClient,
        language: Language,
        source: &str,
        stdin: &str,
    ) -> Result<ExecutionOutcome, ExecError> {
        client.acquire_run_slot()?;
        client.execute(language, source, stdin).await
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_uses_pinned_runtime() {
        let transport = ScriptedTransport::new(vec![Reply::Respond(ExecutionResponse::with_output("hi\n"))]);
        let mut client = client_with(transport.clone());

        let outcome = gated_run(&mut client, Language::Python, "print(input())", "hi").await;
        assert_eq!(outcome, Ok(ExecutionOutcome::Output("hi\n".to_string())));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].language, "python");
        assert_eq!(requests[0].version, "3.10.0");
        assert_eq!(requests[0].source(), "print(input())");
        assert_eq!(requests[0].stdin, "hi");
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_retried_once() {
        let transport = ScriptedTransport::new(vec![
            Reply::Fail("connection reset"),
            Reply::Respond(ExecutionResponse::with_output("ok")),
        ]);
        let client = client_with(transport.clone());

        let outcome = client.execute(Language::C, "int main(){}", "").await;
        assert_eq!(outcome, Ok(ExecutionOutcome::Output("ok".to_string())));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_failure_propagates() {
        let transport = ScriptedTransport::new(vec![
            Reply::Fail("connection reset"),
            Reply::Fail("connection refused"),
            Reply::Respond(ExecutionResponse::with_output("never reached")),
        ]);
        let client = client_with(transport.clone());

        let outcome = client.execute(Language::Java, "class Main {}", "").await;
        assert_eq!(outcome, Err(ExecError::Transport("connection refused".to_string())));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_distinct_and_retried() {
        let transport = ScriptedTransport::new(vec![Reply::Hang, Reply::Hang]);
        let client = client_with(transport.clone());
        let started = Instant::now();

        let outcome = client.execute(Language::Python, "print(1)", "").await;
        assert_eq!(outcome, Err(ExecError::Timeout(20_000)));
        assert_eq!(transport.calls(), 2);
        assert!(started.elapsed() >= Duration::from_millis(40_000));
        assert!(outcome.unwrap_err().user_message().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_success() {
        let transport = ScriptedTransport::new(vec![
            Reply::Hang,
            Reply::Respond(ExecutionResponse::with_output("late\n")),
        ]);
        let client = client_with(transport.clone());

        let outcome = client.execute(Language::JavaScript, "console.log('late')", "").await;
        assert_eq!(outcome, Ok(ExecutionOutcome::Output("late\n".to_string())));
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_errors_are_not_retried() {
        let compile_error = ExecutionResponse {
            compile: Some(StageOutput {
                stderr: Some("error: expected ';'".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let transport = ScriptedTransport::new(vec![Reply::Respond(compile_error)]);
        let client = client_with(transport.clone());

        let outcome = client.execute(Language::Cpp, "int main() { return 0 }", "").await;
        assert_eq!(
            outcome,
            Ok(ExecutionOutcome::CompileError("error: expected ';'".to_string()))
        );
        assert_eq!(transport.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_source_never_sent() {
        let transport = ScriptedTransport::new(vec![]);
        let mut client = client_with(transport.clone());

        let outcome = gated_run(&mut client, Language::Python, &"x".repeat(20_001), "").await;
        assert_eq!(
            outcome,
            Err(ExecError::Policy(PolicyViolation::SourceTooLong { limit: 20_000 }))
        );
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_oversized_stdin_and_unsafe_code_never_sent() {
        let transport = ScriptedTransport::new(vec![]);
        let client = client_with(transport.clone());

        let outcome = client.execute(Language::Python, "print(1)", &"9".repeat(5_001)).await;
        assert!(matches!(outcome, Err(ExecError::Policy(PolicyViolation::StdinTooLong { .. }))));

        let outcome = client.execute(Language::C, "int main() { fork(); }", "").await;
        assert!(matches!(outcome, Err(ExecError::Policy(PolicyViolation::UnsafePattern(_)))));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_rejects_fast_second_run() {
        let transport = SumProgram::new();
        let mut client = client_with(transport.clone());

        assert!(gated_run(&mut client, Language::Python, "s", "1 2").await.is_ok());

        tokio::time::advance(Duration::from_millis(1_500)).await;
        let outcome = gated_run(&mut client, Language::Python, "s", "1 2").await;
        assert_eq!(outcome, Err(ExecError::Cooldown { remaining_ms: 500 }));
        assert_eq!(transport.calls(), 1);

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(gated_run(&mut client, Language::Python, "s", "1 2").await.is_ok());
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_sum_program_all_pass() {
        let transport = SumProgram::new();
        let mut client = client_with(transport.clone());
        let mut runner = TestRunner::new(vec![
            TestCase::new("10 20", "30"),
            TestCase::new("5 5", "10"),
        ]);

        let summary = runner
            .run_tests(&mut client, Language::Python, "a, b = map(int, input().split())\nprint(a + b)")
            .await;
        assert_eq!(summary, Ok(Some(TestSummary { passed: 2, total: 2 })));
        assert_eq!(transport.calls(), 2);

        let results = runner.results();
        assert_eq!(results.keys().copied().collect::<Vec<_>>(), vec![0, 1]);
        assert!(results[&0].success);
        assert_eq!(results[&0].actual.as_deref(), Some("30\n"));
        assert!(results[&1].success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_checks_cooldown_once_per_run() {
        let transport = SumProgram::new();
        let mut client = client_with(transport.clone());
        let mut runner = TestRunner::new(vec![
            TestCase::new("1", "1"),
            TestCase::new("2", "2"),
            TestCase::new("3", "4"),
        ]);

        let summary = runner.run_tests(&mut client, Language::C, "int main(){}").await;
        assert_eq!(summary, Ok(Some(TestSummary { passed: 2, total: 3 })));
        assert_eq!(transport.calls(), 3);
        assert!(!runner.results()[&2].success);
        assert_eq!(runner.results()[&2].actual.as_deref(), Some("3\n"));

        // A second run right away is rejected and keeps the old results
        let again = runner.run_tests(&mut client, Language::C, "int main(){}").await;
        assert!(matches!(again, Err(ExecError::Cooldown { .. })));
        assert_eq!(runner.results().len(), 3);
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_records_failures() {
        let transport = ScriptedTransport::new(vec![
            Reply::Respond(ExecutionResponse::with_output("6\n")),
            Reply::Fail("bad gateway"),
            Reply::Fail("bad gateway"),
            Reply::Hang,
            Reply::Hang,
        ]);
        let mut client = client_with(transport.clone());
        let mut runner = TestRunner::new(vec![
            TestCase::new("", "6"),
            TestCase::new("", "7"),
            TestCase::new("", "8"),
        ]);

        let summary = runner.run_tests(&mut client, Language::Python, "print(6)").await;
        assert_eq!(summary, Ok(Some(TestSummary { passed: 1, total: 3 })));
        assert_eq!(transport.calls(), 5);

        let results = runner.results();
        assert!(results[&0].success);
        assert_eq!(results[&1].error.as_deref(), Some("Error: bad gateway"));
        assert!(results[&2].error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_without_cases_is_noop() {
        let transport = SumProgram::new();
        let mut client = client_with(transport.clone());
        let mut runner = TestRunner::new(vec![]);

        assert_eq!(runner.run_tests(&mut client, Language::Python, "x").await, Ok(None));
        assert_eq!(transport.calls(), 0);
        assert!(runner.results().is_empty());

        // The gate was not stamped
        assert!(gated_run(&mut client, Language::Python, "x", "1").await.is_ok());
    }
}
