/// Output Evaluator - Response Classification and Test Scoring
///
/// **Core Responsibility:**
/// Turn a raw execution-service response into one classified outcome, and
/// judge an outcome against a test case's expected output.
///
/// **Critical Properties:**
/// - Knows nothing about HTTP, timeouts or retries
/// - Pure functions: (response) → outcome, (outcome, test case) → result
///
/// **Classification Precedence:**
/// 1. Compile-stage stderr (non-empty) → compilation error
/// 2. Run-stage stderr (non-empty) → runtime error
/// 3. Run-stage output → output, or the "no output" placeholder when empty
/// 4. Otherwise → the service's own error message
///
/// **Normalization Rules:**
/// - Trim leading and trailing whitespace on both sides
/// - Case sensitive, internal whitespace preserved

use crate::engine::ExecError;
use exampad_common::types::{ExecutionResponse, TestCase, TestResult, TestSummary};

pub const NO_OUTPUT: &str = "No output";

/// Classified response from one completed execution.
///
/// Compile and runtime errors are completed executions from the client's
/// point of view; they are not [`ExecError`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    CompileError(String),
    RuntimeError(String),
    Output(String),
    NoOutput,
    ServiceError(String),
}

impl ExecutionOutcome {
    /// Text for the output pane
    pub fn display(&self) -> String {
        match self {
            ExecutionOutcome::CompileError(stderr) => format!("Compilation Error:\n{}", stderr),
            ExecutionOutcome::RuntimeError(stderr) => format!("Runtime Error:\n{}", stderr),
            ExecutionOutcome::Output(stdout) => stdout.clone(),
            ExecutionOutcome::NoOutput => NO_OUTPUT.to_string(),
            ExecutionOutcome::ServiceError(message) => format!("Error: {}", message),
        }
    }

    /// Program stdout, when the program actually ran cleanly
    pub fn stdout(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Output(stdout) => Some(stdout),
            ExecutionOutcome::NoOutput => Some(""),
            _ => None,
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

pub fn classify(response: &ExecutionResponse) -> ExecutionOutcome {
    if let Some(stderr) = non_empty(response.compile_stderr()) {
        return ExecutionOutcome::CompileError(stderr.to_string());
    }
    if let Some(stderr) = non_empty(response.run_stderr()) {
        return ExecutionOutcome::RuntimeError(stderr.to_string());
    }
    if let Some(output) = response.run_output() {
        return if output.is_empty() {
            ExecutionOutcome::NoOutput
        } else {
            ExecutionOutcome::Output(output.to_string())
        };
    }
    ExecutionOutcome::ServiceError(
        response
            .message
            .clone()
            .unwrap_or_else(|| "Unknown error from execution service".to_string()),
    )
}

/// Normalize output string for comparison
fn normalize_output(output: &str) -> &str {
    output.trim()
}

/// Judge a single test case execution
///
/// Clean runs compare normalized stdout; anything else (compile/runtime
/// error, service error, timeout, transport failure) is a failure carrying
/// its display message.
pub fn evaluate_test(execution: &Result<ExecutionOutcome, ExecError>, test_case: &TestCase) -> TestResult {
    match execution {
        Ok(outcome) => match outcome.stdout() {
            Some(stdout) => TestResult {
                success: normalize_output(stdout) == normalize_output(&test_case.expected),
                actual: Some(stdout.to_string()),
                error: None,
            },
            None => TestResult {
                success: false,
                actual: None,
                error: Some(outcome.display()),
            },
        },
        Err(e) => TestResult {
            success: false,
            actual: None,
            error: Some(e.user_message()),
        },
    }
}

/// Aggregate test results into a pass count
pub fn summarize<'a>(results: impl IntoIterator<Item = &'a TestResult>) -> TestSummary {
    let mut summary = TestSummary { passed: 0, total: 0 };
    for result in results {
        summary.total += 1;
        if result.success {
            summary.passed += 1;
        }
    }
    summary
}
