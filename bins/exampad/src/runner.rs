// Test case orchestration
// Runs the buffer against every test case in order, one request at a time.

use crate::engine::{ExecError, ExecutionClient};
use crate::evaluator::{evaluate_test, summarize};
use exampad_common::types::{Language, TestCase, TestResult, TestSummary};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

pub struct TestRunner {
    cases: Vec<TestCase>,
    results: BTreeMap<usize, TestResult>,
}

impl TestRunner {
    pub fn new(cases: Vec<TestCase>) -> Self {
        Self {
            cases,
            results: BTreeMap::new(),
        }
    }

    /// Results of the last full run, keyed by test case index
    pub fn results(&self) -> &BTreeMap<usize, TestResult> {
        &self.results
    }

    /// Run every test case sequentially.
    ///
    /// Returns `Ok(None)` without touching anything when there are no test
    /// cases. The cooldown gate is checked once for the whole run; a
    /// rejection leaves the previous results in place.
    #[instrument(skip(self, client, language, source), fields(language = %language, test_count = self.cases.len()))]
    pub async fn run_tests(
        &mut self,
        client: &mut ExecutionClient,
        language: Language,
        source: &str,
    ) -> Result<Option<TestSummary>, ExecError> {
        if self.cases.is_empty() {
            return Ok(None);
        }
        client.acquire_run_slot()?;
        self.results.clear();

        for (idx, test_case) in self.cases.iter().enumerate() {
            let execution = client.execute(language, source, &test_case.input).await;
            let result = evaluate_test(&execution, test_case);

            debug!(
                test_num = idx + 1,
                success = result.success,
                error = result.error.as_deref().unwrap_or(""),
                "Test result"
            );
            self.results.insert(idx, result);
        }

        let summary = summarize(self.results.values());
        info!(
            passed = summary.passed,
            total = summary.total,
            all_passed = summary.all_passed(),
            "Test run complete"
        );
        Ok(Some(summary))
    }
}
