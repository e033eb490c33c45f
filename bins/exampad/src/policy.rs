/// Pre-flight content policy
///
/// Runs before anything is sent to the execution service. A violation never
/// reaches the network and is never retried.
///
/// The pattern scan is a cheap hint for well-meaning users, not a sandbox:
/// trivially obfuscated code passes it.

use exampad_common::config::ExamConfig;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

lazy_static! {
    static ref UNSAFE_PATTERNS: Vec<(Regex, &'static str)> = [
        (r"while\s*\(\s*(true|1)\s*\)", "infinite loop"),
        (r"while\s+True\s*:", "infinite loop"),
        (r"for\s*\(\s*;\s*;\s*\)", "infinite loop"),
        (r"\bfork\s*\(", "process fork"),
        (r"\bsystem\s*\(", "shell command"),
        (r"\bexec[lvpe]*\s*\(", "shell command"),
        (r"\bpopen\s*\(", "shell command"),
        (r"\bsubprocess\b", "shell command"),
        (r"\bchild_process\b", "shell command"),
    ]
    .into_iter()
    .map(|(pattern, label)| (Regex::new(pattern).expect("unsafe-code pattern must compile"), label))
    .collect();
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyViolation {
    #[error("Code is too long (maximum {limit} characters).")]
    SourceTooLong { limit: usize },
    #[error("Input is too long (maximum {limit} characters).")]
    StdinTooLong { limit: usize },
    #[error("Code contains a potentially unsafe pattern ({0}) and was not run.")]
    UnsafePattern(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentPolicy {
    pub max_source_chars: usize,
    pub max_stdin_chars: usize,
}

impl ContentPolicy {
    pub fn from_config(config: &ExamConfig) -> Self {
        Self {
            max_source_chars: config.max_source_chars,
            max_stdin_chars: config.max_stdin_chars,
        }
    }

    pub fn check(&self, source: &str, stdin: &str) -> Result<(), PolicyViolation> {
        if source.chars().count() > self.max_source_chars {
            return Err(PolicyViolation::SourceTooLong {
                limit: self.max_source_chars,
            });
        }
        if stdin.chars().count() > self.max_stdin_chars {
            return Err(PolicyViolation::StdinTooLong {
                limit: self.max_stdin_chars,
            });
        }
        if let Some((_, label)) = UNSAFE_PATTERNS.iter().find(|(re, _)| re.is_match(source)) {
            return Err(PolicyViolation::UnsafePattern(label));
        }
        Ok(())
    }
}

impl Default for ContentPolicy {
    fn default() -> Self {
        Self::from_config(&ExamConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_limits_are_inclusive() {
        let policy = ContentPolicy::default();
        assert!(policy.check(&"a".repeat(20_000), "").is_ok());
        assert_eq!(
            policy.check(&"a".repeat(20_001), ""),
            Err(PolicyViolation::SourceTooLong { limit: 20_000 })
        );
        assert!(policy.check("x", &"1".repeat(5_000)).is_ok());
        assert_eq!(
            policy.check("x", &"1".repeat(5_001)),
            Err(PolicyViolation::StdinTooLong { limit: 5_000 })
        );
    }

    #[test]
    fn test_length_counts_chars() {
        let policy = ContentPolicy {
            max_source_chars: 3,
            max_stdin_chars: 3,
        };
        assert!(policy.check("ééé", "ööö").is_ok());
    }

    #[test]
    fn test_unsafe_patterns() {
        let policy = ContentPolicy::default();
        let cases = [
            ("while(true) {}", "infinite loop"),
            ("while ( 1 ) { x++; }", "infinite loop"),
            ("while True:\n    pass", "infinite loop"),
            ("for(;;) {}", "infinite loop"),
            ("pid_t p = fork();", "process fork"),
            ("system(\"ls\");", "shell command"),
            ("Runtime.getRuntime().exec(\"ls\");", "shell command"),
            ("execvp(argv[0], argv);", "shell command"),
            ("import subprocess", "shell command"),
            ("require('child_process')", "shell command"),
        ];
        for (source, label) in cases {
            assert_eq!(
                policy.check(source, ""),
                Err(PolicyViolation::UnsafePattern(label)),
                "source: {source}"
            );
        }
    }

    #[test]
    fn test_ordinary_code_passes() {
        let policy = ContentPolicy::default();
        let sources = [
            "a, b = map(int, input().split())\nprint(a + b)",
            "while (i < n) { i++; }",
            "int executeTask() { return 0; }",
            "System.out.println(x);",
        ];
        for source in sources {
            assert!(policy.check(source, "").is_ok(), "source: {source}");
        }
    }
}
