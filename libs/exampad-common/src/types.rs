use serde::{Deserialize, Serialize};
use std::fmt;

/// Languages the exam editor can hold and submit for execution.
///
/// The lowercase key is what gets persisted (`exam_language`) and what
/// appears in the per-question storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "c")]
    C,
    #[serde(rename = "c++", alias = "cpp")]
    Cpp,
    #[serde(rename = "java")]
    Java,
    #[serde(rename = "python", alias = "python3", alias = "py")]
    Python,
    #[serde(rename = "javascript", alias = "js")]
    JavaScript,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::C,
        Language::Cpp,
        Language::Java,
        Language::Python,
        Language::JavaScript,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cpp => "c++",
            Language::Java => "java",
            Language::Python => "python",
            Language::JavaScript => "javascript",
        }
    }

    /// Parse a language key, accepting the usual short aliases.
    pub fn from_key(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "c" => Some(Language::C),
            "c++" | "cpp" => Some(Language::Cpp),
            "java" => Some(Language::Java),
            "python" | "python3" | "py" => Some(Language::Python),
            "javascript" | "js" => Some(Language::JavaScript),
            _ => None,
        }
    }

    /// Line-comment marker used by the comment toggle.
    pub fn comment_marker(&self) -> &'static str {
        match self {
            Language::Python => "#",
            _ => "//",
        }
    }

    /// Starter text shown when nothing has been saved for a question.
    pub fn default_template(&self) -> &'static str {
        match self {
            Language::C => {
                "#include <stdio.h>\n\nint main() {\n    printf(\"Hello, World!\\n\");\n    return 0;\n}\n"
            }
            Language::Cpp => {
                "#include <iostream>\nusing namespace std;\n\nint main() {\n    cout << \"Hello, World!\" << endl;\n    return 0;\n}\n"
            }
            Language::Java => {
                "public class Main {\n    public static void main(String[] args) {\n        System.out.println(\"Hello, World!\");\n    }\n}\n"
            }
            Language::Python => "print(\"Hello, World!\")\n",
            Language::JavaScript => "console.log(\"Hello, World!\");\n",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    #[serde(alias = "expected_output")]
    pub expected: String,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected: expected.into(),
        }
    }
}

/// Outcome of one test case from the most recent full test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestSummary {
    pub passed: usize,
    pub total: usize,
}

impl TestSummary {
    pub fn all_passed(&self) -> bool {
        self.total > 0 && self.passed == self.total
    }
}

impl fmt::Display for TestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} tests passed", self.passed, self.total)
    }
}

/// Event emitted to the host on every buffer edit and after every run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusEvent {
    pub code: String,
    pub passed: Option<usize>,
    /// Set only after a full test run
    pub all_passed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub content: String,
}

/// Wire body posted to the execution service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub language: String,
    pub version: String,
    pub files: Vec<SourceFile>,
    pub stdin: String,
}

impl ExecutionRequest {
    pub fn new(language: &str, version: &str, source: &str, stdin: &str) -> Self {
        Self {
            language: language.to_string(),
            version: version.to_string(),
            files: vec![SourceFile {
                content: source.to_string(),
            }],
            stdin: stdin.to_string(),
        }
    }

    pub fn source(&self) -> &str {
        self.files.first().map(|f| f.content.as_str()).unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

/// Response body of the execution service. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile: Option<StageOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<StageOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExecutionResponse {
    pub fn compile_stderr(&self) -> Option<&str> {
        self.compile.as_ref().and_then(|c| c.stderr.as_deref())
    }

    pub fn run_stderr(&self) -> Option<&str> {
        self.run.as_ref().and_then(|r| r.stderr.as_deref())
    }

    /// Combined run output, falling back to plain stdout.
    pub fn run_output(&self) -> Option<&str> {
        self.run
            .as_ref()
            .and_then(|r| r.output.as_deref().or(r.stdout.as_deref()))
    }

    /// Successful run that printed `stdout`.
    pub fn with_output(stdout: &str) -> Self {
        Self {
            run: Some(StageOutput {
                stdout: Some(stdout.to_string()),
                stderr: Some(String::new()),
                output: Some(stdout.to_string()),
            }),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_keys_roundtrip() {
        for lang in Language::ALL {
            assert_eq!(Language::from_key(lang.key()), Some(lang));
        }
        assert_eq!(Language::from_key("cpp"), Some(Language::Cpp));
        assert_eq!(Language::from_key(" Python "), Some(Language::Python));
        assert_eq!(Language::from_key("cobol"), None);
    }

    #[test]
    fn test_comment_markers() {
        assert_eq!(Language::Python.comment_marker(), "#");
        assert_eq!(Language::Java.comment_marker(), "//");
        assert_eq!(Language::Cpp.comment_marker(), "//");
    }

    #[test]
    fn test_language_serde_uses_keys() {
        let json = serde_json::to_string(&Language::Cpp).unwrap();
        assert_eq!(json, "\"c++\"");
        let lang: Language = serde_json::from_str("\"js\"").unwrap();
        assert_eq!(lang, Language::JavaScript);
    }

    #[test]
    fn test_request_wire_format() {
        let req = ExecutionRequest::new("python", "3.10.0", "print(1)", "");
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["language"], "python");
        assert_eq!(value["version"], "3.10.0");
        assert_eq!(value["files"][0]["content"], "print(1)");
        assert_eq!(value["stdin"], "");
    }

    #[test]
    fn test_response_ignores_unknown_fields() {
        let body = r#"{
            "language": "python",
            "version": "3.10.0",
            "run": {"stdout": "3\n", "stderr": "", "output": "3\n", "code": 0, "signal": null}
        }"#;
        let resp: ExecutionResponse = serde_json::from_str(body).unwrap();
        assert_eq!(resp.run_output(), Some("3\n"));
        assert_eq!(resp.run_stderr(), Some(""));
        assert_eq!(resp.compile_stderr(), None);
        assert_eq!(resp.message, None);
    }

    #[test]
    fn test_summary_all_passed() {
        assert!(TestSummary { passed: 2, total: 2 }.all_passed());
        assert!(!TestSummary { passed: 1, total: 2 }.all_passed());
        assert!(!TestSummary { passed: 0, total: 0 }.all_passed());
        assert_eq!(TestSummary { passed: 2, total: 2 }.to_string(), "2/2 tests passed");
    }
}
