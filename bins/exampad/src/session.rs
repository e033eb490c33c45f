/// Editor Session
///
/// One mounted exam editor: the text engine, the execution client, the test
/// runner, and the persistence shim that mirrors the buffer into the durable
/// store under `(question, language)`.
///
/// Store failures are logged and swallowed; editing never depends on the
/// store being reachable.

use crate::engine::ExecutionClient;
use crate::runner::TestRunner;
use exampad_common::store::{code_key, KvStore, LAST_LANGUAGE_KEY};
use exampad_common::types::{Language, StatusEvent, TestCase, TestResult, TestSummary};
use exampad_editor::{Editor, KeyEvent, KeyOutcome, Selection};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

fn default_language() -> Language {
    Language::Python
}

fn default_true() -> bool {
    true
}

/// Host configuration for one exercise
#[derive(Debug, Clone, Deserialize)]
pub struct SessionOptions {
    pub question_id: String,
    /// Starting buffer for the configured language when nothing is saved
    #[serde(default)]
    pub initial_code: String,
    #[serde(default = "default_language")]
    pub language: Language,
    #[serde(default)]
    pub test_cases: Vec<TestCase>,
    #[serde(default = "default_true")]
    pub allow_copy_paste: bool,
    /// Echoed as `passed` while the buffer still equals `initial_code`
    #[serde(default)]
    pub initial_passed: Option<usize>,
}

impl SessionOptions {
    pub fn new(question_id: impl Into<String>, language: Language) -> Self {
        Self {
            question_id: question_id.into(),
            initial_code: String::new(),
            language,
            test_cases: Vec::new(),
            allow_copy_paste: true,
            initial_passed: None,
        }
    }
}

/// Host-side subscriber for session events
pub trait SessionObserver: Send {
    /// Every buffer edit and every completed run
    fn on_status(&self, _event: &StatusEvent) {}
    /// Every accepted Run, with the code being run
    fn on_run(&self, _code: &str) {}
}

pub struct Session {
    options: SessionOptions,
    language: Language,
    editor: Editor,
    store: Box<dyn KvStore>,
    client: ExecutionClient,
    runner: TestRunner,
    observer: Option<Box<dyn SessionObserver>>,
    output: String,
}

impl Session {
    /// Mount: resolve the language, then load the saved buffer or a default.
    pub fn mount(options: SessionOptions, store: Box<dyn KvStore>, client: ExecutionClient) -> Self {
        let language = options.language;
        let runner = TestRunner::new(options.test_cases.clone());
        let mut session = Self {
            editor: Editor::new("", language.comment_marker()),
            options,
            language,
            store,
            client,
            runner,
            observer: None,
            output: String::new(),
        };
        session.restore();
        session
    }

    /// Hand the store back, e.g. to mount another session on it.
    pub fn unmount(self) -> Box<dyn KvStore> {
        self.store
    }

    /// Register the host's observer, replacing any previous one.
    pub fn subscribe(&mut self, observer: Box<dyn SessionObserver>) {
        self.observer = Some(observer);
    }

    pub fn question_id(&self) -> &str {
        &self.options.question_id
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn code(&self) -> &str {
        self.editor.text()
    }

    /// Current text of the output pane
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn test_results(&self) -> &BTreeMap<usize, TestResult> {
        self.runner.results()
    }

    /// Switch to another question and load its saved state.
    pub fn set_question(&mut self, question_id: impl Into<String>) {
        let question_id = question_id.into();
        if question_id == self.options.question_id {
            return;
        }
        self.options.question_id = question_id;
        self.restore();
    }

    fn restore(&mut self) {
        let saved_language = self
            .read(LAST_LANGUAGE_KEY)
            .and_then(|key| Language::from_key(&key));
        self.language = saved_language.unwrap_or(self.options.language);
        self.load_buffer();
        self.persist();
        info!(
            question_id = %self.options.question_id,
            language = %self.language,
            lines = self.editor.line_count(),
            "Session restored"
        );
    }

    fn load_buffer(&mut self) {
        let key = code_key(&self.options.question_id, &self.language);
        let text = match self.read(&key) {
            Some(saved) => saved,
            None => self.fallback_text(self.language),
        };
        self.editor.load(text);
        self.editor.set_comment_marker(self.language.comment_marker());
    }

    fn fallback_text(&self, language: Language) -> String {
        if language == self.options.language && !self.options.initial_code.is_empty() {
            self.options.initial_code.clone()
        } else {
            language.default_template().to_string()
        }
    }

    fn read(&mut self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "Failed to read from store");
                None
            }
        }
    }

    fn write(&mut self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            warn!(key, error = %e, "Failed to write to store");
        }
    }

    fn persist(&mut self) {
        let key = code_key(&self.options.question_id, &self.language);
        let code = self.editor.text().to_string();
        self.write(&key, &code);
        self.write(LAST_LANGUAGE_KEY, self.language.key());
        debug!(key = %key, chars = code.chars().count(), "Buffer persisted");
    }

    fn edit_passed(&self) -> Option<usize> {
        if self.editor.text() == self.options.initial_code {
            self.options.initial_passed
        } else {
            None
        }
    }

    fn emit_status(&self, passed: Option<usize>, all_passed: Option<bool>) {
        if let Some(observer) = &self.observer {
            observer.on_status(&StatusEvent {
                code: self.editor.text().to_string(),
                passed,
                all_passed,
            });
        }
    }

    fn buffer_changed(&mut self) {
        self.persist();
        self.emit_status(self.edit_passed(), None);
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> KeyOutcome {
        let outcome = self.editor.handle_key(event);
        if outcome.changed {
            self.buffer_changed();
        }
        outcome
    }

    pub fn set_selection(&mut self, selection: Selection) {
        self.editor.set_selection(selection);
    }

    /// Replace the whole buffer as one undoable edit.
    pub fn replace_all(&mut self, text: &str) {
        let len = self.editor.buffer().len_chars();
        self.editor.set_selection(Selection::new(0, len));
        if self.editor.insert_text(text) {
            self.buffer_changed();
        }
    }

    /// Selected text, or `None` when clipboard use is disabled.
    pub fn copy(&self) -> Option<String> {
        if !self.options.allow_copy_paste {
            debug!("Copy blocked");
            return None;
        }
        Some(self.editor.buffer().selected_text().to_string())
    }

    pub fn cut(&mut self) -> Option<String> {
        let text = self.copy()?;
        if self.editor.insert_text("") {
            self.buffer_changed();
        }
        Some(text)
    }

    /// Paste at the selection. Returns false when clipboard use is disabled.
    pub fn paste(&mut self, text: &str) -> bool {
        if !self.options.allow_copy_paste {
            debug!("Paste blocked");
            return false;
        }
        if self.editor.insert_text(text) {
            self.buffer_changed();
        }
        true
    }

    /// Persist the outgoing language, switch, then load the incoming one.
    pub fn switch_language(&mut self, language: Language) {
        if language == self.language {
            return;
        }
        self.persist();
        let previous = self.language;
        self.language = language;
        self.load_buffer();
        self.buffer_changed();
        info!(from = %previous, to = %language, "Language switched");
    }

    /// Run the buffer once with `stdin`; returns the output pane text.
    #[instrument(skip(self, stdin), fields(question_id = %self.options.question_id, language = %self.language))]
    pub async fn run(&mut self, stdin: &str) -> String {
        if let Err(e) = self.client.acquire_run_slot() {
            self.output = e.user_message();
            return self.output.clone();
        }

        let code = self.editor.text().to_string();
        if let Some(observer) = &self.observer {
            observer.on_run(&code);
        }

        self.output = match self.client.execute(self.language, &code, stdin).await {
            Ok(outcome) => outcome.display(),
            Err(e) => {
                if e.is_local() {
                    debug!(error = %e, "Run rejected before submission");
                } else {
                    warn!(error = %e, "Run failed");
                }
                e.user_message()
            }
        };
        self.emit_status(self.edit_passed(), None);
        self.output.clone()
    }

    /// Run every configured test case. `None` when there are no test cases
    /// or the run was rejected before starting.
    #[instrument(skip(self), fields(question_id = %self.options.question_id, language = %self.language))]
    pub async fn run_tests(&mut self) -> Option<TestSummary> {
        let code = self.editor.text().to_string();
        match self.runner.run_tests(&mut self.client, self.language, &code).await {
            Ok(Some(summary)) => {
                self.output = summary.to_string();
                self.emit_status(Some(summary.passed), Some(summary.all_passed()));
                Some(summary)
            }
            Ok(None) => None,
            Err(e) => {
                self.output = e.user_message();
                None
            }
        }
    }
}
