mod config;
mod engine;
#[cfg(test)]
mod engine_tests;
mod evaluator;
mod policy;
mod runner;
mod session;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use config::RuntimeTable;
use engine::ExecutionClient;
use exampad_common::config::ExamConfig;
use exampad_common::store::open_store;
use exampad_common::types::{Language, StatusEvent};
use exampad_editor::{KeyEvent, Selection};
use serde::Deserialize;
use session::{Session, SessionObserver, SessionOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "exampad")]
#[command(about = "Exam code editor - edit, run and test exercise solutions", long_about = None)]
struct Cli {
    /// Store file (overrides EXAMPAD_STORE)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List supported languages and their pinned runtime versions
    Languages,

    /// Print the saved buffer for one or more questions
    Show {
        /// Question identifier (repeatable)
        #[arg(short, long, required = true)]
        question: Vec<String>,

        /// Language (defaults to the last one used)
        #[arg(short, long)]
        language: Option<String>,
    },

    /// Save a source file as the buffer for a question
    Save {
        #[arg(short, long)]
        question: String,

        #[arg(short, long)]
        language: Option<String>,

        /// Source file to store
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Start one question's buffer from another's
    Copy {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        #[arg(short, long)]
        language: Option<String>,
    },

    /// Run the saved buffer once on the execution service
    Run {
        #[arg(short, long)]
        question: String,

        #[arg(short, long)]
        language: Option<String>,

        /// Program input
        #[arg(long, conflicts_with = "stdin_file")]
        stdin: Option<String>,

        /// Read program input from a file
        #[arg(long)]
        stdin_file: Option<PathBuf>,
    },

    /// Run a question file's test cases against the saved buffer
    Test {
        /// JSON question file (question_id, language, initial_code, test_cases)
        #[arg(short = 'f', long)]
        question_file: PathBuf,
    },

    /// Apply a JSON array of key events to the saved buffer
    Replay {
        #[arg(short, long)]
        question: String,

        #[arg(short, long)]
        language: Option<String>,

        /// Key-event script
        #[arg(short, long)]
        script: PathBuf,

        /// Starting caret offset (defaults to the end of the buffer)
        #[arg(long)]
        caret: Option<usize>,

        /// Block copy, cut and paste steps
        #[arg(long)]
        no_clipboard: bool,
    },
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ClipboardAction {
    Copy,
    Cut,
    Paste,
}

/// One step of a replay script
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScriptStep {
    Clipboard { clipboard: ClipboardAction },
    Select { select: (usize, usize) },
    Key(KeyEvent),
}

/// Forwards session events to the log
struct LogObserver;

impl SessionObserver for LogObserver {
    fn on_status(&self, event: &StatusEvent) {
        debug!(
            chars = event.code.chars().count(),
            passed = ?event.passed,
            all_passed = ?event.all_passed,
            "Status update"
        );
    }

    fn on_run(&self, code: &str) {
        info!(chars = code.chars().count(), "Run triggered");
    }
}

fn parse_language(name: &str) -> Result<Language> {
    match Language::from_key(name) {
        Some(language) => Ok(language),
        None => {
            let valid: Vec<&str> = Language::ALL.iter().map(|l| l.key()).collect();
            bail!("Invalid language: {} (valid options: {})", name, valid.join(", "))
        }
    }
}

fn open_session(config: &ExamConfig, options: SessionOptions) -> Result<Session> {
    let store = open_store(config).context("Failed to open store")?;
    let runtimes = RuntimeTable::load_default()?;
    let client = ExecutionClient::http(runtimes, config);

    let mut session = Session::mount(options, store, client);
    session.subscribe(Box::new(LogObserver));
    Ok(session)
}

/// Mount a question, switching language only when one was asked for
fn open_question(config: &ExamConfig, question: &str, language: Option<&str>) -> Result<Session> {
    let requested = language.map(parse_language).transpose()?;
    let options = SessionOptions::new(question, requested.unwrap_or(Language::Python));
    let mut session = open_session(config, options)?;
    if let Some(language) = requested {
        session.switch_language(language);
    }
    Ok(session)
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = ExamConfig::from_env();
    if let Some(store) = cli.store {
        config.store_path = store;
        config.redis_url = None;
    }

    match cli.command {
        Commands::Languages => {
            let runtimes = RuntimeTable::load_default()?;
            for language in runtimes.list_languages() {
                let runtime = runtimes.get(&language)?;
                println!(
                    "{:<12} {} {}  (comment: {})",
                    runtime.name,
                    runtime.language,
                    runtime.version,
                    language.comment_marker()
                );
            }
        }
        Commands::Show { question, language } => {
            let mut session = open_question(&config, &question[0], language.as_deref())?;
            for (idx, question_id) in question.iter().enumerate() {
                session.set_question(question_id.as_str());
                if question.len() > 1 {
                    if idx > 0 {
                        println!();
                    }
                    println!("== {} ({}) ==", session.question_id(), session.language());
                }
                print!("{}", session.code());
            }
        }
        Commands::Copy { from, to, language } => {
            let source = open_question(&config, &from, language.as_deref())?;
            let code = source.code().to_string();
            let language = source.language();
            let store = source.unmount();

            let runtimes = RuntimeTable::load_default()?;
            let client = ExecutionClient::http(runtimes, &config);
            let mut target = Session::mount(SessionOptions::new(to, language), store, client);
            target.switch_language(language);
            target.replace_all(&code);
            println!(
                "✓ Copied {} ({}) to {}",
                from,
                language,
                target.question_id()
            );
        }
        Commands::Save {
            question,
            language,
            file,
        } => {
            let source = read_file(&file)?;
            let mut session = open_question(&config, &question, language.as_deref())?;
            session.replace_all(&source);
            println!(
                "✓ Saved {} lines for {} ({})",
                session.editor().line_count(),
                session.question_id(),
                session.language()
            );
        }
        Commands::Run {
            question,
            language,
            stdin,
            stdin_file,
        } => {
            let input = match (stdin, stdin_file) {
                (Some(input), _) => input,
                (None, Some(path)) => read_file(&path)?,
                (None, None) => String::new(),
            };
            let mut session = open_question(&config, &question, language.as_deref())?;
            let output = session.run(&input).await;
            println!("{}", output);
        }
        Commands::Test { question_file } => {
            let content = read_file(&question_file)?;
            let options: SessionOptions =
                serde_json::from_str(&content).context("Failed to parse question file")?;
            let cases = options.test_cases.clone();

            let mut session = open_session(&config, options)?;
            let Some(summary) = session.run_tests().await else {
                if cases.is_empty() {
                    println!("No test cases configured");
                } else {
                    println!("{}", session.output());
                }
                return Ok(());
            };

            for (idx, result) in session.test_results() {
                let case = &cases[*idx];
                if result.success {
                    println!("  ✓ Test {}", idx + 1);
                } else {
                    println!("  ✗ Test {}", idx + 1);
                    println!("    Input:    {:?}", case.input);
                    println!("    Expected: {:?}", case.expected.trim());
                    match (&result.actual, &result.error) {
                        (Some(actual), _) => println!("    Got:      {:?}", actual.trim()),
                        (None, Some(error)) => println!("    Error:    {}", error),
                        (None, None) => {}
                    }
                }
            }
            println!("{}", summary);

            if !summary.all_passed() {
                std::process::exit(1);
            }
        }
        Commands::Replay {
            question,
            language,
            script,
            caret,
            no_clipboard,
        } => {
            let steps: Vec<ScriptStep> = serde_json::from_str(&read_file(&script)?)
                .context("Failed to parse key-event script")?;
            let requested = language.as_deref().map(parse_language).transpose()?;
            let mut options = SessionOptions::new(question, requested.unwrap_or(Language::Python));
            options.allow_copy_paste = !no_clipboard;
            let mut session = open_session(&config, options)?;
            if let Some(language) = requested {
                session.switch_language(language);
            }

            let end = session.editor().buffer().len_chars();
            session.set_selection(Selection::caret(caret.unwrap_or(end)));
            let mut clipboard = String::new();
            for step in &steps {
                match step {
                    ScriptStep::Key(event) => {
                        let outcome = session.handle_key(event);
                        debug!(intent = ?outcome.intent, changed = outcome.changed, "Key applied");
                    }
                    ScriptStep::Select { select: (start, end) } => {
                        session.set_selection(Selection::new(*start, *end));
                    }
                    ScriptStep::Clipboard { clipboard: action } => {
                        let allowed = match action {
                            ClipboardAction::Copy => session.copy().map(|text| clipboard = text).is_some(),
                            ClipboardAction::Cut => session.cut().map(|text| clipboard = text).is_some(),
                            ClipboardAction::Paste => session.paste(&clipboard),
                        };
                        if !allowed {
                            warn!(action = ?action, "Clipboard step blocked");
                        }
                    }
                }
            }

            let selection = session.editor().selection();
            info!(
                steps = steps.len(),
                start = selection.start,
                end = selection.end,
                "Replay complete"
            );
            print!("{}", session.code());
        }
    }

    Ok(())
}
