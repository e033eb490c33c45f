// Application configuration
// Values come from the environment; anything unset keeps the built-in limits.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://emkc.org/api/v2/piston/execute";
pub const DEFAULT_TIMEOUT_MS: u64 = 20_000;
pub const DEFAULT_COOLDOWN_MS: u64 = 2_000;
pub const DEFAULT_MAX_RETRIES: u32 = 1;
pub const MAX_SOURCE_CHARS: usize = 20_000;
pub const MAX_STDIN_CHARS: usize = 5_000;

#[derive(Debug, Clone, PartialEq)]
pub struct ExamConfig {
    pub endpoint: String,
    pub timeout_ms: u64,
    pub cooldown_ms: u64,
    pub max_retries: u32,
    pub max_source_chars: usize,
    pub max_stdin_chars: usize,
    pub store_path: PathBuf,
    pub redis_url: Option<String>,
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            max_source_chars: MAX_SOURCE_CHARS,
            max_stdin_chars: MAX_STDIN_CHARS,
            store_path: default_store_path(),
            redis_url: None,
        }
    }
}

impl ExamConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unparseable numbers fall back
    /// to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let number = |key: &str, fallback: u64| {
            lookup(key)
                .and_then(|v| v.trim().parse::<u64>().ok())
                .unwrap_or(fallback)
        };

        Self {
            endpoint: lookup("EXAMPAD_ENDPOINT").unwrap_or(defaults.endpoint),
            timeout_ms: number("EXAMPAD_TIMEOUT_MS", defaults.timeout_ms),
            cooldown_ms: number("EXAMPAD_COOLDOWN_MS", defaults.cooldown_ms),
            max_retries: defaults.max_retries,
            max_source_chars: defaults.max_source_chars,
            max_stdin_chars: defaults.max_stdin_chars,
            store_path: lookup("EXAMPAD_STORE")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("exampad")
        .join("store.json")
}
