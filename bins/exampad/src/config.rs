// Runtime lookup table for the execution service
// Each supported language pins exactly one runtime version.
use anyhow::{bail, Context, Result};
use exampad_common::types::Language;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::engine::ExecError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Editor language key (`c`, `c++`, `java`, `python`, `javascript`)
    pub name: String,
    /// Language identifier understood by the execution service
    pub language: String,
    pub version: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct LanguagesJson {
    languages: Vec<RuntimeConfig>,
}

/// Language → (service language, version) table
#[derive(Debug, Clone)]
pub struct RuntimeTable {
    runtimes: HashMap<Language, RuntimeConfig>,
}

impl RuntimeTable {
    /// Pinned versions used when no languages.json is present
    pub fn builtin() -> Self {
        let pinned = [
            (Language::C, "c", "10.2.0"),
            (Language::Cpp, "c++", "10.2.0"),
            (Language::Java, "java", "15.0.2"),
            (Language::Python, "python", "3.10.0"),
            (Language::JavaScript, "javascript", "18.15.0"),
        ];
        let runtimes = pinned
            .into_iter()
            .map(|(lang, service, version)| {
                (
                    lang,
                    RuntimeConfig {
                        name: lang.key().to_string(),
                        language: service.to_string(),
                        version: version.to_string(),
                    },
                )
            })
            .collect();
        Self { runtimes }
    }

    /// Load runtime pins from languages.json
    pub fn load(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            bail!("Language config file not found: {}", config_path.display());
        }

        let content = fs::read_to_string(config_path).context("Failed to read languages.json")?;
        let languages_json: LanguagesJson =
            serde_json::from_str(&content).context("Failed to parse languages.json")?;

        let mut runtimes = HashMap::new();
        for runtime in languages_json.languages {
            let Some(lang) = Language::from_key(&runtime.name) else {
                bail!("Unknown language '{}' in languages.json", runtime.name);
            };
            if runtimes.insert(lang, runtime).is_some() {
                bail!("Language '{}' is pinned more than once", lang);
            }
        }

        if runtimes.is_empty() {
            bail!("No languages configured in languages.json");
        }

        Ok(Self { runtimes })
    }

    /// Load with default path (config/languages.json), falling back to the
    /// built-in pins when the file is absent
    pub fn load_default() -> Result<Self> {
        let default_path = Path::new("config/languages.json");
        if default_path.exists() {
            Self::load(default_path)
        } else {
            Ok(Self::builtin())
        }
    }

    /// Get the pinned runtime for a language
    pub fn get(&self, language: &Language) -> Result<&RuntimeConfig, ExecError> {
        self.runtimes
            .get(language)
            .ok_or_else(|| ExecError::UnknownLanguage(language.to_string()))
    }

    /// List all configured languages in a stable order
    pub fn list_languages(&self) -> Vec<Language> {
        Language::ALL
            .into_iter()
            .filter(|lang| self.runtimes.contains_key(lang))
            .collect()
    }
}
