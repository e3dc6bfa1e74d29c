//! Configuration loading
//!
//! Sources, lowest priority first:
//!
//! 1. built-in defaults
//! 2. a TOML file: the builder's `config_path`, else `LOOM_CONFIG_PATH`,
//!    else `loom.toml` in the working directory if it exists
//! 3. `LOOM_*` environment variables (`LOOM_ENGINE__INPUT_MODE=batch`),
//!    after `.env` is loaded with dotenvy
//! 4. explicit builder overrides
//!
//! ```toml
//! [engine]
//! input_mode = "batch"
//! python_runtime = "external"
//!
//! [runtime]
//! python_command = "python3.12"
//! init_timeout_secs = 5
//!
//! [languages.python]
//! line_comment = "#"
//! keywords = ["def", "return"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::LanguageProfile;
use crate::types::{InputMode, LanguageId, RuntimeMode};

const ENV_PREFIX: &str = "LOOM";
const CONFIG_PATH_VAR: &str = "LOOM_CONFIG_PATH";
const DEFAULT_CONFIG_FILE: &str = "loom.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("config file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub runtime: RuntimeConfig,
    pub languages: LanguageOverrides,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub input_mode: InputMode,
    pub python_runtime: RuntimeMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Interpreter command for the external backend
    pub python_command: String,
    /// Upper bound on backend initialization
    pub init_timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            python_command: "python3".to_string(),
            init_timeout_secs: 10,
        }
    }
}

/// Per-language classifier profiles; a present entry replaces the built-in
/// profile for that language wholesale
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub python: Option<LanguageProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub java: Option<LanguageProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<LanguageProfile>,
}

impl LanguageOverrides {
    pub fn get(&self, language: LanguageId) -> Option<&LanguageProfile> {
        match language {
            LanguageId::Python => self.python.as_ref(),
            LanguageId::Java => self.java.as_ref(),
            LanguageId::Html => self.html.as_ref(),
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load from the default sources
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder().build()
    }

    /// Classifier profile for a language, honouring overrides
    pub fn profile(&self, language: LanguageId) -> &LanguageProfile {
        self.languages
            .get(language)
            .unwrap_or_else(|| LanguageProfile::defaults(language))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.runtime.python_command.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "runtime.python_command must not be empty".to_string(),
            ));
        }
        if self.runtime.init_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "runtime.init_timeout_secs must be at least 1".to_string(),
            ));
        }
        for language in LanguageId::ALL {
            let Some(profile) = self.languages.get(language) else {
                continue;
            };
            if profile.block_comments.iter().any(|b| b.open.is_empty() || b.close.is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "languages.{language}: block comment delimiters must not be empty"
                )));
            }
            if profile.line_comment.as_deref() == Some("") {
                return Err(ConfigError::Invalid(format!(
                    "languages.{language}: line_comment must not be empty"
                )));
            }
        }
        Ok(())
    }
}

/// Assembles a [`Config`] from files, environment and explicit overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    config_path: Option<PathBuf>,
    input_mode: Option<InputMode>,
    python_runtime: Option<RuntimeMode>,
    python_command: Option<String>,
    skip_env: bool,
}

impl ConfigBuilder {
    /// Config file to read instead of the default search
    pub fn config_path(mut self, path: Option<PathBuf>) -> Self {
        self.config_path = path;
        self
    }

    pub fn input_mode(mut self, mode: Option<InputMode>) -> Self {
        self.input_mode = mode;
        self
    }

    pub fn python_runtime(mut self, mode: Option<RuntimeMode>) -> Self {
        self.python_runtime = mode;
        self
    }

    pub fn python_command(mut self, command: Option<String>) -> Self {
        self.python_command = command;
        self
    }

    /// Ignore `.env` and `LOOM_*` variables
    pub fn without_env(mut self) -> Self {
        self.skip_env = true;
        self
    }

    pub fn build(self) -> Result<Config, ConfigError> {
        if !self.skip_env {
            // a missing .env is fine
            let _ = dotenvy::dotenv();
        }

        let mut builder = config::Config::builder();

        if let Some(path) = self.resolve_path()? {
            debug!(path = %path.display(), "loading config file");
            builder = builder.add_source(config::File::from(path).format(config::FileFormat::Toml));
        }

        if !self.skip_env {
            builder = builder.add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        if let Some(mode) = self.input_mode {
            builder = builder.set_override("engine.input_mode", enum_value(&mode)?)?;
        }
        if let Some(mode) = self.python_runtime {
            builder = builder.set_override("engine.python_runtime", enum_value(&mode)?)?;
        }
        if let Some(command) = self.python_command {
            builder = builder.set_override("runtime.python_command", command)?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn resolve_path(&self) -> Result<Option<PathBuf>, ConfigError> {
        let explicit = self.config_path.clone().or_else(|| {
            if self.skip_env {
                return None;
            }
            std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from)
        });

        match explicit {
            Some(path) if path.is_file() => Ok(Some(path)),
            Some(path) => Err(ConfigError::MissingFile(path)),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                Ok(default.is_file().then(|| default.to_path_buf()))
            }
        }
    }
}

/// Serialized name of a unit enum variant, as config files spell it
fn enum_value<T: Serialize>(value: &T) -> Result<String, ConfigError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => Ok(s),
        _ => Err(ConfigError::Invalid("expected a unit variant".to_string())),
    }
}
