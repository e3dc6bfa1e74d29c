use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Languages the preview engine knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageId {
    Python,
    Java,
    Html,
}

impl LanguageId {
    pub const ALL: [LanguageId; 3] = [LanguageId::Python, LanguageId::Java, LanguageId::Html];

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageId::Python => "python",
            LanguageId::Java => "java",
            LanguageId::Html => "html",
        }
    }

    /// Guess the language from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "py" => Some(LanguageId::Python),
            "java" => Some(LanguageId::Java),
            "html" | "htm" => Some(LanguageId::Html),
            _ => None,
        }
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageId {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(LanguageId::Python),
            "java" => Ok(LanguageId::Java),
            "html" | "htm" => Ok(LanguageId::Html),
            _ => Err(UnknownLanguage(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown language '{0}' (expected python, java or html)")]
pub struct UnknownLanguage(pub String);

/// Kind of a transcript line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputKind {
    Info,
    Output,
    Error,
    Warning,
    InputEcho,
}

/// One line of the run transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    pub text: String,
    pub kind: OutputKind,
}

impl OutputLine {
    pub fn new(text: impl Into<String>, kind: OutputKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    pub fn info(text: impl Into<String>) -> Self {
        Self::new(text, OutputKind::Info)
    }

    pub fn output(text: impl Into<String>) -> Self {
        Self::new(text, OutputKind::Output)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text, OutputKind::Error)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(text, OutputKind::Warning)
    }

    pub fn input_echo(text: impl Into<String>) -> Self {
        Self::new(text, OutputKind::InputEcho)
    }
}

/// How a run settled
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Statement stream exhausted or backend finished cleanly
    Completed,
    /// Cancelled by a stop request
    Stopped,
    /// Backend unavailable or exited unsuccessfully
    Failed(String),
    /// Markup-only source, to be embedded verbatim by the shell
    Document(String),
}

/// When the pseudo engine collects input values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InputMode {
    /// Suspend at each input call in source order
    #[default]
    PerCall,
    /// Pre-scan the buffer, collect every input up front, then replay
    Batch,
}

/// Which backend executes Python source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuntimeMode {
    #[default]
    Pseudo,
    External,
}
