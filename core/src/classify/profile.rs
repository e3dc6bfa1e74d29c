//! Per-language classification data
//!
//! Keyword and builtin membership, comment markers and string prefixes are
//! plain data so they can be replaced from configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::types::LanguageId;

/// Opening/closing pair for a block comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockComment {
    pub open: String,
    pub close: String,
}

impl BlockComment {
    pub fn new(open: &str, close: &str) -> Self {
        Self {
            open: open.to_string(),
            close: close.to_string(),
        }
    }
}

/// Classification data for one language
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageProfile {
    /// Marker that starts a comment running to end of line
    #[serde(default)]
    pub line_comment: Option<String>,

    /// Delimited comments (an unterminated one runs to end of input)
    #[serde(default)]
    pub block_comments: Vec<BlockComment>,

    /// Identifiers that, placed directly before a quote, belong to the string
    #[serde(default)]
    pub string_prefixes: BTreeSet<String>,

    #[serde(default)]
    pub keywords: BTreeSet<String>,

    #[serde(default)]
    pub builtins: BTreeSet<String>,
}

fn set(words: &[&str]) -> BTreeSet<String> {
    words.iter().map(|w| w.to_string()).collect()
}

impl LanguageProfile {
    pub fn python() -> Self {
        Self {
            line_comment: Some("#".to_string()),
            block_comments: vec![
                BlockComment::new("\"\"\"", "\"\"\""),
                BlockComment::new("'''", "'''"),
            ],
            string_prefixes: set(&[
                "f", "r", "b", "u", "rb", "br", "fr", "rf", "F", "R", "B", "U", "Rb", "bR", "RB",
                "BR", "Br", "rB", "Fr", "fR", "FR", "RF", "Rf", "rF",
            ]),
            keywords: set(&[
                "def", "return", "if", "else", "elif", "for", "in", "range", "import", "from",
                "class", "True", "False", "None", "and", "or", "not", "while", "break",
                "continue", "pass", "try", "except", "finally", "with", "as", "lambda", "yield",
            ]),
            builtins: set(&[
                "print", "len", "range", "str", "int", "float", "list", "dict", "set", "tuple",
                "sum", "min", "max", "abs", "round", "sorted", "enumerate", "zip", "map",
                "filter", "input",
            ]),
        }
    }

    pub fn java() -> Self {
        Self {
            line_comment: Some("//".to_string()),
            block_comments: vec![BlockComment::new("/*", "*/")],
            string_prefixes: BTreeSet::new(),
            keywords: set(&[
                "public", "private", "protected", "static", "void", "int", "double", "float",
                "String", "boolean", "class", "return", "if", "else", "for", "while", "new",
                "this", "super", "extends", "implements", "import", "package", "true", "false",
                "null", "try", "catch", "finally", "throw", "throws",
            ]),
            builtins: set(&[
                "System", "String", "Math", "Integer", "Double", "Boolean", "Array", "List",
                "ArrayList", "HashMap", "println", "print",
            ]),
        }
    }

    pub fn html() -> Self {
        Self {
            line_comment: None,
            block_comments: vec![BlockComment::new("<!--", "-->")],
            string_prefixes: BTreeSet::new(),
            keywords: set(&[
                "DOCTYPE", "html", "head", "body", "title", "style", "script", "div", "span",
                "a", "img", "input", "button", "form", "meta", "link",
            ]),
            builtins: BTreeSet::new(),
        }
    }

    /// Freshly built default profile for a language
    pub fn for_language(language: LanguageId) -> Self {
        match language {
            LanguageId::Python => Self::python(),
            LanguageId::Java => Self::java(),
            LanguageId::Html => Self::html(),
        }
    }

    /// Shared default profile, built once per process
    pub fn defaults(language: LanguageId) -> &'static LanguageProfile {
        static PYTHON: OnceLock<LanguageProfile> = OnceLock::new();
        static JAVA: OnceLock<LanguageProfile> = OnceLock::new();
        static HTML: OnceLock<LanguageProfile> = OnceLock::new();

        match language {
            LanguageId::Python => PYTHON.get_or_init(Self::python),
            LanguageId::Java => JAVA.get_or_init(Self::java),
            LanguageId::Html => HTML.get_or_init(Self::html),
        }
    }

    pub fn is_keyword(&self, word: &str) -> bool {
        self.keywords.contains(word)
    }

    pub fn is_builtin(&self, word: &str) -> bool {
        self.builtins.contains(word)
    }

    pub fn is_string_prefix(&self, word: &str) -> bool {
        self.string_prefixes.contains(word)
    }
}
