//! Language-specific surface of the pseudo engine

use crate::types::LanguageId;

/// Which statement shapes and arithmetic rules apply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Python,
    Java,
}

impl Dialect {
    /// Dialect for a language, if the pseudo engine can run it
    pub fn for_language(language: LanguageId) -> Option<Self> {
        match language {
            LanguageId::Python => Some(Dialect::Python),
            LanguageId::Java => Some(Dialect::Java),
            LanguageId::Html => None,
        }
    }

    /// Info lines written before any program output
    pub fn preamble(self) -> &'static [&'static str] {
        match self {
            Dialect::Python => &[],
            Dialect::Java => &[">>> Compiling Java...", ">>> Running Main class..."],
        }
    }

    /// Terminal info line of a run that reached the end of the source
    pub fn completion(self) -> &'static str {
        match self {
            Dialect::Python => ">>> Execution Completed Successfully",
            Dialect::Java => ">>> BUILD SUCCESSFUL",
        }
    }

    /// `/` on two integers yields a float
    pub fn true_division(self) -> bool {
        matches!(self, Dialect::Python)
    }

    /// Words starting a control-flow or structural line, which the engine
    /// recognizes but does not execute
    pub fn is_structural_keyword(self, word: &str) -> bool {
        match self {
            Dialect::Python => matches!(
                word,
                "if" | "elif"
                    | "else"
                    | "for"
                    | "while"
                    | "def"
                    | "class"
                    | "try"
                    | "except"
                    | "finally"
                    | "with"
                    | "match"
                    | "case"
                    | "import"
                    | "from"
                    | "return"
                    | "pass"
                    | "break"
                    | "continue"
            ),
            Dialect::Java => matches!(
                word,
                "if" | "else"
                    | "for"
                    | "while"
                    | "do"
                    | "switch"
                    | "case"
                    | "default"
                    | "try"
                    | "catch"
                    | "finally"
                    | "class"
                    | "interface"
                    | "enum"
                    | "import"
                    | "package"
                    | "return"
                    | "break"
                    | "continue"
            ),
        }
    }
}
