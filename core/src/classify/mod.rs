//! # Token Classifier
//!
//! Maps source text to an ordered, gap-free sequence of classified spans for
//! presentation. The scan is a single left-to-right pass; at every position
//! the productions in [`PRODUCTIONS`] are tried in order and the first match
//! wins. Characters no production claims become plain text.
//!
//! Classification never fails: an unterminated string or block comment simply
//! extends its span to the end of the input.

mod profile;


pub use profile::{BlockComment, LanguageProfile};

use serde::{Deserialize, Serialize};

use crate::types::LanguageId;

/* ===================== Spans ===================== */

/// Semantic category of a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Keyword,
    Builtin,
    String,
    Number,
    Comment,
    FunctionName,
    Plain,
}

/// A contiguous run of source text tagged with one category
///
/// `start..end` are byte offsets into the classified source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedSpan {
    pub text: String,
    pub category: Category,
    pub start: usize,
    pub end: usize,
}

/* ===================== Productions ===================== */

/// Lexical productions, tried at each position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Production {
    Comment,
    String,
    Number,
    Identifier,
}

/// Production precedence: comment > string > number > identifier
pub const PRODUCTIONS: [Production; 4] = [
    Production::Comment,
    Production::String,
    Production::Number,
    Production::Identifier,
];

/* ===================== Public API ===================== */

/// Classify `source` using an explicit language profile
pub fn classify(source: &str, profile: &LanguageProfile) -> Vec<ClassifiedSpan> {
    Classifier::new(source, profile).run()
}

/// Classify `source` using the built-in profile for `language`
pub fn classify_language(source: &str, language: LanguageId) -> Vec<ClassifiedSpan> {
    classify(source, LanguageProfile::defaults(language))
}

/* ===================== Scanner ===================== */

struct Classifier<'a> {
    src: &'a str,
    profile: &'a LanguageProfile,
    spans: Vec<ClassifiedSpan>,
}

impl<'a> Classifier<'a> {
    fn new(src: &'a str, profile: &'a LanguageProfile) -> Self {
        Self {
            src,
            profile,
            spans: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<ClassifiedSpan> {
        let mut pos = 0;

        while pos < self.src.len() {
            let (category, end) = PRODUCTIONS
                .iter()
                .find_map(|production| self.try_production(*production, pos))
                .unwrap_or_else(|| (Category::Plain, pos + self.char_len_at(pos)));

            self.push(category, pos, end);
            pos = end;
        }

        self.spans
    }

    fn try_production(&self, production: Production, pos: usize) -> Option<(Category, usize)> {
        match production {
            Production::Comment => self.scan_comment(pos).map(|end| (Category::Comment, end)),
            Production::String => self.scan_string(pos).map(|end| (Category::String, end)),
            Production::Number => self.scan_number(pos).map(|end| (Category::Number, end)),
            Production::Identifier => self.scan_identifier(pos),
        }
    }

    fn push(&mut self, category: Category, start: usize, end: usize) {
        let text = &self.src[start..end];

        if category == Category::Plain {
            if let Some(last) = self.spans.last_mut() {
                if last.category == Category::Plain && last.end == start {
                    last.text.push_str(text);
                    last.end = end;
                    return;
                }
            }
        }

        self.spans.push(ClassifiedSpan {
            text: text.to_string(),
            category,
            start,
            end,
        });
    }

    fn char_len_at(&self, pos: usize) -> usize {
        self.src[pos..].chars().next().map_or(1, char::len_utf8)
    }

    fn peek(&self, pos: usize) -> Option<char> {
        self.src.get(pos..).and_then(|rest| rest.chars().next())
    }

    /* ---------- comment ---------- */

    fn scan_comment(&self, pos: usize) -> Option<usize> {
        let rest = &self.src[pos..];

        for block in &self.profile.block_comments {
            if !block.open.is_empty() && rest.starts_with(block.open.as_str()) {
                let body = &rest[block.open.len()..];
                let end = match body.find(block.close.as_str()) {
                    Some(idx) if !block.close.is_empty() => {
                        pos + block.open.len() + idx + block.close.len()
                    }
                    _ => self.src.len(),
                };
                return Some(end);
            }
        }

        let marker = self.profile.line_comment.as_deref()?;
        if marker.is_empty() || !rest.starts_with(marker) {
            return None;
        }
        Some(rest.find('\n').map_or(self.src.len(), |idx| pos + idx))
    }

    /* ---------- string ---------- */

    fn scan_string(&self, pos: usize) -> Option<usize> {
        match self.peek(pos)? {
            quote @ ('"' | '\'') => Some(self.scan_quoted(pos, quote)),
            c if is_ident_start(c) => {
                // prefix such as f"..." or rb'...': identifier directly followed by a quote
                let word_end = self.ident_end(pos);
                let word = &self.src[pos..word_end];
                match self.peek(word_end) {
                    Some(quote @ ('"' | '\'')) if self.profile.is_string_prefix(word) => {
                        Some(self.scan_quoted(word_end, quote))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Scan a quoted literal whose opening quote sits at `open`
    fn scan_quoted(&self, open: usize, quote: char) -> usize {
        let body_start = open + quote.len_utf8();
        let mut chars = self.src[body_start..].char_indices();

        while let Some((idx, c)) = chars.next() {
            if c == '\\' {
                // escape pair, even when the escaped char is the quote
                chars.next();
            } else if c == quote {
                return body_start + idx + c.len_utf8();
            }
        }

        self.src.len()
    }

    /* ---------- number ---------- */

    fn scan_number(&self, pos: usize) -> Option<usize> {
        if !self.peek(pos)?.is_ascii_digit() {
            return None;
        }
        let len = self.src[pos..]
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(self.src.len() - pos);
        Some(pos + len)
    }

    /* ---------- identifier ---------- */

    fn scan_identifier(&self, pos: usize) -> Option<(Category, usize)> {
        if !is_ident_start(self.peek(pos)?) {
            return None;
        }
        let end = self.ident_end(pos);
        let word = &self.src[pos..end];

        let category = if self.profile.is_keyword(word) {
            Category::Keyword
        } else if self.profile.is_builtin(word) {
            Category::Builtin
        } else if self.peek(end) == Some('(') {
            Category::FunctionName
        } else {
            Category::Plain
        };

        Some((category, end))
    }

    fn ident_end(&self, pos: usize) -> usize {
        self.src[pos..]
            .char_indices()
            .find(|(_, c)| !is_ident_continue(*c))
            .map_or(self.src.len(), |(idx, _)| pos + idx)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
