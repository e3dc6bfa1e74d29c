pub mod classify;
pub mod cli;
pub mod config;
pub mod console;
pub mod interpreter;
pub mod runtime;
pub mod session;
pub mod types;

// Re-export main types
pub use types::*;

pub use classify::{classify, classify_language, Category, ClassifiedSpan, LanguageProfile};
pub use config::{Config, ConfigError};
pub use console::{InputCoordinator, InputError, OutputSink};
pub use session::{Session, SessionError};
