//! Formula Lexer
//!
//! Tokenizes formula templates: literal output text with `${ ... }` expression
//! regions, backtick template literals, and `| filter:arg` clauses.
//! The lexer is pull-based and switches modes on its own as it scans; callers
//! only observe the resulting token kinds.
//!
//! # Example
//!
//! ```
//! use formula_lexer::{Lexer, LexerOptions, TokenKind};
//!
//! let tokens = Lexer::tokenize("Hi ${name}", LexerOptions::default()).unwrap();
//! let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
//! assert_eq!(
//!     kinds,
//!     vec![
//!         TokenKind::Raw,
//!         TokenKind::OpenScript,
//!         TokenKind::Identifier,
//!         TokenKind::CloseScript,
//!         TokenKind::Eof,
//!     ]
//! );
//! ```

pub mod escape;
pub mod scanner;
pub mod token;

pub use scanner::{format_number, is_identifier, Lexer, LexerMode};
pub use token::{Position, Token, TokenKind, TokenValue};

use serde::{Deserialize, Serialize};

/// Mode flags shared by the lexer and the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LexerOptions {
    /// Treat the whole input as one expression instead of a template document.
    pub eval_mode: bool,
    /// Reinterpret a single `|` as the start of a filter clause.
    pub allow_filter: bool,
}

impl Default for LexerOptions {
    fn default() -> Self {
        Self {
            eval_mode: false,
            allow_filter: true,
        }
    }
}

/// Lexer error with position information.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LexError {
    #[error("Lexer error at line {line}, column {column}: unexpected character '{ch}'")]
    UnexpectedCharacter { ch: char, line: usize, column: usize },

    #[error("Lexer error at line {line}, column {column}: invalid escape '\\{ch}'")]
    InvalidEscape { ch: char, line: usize, column: usize },

    #[error("Lexer error at line {line}, column {column}: unterminated string")]
    UnterminatedString { line: usize, column: usize },

    #[error("Lexer error at line {line}, column {column}: '\\' at end of input")]
    DanglingEscape { line: usize, column: usize },
}

impl LexError {
    pub fn line(&self) -> usize {
        match self {
            LexError::UnexpectedCharacter { line, .. }
            | LexError::InvalidEscape { line, .. }
            | LexError::UnterminatedString { line, .. }
            | LexError::DanglingEscape { line, .. } => *line,
        }
    }

    pub fn column(&self) -> usize {
        match self {
            LexError::UnexpectedCharacter { column, .. }
            | LexError::InvalidEscape { column, .. }
            | LexError::UnterminatedString { column, .. }
            | LexError::DanglingEscape { column, .. } => *column,
        }
    }
}
