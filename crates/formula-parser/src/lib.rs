//! Formula Parser
//!
//! Parses formula templates into an Abstract Syntax Tree.
//! Document mode turns `Hello ${user.name | upper}` into raw text and
//! expression regions; eval mode parses the whole input as one expression.
//!
//! # Example
//!
//! ```
//! use formula_parser::{parse, Node, ParseOptions};
//!
//! let ast = parse("Hi ${name}", ParseOptions::default()).unwrap();
//! let Node::Document { body } = ast else { panic!("expected a document") };
//! assert_eq!(body.len(), 2);
//! ```

pub mod ast;
pub mod expr_parser;
pub mod parser;

pub use ast::{
    BinaryKind, Fragment, GetKey, LiteralValue, Node, ObjectKey, ObjectMember, UnaryOp,
};
pub use formula_lexer::{LexError, LexerOptions};
pub use parser::{Parser, MAX_NESTING};

use formula_lexer::TokenKind;

/// Parser mode flags; the lexer reads the same flags.
pub type ParseOptions = LexerOptions;

/// Parser error with position information.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Parse error at line {line}, column {column}: unexpected token <{kind}> {value:?}")]
    UnexpectedToken {
        kind: TokenKind,
        value: String,
        line: usize,
        column: usize,
    },

    #[error(
        "Parse error at line {line}, column {column}: expected '{expected}', found <{kind}> {value:?}"
    )]
    MissingExpectedToken {
        expected: String,
        kind: TokenKind,
        value: String,
        line: usize,
        column: usize,
    },

    #[error("Parse error at line {line}, column {column}: expressions nested deeper than {limit}")]
    NestingTooDeep {
        limit: usize,
        line: usize,
        column: usize,
    },

    #[error(transparent)]
    Lex(#[from] LexError),
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { line, .. }
            | ParseError::MissingExpectedToken { line, .. }
            | ParseError::NestingTooDeep { line, .. } => *line,
            ParseError::Lex(err) => err.line(),
        }
    }

    pub fn column(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { column, .. }
            | ParseError::MissingExpectedToken { column, .. }
            | ParseError::NestingTooDeep { column, .. } => *column,
            ParseError::Lex(err) => err.column(),
        }
    }
}

/// Parse source text into an AST.
pub fn parse(source: &str, options: ParseOptions) -> Result<Node, ParseError> {
    Parser::parse(source, options)
}
