use serde::Serialize;

/// A point in source text. `index` counts characters; `line` and `column` are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Position {
    pub index: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub const START: Position = Position {
        index: 0,
        line: 1,
        column: 1,
    };

    pub fn new(index: usize, line: usize, column: usize) -> Self {
        Self {
            index,
            line,
            column,
        }
    }

    /// The position reached after consuming `text` from here.
    ///
    /// `\n`, `\r\n` and a lone `\r` each count as one line break.
    pub fn advance(self, text: &[char]) -> Position {
        let mut pos = self;
        let mut iter = text.iter().peekable();

        while let Some(&ch) = iter.next() {
            pos.index += 1;
            match ch {
                '\n' => {
                    pos.line += 1;
                    pos.column = 1;
                }
                '\r' => {
                    if iter.peek() == Some(&&'\n') {
                        iter.next();
                        pos.index += 1;
                    }
                    pos.line += 1;
                    pos.column = 1;
                }
                _ => pos.column += 1,
            }
        }

        pos
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::START
    }
}

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TokenKind {
    Eof,
    /// Literal output text outside `${ ... }`.
    Raw,
    /// The `${` that opens an expression region.
    OpenScript,
    /// The `}` that closes an expression region.
    CloseScript,
    Identifier,
    /// `true`, `false`, `null` or `undefined`.
    Literal,
    Numeric,
    Punctuator,
    String,
    /// Literal text between backticks.
    TemplateRaw,
    /// `${` inside a backtick template.
    TemplateLeftBrace,
    /// `}` closing a template interpolation.
    TemplateRightBrace,
    /// `|` starting a filter clause.
    OpenFilter,
    FilterFn,
    FilterSep,
    FilterArg,
    /// A loose character inside a filter argument.
    Char,
}

impl TokenKind {
    /// Display name used in diagnostics.
    pub const fn name(self) -> &'static str {
        match self {
            TokenKind::Eof => "EOF",
            TokenKind::Raw => "Raw",
            TokenKind::OpenScript => "OpenScript",
            TokenKind::CloseScript => "CloseScript",
            TokenKind::Identifier => "Identifier",
            TokenKind::Literal => "Literal",
            TokenKind::Numeric => "Numeric",
            TokenKind::Punctuator => "Punctuator",
            TokenKind::String => "String",
            TokenKind::TemplateRaw => "TemplateRaw",
            TokenKind::TemplateLeftBrace => "TemplateLeftBrace",
            TokenKind::TemplateRightBrace => "TemplateRightBrace",
            TokenKind::OpenFilter => "OpenFilter",
            TokenKind::FilterFn => "FilterFn",
            TokenKind::FilterSep => "FilterSep",
            TokenKind::FilterArg => "FilterArg",
            TokenKind::Char => "Char",
        }
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The semantic payload carried by a token.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TokenValue {
    None,
    Bool(bool),
    Null,
    Undefined,
    Number(f64),
    Text(String),
}

impl TokenValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            TokenValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl std::fmt::Display for TokenValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenValue::None => Ok(()),
            TokenValue::Bool(b) => write!(f, "{b}"),
            TokenValue::Null => f.write_str("null"),
            TokenValue::Undefined => f.write_str("undefined"),
            TokenValue::Number(n) => write!(f, "{n}"),
            TokenValue::Text(text) => f.write_str(text),
        }
    }
}

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: TokenValue,
    /// Source text before escape decoding, when it differs in shape from `value`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
    pub start: Position,
    pub end: Position,
}

impl Token {
    pub fn new(kind: TokenKind, value: TokenValue, start: Position, end: Position) -> Self {
        Self {
            kind,
            value,
            raw: None,
            start,
            end,
        }
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    /// Whether this is the punctuator `op`.
    pub fn is_punctuator(&self, op: &str) -> bool {
        self.kind == TokenKind::Punctuator && self.value.as_text() == Some(op)
    }

    /// The source spelling of the token: `raw` when present, otherwise the value.
    pub fn source_text(&self) -> String {
        match &self.raw {
            Some(raw) => raw.clone(),
            None => self.value.to_string(),
        }
    }
}
