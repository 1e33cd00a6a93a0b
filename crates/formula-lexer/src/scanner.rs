use std::collections::VecDeque;

use crate::escape::{self, Escape};
use crate::token::{Position, Token, TokenKind, TokenValue};
use crate::{LexError, LexerOptions};

/// Main scanning mode. Transitions happen inside the lexer as it scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexerMode {
    /// Literal output text up to the next `${`.
    RawText,
    /// Inside `${ ... }` or a template interpolation.
    Scripting,
    /// Literal text inside a backtick template.
    TemplateRaw,
    /// A `| name:arg` filter clause, up to the closing `}`.
    FilterContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NumberState {
    Start,
    Minus,
    Zero,
    Digit,
    Point,
    Fraction,
    Exponent,
    ExponentSign,
    ExponentDigit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterState {
    Name,
    Argument,
}

/// Punctuators, longest first so a prefix never shadows a longer operator.
const PUNCTUATORS: &[&str] = &[
    "===", "!==", ">>>", "==", "!=", "<>", "<=", ">=", "||", "&&", "++", "--", "<<", ">>", "**",
    "+=", "-=", "*=", "/=", "=", "<", ">", "*", "/", "-", "+", "^", "!", "~", "%", "&", "|", "(",
    ")", "[", "]", "{", "}", "?", ":", ";", ",", ".", "$",
];

const KEYWORDS: &[&str] = &["true", "null", "false", "undefined"];

fn keyword_value(word: &str) -> TokenValue {
    match word {
        "true" => TokenValue::Bool(true),
        "false" => TokenValue::Bool(false),
        "null" => TokenValue::Null,
        _ => TokenValue::Undefined,
    }
}

fn is_cjk(c: char) -> bool {
    ('\u{4e00}'..='\u{9fa5}').contains(&c)
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || matches!(c, '_' | '$' | '@') || is_cjk(c)
}

fn is_identifier_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || is_cjk(c)
}

/// Whether `text` is a whole identifier: `name`, `$value`, `@at`, `变量`.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next().is_some_and(is_identifier_start) && chars.all(is_identifier_continue)
}

/// Numeric value of a matched number literal.
pub fn format_number(text: &str) -> f64 {
    text.parse().unwrap_or(f64::NAN)
}

/// Formula lexer.
///
/// Produces one token per [`Lexer::next_token`] call. Some scans (template
/// text, filter clauses) cross several token boundaries at once; the extra
/// tokens wait in a FIFO and are served before scanning resumes.
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    cursor: Position,
    mode: LexerMode,
    options: LexerOptions,
    /// Open `{` count per interpolation level; the first entry is the top-level script.
    braces: Vec<usize>,
    templates: usize,
    pending: VecDeque<Token>,
    after_operand: bool,
    loose: bool,
}

impl Lexer {
    /// Create a new lexer for the given source.
    pub fn new(source: &str, options: LexerOptions) -> Self {
        let mode = if options.eval_mode {
            LexerMode::Scripting
        } else {
            LexerMode::RawText
        };

        Self {
            chars: source.chars().collect(),
            pos: 0,
            cursor: Position::START,
            mode,
            options,
            braces: vec![0],
            templates: 0,
            pending: VecDeque::new(),
            after_operand: false,
            loose: false,
        }
    }

    /// Lexer over the decoded text of one filter argument.
    ///
    /// Scans as an expression with filters disabled, reporting positions from
    /// `origin`. Characters no production matches come back as `Char` tokens.
    pub fn filter_argument(text: &str, origin: Position) -> Self {
        let options = LexerOptions {
            eval_mode: true,
            allow_filter: false,
        };
        let mut lexer = Self::new(text, options);
        lexer.cursor = origin;
        lexer.loose = true;
        lexer
    }

    /// Tokenize the entire source, up to and including the first `Eof`.
    pub fn tokenize(source: &str, options: LexerOptions) -> Result<Vec<Token>, LexError> {
        let mut lexer = Lexer::new(source, options);
        let mut tokens = Vec::new();

        loop {
            let token = lexer.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    pub fn mode(&self) -> LexerMode {
        self.mode
    }

    pub fn position(&self) -> Position {
        self.cursor
    }

    /// Read the next token. Returns `Eof` again on every call once the input is exhausted.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        let token = match self.pending.pop_front() {
            Some(token) => token,
            None => self.scan()?,
        };

        self.pos += token.end.index - self.cursor.index;
        self.cursor = token.end;
        self.after_operand = self.ends_operand(&token);
        Ok(token)
    }

    fn scan(&mut self) -> Result<Token, LexError> {
        if self.mode == LexerMode::Scripting {
            self.skip_whitespace();
        }

        if self.is_at_end() {
            return Ok(Token::new(
                TokenKind::Eof,
                TokenValue::None,
                self.cursor,
                self.cursor,
            ));
        }

        match self.mode {
            LexerMode::RawText => self.scan_raw_text(),
            LexerMode::Scripting => self.scan_script(),
            LexerMode::TemplateRaw => self.scan_template(),
            LexerMode::FilterContent => self.scan_filter(),
        }
    }

    // --- Modes ---

    fn scan_raw_text(&mut self) -> Result<Token, LexError> {
        if self.at_marker(self.pos) {
            self.enter(LexerMode::Scripting);
            return Ok(self.symbol(TokenKind::OpenScript, "${"));
        }

        let start = self.pos;
        let mut i = start;
        while i < self.chars.len() {
            match self.chars[i] {
                '\\' => i += 1 + self.escape_at(i, escape::RAW_EXTRAS)?,
                '$' if self.at_marker(i) => break,
                _ => i += 1,
            }
        }

        let raw = self.text(start, i);
        Ok(Token::new(
            TokenKind::Raw,
            TokenValue::Text(escape::unescape(&raw)),
            self.cursor,
            self.pos_at(i),
        )
        .with_raw(raw))
    }

    fn scan_script(&mut self) -> Result<Token, LexError> {
        let ch = self.chars[self.pos];
        let depth = self.braces.last().copied().unwrap_or(0);

        if ch == '}' && depth == 0 && !self.loose {
            return Ok(self.close_region());
        }

        let token = match self.literal().or_else(|| self.identifier()).or_else(|| self.number()) {
            Some(token) => Some(token),
            None => self.string()?,
        };

        if let Some(token) = token.or_else(|| self.punctuator()) {
            return Ok(self.classify(token));
        }

        if ch == '`' {
            self.templates += 1;
            self.enter(LexerMode::TemplateRaw);
            return Ok(self.symbol(TokenKind::Punctuator, "`"));
        }

        if self.loose {
            return Ok(self.symbol(TokenKind::Char, &ch.to_string()));
        }

        Err(self.unexpected(self.pos))
    }

    fn scan_template(&mut self) -> Result<Token, LexError> {
        let start = self.pos;
        let mut i = start;

        while i < self.chars.len() {
            match self.chars[i] {
                '\\' => i += 1 + self.escape_at(i, escape::TEMPLATE_EXTRAS)?,
                '`' => {
                    self.templates = self.templates.saturating_sub(1);
                    self.enter(LexerMode::Scripting);
                    let token = Token::new(
                        TokenKind::Punctuator,
                        TokenValue::Text("`".into()),
                        self.pos_at(i),
                        self.pos_at(i + 1),
                    );
                    self.pending.push_back(token);
                    break;
                }
                '$' if self.at_marker(i) => {
                    self.braces.push(0);
                    self.enter(LexerMode::Scripting);
                    let token = Token::new(
                        TokenKind::TemplateLeftBrace,
                        TokenValue::Text("${".into()),
                        self.pos_at(i),
                        self.pos_at(i + 2),
                    );
                    self.pending.push_back(token);
                    break;
                }
                _ => i += 1,
            }
        }

        if i > start {
            let raw = self.text(start, i);
            return Ok(Token::new(
                TokenKind::TemplateRaw,
                TokenValue::Text(escape::unescape(&raw)),
                self.cursor,
                self.pos_at(i),
            )
            .with_raw(raw));
        }

        self.drain()
    }

    /// Scan a whole filter clause, queueing its tokens in source order.
    fn scan_filter(&mut self) -> Result<Token, LexError> {
        let mut state = FilterState::Name;
        let mut segment = self.pos;
        let mut i = self.pos;

        while i < self.chars.len() {
            let ch = self.chars[i];

            if state == FilterState::Argument && ch == '\\' {
                i += 1 + self.escape_at(i, escape::FILTER_EXTRAS)?;
                continue;
            }

            if !matches!(ch, '}' | ':' | '|') {
                i += 1;
                continue;
            }

            self.queue_segment(state, segment, i);

            match ch {
                '}' => {
                    let token = Token::new(
                        TokenKind::CloseScript,
                        TokenValue::Text("}".into()),
                        self.pos_at(i),
                        self.pos_at(i + 1),
                    );
                    self.pending.push_back(token);
                    self.braces = vec![0];
                    self.enter(LexerMode::RawText);
                    return self.drain();
                }
                ':' => {
                    let token = Token::new(
                        TokenKind::FilterSep,
                        TokenValue::Text(":".into()),
                        self.pos_at(i),
                        self.pos_at(i + 1),
                    );
                    self.pending.push_back(token);
                    state = FilterState::Argument;
                }
                _ => {
                    let token = Token::new(
                        TokenKind::OpenFilter,
                        TokenValue::Text("|".into()),
                        self.pos_at(i),
                        self.pos_at(i + 1),
                    );
                    self.pending.push_back(token);
                    state = FilterState::Name;
                }
            }

            i += 1;
            segment = i;
        }

        // Unterminated clause (eval mode): flush what was scanned.
        self.queue_segment(state, segment, i);
        self.drain()
    }

    fn queue_segment(&mut self, state: FilterState, from: usize, to: usize) {
        let (mut start, mut end) = (from, to);
        while start < end && self.chars[start].is_whitespace() {
            start += 1;
        }
        while end > start && self.chars[end - 1].is_whitespace() {
            end -= 1;
        }

        let raw = self.text(start, end);
        let token = match state {
            FilterState::Name => Token::new(
                TokenKind::FilterFn,
                TokenValue::Text(raw),
                self.pos_at(start),
                self.pos_at(end),
            ),
            FilterState::Argument => Token::new(
                TokenKind::FilterArg,
                TokenValue::Text(escape::unescape_filter_argument(&raw)),
                self.pos_at(start),
                self.pos_at(end),
            )
            .with_raw(raw),
        };
        self.pending.push_back(token);
    }

    // --- Expression productions ---

    /// `true`, `false`, `null` or `undefined`, in any letter case.
    ///
    /// A keyword must end at an identifier boundary: `nullable` is one
    /// identifier, not `null` followed by `able`.
    fn literal(&self) -> Option<Token> {
        KEYWORDS.iter().find_map(|word| {
            let end = self.pos + word.len();
            let candidate = self.chars.get(self.pos..end)?;
            let matches = candidate
                .iter()
                .map(|c| c.to_ascii_lowercase())
                .eq(word.chars());
            let bounded = !self
                .chars
                .get(end)
                .is_some_and(|&c| is_identifier_continue(c));

            (matches && bounded).then(|| {
                Token::new(
                    TokenKind::Literal,
                    keyword_value(word),
                    self.cursor,
                    self.pos_at(end),
                )
                    .with_raw(self.text(self.pos, end))
            })
        })
    }

    fn identifier(&self) -> Option<Token> {
        let first = *self.chars.get(self.pos)?;
        // `${` inside an expression is the variable shorthand, left to `punctuator`.
        if !is_identifier_start(first) || self.at_marker(self.pos) {
            return None;
        }

        let mut end = self.pos + 1;
        while self
            .chars
            .get(end)
            .is_some_and(|&c| is_identifier_continue(c))
        {
            end += 1;
        }

        Some(Token::new(
            TokenKind::Identifier,
            TokenValue::Text(self.text(self.pos, end)),
            self.cursor,
            self.pos_at(end),
        ))
    }

    /// Longest prefix matching
    /// `-? (0 | [1-9][0-9]*) (. [0-9]+)? ([eE] [+-]? [0-9]+)?`.
    ///
    /// The leading minus is only taken where an operand may start, so `1-2`
    /// stays a subtraction.
    fn number(&self) -> Option<Token> {
        let mut state = NumberState::Start;
        let mut accepted = None;
        let mut i = self.pos;

        while let Some(&ch) = self.chars.get(i) {
            state = match state {
                NumberState::Start if ch == '-' && !self.after_operand => NumberState::Minus,
                NumberState::Start | NumberState::Minus if ch == '0' => {
                    accepted = Some(i + 1);
                    NumberState::Zero
                }
                NumberState::Start | NumberState::Minus if matches!(ch, '1'..='9') => {
                    accepted = Some(i + 1);
                    NumberState::Digit
                }
                NumberState::Start | NumberState::Minus => return None,
                NumberState::Digit if ch.is_ascii_digit() => {
                    accepted = Some(i + 1);
                    NumberState::Digit
                }
                NumberState::Zero | NumberState::Digit if ch == '.' => NumberState::Point,
                NumberState::Point | NumberState::Fraction if ch.is_ascii_digit() => {
                    accepted = Some(i + 1);
                    NumberState::Fraction
                }
                NumberState::Zero | NumberState::Digit | NumberState::Fraction
                    if matches!(ch, 'e' | 'E') =>
                {
                    NumberState::Exponent
                }
                NumberState::Exponent if matches!(ch, '+' | '-') => NumberState::ExponentSign,
                NumberState::Exponent | NumberState::ExponentSign | NumberState::ExponentDigit
                    if ch.is_ascii_digit() =>
                {
                    accepted = Some(i + 1);
                    NumberState::ExponentDigit
                }
                _ => break,
            };
            i += 1;
        }

        let end = accepted?;
        let raw = self.text(self.pos, end);
        Some(
            Token::new(
                TokenKind::Numeric,
                TokenValue::Number(format_number(&raw)),
                self.cursor,
                self.pos_at(end),
            )
            .with_raw(raw),
        )
    }

    fn string(&self) -> Result<Option<Token>, LexError> {
        let quote = self.chars[self.pos];
        if quote != '"' && quote != '\'' {
            return Ok(None);
        }

        match self.quoted(quote) {
            // A stray quote in a filter argument is plain text.
            Err(_) if self.loose => Ok(None),
            other => other.map(Some),
        }
    }

    fn quoted(&self, quote: char) -> Result<Token, LexError> {
        let mut i = self.pos + 1;

        loop {
            match self.chars.get(i) {
                None => {
                    return Err(LexError::UnterminatedString {
                        line: self.cursor.line,
                        column: self.cursor.column,
                    })
                }
                Some('\\') => i += 1 + self.escape_at(i, &[quote])?,
                Some(&c) if c == quote => break,
                Some(_) => i += 1,
            }
        }

        let value = escape::unescape(&self.text(self.pos + 1, i));
        Ok(Token::new(
            TokenKind::String,
            TokenValue::Text(value),
            self.cursor,
            self.pos_at(i + 1),
        )
        .with_raw(self.text(self.pos, i + 1)))
    }

    fn punctuator(&self) -> Option<Token> {
        PUNCTUATORS
            .iter()
            .find(|op| self.starts_with(op))
            .map(|op| self.symbol(TokenKind::Punctuator, op))
    }

    /// Track brace depth and turn a filter-position `|` into `OpenFilter`.
    fn classify(&mut self, mut token: Token) -> Token {
        if token.kind != TokenKind::Punctuator {
            return token;
        }

        match token.value.as_text() {
            Some("{") => {
                if let Some(depth) = self.braces.last_mut() {
                    *depth += 1;
                }
            }
            Some("}") => {
                if let Some(depth) = self.braces.last_mut() {
                    *depth = depth.saturating_sub(1);
                }
            }
            Some("|") if self.templates == 0 && self.options.allow_filter => {
                token.kind = TokenKind::OpenFilter;
                self.enter(LexerMode::FilterContent);
            }
            _ => {}
        }

        token
    }

    /// A `}` at brace depth zero ends the current script or interpolation.
    fn close_region(&mut self) -> Token {
        if self.braces.len() > 1 {
            self.braces.pop();
            self.enter(LexerMode::TemplateRaw);
            self.symbol(TokenKind::TemplateRightBrace, "}")
        } else {
            self.enter(LexerMode::RawText);
            self.symbol(TokenKind::CloseScript, "}")
        }
    }

    fn ends_operand(&self, token: &Token) -> bool {
        match token.kind {
            TokenKind::Identifier | TokenKind::Literal | TokenKind::Numeric | TokenKind::String => {
                true
            }
            TokenKind::Punctuator => match token.value.as_text() {
                Some(")" | "]" | "}") => true,
                // A closing backtick leaves the lexer scripting; an opening one does not.
                Some("`") => self.mode == LexerMode::Scripting,
                _ => false,
            },
            _ => false,
        }
    }

    // --- Helpers ---

    fn enter(&mut self, mode: LexerMode) {
        if self.mode != mode {
            tracing::trace!(
                from = ?self.mode,
                to = ?mode,
                line = self.cursor.line,
                column = self.cursor.column,
                "lexer mode change"
            );
        }
        self.mode = mode;
    }

    fn drain(&mut self) -> Result<Token, LexError> {
        self.pending
            .pop_front()
            .ok_or_else(|| self.unexpected(self.pos))
    }

    fn escape_at(&self, backslash: usize, extras: &[char]) -> Result<usize, LexError> {
        match escape::check(&self.chars, backslash, extras) {
            Escape::Legal(width) => Ok(width),
            Escape::Invalid(ch) => {
                let at = self.pos_at(backslash + 1);
                Err(LexError::InvalidEscape {
                    ch,
                    line: at.line,
                    column: at.column,
                })
            }
            Escape::Dangling => {
                let at = self.pos_at(backslash);
                Err(LexError::DanglingEscape {
                    line: at.line,
                    column: at.column,
                })
            }
        }
    }

    fn unexpected(&self, i: usize) -> LexError {
        let at = self.pos_at(i);
        LexError::UnexpectedCharacter {
            ch: self.chars.get(i).copied().unwrap_or('\0'),
            line: at.line,
            column: at.column,
        }
    }

    fn symbol(&self, kind: TokenKind, text: &str) -> Token {
        let end = self.pos + text.chars().count();
        Token::new(
            kind,
            TokenValue::Text(text.to_string()),
            self.cursor,
            self.pos_at(end),
        )
    }

    fn skip_whitespace(&mut self) {
        let mut i = self.pos;
        while self
            .chars
            .get(i)
            .is_some_and(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
        {
            i += 1;
        }
        self.cursor = self.pos_at(i);
        self.pos = i;
    }

    fn starts_with(&self, text: &str) -> bool {
        text.chars()
            .enumerate()
            .all(|(k, c)| self.chars.get(self.pos + k) == Some(&c))
    }

    fn at_marker(&self, i: usize) -> bool {
        self.chars.get(i) == Some(&'$') && self.chars.get(i + 1) == Some(&'{')
    }

    /// Position of local index `i`, which must not precede `pos`.
    fn pos_at(&self, i: usize) -> Position {
        self.cursor.advance(&self.chars[self.pos..i])
    }

    fn text(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }

    fn is_at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }
}
