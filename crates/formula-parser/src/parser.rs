//! Document parser for formula templates.
//!
//! Pulls tokens from `formula-lexer` on demand and builds the `Document`
//! (or, in eval mode, a single expression) AST. Expression productions live in
//! `expr_parser`; this module owns the token stream, the document and eval
//! entry points, and filter clauses.

use crate::ast::{Fragment, Node};
use crate::{ParseError, ParseOptions};
use formula_lexer::{is_identifier, Lexer, Token, TokenKind, TokenValue};

/// Deepest expression nesting a parse accepts.
pub const MAX_NESTING: usize = 128;

/// Formula parser.
///
/// Tokens are materialized into a buffer as the parser reaches them, so a
/// production can step back over a token it looked at speculatively.
pub struct Parser {
    lexer: Lexer,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    options: ParseOptions,
}

impl Parser {
    /// Create a new parser for the given source.
    pub fn new(source: &str, options: ParseOptions) -> Self {
        Self::from_lexer(Lexer::new(source, options), options)
    }

    fn from_lexer(lexer: Lexer, options: ParseOptions) -> Self {
        Self {
            lexer,
            tokens: Vec::new(),
            pos: 0,
            depth: 0,
            options,
        }
    }

    /// Parse source text into an AST according to `options.eval_mode`.
    pub fn parse(source: &str, options: ParseOptions) -> Result<Node, ParseError> {
        tracing::debug!(
            eval_mode = options.eval_mode,
            allow_filter = options.allow_filter,
            len = source.len(),
            "parsing formula"
        );

        let mut parser = Parser::new(source, options);
        if options.eval_mode {
            parser.parse_eval()
        } else {
            parser.parse_document()
        }
    }

    /// Parse a template document: raw text and `${ ... }` regions up to EOF.
    pub fn parse_document(&mut self) -> Result<Node, ParseError> {
        self.start()?;
        let mut body = Vec::new();

        while !self.at(TokenKind::Eof) {
            let node = match self.raw()? {
                Some(node) => Some(node),
                None => self.script()?,
            };
            match node {
                Some(node) => body.push(node),
                None => break,
            }
        }

        self.expect_end()?;
        Ok(Node::Document { body })
    }

    /// Parse the whole input as one expression, filters included.
    pub fn parse_eval(&mut self) -> Result<Node, ParseError> {
        self.start()?;
        let ast = self.complex_expression()?.ok_or_else(|| self.unexpected())?;
        self.expect_end()?;
        Ok(ast)
    }

    // =========================================================================
    // Document level
    // =========================================================================

    fn raw(&mut self) -> Result<Option<Node>, ParseError> {
        if !self.at(TokenKind::Raw) {
            return Ok(None);
        }

        let value = self.current().value.to_string();
        self.advance()?;
        Ok(Some(Node::Raw { value }))
    }

    /// `${ expression }`
    fn script(&mut self) -> Result<Option<Node>, ParseError> {
        if !self.at(TokenKind::OpenScript) {
            return Ok(None);
        }
        self.advance()?; // consume `${`

        let body = self.complex_expression()?.ok_or_else(|| self.unexpected())?;

        if !self.at(TokenKind::CloseScript) {
            return Err(self.missing("}"));
        }
        self.advance()?;

        Ok(Some(Node::Expression {
            body: Box::new(body),
        }))
    }

    // =========================================================================
    // Filters
    // =========================================================================

    /// An expression followed by any number of `| name:arg:arg` clauses.
    pub(crate) fn complex_expression(&mut self) -> Result<Option<Node>, ParseError> {
        let Some(mut ast) = self.expression()? else {
            return Ok(None);
        };

        while self.at(TokenKind::OpenFilter) {
            self.advance()?; // consume `|`

            let fn_name = self.filter_name()?;
            let mut args = Vec::new();
            while self.at(TokenKind::FilterSep) {
                self.advance()?; // consume `:`
                args.push(self.filter_argument()?);
            }

            tracing::debug!(filter = %fn_name, args = args.len(), "parsed filter");
            ast = Node::Filter {
                input: Box::new(ast),
                fn_name,
                args,
            };
        }

        Ok(Some(ast))
    }

    /// The clause text up to `:`, `|` or `}`, which must be a single identifier.
    fn filter_name(&mut self) -> Result<String, ParseError> {
        let token = self.current();
        let name = match (token.kind, token.value.as_text()) {
            (TokenKind::FilterFn, Some(name)) if is_identifier(name) => name.to_string(),
            _ => return Err(self.missing("filter name")),
        };
        self.advance()?;
        Ok(name)
    }

    /// Re-scan one argument's text as loose expression syntax.
    ///
    /// Literals, templates, arrays, objects and `${name}` become nodes; any
    /// other token is kept as text together with the whitespace around it.
    fn filter_argument(&mut self) -> Result<Fragment, ParseError> {
        if !self.at(TokenKind::FilterArg) {
            return Err(self.missing("filter argument"));
        }

        let token = self.current().clone();
        self.advance()?;

        // The sub-lexer counts over the decoded text, so columns after a `\:`
        // sit one to the left of the source column per escape.
        let text = token.value.as_text().unwrap_or_default();
        let lexer = Lexer::filter_argument(text, token.start);
        let mut sub = Parser::from_lexer(lexer, self.options);
        sub.start()?;
        sub.argument_fragments(text, token.start.index)
    }

    fn argument_fragments(&mut self, text: &str, base: usize) -> Result<Fragment, ParseError> {
        let chars: Vec<char> = text.chars().collect();
        let slice = |from: usize, to: usize| -> String {
            chars[from - base..to - base].iter().collect()
        };

        let mut parts = Vec::new();
        let mut last_end = base;

        while !self.at(TokenKind::Eof) {
            let start = self.current().start.index;
            match self.argument_node()? {
                Some(node) => {
                    push_text(&mut parts, slice(last_end, start));
                    parts.push(Fragment::Node(node));
                }
                None => {
                    let end = self.current().end.index;
                    push_text(&mut parts, slice(last_end, end));
                    self.advance()?;
                }
            }
            last_end = self.previous().map_or(base, |t| t.end.index);
        }

        Ok(match parts.len() {
            0 => Fragment::Text(String::new()),
            1 => parts.remove(0),
            _ => Fragment::Node(Node::Mixed { body: parts }),
        })
    }

    fn argument_node(&mut self) -> Result<Option<Node>, ParseError> {
        if let Some(node) = self.literal()? {
            return Ok(Some(node));
        }
        if let Some(node) = self.template()? {
            return Ok(Some(node));
        }
        if let Some(node) = self.array()? {
            return Ok(Some(node));
        }
        if let Some(node) = self.object()? {
            return Ok(Some(node));
        }
        self.shorthand()
    }

    // =========================================================================
    // Token stream
    // =========================================================================

    fn start(&mut self) -> Result<(), ParseError> {
        if self.tokens.is_empty() {
            let token = self.lexer.next_token()?;
            self.tokens.push(token);
        }
        Ok(())
    }

    pub(crate) fn current(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn previous(&self) -> Option<&Token> {
        self.pos.checked_sub(1).and_then(|i| self.tokens.get(i))
    }

    /// Move to the next token, pulling it from the lexer if it has not been read yet.
    pub(crate) fn advance(&mut self) -> Result<(), ParseError> {
        if self.current().kind == TokenKind::Eof {
            return Ok(());
        }
        self.pos += 1;
        if self.pos == self.tokens.len() {
            let token = self.lexer.next_token()?;
            self.tokens.push(token);
        }
        Ok(())
    }

    /// Step back one token.
    pub(crate) fn back(&mut self) {
        self.pos = self.pos.saturating_sub(1);
    }

    /// Enter one level of expression nesting; paired with `unnest`.
    pub(crate) fn nest(&mut self) -> Result<(), ParseError> {
        if self.depth == MAX_NESTING {
            let token = self.current();
            return Err(ParseError::NestingTooDeep {
                limit: MAX_NESTING,
                line: token.start.line,
                column: token.start.column,
            });
        }
        self.depth += 1;
        Ok(())
    }

    pub(crate) fn unnest(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub(crate) fn at(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    pub(crate) fn is_punct(&self, op: &str) -> bool {
        self.current().is_punctuator(op)
    }

    /// Consume the punctuator `op` or fail naming it.
    pub(crate) fn expect_punct(&mut self, op: &str) -> Result<(), ParseError> {
        if !self.is_punct(op) {
            return Err(self.missing(op));
        }
        self.advance()
    }

    /// The text of the current token when it is a string value.
    pub(crate) fn current_text(&self) -> Option<String> {
        match &self.current().value {
            TokenValue::Text(text) => Some(text.clone()),
            _ => None,
        }
    }

    fn expect_end(&self) -> Result<(), ParseError> {
        if self.at(TokenKind::Eof) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    pub(crate) fn unexpected(&self) -> ParseError {
        let token = self.current();
        ParseError::UnexpectedToken {
            kind: token.kind,
            value: token.source_text(),
            line: token.start.line,
            column: token.start.column,
        }
    }

    pub(crate) fn missing(&self, expected: &str) -> ParseError {
        let token = self.current();
        ParseError::MissingExpectedToken {
            expected: expected.to_string(),
            kind: token.kind,
            value: token.source_text(),
            line: token.start.line,
            column: token.start.column,
        }
    }
}

/// Append text to the last part when it is text already.
fn push_text(parts: &mut Vec<Fragment>, text: String) {
    if text.is_empty() {
        return;
    }
    match parts.last_mut() {
        Some(Fragment::Text(last)) => last.push_str(&text),
        _ => parts.push(Fragment::Text(text)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryKind, LiteralValue};
    use crate::{parse, LexError};
    use pretty_assertions::assert_eq;

    fn document(source: &str) -> Vec<Node> {
        match parse(source, ParseOptions::default()).unwrap() {
            Node::Document { body } => body,
            other => panic!("expected document, got {other:?}"),
        }
    }

    /// The body of the single `${ ... }` region in `source`.
    fn script(source: &str) -> Node {
        match document(source).as_slice() {
            [Node::Expression { body }] => (**body).clone(),
            other => panic!("expected one expression, got {other:?}"),
        }
    }

    fn error(source: &str) -> ParseError {
        parse(source, ParseOptions::default()).unwrap_err()
    }

    fn var(name: &str) -> Node {
        Node::Variable { name: name.into() }
    }

    fn num(n: f64) -> Node {
        Node::Literal {
            value: LiteralValue::Number(n),
        }
    }

    fn text(s: &str) -> Fragment {
        Fragment::Text(s.into())
    }

    fn filter(input: Node, name: &str, args: Vec<Fragment>) -> Node {
        Node::Filter {
            input: Box::new(input),
            fn_name: name.into(),
            args,
        }
    }

    // =========================================================================
    // Documents
    // =========================================================================

    #[test]
    fn test_empty_document() {
        assert_eq!(document(""), vec![]);
    }

    #[test]
    fn test_plain_raw_text() {
        assert_eq!(
            document("hello world"),
            vec![Node::Raw {
                value: "hello world".into()
            }]
        );
    }

    #[test]
    fn test_raw_and_expression() {
        assert_eq!(
            document("Hi ${name}!"),
            vec![
                Node::Raw { value: "Hi ".into() },
                Node::Expression {
                    body: Box::new(var("name"))
                },
                Node::Raw { value: "!".into() },
            ]
        );
    }

    #[test]
    fn test_escaped_marker_stays_raw() {
        assert_eq!(
            document("cost: \\${price}"),
            vec![Node::Raw {
                value: "cost: ${price}".into()
            }]
        );
    }

    #[test]
    fn test_dollar_identifier() {
        assert_eq!(script("${$}"), var("$"));
    }

    #[test]
    fn test_variable_shorthand() {
        assert_eq!(script("${ ${x} }"), var("x"));
    }

    #[test]
    fn test_shorthand_requires_identifier() {
        assert!(matches!(
            error("${ ${1} }"),
            ParseError::MissingExpectedToken { ref expected, .. } if expected == "identifier"
        ));
    }

    #[test]
    fn test_object_inside_script() {
        let node = script("${ {a: 1} }");
        assert_eq!(node.type_name(), "object");
    }

    #[test]
    fn test_bitwise_or_without_filters() {
        let options = ParseOptions {
            allow_filter: false,
            ..ParseOptions::default()
        };
        let ast = parse("${a | b}", options).unwrap();
        let expected = Node::Document {
            body: vec![Node::Expression {
                body: Box::new(Node::Binary {
                    kind: BinaryKind::Bitwise,
                    op: "|",
                    left: Box::new(var("a")),
                    right: Box::new(var("b")),
                }),
            }],
        };
        assert_eq!(ast, expected);
    }

    #[test]
    fn test_parser_entry_points() {
        let mut parser = Parser::new("a + 1", ParseOptions::default());
        assert_eq!(
            parser.parse_document().unwrap(),
            Node::Document {
                body: vec![Node::Raw {
                    value: "a + 1".into()
                }]
            }
        );

        let options = ParseOptions {
            eval_mode: true,
            ..ParseOptions::default()
        };
        let mut parser = Parser::new("a + 1", options);
        assert_eq!(parser.parse_eval().unwrap().type_name(), "add");
    }

    // =========================================================================
    // Filters
    // =========================================================================

    #[test]
    fn test_filter_chain() {
        assert_eq!(
            script("${a|b:1|c}"),
            filter(
                filter(var("a"), "b", vec![Fragment::Node(num(1.0))]),
                "c",
                vec![]
            )
        );
    }

    #[test]
    fn test_filter_text_argument() {
        assert_eq!(
            script("${date | format:YYYY-MM-DD}"),
            filter(var("date"), "format", vec![text("YYYY-MM-DD")])
        );
    }

    #[test]
    fn test_filter_escaped_separator() {
        assert_eq!(
            script("${t | time:HH\\:mm}"),
            filter(var("t"), "time", vec![text("HH:mm")])
        );
    }

    #[test]
    fn test_filter_argument_columns_count_decoded_text() {
        // `\:` decodes to one character, so the unterminated template is
        // reported at column 13 rather than its source column 14.
        let err = error("${a | f:x\\:`y}");
        assert!(matches!(
            err,
            ParseError::MissingExpectedToken { ref expected, kind: TokenKind::Eof, .. }
                if expected == "`"
        ));
        assert_eq!((err.line(), err.column()), (1, 13));
    }

    #[test]
    fn test_filter_string_argument() {
        let expected = filter(
            var("x"),
            "default",
            vec![Fragment::Node(Node::Literal {
                value: LiteralValue::String("n/a".into()),
            })],
        );
        assert_eq!(script("${x | default:'n/a'}"), expected);
    }

    #[test]
    fn test_filter_empty_argument() {
        assert_eq!(
            script("${x | pad:}"),
            filter(var("x"), "pad", vec![text("")])
        );
    }

    #[test]
    fn test_filter_several_arguments() {
        assert_eq!(
            script("${s | slice:0:-1}"),
            filter(
                var("s"),
                "slice",
                vec![Fragment::Node(num(0.0)), Fragment::Node(num(-1.0))]
            )
        );
    }

    #[test]
    fn test_filter_mixed_argument() {
        let expected = filter(
            var("x"),
            "pick",
            vec![Fragment::Node(Node::Mixed {
                body: vec![
                    text("a "),
                    Fragment::Node(Node::Array {
                        members: vec![num(1.0)],
                    }),
                    text(" "),
                    Fragment::Node(Node::Literal {
                        value: LiteralValue::String("c".into()),
                    }),
                ],
            })],
        );
        assert_eq!(script("${x | pick:a [1] 'c'}"), expected);
    }

    #[test]
    fn test_filter_lone_dollar_argument() {
        let expected = filter(
            var("n"),
            "prefix",
            vec![Fragment::Node(Node::Mixed {
                body: vec![text("$ "), Fragment::Node(num(5.0))],
            })],
        );
        assert_eq!(script("${n | prefix:$ 5}"), expected);
    }

    #[test]
    fn test_filter_applies_to_conditional() {
        let node = script("${a ? b : c | upper}");
        let Node::Filter { input, .. } = node else {
            panic!("expected filter");
        };
        assert_eq!(input.type_name(), "conditional");
    }

    #[test]
    fn test_filter_in_eval_mode() {
        let options = ParseOptions {
            eval_mode: true,
            ..ParseOptions::default()
        };
        assert_eq!(
            parse("a | upper", options).unwrap(),
            filter(var("a"), "upper", vec![])
        );
    }

    #[test]
    fn test_missing_filter_name() {
        assert!(matches!(
            error("${a | }"),
            ParseError::MissingExpectedToken {
                ref expected,
                kind: TokenKind::FilterFn,
                ..
            } if expected == "filter name"
        ));
    }

    #[test]
    fn test_filter_name_must_be_identifier() {
        for source in ["${a | 1+2}", "${a | b c}", "${a | 'x'}", "${a | f(1)}"] {
            assert!(
                matches!(
                    error(source),
                    ParseError::MissingExpectedToken {
                        ref expected,
                        kind: TokenKind::FilterFn,
                        ..
                    } if expected == "filter name"
                ),
                "{source}"
            );
        }
    }

    #[test]
    fn test_filter_name_reports_its_position() {
        let err = error("${a | b c}");
        assert_eq!((err.line(), err.column()), (1, 7));
    }

    #[test]
    fn test_filter_name_accepts_identifier_forms() {
        assert_eq!(
            document("${a | $fmt}"),
            vec![filter(var("a"), "$fmt", vec![])]
        );
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn test_unclosed_array_is_parse_error() {
        assert_eq!(
            error("${[1,2}"),
            ParseError::MissingExpectedToken {
                expected: "]".into(),
                kind: TokenKind::CloseScript,
                value: "}".into(),
                line: 1,
                column: 7,
            }
        );
    }

    #[test]
    fn test_unterminated_string_is_lex_error() {
        assert_eq!(
            error("${\"abc}"),
            ParseError::Lex(LexError::UnterminatedString { line: 1, column: 3 })
        );
    }

    #[test]
    fn test_invalid_escape_in_raw_text() {
        let err = error("a\\x");
        assert_eq!(
            err,
            ParseError::Lex(LexError::InvalidEscape {
                ch: 'x',
                line: 1,
                column: 3,
            })
        );
        assert_eq!((err.line(), err.column()), (1, 3));
    }

    #[test]
    fn test_empty_script() {
        assert!(matches!(
            error("${}"),
            ParseError::UnexpectedToken {
                kind: TokenKind::CloseScript,
                ..
            }
        ));
    }

    #[test]
    fn test_unclosed_script() {
        assert!(matches!(
            error("${a"),
            ParseError::MissingExpectedToken {
                ref expected,
                kind: TokenKind::Eof,
                ..
            } if expected == "}"
        ));
    }

    #[test]
    fn test_error_position_on_later_line() {
        assert_eq!(
            error("line\n${ + }"),
            ParseError::UnexpectedToken {
                kind: TokenKind::CloseScript,
                value: "}".into(),
                line: 2,
                column: 6,
            }
        );
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error("${a b}").to_string(),
            "Parse error at line 1, column 5: expected '}', found <Identifier> \"b\""
        );
    }
}
