//! Expression productions.
//!
//! Recursive descent over the parser's token buffer. Binary operators are
//! folded by precedence climbing over one table; each entry is its own tier,
//! so operators that share a family (`==` and `!=`, `<` and `<=`) still nest
//! in table order.

use crate::ast::{BinaryKind, GetKey, LiteralValue, Node, ObjectKey, ObjectMember, UnaryOp};
use crate::parser::Parser;
use crate::ParseError;
use formula_lexer::{TokenKind, TokenValue};

/// Binary operators, loosest first. Each entry binds tighter than the ones above it.
const BINARY_TIERS: &[(&str, BinaryKind)] = &[
    ("||", BinaryKind::Or),
    ("&&", BinaryKind::And),
    ("|", BinaryKind::Bitwise),
    ("^", BinaryKind::Bitwise),
    ("&", BinaryKind::Bitwise),
    ("==", BinaryKind::Eq),
    ("!=", BinaryKind::Ne),
    ("===", BinaryKind::StrEq),
    ("!==", BinaryKind::StrNeq),
    ("<", BinaryKind::Lt),
    (">", BinaryKind::Gt),
    ("<=", BinaryKind::Le),
    (">=", BinaryKind::Ge),
    ("<<", BinaryKind::Shift),
    (">>", BinaryKind::Shift),
    (">>>", BinaryKind::Shift),
    ("+", BinaryKind::Add),
    ("-", BinaryKind::Minus),
    ("*", BinaryKind::Multiply),
    ("/", BinaryKind::Divide),
    ("%", BinaryKind::Remainder),
    ("**", BinaryKind::Power),
];

impl Parser {
    /// `test ? consequent : alternate`, or a binary expression.
    ///
    /// Each call counts one level against the nesting limit.
    pub(crate) fn expression(&mut self) -> Result<Option<Node>, ParseError> {
        self.nest()?;
        let node = match self.binary(0)? {
            Some(test) if self.is_punct("?") => Some(self.conditional(test)?),
            node => node,
        };
        self.unnest();
        Ok(node)
    }

    fn require_expression(&mut self) -> Result<Node, ParseError> {
        self.expression()?.ok_or_else(|| self.unexpected())
    }

    fn conditional(&mut self, test: Node) -> Result<Node, ParseError> {
        self.advance()?; // consume `?`

        let consequent = self.require_expression()?;
        self.expect_punct(":")?;
        let alternate = self.require_expression()?;

        Ok(Node::Conditional {
            test: Box::new(test),
            consequent: Box::new(consequent),
            alternate: Box::new(alternate),
        })
    }

    /// Fold operators of tier `min_tier` or tighter onto the operand at the cursor.
    ///
    /// Operators of one tier fold left; the right operand only takes tighter
    /// tiers, so `1 + 2 - 3` is `1 + (2 - 3)` and `1 - 2 + 3` is `(1 - 2) + 3`.
    fn binary(&mut self, min_tier: usize) -> Result<Option<Node>, ParseError> {
        let Some(mut left) = self.unary()? else {
            return Ok(None);
        };

        while let Some(tier) = self.current_tier().filter(|&tier| tier >= min_tier) {
            let (op, kind) = BINARY_TIERS[tier];
            self.advance()?;
            let right = self.binary(tier + 1)?.ok_or_else(|| self.unexpected())?;
            left = Node::Binary {
                kind,
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(Some(left))
    }

    fn current_tier(&self) -> Option<usize> {
        let token = self.current();
        if token.kind != TokenKind::Punctuator {
            return None;
        }
        let text = token.value.as_text()?;
        BINARY_TIERS.iter().position(|(op, _)| *op == text)
    }

    /// Prefix operators apply innermost-last: `-!x` is `-(!x)`.
    fn unary(&mut self) -> Result<Option<Node>, ParseError> {
        let mut ops = Vec::new();
        while let Some(op) = self.current_unary_op() {
            ops.push(op);
            self.advance()?;
        }

        let Some(mut node) = self.postfix()? else {
            return if ops.is_empty() {
                Ok(None)
            } else {
                Err(self.unexpected())
            };
        };

        while let Some(op) = ops.pop() {
            node = Node::Unary {
                op,
                value: Box::new(node),
            };
        }

        Ok(Some(node))
    }

    fn current_unary_op(&self) -> Option<UnaryOp> {
        let token = self.current();
        if token.kind != TokenKind::Punctuator {
            return None;
        }
        token.value.as_text().and_then(UnaryOp::from_punctuator)
    }

    /// Member access chains: `a.b`, `a[expr]`.
    fn postfix(&mut self) -> Result<Option<Node>, ParseError> {
        let node = match self.func_call()? {
            Some(call) => Some(call),
            None => self.primary()?,
        };
        let Some(mut node) = node else {
            return Ok(None);
        };

        loop {
            let key = if self.is_punct(".") {
                self.advance()?;
                GetKey::Name(self.member_name()?)
            } else if self.is_punct("[") {
                self.advance()?;
                let key = self.require_expression()?;
                self.expect_punct("]")?;
                GetKey::Expr(Box::new(key))
            } else {
                break;
            };

            node = Node::Get {
                host: Box::new(node),
                key,
            };
        }

        Ok(Some(node))
    }

    /// Name after `.`; keywords are accepted as plain names.
    fn member_name(&mut self) -> Result<String, ParseError> {
        let token = self.current();
        let name = match token.kind {
            TokenKind::Identifier => self.current_text(),
            TokenKind::Literal => token.raw.clone(),
            _ => None,
        };
        let name = name.ok_or_else(|| self.missing("identifier"))?;
        self.advance()?;
        Ok(name)
    }

    /// `name(args)`; steps back when the identifier is not followed by `(`.
    fn func_call(&mut self) -> Result<Option<Node>, ParseError> {
        if !self.at(TokenKind::Identifier) {
            return Ok(None);
        }
        let identifier = self.current_text().unwrap_or_default();
        self.advance()?;

        if !self.is_punct("(") {
            self.back();
            return Ok(None);
        }

        let args = self.expression_list(")")?;
        Ok(Some(Node::FuncCall { identifier, args }))
    }

    /// Dispatch on the current token to the one primary it can start.
    fn primary(&mut self) -> Result<Option<Node>, ParseError> {
        let token = self.current();
        match token.kind {
            TokenKind::Identifier => self.identifier(),
            TokenKind::Literal | TokenKind::Numeric | TokenKind::String => self.literal(),
            TokenKind::Punctuator => match token.value.as_text() {
                Some("`") => self.template(),
                Some("[") => self.array(),
                Some("{") => self.object(),
                Some("(") => self.group(),
                Some("$") => self.shorthand(),
                _ => Ok(None),
            },
            _ => Ok(None),
        }
    }

    // =========================================================================
    // Primaries
    // =========================================================================

    fn identifier(&mut self) -> Result<Option<Node>, ParseError> {
        if !self.at(TokenKind::Identifier) {
            return Ok(None);
        }
        let name = self.current_text().unwrap_or_default();
        self.advance()?;
        Ok(Some(Node::Variable { name }))
    }

    pub(crate) fn literal(&mut self) -> Result<Option<Node>, ParseError> {
        let value = match (&self.current().kind, &self.current().value) {
            (TokenKind::Literal, TokenValue::Bool(b)) => LiteralValue::Bool(*b),
            (TokenKind::Literal, TokenValue::Null) => LiteralValue::Null,
            (TokenKind::Literal, TokenValue::Undefined) => LiteralValue::Undefined,
            (TokenKind::Numeric, TokenValue::Number(n)) => LiteralValue::Number(*n),
            (TokenKind::String, TokenValue::Text(s)) => LiteralValue::String(s.clone()),
            _ => return Ok(None),
        };
        self.advance()?;
        Ok(Some(Node::Literal { value }))
    }

    /// `` `text ${expr} text` ``
    pub(crate) fn template(&mut self) -> Result<Option<Node>, ParseError> {
        if !self.is_punct("`") {
            return Ok(None);
        }
        self.advance()?; // consume opening backtick

        let mut body = Vec::new();
        loop {
            match self.current().kind {
                TokenKind::TemplateRaw => {
                    let value = self.current().value.to_string();
                    self.advance()?;
                    body.push(Node::TemplateRaw { value });
                }
                TokenKind::TemplateLeftBrace => {
                    self.advance()?;
                    let expr = self.require_expression()?;
                    if !self.at(TokenKind::TemplateRightBrace) {
                        return Err(self.missing("}"));
                    }
                    self.advance()?;
                    body.push(expr);
                }
                TokenKind::Punctuator if self.is_punct("`") => {
                    self.advance()?;
                    break;
                }
                _ => return Err(self.missing("`")),
            }
        }

        Ok(Some(Node::Template { body }))
    }

    pub(crate) fn array(&mut self) -> Result<Option<Node>, ParseError> {
        if !self.is_punct("[") {
            return Ok(None);
        }
        let members = self.expression_list("]")?;
        Ok(Some(Node::Array { members }))
    }

    /// `{ key: value, ... }` with identifier, string or template keys.
    pub(crate) fn object(&mut self) -> Result<Option<Node>, ParseError> {
        if !self.is_punct("{") {
            return Ok(None);
        }
        self.advance()?; // consume `{`

        let mut members = Vec::new();
        if self.is_punct("}") {
            self.advance()?;
            return Ok(Some(Node::Object { members }));
        }

        loop {
            let key = self.object_key()?;
            self.expect_punct(":")?;
            let value = self.require_expression()?;
            members.push(ObjectMember { key, value });

            if self.is_punct(",") {
                self.advance()?;
                continue;
            }
            self.expect_punct("}")?;
            break;
        }

        Ok(Some(Node::Object { members }))
    }

    fn object_key(&mut self) -> Result<ObjectKey, ParseError> {
        if let Some(template) = self.template()? {
            return Ok(ObjectKey::Template(Box::new(template)));
        }

        let token = self.current();
        let key = match token.kind {
            TokenKind::Identifier | TokenKind::String => self.current_text(),
            TokenKind::Literal => token.raw.clone(),
            _ => None,
        };
        let key = key.ok_or_else(|| self.missing("object key"))?;
        self.advance()?;
        Ok(ObjectKey::Name(key))
    }

    /// `( expr, ... )`; a single element is returned as itself.
    fn group(&mut self) -> Result<Option<Node>, ParseError> {
        if !self.is_punct("(") {
            return Ok(None);
        }

        let mut body = self.expression_list(")")?;
        if body.len() == 1 {
            return Ok(body.pop());
        }
        Ok(Some(Node::ExpressionList { body }))
    }

    /// `${name}` inside an expression.
    pub(crate) fn shorthand(&mut self) -> Result<Option<Node>, ParseError> {
        let token = self.current();
        let is_dollar = matches!(token.kind, TokenKind::Punctuator | TokenKind::Identifier)
            && token.value.as_text() == Some("$");
        if !is_dollar {
            return Ok(None);
        }
        self.advance()?;

        if !self.is_punct("{") {
            self.back();
            return Ok(None);
        }
        self.advance()?; // consume `{`

        if !self.at(TokenKind::Identifier) {
            return Err(self.missing("identifier"));
        }
        let name = self.current_text().unwrap_or_default();
        self.advance()?;
        self.expect_punct("}")?;

        Ok(Some(Node::Variable { name }))
    }

    /// Comma-separated expressions from the current opening bracket up to `close`.
    fn expression_list(&mut self, close: &str) -> Result<Vec<Node>, ParseError> {
        self.advance()?; // consume the opening bracket

        let mut items = Vec::new();
        if self.is_punct(close) {
            self.advance()?;
            return Ok(items);
        }

        loop {
            let item = self.expression()?.ok_or_else(|| self.unexpected())?;
            items.push(item);
            if self.is_punct(",") {
                self.advance()?;
                continue;
            }
            self.expect_punct(close)?;
            break;
        }

        Ok(items)
    }
}
