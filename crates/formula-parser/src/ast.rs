//! Abstract Syntax Tree for formula templates.
//!
//! One closed enum covers both the document level (raw text and `${ ... }`
//! regions) and the expression level. Serialized with a `type` tag so the
//! JSON form can be switched on by an evaluator. Binary nodes take their
//! operator family as the tag: `{"type": "minus", "op": "-", ...}`.

use serde::Serialize;

/// A node in the formula AST.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// Top-level container of raw text and expression regions.
    Document { body: Vec<Node> },

    /// Literal output text, escapes decoded.
    Raw { value: String },

    /// One `${ ... }` region.
    Expression { body: Box<Node> },

    /// `true`, `null`, `42`, `'text'`
    Literal { value: LiteralValue },

    /// Identifier reference: `user`, or the `${user}` shorthand.
    Variable { name: String },

    /// Backtick template: alternating `TemplateRaw` parts and expressions.
    Template { body: Vec<Node> },

    /// Literal text inside a backtick template.
    TemplateRaw { value: String },

    /// `[a, b]`
    Array { members: Vec<Node> },

    /// `{ a: 1, 'b': 2 }`. Order and duplicate keys are preserved.
    Object { members: Vec<ObjectMember> },

    /// Member access: `user.name`, `items[0]`
    Get { host: Box<Node>, key: GetKey },

    /// `max(a, b)`
    FuncCall { identifier: String, args: Vec<Node> },

    /// `!done`, `-x`
    Unary { op: UnaryOp, value: Box<Node> },

    /// `test ? consequent : alternate`
    Conditional {
        test: Box<Node>,
        consequent: Box<Node>,
        alternate: Box<Node>,
    },

    /// `input | fn_name:arg:arg`
    Filter {
        input: Box<Node>,
        #[serde(rename = "fnName")]
        fn_name: String,
        args: Vec<Fragment>,
    },

    /// A filter argument made of several literal and expression pieces.
    Mixed { body: Vec<Fragment> },

    /// Parenthesized list with other than exactly one element, e.g. `(a, b)` or `()`.
    ExpressionList { body: Vec<Node> },

    /// Binary operation. `kind` is written as the `type` tag.
    #[serde(untagged)]
    Binary {
        #[serde(rename = "type")]
        kind: BinaryKind,
        op: &'static str,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Value of a `Literal` node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Bool(bool),
    Null,
    Undefined,
    Number(f64),
    String(String),
}

/// Key of a `Get` node: `.name` gives a name, `[expr]` an expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GetKey {
    Name(String),
    Expr(Box<Node>),
}

/// Key of an object member.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ObjectKey {
    /// From an identifier or a string literal.
    Name(String),
    /// From a backtick template.
    Template(Box<Node>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectMember {
    pub key: ObjectKey,
    pub value: Node,
}

/// One filter argument, or one piece of a `Mixed` argument.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Fragment {
    Node(Node),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnaryOp {
    #[serde(rename = "+")]
    Plus,
    #[serde(rename = "-")]
    Minus,
    #[serde(rename = "~")]
    BitNot,
    #[serde(rename = "!")]
    Not,
}

impl UnaryOp {
    pub fn from_punctuator(op: &str) -> Option<Self> {
        match op {
            "+" => Some(UnaryOp::Plus),
            "-" => Some(UnaryOp::Minus),
            "~" => Some(UnaryOp::BitNot),
            "!" => Some(UnaryOp::Not),
            _ => None,
        }
    }
}

/// Node type of a binary operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryKind {
    Or,
    And,
    /// `|`, `^` and `&`
    #[serde(rename = "binary")]
    Bitwise,
    Eq,
    Ne,
    StrEq,
    StrNeq,
    Lt,
    Gt,
    Le,
    Ge,
    /// `<<`, `>>` and `>>>`
    Shift,
    Add,
    Minus,
    Multiply,
    Divide,
    Remainder,
    Power,
}

impl BinaryKind {
    /// The node type name an evaluator switches on.
    pub const fn name(self) -> &'static str {
        match self {
            BinaryKind::Or => "or",
            BinaryKind::And => "and",
            BinaryKind::Bitwise => "binary",
            BinaryKind::Eq => "eq",
            BinaryKind::Ne => "ne",
            BinaryKind::StrEq => "streq",
            BinaryKind::StrNeq => "strneq",
            BinaryKind::Lt => "lt",
            BinaryKind::Gt => "gt",
            BinaryKind::Le => "le",
            BinaryKind::Ge => "ge",
            BinaryKind::Shift => "shift",
            BinaryKind::Add => "add",
            BinaryKind::Minus => "minus",
            BinaryKind::Multiply => "multiply",
            BinaryKind::Divide => "divide",
            BinaryKind::Remainder => "remainder",
            BinaryKind::Power => "power",
        }
    }
}

impl Node {
    /// The `type` tag this node serializes with; binary nodes report their kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            Node::Document { .. } => "document",
            Node::Raw { .. } => "raw",
            Node::Expression { .. } => "expression",
            Node::Literal { .. } => "literal",
            Node::Variable { .. } => "variable",
            Node::Template { .. } => "template",
            Node::TemplateRaw { .. } => "template_raw",
            Node::Array { .. } => "array",
            Node::Object { .. } => "object",
            Node::Get { .. } => "get",
            Node::FuncCall { .. } => "func_call",
            Node::Unary { .. } => "unary",
            Node::Conditional { .. } => "conditional",
            Node::Binary { kind, .. } => kind.name(),
            Node::Filter { .. } => "filter",
            Node::Mixed { .. } => "mixed",
            Node::ExpressionList { .. } => "expression_list",
        }
    }
}
