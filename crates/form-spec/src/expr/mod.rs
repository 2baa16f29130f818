//! Expression language for derived fields.
//!
//! Source text is tokenized, parsed into an [`Expr`] tree and interpreted
//! against the ordered parent values. The only name in scope is `values`;
//! there are no calls, loops or property lookups beyond `.length`, so an
//! expression can read its inputs and nothing else.

mod eval;
mod lexer;
mod parser;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use eval::Scalar;

/// Limits applied when compiling user-authored expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EvalOptions {
    pub max_source_len: usize,
    /// Bound on tree depth: parentheses, unary operators, each operator in
    /// a chain such as `a + b + c`, and each `.length` all count.
    pub max_depth: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            max_source_len: 1024,
            max_depth: 64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

/// Parsed derivation expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    /// `values[index]`
    Parent(Box<Expr>),
    /// `values.length`
    ParentCount,
    /// `<expr>.length`
    Length(Box<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Conditional {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("expression is empty")]
    Empty,
    #[error("expression is longer than {max} characters")]
    TooLong { max: usize },
    #[error("expression nests deeper than {max} levels")]
    TooDeep { max: usize },
    #[error("unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },
    #[error("unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },
    #[error("invalid number '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },
    #[error("unexpected {found} at offset {offset}")]
    UnexpectedToken { found: String, offset: usize },
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unknown name '{name}' at offset {offset}; only `values` is in scope")]
    UnknownIdentifier { name: String, offset: usize },
    #[error("unsupported property '.{name}' at offset {offset}")]
    UnknownProperty { name: String, offset: usize },
    #[error("`values` must be indexed or used as `values.length` (offset {offset})")]
    BareValues { offset: usize },
    #[error("values[{index}] is out of range for {len} parent field(s)")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("index {index} is not a non-negative integer")]
    InvalidIndex { index: String },
    #[error("cannot apply '{op}' to {left} and {right}")]
    TypeMismatch {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("division by zero")]
    DivisionByZero,
}

impl Expr {
    /// Parse `source` with default limits.
    pub fn parse(source: &str) -> Result<Expr, ExprError> {
        Self::parse_with(source, &EvalOptions::default())
    }

    pub fn parse_with(source: &str, options: &EvalOptions) -> Result<Expr, ExprError> {
        if source.chars().count() > options.max_source_len {
            return Err(ExprError::TooLong {
                max: options.max_source_len,
            });
        }
        let tokens = lexer::tokenize(source)?;
        parser::Parser::new(tokens, options.max_depth).parse()
    }

    /// Evaluate against the ordered parent values.
    pub fn evaluate(&self, values: &[Scalar]) -> Result<Scalar, ExprError> {
        eval::evaluate(self, values)
    }
}

/// Parse and evaluate in one step.
pub fn evaluate_source(
    source: &str,
    values: &[Scalar],
    options: &EvalOptions,
) -> Result<Scalar, ExprError> {
    Expr::parse_with(source, options)?.evaluate(values)
}
