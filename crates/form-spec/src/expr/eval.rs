use std::fmt;

use super::{BinaryOp, Expr, ExprError, UnaryOp};
use crate::values::FieldValue;

/// Runtime value inside an expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Number(f64),
    Str(String),
    Bool(bool),
}

impl Scalar {
    fn type_name(&self) -> &'static str {
        match self {
            Scalar::Number(_) => "number",
            Scalar::Str(_) => "string",
            Scalar::Bool(_) => "boolean",
        }
    }

    /// Numeric reading: numbers, and strings whose trimmed text is a finite
    /// number. Empty text is not numeric.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Scalar::Number(number) => Some(*number),
            Scalar::Str(text) => {
                let trimmed = text.trim();
                if trimmed.is_empty() {
                    return None;
                }
                trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
            }
            Scalar::Bool(_) => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Scalar::Number(number) => *number != 0.0 && !number.is_nan(),
            Scalar::Str(text) => !text.is_empty(),
            Scalar::Bool(flag) => *flag,
        }
    }

    /// Convert an expression result into a stored field value.
    pub fn into_field_value(self) -> FieldValue {
        match self {
            Scalar::Bool(flag) => FieldValue::Bool(flag),
            other => FieldValue::Text(other.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(number) => write!(f, "{}", format_number(*number)),
            Scalar::Str(text) => f.write_str(text),
            Scalar::Bool(flag) => write!(f, "{flag}"),
        }
    }
}

impl From<&FieldValue> for Scalar {
    fn from(value: &FieldValue) -> Self {
        match value {
            FieldValue::Text(text) => Scalar::Str(text.clone()),
            FieldValue::Bool(flag) => Scalar::Bool(*flag),
            FieldValue::Unset => Scalar::Str(String::new()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Str(value.to_string())
    }
}

fn format_number(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 1e15 {
        // -0 prints as 0
        format!("{}", number as i64)
    } else {
        format!("{number}")
    }
}

pub(super) fn evaluate(expr: &Expr, values: &[Scalar]) -> Result<Scalar, ExprError> {
    match expr {
        Expr::Number(number) => Ok(Scalar::Number(*number)),
        Expr::Str(text) => Ok(Scalar::Str(text.clone())),
        Expr::Bool(flag) => Ok(Scalar::Bool(*flag)),
        Expr::Parent(index) => {
            let index = evaluate(index, values)?;
            let slot = parent_index(&index)?;
            values
                .get(slot)
                .cloned()
                .ok_or(ExprError::IndexOutOfBounds {
                    index: slot,
                    len: values.len(),
                })
        }
        Expr::ParentCount => Ok(Scalar::Number(values.len() as f64)),
        Expr::Length(inner) => match evaluate(inner, values)? {
            Scalar::Str(text) => Ok(Scalar::Number(text.chars().count() as f64)),
            other => Err(ExprError::TypeMismatch {
                op: ".length",
                left: other.type_name(),
                right: "property",
            }),
        },
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, values)?;
            match op {
                UnaryOp::Not => Ok(Scalar::Bool(!value.is_truthy())),
                UnaryOp::Neg => value
                    .as_number()
                    .map(|number| Scalar::Number(-number))
                    .ok_or(ExprError::TypeMismatch {
                        op: "-",
                        left: value.type_name(),
                        right: "nothing",
                    }),
            }
        }
        Expr::Binary { op, left, right } => binary(*op, left, right, values),
        Expr::Conditional {
            condition,
            then,
            otherwise,
        } => {
            if evaluate(condition, values)?.is_truthy() {
                evaluate(then, values)
            } else {
                evaluate(otherwise, values)
            }
        }
    }
}

fn parent_index(index: &Scalar) -> Result<usize, ExprError> {
    match index.as_number() {
        Some(number) if number >= 0.0 && number.fract() == 0.0 => Ok(number as usize),
        _ => Err(ExprError::InvalidIndex {
            index: index.to_string(),
        }),
    }
}

fn binary(op: BinaryOp, left: &Expr, right: &Expr, values: &[Scalar]) -> Result<Scalar, ExprError> {
    let lhs = evaluate(left, values)?;
    match op {
        BinaryOp::And if !lhs.is_truthy() => return Ok(lhs),
        BinaryOp::Or if lhs.is_truthy() => return Ok(lhs),
        _ => {}
    }
    let rhs = evaluate(right, values)?;
    let numbers = lhs.as_number().zip(rhs.as_number());

    match op {
        BinaryOp::Add => Ok(match numbers {
            Some((a, b)) => Scalar::Number(a + b),
            None => Scalar::Str(format!("{lhs}{rhs}")),
        }),
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (a, b) = numbers.ok_or_else(|| mismatch(op, &lhs, &rhs))?;
            match op {
                BinaryOp::Sub => Ok(Scalar::Number(a - b)),
                BinaryOp::Mul => Ok(Scalar::Number(a * b)),
                _ if b == 0.0 => Err(ExprError::DivisionByZero),
                BinaryOp::Div => Ok(Scalar::Number(a / b)),
                _ => Ok(Scalar::Number(a % b)),
            }
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (&lhs, &rhs, numbers) {
                (_, _, Some((a, b))) => a.partial_cmp(&b),
                (Scalar::Str(a), Scalar::Str(b), None) => Some(a.cmp(b)),
                _ => None,
            }
            .ok_or_else(|| mismatch(op, &lhs, &rhs))?;
            Ok(Scalar::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        BinaryOp::Eq | BinaryOp::Ne => {
            let equal = match numbers {
                Some((a, b)) => a == b,
                None => lhs == rhs,
            };
            Ok(Scalar::Bool(if op == BinaryOp::Eq { equal } else { !equal }))
        }
        BinaryOp::And | BinaryOp::Or => Ok(rhs),
    }
}

fn mismatch(op: BinaryOp, lhs: &Scalar, rhs: &Scalar) -> ExprError {
    ExprError::TypeMismatch {
        op: op.symbol(),
        left: lhs.type_name(),
        right: rhs.type_name(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_display_without_trailing_zero() {
        assert_eq!(Scalar::Number(7.0).to_string(), "7");
        assert_eq!(Scalar::Number(-0.0).to_string(), "0");
        assert_eq!(Scalar::Number(2.5).to_string(), "2.5");
        assert_eq!(Scalar::Number(0.1 + 0.2).to_string(), "0.30000000000000004");
    }

    #[test]
    fn field_values_become_scalars() {
        assert_eq!(Scalar::from(&FieldValue::Unset), Scalar::Str(String::new()));
        assert_eq!(Scalar::from(&FieldValue::Bool(true)), Scalar::Bool(true));
        assert_eq!(
            Scalar::Number(12.0).into_field_value(),
            FieldValue::Text("12".into())
        );
        assert_eq!(Scalar::Bool(false).into_field_value(), FieldValue::Bool(false));
    }

    #[test]
    fn empty_text_is_not_numeric() {
        assert_eq!(Scalar::from("").as_number(), None);
        assert_eq!(Scalar::from(" 4 ").as_number(), Some(4.0));
        assert_eq!(Scalar::from("inf").as_number(), None);
    }
}
