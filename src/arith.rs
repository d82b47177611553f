use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};
use thiserror::Error;

use crate::ast::{MathExpr, MathOp, Value, ValueKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ArithError {
    #[error("division by zero in `{0}`")]
    DivisionByZero(String),

    #[error("`{expr}` does not produce a finite number")]
    NotFinite { expr: String },

    #[error("a {0} cannot be used in arithmetic")]
    Operand(ValueKind),
}

/// Evaluates an arithmetic operand: a number literal, a name looked up
/// through `resolve`, or a nested [`MathExpr`].
pub fn evaluate<E>(
    value: &Value,
    resolve: &mut dyn FnMut(&str) -> Result<f64, E>,
) -> Result<f64, E>
where
    E: From<ArithError>,
{
    match value {
        Value::Number(n) => Ok(*n),
        Value::Identifier(name) => resolve(name),
        Value::Math(math) => evaluate_math(math, resolve),
        other => Err(ArithError::Operand(other.kind()).into()),
    }
}

pub fn evaluate_math<E>(
    math: &MathExpr,
    resolve: &mut dyn FnMut(&str) -> Result<f64, E>,
) -> Result<f64, E>
where
    E: From<ArithError>,
{
    let left = evaluate(&math.left, resolve)?;
    let right = evaluate(&math.right, resolve)?;
    Ok(apply(math, left, right)?)
}

/// Applies `math.op` exactly where both operands fit a [`Decimal`], falling
/// back to float arithmetic otherwise.
fn apply(math: &MathExpr, left: f64, right: f64) -> Result<f64, ArithError> {
    if math.op == MathOp::Divide && right == 0.0 {
        return Err(ArithError::DivisionByZero(math.to_string()));
    }

    if let Some(a) = Decimal::from_f64(left)
        && let Some(b) = Decimal::from_f64(right)
    {
        let exact = match math.op {
            MathOp::Add => a.checked_add(b),
            MathOp::Subtract => a.checked_sub(b),
            MathOp::Multiply => a.checked_mul(b),
            MathOp::Divide => a.checked_div(b),
        };
        if let Some(r) = exact.and_then(|r| r.to_f64()) {
            return Ok(r);
        }
    }

    let r = match math.op {
        MathOp::Add => left + right,
        MathOp::Subtract => left - right,
        MathOp::Multiply => left * right,
        MathOp::Divide => left / right,
    };
    if !r.is_finite() {
        return Err(ArithError::NotFinite {
            expr: math.to_string(),
        });
    }
    Ok(r)
}
