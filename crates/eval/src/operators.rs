//! Operator semantics on runtime values.
//!
//! `and`/`or` are not here: they short-circuit, so the evaluator handles
//! them before either side is evaluated twice.

use std::cmp::Ordering;

use marrow_core::ast::{BinaryOp, UnaryOp};
use rust_decimal::Decimal;

use crate::error::RuntimeError;
use crate::value::Value;

pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Add => match (left, right) {
            (Value::Number(a), Value::Number(b)) => checked(op, a.checked_add(*b)),
            _ => Ok(Value::Text(format!("{}{}", left, right))),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            let (a, b) = numbers(op, left, right)?;
            arithmetic(op, a, b)
        }
        BinaryOp::Eq => Ok(Value::Boolean(left == right)),
        BinaryOp::NotEq => Ok(Value::Boolean(left != right)),
        BinaryOp::Lt | BinaryOp::LtEq | BinaryOp::Gt | BinaryOp::GtEq => {
            let ordering = compare(op, left, right)?;
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::LtEq => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            };
            Ok(Value::Boolean(result))
        }
        BinaryOp::And => Ok(Value::Boolean(left.is_truthy() && right.is_truthy())),
        BinaryOp::Or => Ok(Value::Boolean(left.is_truthy() || right.is_truthy())),
    }
}

pub fn unary(op: UnaryOp, operand: &Value) -> Result<Value, RuntimeError> {
    match (op, operand) {
        (UnaryOp::Not, value) => Ok(Value::Boolean(!value.is_truthy())),
        (UnaryOp::Neg, Value::Number(n)) => Ok(Value::Number(-*n)),
        (UnaryOp::Neg, other) => Err(RuntimeError::TypeMismatch {
            op: "-".to_string(),
            left: other.type_name(),
            right: "nothing",
        }),
    }
}

/// `object[index]`: list position, map key or text character.
pub fn index(object: &Value, index: &Value) -> Result<Value, RuntimeError> {
    match (object, index) {
        (Value::List(items), _) => {
            let items = items.borrow();
            let position = list_position(index, items.len())?;
            Ok(items[position].clone())
        }
        (Value::Map(entries), key) => Ok(entries
            .borrow()
            .get(&key.to_string())
            .cloned()
            .unwrap_or(Value::Null)),
        (Value::Text(s), _) => {
            let length = s.chars().count();
            let position = list_position(index, length)?;
            Ok(s.chars()
                .nth(position)
                .map(|c| Value::Text(c.to_string()))
                .unwrap_or(Value::Null))
        }
        _ => Err(RuntimeError::TypeMismatch {
            op: "[]".to_string(),
            left: object.type_name(),
            right: index.type_name(),
        }),
    }
}

/// Validate `index` as a position in a sequence of `length` items.
pub fn list_position(index: &Value, length: usize) -> Result<usize, RuntimeError> {
    index
        .as_whole_number()
        .and_then(|i| usize::try_from(i).ok())
        .filter(|i| *i < length)
        .ok_or_else(|| RuntimeError::IndexOutOfBounds {
            index: index.to_string(),
            length,
        })
}

/// Whether a select subject "contains" a case key.
pub fn contains(subject: &Value, key: &Value) -> bool {
    match subject {
        Value::Map(entries) => entries.borrow().contains_key(&key.to_string()),
        Value::List(items) => items.borrow().iter().any(|item| item == key),
        Value::Text(s) => match key {
            Value::Text(k) => s.contains(k.as_str()),
            _ => false,
        },
        other => other == key,
    }
}

fn numbers(op: BinaryOp, left: &Value, right: &Value) -> Result<(Decimal, Decimal), RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok((*a, *b)),
        _ => Err(mismatch(op, left, right)),
    }
}

fn arithmetic(op: BinaryOp, a: Decimal, b: Decimal) -> Result<Value, RuntimeError> {
    match op {
        BinaryOp::Sub => checked(op, a.checked_sub(b)),
        BinaryOp::Mul => checked(op, a.checked_mul(b)),
        BinaryOp::Div | BinaryOp::Rem if b.is_zero() => Err(RuntimeError::DivisionByZero),
        BinaryOp::Div => checked(op, a.checked_div(b)),
        _ => checked(op, a.checked_rem(b)),
    }
}

fn checked(op: BinaryOp, result: Option<Decimal>) -> Result<Value, RuntimeError> {
    result.map(Value::Number).ok_or_else(|| RuntimeError::Overflow {
        op: op.symbol().to_string(),
    })
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Ordering, RuntimeError> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Ok(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
        _ => Err(mismatch(op, left, right)),
    }
}

fn mismatch(op: BinaryOp, left: &Value, right: &Value) -> RuntimeError {
    RuntimeError::TypeMismatch {
        op: op.symbol().to_string(),
        left: left.type_name(),
        right: right.type_name(),
    }
}
