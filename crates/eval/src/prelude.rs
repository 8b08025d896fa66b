//! Builtins present in every program's root scope.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::environment::{Env, Mutability};
use crate::error::RuntimeError;
use crate::value::{expect_arity, NativeFunction, Value};

pub fn install(root: &Env) {
    let natives = [
        NativeFunction::sync("length", length),
        NativeFunction::sync("push", push),
        NativeFunction::sync("keys", keys),
        NativeFunction::sync("text", |args| {
            expect_arity("text", args, 1)?;
            Ok(Value::Text(args[0].to_string()))
        }),
        NativeFunction::sync("number", number),
        NativeFunction::sync("type_of", |args| {
            expect_arity("type_of", args, 1)?;
            Ok(Value::text(args[0].type_name()))
        }),
    ];
    for native in natives {
        if let Value::Callable(callable) = &native {
            let name = callable.name().to_string();
            root.define_or_replace(name, native, Mutability::Immutable);
        }
    }
}

fn length(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("length", args, 1)?;
    let length = match &args[0] {
        Value::Text(s) => s.chars().count(),
        Value::List(items) => items.borrow().len(),
        Value::Map(entries) => entries.borrow().len(),
        other => {
            return Err(RuntimeError::invalid_argument(
                "length",
                format!("expected Text, List or Map, got {}", other.type_name()),
            ))
        }
    };
    Ok(Value::Number(Decimal::from(length)))
}

fn push(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("push", args, 2)?;
    match &args[0] {
        Value::List(items) => {
            items.borrow_mut().push(args[1].clone());
            Ok(args[0].clone())
        }
        other => Err(RuntimeError::invalid_argument(
            "push",
            format!("expected a List, got {}", other.type_name()),
        )),
    }
}

fn keys(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("keys", args, 1)?;
    match &args[0] {
        Value::Map(entries) => Ok(Value::list(
            entries.borrow().keys().cloned().map(Value::Text).collect(),
        )),
        other => Err(RuntimeError::invalid_argument(
            "keys",
            format!("expected a Map, got {}", other.type_name()),
        )),
    }
}

fn number(args: &[Value]) -> Result<Value, RuntimeError> {
    expect_arity("number", args, 1)?;
    match &args[0] {
        Value::Number(n) => Ok(Value::Number(*n)),
        Value::Text(s) => Decimal::from_str(s.trim())
            .map(Value::Number)
            .map_err(|_| RuntimeError::invalid_argument("number", format!("'{}' is not a number", s))),
        other => Err(RuntimeError::invalid_argument(
            "number",
            format!("cannot convert {} to a number", other.type_name()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Callable;

    async fn call(name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let root = Env::root();
        install(&root);
        match root.lookup(name) {
            Some(Value::Callable(Callable::Native(native))) => native.call(args).await,
            other => panic!("{} is not a native: {:?}", name, other),
        }
    }

    #[tokio::test]
    async fn length_counts_characters_and_items() {
        assert_eq!(call("length", vec![Value::text("héllo")]).await.unwrap(), Value::number(5));
        assert_eq!(
            call("length", vec![Value::list(vec![Value::Null, Value::Null])]).await.unwrap(),
            Value::number(2)
        );
        assert!(call("length", vec![Value::number(3)]).await.is_err());
    }

    #[tokio::test]
    async fn push_mutates_shared_list() {
        let list = Value::list(vec![]);
        let returned = call("push", vec![list.clone(), Value::number(1)]).await.unwrap();
        assert_eq!(list.to_string(), "[1]");
        assert_eq!(returned, list);
    }

    #[tokio::test]
    async fn number_parses_text() {
        assert_eq!(call("number", vec![Value::text(" 42 ")]).await.unwrap(), Value::number(42));
        assert!(matches!(
            call("number", vec![Value::text("forty")]).await.unwrap_err(),
            RuntimeError::InvalidArgument { .. }
        ));
    }

    #[tokio::test]
    async fn type_of_and_text() {
        assert_eq!(call("type_of", vec![Value::Null]).await.unwrap(), Value::text("Null"));
        assert_eq!(call("text", vec![Value::number(7)]).await.unwrap(), Value::text("7"));
        assert!(matches!(
            call("text", vec![]).await.unwrap_err(),
            RuntimeError::Arity { expected: 1, got: 0, .. }
        ));
    }
}
