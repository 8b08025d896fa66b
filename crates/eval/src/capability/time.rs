//! `declare time`: wall clock and timers.

use std::time::Duration;

use async_trait::async_trait;
use marrow_core::ast::DeclArg;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use super::Capability;
use crate::environment::{Env, Mutability};
use crate::error::RuntimeError;
use crate::value::{expect_arity, NativeFunction, Value};

const NAME: &str = "time";

#[derive(Debug, Default, Clone, Copy)]
pub struct TimeCapability;

#[async_trait(?Send)]
impl Capability for TimeCapability {
    fn name(&self) -> &str {
        NAME
    }

    fn builtins(&self) -> &[&'static str] {
        &["now", "wait"]
    }

    fn register_builtins(&self, root: &Env, _argument: Option<&DeclArg>) -> Result<(), RuntimeError> {
        root.define_or_replace(
            "now",
            NativeFunction::sync("now", |args| {
                expect_arity("now", args, 0)?;
                OffsetDateTime::now_utc()
                    .format(&Rfc3339)
                    .map(Value::Text)
                    .map_err(|e| RuntimeError::capability(NAME, e.to_string()))
            }),
            Mutability::Immutable,
        );
        root.define_or_replace(
            "wait",
            NativeFunction::asynchronous("wait", |args| {
                Box::pin(async move {
                    expect_arity("wait", &args, 1)?;
                    let millis = args[0]
                        .as_whole_number()
                        .and_then(|ms| u64::try_from(ms).ok())
                        .ok_or_else(|| {
                            RuntimeError::invalid_argument(
                                "wait",
                                format!("expected a non-negative whole number of milliseconds, got {}", args[0].repr()),
                            )
                        })?;
                    tokio::time::sleep(Duration::from_millis(millis)).await;
                    Ok(Value::Null)
                })
            }),
            Mutability::Immutable,
        );
        Ok(())
    }
}
