//! `declare random [seed]`: pseudo-random numbers.
//!
//! With a seed the sequence is reproducible from run to run.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use marrow_core::ast::DeclArg;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{numeric_argument, Capability};
use crate::environment::{Env, Mutability};
use crate::error::RuntimeError;
use crate::value::{expect_arity, NativeFunction, Value};

const NAME: &str = "random";

pub struct RandomCapability {
    rng: Rc<RefCell<StdRng>>,
}

impl RandomCapability {
    pub fn new() -> Self {
        RandomCapability {
            rng: Rc::new(RefCell::new(StdRng::from_entropy())),
        }
    }
}

impl Default for RandomCapability {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait(?Send)]
impl Capability for RandomCapability {
    fn name(&self) -> &str {
        NAME
    }

    fn builtins(&self) -> &[&'static str] {
        &["random_int", "random_pick"]
    }

    fn on_declare(&self, argument: Option<&DeclArg>) -> Result<(), RuntimeError> {
        let rng = match argument {
            Some(arg) => {
                let seed = numeric_argument(NAME, arg)?;
                tracing::debug!(seed, "seeding random generator");
                StdRng::seed_from_u64(seed as u64)
            }
            None => StdRng::from_entropy(),
        };
        *self.rng.borrow_mut() = rng;
        Ok(())
    }

    fn register_builtins(&self, root: &Env, _argument: Option<&DeclArg>) -> Result<(), RuntimeError> {
        let rng = Rc::clone(&self.rng);
        root.define_or_replace(
            "random_int",
            NativeFunction::sync("random_int", move |args| {
                expect_arity("random_int", args, 2)?;
                let (Some(lo), Some(hi)) = (args[0].as_whole_number(), args[1].as_whole_number())
                else {
                    return Err(RuntimeError::invalid_argument(
                        "random_int",
                        "bounds must be whole numbers",
                    ));
                };
                if lo > hi {
                    return Err(RuntimeError::invalid_argument(
                        "random_int",
                        format!("lower bound {} is above upper bound {}", lo, hi),
                    ));
                }
                Ok(Value::number(rng.borrow_mut().gen_range(lo..=hi)))
            }),
            Mutability::Immutable,
        );

        let rng = Rc::clone(&self.rng);
        root.define_or_replace(
            "random_pick",
            NativeFunction::sync("random_pick", move |args| {
                expect_arity("random_pick", args, 1)?;
                match &args[0] {
                    Value::List(items) => {
                        let items = items.borrow();
                        let mut rng = rng.borrow_mut();
                        Ok(items.choose(&mut *rng).cloned().unwrap_or(Value::Null))
                    }
                    other => Err(RuntimeError::invalid_argument(
                        "random_pick",
                        format!("expected a List, got {}", other.type_name()),
                    )),
                }
            }),
            Mutability::Immutable,
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Callable;

    async fn draw(seed: &str) -> Vec<Value> {
        let capability = RandomCapability::new();
        let root = Env::root();
        let arg = DeclArg::Number(seed.to_string());
        capability.on_declare(Some(&arg)).unwrap();
        capability.register_builtins(&root, Some(&arg)).unwrap();
        let Some(Value::Callable(Callable::Native(random_int))) = root.lookup("random_int") else {
            panic!("random_int missing")
        };
        let mut values = Vec::new();
        for _ in 0..8 {
            values.push(
                random_int
                    .call(vec![Value::number(1), Value::number(100)])
                    .await
                    .unwrap(),
            );
        }
        values
    }

    #[tokio::test]
    async fn seeded_sequences_repeat() {
        let first = draw("42").await;
        assert_eq!(first, draw("42").await);
        for value in &first {
            let n = value.as_whole_number().unwrap();
            assert!((1..=100).contains(&n));
        }
    }

    #[tokio::test]
    async fn pick_from_empty_list_is_null() {
        let capability = RandomCapability::new();
        let root = Env::root();
        capability.register_builtins(&root, None).unwrap();
        let Some(Value::Callable(Callable::Native(pick))) = root.lookup("random_pick") else {
            panic!("random_pick missing")
        };
        assert_eq!(pick.call(vec![Value::list(vec![])]).await.unwrap(), Value::Null);
        assert_eq!(
            pick.call(vec![Value::list(vec![Value::text("only")])]).await.unwrap(),
            Value::text("only")
        );
    }
}
