use std::collections::BTreeMap;
use std::rc::Rc;

use marrow_core::ast::{BinaryOp, Expr};
use rust_decimal::Decimal;

use super::{binding_error, literal_value, EvalFuture, Evaluator, Flow};
use crate::environment::{BindingError, Env, Mutability};
use crate::error::RuntimeError;
use crate::operators;
use crate::types::GroupDefinition;
use crate::value::{Callable, Closure, Instance, Value};

impl Evaluator {
    pub fn eval_expr<'a>(&'a mut self, expr: &'a Expr, env: &'a Env) -> EvalFuture<'a, Value> {
        Box::pin(async move {
            match expr {
                Expr::Literal(literal) => literal_value(literal),
                Expr::Identifier(name) => env.lookup(name).ok_or_else(|| self.undefined(name)),
                Expr::Binary {
                    op: BinaryOp::And,
                    left,
                    right,
                } => {
                    if !self.eval_expr(left, env).await?.is_truthy() {
                        return Ok(Value::Boolean(false));
                    }
                    Ok(Value::Boolean(self.eval_expr(right, env).await?.is_truthy()))
                }
                Expr::Binary {
                    op: BinaryOp::Or,
                    left,
                    right,
                } => {
                    if self.eval_expr(left, env).await?.is_truthy() {
                        return Ok(Value::Boolean(true));
                    }
                    Ok(Value::Boolean(self.eval_expr(right, env).await?.is_truthy()))
                }
                Expr::Binary { op, left, right } => {
                    let left = self.eval_expr(left, env).await?;
                    let right = self.eval_expr(right, env).await?;
                    operators::binary(*op, &left, &right)
                }
                Expr::Unary { op, operand } => {
                    let operand = self.eval_expr(operand, env).await?;
                    operators::unary(*op, &operand)
                }
                Expr::Call { callee, args } => {
                    let callee = self.eval_expr(callee, env).await?;
                    let mut values = Vec::with_capacity(args.len());
                    for arg in args {
                        values.push(self.eval_expr(arg, env).await?);
                    }
                    self.call_value(callee, values).await
                }
                Expr::Member { object, property } => {
                    let object = self.eval_expr(object, env).await?;
                    self.member(&object, property)
                }
                Expr::Index { object, index } => {
                    let object = self.eval_expr(object, env).await?;
                    let index = self.eval_expr(index, env).await?;
                    operators::index(&object, &index)
                }
                Expr::Array(items) => {
                    let mut values = Vec::with_capacity(items.len());
                    for item in items {
                        values.push(self.eval_expr(item, env).await?);
                    }
                    Ok(Value::list(values))
                }
                Expr::Object(entries) => {
                    let mut map = BTreeMap::new();
                    for (key, value) in entries {
                        let value = self.eval_expr(value, env).await?;
                        map.insert(key.clone(), value);
                    }
                    Ok(Value::map(map))
                }
                Expr::Ask(prompt) => {
                    let prompt = self.eval_expr(prompt, env).await?;
                    self.output.write_prompt(&prompt.to_string());
                    let line = self.input.read_line().await?;
                    Ok(line.map_or(Value::Null, Value::Text))
                }
                Expr::Task(decl) => {
                    let closure = Closure::new(Rc::clone(decl), env.clone());
                    Ok(Value::Callable(Callable::Task(Rc::new(closure))))
                }
            }
        })
    }

    /// Call any callable value with already-evaluated arguments.
    pub async fn call_value(&mut self, callee: Value, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match callee {
            Value::Callable(Callable::Task(closure)) => self.call_closure(&closure, args).await,
            Value::Callable(Callable::Native(native)) => native.call(args).await,
            Value::Callable(Callable::Constructor(group)) => self.instantiate(group, args).await,
            other => Err(RuntimeError::NotCallable {
                type_name: other.type_name(),
            }),
        }
    }

    /// `print` and bare expression statements call what they are given.
    pub(super) async fn invoke_if_callable(&mut self, value: Value) -> Result<Value, RuntimeError> {
        match value {
            Value::Callable(_) => self.call_value(value, Vec::new()).await,
            other => Ok(other),
        }
    }

    async fn call_closure(&mut self, closure: &Closure, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let params = &closure.decl.params;
        if args.len() > params.len() {
            return Err(RuntimeError::Arity {
                name: closure.name().to_string(),
                expected: params.len(),
                got: args.len(),
            });
        }
        if self.depth >= self.options.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded {
                limit: self.options.max_call_depth,
            });
        }

        let scope = closure.env.child();
        if let Some(receiver) = &closure.receiver {
            scope
                .define("self", Value::Instance(Rc::clone(receiver)), Mutability::Immutable)
                .map_err(|e| binding_error(e, "self"))?;
        }
        let mut args = args.into_iter();
        for param in params {
            let value = args.next().unwrap_or(Value::Null);
            scope
                .define(param.as_str(), value, Mutability::Mutable)
                .map_err(|e| binding_error(e, param))?;
        }

        self.depth += 1;
        let result = self.exec_block(&closure.decl.body, &scope).await;
        self.depth -= 1;

        match result? {
            Flow::Normal(value) => Ok(value.unwrap_or(Value::Null)),
            Flow::Respond { line, .. } => Err(RuntimeError::RespondOutsideRoute.at(line)),
        }
    }

    /// Fill fields in declaration order: initializer, else the next
    /// positional argument, else null. Surplus arguments are dropped.
    async fn instantiate(&mut self, group: Rc<GroupDefinition>, args: Vec<Value>) -> Result<Value, RuntimeError> {
        let fields = self.root.child();
        let mut args = args.into_iter();
        for field in &group.fields {
            let value = match &field.initializer {
                Some(init) => self.eval_expr(init, &fields).await?,
                None => args.next().unwrap_or(Value::Null),
            };
            fields
                .define(field.name.as_str(), value, Mutability::from_flag(field.mutable))
                .map_err(|_| RuntimeError::Instantiation {
                    group: group.name.clone(),
                    message: format!("field '{}' is declared twice", field.name),
                })?;
        }

        let leftover = args.count();
        if leftover > 0 {
            tracing::warn!(group = %group.name, leftover, "surplus constructor arguments ignored");
        }
        Ok(Value::Instance(Rc::new(Instance { group, fields })))
    }

    fn member(&self, object: &Value, property: &str) -> Result<Value, RuntimeError> {
        match object {
            Value::Instance(instance) => self.instance_member(instance, property),
            Value::Map(entries) => Ok(entries.borrow().get(property).cloned().unwrap_or(Value::Null)),
            Value::List(items) if property == "length" => {
                Ok(Value::Number(Decimal::from(items.borrow().len())))
            }
            Value::Text(s) if property == "length" => {
                Ok(Value::Number(Decimal::from(s.chars().count())))
            }
            other => Err(RuntimeError::UnknownMember {
                type_name: other.type_name().to_string(),
                member: property.to_string(),
            }),
        }
    }

    /// Field, then implementation method, then group method.
    fn instance_member(&self, instance: &Rc<Instance>, property: &str) -> Result<Value, RuntimeError> {
        if let Some(value) = instance.fields.lookup_local(property) {
            return Ok(value);
        }
        if let Some(method) = instance.group.find_method(property) {
            let closure = Closure {
                decl: method,
                env: instance.fields.clone(),
                receiver: Some(Rc::clone(instance)),
            };
            return Ok(Value::Callable(Callable::Task(Rc::new(closure))));
        }
        for blueprint in instance.group.blueprints() {
            let required = self
                .blueprints
                .get(&blueprint)
                .is_some_and(|definition| definition.signature(property).is_some());
            if required {
                return Err(RuntimeError::MissingImplementation {
                    group: instance.group.name.clone(),
                    blueprint,
                    method: property.to_string(),
                });
            }
        }
        Err(RuntimeError::UnknownMember {
            type_name: instance.group.name.clone(),
            member: property.to_string(),
        })
    }

    /// `target := value` for names, members and indexes.
    pub(super) async fn assign(&mut self, target: &Expr, value: Value, env: &Env) -> Result<(), RuntimeError> {
        match target {
            Expr::Identifier(name) => env.assign(name, value).map_err(|e| binding_error(e, name)),
            Expr::Member { object, property } => {
                let object = self.eval_expr(object, env).await?;
                match &object {
                    Value::Instance(instance) => {
                        instance
                            .fields
                            .assign_local(property, value)
                            .map_err(|e| match e {
                                BindingError::Undefined => RuntimeError::UnknownMember {
                                    type_name: instance.group.name.clone(),
                                    member: property.clone(),
                                },
                                other => binding_error(other, property),
                            })
                    }
                    Value::Map(entries) => {
                        entries.borrow_mut().insert(property.clone(), value);
                        Ok(())
                    }
                    other => Err(RuntimeError::UnknownMember {
                        type_name: other.type_name().to_string(),
                        member: property.clone(),
                    }),
                }
            }
            Expr::Index { object, index } => {
                let object = self.eval_expr(object, env).await?;
                let index = self.eval_expr(index, env).await?;
                match &object {
                    Value::List(items) => {
                        // The index may be the list itself; render it before borrowing mutably.
                        let length = items.borrow().len();
                        let position = operators::list_position(&index, length)?;
                        items.borrow_mut()[position] = value;
                        Ok(())
                    }
                    Value::Map(entries) => {
                        let key = index.to_string();
                        entries.borrow_mut().insert(key, value);
                        Ok(())
                    }
                    other => Err(RuntimeError::TypeMismatch {
                        op: "[] :=".to_string(),
                        left: other.type_name(),
                        right: index.type_name(),
                    }),
                }
            }
            _ => Err(RuntimeError::invalid_argument(
                ":=",
                "only names, members and indexes can be assigned",
            )),
        }
    }
}
