//! Tree-walking evaluator.
//!
//! Statements run strictly in source order. Execution is async so `ask`,
//! timers and capability hooks can suspend, but each await completes before
//! the next statement starts. The futures are boxed and not `Send`: scopes
//! are `Rc<RefCell<..>>` and the evaluator never leaves its thread.

mod expressions;

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::str::FromStr;

use marrow_core::ast::{
    DoImplementation, EachLoop, Literal, MarchLoop, Program, SelectStatement, Stmt,
};
use marrow_core::lexer::is_keyword;
use marrow_core::CapabilityCatalog;
use rust_decimal::Decimal;

use crate::capability::CapabilityRegistry;
use crate::config::EvalOptions;
use crate::environment::{BindingError, Env, Mutability};
use crate::error::RuntimeError;
use crate::io::{InputSource, Output, StdinInput};
use crate::operators;
use crate::prelude;
use crate::types::{BlueprintDefinition, GroupDefinition};
use crate::value::{Callable, Closure, Value};

pub type EvalFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RuntimeError>> + 'a>>;

/// How a statement or block finished.
#[derive(Debug, Clone)]
pub enum Flow {
    /// Ran to the end; carries the value of the last statement, if it had one.
    Normal(Option<Value>),
    /// A `respond` ran. The response unwinds to the enclosing route handler.
    Respond { response: Value, line: u32 },
}

pub struct Evaluator {
    root: Env,
    registry: Rc<CapabilityRegistry>,
    /// Declared capabilities in declaration order.
    declared: Vec<String>,
    groups: HashMap<String, Rc<GroupDefinition>>,
    blueprints: HashMap<String, Rc<BlueprintDefinition>>,
    output: Output,
    input: Box<dyn InputSource>,
    options: EvalOptions,
    depth: usize,
}

impl Evaluator {
    /// A fresh evaluator whose root scope holds the prelude. Input comes from
    /// stdin unless replaced with [`with_input`](Evaluator::with_input).
    pub fn new(registry: Rc<CapabilityRegistry>, options: EvalOptions) -> Self {
        let root = Env::root();
        prelude::install(&root);
        Evaluator {
            root,
            registry,
            declared: Vec::new(),
            groups: HashMap::new(),
            blueprints: HashMap::new(),
            output: Output::new(options.echo),
            input: Box::new(StdinInput::new()),
            options,
            depth: 0,
        }
    }

    pub fn with_input(mut self, input: impl InputSource + 'static) -> Self {
        self.input = Box::new(input);
        self
    }

    pub fn root(&self) -> &Env {
        &self.root
    }

    /// Every line `print` has written so far.
    pub fn output(&self) -> &[String] {
        self.output.lines()
    }

    pub fn declared(&self) -> &[String] {
        &self.declared
    }

    pub fn is_declared(&self, capability: &str) -> bool {
        self.declared.iter().any(|name| name == capability)
    }

    /// Run a whole program: declarations, body, then file-complete hooks.
    pub async fn run(&mut self, program: &Program) -> Result<(), RuntimeError> {
        for declaration in &program.declarations {
            let capability = self.registry.get(&declaration.name).ok_or_else(|| {
                RuntimeError::UnknownCapability {
                    name: declaration.name.clone(),
                }
                .at(declaration.line)
            })?;
            tracing::debug!(capability = %declaration.name, "declaring capability");
            let argument = declaration.argument.as_ref();
            capability
                .on_declare(argument)
                .and_then(|()| capability.register_builtins(&self.root, argument))
                .map_err(|e| e.at(declaration.line))?;
            self.declared.push(declaration.name.clone());
        }

        let root = self.root.clone();
        if let Flow::Respond { line, .. } = self.exec_block(&program.body, &root).await? {
            return Err(RuntimeError::RespondOutsideRoute.at(line));
        }

        let declared: BTreeSet<String> = self.declared.iter().cloned().collect();
        for name in self.declared.clone() {
            let Some(capability) = self.registry.get(&name) else {
                continue;
            };
            tracing::debug!(capability = %name, "file complete");
            capability.on_file_complete(&declared, self).await?;
        }
        Ok(())
    }

    /// Run statements in `env`, stopping early only for `respond`.
    pub fn exec_block<'a>(&'a mut self, body: &'a [Stmt], env: &'a Env) -> EvalFuture<'a, Flow> {
        Box::pin(async move {
            let mut last = None;
            for stmt in body {
                match self.exec_stmt(stmt, env).await? {
                    Flow::Normal(value) => last = value,
                    respond => return Ok(respond),
                }
            }
            Ok(Flow::Normal(last))
        })
    }

    /// Run one statement. Errors come back tagged with its line.
    pub fn exec_stmt<'a>(&'a mut self, stmt: &'a Stmt, env: &'a Env) -> EvalFuture<'a, Flow> {
        Box::pin(async move {
            self.exec_stmt_untagged(stmt, env)
                .await
                .map_err(|e| e.at(stmt.line()))
        })
    }

    async fn exec_stmt_untagged(&mut self, stmt: &Stmt, env: &Env) -> Result<Flow, RuntimeError> {
        if let Some(keyword) = stmt.capability_keyword() {
            let result = self.exec_capability(stmt, keyword, env).await?;
            return Ok(match stmt {
                Stmt::Respond(respond) => Flow::Respond {
                    response: result.unwrap_or(Value::Null),
                    line: respond.line,
                },
                _ => Flow::Normal(None),
            });
        }

        match stmt {
            Stmt::Group(decl) => {
                let group = Rc::new(GroupDefinition::from_declaration(decl));
                let constructor = Value::Callable(Callable::Constructor(Rc::clone(&group)));
                bind(env, &decl.name, constructor, Mutability::Immutable)?;
                self.groups.insert(decl.name.clone(), group);
                Ok(Flow::Normal(None))
            }
            Stmt::Blueprint(decl) => {
                if self.blueprints.contains_key(&decl.name) {
                    return Err(RuntimeError::AlreadyDeclared {
                        name: decl.name.clone(),
                    });
                }
                self.blueprints.insert(
                    decl.name.clone(),
                    Rc::new(BlueprintDefinition::from_declaration(decl)),
                );
                Ok(Flow::Normal(None))
            }
            Stmt::Do(implementation) => {
                self.implement(implementation)?;
                Ok(Flow::Normal(None))
            }
            Stmt::Task(decl) => {
                let closure = Closure::new(Rc::clone(decl), env.clone());
                let value = Value::Callable(Callable::Task(Rc::new(closure)));
                bind(env, &decl.name, value, Mutability::Immutable)?;
                Ok(Flow::Normal(None))
            }
            Stmt::Variable(decl) => {
                let value = match &decl.initializer {
                    Some(init) => self.eval_expr(init, env).await?,
                    None => Value::Null,
                };
                bind(env, &decl.name, value, Mutability::from_flag(decl.mutable))?;
                Ok(Flow::Normal(None))
            }
            Stmt::Assign(assignment) => {
                let value = self.eval_expr(&assignment.value, env).await?;
                self.assign(&assignment.target, value, env).await?;
                Ok(Flow::Normal(None))
            }
            Stmt::Print(print) => {
                let mut line = String::new();
                for expr in &print.values {
                    let value = self.eval_expr(expr, env).await?;
                    let value = self.invoke_if_callable(value).await?;
                    line.push_str(&value.to_string());
                }
                self.output.write_line(line);
                Ok(Flow::Normal(None))
            }
            Stmt::If(conditional) => {
                for branch in &conditional.branches {
                    if self.eval_expr(&branch.guard, env).await?.is_truthy() {
                        return self.exec_block(&branch.body, &env.child()).await;
                    }
                }
                match &conditional.default {
                    Some(body) => self.exec_block(body, &env.child()).await,
                    None => Ok(Flow::Normal(None)),
                }
            }
            Stmt::Each(each) => self.exec_each(each, env).await,
            Stmt::March(march) => self.exec_march(march, env).await,
            Stmt::Select(select) => self.exec_select(select, env).await,
            Stmt::Expr(statement) => {
                let value = self.eval_expr(&statement.expr, env).await?;
                let value = if statement.expr.is_callee_shaped() {
                    self.invoke_if_callable(value).await?
                } else {
                    value
                };
                Ok(Flow::Normal(Some(value)))
            }
            Stmt::Route(_) | Stmt::Respond(_) => Ok(Flow::Normal(None)),
        }
    }

    /// A name with no binding. Builtins of an undeclared capability say so.
    fn undefined(&self, name: &str) -> RuntimeError {
        match self.registry.builtin_owner(name) {
            Some(owner) if !self.is_declared(owner) => RuntimeError::CapabilityNotDeclared {
                keyword: name.to_string(),
                capability: owner.to_string(),
            },
            _ => RuntimeError::UndefinedVariable { name: name.to_string() },
        }
    }

    /// Hand a keyword-introduced statement to the capability that owns it.
    async fn exec_capability(
        &mut self,
        stmt: &Stmt,
        keyword: &str,
        env: &Env,
    ) -> Result<Option<Value>, RuntimeError> {
        let owner = self
            .registry
            .keyword_owner(keyword)
            .map(str::to_string)
            .ok_or_else(|| RuntimeError::CapabilityNotDeclared {
                keyword: keyword.to_string(),
                capability: "<none>".to_string(),
            })?;
        if !self.is_declared(&owner) {
            return Err(RuntimeError::CapabilityNotDeclared {
                keyword: keyword.to_string(),
                capability: owner,
            });
        }
        let capability = self
            .registry
            .get(&owner)
            .ok_or(RuntimeError::UnknownCapability { name: owner })?;
        capability.execute(stmt, self, env).await
    }

    fn implement(&mut self, implementation: &DoImplementation) -> Result<(), RuntimeError> {
        let group = self
            .groups
            .get(&implementation.group)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownGroup {
                name: implementation.group.clone(),
            })?;
        let blueprint = self
            .blueprints
            .get(&implementation.blueprint)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownBlueprint {
                name: implementation.blueprint.clone(),
            })?;

        for method in &implementation.methods {
            match blueprint.signature(&method.name) {
                None => tracing::warn!(
                    group = %group.name,
                    blueprint = %blueprint.name,
                    method = %method.name,
                    "method is not part of the blueprint"
                ),
                Some(signature) if signature.params.len() != method.params.len() => {
                    tracing::warn!(
                        group = %group.name,
                        blueprint = %blueprint.name,
                        method = %method.name,
                        expected = signature.params.len(),
                        got = method.params.len(),
                        "method parameter count differs from the blueprint"
                    )
                }
                Some(_) => {}
            }
        }

        group.implement(&blueprint.name, &implementation.methods)?;
        tracing::debug!(group = %group.name, blueprint = %blueprint.name, "blueprint implemented");
        Ok(())
    }

    async fn exec_each(&mut self, each: &EachLoop, env: &Env) -> Result<Flow, RuntimeError> {
        let items = match self.eval_expr(&each.iterable, env).await? {
            Value::List(items) => items.borrow().clone(),
            other => {
                return Err(RuntimeError::NotIterable {
                    type_name: other.type_name(),
                })
            }
        };
        for item in items {
            let scope = env.child();
            bind(&scope, &each.variable, item, Mutability::Immutable)?;
            if let respond @ Flow::Respond { .. } = self.exec_block(&each.body, &scope).await? {
                return Ok(respond);
            }
        }
        Ok(Flow::Normal(None))
    }

    async fn exec_march(&mut self, march: &MarchLoop, env: &Env) -> Result<Flow, RuntimeError> {
        let start = self.eval_expr(&march.start, env).await?;
        let end = self.eval_expr(&march.end, env).await?;
        let (Some(start), Some(end)) = (start.as_whole_number(), end.as_whole_number()) else {
            return Err(RuntimeError::invalid_argument(
                "march",
                format!("bounds must be whole numbers, got {} and {}", start.repr(), end.repr()),
            ));
        };
        for i in start..=end {
            let scope = env.child();
            bind(&scope, &march.variable, Value::number(i), Mutability::Immutable)?;
            if let respond @ Flow::Respond { .. } = self.exec_block(&march.body, &scope).await? {
                return Ok(respond);
            }
        }
        Ok(Flow::Normal(None))
    }

    /// Every case whose key the subject contains (and whose guard holds) runs.
    async fn exec_select(&mut self, select: &SelectStatement, env: &Env) -> Result<Flow, RuntimeError> {
        let subject = self.eval_expr(&select.subject, env).await?;
        let mut last = None;
        for case in &select.cases {
            let key = literal_value(&case.key)?;
            if !operators::contains(&subject, &key) {
                continue;
            }
            let scope = env.child();
            if let (Value::Map(entries), Value::Text(name)) = (&subject, &key) {
                if is_identifier(name) {
                    let entry = entries.borrow().get(name).cloned().unwrap_or(Value::Null);
                    bind(&scope, name, entry, Mutability::Immutable)?;
                }
            }
            if let Some(guard) = &case.guard {
                if !self.eval_expr(guard, &scope).await?.is_truthy() {
                    continue;
                }
            }
            match self.exec_block(&case.body, &scope).await? {
                Flow::Normal(value) => last = value,
                respond => return Ok(respond),
            }
        }
        Ok(Flow::Normal(last))
    }
}

/// Bind a new name, reporting a clash as a runtime error.
fn bind(env: &Env, name: &str, value: Value, mutability: Mutability) -> Result<(), RuntimeError> {
    env.define(name, value, mutability)
        .map_err(|e| binding_error(e, name))
}

fn binding_error(err: BindingError, name: &str) -> RuntimeError {
    let name = name.to_string();
    match err {
        BindingError::Immutable => RuntimeError::ImmutableAssignment { name },
        BindingError::Undefined => RuntimeError::UndefinedVariable { name },
        BindingError::AlreadyDefined => RuntimeError::AlreadyDeclared { name },
    }
}

pub(crate) fn literal_value(literal: &Literal) -> Result<Value, RuntimeError> {
    Ok(match literal {
        Literal::Number(text) => Value::Number(Decimal::from_str(text).map_err(|_| {
            RuntimeError::Overflow {
                op: format!("literal {}", text),
            }
        })?),
        Literal::Text(s) => Value::Text(s.clone()),
        Literal::Bool(b) => Value::Boolean(*b),
        Literal::Null => Value::Null,
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
        && !is_keyword(name)
}
