//! `declare web [port]`: HTTP-style routes.
//!
//! `route` registers a handler together with the scope it was declared in;
//! `respond` inside a handler produces its response and stops the handler.
//! Handlers run through [`WebCapability::dispatch`], either from the HTTP
//! server (when a port is declared) or directly from an embedding host.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use async_trait::async_trait;
use marrow_core::ast::{DeclArg, Stmt};

use super::{numeric_argument, Capability};
use crate::config::WebOptions;
use crate::environment::{Env, Mutability};
use crate::error::RuntimeError;
use crate::interpreter::{Evaluator, Flow};
use crate::value::Value;

const NAME: &str = "web";

/// A handler's answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    fn from_value(value: Value) -> Response {
        if let Value::Map(entries) = &value {
            let entries = entries.borrow();
            let status = entries
                .get("status")
                .and_then(Value::as_whole_number)
                .and_then(|s| u16::try_from(s).ok());
            if let Some(status) = status {
                return Response {
                    status,
                    body: entries.get("body").cloned().unwrap_or(Value::Null),
                };
            }
        }
        Response {
            status: 200,
            body: value,
        }
    }
}

#[derive(Clone)]
struct Route {
    method: String,
    path: String,
    body: Rc<Vec<Stmt>>,
    env: Env,
}

pub struct WebCapability {
    options: WebOptions,
    port: Cell<Option<u16>>,
    routes: RefCell<Vec<Route>>,
}

impl WebCapability {
    pub fn new(options: WebOptions) -> Self {
        WebCapability {
            options,
            port: Cell::new(None),
            routes: RefCell::new(Vec::new()),
        }
    }

    /// Port given in `declare web <port>`, if any.
    pub fn port(&self) -> Option<u16> {
        self.port.get()
    }

    /// Registered `(method, path)` pairs in registration order.
    pub fn routes(&self) -> Vec<(String, String)> {
        self.routes
            .borrow()
            .iter()
            .map(|r| (r.method.clone(), r.path.clone()))
            .collect()
    }

    /// Run the handler registered for `method` and `path`.
    ///
    /// The handler runs in a fresh child of the scope the route was declared
    /// in, with `request` bound to `{method, path, body}`. Returns `None`
    /// when no route matches; a handler that never responds answers 204.
    pub async fn dispatch(
        &self,
        evaluator: &mut Evaluator,
        method: &str,
        path: &str,
        body: Value,
    ) -> Result<Option<Response>, RuntimeError> {
        let route = self
            .routes
            .borrow()
            .iter()
            .find(|r| r.method.eq_ignore_ascii_case(method) && r.path == path)
            .cloned();
        let Some(route) = route else {
            tracing::debug!(%method, %path, "no matching route");
            return Ok(None);
        };

        let mut request = BTreeMap::new();
        request.insert("method".to_string(), Value::text(route.method.clone()));
        request.insert("path".to_string(), Value::text(path));
        request.insert("body".to_string(), body);

        let scope = route.env.child();
        scope
            .define("request", Value::map(request), Mutability::Immutable)
            .map_err(|_| RuntimeError::AlreadyDeclared {
                name: "request".to_string(),
            })?;

        tracing::debug!(method = %route.method, %path, "dispatching route");
        let response = match evaluator.exec_block(&route.body, &scope).await? {
            Flow::Respond { response, .. } => Response::from_value(response),
            Flow::Normal(_) => Response {
                status: 204,
                body: Value::Null,
            },
        };
        Ok(Some(response))
    }

    #[cfg(feature = "server")]
    async fn serve(&self, evaluator: &mut Evaluator, port: u16) -> Result<(), RuntimeError> {
        super::server::serve(self, evaluator, &self.options.host, port).await
    }

    #[cfg(not(feature = "server"))]
    async fn serve(&self, _evaluator: &mut Evaluator, port: u16) -> Result<(), RuntimeError> {
        tracing::warn!(
            host = %self.options.host,
            port,
            "built without the `server` feature; routes are not served"
        );
        Ok(())
    }
}

#[async_trait(?Send)]
impl Capability for WebCapability {
    fn name(&self) -> &str {
        NAME
    }

    fn keywords(&self) -> &[&'static str] {
        &["route", "respond"]
    }

    fn on_declare(&self, argument: Option<&DeclArg>) -> Result<(), RuntimeError> {
        let port = match argument {
            None => None,
            Some(arg) => {
                let n = numeric_argument(NAME, arg)?;
                let port = u16::try_from(n).ok().filter(|p| *p > 0).ok_or_else(|| {
                    RuntimeError::capability(NAME, format!("port {} is outside 1..=65535", n))
                })?;
                Some(port)
            }
        };
        self.port.set(port);
        self.routes.borrow_mut().clear();
        Ok(())
    }

    async fn execute(
        &self,
        node: &Stmt,
        evaluator: &mut Evaluator,
        env: &Env,
    ) -> Result<Option<Value>, RuntimeError> {
        match node {
            Stmt::Route(route) => {
                tracing::debug!(method = %route.method, path = %route.path, "registered route");
                self.routes.borrow_mut().push(Route {
                    method: route.method.clone(),
                    path: route.path.clone(),
                    body: Rc::clone(&route.body),
                    env: env.clone(),
                });
                Ok(None)
            }
            Stmt::Respond(respond) => {
                let body = evaluator.eval_expr(&respond.body, env).await?;
                let status = match &respond.status {
                    None => 200,
                    Some(expr) => {
                        let value = evaluator.eval_expr(expr, env).await?;
                        value
                            .as_whole_number()
                            .filter(|s| (100..=599).contains(s))
                            .ok_or_else(|| {
                                RuntimeError::capability(
                                    NAME,
                                    format!("status must be a whole number in 100..=599, got {}", value.repr()),
                                )
                            })?
                    }
                };
                let mut response = BTreeMap::new();
                response.insert("status".to_string(), Value::number(status));
                response.insert("body".to_string(), body);
                Ok(Some(Value::map(response)))
            }
            other => Err(RuntimeError::capability(
                NAME,
                format!("cannot execute the statement at line {}", other.line()),
            )),
        }
    }

    async fn on_file_complete(
        &self,
        _declared: &BTreeSet<String>,
        evaluator: &mut Evaluator,
    ) -> Result<(), RuntimeError> {
        let routes = self.routes();
        if routes.is_empty() {
            tracing::debug!("no routes registered");
            return Ok(());
        }
        let Some(port) = self.port.get() else {
            for (method, path) in &routes {
                tracing::info!(%method, %path, "route collected");
            }
            tracing::info!(count = routes.len(), "no port declared; routes are not served");
            return Ok(());
        };
        self.serve(evaluator, port).await
    }
}
