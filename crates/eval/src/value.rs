//! Runtime values.
//!
//! Numbers are exact decimals. Lists and Maps are shared mutable containers
//! with reference semantics: copying a `Value` copies the handle, so a list
//! pushed to through one binding changes for every binding that holds it.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use marrow_core::ast::TaskDeclaration;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::environment::Env;
use crate::error::RuntimeError;
use crate::types::GroupDefinition;

pub type ListRef = Rc<RefCell<Vec<Value>>>;
pub type MapRef = Rc<RefCell<BTreeMap<String, Value>>>;

#[derive(Debug, Clone)]
pub enum Value {
    Number(Decimal),
    Text(String),
    Boolean(bool),
    Null,
    List(ListRef),
    Map(MapRef),
    Callable(Callable),
    Instance(Rc<Instance>),
}

impl Value {
    pub fn number(n: i64) -> Value {
        Value::Number(Decimal::from(n))
    }

    pub fn text(s: impl Into<String>) -> Value {
        Value::Text(s.into())
    }

    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub fn map(entries: BTreeMap<String, Value>) -> Value {
        Value::Map(Rc::new(RefCell::new(entries)))
    }

    /// Name used in error messages and by `type_of`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Text(_) => "Text",
            Value::Boolean(_) => "Boolean",
            Value::Null => "Null",
            Value::List(_) => "List",
            Value::Map(_) => "Map",
            Value::Callable(_) => "Task",
            Value::Instance(_) => "Instance",
        }
    }

    /// `null`, `false`, `0`, `""`, `[]` and `{}` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => !n.is_zero(),
            Value::Text(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Map(entries) => !entries.borrow().is_empty(),
            Value::Callable(_) | Value::Instance(_) => true,
        }
    }

    /// The value as an `i64` when it is a whole number.
    pub fn as_whole_number(&self) -> Option<i64> {
        match self {
            Value::Number(n) if n.fract().is_zero() => n.to_i64(),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Rendering used inside collections: text is quoted.
    pub fn repr(&self) -> String {
        Rendered { value: self, quote_text: true }.to_string()
    }

    /// A container reached again while converting becomes null.
    pub fn to_json(&self) -> serde_json::Value {
        self.json(&mut Vec::new())
    }

    fn json(&self, open: &mut Vec<usize>) -> serde_json::Value {
        let id = match self {
            Value::List(items) => address(items),
            Value::Map(entries) => address(entries),
            Value::Instance(instance) => address(instance),
            _ => 0,
        };
        if id != 0 && open.contains(&id) {
            return serde_json::Value::Null;
        }
        open.push(id);
        let json = match self {
            Value::Number(n) => number_to_json(*n),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Null => serde_json::Value::Null,
            Value::List(items) => {
                serde_json::Value::Array(items.borrow().iter().map(|v| v.json(open)).collect())
            }
            Value::Map(entries) => serde_json::Value::Object(
                entries
                    .borrow()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.json(open)))
                    .collect(),
            ),
            Value::Instance(instance) => serde_json::Value::Object(
                instance
                    .field_values()
                    .into_iter()
                    .map(|(k, v)| (k, v.json(open)))
                    .collect(),
            ),
            Value::Callable(callable) => serde_json::Value::String(callable.to_string()),
        };
        open.pop();
        json
    }

    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::number(i),
                None => n
                    .as_f64()
                    .and_then(Decimal::from_f64)
                    .map_or(Value::Null, Value::Number),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::list(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(entries) => Value::map(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }
}

fn number_to_json(n: Decimal) -> serde_json::Value {
    let n = n.normalize();
    if n.scale() == 0 {
        if let Some(i) = n.to_i64() {
            return serde_json::Value::from(i);
        }
    }
    n.to_f64()
        .and_then(serde_json::Number::from_f64)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::Value::String(n.to_string()))
}

/// Identity of a shared container.
fn address<T>(rc: &Rc<T>) -> usize {
    Rc::as_ptr(rc) as *const () as usize
}

impl Value {
    /// `seen` holds the container pairs already being compared further up;
    /// meeting one again means the cycles line up.
    fn equals(&self, other: &Value, seen: &mut Vec<(usize, usize)>) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Text(a), Value::Text(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::List(a), Value::List(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let pair = (address(a), address(b));
                if seen.contains(&pair) {
                    return true;
                }
                seen.push(pair);
                let (a, b) = (a.borrow(), b.borrow());
                let same =
                    a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y, seen));
                seen.pop();
                same
            }
            (Value::Map(a), Value::Map(b)) => {
                if Rc::ptr_eq(a, b) {
                    return true;
                }
                let pair = (address(a), address(b));
                if seen.contains(&pair) {
                    return true;
                }
                seen.push(pair);
                let (a, b) = (a.borrow(), b.borrow());
                let same = a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.equals(vb, seen));
                seen.pop();
                same
            }
            (Value::Callable(a), Value::Callable(b)) => a.same(b),
            (Value::Instance(a), Value::Instance(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Containers already open further up print as `[...]`, `{...}` or
    /// `Name {...}`.
    fn render(&self, f: &mut fmt::Formatter<'_>, quote_text: bool, open: &mut Vec<usize>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n.normalize()),
            Value::Text(s) if quote_text => write!(f, "{:?}", s),
            Value::Text(s) => f.write_str(s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => f.write_str("null"),
            Value::Callable(callable) => write!(f, "{}", callable),
            Value::List(items) => {
                let id = address(items);
                if open.contains(&id) {
                    return f.write_str("[...]");
                }
                open.push(id);
                f.write_str("[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.render(f, true, open)?;
                }
                open.pop();
                f.write_str("]")
            }
            Value::Map(entries) => {
                let id = address(entries);
                if open.contains(&id) {
                    return f.write_str("{...}");
                }
                open.push(id);
                f.write_str("{")?;
                for (i, (key, value)) in entries.borrow().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: ", key)?;
                    value.render(f, true, open)?;
                }
                open.pop();
                f.write_str("}")
            }
            Value::Instance(instance) => {
                let id = address(instance);
                if open.contains(&id) {
                    return write!(f, "{} {{...}}", instance.group.name);
                }
                let fields = instance.field_values();
                if fields.is_empty() {
                    return f.write_str(&instance.group.name);
                }
                open.push(id);
                write!(f, "{} {{ ", instance.group.name)?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: ", name)?;
                    value.render(f, true, open)?;
                }
                open.pop();
                f.write_str(" }")
            }
        }
    }
}

/// Structural equality for data, identity for tasks and instances.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, &mut Vec::new())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.render(f, false, &mut Vec::new())
    }
}

struct Rendered<'a> {
    value: &'a Value,
    quote_text: bool,
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value.render(f, self.quote_text, &mut Vec::new())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Decimal> for Value {
    fn from(n: Decimal) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

// ──────────────────────────────────────────────
// Callables
// ──────────────────────────────────────────────

#[derive(Clone)]
pub enum Callable {
    /// A user task. Group methods carry the instance they were read from.
    Task(Rc<Closure>),
    /// A host function: prelude or capability builtin.
    Native(Rc<NativeFunction>),
    /// Calling a group creates an instance.
    Constructor(Rc<GroupDefinition>),
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Callable::Task(closure) => closure.name(),
            Callable::Native(native) => &native.name,
            Callable::Constructor(group) => &group.name,
        }
    }

    fn same(&self, other: &Callable) -> bool {
        match (self, other) {
            (Callable::Task(a), Callable::Task(b)) => {
                Rc::ptr_eq(&a.decl, &b.decl)
                    && match (&a.receiver, &b.receiver) {
                        (Some(x), Some(y)) => Rc::ptr_eq(x, y),
                        (None, None) => a.env.ptr_eq(&b.env),
                        _ => false,
                    }
            }
            (Callable::Native(a), Callable::Native(b)) => Rc::ptr_eq(a, b),
            (Callable::Constructor(a), Callable::Constructor(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Task(closure) => write!(f, "<task {}>", closure.name()),
            Callable::Native(native) => write!(f, "<native {}>", native.name),
            Callable::Constructor(group) => write!(f, "<group {}>", group.name),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A task together with the scope it was created in.
pub struct Closure {
    pub decl: Rc<TaskDeclaration>,
    pub env: Env,
    pub receiver: Option<Rc<Instance>>,
}

impl Closure {
    pub fn new(decl: Rc<TaskDeclaration>, env: Env) -> Self {
        Closure {
            decl,
            env,
            receiver: None,
        }
    }

    pub fn name(&self) -> &str {
        if self.decl.name.is_empty() {
            "<anonymous>"
        } else {
            &self.decl.name
        }
    }
}

pub type NativeFuture = Pin<Box<dyn Future<Output = Result<Value, RuntimeError>>>>;

type SyncBody = dyn Fn(&[Value]) -> Result<Value, RuntimeError>;
type AsyncBody = dyn Fn(Vec<Value>) -> NativeFuture;

enum NativeBody {
    Sync(Box<SyncBody>),
    Async(Box<AsyncBody>),
}

pub struct NativeFunction {
    pub name: String,
    body: NativeBody,
}

impl NativeFunction {
    /// A host function that completes immediately.
    pub fn sync<F>(name: &str, body: F) -> Value
    where
        F: Fn(&[Value]) -> Result<Value, RuntimeError> + 'static,
    {
        Value::Callable(Callable::Native(Rc::new(NativeFunction {
            name: name.to_string(),
            body: NativeBody::Sync(Box::new(body)),
        })))
    }

    /// A host function that suspends (timers, file I/O).
    pub fn asynchronous<F>(name: &str, body: F) -> Value
    where
        F: Fn(Vec<Value>) -> NativeFuture + 'static,
    {
        Value::Callable(Callable::Native(Rc::new(NativeFunction {
            name: name.to_string(),
            body: NativeBody::Async(Box::new(body)),
        })))
    }

    pub async fn call(&self, args: Vec<Value>) -> Result<Value, RuntimeError> {
        match &self.body {
            NativeBody::Sync(body) => body(&args),
            NativeBody::Async(body) => body(args).await,
        }
    }
}

/// Argument count check shared by host functions.
pub fn expect_arity(name: &str, args: &[Value], expected: usize) -> Result<(), RuntimeError> {
    if args.len() != expected {
        return Err(RuntimeError::Arity {
            name: name.to_string(),
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

// ──────────────────────────────────────────────
// Instances
// ──────────────────────────────────────────────

/// One instance of a group. Fields live in their own scope whose parent is
/// the program's root scope, so methods see fields by bare name.
pub struct Instance {
    pub group: Rc<GroupDefinition>,
    pub fields: Env,
}

impl Instance {
    /// Field values in declaration order.
    pub fn field_values(&self) -> Vec<(String, Value)> {
        self.group
            .fields
            .iter()
            .filter_map(|field| {
                self.fields
                    .lookup_local(&field.name)
                    .map(|value| (field.name.clone(), value))
            })
            .collect()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("group", &self.group.name)
            .finish()
    }
}
