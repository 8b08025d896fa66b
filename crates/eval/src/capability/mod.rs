//! Capabilities: optional language features a file opts into with `declare`.
//!
//! A capability may own keywords (the parser rejects them until the file
//! declares the owner), add builtins to the root scope, execute the
//! statements its keywords introduce, and act once the whole file has run.
//!
//! Shipped capabilities:
//! - `web` → [`web::WebCapability`] (`route`, `respond`, optional port)
//! - `time` → [`time::TimeCapability`] (`now`, `wait`)
//! - `random` → [`random::RandomCapability`] (`random_int`, `random_pick`, optional seed)
//! - `files` → [`files::FilesCapability`] (`read_file`, `write_file`, `file_exists`)

pub mod files;
pub mod random;
#[cfg(feature = "server")]
mod server;
pub mod time;
pub mod web;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

use async_trait::async_trait;
use marrow_core::ast::{DeclArg, Stmt};
use marrow_core::CapabilityCatalog;

use crate::config::WebOptions;
use crate::environment::Env;
use crate::error::RuntimeError;
use crate::interpreter::Evaluator;
use crate::value::Value;

// ──────────────────────────────────────────────
// Capability trait
// ──────────────────────────────────────────────

/// Hooks are called in this order: for every `declare` line,
/// [`on_declare`](Capability::on_declare) then
/// [`register_builtins`](Capability::register_builtins); while the body runs,
/// [`execute`](Capability::execute) for each statement introduced by an
/// owned keyword; finally [`on_file_complete`](Capability::on_file_complete)
/// for each declared capability in declaration order.
#[async_trait(?Send)]
pub trait Capability {
    /// The name used in `declare <name>`.
    fn name(&self) -> &str;

    /// Keywords this capability owns.
    fn keywords(&self) -> &[&'static str] {
        &[]
    }

    /// Names [`register_builtins`](Capability::register_builtins) binds.
    fn builtins(&self) -> &[&'static str] {
        &[]
    }

    fn on_declare(&self, _argument: Option<&DeclArg>) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn register_builtins(&self, _root: &Env, _argument: Option<&DeclArg>) -> Result<(), RuntimeError> {
        Ok(())
    }

    /// Run a statement introduced by one of [`keywords`](Capability::keywords).
    async fn execute(
        &self,
        node: &Stmt,
        _evaluator: &mut Evaluator,
        _env: &Env,
    ) -> Result<Option<Value>, RuntimeError> {
        Err(RuntimeError::capability(
            self.name(),
            format!(
                "cannot execute the statement at line {}",
                node.line()
            ),
        ))
    }

    async fn on_file_complete(
        &self,
        _declared: &BTreeSet<String>,
        _evaluator: &mut Evaluator,
    ) -> Result<(), RuntimeError> {
        Ok(())
    }
}

// ──────────────────────────────────────────────
// CapabilityRegistry
// ──────────────────────────────────────────────

/// Capabilities available to a program, keyed by name.
///
/// The parser sees the registry through [`CapabilityCatalog`]; the
/// evaluator uses it to run hooks.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: BTreeMap<String, Rc<dyn Capability>>,
}

impl CapabilityRegistry {
    /// An empty registry: no capability can be declared.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The four shipped capabilities with default options.
    pub fn with_defaults() -> Self {
        Self::with_web_options(WebOptions::default())
    }

    pub fn with_web_options(web: WebOptions) -> Self {
        let mut registry = Self::empty();
        registry.register(Rc::new(web::WebCapability::new(web)));
        registry.register(Rc::new(time::TimeCapability));
        registry.register(Rc::new(random::RandomCapability::new()));
        registry.register(Rc::new(files::FilesCapability));
        registry
    }

    /// Add a capability, returning the one it replaced, if any.
    pub fn register(&mut self, capability: Rc<dyn Capability>) -> Option<Rc<dyn Capability>> {
        let name = capability.name().to_string();
        tracing::debug!(capability = %name, "registering capability");
        self.capabilities.insert(name, capability)
    }

    pub fn get(&self, name: &str) -> Option<Rc<dyn Capability>> {
        self.capabilities.get(name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.capabilities.keys().map(String::as_str)
    }

    /// The capability whose builtins include `name`.
    pub fn builtin_owner(&self, name: &str) -> Option<&str> {
        self.capabilities
            .iter()
            .find(|(_, capability)| capability.builtins().iter().any(|b| *b == name))
            .map(|(owner, _)| owner.as_str())
    }
}

impl CapabilityCatalog for CapabilityRegistry {
    fn is_known(&self, name: &str) -> bool {
        self.capabilities.contains_key(name)
    }

    fn keyword_owner(&self, keyword: &str) -> Option<&str> {
        self.capabilities
            .iter()
            .find(|(_, capability)| capability.keywords().iter().any(|k| *k == keyword))
            .map(|(name, _)| name.as_str())
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("capabilities", &self.capabilities.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Read a declaration argument as a whole number.
pub(crate) fn numeric_argument(
    capability: &str,
    argument: &DeclArg,
) -> Result<i64, RuntimeError> {
    argument.as_str().trim().parse::<i64>().map_err(|_| {
        RuntimeError::capability(
            capability,
            format!("expected a whole number, got '{}'", argument.as_str()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait(?Send)]
    impl Capability for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn keywords(&self) -> &[&'static str] {
            &["route"]
        }
    }

    #[test]
    fn defaults_register_shipped_capabilities() {
        let registry = CapabilityRegistry::with_defaults();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["files", "random", "time", "web"]);
        assert!(registry.is_known("web"));
        assert!(!registry.is_known("gpio"));
    }

    #[test]
    fn keyword_owner_comes_from_capability_keywords() {
        let registry = CapabilityRegistry::with_defaults();
        assert_eq!(registry.keyword_owner("route"), Some("web"));
        assert_eq!(registry.keyword_owner("respond"), Some("web"));
        assert_eq!(registry.keyword_owner("print"), None);
    }

    #[test]
    fn builtin_owner_matches_registered_builtins() {
        let registry = CapabilityRegistry::with_defaults();
        assert_eq!(registry.builtin_owner("now"), Some("time"));
        assert_eq!(registry.builtin_owner("random_pick"), Some("random"));
        assert_eq!(registry.builtin_owner("file_exists"), Some("files"));
        assert_eq!(registry.builtin_owner("len"), None);

        for name in registry.names() {
            let capability = registry.get(name).unwrap();
            let root = Env::root();
            capability.register_builtins(&root, None).unwrap();
            let bound = root.local_names();
            let mut listed: Vec<String> = capability.builtins().iter().map(|b| b.to_string()).collect();
            listed.sort();
            assert_eq!(bound, listed, "builtins of '{}'", name);
        }
    }

    #[test]
    fn register_replaces_by_name() {
        let mut registry = CapabilityRegistry::empty();
        assert!(registry.register(Rc::new(Echo)).is_none());
        assert!(registry.register(Rc::new(Echo)).is_some());
        assert_eq!(registry.keyword_owner("route"), Some("echo"));
    }

    #[test]
    fn numeric_arguments() {
        assert_eq!(
            numeric_argument("web", &DeclArg::Number("8080".to_string())).unwrap(),
            8080
        );
        assert!(numeric_argument("web", &DeclArg::Ident("port".to_string())).is_err());
    }
}
