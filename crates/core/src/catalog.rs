//! The parser's view of the capability registry.
//!
//! The registry itself lives in the evaluator crate; the parser only needs
//! to know which capability names exist and which capability owns a gated
//! keyword.

pub trait CapabilityCatalog {
    /// Whether `declare <name>` refers to a registered capability.
    fn is_known(&self, name: &str) -> bool;

    /// The capability that owns `keyword`, if any.
    fn keyword_owner(&self, keyword: &str) -> Option<&str>;
}

/// A catalog with no capabilities: every gated keyword is rejected.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCapabilities;

impl CapabilityCatalog for NoCapabilities {
    fn is_known(&self, _name: &str) -> bool {
        false
    }

    fn keyword_owner(&self, _keyword: &str) -> Option<&str> {
        None
    }
}

/// A fixed table of `(capability, keywords)` pairs.
///
/// Useful for parsing without building a full evaluator registry.
#[derive(Debug, Default, Clone)]
pub struct StaticCatalog {
    entries: Vec<(String, Vec<String>)>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, capability: &str, keywords: &[&str]) -> Self {
        self.entries.push((
            capability.to_string(),
            keywords.iter().map(|k| k.to_string()).collect(),
        ));
        self
    }
}

impl CapabilityCatalog for StaticCatalog {
    fn is_known(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    fn keyword_owner(&self, keyword: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, kws)| kws.iter().any(|k| k == keyword))
            .map(|(n, _)| n.as_str())
    }
}
