//! Evaluator and capability options.
//!
//! Both structs deserialize from partial tables; missing keys take their
//! defaults.

use serde::{Deserialize, Serialize};

/// Stack size for a thread running the evaluator at the default call depth.
/// Each nested task call keeps its boxed futures on the stack.
pub const EVALUATOR_STACK_SIZE: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalOptions {
    /// Write `print` output and `ask` prompts to stdout as well as recording them.
    pub echo: bool,
    /// Nested task calls allowed before the evaluator gives up.
    pub max_call_depth: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        EvalOptions {
            echo: true,
            max_call_depth: 128,
        }
    }
}

impl EvalOptions {
    /// Options for embedding and tests: nothing is written to stdout.
    pub fn quiet() -> Self {
        EvalOptions {
            echo: false,
            ..EvalOptions::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebOptions {
    /// Interface the `web` capability binds when a port is declared.
    pub host: String,
}

impl Default for WebOptions {
    fn default() -> Self {
        WebOptions {
            host: "127.0.0.1".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_tables_fill_defaults() {
        let opts: EvalOptions = serde_json::from_str(r#"{"max_call_depth": 16}"#).unwrap();
        assert!(opts.echo);
        assert_eq!(opts.max_call_depth, 16);

        assert_eq!(EvalOptions::default().max_call_depth, 128);

        let web: WebOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(web.host, "127.0.0.1");
    }
}
