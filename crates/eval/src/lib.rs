//! Marrow evaluator: runs parsed programs and hosts capabilities.
//!
//! The evaluator walks the AST from `marrow-core` directly. Programs opt
//! into extra behavior with `declare` lines, each naming a capability from
//! the [`CapabilityRegistry`] handed to the evaluator.
//!
//! ```no_run
//! use std::rc::Rc;
//! use marrow_eval::{run_source, CapabilityRegistry, EvalOptions, ScriptedInput};
//!
//! # async fn demo() -> Result<(), marrow_eval::Error> {
//! let registry = Rc::new(CapabilityRegistry::with_defaults());
//! let evaluator = run_source(
//!     "print \"hello\"",
//!     registry,
//!     EvalOptions::quiet(),
//!     ScriptedInput::default(),
//! )
//! .await?;
//! assert_eq!(evaluator.output(), ["hello".to_string()]);
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod config;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod io;
pub mod operators;
pub mod prelude;
pub mod types;
pub mod value;

use std::rc::Rc;

pub use capability::{Capability, CapabilityRegistry};
pub use config::{EvalOptions, WebOptions, EVALUATOR_STACK_SIZE};
pub use environment::{Env, Mutability};
pub use error::{Error, RuntimeError};
pub use interpreter::{Evaluator, Flow};
pub use io::{InputSource, ScriptedInput, StdinInput};
pub use value::Value;

/// Parse and run `src` to completion, including file-complete hooks.
///
/// Returns the finished evaluator so callers can inspect recorded output
/// and the root scope.
pub async fn run_source(
    src: &str,
    registry: Rc<CapabilityRegistry>,
    options: EvalOptions,
    input: impl InputSource + 'static,
) -> Result<Evaluator, Error> {
    let program = marrow_core::parse_source(src, registry.as_ref())?;
    let mut evaluator = Evaluator::new(registry, options).with_input(input);
    evaluator.run(&program).await?;
    Ok(evaluator)
}
