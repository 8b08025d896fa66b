//! marrow-core: lexer, AST and parser for the Marrow scripting language.
//!
//! The pipeline front half: source text is lexed into a total token stream,
//! then parsed into a [`Program`]. Parsing consults a
//! [`CapabilityCatalog`] so capability keywords are only accepted after the
//! owning capability's `declare` line.
//!
//! # Public API
//!
//! - [`lex()`] -- tokenize source text (never fails)
//! - [`parse()`] -- build a [`Program`] from tokens
//! - [`parse_source()`] -- both steps at once
//! - [`ParseError`] -- lexical, syntax and capability errors

pub mod ast;
pub mod catalog;
pub mod error;
pub mod lexer;
pub mod parser;

// ── Convenience re-exports ───────────────────────────────────────────

pub use ast::{Expr, Program, Stmt};
pub use catalog::{CapabilityCatalog, NoCapabilities, StaticCatalog};
pub use error::{Location, ParseError};
pub use lexer::{lex, Token, TokenKind};
pub use parser::parse;

/// Lex and parse `src` in one step.
pub fn parse_source(src: &str, catalog: &dyn CapabilityCatalog) -> Result<Program, ParseError> {
    let tokens = lex(src);
    parse(&tokens, catalog)
}
