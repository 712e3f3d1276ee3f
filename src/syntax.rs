//! Syntax module for the macro language.
//!
//! A pest grammar (`syntax/grammar.pest`) and the builder turning its parse
//! tree into [`crate::ast::Expression`] nodes.

pub mod parser;

pub use parser::parse;
