//! # mailmacro
//!
//! The macro language of a mail client: a small expression language used for
//! filter conditions, list-column formulas and user actions.
//!
//! ```text
//! @If(@Contain(%Subject, '[spam]'), @Junk(@True()), @False())
//! ```
//!
//! Macro text is parsed into an [`Expression`] tree ([`syntax`]), evaluated
//! against a [`Context`] ([`runtime`]) by dispatching calls to the built-in
//! functions ([`atoms`]) or to functions defined at run time with `@Defun`.
//! Every evaluation yields a [`MacroResult`]: a [`Value`], an error, or one
//! of the `Cancel`/`Exit` signals that `@Catch` cannot intercept.

pub mod ast;
pub mod atoms;
pub mod cli;
pub mod diagnostics;
pub mod engine;
pub mod mail;
pub mod repl;
pub mod runtime;
pub mod syntax;

pub use ast::value::Value;
pub use ast::{Expression, MessageTypeHint};
pub use diagnostics::{ErrorCode, MacroError, MacroResult, Outcome, ParseError, ReturnType};
pub use engine::{Macro, MacroParser};
pub use runtime::{Context, ContextBuilder, ContextFlags};
