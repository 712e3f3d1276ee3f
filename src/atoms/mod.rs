//! # Built-in function system
//!
//! Built-ins ("atoms") are the primitive operations of the macro language.
//! Each public name maps to a [`FunctionDef`]: a behavior plus the static
//! parameters it runs with. Several names may share one behavior, e.g.
//! `Add`/`Subtract`/`Minus` are the additive behavior with a different sign and
//! `Seen`/`Deleted`/`User1` are the flag behavior with a different bit.
//!
//! ## Module Structure
//!
//! - **`helpers`**: argument evaluation, type extraction and error shortcuts
//! - **`control`**: `If`, `And`, `Or`, `Catch`, `While`, `Defun`, `Eval`, `ForEach`, ...
//! - **`variable`**: `Set`, `Variable`
//! - **`math`**: `Add`, `Subtract`, `Equal`, `Less`, ...
//! - **`string`**: `Contain`, `BeginWith`, `Find`, `Concat`, `Substring`, ...
//! - **`regex`**: `Regex`, `RegexFind`, `RegexMatch`, `RegexReplace`, `Group`
//! - **`message`**: header, body, part and flag access on the context message
//! - **`thread`**: `Thread`
//! - **`external`**: files, processes, profile, prompts and dates
//!
//! ## Calling conventions
//!
//! - [`Atom::Eager`] functions receive their arguments already evaluated, left
//!   to right; the first failing argument aborts the call.
//! - [`Atom::Lazy`] functions receive the unevaluated argument nodes and decide
//!   themselves what to evaluate and when (`If`, `And`, `While`, ...).
//!
//! Either way the argument count is validated against [`Arity`] before any
//! argument is evaluated.

use std::rc::Rc;

use crate::ast::value::Value;
use crate::ast::{Expression, MessageTypeHint};
use crate::diagnostics::{ErrorCode, MacroError, MacroResult, Outcome};
use crate::mail::MessageFlags;
use crate::runtime::context::Context;
use crate::runtime::registry::FunctionRegistry;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Eagerly evaluated built-in: receives argument values.
pub type EagerFn = fn(call: &Invocation<'_>, args: Vec<Value>, context: &mut Context) -> MacroResult;

/// Lazily evaluated built-in: receives argument nodes via the invocation.
pub type LazyFn = fn(call: &Invocation<'_>, context: &mut Context) -> MacroResult;

#[derive(Clone, Copy)]
pub enum Atom {
    Eager(EagerFn),
    Lazy(LazyFn),
}

impl std::fmt::Debug for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Atom::Eager(_) => f.write_str("Atom::Eager"),
            Atom::Lazy(_) => f.write_str("Atom::Lazy"),
        }
    }
}

/// Accepted argument counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    /// Inclusive range.
    Range(usize, usize),
    AtLeast(usize),
    /// Validated by the function itself.
    Any,
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exact(n) => count == n,
            Arity::Range(min, max) => (min..=max).contains(&count),
            Arity::AtLeast(min) => count >= min,
            Arity::Any => true,
        }
    }
}

/// Static parameters distinguishing names that share a behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Param {
    #[default]
    None,
    Bool(bool),
    Flag(MessageFlags),
    Relative { less: bool, or_equal: bool },
}

/// Registry entry for one public function name.
#[derive(Debug, Clone, Copy)]
pub struct FunctionDef {
    pub name: &'static str,
    pub arity: Arity,
    pub hint: MessageTypeHint,
    pub atom: Atom,
    pub param: Param,
}

impl FunctionDef {
    pub fn eager(name: &'static str, arity: Arity, function: EagerFn) -> Self {
        Self {
            name,
            arity,
            hint: MessageTypeHint::None,
            atom: Atom::Eager(function),
            param: Param::None,
        }
    }

    pub fn lazy(name: &'static str, arity: Arity, function: LazyFn) -> Self {
        Self {
            name,
            arity,
            hint: MessageTypeHint::None,
            atom: Atom::Lazy(function),
            param: Param::None,
        }
    }

    pub fn with_hint(mut self, hint: MessageTypeHint) -> Self {
        self.hint = hint;
        self
    }

    pub fn with_param(mut self, param: Param) -> Self {
        self.param = param;
        self
    }
}

/// One call of a built-in: the name as written, its argument nodes and the
/// static parameter of the registered name.
pub struct Invocation<'a> {
    pub name: &'a str,
    pub args: &'a [Rc<Expression>],
    pub param: Param,
}

impl Invocation<'_> {
    /// Evaluates argument `index` (0-based).
    pub fn eval(&self, index: usize, context: &mut Context) -> MacroResult {
        self.args[index].evaluate(context)
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// An error attributed to this function.
    pub fn fail(&self, code: ErrorCode) -> Outcome {
        Outcome::Error(MacroError::new(code).in_function(self.name))
    }

    /// An error attributed to argument `index` (0-based) of this function.
    pub fn fail_at(&self, code: ErrorCode, index: usize) -> Outcome {
        Outcome::Error(
            MacroError::new(code)
                .in_function(self.name)
                .at_argument(index + 1),
        )
    }

    /// [`Invocation::fail`] with a free-form detail.
    pub fn fail_with(&self, code: ErrorCode, detail: impl Into<String>) -> Outcome {
        Outcome::Error(
            MacroError::new(code)
                .in_function(self.name)
                .with_detail(detail),
        )
    }

    /// [`Invocation::fail_at`] with a free-form detail.
    pub fn fail_at_with(&self, code: ErrorCode, index: usize, detail: impl Into<String>) -> Outcome {
        Outcome::Error(
            MacroError::new(code)
                .in_function(self.name)
                .at_argument(index + 1)
                .with_detail(detail),
        )
    }
}

// ============================================================================
// MODULAR ATOM IMPLEMENTATIONS
// ============================================================================

pub mod helpers;

pub mod control;
pub mod external;
pub mod math;
pub mod message;
pub mod regex;
pub mod string;
pub mod thread;
pub mod variable;

/// Registers every standard built-in with the given registry.
pub fn register_all_atoms(registry: &mut FunctionRegistry) {
    control::register_control_atoms(registry);
    variable::register_variable_atoms(registry);
    math::register_math_atoms(registry);
    string::register_string_atoms(registry);
    regex::register_regex_atoms(registry);
    message::register_message_atoms(registry);
    thread::register_thread_atoms(registry);
    external::register_external_atoms(registry);
}
