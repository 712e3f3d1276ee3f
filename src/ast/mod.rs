//! AST module for the macro language.
//!
//! An [`Expression`] is an immutable tree built once per parse. Function calls
//! share their argument sub-trees through `Rc`, so `@Defun` can bind a body
//! node into the session's function table without copying it, and trees
//! parsed at runtime by `@Eval`/`@Include` stay alive exactly as long as
//! something still refers to them.
//!
//! Every node can re-serialise itself with [`Expression::to_text`]; the output
//! is the canonical form of the macro and round-trips through the parser.

use std::fmt::{self, Write};
use std::rc::Rc;

use regex::Regex;

use crate::atoms::FunctionDef;
use crate::runtime::registry::FunctionRegistry;

pub mod value;

// ============================================================================
// MESSAGE TYPE HINTS
// ============================================================================

/// How much of a message a sub-tree needs. Ordered: `None < Header < Text < All`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum MessageTypeHint {
    #[default]
    None,
    Header,
    Text,
    All,
}

// ============================================================================
// CORE DATA STRUCTURES
// ============================================================================

/// A node of the macro tree.
#[derive(Debug)]
pub enum Expression {
    Literal(Literal),
    /// `%Name`: a header field of the context message.
    Field(String),
    /// `$name`: a variable, or a positional argument when the name is numeric.
    Variable(String),
    Call(FunctionCall),
}

#[derive(Debug)]
pub enum Literal {
    String(String),
    Number(u32),
    Regex(RegexLiteral),
}

/// A `/pattern/flags` literal, compiled once when the tree is built.
#[derive(Debug)]
pub struct RegexLiteral {
    pattern: String,
    flags: String,
    compiled: Rc<Regex>,
}

impl RegexLiteral {
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn flags(&self) -> &str {
        &self.flags
    }

    pub fn compiled(&self) -> &Rc<Regex> {
        &self.compiled
    }
}

/// What a call resolves to. Resolution happens once, when the node is built.
#[derive(Debug, Clone, Copy)]
pub enum CallTarget {
    Builtin(&'static FunctionDef),
    /// Not a built-in: looked up in the session's function table on every call.
    User,
}

/// `@Name(arg, ...)`.
#[derive(Debug)]
pub struct FunctionCall {
    name: String,
    args: Vec<Rc<Expression>>,
    target: CallTarget,
    hint: MessageTypeHint,
}

impl FunctionCall {
    /// The name as written in the macro text.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[Rc<Expression>] {
        &self.args
    }

    pub fn target(&self) -> CallTarget {
        self.target
    }

    pub fn is_user_function(&self) -> bool {
        matches!(self.target, CallTarget::User)
    }
}

// ============================================================================
// CONSTRUCTION
// ============================================================================

impl Expression {
    pub fn string(value: impl Into<String>) -> Self {
        Expression::Literal(Literal::String(value.into()))
    }

    pub fn number(value: u32) -> Self {
        Expression::Literal(Literal::Number(value))
    }

    /// Builds a regex literal. Flags are any of `i`, `m`, `s`, `x`.
    pub fn regex(pattern: impl Into<String>, flags: impl Into<String>) -> Result<Self, regex::Error> {
        let pattern = pattern.into();
        let flags = flags.into();
        let compiled = compile_regex(&pattern, &flags)?;
        Ok(Expression::Literal(Literal::Regex(RegexLiteral {
            pattern,
            flags,
            compiled: Rc::new(compiled),
        })))
    }

    pub fn field(name: impl Into<String>) -> Self {
        Expression::Field(name.into())
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Expression::Variable(name.into())
    }

    /// Builds a call node, resolving `name` against the built-in registry
    /// (case-insensitively). Unknown names become user-function calls.
    pub fn call(name: impl Into<String>, args: Vec<Rc<Expression>>) -> Self {
        let name = name.into();
        let (target, own_hint) = match FunctionRegistry::global().lookup(&name) {
            Some(def) => (CallTarget::Builtin(def), def.hint),
            None => (CallTarget::User, MessageTypeHint::None),
        };
        let hint = args
            .iter()
            .map(|arg| arg.message_type_hint())
            .fold(own_hint, MessageTypeHint::max);
        Expression::Call(FunctionCall {
            name,
            args,
            target,
            hint,
        })
    }

    /// The largest message granularity any node of this tree asks for.
    pub fn message_type_hint(&self) -> MessageTypeHint {
        match self {
            Expression::Literal(_) | Expression::Variable(_) => MessageTypeHint::None,
            Expression::Field(_) => MessageTypeHint::Header,
            Expression::Call(call) => call.hint,
        }
    }
}

/// Compiles a pattern with the literal flag letters applied.
pub fn compile_regex(pattern: &str, flags: &str) -> Result<Regex, regex::Error> {
    let mut builder = regex::RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            _ => &mut builder,
        };
    }
    builder.build()
}

// ============================================================================
// TEXT SERIALISATION
// ============================================================================

impl Expression {
    /// Canonical macro text for this tree.
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_text(&mut text);
        text
    }

    fn write_text(&self, out: &mut String) -> fmt::Result {
        match self {
            Expression::Literal(Literal::String(s)) => write_quoted(out, s),
            Expression::Literal(Literal::Number(n)) => write!(out, "{n}"),
            Expression::Literal(Literal::Regex(re)) => {
                out.push('/');
                write_regex_body(out, &re.pattern);
                out.push('/');
                out.push_str(&re.flags);
                Ok(())
            }
            Expression::Field(name) => write!(out, "%{name}"),
            Expression::Variable(name) => write!(out, "${name}"),
            Expression::Call(call) => {
                write!(out, "@{}(", call.name)?;
                for (i, arg) in call.args.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    arg.write_text(out)?;
                }
                out.push(')');
                Ok(())
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

fn write_quoted(out: &mut String, s: &str) -> fmt::Result {
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    Ok(())
}

/// Escapes bare slashes; existing backslash pairs are copied untouched.
fn write_regex_body(out: &mut String, pattern: &str) {
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push('\\');
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '/' => out.push_str("\\/"),
            _ => out.push(c),
        }
    }
}
