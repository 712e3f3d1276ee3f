//! Top-level macro entry points.
//!
//! A [`Macro`] is one parsed formula (a filter condition, a column formula,
//! a user action). Hosts parse it once and evaluate it against many
//! contexts; uncaught errors are reported to the context's error handler
//! before being returned.

use std::fmt;
use std::rc::Rc;

use crate::ast::{Expression, MessageTypeHint};
use crate::diagnostics::{MacroResult, Outcome, ParseError};
use crate::runtime::context::Context;
use crate::syntax;

// ============================================================================
// MACRO
// ============================================================================

#[derive(Debug, Clone)]
pub struct Macro {
    expr: Rc<Expression>,
    text: String,
}

impl Macro {
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let expr = syntax::parse(text)?;
        Ok(Self {
            expr,
            text: text.to_string(),
        })
    }

    /// Evaluates the macro. An error nobody caught is handed to the
    /// context's error handler; signals are returned silently.
    pub fn value(&self, context: &mut Context) -> MacroResult {
        context.clear_return_type();
        let result = self.expr.evaluate(context);
        match &result {
            Err(Outcome::Error(error)) => context.report_error(error),
            Err(signal) => tracing::debug!(signal = %signal, "macro stopped"),
            Ok(_) => {}
        }
        result
    }

    /// Evaluates the macro as a condition. Errors and signals count as false.
    pub fn matches(&self, context: &mut Context) -> bool {
        self.value(context).map(|value| value.boolean()).unwrap_or(false)
    }

    /// The least message content evaluation is known to need.
    pub fn message_type_hint(&self) -> MessageTypeHint {
        self.expr.message_type_hint()
    }

    pub fn expression(&self) -> &Rc<Expression> {
        &self.expr
    }

    /// The text the macro was parsed from.
    pub fn source(&self) -> &str {
        &self.text
    }

    /// Canonical text of the parsed tree.
    pub fn to_text(&self) -> String {
        self.expr.to_text()
    }
}

impl fmt::Display for Macro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)
    }
}

// ============================================================================
// PARSER
// ============================================================================

/// Parses many macros, keeping the first failure for the caller to report.
#[derive(Debug, Default)]
pub struct MacroParser {
    last_error: Option<ParseError>,
}

impl MacroParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `None` on a syntax error; see [`MacroParser::last_error`].
    pub fn parse(&mut self, text: &str) -> Option<Macro> {
        match Macro::parse(text) {
            Ok(parsed) => Some(parsed),
            Err(error) => {
                tracing::debug!(offset = error.offset(), "{error}");
                self.last_error = Some(error);
                None
            }
        }
    }

    pub fn last_error(&self) -> Option<&ParseError> {
        self.last_error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<ParseError> {
        self.last_error.take()
    }
}
