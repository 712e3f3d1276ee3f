//! Unified, `miette`-based diagnostics for the macro engine.
//!
//! # Two channels
//!
//! A failed evaluation produces no value. Why it failed travels on one of two
//! channels, both carried by [`Outcome`]:
//!
//! - **Errors** ([`Outcome::Error`]) are recoverable. They carry an [`ErrorCode`]
//!   plus the failing function and argument, and are the only outcome `@Catch`
//!   turns back into a normal continuation.
//! - **Signals** ([`Outcome::Cancel`], [`Outcome::Exit`]) are control transfers.
//!   They propagate exactly like errors but are never caught; only the top-level
//!   caller inspects them.
//!
//! # Error construction
//!
//! Use `macro_err!` rather than building [`MacroError`] by hand:
//!
//! ```rust
//! use mailmacro::{macro_err, ErrorCode, Outcome};
//! let outcome: Outcome = macro_err!(InvalidArgType, "Contain", 2);
//! assert_eq!(outcome.error_code(), Some(ErrorCode::InvalidArgType));
//! ```

use std::cell::RefCell;
use std::fmt;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::ast::value::Value;

// ============================================================================
// ERROR CODES
// ============================================================================

/// Error taxonomy shared by every built-in function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Wrong number of arguments.
    InvalidArgSize,
    /// An argument has the wrong value variant.
    InvalidArgType,
    /// An argument has the right variant but an unusable value.
    InvalidArgValue,
    /// The function needs a message but the context has none.
    NoContextMessage,
    /// The function needs an account but the context has none.
    NoContextAccount,
    /// Message content could not be retrieved.
    GetMessage,
    /// A part index or handle does not name a MIME part.
    InvalidPart,
    /// A named account does not exist.
    UnknownAccount,
    /// No built-in or user-defined function has this name.
    UnknownFunction,
    /// The context does not permit modifying messages.
    NotModifiable,
    /// The function must run on the UI thread.
    InvalidThread,
    /// The function needs a UI and the context has none.
    NoUI,
    /// Generic failure of a collaborator or of the engine itself.
    Fail,
}

impl ErrorCode {
    /// Returns the stable snake_case suffix used in diagnostic codes.
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::InvalidArgSize => "invalid_arg_size",
            Self::InvalidArgType => "invalid_arg_type",
            Self::InvalidArgValue => "invalid_arg_value",
            Self::NoContextMessage => "no_context_message",
            Self::NoContextAccount => "no_context_account",
            Self::GetMessage => "get_message",
            Self::InvalidPart => "invalid_part",
            Self::UnknownAccount => "unknown_account",
            Self::UnknownFunction => "unknown_function",
            Self::NotModifiable => "not_modifiable",
            Self::InvalidThread => "invalid_thread",
            Self::NoUI => "no_ui",
            Self::Fail => "fail",
        }
    }

    /// Human readable description of the code.
    pub const fn description(&self) -> &'static str {
        match self {
            Self::InvalidArgSize => "invalid number of arguments",
            Self::InvalidArgType => "invalid argument type",
            Self::InvalidArgValue => "invalid argument value",
            Self::NoContextMessage => "no message in context",
            Self::NoContextAccount => "no account in context",
            Self::GetMessage => "failed to get message",
            Self::InvalidPart => "invalid part",
            Self::UnknownAccount => "unknown account",
            Self::UnknownFunction => "unknown function",
            Self::NotModifiable => "message is not modifiable",
            Self::InvalidThread => "must be called on the UI thread",
            Self::NoUI => "no user interface available",
            Self::Fail => "failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

// ============================================================================
// EVALUATION ERRORS
// ============================================================================

/// A recoverable evaluation error: what went wrong, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroError {
    pub code: ErrorCode,
    /// Name of the function that failed, as written in the macro.
    pub function: Option<String>,
    /// 1-based index of the offending argument.
    pub argument: Option<usize>,
    pub detail: Option<String>,
}

impl MacroError {
    pub fn new(code: ErrorCode) -> Self {
        Self {
            code,
            function: None,
            argument: None,
            detail: None,
        }
    }

    pub fn in_function(mut self, name: impl Into<String>) -> Self {
        self.function = Some(name.into());
        self
    }

    pub fn at_argument(mut self, index: usize) -> Self {
        self.argument = Some(index);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl fmt::Display for MacroError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code)?;
        if let Some(function) = &self.function {
            write!(f, " in @{function}")?;
        }
        if let Some(argument) = self.argument {
            write!(f, " (argument {argument})")?;
        }
        if let Some(detail) = &self.detail {
            write!(f, ": {detail}")?;
        }
        Ok(())
    }
}

impl std::error::Error for MacroError {}

impl Diagnostic for MacroError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!(
            "mailmacro::eval::{}",
            self.code.code_suffix()
        )))
    }
}

// ============================================================================
// OUTCOMES AND SIGNALS
// ============================================================================

/// Why an evaluation produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Outcome {
    #[error(transparent)]
    Error(MacroError),
    /// The user dismissed a prompt.
    #[error("cancelled by user")]
    Cancel,
    /// `@Exit()` was called: stop the whole run, successfully.
    #[error("exit requested")]
    Exit,
}

impl Outcome {
    pub fn is_signal(&self) -> bool {
        matches!(self, Outcome::Cancel | Outcome::Exit)
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        match self {
            Outcome::Error(e) => Some(e.code),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&MacroError> {
        match self {
            Outcome::Error(e) => Some(e),
            _ => None,
        }
    }

    /// The return-type signal this outcome corresponds to.
    pub fn return_type(&self) -> ReturnType {
        match self {
            Outcome::Error(_) => ReturnType::None,
            Outcome::Cancel => ReturnType::Cancel,
            Outcome::Exit => ReturnType::Exit,
        }
    }
}

impl From<MacroError> for Outcome {
    fn from(error: MacroError) -> Self {
        Outcome::Error(error)
    }
}

/// The canonical result of evaluating any expression node.
pub type MacroResult = Result<Value, Outcome>;

/// Sticky session-wide record of the last signal raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnType {
    #[default]
    None,
    Cancel,
    Exit,
}

/// Builds an [`Outcome::Error`].
///
/// - `macro_err!(Code)`
/// - `macro_err!(Code, function)`
/// - `macro_err!(Code, function, argument)`
/// - `macro_err!(Code, function, argument, "detail {}", x)`
#[macro_export]
macro_rules! macro_err {
    ($code:ident) => {
        $crate::diagnostics::Outcome::Error($crate::diagnostics::MacroError::new(
            $crate::diagnostics::ErrorCode::$code,
        ))
    };
    ($code:ident, $function:expr) => {
        $crate::diagnostics::Outcome::Error(
            $crate::diagnostics::MacroError::new($crate::diagnostics::ErrorCode::$code)
                .in_function($function),
        )
    };
    ($code:ident, $function:expr, $argument:expr) => {
        $crate::diagnostics::Outcome::Error(
            $crate::diagnostics::MacroError::new($crate::diagnostics::ErrorCode::$code)
                .in_function($function)
                .at_argument($argument),
        )
    };
    ($code:ident, $function:expr, $argument:expr, $($fmt:tt)+) => {
        $crate::diagnostics::Outcome::Error(
            $crate::diagnostics::MacroError::new($crate::diagnostics::ErrorCode::$code)
                .in_function($function)
                .at_argument($argument)
                .with_detail(format!($($fmt)+)),
        )
    };
}

// ============================================================================
// PARSE ERRORS
// ============================================================================

/// Failure to turn macro text into an expression tree.
#[derive(Debug, Error, Diagnostic)]
#[error("Parse error: {message}")]
#[diagnostic(code(mailmacro::parse))]
pub struct ParseError {
    pub message: String,
    #[source_code]
    pub source_code: NamedSource<String>,
    #[label("here")]
    pub span: SourceSpan,
}

impl ParseError {
    pub fn new(message: impl Into<String>, source: &str, span: SourceSpan) -> Self {
        Self {
            message: message.into(),
            source_code: NamedSource::new("macro", source.to_string()),
            span,
        }
    }

    /// Byte offset of the error in the macro text.
    pub fn offset(&self) -> usize {
        self.span.offset()
    }
}

// ============================================================================
// ERROR HANDLERS
// ============================================================================

/// Reporting sink for uncaught evaluation errors.
pub trait ErrorHandler {
    fn process_error(&self, error: &MacroError);
}

/// Default handler: one structured `warn!` event per uncaught error.
#[derive(Debug, Default)]
pub struct TracingErrorHandler;

impl ErrorHandler for TracingErrorHandler {
    fn process_error(&self, error: &MacroError) {
        tracing::warn!(
            code = error.code.code_suffix(),
            function = error.function.as_deref().unwrap_or(""),
            argument = error.argument.unwrap_or(0),
            "{error}"
        );
    }
}

/// Collects reported errors, for hosts that surface them later.
#[derive(Debug, Default)]
pub struct CollectingErrorHandler {
    errors: RefCell<Vec<MacroError>>,
}

impl CollectingErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<MacroError> {
        self.errors.borrow().clone()
    }

    pub fn clear(&self) {
        self.errors.borrow_mut().clear();
    }
}

impl ErrorHandler for CollectingErrorHandler {
    fn process_error(&self, error: &MacroError) {
        self.errors.borrow_mut().push(error.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_function_and_argument() {
        let error = MacroError::new(ErrorCode::InvalidArgType)
            .in_function("Contain")
            .at_argument(2);
        assert_eq!(
            error.to_string(),
            "invalid argument type in @Contain (argument 2)"
        );
    }

    #[test]
    fn signals_have_no_error_code() {
        assert_eq!(Outcome::Cancel.error_code(), None);
        assert!(Outcome::Exit.is_signal());
        assert_eq!(Outcome::Exit.return_type(), ReturnType::Exit);
        let outcome: Outcome = macro_err!(Fail, "Eval", 1, "bad {}", "text");
        assert_eq!(outcome.error_code(), Some(ErrorCode::Fail));
        assert!(!outcome.is_signal());
    }
}
