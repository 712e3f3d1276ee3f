//! Handles all user-facing output for the CLI.
//!
//! Values go to stdout uncoloured unless stdout is a terminal; errors and
//! signals go to stderr. Parse errors are rendered by `miette` with the
//! offending span labelled.

use std::io::Write;

use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::ast::value::Value;
use crate::ast::MessageTypeHint;
use crate::diagnostics::{Outcome, ParseError};

// ============================================================================
// CORE OUTPUT FUNCTIONS
// ============================================================================

/// Prints the value a macro produced.
pub fn print_value(value: &Value) {
    let mut stdout = StandardStream::stdout(color_choice(atty::Stream::Stdout));
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
    let _ = writeln!(stdout, "{}", value.string());
    let _ = stdout.reset();
}

/// Prints why a macro produced no value.
pub fn print_outcome(outcome: &Outcome) {
    let mut stderr = StandardStream::stderr(color_choice(atty::Stream::Stderr));
    let (label, color) = match outcome {
        Outcome::Error(_) => ("error", Color::Red),
        Outcome::Cancel | Outcome::Exit => ("stopped", Color::Yellow),
    };
    let _ = stderr.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
    let _ = write!(stderr, "{label}");
    let _ = stderr.reset();
    match outcome {
        Outcome::Error(error) => {
            let _ = writeln!(stderr, "[{}]: {error}", error.code.code_suffix());
        }
        signal => {
            let _ = writeln!(stderr, ": {signal}");
        }
    }
}

/// Renders a parse error with its source span.
pub fn print_parse_error(error: ParseError) {
    eprintln!("{:?}", miette::Report::new(error));
}

/// Prints the canonical text of a parsed macro and the content it needs.
pub fn print_check(text: &str, hint: MessageTypeHint) {
    let mut stdout = StandardStream::stdout(color_choice(atty::Stream::Stdout));
    let _ = writeln!(stdout, "{text}");
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)));
    let _ = writeln!(stdout, "needs: {hint:?}");
    let _ = stdout.reset();
}

/// Prints function names, one per line.
pub fn print_functions(names: &[&str]) {
    let mut stdout = StandardStream::stdout(color_choice(atty::Stream::Stdout));
    for name in names {
        let _ = writeln!(stdout, "@{name}");
    }
}

// ============================================================================
// PRIVATE HELPERS
// ============================================================================

fn color_choice(stream: atty::Stream) -> ColorChoice {
    if atty::is(stream) {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}
