//! mailmacro REPL (Read-Eval-Print Loop)
//!
//! Evaluates macros one after another in a persistent context, so functions
//! defined with `@Defun` and variables set with `@Set` survive between lines.

use std::io::{self, Write};

use crate::cli::args::SessionArgs;
use crate::cli::{build_session, output, report, CliError, Session};
use crate::engine::Macro;

/// REPL state that persists across evaluations
pub struct ReplState {
    args: SessionArgs,
    session: Session,
    line_number: usize,
}

impl ReplState {
    pub fn new(args: SessionArgs) -> Result<Self, CliError> {
        let session = build_session(&args)?;
        Ok(Self {
            args,
            session,
            line_number: 1,
        })
    }

    /// Evaluates one macro in the persistent context; returns the exit status
    /// the CLI would have used for it.
    pub fn eval_line(&mut self, input: &str) -> i32 {
        self.line_number += 1;
        match Macro::parse(input) {
            Ok(parsed) => report(parsed.value(&mut self.session.context)),
            Err(error) => {
                output::print_parse_error(error);
                crate::cli::EXIT_ERROR
            }
        }
    }

    /// Drops every definition and variable by rebuilding the session.
    pub fn reset(&mut self) -> Result<(), CliError> {
        self.session.save_profile()?;
        self.session = build_session(&self.args)?;
        Ok(())
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

/// Main REPL entry point
pub fn run_repl(args: SessionArgs) -> Result<i32, CliError> {
    println!("mailmacro REPL v{}", env!("CARGO_PKG_VERSION"));
    println!("Type :help for help, :quit to exit, :clear to reset the state");
    println!();

    let mut state = ReplState::new(args)?;
    let mut input_buffer = String::new();

    loop {
        if input_buffer.is_empty() {
            print!("macro[{}]> ", state.line_number());
        } else {
            print!("    -> ");
        }
        let _ = io::stdout().flush();

        let mut line = String::new();
        match io::stdin().read_line(&mut line) {
            Ok(0) => {
                // EOF (Ctrl+D)
                println!();
                break;
            }
            Ok(_) => {
                let line = line.trim();

                if input_buffer.is_empty() && line.starts_with(':') {
                    match handle_repl_command(line, &mut state)? {
                        ReplCommand::Continue => continue,
                        ReplCommand::Quit => break,
                    }
                }

                if !input_buffer.is_empty() {
                    input_buffer.push('\n');
                }
                input_buffer.push_str(line);

                // An empty line forces evaluation of an unbalanced buffer.
                if is_complete_expression(&input_buffer) || line.is_empty() {
                    if !input_buffer.trim().is_empty() {
                        state.eval_line(&input_buffer);
                    }
                    input_buffer.clear();
                }
            }
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }
    }

    state.session.save_profile()?;
    Ok(0)
}

/// REPL command results
enum ReplCommand {
    Continue,
    Quit,
}

/// Handle special REPL commands that start with ':'
fn handle_repl_command(command: &str, state: &mut ReplState) -> Result<ReplCommand, CliError> {
    match command.to_ascii_lowercase().as_str() {
        ":help" | ":h" => {
            println!("REPL commands:");
            println!("  :help, :h     Show this help");
            println!("  :quit, :q     Exit the REPL");
            println!("  :clear, :c    Forget all functions and variables");
            println!();
            println!("Enter macros such as @Add(1, 2) to evaluate them.");
            println!("A macro may span lines until its parentheses balance.");
        }
        ":quit" | ":q" => return Ok(ReplCommand::Quit),
        ":clear" | ":c" => {
            state.reset()?;
            println!("Context cleared.");
        }
        _ => {
            println!(
                "Unknown command: {}. Type :help for available commands.",
                command
            );
        }
    }
    Ok(ReplCommand::Continue)
}

/// Whether parentheses balance outside strings, regex literals and comments.
fn is_complete_expression(input: &str) -> bool {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return false;
    }

    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut in_comment = false;
    let mut escape_next = false;

    for ch in trimmed.chars() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if in_comment {
            in_comment = ch != '\n';
            continue;
        }
        match (quote, ch) {
            (Some(_), '\\') => escape_next = true,
            (Some(open), c) if c == open => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '/') => quote = Some(ch),
            (None, '#') => in_comment = true,
            (None, '(') => depth += 1,
            (None, ')') => depth -= 1,
            (None, _) => {}
        }
    }

    depth <= 0 && quote.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_complete_expression() {
        assert!(is_complete_expression("42"));
        assert!(is_complete_expression("@Add(1, 2)"));
        assert!(is_complete_expression("@Progn(@Set('x', 10), @Add($x, 5))"));
        assert!(is_complete_expression("'(unbalanced inside a string'"));
        assert!(is_complete_expression("@Add(1, # comment (\n 2)"));
        assert!(is_complete_expression("@RegexMatch(%Subject, /^(re|fw):/i)"));

        assert!(!is_complete_expression("@Add(1"));
        assert!(!is_complete_expression("@If(@True(),\n 'a',"));
        assert!(!is_complete_expression("'unclosed string"));
        assert!(!is_complete_expression(""));
    }

    #[test]
    fn definitions_persist_between_lines() {
        let mut state = ReplState::new(SessionArgs::default()).unwrap();
        assert_eq!(state.eval_line("@Defun('Twice', @Add($1, $1))"), 0);
        assert_eq!(state.eval_line("@Set('n', 21)"), 0);
        assert_eq!(state.eval_line("@Twice($n)"), 0);
        assert_eq!(state.line_number(), 4);

        state.reset().unwrap();
        assert_eq!(state.eval_line("@Twice(1)"), crate::cli::EXIT_ERROR);
    }
}
