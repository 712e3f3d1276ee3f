//! The `mailmacro` command-line interface.
//!
//! This module is the main entry point for all CLI commands: it parses the
//! arguments, builds an in-memory mailbox from the given message files and
//! runs the requested subcommand.

use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use clap::Parser;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::cli::args::{Command, MacroArgs, SessionArgs};
use crate::diagnostics::{MacroResult, Outcome};
use crate::engine::Macro;
use crate::mail::memory::MemoryDocument;
use crate::mail::MessageHolder;
use crate::runtime::config::{ConfigError, EngineConfig};
use crate::runtime::context::{Context, ContextFlags};
use crate::runtime::profile::JsonProfile;
use crate::runtime::registry::FunctionRegistry;
use crate::runtime::ui::ConsoleUi;

pub mod args;
pub mod output;

/// Exit status when a macro fails with an error.
pub const EXIT_ERROR: i32 = 1;
/// Exit status when the user cancelled a prompt.
pub const EXIT_CANCEL: i32 = 2;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to save profile: {0}")]
    Profile(#[source] std::io::Error),
    #[error("--focus {focus} is out of range: {count} message(s) loaded")]
    Focus { focus: usize, count: usize },
}

/// The main entry point for the CLI.
pub fn run() {
    init_tracing();
    let args = MacroArgs::parse();

    // Dispatch to the appropriate subcommand handler.
    let result = match args.command {
        Command::Eval {
            text,
            file,
            session,
        } => handle_eval(&text, file, &session),
        Command::Check { text, file } => handle_check(&text, file),
        Command::Functions => {
            output::print_functions(&FunctionRegistry::global().names());
            Ok(0)
        }
        Command::Repl { session } => crate::repl::run_repl(session),
    };

    match result {
        Ok(0) => {}
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(EXIT_ERROR);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// ============================================================================
// SUBCOMMANDS
// ============================================================================

/// Handles the `eval` subcommand; returns the process exit status.
fn handle_eval(text: &str, file: bool, args: &SessionArgs) -> Result<i32, CliError> {
    let text = macro_text(text, file)?;
    let parsed = match Macro::parse(&text) {
        Ok(parsed) => parsed,
        Err(error) => {
            output::print_parse_error(error);
            return Ok(EXIT_ERROR);
        }
    };

    let mut session = build_session(args)?;
    let result = parsed.value(&mut session.context);
    session.save_profile()?;
    Ok(report(result))
}

/// Handles the `check` subcommand.
fn handle_check(text: &str, file: bool) -> Result<i32, CliError> {
    let text = macro_text(text, file)?;
    match Macro::parse(&text) {
        Ok(parsed) => {
            output::print_check(&parsed.to_text(), parsed.message_type_hint());
            Ok(0)
        }
        Err(error) => {
            output::print_parse_error(error);
            Ok(EXIT_ERROR)
        }
    }
}

/// Prints an evaluation result and maps it to an exit status.
pub fn report(result: MacroResult) -> i32 {
    match result {
        Ok(value) => {
            output::print_value(&value);
            0
        }
        Err(Outcome::Exit) => 0,
        Err(outcome @ Outcome::Cancel) => {
            output::print_outcome(&outcome);
            EXIT_CANCEL
        }
        Err(outcome) => {
            output::print_outcome(&outcome);
            EXIT_ERROR
        }
    }
}

fn macro_text(text: &str, file: bool) -> Result<String, CliError> {
    if file {
        read_file(Path::new(text))
    } else {
        Ok(text.to_string())
    }
}

fn read_file(path: &Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// SESSION SETUP
// ============================================================================

/// A root context over an in-memory mailbox, plus the profile to save.
pub struct Session {
    pub context: Context,
    profile: Rc<JsonProfile>,
}

impl Session {
    pub fn save_profile(&self) -> Result<(), CliError> {
        self.profile.save().map_err(CliError::Profile)
    }
}

/// Loads the configuration and messages and builds the root context.
///
/// Messages go to folder `Inbox` of account `Local`; all of them are
/// selected and the one at `--focus` becomes the context message. Prompts
/// are enabled when stdin is a terminal.
pub fn build_session(args: &SessionArgs) -> Result<Session, CliError> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_yaml_file(path)?,
        None => EngineConfig::default(),
    };
    let profile = match &config.profile {
        Some(path) => JsonProfile::open(path).map_err(|source| CliError::Io {
            path: path.clone(),
            source,
        })?,
        None => JsonProfile::in_memory("default"),
    };
    let profile = Rc::new(profile);

    let document = MemoryDocument::new();
    let account = document.add_account("Local");
    let folder = account.add_folder("Inbox");
    let mut messages: Vec<Rc<dyn MessageHolder>> = Vec::with_capacity(args.messages.len());
    for path in &args.messages {
        let message = folder.add_message(&read_file(path)?);
        messages.push(message);
    }

    let mut flags = ContextFlags::empty();
    if args.modify {
        flags |= ContextFlags::MODIFY;
    }
    let interactive = atty::is(atty::Stream::Stdin);
    if interactive {
        flags |= ContextFlags::UI | ContextFlags::UI_THREAD;
    }

    let mut builder = Context::builder(document)
        .account(account)
        .folder(folder)
        .selected(&messages)
        .flags(flags)
        .profile(profile.clone())
        .config(config);
    if interactive {
        builder = builder.ui(Rc::new(ConsoleUi));
    }
    if !messages.is_empty() {
        let focus = messages.get(args.focus).ok_or(CliError::Focus {
            focus: args.focus,
            count: messages.len(),
        })?;
        builder = builder.message(Rc::clone(focus));
    }
    tracing::debug!(messages = messages.len(), ?flags, "built session");

    Ok(Session {
        context: builder.build(),
        profile,
    })
}
