//! Command-line arguments and subcommands of the `mailmacro` binary.
//!
//! Declared with `clap`'s derive API.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI argument structure.
#[derive(Debug, Parser)]
#[command(
    name = "mailmacro",
    version,
    about = "Evaluate mail-client macros against RFC 822 messages."
)]
pub struct MacroArgs {
    #[command(subcommand)]
    pub command: Command,
}

/// An enumeration of all available CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Evaluate a macro and print its value.
    Eval {
        /// The macro text, or a path to it with `--file`.
        #[arg(value_name = "MACRO", required = true)]
        text: String,
        /// Read the macro from the file named by MACRO.
        #[arg(short, long)]
        file: bool,
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Parse a macro and print its canonical form.
    Check {
        #[arg(value_name = "MACRO", required = true)]
        text: String,
        #[arg(short, long)]
        file: bool,
    },
    /// List all built-in function names.
    Functions,
    /// Evaluate macros interactively in one persistent context.
    Repl {
        #[command(flatten)]
        session: SessionArgs,
    },
}

/// Where the evaluation context comes from.
#[derive(Debug, Clone, Default, Args)]
pub struct SessionArgs {
    /// RFC 822 message files loaded into the `Inbox` folder, in order.
    #[arg(short, long = "message", value_name = "FILE")]
    pub messages: Vec<PathBuf>,
    /// Index of the context message among the loaded files.
    #[arg(long, default_value_t = 0)]
    pub focus: usize,
    /// YAML engine configuration.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,
    /// Allow macros to change message flags.
    #[arg(long)]
    pub modify: bool,
}
