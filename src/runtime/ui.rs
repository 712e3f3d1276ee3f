//! UI collaborator used by the prompting built-ins.
//!
//! Only contexts created with `ContextFlags::UI` may reach it, and only from
//! the UI thread (`ContextFlags::UI_THREAD`).

/// Modal prompts. Returning `None` means the user dismissed the prompt.
pub trait MacroUi {
    fn input_box(&self, message: &str, default: &str, multiline: bool) -> Option<String>;

    /// Shows a message; `kind` selects the button set. Returns the button pressed.
    fn message_box(&self, message: &str, kind: u32) -> Option<u32>;
}

/// Plain-terminal prompts for the CLI.
#[derive(Debug, Default)]
pub struct ConsoleUi;

impl MacroUi for ConsoleUi {
    fn input_box(&self, message: &str, default: &str, _multiline: bool) -> Option<String> {
        use std::io::{BufRead, Write};

        let mut stdout = std::io::stdout();
        if default.is_empty() {
            let _ = write!(stdout, "{message}: ");
        } else {
            let _ = write!(stdout, "{message} [{default}]: ");
        }
        let _ = stdout.flush();

        let mut line = String::new();
        match std::io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => {
                let line = line.trim_end_matches(&['\r', '\n'][..]);
                let answer = if line.is_empty() { default } else { line };
                Some(answer.to_string())
            }
        }
    }

    fn message_box(&self, message: &str, _kind: u32) -> Option<u32> {
        println!("{message}");
        Some(1)
    }
}
