//! # External Atoms
//!
//! Atoms that reach outside the engine: processes, files, the profile
//! store, modal prompts and the clock. These are ordinary blocking calls.
//!
//! ## Atoms Provided
//!
//! - **Processes**: `Execute`
//! - **Files**: `Load`, `Save` (relative paths resolve against `include_dir`)
//! - **Profile**: `Profile`, `SetProfile`
//! - **Prompts**: `InputBox`, `MessageBox`
//! - **Dates**: `Now`, `FormatDate`

use std::fmt::Write as _;
use std::io::Write as _;
use std::process::{Command, Stdio};

use chrono::format::{Item, StrftimeItems};
use chrono::DateTime;

use crate::ast::value::Value;
use crate::atoms::helpers::{opt_bool, opt_number, opt_string, require_ui};
use crate::atoms::{Arity, EagerFn, FunctionDef};
use crate::diagnostics::{ErrorCode, ReturnType};
use crate::runtime::registry::FunctionRegistry;

// ============================================================================
// PROCESSES AND FILES
// ============================================================================

/// Runs a shell command, optionally feeding it standard input.
///
/// Usage: @Execute(<command>, [<input>])
///
///   Returns: the command's standard output.
///
/// Example:
///   @Execute('tr a-z A-Z', %Subject)
pub const ATOM_EXECUTE: EagerFn = |call, args, _context| {
    let command = args[0].string();
    let input = args.get(1).map(Value::string);

    let (shell, flag) = if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") };
    let mut child = Command::new(shell)
        .arg(flag)
        .arg(&command)
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()
        .map_err(|e| call.fail_at_with(ErrorCode::Fail, 0, e.to_string()))?;

    // Stdin is written concurrently with reading stdout; both pipes are bounded.
    let writer = match (input, child.stdin.take()) {
        (Some(input), Some(mut stdin)) => Some(std::thread::spawn(move || {
            stdin.write_all(input.as_bytes())
        })),
        _ => None,
    };
    let output = child
        .wait_with_output()
        .map_err(|e| call.fail_at_with(ErrorCode::Fail, 0, e.to_string()))?;
    if let Some(writer) = writer {
        match writer.join() {
            Ok(Ok(())) => {}
            // The child may exit without reading all of its input.
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(call.fail_at_with(ErrorCode::Fail, 1, e.to_string())),
            Err(_) => return Err(call.fail_at_with(ErrorCode::Fail, 1, "input writer panicked")),
        }
    }
    tracing::debug!(command = %command, status = ?output.status, "executed command");
    Ok(Value::new_string(String::from_utf8_lossy(&output.stdout)))
};

/// Usage: @Load(<path>)
///
///   Returns: the file contents.
pub const ATOM_LOAD: EagerFn = |call, args, context| {
    let path = context.config().resolve_path(&args[0].string());
    std::fs::read_to_string(&path)
        .map(Value::new_string)
        .map_err(|e| call.fail_at_with(ErrorCode::Fail, 0, format!("{}: {e}", path.display())))
};

/// Usage: @Save(<path>, <content>)
///
///   Returns: true
pub const ATOM_SAVE: EagerFn = |call, args, context| {
    let path = context.config().resolve_path(&args[0].string());
    std::fs::write(&path, args[1].string())
        .map_err(|e| call.fail_at_with(ErrorCode::Fail, 0, format!("{}: {e}", path.display())))?;
    Ok(Value::new_boolean(true))
};

// ============================================================================
// PROFILE
// ============================================================================

/// Usage: @Profile(<section>, <key>, [<default>])
pub const ATOM_PROFILE: EagerFn = |_call, args, context| {
    let value = context
        .profile()
        .get_string(&args[0].string(), &args[1].string())
        .unwrap_or_else(|| opt_string(&args, 2, ""));
    Ok(Value::new_string(value))
};

/// Usage: @SetProfile(<section>, <key>, <value>)
///
///   Returns: `<value>`
pub const ATOM_SET_PROFILE: EagerFn = |_call, mut args, context| {
    let value = args.swap_remove(2);
    context
        .profile()
        .set_string(&args[0].string(), &args[1].string(), &value.string());
    Ok(value)
};

// ============================================================================
// PROMPTS
// ============================================================================

/// Asks the user for a line of text. Dismissing the prompt cancels the run.
///
/// Usage: @InputBox(<message>, [<default>], [<multiline>])
pub const ATOM_INPUT_BOX: EagerFn = |call, args, context| {
    let ui = require_ui(call, context)?;
    let answer = ui.input_box(
        &args[0].string(),
        &opt_string(&args, 1, ""),
        opt_bool(&args, 2, false),
    );
    match answer {
        Some(answer) => Ok(Value::new_string(answer)),
        None => Err(context.raise(ReturnType::Cancel)),
    }
};

/// Shows a message. Dismissing the box cancels the run.
///
/// Usage: @MessageBox(<message>, [<kind>])
///
///   Returns: the number of the button pressed.
pub const ATOM_MESSAGE_BOX: EagerFn = |call, args, context| {
    let ui = require_ui(call, context)?;
    match ui.message_box(&args[0].string(), opt_number(&args, 1, 0)) {
        Some(button) => Ok(Value::new_number(button)),
        None => Err(context.raise(ReturnType::Cancel)),
    }
};

// ============================================================================
// DATES
// ============================================================================

/// Usage: @Now()
pub const ATOM_NOW: EagerFn = |_call, _args, _context| {
    Ok(Value::new_time(chrono::Local::now().fixed_offset()))
};

/// Formats a time with `strftime` directives.
///
/// Usage: @FormatDate(<time>, <format>)
///   - `<time>` may also be RFC 2822 text, such as a `%Date` field.
///
/// Example:
///   @FormatDate(@Date(), '%Y-%m-%d')
pub const ATOM_FORMAT_DATE: EagerFn = |call, args, _context| {
    let time = match &args[0] {
        Value::Time(time) => *time,
        Value::String(_) | Value::Field(_) => DateTime::parse_from_rfc2822(args[0].string().trim())
            .map_err(|e| call.fail_at_with(ErrorCode::InvalidArgValue, 0, e.to_string()))?,
        _ => return Err(call.fail_at(ErrorCode::InvalidArgType, 0)),
    };
    let format = args[1].string();
    let items: Vec<Item<'_>> = StrftimeItems::new(&format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(call.fail_at(ErrorCode::InvalidArgValue, 1));
    }
    let mut text = String::new();
    write!(text, "{}", time.format_with_items(items.into_iter()))
        .map_err(|_| call.fail_at(ErrorCode::InvalidArgValue, 1))?;
    Ok(Value::new_string(text))
};

// ============================================================================
// REGISTRATION FUNCTION
// ============================================================================

/// Registers the external atoms with the given registry.
pub fn register_external_atoms(registry: &mut FunctionRegistry) {
    registry.register(FunctionDef::eager("Execute", Arity::Range(1, 2), ATOM_EXECUTE));
    registry.register(FunctionDef::eager("Load", Arity::Exact(1), ATOM_LOAD));
    registry.register(FunctionDef::eager("Save", Arity::Exact(2), ATOM_SAVE));
    registry.register(FunctionDef::eager("Profile", Arity::Range(2, 3), ATOM_PROFILE));
    registry.register(FunctionDef::eager("SetProfile", Arity::Exact(3), ATOM_SET_PROFILE));
    registry.register(FunctionDef::eager("InputBox", Arity::Range(1, 3), ATOM_INPUT_BOX));
    registry.register(FunctionDef::eager("MessageBox", Arity::Range(1, 2), ATOM_MESSAGE_BOX));
    registry.register(FunctionDef::eager("Now", Arity::Exact(0), ATOM_NOW));
    registry.register(FunctionDef::eager("FormatDate", Arity::Exact(2), ATOM_FORMAT_DATE));
}
