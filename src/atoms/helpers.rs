//! # Atom Helper Infrastructure
//!
//! Shared argument extraction used across the atom domains. Extractors take
//! the invocation so every failure names the function and the 1-based
//! argument that caused it.

use std::rc::Rc;

use regex::Regex;

use crate::ast::value::{FieldValue, MessageList, Value};
use crate::ast::{compile_regex, MessageTypeHint};
use crate::atoms::Invocation;
use crate::diagnostics::{ErrorCode, Outcome};
use crate::mail::Part;
use crate::runtime::context::{Context, ContextFlags};
use crate::runtime::ui::MacroUi;

/// Boolean coercion of an optional argument.
pub fn opt_bool(args: &[Value], index: usize, default: bool) -> bool {
    args.get(index).map(Value::boolean).unwrap_or(default)
}

/// Numeric coercion of an optional argument.
pub fn opt_number(args: &[Value], index: usize, default: u32) -> u32 {
    args.get(index).map(Value::number).unwrap_or(default)
}

/// String coercion of an optional argument.
pub fn opt_string(args: &[Value], index: usize, default: &str) -> String {
    args.get(index)
        .map(Value::string)
        .unwrap_or_else(|| default.to_string())
}

pub fn expect_field<'v>(
    call: &Invocation<'_>,
    value: &'v Value,
    index: usize,
) -> Result<&'v FieldValue, Outcome> {
    match value {
        Value::Field(field) => Ok(field),
        _ => Err(call.fail_at(ErrorCode::InvalidArgType, index)),
    }
}

pub fn expect_message_list<'v>(
    call: &Invocation<'_>,
    value: &'v Value,
    index: usize,
) -> Result<&'v MessageList, Outcome> {
    value
        .as_message_list()
        .ok_or_else(|| call.fail_at(ErrorCode::InvalidArgType, index))
}

/// A non-null part handle.
pub fn expect_part(call: &Invocation<'_>, value: &Value, index: usize) -> Result<Rc<Part>, Outcome> {
    let handle = value
        .as_part()
        .ok_or_else(|| call.fail_at(ErrorCode::InvalidArgType, index))?;
    handle
        .part()
        .cloned()
        .ok_or_else(|| call.fail_at(ErrorCode::InvalidPart, index))
}

/// The part named by optional argument `index`, else the whole context message.
pub fn part_or_message(
    call: &Invocation<'_>,
    args: &[Value],
    index: usize,
    hint: MessageTypeHint,
    context: &mut Context,
) -> Result<Rc<Part>, Outcome> {
    match args.get(index) {
        Some(value) => expect_part(call, value, index),
        None => context_message(call, hint, context),
    }
}

/// The context message at `hint` granularity.
pub fn context_message(
    call: &Invocation<'_>,
    hint: MessageTypeHint,
    context: &mut Context,
) -> Result<Rc<Part>, Outcome> {
    context.message(hint).map_err(|code| call.fail(code))
}

/// A compiled regex value, or a pattern string compiled on the fly.
pub fn regex_arg(
    call: &Invocation<'_>,
    value: &Value,
    index: usize,
    case_sensitive: bool,
) -> Result<Rc<Regex>, Outcome> {
    match value {
        Value::Regex(re) => Ok(Rc::clone(re)),
        Value::String(_) | Value::Field(_) => {
            let flags = if case_sensitive { "" } else { "i" };
            compile_regex(&value.string(), flags)
                .map(Rc::new)
                .map_err(|e| call.fail_at_with(ErrorCode::InvalidArgValue, index, e.to_string()))
        }
        _ => Err(call.fail_at(ErrorCode::InvalidArgType, index)),
    }
}

/// The UI, provided the context allows prompting from here.
pub fn require_ui(call: &Invocation<'_>, context: &Context) -> Result<Rc<dyn MacroUi>, Outcome> {
    let flags = context.flags();
    if !flags.contains(ContextFlags::UI) {
        return Err(call.fail(ErrorCode::NoUI));
    }
    if !flags.contains(ContextFlags::UI_THREAD) {
        return Err(call.fail(ErrorCode::InvalidThread));
    }
    context.ui().ok_or_else(|| call.fail(ErrorCode::NoUI))
}

/// Converts a byte offset into `text` to a character index.
pub fn char_index(text: &str, byte_offset: usize) -> u32 {
    let count = text
        .char_indices()
        .take_while(|(i, _)| *i < byte_offset)
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Converts a character index into a byte offset, clamped to the end of `text`.
pub fn byte_offset(text: &str, char_index: u32) -> usize {
    text.char_indices()
        .nth(char_index as usize)
        .map(|(i, _)| i)
        .unwrap_or(text.len())
}
