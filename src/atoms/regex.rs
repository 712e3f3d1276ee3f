//! # Regular Expression Atoms
//!
//! Patterns may be precompiled `Regex` values (`/pattern/flags` literals or
//! `@Regex(...)`) or plain strings compiled on the fly. Plain-string patterns
//! are case-insensitive unless stated otherwise.
//!
//! Every successful match replaces the session's capture groups, readable
//! afterwards with `@Group(n)`.

use regex::{Captures, Regex};

use crate::ast::value::Value;
use crate::atoms::helpers::{byte_offset, char_index, opt_bool, opt_number, regex_arg};
use crate::atoms::string::NOT_FOUND;
use crate::atoms::{Arity, EagerFn, FunctionDef};
use crate::runtime::context::Context;
use crate::runtime::registry::FunctionRegistry;

/// Compiles a pattern into a `Regex` value.
///
/// Usage: @Regex(<pattern>, [<caseSensitive>])
pub const ATOM_REGEX: EagerFn = |call, args, _context| {
    let case_sensitive = opt_bool(&args, 1, false);
    regex_arg(call, &args[0], 0, case_sensitive).map(Value::new_regex)
};

/// Character index of the first match at or after `start`.
///
/// Usage: @RegexFind(<text>, <regex>, [<start>])
///
///   Returns: Number; 4294967295 when there is no match.
///
/// Example:
///   @RegexFind('order 66', /\d+/) ; => 6
pub const ATOM_REGEX_FIND: EagerFn = |call, args, context| {
    let text = args[0].string();
    let re = regex_arg(call, &args[1], 1, false)?;
    let start = byte_offset(&text, opt_number(&args, 2, 0));
    let index = match re.captures_at(&text, start) {
        Some(captures) => {
            let whole = captures.get(0).map(|m| m.start()).unwrap_or(start);
            store_captures(&captures, context);
            char_index(&text, whole)
        }
        None => NOT_FOUND,
    };
    Ok(Value::new_number(index))
};

/// Usage: @RegexMatch(<text>, <regex>)
///
///   Returns: Boolean
pub const ATOM_REGEX_MATCH: EagerFn = |call, args, context| {
    let text = args[0].string();
    let re = regex_arg(call, &args[1], 1, false)?;
    let captures = re.captures(&text);
    if let Some(captures) = &captures {
        store_captures(captures, context);
    }
    Ok(Value::new_boolean(captures.is_some()))
};

/// Replaces the first match, or every match when `global` is true.
///
/// Usage: @RegexReplace(<text>, <regex>, <replacement>, [<global>])
///   - `\N` in `<replacement>` expands to capture group N; `\\` is a backslash.
///
/// Example:
///   @RegexReplace('John Smith', /(\w+) (\w+)/, '\2, \1') ; => 'Smith, John'
pub const ATOM_REGEX_REPLACE: EagerFn = |call, args, context| {
    let text = args[0].string();
    let re = regex_arg(call, &args[1], 1, false)?;
    let replacement = args[2].string();
    let global = opt_bool(&args, 3, false);
    Ok(Value::new_string(replace(
        &text,
        &re,
        &replacement,
        global,
        context,
    )))
};

/// Capture group of the last successful match.
///
/// Usage: @Group(<n>)
///
///   Returns: String; empty when there is no such group.
pub const ATOM_GROUP: EagerFn = |_call, args, context| {
    let group = context.capture(args[0].number() as usize).unwrap_or_default();
    Ok(Value::new_string(group))
};

fn store_captures(captures: &Captures<'_>, context: &Context) {
    let groups = captures
        .iter()
        .map(|group| group.map(|m| m.as_str().to_string()).unwrap_or_default())
        .collect();
    context.set_captures(groups);
}

fn replace(text: &str, re: &Regex, replacement: &str, global: bool, context: &Context) -> String {
    let mut result = String::with_capacity(text.len());
    let mut copied = 0;
    let mut search = 0;
    while search <= text.len() {
        let Some(captures) = re.captures_at(text, search) else {
            break;
        };
        let Some(whole) = captures.get(0) else {
            break;
        };
        store_captures(&captures, context);
        result.push_str(&text[copied..whole.start()]);
        expand(replacement, &captures, &mut result);
        copied = whole.end();
        if !global {
            break;
        }
        search = if whole.is_empty() {
            // Step over one character so an empty match cannot repeat.
            match text[whole.end()..].chars().next() {
                Some(c) => {
                    result.push(c);
                    copied += c.len_utf8();
                    whole.end() + c.len_utf8()
                }
                None => break,
            }
        } else {
            whole.end()
        };
    }
    result.push_str(&text[copied..]);
    result
}

/// Expands `\N` and `\\` in a replacement template.
fn expand(template: &str, captures: &Captures<'_>, out: &mut String) {
    let mut chars = template.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('\\') => {
                chars.next();
                out.push('\\');
            }
            Some(d) if d.is_ascii_digit() => {
                chars.next();
                let group = d.to_digit(10).unwrap_or(0) as usize;
                if let Some(m) = captures.get(group) {
                    out.push_str(m.as_str());
                }
            }
            _ => out.push('\\'),
        }
    }
}

/// Registers the regex atoms with the given registry.
pub fn register_regex_atoms(registry: &mut FunctionRegistry) {
    registry.register(FunctionDef::eager("Regex", Arity::Range(1, 2), ATOM_REGEX));
    registry.register(FunctionDef::eager("RegexFind", Arity::Range(2, 3), ATOM_REGEX_FIND));
    registry.register(FunctionDef::eager("RegexMatch", Arity::Exact(2), ATOM_REGEX_MATCH));
    registry.register(FunctionDef::eager("RegexReplace", Arity::Range(3, 4), ATOM_REGEX_REPLACE));
    registry.register(FunctionDef::eager("Group", Arity::Exact(1), ATOM_GROUP));
}
