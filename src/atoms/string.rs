//! # String Atoms
//!
//! Text search and manipulation. Indices and lengths count characters, not
//! bytes. Searches are case-insensitive unless a `caseSensitive` argument is
//! true.
//!
//! ## Atoms Provided
//!
//! - **Search**: `Contain`, `BeginWith`, `Find`
//! - **Construction**: `Concat`, `Substring`, `Replace`, `Quote`
//! - **Measurement**: `Length`

use std::collections::HashMap;

use crate::ast::value::Value;
use crate::atoms::helpers::{opt_bool, opt_number};
use crate::atoms::{Arity, EagerFn, FunctionDef, Param};
use crate::runtime::registry::FunctionRegistry;

/// `Find` result when nothing matches.
pub const NOT_FOUND: u32 = u32::MAX;

// ============================================================================
// SEARCH
// ============================================================================

/// Substring or prefix test, by static parameter. An empty needle always matches.
///
/// Usage: @Contain(<text>, <needle>, [<caseSensitive>])
///        @BeginWith(<text>, <prefix>, [<caseSensitive>])
///
///   Returns: Boolean
///
/// Example:
///   @Contain('Hello World', 'WORLD') ; => true
///   @BeginWith('Hello', 'hel', @True()) ; => false
pub const ATOM_CONTAIN: EagerFn = |call, args, _context| {
    let case_sensitive = opt_bool(&args, 2, false);
    let text = args[0].string();
    let needle = args[1].string();
    let found = match call.param {
        Param::Bool(true) => begins_with(&text, &needle, case_sensitive),
        _ => find_text(&text, &needle, 0, case_sensitive).is_some(),
    };
    Ok(Value::new_boolean(found))
};

/// Index of the first occurrence at or after a start index.
///
/// Usage: @Find(<text>, <separator>, [<start>], [<caseSensitive>])
///
///   Returns: Number; 4294967295 when absent.
///
/// Example:
///   @Find('a,b,c', ',', 2) ; => 3
pub const ATOM_FIND: EagerFn = |_call, args, _context| {
    let start = opt_number(&args, 2, 0) as usize;
    let case_sensitive = opt_bool(&args, 3, false);
    let index = find_text(&args[0].string(), &args[1].string(), start, case_sensitive)
        .and_then(|index| u32::try_from(index).ok())
        .unwrap_or(NOT_FOUND);
    Ok(Value::new_number(index))
};

// ============================================================================
// CONSTRUCTION
// ============================================================================

/// Usage: @Concat(<a>, <b>, ...)
pub const ATOM_CONCAT: EagerFn = |_call, args, _context| {
    Ok(Value::new_string(
        args.iter().map(Value::string).collect::<String>(),
    ))
};

/// Usage: @Length(<text>)
pub const ATOM_LENGTH: EagerFn = |_call, args, _context| {
    let length = args[0].string().chars().count();
    Ok(Value::new_number(u32::try_from(length).unwrap_or(u32::MAX)))
};

/// Characters from `start`, optionally limited to `length`.
///
/// Usage: @Substring(<text>, <start>, [<length>])
///
/// Example:
///   @Substring('Hello', 1, 3) ; => 'ell'
pub const ATOM_SUBSTRING: EagerFn = |_call, args, _context| {
    let start = args[1].number() as usize;
    let length = opt_number(&args, 2, u32::MAX) as usize;
    let text: String = args[0].string().chars().skip(start).take(length).collect();
    Ok(Value::new_string(text))
};

/// Replaces every occurrence of `old`.
///
/// Usage: @Replace(<text>, <old>, <new>, [<caseSensitive>])
pub const ATOM_REPLACE: EagerFn = |_call, args, _context| {
    let case_sensitive = opt_bool(&args, 3, false);
    Ok(Value::new_string(replace_all(
        &args[0].string(),
        &args[1].string(),
        &args[2].string(),
        case_sensitive,
    )))
};

/// Prefixes every line, as for quoting a message in a reply.
///
/// Usage: @Quote(<text>, <prefix>)
///
/// Example:
///   @Quote('a\nb', '> ') ; => '> a\n> b'
pub const ATOM_QUOTE: EagerFn = |_call, args, _context| {
    let text = args[0].string();
    let prefix = args[1].string();
    let mut quoted = String::with_capacity(text.len() + prefix.len());
    for line in text.split_inclusive('\n') {
        quoted.push_str(&prefix);
        quoted.push_str(line);
    }
    Ok(Value::new_string(quoted))
};

// ============================================================================
// SEARCH PRIMITIVES
// ============================================================================

fn fold(c: char, case_sensitive: bool) -> char {
    if case_sensitive {
        c
    } else {
        c.to_lowercase().next().unwrap_or(c)
    }
}

fn folded(text: &str, case_sensitive: bool) -> Vec<char> {
    text.chars().map(|c| fold(c, case_sensitive)).collect()
}

pub fn begins_with(text: &str, prefix: &str, case_sensitive: bool) -> bool {
    let mut text = text.chars();
    prefix.chars().all(|p| {
        text.next()
            .is_some_and(|t| fold(t, case_sensitive) == fold(p, case_sensitive))
    })
}

/// Character index of the first occurrence of `needle` at or after `start`.
/// An empty needle matches at `start` if that is within the text.
pub fn find_text(text: &str, needle: &str, start: usize, case_sensitive: bool) -> Option<usize> {
    let haystack = folded(text, case_sensitive);
    let pattern = folded(needle, case_sensitive);
    find_chars(&haystack, &pattern, start)
}

fn find_chars(haystack: &[char], pattern: &[char], start: usize) -> Option<usize> {
    match pattern {
        [] => (start <= haystack.len()).then_some(start),
        [single] => haystack
            .iter()
            .skip(start)
            .position(|c| c == single)
            .map(|i| i + start),
        _ => horspool(haystack, pattern, start),
    }
}

/// Boyer–Moore–Horspool search over pre-folded characters.
fn horspool(haystack: &[char], pattern: &[char], start: usize) -> Option<usize> {
    let m = pattern.len();
    let n = haystack.len();
    if n < m {
        return None;
    }
    let mut shift: HashMap<char, usize> = HashMap::with_capacity(m);
    for (i, c) in pattern[..m - 1].iter().enumerate() {
        shift.insert(*c, m - 1 - i);
    }

    let mut pos = start;
    while pos + m <= n {
        let mut j = m - 1;
        while haystack[pos + j] == pattern[j] {
            if j == 0 {
                return Some(pos);
            }
            j -= 1;
        }
        pos += shift.get(&haystack[pos + m - 1]).copied().unwrap_or(m);
    }
    None
}

fn replace_all(text: &str, old: &str, new: &str, case_sensitive: bool) -> String {
    if old.is_empty() {
        return text.to_string();
    }
    let original: Vec<char> = text.chars().collect();
    let haystack = folded(text, case_sensitive);
    let pattern = folded(old, case_sensitive);

    let mut result = String::with_capacity(text.len());
    let mut copied = 0;
    while let Some(found) = find_chars(&haystack, &pattern, copied) {
        result.extend(&original[copied..found]);
        result.push_str(new);
        copied = found + pattern.len();
    }
    result.extend(&original[copied..]);
    result
}

// ============================================================================
// REGISTRATION FUNCTION
// ============================================================================

/// Registers the string atoms with the given registry.
pub fn register_string_atoms(registry: &mut FunctionRegistry) {
    registry.register(
        FunctionDef::eager("Contain", Arity::Range(2, 3), ATOM_CONTAIN).with_param(Param::Bool(false)),
    );
    registry.register(
        FunctionDef::eager("BeginWith", Arity::Range(2, 3), ATOM_CONTAIN).with_param(Param::Bool(true)),
    );
    registry.register(FunctionDef::eager("Find", Arity::Range(2, 4), ATOM_FIND));
    registry.register(FunctionDef::eager("Concat", Arity::Any, ATOM_CONCAT));
    registry.register(FunctionDef::eager("Length", Arity::Exact(1), ATOM_LENGTH));
    registry.register(FunctionDef::eager("Substring", Arity::Range(2, 3), ATOM_SUBSTRING));
    registry.register(FunctionDef::eager("Replace", Arity::Range(3, 4), ATOM_REPLACE));
    registry.register(FunctionDef::eager("Quote", Arity::Exact(2), ATOM_QUOTE));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn horspool_finds_first_occurrence() {
        assert_eq!(find_text("abracadabra", "abra", 0, true), Some(0));
        assert_eq!(find_text("abracadabra", "abra", 1, true), Some(7));
        assert_eq!(find_text("abracadabra", "cad", 0, true), Some(4));
        assert_eq!(find_text("abracadabra", "dab", 0, true), Some(6));
        assert_eq!(find_text("abracadabra", "abrx", 0, true), None);
        assert_eq!(find_text("ab", "abc", 0, true), None);
    }

    #[test]
    fn case_folding() {
        assert_eq!(find_text("Hello World", "WORLD", 0, false), Some(6));
        assert_eq!(find_text("Hello World", "WORLD", 0, true), None);
        assert!(begins_with("Hello", "hel", false));
        assert!(!begins_with("Hello", "hel", true));
        assert!(!begins_with("He", "hel", false));
    }

    #[test]
    fn empty_needle_matches() {
        assert_eq!(find_text("Hello", "", 0, false), Some(0));
        assert_eq!(find_text("", "", 0, false), Some(0));
        assert!(begins_with("Hello", "", true));
    }

    #[test]
    fn replace_is_case_aware() {
        assert_eq!(replace_all("a-A-a", "a", "b", true), "b-A-b");
        assert_eq!(replace_all("a-A-a", "a", "b", false), "b-b-b");
        assert_eq!(replace_all("aaa", "aa", "x", true), "xa");
        assert_eq!(replace_all("abc", "", "x", true), "abc");
    }
}
