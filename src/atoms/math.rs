//! # Arithmetic and Comparison Atoms
//!
//! Numbers are unsigned 32-bit and arithmetic wraps.
//!
//! ## Atoms Provided
//!
//! - **Additive**: `Add`/`Plus`, `Subtract`/`Minus`
//! - **Comparison**: `Equal`, `Less`, `Greater`, `LessEqual`, `GreaterEqual`
//!
//! Comparisons compare natively when both operands are Numbers or both are
//! Booleans; anything else is compared as text, case-insensitively unless
//! the optional third argument asks otherwise.

use std::cmp::Ordering;

use crate::ast::value::Value;
use crate::atoms::helpers::opt_bool;
use crate::atoms::{Arity, EagerFn, FunctionDef, Param};
use crate::runtime::registry::FunctionRegistry;

// ============================================================================
// ARITHMETIC
// ============================================================================

/// Wrapping addition or subtraction, by static parameter.
///
/// Usage: @Add(<a>, <b>) / @Subtract(<a>, <b>)
///
///   Returns: Number
///
/// Example:
///   @Add(4294967290, 10) ; => 4
///   @Minus(1, 2)         ; => 4294967295
pub const ATOM_ADDITIVE: EagerFn = |call, args, _context| {
    let lhs = args[0].number();
    let rhs = args[1].number();
    let result = match call.param {
        Param::Bool(false) => lhs.wrapping_sub(rhs),
        _ => lhs.wrapping_add(rhs),
    };
    Ok(Value::new_number(result))
};

// ============================================================================
// COMPARISON
// ============================================================================

/// Usage: @Equal(<a>, <b>, [<caseSensitive>])
///
/// Example:
///   @Equal('A', 'a')       ; => true
///   @Equal('A', 'a', @True()) ; => false
pub const ATOM_EQUAL: EagerFn = |_call, args, _context| {
    let ordering = compare(&args[0], &args[1], opt_bool(&args, 2, false));
    Ok(Value::new_boolean(ordering == Ordering::Equal))
};

/// Ordering comparison; direction and strictness come from the static parameter.
///
/// Usage: @Less(<a>, <b>, [<caseSensitive>]), likewise `Greater`, `LessEqual`,
/// `GreaterEqual`.
///
/// Example:
///   @Less(2, 10)     ; => true
///   @Less('2', '10') ; => false (text comparison)
pub const ATOM_RELATIVE: EagerFn = |call, args, _context| {
    let ordering = compare(&args[0], &args[1], opt_bool(&args, 2, false));
    let result = match call.param {
        Param::Relative { less: true, or_equal } => {
            ordering == Ordering::Less || (or_equal && ordering == Ordering::Equal)
        }
        Param::Relative { less: false, or_equal } => {
            ordering == Ordering::Greater || (or_equal && ordering == Ordering::Equal)
        }
        _ => false,
    };
    Ok(Value::new_boolean(result))
};

/// Compares two values by kind, falling back to text.
pub fn compare(lhs: &Value, rhs: &Value, case_sensitive: bool) -> Ordering {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => a.cmp(b),
        (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
        _ if case_sensitive => lhs.string().cmp(&rhs.string()),
        _ => lhs.string().to_lowercase().cmp(&rhs.string().to_lowercase()),
    }
}

// ============================================================================
// REGISTRATION FUNCTION
// ============================================================================

/// Registers the arithmetic and comparison atoms with the given registry.
pub fn register_math_atoms(registry: &mut FunctionRegistry) {
    let add = FunctionDef::eager("Add", Arity::Exact(2), ATOM_ADDITIVE).with_param(Param::Bool(true));
    let subtract =
        FunctionDef::eager("Subtract", Arity::Exact(2), ATOM_ADDITIVE).with_param(Param::Bool(false));
    registry.register(add);
    registry.alias("Plus", add);
    registry.register(subtract);
    registry.alias("Minus", subtract);

    registry.register(FunctionDef::eager("Equal", Arity::Range(2, 3), ATOM_EQUAL));
    for (name, less, or_equal) in [
        ("Less", true, false),
        ("LessEqual", true, true),
        ("Greater", false, false),
        ("GreaterEqual", false, true),
    ] {
        registry.register(
            FunctionDef::eager(name, Arity::Range(2, 3), ATOM_RELATIVE)
                .with_param(Param::Relative { less, or_equal }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_kind_compares_natively() {
        assert_eq!(
            compare(&Value::new_number(2), &Value::new_number(10), false),
            Ordering::Less
        );
        assert_eq!(
            compare(&Value::new_string("2"), &Value::new_number(10), false),
            Ordering::Greater
        );
        assert_eq!(
            compare(&Value::new_boolean(false), &Value::new_boolean(true), false),
            Ordering::Less
        );
    }
}
