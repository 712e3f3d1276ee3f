//! # Variable Atoms
//!
//! Variables live in the session's scope stack; `global` bindings go to the
//! session-wide table instead. Names are case-insensitive.

use crate::ast::value::Value;
use crate::atoms::helpers::opt_bool;
use crate::atoms::{Arity, EagerFn, FunctionDef, Invocation};
use crate::diagnostics::{ErrorCode, Outcome};
use crate::runtime::registry::FunctionRegistry;

/// Binds a variable.
///
/// Usage: @Set(<name>, <value>, [<global>])
///
///   Returns: `<value>`
///
/// Example:
///   @Progn(@Set('n', 2), $n) ; => 2
pub const ATOM_SET: EagerFn = |call, mut args, context| {
    let global = opt_bool(&args, 2, false);
    let name = variable_name(call, &args)?;
    let value = args.swap_remove(1);
    context.set_variable(&name, value.clone(), global);
    Ok(value)
};

/// Reads a variable, or binds it when a value is given.
///
/// Usage: @Variable(<name>, [<value>], [<global>])
///
///   Returns: the variable's value; the empty string when it is unbound.
pub const ATOM_VARIABLE: EagerFn = |call, args, context| {
    if args.len() > 1 {
        return ATOM_SET(call, args, context);
    }
    let name = variable_name(call, &args)?;
    Ok(context.variable(&name).unwrap_or_else(Value::empty_string))
};

fn variable_name(call: &Invocation<'_>, args: &[Value]) -> Result<String, Outcome> {
    let name = args[0].string();
    if name.is_empty() {
        return Err(call.fail_at(ErrorCode::InvalidArgValue, 0));
    }
    Ok(name)
}

/// Registers the variable atoms with the given registry.
pub fn register_variable_atoms(registry: &mut FunctionRegistry) {
    registry.register(FunctionDef::eager("Set", Arity::Range(2, 3), ATOM_SET));
    registry.register(FunctionDef::eager("Variable", Arity::Range(1, 3), ATOM_VARIABLE));
}
