//! # Control Flow and Meta Atoms
//!
//! Conditionals, sequencing, error recovery, loops, user functions, runtime
//! parsing and message iteration. Most of these are lazy: they decide which
//! of their argument nodes get evaluated.
//!
//! ## Atoms Provided
//!
//! - **Conditionals**: `If`, `And`, `Or`, `Not`, `True`, `False`
//! - **Sequencing**: `Progn`, `While`, `Exit`
//! - **Recovery**: `Catch`
//! - **Functions**: `Defun`
//! - **Runtime parsing**: `Eval`, `Include`
//! - **Iteration**: `ForEach`, `FindEach`

use std::rc::Rc;

use crate::ast::value::Value;
use crate::atoms::helpers::expect_message_list;
use crate::atoms::{Arity, EagerFn, FunctionDef, Invocation, LazyFn, Param};
use crate::diagnostics::{ErrorCode, MacroResult, Outcome, ReturnType};
use crate::mail::MessageHolder;
use crate::runtime::context::Context;
use crate::runtime::registry::FunctionRegistry;
use crate::syntax;

// ============================================================================
// CONDITIONALS
// ============================================================================

/// Multi-branch conditional.
///
/// Usage: @If(<cond1>, <expr1>, [<cond2>, <expr2>, ...], <else>)
///   - The argument count must be odd and at least 3.
///
///   Returns: the value of the first branch whose condition is true, else `<else>`.
///
/// Example:
///   @If(@Equal(%X-Spam, 'yes'), 'spam', 'ham')
pub const ATOM_IF: LazyFn = |call, context| {
    let count = call.arg_count();
    if count < 3 || count % 2 == 0 {
        return Err(call.fail(ErrorCode::InvalidArgSize));
    }
    for condition in (0..count - 1).step_by(2) {
        if call.eval(condition, context)?.boolean() {
            return call.eval(condition + 1, context);
        }
    }
    call.eval(count - 1, context)
};

/// Short-circuit conjunction.
///
/// Usage: @And(<a>, <b>, ...)
///
///   Returns: Boolean; false as soon as an operand is false.
pub const ATOM_AND: LazyFn = |call, context| {
    for index in 0..call.arg_count() {
        if !call.eval(index, context)?.boolean() {
            return Ok(Value::new_boolean(false));
        }
    }
    Ok(Value::new_boolean(true))
};

/// Short-circuit disjunction.
///
/// Usage: @Or(<a>, <b>, ...)
///
///   Returns: Boolean; true as soon as an operand is true.
pub const ATOM_OR: LazyFn = |call, context| {
    for index in 0..call.arg_count() {
        if call.eval(index, context)?.boolean() {
            return Ok(Value::new_boolean(true));
        }
    }
    Ok(Value::new_boolean(false))
};

/// Usage: @Not(<a>)
pub const ATOM_NOT: EagerFn = |_call, args, _context| Ok(Value::new_boolean(!args[0].boolean()));

/// `@True()` and `@False()`; the constant is the static parameter.
pub const ATOM_CONSTANT: EagerFn = |call, _args, _context| {
    Ok(Value::new_boolean(matches!(call.param, Param::Bool(true))))
};

// ============================================================================
// SEQUENCING
// ============================================================================

/// Evaluates every argument in order.
///
/// Usage: @Progn(<e1>, <e2>, ...)
///
///   Returns: the value of the last argument.
pub const ATOM_PROGN: EagerFn = |call, mut args, _context| {
    args.pop().ok_or_else(|| call.fail(ErrorCode::InvalidArgSize))
};

/// Loop while a condition holds.
///
/// Usage: @While(<cond>, <body>)
///
///   Returns: the final (false) condition value. The body's values are discarded.
///
/// Example:
///   @Progn(@Set('i', 0), @While(@Less($i, 3), @Set('i', @Add($i, 1))))
pub const ATOM_WHILE: LazyFn = |call, context| {
    let limit = context.config().limits.max_iterations;
    let mut iterations: u64 = 0;
    loop {
        let condition = call.eval(0, context)?;
        if !condition.boolean() {
            return Ok(condition);
        }
        if let Some(limit) = limit {
            if iterations >= limit {
                return Err(call.fail_with(
                    ErrorCode::Fail,
                    format!("iteration limit of {limit} exceeded"),
                ));
            }
        }
        iterations += 1;
        call.eval(1, context)?;
    }
};

/// Stops the whole macro run. Not an error, and not catchable.
///
/// Usage: @Exit()
pub const ATOM_EXIT: EagerFn = |_call, _args, context| {
    tracing::debug!("exit requested");
    Err(context.raise(ReturnType::Exit))
};

// ============================================================================
// RECOVERY
// ============================================================================

/// Error recovery.
///
/// Usage: @Catch(<expr>, <fallback>)
///
///   Returns: `<expr>`'s value, or `<fallback>`'s value when `<expr>` fails with
///   an error. Cancel and Exit pass through untouched.
///
/// Example:
///   @Catch(@Field('X-Missing'), 'none')
pub const ATOM_CATCH: LazyFn = |call, context| match call.eval(0, context) {
    Err(Outcome::Error(error)) => {
        tracing::debug!(%error, "caught error");
        call.eval(1, context)
    }
    other => other,
};

// ============================================================================
// USER FUNCTIONS
// ============================================================================

/// Defines a user function. The body is bound unevaluated.
///
/// Usage: @Defun(<name>, <body>)
///   - Inside `<body>`, `$0` is the function name and `$1`, `$2`, ... are the
///     call-site arguments.
///
///   Returns: true
///
/// Example:
///   @Progn(@Defun('Double', @Add($1, $1)), @Double(5)) ; => 10
pub const ATOM_DEFUN: LazyFn = |call, context| {
    let name = call.eval(0, context)?.string();
    if name.trim().is_empty() {
        return Err(call.fail_at(ErrorCode::InvalidArgValue, 0));
    }
    context.define_function(name.trim(), Rc::clone(&call.args[1]));
    Ok(Value::new_boolean(true))
};

// ============================================================================
// RUNTIME PARSING
// ============================================================================

/// Parses and evaluates macro text.
///
/// Usage: @Eval(<text>)
///
/// Example:
///   @Eval(@Concat('@Add(1, ', '2)')) ; => 3
pub const ATOM_EVAL: EagerFn = |call, args, context| {
    let text = args[0].string();
    evaluate_text(call, &text, context)
};

/// Reads a macro file (relative to the configured include directory) and
/// evaluates it.
///
/// Usage: @Include(<path>)
pub const ATOM_INCLUDE: EagerFn = |call, args, context| {
    let path = context.config().resolve_path(&args[0].string());
    let text = std::fs::read_to_string(&path).map_err(|e| {
        call.fail_at_with(ErrorCode::Fail, 0, format!("{}: {e}", path.display()))
    })?;
    tracing::debug!(path = %path.display(), "including macro file");
    evaluate_text(call, &text, context)
};

fn evaluate_text(call: &Invocation<'_>, text: &str, context: &mut Context) -> MacroResult {
    let tree = syntax::parse(text)
        .map_err(|e| call.fail_at_with(ErrorCode::Fail, 0, e.message))?;
    tracing::debug!(text, "parsed macro at runtime");
    let tree = context.adopt(tree);
    tree.evaluate(context)
}

// ============================================================================
// ITERATION
// ============================================================================

/// Evaluates a body once per message, each time in a context bound to it
/// and in a fresh scope frame.
///
/// Usage: @ForEach(<messages>, <body>)
///
///   Returns: true, or the first error a body raises.
///
/// Example:
///   @ForEach(@Selected(), @Seen(@True()))
pub const ATOM_FOR_EACH: LazyFn = |call, context| {
    for holder in message_items(call, context)? {
        let mut item = context.child(holder);
        let _frame = item.push_frame(None);
        call.args[1].evaluate(&mut item)?;
    }
    Ok(Value::new_boolean(true))
};

/// Finds the first message for which the body is true.
///
/// Usage: @FindEach(<messages>, <body>, [<result>])
///
///   Returns: the truthy body value, or `<result>` evaluated against the
///   matching message; false when nothing matches.
///
/// Example:
///   @FindEach(@Thread(), @Marked(), @Id())
pub const ATOM_FIND_EACH: LazyFn = |call, context| {
    for holder in message_items(call, context)? {
        let mut item = context.child(holder);
        let _frame = item.push_frame(None);
        let found = call.args[1].evaluate(&mut item)?;
        if found.boolean() {
            return match call.args.get(2) {
                Some(result) => result.evaluate(&mut item),
                None => Ok(found),
            };
        }
    }
    Ok(Value::new_boolean(false))
};

/// Live messages of the list in argument 0.
fn message_items(
    call: &Invocation<'_>,
    context: &mut Context,
) -> Result<Vec<Rc<dyn MessageHolder>>, Outcome> {
    let list = call.eval(0, context)?;
    let list = expect_message_list(call, &list, 0)?;
    Ok(list.iter().collect())
}

// ============================================================================
// REGISTRATION FUNCTION
// ============================================================================

/// Registers all control atoms with the given registry.
pub fn register_control_atoms(registry: &mut FunctionRegistry) {
    // Conditionals; If checks its own odd arity
    registry.register(FunctionDef::lazy("If", Arity::Any, ATOM_IF));
    registry.register(FunctionDef::lazy("And", Arity::AtLeast(1), ATOM_AND));
    registry.register(FunctionDef::lazy("Or", Arity::AtLeast(1), ATOM_OR));
    registry.register(FunctionDef::eager("Not", Arity::Exact(1), ATOM_NOT));
    registry.register(
        FunctionDef::eager("True", Arity::Exact(0), ATOM_CONSTANT).with_param(Param::Bool(true)),
    );
    registry.register(
        FunctionDef::eager("False", Arity::Exact(0), ATOM_CONSTANT).with_param(Param::Bool(false)),
    );

    // Sequencing
    registry.register(FunctionDef::eager("Progn", Arity::AtLeast(1), ATOM_PROGN));
    registry.register(FunctionDef::lazy("While", Arity::Exact(2), ATOM_WHILE));
    registry.register(FunctionDef::eager("Exit", Arity::Exact(0), ATOM_EXIT));

    // Recovery and functions
    registry.register(FunctionDef::lazy("Catch", Arity::Exact(2), ATOM_CATCH));
    registry.register(FunctionDef::lazy("Defun", Arity::Exact(2), ATOM_DEFUN));

    // Runtime parsing
    registry.register(FunctionDef::eager("Eval", Arity::Exact(1), ATOM_EVAL));
    registry.register(FunctionDef::eager("Include", Arity::Exact(1), ATOM_INCLUDE));

    // Iteration
    registry.register(FunctionDef::lazy("ForEach", Arity::Exact(2), ATOM_FOR_EACH));
    registry.register(FunctionDef::lazy("FindEach", Arity::Range(2, 3), ATOM_FIND_EACH));
}
