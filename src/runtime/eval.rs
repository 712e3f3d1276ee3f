//! Tree-walking evaluator.
//!
//! Evaluation is a recursive descent over [`Expression`]. Every function
//! dispatch, built-in or user-defined, goes through [`FunctionCall::evaluate`],
//! which bounds the dispatch depth and validates arity before any argument is
//! touched.

use std::rc::Rc;

use crate::ast::value::Value;
use crate::ast::{CallTarget, Expression, FunctionCall, Literal, MessageTypeHint};
use crate::atoms::{Atom, FunctionDef, Invocation};
use crate::diagnostics::{ErrorCode, MacroError, MacroResult, Outcome};
use crate::macro_err;
use crate::runtime::context::Context;

impl Expression {
    /// Evaluates this node against `context`.
    pub fn evaluate(&self, context: &mut Context) -> MacroResult {
        match self {
            Expression::Literal(Literal::String(s)) => Ok(Value::new_string(s.as_str())),
            Expression::Literal(Literal::Number(n)) => Ok(Value::new_number(*n)),
            Expression::Literal(Literal::Regex(re)) => {
                Ok(Value::new_regex(Rc::clone(re.compiled())))
            }
            Expression::Field(name) => evaluate_field(name, context),
            Expression::Variable(name) => Ok(evaluate_variable(name, context)),
            Expression::Call(call) => call.evaluate(context),
        }
    }
}

impl FunctionCall {
    pub fn evaluate(&self, context: &mut Context) -> MacroResult {
        let _depth = context
            .enter()
            .map_err(|e| Outcome::Error(e.in_function(self.name())))?;
        match self.target() {
            CallTarget::Builtin(def) => invoke_builtin(self, def, context),
            CallTarget::User => invoke_user_function(self, context),
        }
    }
}

fn invoke_builtin(call: &FunctionCall, def: &FunctionDef, context: &mut Context) -> MacroResult {
    if !def.arity.accepts(call.args().len()) {
        return Err(MacroError::new(ErrorCode::InvalidArgSize)
            .in_function(call.name())
            .with_detail(format!("got {} argument(s)", call.args().len()))
            .into());
    }
    let invocation = Invocation {
        name: call.name(),
        args: call.args(),
        param: def.param,
    };
    tracing::trace!(function = def.name, "dispatch");
    match def.atom {
        Atom::Lazy(function) => function(&invocation, context),
        Atom::Eager(function) => {
            let args = evaluate_args(call.args(), context)?;
            function(&invocation, args, context)
        }
    }
}

/// Evaluates arguments left to right, stopping at the first failure.
pub fn evaluate_args(args: &[Rc<Expression>], context: &mut Context) -> Result<Vec<Value>, Outcome> {
    args.iter().map(|arg| arg.evaluate(context)).collect()
}

fn invoke_user_function(call: &FunctionCall, context: &mut Context) -> MacroResult {
    let body = context
        .function(call.name())
        .ok_or_else(|| macro_err!(UnknownFunction, call.name()))?;

    let mut args = Vec::with_capacity(call.args().len() + 1);
    args.push(Value::new_string(call.name()));
    for arg in call.args() {
        args.push(arg.evaluate(context)?);
    }
    tracing::debug!(function = call.name(), arity = args.len() - 1, "calling user function");

    let _frame = context.push_frame(Some(args));
    body.evaluate(context)
}

fn evaluate_field(name: &str, context: &mut Context) -> MacroResult {
    let part = context
        .message(MessageTypeHint::Header)
        .map_err(|code| Outcome::Error(MacroError::new(code).in_function(format!("%{name}"))))?;
    Ok(Value::new_field(name, part.field(name).map(str::to_string)))
}

/// `$N` reads positional argument N; other names read variables. Unbound
/// names evaluate to the empty string.
fn evaluate_variable(name: &str, context: &Context) -> Value {
    let value = match name.parse::<usize>() {
        Ok(index) => context.argument(index),
        Err(_) => context.variable(name),
    };
    value.unwrap_or_else(Value::empty_string)
}
