mod common;

use std::rc::Rc;

use common::{empty_context, eval, eval_string, Mailbox};
use mailmacro::mail::MessageHolder;
use mailmacro::runtime::config::{EngineConfig, EvalLimits};
use mailmacro::runtime::ui::MacroUi;
use mailmacro::{Context, ContextFlags, ErrorCode, Outcome, ReturnType};
use pretty_assertions::assert_eq;

/// `@Tick(x)` returns `x` and counts its calls in the global `ticks`.
const TICK: &str = "@Defun('Tick', @Progn(@Set('ticks', @Add($ticks, 1), @True()), $1))";

fn ticking_context() -> Context {
    let mut context = empty_context();
    eval(TICK, &mut context).unwrap();
    context
}

// ---
// Conditionals
// ---

#[test]
fn if_evaluates_only_what_it_needs() {
    let mut context = ticking_context();
    let result = eval_string(
        "@If(@Tick(@False()), @Tick('a'), \
             @Tick(@True()), @Tick('b'), \
             @Tick(@True()), @Tick('c'), \
             @Tick('else'))",
        &mut context,
    );
    assert_eq!(result, "b");
    // cond1, cond2 and branch 2; nothing after the first true condition.
    assert_eq!(eval_string("$ticks", &mut context), "3");
}

#[test]
fn if_falls_through_to_else() {
    let mut context = ticking_context();
    let result = eval_string("@If(@Tick(0), 'a', @Tick(''), 'b', @Tick('else'))", &mut context);
    assert_eq!(result, "else");
    assert_eq!(eval_string("$ticks", &mut context), "3");
}

#[test]
fn if_needs_odd_arity() {
    let mut context = empty_context();
    for text in ["@If(1, 2)", "@If(1, 2, 3, 4)", "@If()"] {
        let outcome = eval(text, &mut context).unwrap_err();
        assert_eq!(outcome.error_code(), Some(ErrorCode::InvalidArgSize), "{text}");
    }
}

#[test]
fn and_or_short_circuit() {
    let mut context = ticking_context();
    assert_eq!(eval_string("@And(@Tick(1), @Tick(0), @Tick(1))", &mut context), "false");
    assert_eq!(eval_string("$ticks", &mut context), "2");
    assert_eq!(eval_string("@Or(@Tick(0), @Tick('x'), @Tick(0))", &mut context), "true");
    assert_eq!(eval_string("$ticks", &mut context), "4");
    assert_eq!(eval_string("@Not(@False())", &mut context), "true");
}

// ---
// Errors and signals
// ---

#[test]
fn catch_recovers_from_errors() {
    let mut context = empty_context();
    // No context message: @Field fails.
    let value = eval("@Catch(@Field('NoSuchHeader-ThatErrors'), @True())", &mut context).unwrap();
    assert_eq!(value.string(), "true");

    let value = eval("@Catch('fine', 'fallback')", &mut context).unwrap();
    assert_eq!(value.string(), "fine");
}

#[test]
fn catch_does_not_intercept_exit() {
    let mut context = ticking_context();
    let outcome = eval("@Catch(@Progn(@Exit(), @Tick(1)), @Tick('fallback'))", &mut context)
        .unwrap_err();
    assert_eq!(outcome, Outcome::Exit);
    assert_eq!(context.return_type(), ReturnType::Exit);
    assert_eq!(eval_string("$ticks", &mut context), "");
}

struct DismissingUi;

impl MacroUi for DismissingUi {
    fn input_box(&self, _message: &str, _default: &str, _multiline: bool) -> Option<String> {
        None
    }

    fn message_box(&self, _message: &str, _kind: u32) -> Option<u32> {
        None
    }
}

#[test]
fn catch_does_not_intercept_cancel() {
    let mailbox = Mailbox::new();
    let mut context = mailbox
        .builder(&mailbox.root)
        .ui(Rc::new(DismissingUi))
        .flags(ContextFlags::UI | ContextFlags::UI_THREAD)
        .build();
    let outcome = eval("@Catch(@InputBox('Name?'), 'default')", &mut context).unwrap_err();
    assert_eq!(outcome, Outcome::Cancel);
    assert_eq!(context.return_type(), ReturnType::Cancel);
}

#[test]
fn prompts_need_a_ui() {
    let mut context = empty_context();
    let outcome = eval("@MessageBox('hi')", &mut context).unwrap_err();
    assert_eq!(outcome.error_code(), Some(ErrorCode::NoUI));
}

#[test]
fn errors_short_circuit_remaining_arguments() {
    let mut context = ticking_context();
    let outcome = eval("@Concat(@Tick('a'), @NoSuchFunction(), @Tick('b'))", &mut context)
        .unwrap_err();
    let error = outcome.as_error().unwrap();
    assert_eq!(error.code, ErrorCode::UnknownFunction);
    assert_eq!(error.function.as_deref(), Some("NoSuchFunction"));
    assert_eq!(eval_string("$ticks", &mut context), "1");
}

// ---
// Loops and iteration
// ---

#[test]
fn while_loops_until_false() {
    let mut context = empty_context();
    let text = "@Progn(@Set('i', 0), @While(@Less($i, 5), @Set('i', @Add($i, 1))), $i)";
    assert_eq!(eval_string(text, &mut context), "5");
}

#[test]
fn while_respects_iteration_limit() {
    let config = EngineConfig {
        limits: EvalLimits {
            max_iterations: Some(10),
            ..EvalLimits::default()
        },
        ..EngineConfig::default()
    };
    let mut context = Context::builder(mailmacro::mail::memory::MemoryDocument::new())
        .config(config)
        .build();
    let outcome = eval("@While(@True(), 1)", &mut context).unwrap_err();
    assert_eq!(outcome.error_code(), Some(ErrorCode::Fail));
}

fn three_selected(mailbox: &Mailbox) -> Context {
    let selected: Vec<Rc<dyn MessageHolder>> = vec![
        mailbox.root.clone(),
        mailbox.reply.clone(),
        mailbox.unrelated.clone(),
    ];
    mailbox.builder(&mailbox.root).selected(&selected).build()
}

#[test]
fn for_each_aborts_on_first_error() {
    let mailbox = Mailbox::new();
    let mut context = three_selected(&mailbox);
    let outcome = eval(
        "@ForEach(@Selected(), @Progn(\
            @Set('visited', @Concat($visited, @Id()), @True()), \
            @If(@Equal(@Id(), 2), @NoSuchFunction(), @True())))",
        &mut context,
    )
    .unwrap_err();
    assert_eq!(outcome.error_code(), Some(ErrorCode::UnknownFunction));
    assert_eq!(eval_string("$visited", &mut context), "12");
}

#[test]
fn find_each_stops_at_first_match() {
    let mailbox = Mailbox::new();
    let mut context = three_selected(&mailbox);
    let subject = eval_string(
        "@FindEach(@Selected(), @Progn(\
            @Set('visited', @Concat($visited, @Id()), @True()), \
            @Equal(@Id(), 2)), %Subject)",
        &mut context,
    );
    assert_eq!(subject, "Re: Quarterly report");
    assert_eq!(eval_string("$visited", &mut context), "12");

    let none = eval_string("@FindEach(@Selected(), @Equal(@Id(), 99))", &mut context);
    assert_eq!(none, "false");
}

#[test]
fn for_each_binds_each_message() {
    let mailbox = Mailbox::new();
    let mut context = three_selected(&mailbox);
    eval_string(
        "@ForEach(@Selected(), @Set('from', @Concat($from, @Address(%From), ';'), @True()))",
        &mut context,
    );
    assert_eq!(
        eval_string("$from", &mut context),
        "alice@example.com;bob@example.com;lists@example.org;"
    );
    // The root context still sees its own message.
    assert_eq!(eval_string("@Id()", &mut context), "1");
}

#[test]
fn for_each_rejects_non_lists() {
    let mut context = empty_context();
    let outcome = eval("@ForEach('text', @True())", &mut context).unwrap_err();
    assert_eq!(outcome.error_code(), Some(ErrorCode::InvalidArgType));
}

#[test]
fn loop_locals_stay_in_the_item_frame() {
    let mailbox = Mailbox::new();
    let mut context = three_selected(&mailbox);
    eval_string("@Set('outer', 'kept')", &mut context);
    eval_string(
        "@ForEach(@Selected(), @Progn(@Set('inner', @Id()), @Set('outer', 'changed')))",
        &mut context,
    );
    assert_eq!(eval_string("$inner", &mut context), "");
    assert_eq!(eval_string("$outer", &mut context), "changed");
    assert_eq!(context.frame_depth(), 1);
}

#[test]
fn exit_stops_iteration() {
    let mailbox = Mailbox::new();
    let mut context = three_selected(&mailbox);
    let outcome = eval(
        "@ForEach(@Selected(), @Progn(@Set('n', @Add($n, 1), @True()), @Exit()))",
        &mut context,
    )
    .unwrap_err();
    assert_eq!(outcome, Outcome::Exit);
    assert_eq!(eval_string("$n", &mut context), "1");
}

// ---
// User functions
// ---

const SQUARE: &str = "@Defun('Square', @Progn(\
    @Set('acc', 0), @Set('i', 0), \
    @While(@Less($i, $1), @Progn(@Set('acc', @Add($acc, $1)), @Set('i', @Add($i, 1)))), \
    $acc))";

#[test]
fn defun_pushes_and_pops_a_frame() {
    let mut context = empty_context();
    assert_eq!(eval_string(SQUARE, &mut context), "true");
    let depth = context.frame_depth();

    assert_eq!(eval_string("@Square(5)", &mut context), "25");
    assert_eq!(eval_string("@square(@Square(2))", &mut context), "16");
    assert_eq!(context.frame_depth(), depth);

    // Locals of the call did not leak into the caller's frame.
    assert_eq!(eval_string("@Variable('acc')", &mut context), "");
    assert_eq!(eval_string("$1", &mut context), "");
}

#[test]
fn positional_arguments() {
    let mut context = empty_context();
    eval("@Defun('Args', @Concat($0, ':', $1, ',', $2, ',', $3))", &mut context).unwrap();
    assert_eq!(eval_string("@Args('a', 'b')", &mut context), "Args:a,b,");
}

#[test]
fn functions_defined_in_loops_survive() {
    let mailbox = Mailbox::new();
    let mut context = three_selected(&mailbox);
    let value = eval_string(
        "@Progn(@ForEach(@Selected(), @Defun('Later', @Concat('seen ', $1))), @Later('it'))",
        &mut context,
    );
    assert_eq!(value, "seen it");
}

#[test]
fn recursion_is_bounded() {
    let config = EngineConfig {
        limits: EvalLimits {
            max_depth: 32,
            ..EvalLimits::default()
        },
        ..EngineConfig::default()
    };
    let mut context = Context::builder(mailmacro::mail::memory::MemoryDocument::new())
        .config(config)
        .build();
    eval("@Defun('Forever', @Forever())", &mut context).unwrap();
    let outcome = eval("@Forever()", &mut context).unwrap_err();
    assert_eq!(outcome.error_code(), Some(ErrorCode::Fail));
    assert_eq!(context.frame_depth(), 1);
    assert_eq!(context.depth(), 0);

    // Bounded recursion is fine.
    eval(
        "@Defun('Count', @If(@Equal($1, 0), 'done', @Count(@Subtract($1, 1))))",
        &mut context,
    )
    .unwrap();
    assert_eq!(eval_string("@Count(5)", &mut context), "done");
}

// ---
// Runtime parsing
// ---

#[test]
fn eval_parses_at_runtime() {
    let mut context = empty_context();
    assert_eq!(eval_string("@Eval(@Concat('@Add(1, ', '2)'))", &mut context), "3");

    let outcome = eval("@Eval('@Add(1,')", &mut context).unwrap_err();
    let error = outcome.as_error().unwrap();
    assert_eq!(error.code, ErrorCode::Fail);
    assert_eq!(error.argument, Some(1));
}

#[test]
fn include_reads_relative_to_include_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("lib.macro"),
        "# greeting helpers\n@Defun('Greet', @Concat('Hello ', $1))\n",
    )
    .unwrap();
    let config = EngineConfig {
        include_dir: Some(dir.path().to_path_buf()),
        ..EngineConfig::default()
    };
    let mut context = Context::builder(mailmacro::mail::memory::MemoryDocument::new())
        .config(config)
        .build();

    assert_eq!(
        eval_string("@Progn(@Include('lib.macro'), @Greet('Bob'))", &mut context),
        "Hello Bob"
    );
    let outcome = eval("@Include('missing.macro')", &mut context).unwrap_err();
    assert_eq!(outcome.error_code(), Some(ErrorCode::Fail));
}
