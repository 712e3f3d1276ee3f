use std::rc::Rc;

use mailmacro::runtime::registry::FunctionRegistry;
use mailmacro::syntax::parse;
use mailmacro::{Expression, MessageTypeHint};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn round_trip(text: &str) -> String {
    let first = parse(text).unwrap_or_else(|e| panic!("{text}: {e}")).to_text();
    let second = parse(&first).unwrap_or_else(|e| panic!("{first}: {e}")).to_text();
    assert_eq!(first, second, "canonical text is not a fixed point");
    first
}

// ---
// Canonical text
// ---

#[test]
fn control_flow_round_trips() {
    let cases = [
        (
            "@If( @Contain(%Subject,'[spam]') , @Junk(1) , @False() )",
            "@If(@Contain(%Subject, '[spam]'), @Junk(1), @False())",
        ),
        (
            "@Catch(@Field(\"X-Missing\"), 'none')",
            "@Catch(@Field('X-Missing'), 'none')",
        ),
        (
            "@Progn(@Defun('Square', @Add($1, $1)), @Square(5))",
            "@Progn(@Defun('Square', @Add($1, $1)), @Square(5))",
        ),
        (
            "@While(@Less($i, 3), @Set('i', @Add($i, 1)))",
            "@While(@Less($i, 3), @Set('i', @Add($i, 1)))",
        ),
        (
            "@ForEach(@Thread(@True()), @Seen(@True()))",
            "@ForEach(@Thread(@True()), @Seen(@True()))",
        ),
        ("@RegexReplace(%From, /^(\\w+) (\\w+)$/i, '\\2, \\1')", "@RegexReplace(%From, /^(\\w+) (\\w+)$/i, '\\\\2, \\\\1')"),
    ];
    for (input, canonical) in cases {
        assert_eq!(round_trip(input), canonical);
    }
}

#[test]
fn every_builtin_round_trips() {
    for name in FunctionRegistry::global().names() {
        let text = format!("@{name}('a', 1, %From, $x)");
        assert_eq!(round_trip(&text), text);
    }
}

#[test]
fn comments_are_dropped() {
    let text = "# mark lists\n@If(%List-Id, # mailing list\n @Seen(1), @False())";
    assert_eq!(round_trip(text), "@If(%List-Id, @Seen(1), @False())");
}

#[test]
fn call_targets_resolve_at_build_time() {
    let tree = parse("@contain(%Subject, 'x')").unwrap();
    let Expression::Call(call) = tree.as_ref() else {
        panic!("not a call");
    };
    assert!(!call.is_user_function());
    assert_eq!(call.name(), "contain");

    let tree = parse("@Square(5)").unwrap();
    let Expression::Call(call) = tree.as_ref() else {
        panic!("not a call");
    };
    assert!(call.is_user_function());
}

#[test]
fn message_type_hints_propagate() {
    let hint = |text: &str| parse(text).unwrap().message_type_hint();
    assert_eq!(hint("@Add(1, 2)"), MessageTypeHint::None);
    assert_eq!(hint("@Contain(%Subject, 'x')"), MessageTypeHint::Header);
    assert_eq!(hint("@If(@True(), @Body(), %To)"), MessageTypeHint::Text);
    assert_eq!(hint("@Not(@PartCount())"), MessageTypeHint::All);
}

// ---
// Errors
// ---

#[test]
fn syntax_errors_carry_spans() {
    let error = parse("@Add(1,, 2)").unwrap_err();
    assert_eq!(error.offset(), 7);
    assert!(error.message.starts_with("syntax error"));

    let error = parse("'never closed").unwrap_err();
    assert_eq!(error.message, "unterminated string");

    let error = parse("   ").unwrap_err();
    assert_eq!(error.message, "empty macro");

    let error = parse("/[a-/").unwrap_err();
    assert!(error.message.starts_with("invalid regular expression"));
}

// ---
// Generated round trips
// ---

fn leaf() -> impl Strategy<Value = Rc<Expression>> {
    prop_oneof![
        any::<String>().prop_map(|s| Rc::new(Expression::string(s))),
        any::<u32>().prop_map(|n| Rc::new(Expression::number(n))),
        "[A-Za-z][A-Za-z0-9-]{0,10}".prop_map(|name| Rc::new(Expression::field(name))),
        "[A-Za-z0-9_]{1,6}".prop_map(|name| Rc::new(Expression::variable(name))),
        ("[a-z/]{1,6}", "i?m?s?").prop_map(|(pattern, flags)| {
            Rc::new(Expression::regex(pattern, flags).expect("literal pattern"))
        }),
    ]
}

fn expression() -> impl Strategy<Value = Rc<Expression>> {
    let names = prop_oneof![
        Just("If".to_string()),
        Just("Add".to_string()),
        Just("Concat".to_string()),
        Just("Catch".to_string()),
        Just("ForEach".to_string()),
        "[A-Za-z_][A-Za-z0-9_-]{0,8}",
    ]
    .boxed();
    leaf().prop_recursive(4, 32, 4, move |inner| {
        (names.clone(), prop::collection::vec(inner, 0..4))
            .prop_map(|(name, args)| Rc::new(Expression::call(name, args)))
    })
}

proptest! {
    #[test]
    fn to_text_is_a_fixed_point(tree in expression()) {
        let text = tree.to_text();
        let reparsed = parse(&text).map_err(|e| TestCaseError::fail(format!("{text}: {e}")))?;
        prop_assert_eq!(reparsed.to_text(), text);
    }
}
