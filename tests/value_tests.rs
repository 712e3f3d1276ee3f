use std::rc::Rc;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use mailmacro::ast::compile_regex;
use mailmacro::mail::Part;
use mailmacro::Value;
use pretty_assertions::assert_eq;
use proptest::prelude::*;

// ---
// Coercion tables
// ---

#[test]
fn scalar_coercions() {
    let t = Value::new_boolean(true);
    assert_eq!((t.string(), t.number(), t.boolean()), ("true".to_string(), 1, true));

    let n = Value::new_number(0);
    assert_eq!((n.string(), n.number(), n.boolean()), ("0".to_string(), 0, false));

    let s = Value::new_string("  42 apples");
    assert_eq!(s.number(), 42);
    assert!(s.boolean());
    assert_eq!(Value::new_string("apples").number(), 0);
    assert!(!Value::empty_string().boolean());
}

#[test]
fn time_coercions() {
    let time = Utc.with_ymd_and_hms(2024, 10, 1, 7, 30, 0).unwrap().fixed_offset();
    let value = Value::new_time(time);
    assert!(value.string().ends_with("Oct 2024 07:30:00 +0000"));
    assert_eq!(value.number(), 1_727_767_800);
    assert!(value.boolean());

    let before_epoch = DateTime::parse_from_rfc2822("Mon, 1 Jan 1900 00:00:00 +0000").unwrap();
    assert_eq!(Value::new_time(before_epoch).number(), 0);
}

#[test]
fn far_times_still_have_text() {
    let far = Utc.with_ymd_and_hms(12000, 1, 1, 0, 0, 0).unwrap().fixed_offset();
    assert!(Value::new_time(far).string().contains("12000"));

    let ancient = Utc.with_ymd_and_hms(-44, 3, 15, 12, 0, 0).unwrap().fixed_offset();
    let value = Value::new_time(ancient);
    assert!(value.string().ends_with("12:00:00 +0000"));
    assert_eq!(value.number(), 0);
}

#[test]
fn field_coercions() {
    let present = Value::new_field("X-Priority", Some("3 (Normal)".to_string()));
    assert_eq!(present.string(), "3 (Normal)");
    assert_eq!(present.number(), 3);
    assert!(present.boolean());

    let empty_but_present = Value::new_field("X-Empty", Some(String::new()));
    assert!(empty_but_present.boolean());

    let absent = Value::new_field("X-Missing", None);
    assert_eq!(absent.string(), "");
    assert!(!absent.boolean());
}

#[test]
fn field_address_accessors() {
    let value = Value::new_field(
        "To",
        Some("\"Doe, Jane\" <jane@example.com>, bob@example.com (Bob)".to_string()),
    );
    let Value::Field(field) = &value else {
        panic!("not a field");
    };
    assert_eq!(field.addresses(), vec!["jane@example.com", "bob@example.com"]);
    assert_eq!(field.names(), vec!["Doe, Jane", "Bob"]);
}

#[test]
fn composite_coercions() {
    let addresses = Value::new_address(vec!["a@x.org".into(), "b@y.org".into()]);
    assert_eq!(addresses.string(), "a@x.org, b@y.org");
    assert_eq!(addresses.number(), 0);
    assert!(!Value::new_address(Vec::new()).boolean());

    let part = Rc::new(Part::parse("Content-Type: text/plain\r\n\r\nbody text"));
    let handle = Value::new_part(Some(part));
    assert_eq!(handle.string(), "body text");
    assert!(handle.boolean());
    assert!(!Value::new_part(None).boolean());
    assert_eq!(Value::new_part(None).string(), "");

    let regex = Value::new_regex(Rc::new(compile_regex("a+b", "").unwrap()));
    assert!(regex.string().contains("a+b"));
    assert!(regex.boolean());

    assert!(!Value::new_message_list(Vec::new()).boolean());
}

// ---
// Totality
// ---

fn any_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<bool>().prop_map(Value::new_boolean),
        any::<u32>().prop_map(Value::new_number),
        ".*".prop_map(Value::new_string),
        (
            DateTime::<Utc>::MIN_UTC.timestamp() + 86_400..=DateTime::<Utc>::MAX_UTC.timestamp() - 86_400,
            -86_399i32..=86_399i32,
        )
            .prop_filter_map("representable time", |(secs, offset)| {
                let offset = FixedOffset::east_opt(offset)?;
                let time = Utc.timestamp_opt(secs, 0).single()?;
                Some(Value::new_time(time.with_timezone(&offset)))
            }),
        ("[A-Za-z-]{1,12}", proptest::option::of(".*"))
            .prop_map(|(name, raw)| Value::new_field(name, raw)),
        proptest::collection::vec("[a-z]{1,8}@[a-z]{1,8}\\.org", 0..4).prop_map(Value::new_address),
        ".*".prop_map(|body| Value::new_part(Some(Rc::new(Part::parse(&body))))),
        Just(Value::new_part(None)),
        Just(Value::new_message_list(Vec::new())),
    ]
}

proptest! {
    #[test]
    fn coercions_are_total(value in any_value()) {
        let text = value.string();
        let number = value.number();
        let truth = value.boolean();
        // Coercions are pure projections.
        prop_assert_eq!(value.string(), text);
        prop_assert_eq!(value.number(), number);
        prop_assert_eq!(value.boolean(), truth);
    }

    #[test]
    fn number_round_trips_through_string(n in any::<u32>()) {
        prop_assert_eq!(Value::new_string(Value::new_number(n).string()).number(), n);
    }
}
