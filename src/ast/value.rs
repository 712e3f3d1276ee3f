//! Runtime values.
//!
//! A [`Value`] never changes variant after construction. The coercions
//! [`Value::string`], [`Value::number`] and [`Value::boolean`] are read-only
//! projections and are total: every variant answers all three.
//!
//! Composite payloads ([`FieldValue`], [`AddressList`], [`PartValue`],
//! [`MessageList`]) keep their fields private; build values through the
//! `Value::new_*` constructors.

use std::fmt;
use std::rc::{Rc, Weak};

use chrono::{DateTime, FixedOffset};
use once_cell::unsync::OnceCell;
use regex::Regex;

use crate::mail::address::{parse_address_list, Mailbox};
use crate::mail::{MessageHolder, Part};

/// RFC 2822 layout for `Time` text. Years outside 0..=9999 are written as
/// `%Y` renders them rather than rejected.
const RFC2822_FORMAT: &str = "%a, %d %b %Y %H:%M:%S %z";

/// Canonical runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Boolean(bool),
    Number(u32),
    String(String),
    Time(DateTime<FixedOffset>),
    Field(FieldValue),
    Address(AddressList),
    Part(PartValue),
    MessageList(MessageList),
    Regex(Rc<Regex>),
}

// ============================================================================
// CONSTRUCTORS
// ============================================================================

impl Value {
    pub fn new_boolean(value: bool) -> Self {
        Value::Boolean(value)
    }

    pub fn new_number(value: u32) -> Self {
        Value::Number(value)
    }

    pub fn new_string(value: impl Into<String>) -> Self {
        Value::String(value.into())
    }

    pub fn new_time(value: DateTime<FixedOffset>) -> Self {
        Value::Time(value)
    }

    /// A header field; `raw` is `None` when the message has no such header.
    pub fn new_field(name: impl Into<String>, raw: Option<String>) -> Self {
        Value::Field(FieldValue {
            name: name.into(),
            raw,
            mailboxes: Rc::new(OnceCell::new()),
        })
    }

    pub fn new_address(addresses: Vec<String>) -> Self {
        Value::Address(AddressList { addresses })
    }

    /// A part handle; `None` is the valid "null part" state.
    pub fn new_part(part: Option<Rc<Part>>) -> Self {
        Value::Part(PartValue { part })
    }

    pub fn new_message_list(messages: Vec<Weak<dyn MessageHolder>>) -> Self {
        Value::MessageList(MessageList { messages })
    }

    pub fn new_regex(regex: Rc<Regex>) -> Self {
        Value::Regex(regex)
    }

    pub fn empty_string() -> Self {
        Value::String(String::new())
    }
}

// ============================================================================
// COERCIONS
// ============================================================================

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "Boolean",
            Value::Number(_) => "Number",
            Value::String(_) => "String",
            Value::Time(_) => "Time",
            Value::Field(_) => "Field",
            Value::Address(_) => "Address",
            Value::Part(_) => "Part",
            Value::MessageList(_) => "MessageList",
            Value::Regex(_) => "Regex",
        }
    }

    pub fn string(&self) -> String {
        match self {
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::Time(t) => t.format(RFC2822_FORMAT).to_string(),
            Value::Field(f) => f.raw.clone().unwrap_or_default(),
            Value::Address(a) => a.addresses.join(", "),
            Value::Part(p) => p.part.as_ref().map(|part| part.body_text()).unwrap_or_default(),
            Value::MessageList(l) => l
                .iter()
                .map(|holder| holder.id().to_string())
                .collect::<Vec<_>>()
                .join(","),
            Value::Regex(re) => format!("/{}/", re.as_str()),
        }
    }

    pub fn number(&self) -> u32 {
        match self {
            Value::Boolean(b) => u32::from(*b),
            Value::Number(n) => *n,
            Value::String(s) => leading_number(s),
            Value::Time(t) => u32::try_from(t.timestamp().max(0)).unwrap_or(u32::MAX),
            Value::Field(f) => f.raw.as_deref().map(leading_number).unwrap_or(0),
            Value::Address(_) | Value::Part(_) | Value::MessageList(_) | Value::Regex(_) => 0,
        }
    }

    pub fn boolean(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0,
            Value::String(s) => !s.is_empty(),
            Value::Time(_) | Value::Regex(_) => true,
            Value::Field(f) => f.raw.is_some(),
            Value::Address(a) => !a.addresses.is_empty(),
            Value::Part(p) => p.part.is_some(),
            Value::MessageList(l) => !l.messages.is_empty(),
        }
    }

    pub fn as_message_list(&self) -> Option<&MessageList> {
        match self {
            Value::MessageList(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_part(&self) -> Option<&PartValue> {
        match self {
            Value::Part(part) => Some(part),
            _ => None,
        }
    }
}

/// Parses the leading decimal digits (after whitespace); 0 when there are none.
fn leading_number(s: &str) -> u32 {
    let s = s.trim_start();
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len());
    s[..end].parse().unwrap_or(0)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.string())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Time(a), Value::Time(b)) => a == b,
            (Value::Field(a), Value::Field(b)) => a.name == b.name && a.raw == b.raw,
            (Value::Address(a), Value::Address(b)) => a.addresses == b.addresses,
            (Value::Part(a), Value::Part(b)) => match (&a.part, &b.part) {
                (Some(a), Some(b)) => Rc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            },
            (Value::MessageList(a), Value::MessageList(b)) => {
                a.messages.len() == b.messages.len()
                    && a.messages.iter().zip(&b.messages).all(|(x, y)| x.ptr_eq(y))
            }
            (Value::Regex(a), Value::Regex(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

// ============================================================================
// PAYLOADS
// ============================================================================

/// A header field value with lazily parsed address accessors.
#[derive(Debug, Clone)]
pub struct FieldValue {
    name: String,
    raw: Option<String>,
    mailboxes: Rc<OnceCell<Vec<Mailbox>>>,
}

impl FieldValue {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    pub fn mailboxes(&self) -> &[Mailbox] {
        self.mailboxes.get_or_init(|| {
            self.raw
                .as_deref()
                .map(parse_address_list)
                .unwrap_or_default()
        })
    }

    pub fn addresses(&self) -> Vec<String> {
        self.mailboxes()
            .iter()
            .map(|mailbox| mailbox.address.clone())
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.mailboxes()
            .iter()
            .map(|mailbox| mailbox.display_name().to_string())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AddressList {
    addresses: Vec<String>,
}

impl AddressList {
    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }
}

#[derive(Debug, Clone, Default)]
pub struct PartValue {
    part: Option<Rc<Part>>,
}

impl PartValue {
    pub fn part(&self) -> Option<&Rc<Part>> {
        self.part.as_ref()
    }
}

/// Ordered weak references to messages. Entries whose message has gone away
/// are skipped on iteration.
#[derive(Clone, Default)]
pub struct MessageList {
    messages: Vec<Weak<dyn MessageHolder>>,
}

impl MessageList {
    /// Number of entries, including stale ones.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Live messages, in list order.
    pub fn iter(&self) -> impl Iterator<Item = Rc<dyn MessageHolder>> + '_ {
        self.messages.iter().filter_map(Weak::upgrade)
    }

    pub fn entries(&self) -> &[Weak<dyn MessageHolder>] {
        &self.messages
    }
}

impl fmt::Debug for MessageList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.iter().map(|holder| holder.id()))
            .finish()
    }
}
