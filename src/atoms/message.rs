//! # Message Atoms
//!
//! Access to the context message: header fields, body text, MIME parts,
//! identity, location and status flags. Functions that need a message fail
//! with `NoContextMessage` when the context has none.
//!
//! ## Atoms Provided
//!
//! - **Headers**: `Field`, `Header`, `Address`, `Name`
//! - **Content**: `Body`, `Part`, `PartCount`, `Attachment`
//! - **Identity**: `Id`, `Size`, `Date`, `Folder`, `Account`
//! - **Lists**: `Messages`, `Selected`
//! - **Flags**: `Seen`, `Replied`, `Forwarded`, `Sent`, `Draft`, `Marked`,
//!   `Deleted`, `Junk`, `User1`..`User4`
//!
//! Flag setters modify the message and therefore need
//! `ContextFlags::MODIFY`; the host must hold the owning account's lock for
//! the duration of the evaluation.

use std::rc::Rc;

use crate::ast::value::Value;
use crate::ast::MessageTypeHint;
use crate::atoms::helpers::{context_message, opt_bool, part_or_message};
use crate::atoms::{Arity, EagerFn, FunctionDef, Invocation, Param};
use crate::diagnostics::{ErrorCode, Outcome};
use crate::mail::address::parse_address_list;
use crate::mail::{MessageFlags, MessageHolder};
use crate::runtime::context::{Context, ContextFlags};
use crate::runtime::registry::FunctionRegistry;

// ============================================================================
// HEADERS
// ============================================================================

/// A header field of the context message. `%Subject` is shorthand for
/// `@Field('Subject')`.
///
/// Usage: @Field(<name>)
///
///   Returns: Field; false and empty when the header is absent.
pub const ATOM_FIELD: EagerFn = |call, args, context| {
    let name = args[0].string();
    let message = context_message(call, MessageTypeHint::Header, context)?;
    let raw = message.field(&name).map(str::to_string);
    Ok(Value::new_field(name, raw))
};

/// The raw header block.
///
/// Usage: @Header([<part>])
pub const ATOM_HEADER: EagerFn = |call, args, context| {
    let part = part_or_message(call, &args, 0, MessageTypeHint::Header, context)?;
    Ok(Value::new_string(part.header()))
};

/// Addresses of an address field.
///
/// Usage: @Address(<field>)
///
/// Example:
///   @Address(%From) ; => 'alice@example.com'
pub const ATOM_ADDRESS: EagerFn = |call, args, _context| {
    let addresses = match &args[0] {
        Value::Field(field) => field.addresses(),
        Value::String(text) => parse_address_list(text)
            .into_iter()
            .map(|mailbox| mailbox.address)
            .collect(),
        _ => return Err(call.fail_at(ErrorCode::InvalidArgType, 0)),
    };
    Ok(Value::new_address(addresses))
};

/// Display names of an address field; the address stands in for a missing name.
///
/// Usage: @Name(<field>)
///
/// Example:
///   @Name(%From) ; => 'Alice'
pub const ATOM_NAME: EagerFn = |call, args, _context| {
    let names = match &args[0] {
        Value::Field(field) => field.names(),
        Value::String(text) => parse_address_list(text)
            .iter()
            .map(|mailbox| mailbox.display_name().to_string())
            .collect(),
        _ => return Err(call.fail_at(ErrorCode::InvalidArgType, 0)),
    };
    Ok(Value::new_string(names.join(", ")))
};

// ============================================================================
// CONTENT
// ============================================================================

/// Readable body text.
///
/// Usage: @Body([<part>])
pub const ATOM_BODY: EagerFn = |call, args, context| {
    let part = part_or_message(call, &args, 0, MessageTypeHint::Text, context)?;
    Ok(Value::new_string(part.body_text()))
};

/// Child `n` (0-based) of a multipart; a null part when there is none.
///
/// Usage: @Part(<n>, [<part>])
pub const ATOM_PART: EagerFn = |call, args, context| {
    let parent = part_or_message(call, &args, 1, MessageTypeHint::All, context)?;
    Ok(Value::new_part(parent.part(args[0].number() as usize)))
};

/// Usage: @PartCount([<part>])
pub const ATOM_PART_COUNT: EagerFn = |call, args, context| {
    let part = part_or_message(call, &args, 0, MessageTypeHint::All, context)?;
    Ok(Value::new_number(
        u32::try_from(part.part_count()).unwrap_or(u32::MAX),
    ))
};

/// File names of the attachments, comma separated.
///
/// Usage: @Attachment([<part>])
pub const ATOM_ATTACHMENT: EagerFn = |call, args, context| {
    let part = part_or_message(call, &args, 0, MessageTypeHint::All, context)?;
    let names: Vec<String> = part
        .attachments()
        .iter()
        .map(|attachment| attachment.file_name().unwrap_or_default())
        .collect();
    Ok(Value::new_string(names.join(", ")))
};

// ============================================================================
// IDENTITY AND LOCATION
// ============================================================================

/// Usage: @Id()
pub const ATOM_ID: EagerFn = |call, _args, context| {
    Ok(Value::new_number(holder(call, context)?.id()))
};

/// Usage: @Size()
pub const ATOM_SIZE: EagerFn = |call, _args, context| {
    Ok(Value::new_number(holder(call, context)?.size()))
};

/// Usage: @Date()
pub const ATOM_DATE: EagerFn = |call, _args, context| {
    Ok(Value::new_time(holder(call, context)?.date()))
};

/// Name of the context folder, or its full path.
///
/// Usage: @Folder([<full>])
pub const ATOM_FOLDER: EagerFn = |call, args, context| {
    let folder = context
        .folder()
        .ok_or_else(|| call.fail(ErrorCode::NoContextMessage))?;
    let name = if opt_bool(&args, 0, false) {
        folder.full_name()
    } else {
        folder.name()
    };
    Ok(Value::new_string(name))
};

/// Usage: @Account()
pub const ATOM_ACCOUNT: EagerFn = |call, _args, context| {
    let account = context
        .account()
        .ok_or_else(|| call.fail(ErrorCode::NoContextAccount))?;
    Ok(Value::new_string(account.name()))
};

// ============================================================================
// MESSAGE LISTS
// ============================================================================

/// Messages of a folder of the context account (default: the context folder).
///
/// Usage: @Messages([<folder>])
///
/// Example:
///   @ForEach(@Messages('Inbox/Lists'), @Seen(@True()))
pub const ATOM_MESSAGES: EagerFn = |call, args, context| {
    let folder = match args.first() {
        Some(name) => {
            let account = context
                .account()
                .ok_or_else(|| call.fail(ErrorCode::NoContextAccount))?;
            account
                .folder(&name.string())
                .ok_or_else(|| call.fail_at(ErrorCode::InvalidArgValue, 0))?
        }
        None => context
            .folder()
            .ok_or_else(|| call.fail(ErrorCode::NoContextMessage))?,
    };
    let messages = folder.messages().iter().map(Rc::downgrade).collect();
    Ok(Value::new_message_list(messages))
};

/// Usage: @Selected()
pub const ATOM_SELECTED: EagerFn = |_call, _args, context| {
    Ok(Value::new_message_list(context.selected_entries().to_vec()))
};

// ============================================================================
// FLAGS
// ============================================================================

/// Reads, or with an argument sets, the flag bit given by the static parameter.
///
/// Usage: @Seen([<set>]), likewise every flag name
///
///   Returns: Boolean; the flag's (new) state.
///
/// Example:
///   @If(@Junk(), @Deleted(@True()), @False())
pub const ATOM_FLAG: EagerFn = |call, args, context| {
    let Param::Flag(bit) = call.param else {
        return Err(call.fail(ErrorCode::Fail));
    };
    let holder = holder(call, context)?;
    if let Some(set) = args.first().map(Value::boolean) {
        if !context.flags().contains(ContextFlags::MODIFY) {
            return Err(call.fail(ErrorCode::NotModifiable));
        }
        let flags = if set { bit } else { MessageFlags::empty() };
        if !holder.set_flags(flags, bit) {
            return Err(call.fail(ErrorCode::Fail));
        }
        tracing::debug!(message = holder.id(), flag = call.name, set, "changed flag");
    }
    Ok(Value::new_boolean(holder.flags().contains(bit)))
};

fn holder(call: &Invocation<'_>, context: &Context) -> Result<Rc<dyn MessageHolder>, Outcome> {
    context
        .message_holder()
        .cloned()
        .ok_or_else(|| call.fail(ErrorCode::NoContextMessage))
}

// ============================================================================
// REGISTRATION FUNCTION
// ============================================================================

/// Registers the message atoms with the given registry.
pub fn register_message_atoms(registry: &mut FunctionRegistry) {
    use MessageTypeHint::{All, Header, Text};

    registry.register(FunctionDef::eager("Field", Arity::Exact(1), ATOM_FIELD).with_hint(Header));
    registry.register(FunctionDef::eager("Header", Arity::Range(0, 1), ATOM_HEADER).with_hint(Header));
    registry.register(FunctionDef::eager("Address", Arity::Exact(1), ATOM_ADDRESS));
    registry.register(FunctionDef::eager("Name", Arity::Exact(1), ATOM_NAME));

    registry.register(FunctionDef::eager("Body", Arity::Range(0, 1), ATOM_BODY).with_hint(Text));
    registry.register(FunctionDef::eager("Part", Arity::Range(1, 2), ATOM_PART).with_hint(All));
    registry.register(FunctionDef::eager("PartCount", Arity::Range(0, 1), ATOM_PART_COUNT).with_hint(All));
    registry.register(FunctionDef::eager("Attachment", Arity::Range(0, 1), ATOM_ATTACHMENT).with_hint(All));

    registry.register(FunctionDef::eager("Id", Arity::Exact(0), ATOM_ID));
    registry.register(FunctionDef::eager("Size", Arity::Exact(0), ATOM_SIZE));
    registry.register(FunctionDef::eager("Date", Arity::Exact(0), ATOM_DATE));
    registry.register(FunctionDef::eager("Folder", Arity::Range(0, 1), ATOM_FOLDER));
    registry.register(FunctionDef::eager("Account", Arity::Exact(0), ATOM_ACCOUNT));
    registry.register(FunctionDef::eager("Messages", Arity::Range(0, 1), ATOM_MESSAGES));
    registry.register(FunctionDef::eager("Selected", Arity::Exact(0), ATOM_SELECTED));

    for (name, bit) in [
        ("Seen", MessageFlags::SEEN),
        ("Replied", MessageFlags::REPLIED),
        ("Forwarded", MessageFlags::FORWARDED),
        ("Sent", MessageFlags::SENT),
        ("Draft", MessageFlags::DRAFT),
        ("Marked", MessageFlags::MARKED),
        ("Deleted", MessageFlags::DELETED),
        ("Junk", MessageFlags::JUNK),
        ("User1", MessageFlags::USER1),
        ("User2", MessageFlags::USER2),
        ("User3", MessageFlags::USER3),
        ("User4", MessageFlags::USER4),
    ] {
        registry.register(
            FunctionDef::eager(name, Arity::Range(0, 1), ATOM_FLAG).with_param(Param::Flag(bit)),
        );
    }
}
