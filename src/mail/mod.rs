//! # Message model collaborators
//!
//! The engine never owns mail storage. It reaches messages, folders and
//! accounts through the narrow traits in this module, so any host store can
//! be plugged in. [`memory`] provides a complete in-memory implementation used
//! by the CLI and the tests.
//!
//! ## Locking
//!
//! The engine does not lock anything. Hosts that evaluate macros which mutate
//! messages (flag setters) must already hold the owning account's lock for the
//! whole evaluation.

use std::rc::Rc;

use bitflags::bitflags;
use chrono::{DateTime, FixedOffset};

use crate::ast::MessageTypeHint;

pub mod address;
pub mod memory;
pub mod part;

pub use part::Part;

bitflags! {
    /// Per-message status bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MessageFlags: u32 {
        const SEEN = 0x0000_0001;
        const REPLIED = 0x0000_0002;
        const FORWARDED = 0x0000_0004;
        const DELETED = 0x0000_0008;
        const DRAFT = 0x0000_0010;
        const MARKED = 0x0000_0020;
        const SENT = 0x0000_0040;
        const JUNK = 0x0000_0080;
        const USER1 = 0x0001_0000;
        const USER2 = 0x0002_0000;
        const USER3 = 0x0004_0000;
        const USER4 = 0x0008_0000;
    }
}

/// A message as stored in a folder: identity, status and lazily fetched content.
pub trait MessageHolder {
    /// Folder-unique, monotonically assigned id (chronological order of arrival).
    fn id(&self) -> u32;

    fn flags(&self) -> MessageFlags;

    /// Sets the bits of `flags` selected by `mask`.
    ///
    /// The caller must hold the owning account's lock.
    fn set_flags(&self, flags: MessageFlags, mask: MessageFlags) -> bool;

    fn date(&self) -> DateTime<FixedOffset>;

    fn size(&self) -> u32;

    /// Hash of this message's `Message-Id`, 0 when it has none.
    fn message_id_hash(&self) -> u32;

    /// Hash of the message id this message refers to, 0 when it has no parent.
    fn reference_hash(&self) -> u32;

    fn message_id(&self) -> String;

    /// The `Message-Id` of the parent: last `References` entry, else `In-Reply-To`.
    fn reference(&self) -> String;

    fn folder(&self) -> Option<Rc<dyn Folder>>;

    /// Fetches the content at (at least) the requested granularity.
    fn message(&self, hint: MessageTypeHint) -> Option<Rc<Part>>;
}

pub trait Folder {
    fn name(&self) -> String;

    /// Slash-separated path from the account root.
    fn full_name(&self) -> String;

    fn messages(&self) -> Vec<Rc<dyn MessageHolder>>;

    fn account(&self) -> Option<Rc<dyn Account>>;
}

pub trait Account {
    fn name(&self) -> String;

    fn folder(&self, full_name: &str) -> Option<Rc<dyn Folder>>;

    fn folders(&self) -> Vec<Rc<dyn Folder>>;
}

/// Registry of all accounts known to the host.
pub trait Document {
    fn account(&self, name: &str) -> Option<Rc<dyn Account>>;

    fn accounts(&self) -> Vec<Rc<dyn Account>>;
}

/// Hashes a message id for the thread index. Angle brackets and surrounding
/// whitespace are ignored; an empty id hashes to 0.
pub fn hash_message_id(message_id: &str) -> u32 {
    let id = normalize_message_id(message_id);
    if id.is_empty() {
        return 0;
    }
    // FNV-1a; 0 is reserved for "no id".
    let hash = id
        .bytes()
        .fold(0x811c_9dc5_u32, |h, b| (h ^ u32::from(b)).wrapping_mul(0x0100_0193));
    if hash == 0 {
        1
    } else {
        hash
    }
}

/// Strips whitespace and the enclosing angle brackets from a message id.
pub fn normalize_message_id(message_id: &str) -> &str {
    let id = message_id.trim();
    let id = id.strip_prefix('<').unwrap_or(id);
    id.strip_suffix('>').unwrap_or(id).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_ignores_brackets() {
        assert_eq!(hash_message_id("<a@b>"), hash_message_id(" a@b "));
        assert_eq!(hash_message_id(""), 0);
        assert_eq!(hash_message_id("<>"), 0);
        assert_ne!(hash_message_id("a@b"), hash_message_id("a@c"));
    }
}
