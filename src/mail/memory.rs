//! In-memory message store.
//!
//! Messages are parsed once when added; `message(hint)` always hands out the
//! full parse. Folders assign ids in insertion order.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use chrono::{DateTime, FixedOffset, Utc};

use super::{hash_message_id, Account, Document, Folder, MessageFlags, MessageHolder, Part};
use crate::ast::MessageTypeHint;

#[derive(Default)]
pub struct MemoryDocument {
    accounts: RefCell<Vec<Rc<MemoryAccount>>>,
}

impl MemoryDocument {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn add_account(&self, name: &str) -> Rc<MemoryAccount> {
        let account = Rc::new_cyclic(|this| MemoryAccount {
            name: name.to_string(),
            folders: RefCell::new(Vec::new()),
            this: this.clone(),
        });
        self.accounts.borrow_mut().push(Rc::clone(&account));
        account
    }
}

impl Document for MemoryDocument {
    fn account(&self, name: &str) -> Option<Rc<dyn Account>> {
        self.accounts
            .borrow()
            .iter()
            .find(|account| account.name.eq_ignore_ascii_case(name))
            .map(|account| Rc::clone(account) as Rc<dyn Account>)
    }

    fn accounts(&self) -> Vec<Rc<dyn Account>> {
        self.accounts
            .borrow()
            .iter()
            .map(|account| Rc::clone(account) as Rc<dyn Account>)
            .collect()
    }
}

pub struct MemoryAccount {
    name: String,
    folders: RefCell<Vec<Rc<MemoryFolder>>>,
    this: Weak<MemoryAccount>,
}

impl MemoryAccount {
    /// Adds a folder; `full_name` is slash separated (`Inbox/Lists`).
    pub fn add_folder(&self, full_name: &str) -> Rc<MemoryFolder> {
        let folder = Rc::new_cyclic(|this| MemoryFolder {
            full_name: full_name.to_string(),
            account: self.this.clone(),
            messages: RefCell::new(Vec::new()),
            next_id: Cell::new(1),
            this: this.clone(),
        });
        self.folders.borrow_mut().push(Rc::clone(&folder));
        folder
    }
}

impl Account for MemoryAccount {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn folder(&self, full_name: &str) -> Option<Rc<dyn Folder>> {
        self.folders
            .borrow()
            .iter()
            .find(|folder| folder.full_name.eq_ignore_ascii_case(full_name))
            .map(|folder| Rc::clone(folder) as Rc<dyn Folder>)
    }

    fn folders(&self) -> Vec<Rc<dyn Folder>> {
        self.folders
            .borrow()
            .iter()
            .map(|folder| Rc::clone(folder) as Rc<dyn Folder>)
            .collect()
    }
}

pub struct MemoryFolder {
    full_name: String,
    account: Weak<MemoryAccount>,
    messages: RefCell<Vec<Rc<MemoryMessage>>>,
    next_id: Cell<u32>,
    this: Weak<MemoryFolder>,
}

impl MemoryFolder {
    /// Parses `content` as an RFC 822 message and appends it.
    pub fn add_message(&self, content: &str) -> Rc<MemoryMessage> {
        let id = self.next_id.get();
        self.next_id.set(id + 1);

        let part = Part::parse(content);
        let date = part
            .field("Date")
            .and_then(|date| DateTime::parse_from_rfc2822(date.trim()).ok())
            .unwrap_or_else(|| DateTime::<Utc>::default().fixed_offset());
        let message_id = part.field("Message-Id").unwrap_or_default().trim().to_string();
        let reference = parent_reference(&part);

        let message = Rc::new(MemoryMessage {
            id,
            folder: self.this.clone(),
            flags: Cell::new(MessageFlags::empty()),
            date,
            size: u32::try_from(content.len()).unwrap_or(u32::MAX),
            message_id_hash: hash_message_id(&message_id),
            reference_hash: hash_message_id(&reference),
            message_id,
            reference,
            content: Rc::new(part),
            available: Cell::new(true),
            fetches: Cell::new(0),
        });
        self.messages.borrow_mut().push(Rc::clone(&message));
        message
    }

    /// Removes a message; weak references to it go stale.
    pub fn remove_message(&self, id: u32) -> Option<Rc<MemoryMessage>> {
        let mut messages = self.messages.borrow_mut();
        let index = messages.iter().position(|message| message.id == id)?;
        Some(messages.remove(index))
    }
}

/// Last `References` entry, else the first `In-Reply-To` id.
fn parent_reference(part: &Part) -> String {
    let last_reference = part
        .field("References")
        .and_then(|refs| refs.split_whitespace().last());
    let in_reply_to = || {
        part.field("In-Reply-To")
            .and_then(|irt| irt.split_whitespace().find(|token| token.starts_with('<')))
    };
    last_reference
        .or_else(in_reply_to)
        .unwrap_or_default()
        .to_string()
}

impl Folder for MemoryFolder {
    fn name(&self) -> String {
        self.full_name
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string()
    }

    fn full_name(&self) -> String {
        self.full_name.clone()
    }

    fn messages(&self) -> Vec<Rc<dyn MessageHolder>> {
        self.messages
            .borrow()
            .iter()
            .map(|message| Rc::clone(message) as Rc<dyn MessageHolder>)
            .collect()
    }

    fn account(&self) -> Option<Rc<dyn Account>> {
        self.account
            .upgrade()
            .map(|account| account as Rc<dyn Account>)
    }
}

pub struct MemoryMessage {
    id: u32,
    folder: Weak<MemoryFolder>,
    flags: Cell<MessageFlags>,
    date: DateTime<FixedOffset>,
    size: u32,
    message_id_hash: u32,
    reference_hash: u32,
    message_id: String,
    reference: String,
    content: Rc<Part>,
    available: Cell<bool>,
    fetches: Cell<usize>,
}

impl MemoryMessage {
    /// Makes later content fetches fail, as for a message whose body is gone.
    pub fn set_available(&self, available: bool) {
        self.available.set(available);
    }

    /// How many times content has been fetched.
    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

impl MessageHolder for MemoryMessage {
    fn id(&self) -> u32 {
        self.id
    }

    fn flags(&self) -> MessageFlags {
        self.flags.get()
    }

    fn set_flags(&self, flags: MessageFlags, mask: MessageFlags) -> bool {
        let current = self.flags.get();
        self.flags.set((current - mask) | (flags & mask));
        true
    }

    fn date(&self) -> DateTime<FixedOffset> {
        self.date
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn message_id_hash(&self) -> u32 {
        self.message_id_hash
    }

    fn reference_hash(&self) -> u32 {
        self.reference_hash
    }

    fn message_id(&self) -> String {
        self.message_id.clone()
    }

    fn reference(&self) -> String {
        self.reference.clone()
    }

    fn folder(&self) -> Option<Rc<dyn Folder>> {
        self.folder.upgrade().map(|folder| folder as Rc<dyn Folder>)
    }

    fn message(&self, _hint: MessageTypeHint) -> Option<Rc<Part>> {
        if !self.available.get() {
            return None;
        }
        self.fetches.set(self.fetches.get() + 1);
        Some(Rc::clone(&self.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = "Message-Id: <2@example.com>\r\n\
        In-Reply-To: <1@example.com>\r\n\
        Date: Tue, 1 Jul 2003 10:52:37 +0200\r\n\
        Subject: Re: hello\r\n\
        \r\n\
        body\r\n";

    #[test]
    fn headers_feed_identity_and_thread_hashes() {
        let document = MemoryDocument::new();
        let inbox = document.add_account("Main").add_folder("Inbox");
        let message = inbox.add_message(REPLY);

        assert_eq!(message.id(), 1);
        assert_eq!(message.reference(), "<1@example.com>");
        assert_eq!(message.reference_hash(), hash_message_id("1@example.com"));
        assert_eq!(message.date().timestamp(), 1_057_049_557);
        assert_eq!(message.folder().unwrap().full_name(), "Inbox");
        assert_eq!(document.account("main").unwrap().name(), "Main");
    }

    #[test]
    fn references_win_over_in_reply_to() {
        let document = MemoryDocument::new();
        let inbox = document.add_account("Main").add_folder("Inbox");
        let message = inbox.add_message(
            "References: <a@x> <b@x>\nIn-Reply-To: <c@x>\n\nbody\n",
        );
        assert_eq!(message.reference(), "<b@x>");
    }

    #[test]
    fn set_flags_respects_mask() {
        let document = MemoryDocument::new();
        let inbox = document.add_account("Main").add_folder("Inbox");
        let message = inbox.add_message("Subject: x\n\n");
        message.set_flags(MessageFlags::SEEN | MessageFlags::JUNK, MessageFlags::SEEN);
        assert_eq!(message.flags(), MessageFlags::SEEN);
        message.set_flags(MessageFlags::empty(), MessageFlags::SEEN);
        assert_eq!(message.flags(), MessageFlags::empty());
    }
}
