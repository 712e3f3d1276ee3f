//! # Shared test fixtures
//!
//! An in-memory mailbox with a small conversation, plus helpers to parse and
//! evaluate macros against it.

#![allow(dead_code)]

use std::rc::Rc;

use mailmacro::mail::memory::{MemoryAccount, MemoryDocument, MemoryFolder, MemoryMessage};
use mailmacro::mail::MessageHolder;
use mailmacro::{Context, ContextBuilder, ContextFlags, Macro, MacroResult};

pub const ROOT: &str = "\
From: Alice Example <alice@example.com>\r
To: Bob <bob@example.com>, carol@example.com\r
Subject: Quarterly report\r
Date: Tue, 1 Oct 2024 09:30:00 +0200\r
Message-Id: <root@example.com>\r
\r
Hello Bob,\r
the report is attached.\r
";

pub const REPLY: &str = "\
From: Bob <bob@example.com>\r
To: Alice Example <alice@example.com>\r
Subject: Re: Quarterly report\r
Date: Tue, 1 Oct 2024 10:00:00 +0200\r
Message-Id: <reply@example.com>\r
In-Reply-To: <root@example.com>\r
References: <root@example.com>\r
\r
Thanks!\r
";

pub const NESTED: &str = "\
From: carol@example.com\r
Subject: Re: Re: Quarterly report\r
Date: Tue, 1 Oct 2024 11:00:00 +0200\r
Message-Id: <nested@example.com>\r
References: <root@example.com> <reply@example.com>\r
\r
Agreed.\r
";

pub const UNRELATED: &str = "\
From: \"Lists\" <lists@example.org>\r
Subject: [announce] New release\r
Date: Wed, 2 Oct 2024 08:00:00 +0000\r
Message-Id: <announce@example.org>\r
\r
Version 2 is out.\r
";

pub const WITH_ATTACHMENT: &str = "\
From: Dave <dave@example.net>\r
Subject: Photos\r
Message-Id: <photos@example.net>\r
MIME-Version: 1.0\r
Content-Type: multipart/mixed; boundary=\"SEP\"\r
\r
--SEP\r
Content-Type: text/plain\r
\r
See attached.\r
--SEP\r
Content-Type: image/jpeg\r
Content-Disposition: attachment; filename=\"beach.jpg\"\r
\r
AAAA\r
--SEP--\r
";

/// One account, `Work`, with folders `Inbox` and `Archive`.
///
/// `Inbox` holds ROOT, REPLY, UNRELATED and WITH_ATTACHMENT (ids 1..=4);
/// `Archive` holds NESTED (id 1).
pub struct Mailbox {
    pub document: Rc<MemoryDocument>,
    pub account: Rc<MemoryAccount>,
    pub inbox: Rc<MemoryFolder>,
    pub archive: Rc<MemoryFolder>,
    pub root: Rc<MemoryMessage>,
    pub reply: Rc<MemoryMessage>,
    pub unrelated: Rc<MemoryMessage>,
    pub with_attachment: Rc<MemoryMessage>,
    pub nested: Rc<MemoryMessage>,
}

impl Mailbox {
    pub fn new() -> Self {
        let document = MemoryDocument::new();
        let account = document.add_account("Work");
        let inbox = account.add_folder("Inbox");
        let archive = account.add_folder("Archive");
        let root = inbox.add_message(ROOT);
        let reply = inbox.add_message(REPLY);
        let unrelated = inbox.add_message(UNRELATED);
        let with_attachment = inbox.add_message(WITH_ATTACHMENT);
        let nested = archive.add_message(NESTED);
        Self {
            document,
            account,
            inbox,
            archive,
            root,
            reply,
            unrelated,
            with_attachment,
            nested,
        }
    }

    /// The inbox messages, in folder order.
    pub fn inbox_messages(&self) -> Vec<Rc<dyn MessageHolder>> {
        use mailmacro::mail::Folder;
        self.inbox.messages()
    }

    /// A builder over this mailbox with `message` as the context message and
    /// the whole inbox selected.
    pub fn builder(&self, message: &Rc<MemoryMessage>) -> ContextBuilder {
        Context::builder(self.document.clone())
            .account(self.account.clone())
            .message(message.clone())
            .selected(&self.inbox_messages())
    }

    pub fn context(&self, message: &Rc<MemoryMessage>) -> Context {
        self.builder(message).build()
    }

    pub fn modifiable_context(&self, message: &Rc<MemoryMessage>) -> Context {
        self.builder(message).flags(ContextFlags::MODIFY).build()
    }
}

/// A context without any mail at all.
pub fn empty_context() -> Context {
    Context::builder(MemoryDocument::new()).build()
}

/// Parses and evaluates `text`, panicking on a syntax error.
pub fn eval(text: &str, context: &mut Context) -> MacroResult {
    let parsed = Macro::parse(text).unwrap_or_else(|e| panic!("{text}: {e}"));
    parsed.value(context)
}

/// Evaluates `text` and returns its string value, panicking on failure.
pub fn eval_string(text: &str, context: &mut Context) -> String {
    match eval(text, context) {
        Ok(value) => value.string(),
        Err(outcome) => panic!("{text}: {outcome}"),
    }
}
