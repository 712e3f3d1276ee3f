//! Evaluation context.
//!
//! A [`Context`] is what every evaluation runs against: the message being
//! processed (if any), the selection, the account and folder, permission
//! flags, and a handle on the shared session state.
//!
//! # Session state
//!
//! User functions, global variables, the scope stack, regex captures, the
//! last raised signal and the dispatch depth belong to the *session*, which is
//! shared by a root context and every child created from it with
//! [`Context::child`] (as `@ForEach` does per item). A `@Defun` inside a loop
//! body is therefore visible after the loop.
//!
//! Contexts are single-threaded (`!Send`); a host evaluating macros in
//! parallel builds one root context per thread.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use bitflags::bitflags;

use crate::ast::value::Value;
use crate::ast::{Expression, MessageTypeHint};
use crate::diagnostics::{
    ErrorCode, ErrorHandler, MacroError, Outcome, ReturnType, TracingErrorHandler,
};
use crate::mail::{Account, Document, Folder, MessageHolder, Part};
use crate::runtime::config::EngineConfig;
use crate::runtime::profile::{JsonProfile, Profile};
use crate::runtime::ui::MacroUi;

bitflags! {
    /// What the host permits this evaluation to do.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ContextFlags: u32 {
        /// A UI is available for prompts.
        const UI = 0x01;
        /// Evaluation runs on the UI thread.
        const UI_THREAD = 0x02;
        /// Flag setters may modify messages.
        const MODIFY = 0x04;
        /// Fetch the whole message on first access, whatever the hint.
        const GET_MESSAGE_AS_POSSIBLE = 0x08;
    }
}

// ============================================================================
// SESSION STATE
// ============================================================================

#[derive(Default)]
struct Frame {
    /// Positional arguments of a user-function frame; `$0` is the function name.
    args: Option<Vec<Value>>,
    vars: HashMap<String, Value>,
}

struct Session {
    document: Rc<dyn Document>,
    profile: Rc<dyn Profile>,
    ui: Option<Rc<dyn MacroUi>>,
    error_handler: Rc<dyn ErrorHandler>,
    config: EngineConfig,
    functions: RefCell<HashMap<String, Rc<Expression>>>,
    globals: RefCell<HashMap<String, Value>>,
    frames: RefCell<Vec<Frame>>,
    captures: RefCell<Vec<String>>,
    return_type: Cell<ReturnType>,
    depth: Cell<usize>,
}

/// Pops the frame pushed by [`Context::push_frame`] when dropped.
#[must_use = "the frame is popped as soon as the guard is dropped"]
pub struct FrameGuard {
    session: Rc<Session>,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        self.session.frames.borrow_mut().pop();
    }
}

/// Releases one level of dispatch depth when dropped.
#[must_use = "the depth is released as soon as the guard is dropped"]
pub struct DepthGuard {
    session: Rc<Session>,
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        let depth = self.session.depth.get();
        self.session.depth.set(depth.saturating_sub(1));
    }
}

// ============================================================================
// CONTEXT
// ============================================================================

pub struct Context {
    session: Rc<Session>,
    holder: Option<Rc<dyn MessageHolder>>,
    message: Option<(MessageTypeHint, Rc<Part>)>,
    selected: Vec<Weak<dyn MessageHolder>>,
    account: Option<Rc<dyn Account>>,
    folder: Option<Rc<dyn Folder>>,
    flags: ContextFlags,
    /// Trees parsed at runtime (`@Eval`, `@Include`), alive as long as the context.
    owned: Vec<Rc<Expression>>,
}

impl Context {
    pub fn builder(document: Rc<dyn Document>) -> ContextBuilder {
        ContextBuilder::new(document)
    }

    /// A context for one item of an iteration: same session, account,
    /// selection and flags, but bound to `holder`. The folder is the item's
    /// own, else the parent's.
    pub fn child(&self, holder: Rc<dyn MessageHolder>) -> Context {
        let folder = holder.folder().or_else(|| self.folder());
        Context {
            session: Rc::clone(&self.session),
            holder: Some(holder),
            message: None,
            selected: self.selected.clone(),
            account: self.account(),
            folder,
            flags: self.flags,
            owned: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Message model
    // ------------------------------------------------------------------

    pub fn message_holder(&self) -> Option<&Rc<dyn MessageHolder>> {
        self.holder.as_ref()
    }

    /// The content of the context message, fetched at (at least) `hint`
    /// granularity. A fetch is cached for the lifetime of the context.
    pub fn message(&mut self, hint: MessageTypeHint) -> Result<Rc<Part>, ErrorCode> {
        let holder = self.holder.clone().ok_or(ErrorCode::NoContextMessage)?;
        if let Some((cached, part)) = &self.message {
            if *cached >= hint {
                return Ok(Rc::clone(part));
            }
        }
        let wanted = if self.flags.contains(ContextFlags::GET_MESSAGE_AS_POSSIBLE) {
            MessageTypeHint::All
        } else {
            hint.max(MessageTypeHint::Header)
        };
        let part = holder.message(wanted).ok_or(ErrorCode::GetMessage)?;
        tracing::trace!(message = holder.id(), hint = ?wanted, "fetched message content");
        self.message = Some((wanted, Rc::clone(&part)));
        Ok(part)
    }

    pub fn document(&self) -> Rc<dyn Document> {
        Rc::clone(&self.session.document)
    }

    /// Explicit account, else the account of the context folder.
    pub fn account(&self) -> Option<Rc<dyn Account>> {
        self.account
            .clone()
            .or_else(|| self.folder().and_then(|folder| folder.account()))
    }

    /// Explicit folder, else the folder of the context message.
    pub fn folder(&self) -> Option<Rc<dyn Folder>> {
        self.folder
            .clone()
            .or_else(|| self.holder.as_ref().and_then(|holder| holder.folder()))
    }

    /// Live selected messages, in selection order.
    pub fn selected(&self) -> Vec<Rc<dyn MessageHolder>> {
        self.selected.iter().filter_map(Weak::upgrade).collect()
    }

    pub fn selected_entries(&self) -> &[Weak<dyn MessageHolder>] {
        &self.selected
    }

    pub fn flags(&self) -> ContextFlags {
        self.flags
    }

    // ------------------------------------------------------------------
    // Collaborators
    // ------------------------------------------------------------------

    pub fn profile(&self) -> Rc<dyn Profile> {
        Rc::clone(&self.session.profile)
    }

    pub fn ui(&self) -> Option<Rc<dyn MacroUi>> {
        self.session.ui.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.session.config
    }

    pub fn report_error(&self, error: &MacroError) {
        self.session.error_handler.process_error(error);
    }

    // ------------------------------------------------------------------
    // Variables and frames
    // ------------------------------------------------------------------

    /// Looks a variable up from the innermost frame outwards, then in the
    /// globals. Names are case-insensitive.
    pub fn variable(&self, name: &str) -> Option<Value> {
        let key = name.to_ascii_lowercase();
        let frames = self.session.frames.borrow();
        frames
            .iter()
            .rev()
            .find_map(|frame| frame.vars.get(&key).cloned())
            .or_else(|| self.session.globals.borrow().get(&key).cloned())
    }

    /// Binds `name` in the innermost frame that already defines it, else in
    /// the innermost frame. With `global` it binds in the session globals.
    pub fn set_variable(&self, name: &str, value: Value, global: bool) {
        let key = name.to_ascii_lowercase();
        if global {
            self.session.globals.borrow_mut().insert(key, value);
            return;
        }
        let mut frames = self.session.frames.borrow_mut();
        let index = frames
            .iter()
            .rposition(|frame| frame.vars.contains_key(&key))
            .unwrap_or(frames.len().saturating_sub(1));
        match frames.get_mut(index) {
            Some(frame) => {
                frame.vars.insert(key, value);
            }
            None => {
                self.session.globals.borrow_mut().insert(key, value);
            }
        }
    }

    /// Positional argument `index` of the innermost user-function frame.
    pub fn argument(&self, index: usize) -> Option<Value> {
        let frames = self.session.frames.borrow();
        frames
            .iter()
            .rev()
            .find_map(|frame| frame.args.as_ref())
            .and_then(|args| args.get(index).cloned())
    }

    /// Pushes a scope frame, with positional arguments for user-function calls.
    pub fn push_frame(&self, args: Option<Vec<Value>>) -> FrameGuard {
        self.session.frames.borrow_mut().push(Frame {
            args,
            vars: HashMap::new(),
        });
        FrameGuard {
            session: Rc::clone(&self.session),
        }
    }

    /// Number of frames on the scope stack, the root frame included.
    pub fn frame_depth(&self) -> usize {
        self.session.frames.borrow().len()
    }

    // ------------------------------------------------------------------
    // User functions
    // ------------------------------------------------------------------

    pub fn define_function(&self, name: &str, body: Rc<Expression>) {
        tracing::debug!(function = name, "defined user function");
        self.session
            .functions
            .borrow_mut()
            .insert(name.to_ascii_lowercase(), body);
    }

    pub fn function(&self, name: &str) -> Option<Rc<Expression>> {
        self.session
            .functions
            .borrow()
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    /// Keeps a runtime-parsed tree alive for the lifetime of this context.
    pub fn adopt(&mut self, expression: Rc<Expression>) -> Rc<Expression> {
        self.owned.push(Rc::clone(&expression));
        expression
    }

    // ------------------------------------------------------------------
    // Regex captures
    // ------------------------------------------------------------------

    /// Replaces the captures of the last successful regex match.
    pub fn set_captures(&self, captures: Vec<String>) {
        *self.session.captures.borrow_mut() = captures;
    }

    /// Group `index` of the last match; group 0 is the whole match.
    pub fn capture(&self, index: usize) -> Option<String> {
        self.session.captures.borrow().get(index).cloned()
    }

    // ------------------------------------------------------------------
    // Signals and limits
    // ------------------------------------------------------------------

    pub fn return_type(&self) -> ReturnType {
        self.session.return_type.get()
    }

    pub fn clear_return_type(&self) {
        self.session.return_type.set(ReturnType::None);
    }

    /// Records a signal in the session and returns it as an outcome.
    pub fn raise(&self, signal: ReturnType) -> Outcome {
        self.session.return_type.set(signal);
        match signal {
            ReturnType::Cancel => Outcome::Cancel,
            ReturnType::Exit => Outcome::Exit,
            ReturnType::None => Outcome::Error(MacroError::new(ErrorCode::Fail)),
        }
    }

    /// Enters one level of function dispatch, failing past the configured limit.
    pub fn enter(&self) -> Result<DepthGuard, MacroError> {
        let depth = self.session.depth.get() + 1;
        let max_depth = self.session.config.limits.max_depth;
        if depth > max_depth {
            return Err(MacroError::new(ErrorCode::Fail)
                .with_detail(format!("recursion limit of {max_depth} exceeded")));
        }
        self.session.depth.set(depth);
        Ok(DepthGuard {
            session: Rc::clone(&self.session),
        })
    }

    pub fn depth(&self) -> usize {
        self.session.depth.get()
    }
}

// ============================================================================
// BUILDER
// ============================================================================

pub struct ContextBuilder {
    document: Rc<dyn Document>,
    holder: Option<Rc<dyn MessageHolder>>,
    selected: Vec<Weak<dyn MessageHolder>>,
    account: Option<Rc<dyn Account>>,
    folder: Option<Rc<dyn Folder>>,
    flags: ContextFlags,
    profile: Option<Rc<dyn Profile>>,
    ui: Option<Rc<dyn MacroUi>>,
    error_handler: Option<Rc<dyn ErrorHandler>>,
    config: EngineConfig,
}

impl ContextBuilder {
    pub fn new(document: Rc<dyn Document>) -> Self {
        Self {
            document,
            holder: None,
            selected: Vec::new(),
            account: None,
            folder: None,
            flags: ContextFlags::empty(),
            profile: None,
            ui: None,
            error_handler: None,
            config: EngineConfig::default(),
        }
    }

    pub fn message(mut self, holder: Rc<dyn MessageHolder>) -> Self {
        self.holder = Some(holder);
        self
    }

    pub fn selected(mut self, messages: &[Rc<dyn MessageHolder>]) -> Self {
        self.selected = messages.iter().map(Rc::downgrade).collect();
        self
    }

    pub fn account(mut self, account: Rc<dyn Account>) -> Self {
        self.account = Some(account);
        self
    }

    pub fn folder(mut self, folder: Rc<dyn Folder>) -> Self {
        self.folder = Some(folder);
        self
    }

    pub fn flags(mut self, flags: ContextFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn profile(mut self, profile: Rc<dyn Profile>) -> Self {
        self.profile = Some(profile);
        self
    }

    pub fn ui(mut self, ui: Rc<dyn MacroUi>) -> Self {
        self.ui = Some(ui);
        self
    }

    pub fn error_handler(mut self, handler: Rc<dyn ErrorHandler>) -> Self {
        self.error_handler = Some(handler);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Context {
        let session = Session {
            document: self.document,
            profile: self
                .profile
                .unwrap_or_else(|| Rc::new(JsonProfile::in_memory("default"))),
            ui: self.ui,
            error_handler: self
                .error_handler
                .unwrap_or_else(|| Rc::new(TracingErrorHandler)),
            config: self.config,
            functions: RefCell::new(HashMap::new()),
            globals: RefCell::new(HashMap::new()),
            frames: RefCell::new(vec![Frame::default()]),
            captures: RefCell::new(Vec::new()),
            return_type: Cell::new(ReturnType::None),
            depth: Cell::new(0),
        };
        Context {
            session: Rc::new(session),
            holder: self.holder,
            message: None,
            selected: self.selected,
            account: self.account,
            folder: self.folder,
            flags: self.flags,
            owned: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::memory::MemoryDocument;

    fn context() -> Context {
        Context::builder(MemoryDocument::new()).build()
    }

    #[test]
    fn frames_shadow_and_pop() {
        let ctx = context();
        ctx.set_variable("X", Value::new_number(1), false);
        {
            let _frame = ctx.push_frame(Some(vec![Value::new_string("F")]));
            assert_eq!(ctx.variable("x"), Some(Value::new_number(1)));
            ctx.set_variable("x", Value::new_number(2), false);
            ctx.set_variable("y", Value::new_number(3), false);
            assert_eq!(ctx.argument(0), Some(Value::new_string("F")));
            assert_eq!(ctx.frame_depth(), 2);
        }
        assert_eq!(ctx.frame_depth(), 1);
        assert_eq!(ctx.variable("X"), Some(Value::new_number(2)));
        assert_eq!(ctx.variable("y"), None);
        assert_eq!(ctx.argument(0), None);
    }

    #[test]
    fn depth_is_bounded() {
        let config = EngineConfig {
            limits: crate::runtime::config::EvalLimits {
                max_depth: 2,
                max_iterations: None,
            },
            ..EngineConfig::default()
        };
        let ctx = Context::builder(MemoryDocument::new()).config(config).build();
        let first = ctx.enter().unwrap();
        let _second = ctx.enter().unwrap();
        assert!(ctx.enter().is_err());
        drop(first);
        assert_eq!(ctx.depth(), 1);
    }

    #[test]
    fn no_message_without_holder() {
        let mut ctx = context();
        assert_eq!(
            ctx.message(MessageTypeHint::Header).err(),
            Some(ErrorCode::NoContextMessage)
        );
    }

    #[test]
    fn message_fetch_is_cached() {
        let document = MemoryDocument::new();
        let inbox = document.add_account("Main").add_folder("Inbox");
        let message = inbox.add_message("Subject: hi\n\nbody\n");
        let mut ctx = Context::builder(document)
            .message(message.clone())
            .build();
        ctx.message(MessageTypeHint::Header).unwrap();
        ctx.message(MessageTypeHint::Header).unwrap();
        assert_eq!(message.fetch_count(), 1);
        ctx.message(MessageTypeHint::All).unwrap();
        assert_eq!(message.fetch_count(), 2);
        assert_eq!(ctx.folder().unwrap().name(), "Inbox");
        assert_eq!(ctx.account().unwrap().name(), "Main");
    }

    #[test]
    fn children_keep_account_and_fall_back_to_parent_folder() {
        let document = MemoryDocument::new();
        let account = document.add_account("Main");
        let inbox = account.add_folder("Inbox");
        let archive = account.add_folder("Archive");
        let parent = Context::builder(document)
            .account(account)
            .folder(inbox.clone())
            .flags(ContextFlags::MODIFY)
            .build();

        let archived = archive.add_message("Subject: old\n\n");
        let child = parent.child(archived);
        assert_eq!(child.folder().unwrap().name(), "Archive");
        assert_eq!(child.account().unwrap().name(), "Main");
        assert!(child.flags().contains(ContextFlags::MODIFY));

        // An item whose folder is gone inherits the parent's folder.
        let detached = {
            let elsewhere = MemoryDocument::new();
            elsewhere
                .add_account("Other")
                .add_folder("Gone")
                .add_message("Subject: lost\n\n")
        };
        assert!(detached.folder().is_none());
        let child = parent.child(detached);
        assert_eq!(child.folder().unwrap().name(), "Inbox");
    }
}
