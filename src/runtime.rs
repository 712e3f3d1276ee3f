//! Runtime module for the macro engine.
//!
//! - **`context`**: per-evaluation state and the shared session behind it
//! - **`eval`**: the tree-walking evaluator
//! - **`registry`**: built-in name resolution
//! - **`config`**, **`profile`**, **`ui`**: host collaborators

pub mod config;
pub mod context;
pub mod eval;
pub mod profile;
pub mod registry;
pub mod ui;

pub use context::{Context, ContextBuilder, ContextFlags};
