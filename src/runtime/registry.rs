//! Function registry: case-insensitive name → [`FunctionDef`].
//!
//! One canonical registry holds every built-in; expression nodes resolve
//! their call target against it when they are built.
//!
//! ```rust
//! use mailmacro::runtime::registry::FunctionRegistry;
//! let registry = FunctionRegistry::global();
//! assert!(registry.lookup("contain").is_some());
//! assert!(registry.lookup("CONTAIN").is_some());
//! assert!(registry.lookup("NoSuchFunction").is_none());
//! ```

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::atoms::{self, FunctionDef};

static GLOBAL_REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::with_builtins);

#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry populated with every standard built-in.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        atoms::register_all_atoms(&mut registry);
        registry
    }

    /// The process-wide registry used when building expression trees.
    pub fn global() -> &'static FunctionRegistry {
        &GLOBAL_REGISTRY
    }

    /// Registers (or replaces) the definition under its name.
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_ascii_lowercase(), def);
    }

    /// Registers an existing definition under an additional name.
    pub fn alias(&mut self, name: &'static str, def: FunctionDef) {
        self.register(FunctionDef { name, ..def });
    }

    pub fn lookup(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_ascii_lowercase())
    }

    pub fn has(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Canonical names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.functions.values().map(|def| def.name).collect();
        names.sort_unstable_by_key(|name| name.to_ascii_lowercase());
        names
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
