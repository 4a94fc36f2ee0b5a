//! Compile-session state: scope identities and per-session caches
//!
//! The original design kept the selector-rewrite cache, the scope-id
//! collision registry and the literal cache process-wide. Here they live on
//! an explicit `CompileSession` owned by a `Compiler` instance, so repeated
//! compiles stay fast while unrelated compiles stay independent.

use serde_json::Value;
use std::collections::HashMap;

/// Length of the hex token used for scope and instance ids.
const ID_LEN: usize = 6;

/// Derive the scope id for a component name. Pure function: equal names
/// always yield equal ids.
pub fn scope_id(name: &str) -> String {
    let digest = md5::compute(name.as_bytes());
    hex::encode(digest.0)[..ID_LEN].to_string()
}

/// Derive the instance id shared by all occurrences of one import
/// declaration, from the import alias and the importing component's scope.
pub fn instance_id(alias: &str, importing_scope: &str) -> String {
    let digest = md5::compute(format!("{}:{}", alias, importing_scope).as_bytes());
    hex::encode(digest.0)[..ID_LEN].to_string()
}

/// The scope marker attribute injected onto HTML elements and prefixed
/// onto CSS selectors.
pub fn scope_marker(scope_id: &str) -> String {
    format!("data-fx-{}", scope_id)
}

/// Registry of scope ids seen this session. Two *different* component
/// names hashing to the same id is reported as a collision; re-registering
/// the same name is not.
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    by_id: HashMap<String, String>,
    order: Vec<String>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a (scope id, component name) pair. Returns `true` when the
    /// id is already claimed by a different component name.
    pub fn register(&mut self, id: &str, name: &str) -> bool {
        match self.by_id.get(id) {
            Some(existing) if existing != name => true,
            Some(_) => false,
            None => {
                self.by_id.insert(id.to_string(), name.to_string());
                self.order.push(name.to_string());
                false
            }
        }
    }

    /// All registered component names, in registration order.
    pub fn components(&self) -> &[String] {
        &self.order
    }

    /// The name that owns a scope id, if any.
    pub fn owner(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }
}

/// Mutable caches shared by every compile performed through one `Compiler`.
#[derive(Debug, Default)]
pub struct CompileSession {
    pub scope_registry: ScopeRegistry,
    /// (marker, raw selector) -> rewritten selector.
    pub selector_cache: HashMap<(String, String), String>,
    /// Raw literal text -> parsed value (None caches a parse failure).
    pub literal_cache: HashMap<String, Option<Value>>,
}

impl CompileSession {
    pub fn new() -> Self {
        Self::default()
    }
}
