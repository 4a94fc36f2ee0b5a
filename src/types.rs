//! Shared data model for the Fuse compilation pipeline

use crate::error::Warning;
use serde::Serialize;
use serde_json::Value;

/// A parsed `.fuse` source file, immutable after section splitting.
#[derive(Debug, Clone)]
pub struct ParsedComponent {
    /// Component name, derived from the file stem (Counter.fuse -> Counter).
    pub name: String,
    /// Raw script section text (empty if absent).
    pub script: String,
    /// Raw template section text (empty if absent).
    pub template: String,
    /// Raw style section text (empty if absent).
    pub style: String,
    /// True unless the source carried a bare `<style>` without `isolated`.
    /// Absence of a style section defaults to isolated.
    pub style_isolated: bool,
    /// (import alias, import path) pairs in source order.
    pub imports: Vec<(String, String)>,
    /// Deterministic scope identifier derived from the component name.
    pub scope_id: String,
    /// Raw store section text, if present.
    pub store: Option<String>,
    pub is_store: bool,
}

/// One declaration inside a CSS rule body.
#[derive(Debug, Clone, PartialEq)]
pub struct CssProperty {
    pub name: String,
    pub value: String,
}

/// A structural CSS rule record produced by the CSS parser.
///
/// Rules nested inside an `@`-rule body carry the prelude verbatim in
/// `at_prelude`; standalone at-rules (`@import ...;`) have a prelude and no
/// selectors.
#[derive(Debug, Clone, PartialEq)]
pub struct CssRule {
    pub selectors: Vec<String>,
    pub properties: Vec<CssProperty>,
    pub at_prelude: Option<String>,
}

/// A template interpolation span resolved by the reference parser.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateRef {
    /// Byte span of the full match in the template text.
    pub start: usize,
    pub end: usize,
    /// The full matched text, braces included.
    pub raw: String,
    /// The trimmed inner expression.
    pub expr: String,
    /// False for `{{{expr}}}` and `{{@expr}}` spellings.
    pub escaped: bool,
    /// Base variable name when the expression resolves to one.
    pub base: Option<String>,
    /// Property-path segments for plain access chains; empty for calls.
    pub path: Vec<String>,
}

/// A reactive state variable discovered in the script section.
#[derive(Debug, Clone)]
pub struct ReactiveVariable {
    pub name: String,
    /// Raw initializer text from the `wrap(...)` declaration.
    pub initializer: String,
    /// Compile-time value when the initializer parsed as a literal
    /// (external props overrides already applied).
    pub initial: Option<Value>,
    pub is_object: bool,
    /// Property paths accessed from the template; each one gets a
    /// dedicated property setter in addition to the whole-value accessor.
    pub paths: Vec<Vec<String>>,
}

/// A computed (derived, memoized) variable.
#[derive(Debug, Clone)]
pub struct ComputedVariable {
    pub name: String,
    /// Expression body of the arrow function.
    pub expr: String,
    /// Author-declared dependency list, when given.
    pub explicit_deps: Option<Vec<String>>,
    /// Resolved dependencies (explicit or inferred), reactive and computed.
    pub deps: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    Mount,
    Destroy,
    Update,
}

impl HookKind {
    pub fn callee(&self) -> &'static str {
        match self {
            HookKind::Mount => "mount",
            HookKind::Destroy => "destroy",
            HookKind::Update => "update",
        }
    }
}

/// A lifecycle hook pulled out of the script section.
#[derive(Debug, Clone)]
pub struct LifecycleHook {
    pub kind: HookKind,
    /// The callback argument text, exactly as written.
    pub body: String,
    /// Byte offset of the hook call in the script.
    pub offset: usize,
}

/// A fully resolved and compiled import.
#[derive(Debug, Clone)]
pub struct ResolvedImport {
    /// The alias used in the template (`<Counter/>`).
    pub alias: String,
    pub component: ParsedComponent,
    pub output: CompileResult,
    /// Deterministic id shared by every usage of this import declaration;
    /// per-usage identity appends an occurrence index.
    pub instance_id: String,
}

/// Component metadata attached to a compile result.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ComponentMetadata {
    pub name: String,
    pub scope_id: String,
    /// Aliases of resolved child components, in import order.
    pub children: Vec<String>,
}

/// The three output artifacts plus diagnostics. Owned by the caller.
#[derive(Debug, Clone)]
pub struct CompileResult {
    pub html: String,
    pub css: String,
    /// Complete glue code: hoisted imports followed by the body.
    pub js: String,
    /// Hoisted import statements, for downstream bundling.
    pub js_imports: String,
    /// The glue code body without hoisted imports.
    pub js_body: String,
    pub metadata: ComponentMetadata,
    pub warnings: Vec<Warning>,
}

impl CompileResult {
    pub fn empty(metadata: ComponentMetadata) -> Self {
        Self {
            html: String::new(),
            css: String::new(),
            js: String::new(),
            js_imports: String::new(),
            js_body: String::new(),
            metadata,
            warnings: Vec::new(),
        }
    }
}
