//! Fuse Component Compiler
//!
//! An ahead-of-time compiler for `.fuse` single-file UI components that
//! produces three static artifacts: an HTML fragment, a scoped stylesheet
//! and runtime-free JS glue wiring reactive state to DOM updates.
//!
//! # Features
//!
//! - Section splitting (script / template / style / store) with import
//!   declarations
//! - Hand-rolled structural CSS parsing and per-component scope rewriting
//! - Compile-time constant extraction with external props overrides
//! - Reactive accessors, DOM patchers and per-path property setters
//! - Computed properties with memoized getters and cascading invalidation
//! - Lifecycle hooks (mount / destroy / update)
//! - Conditional and loop directives, inline event handler rewriting
//! - Recursive cross-file import resolution with cycle detection and
//!   deterministic per-usage instance identity
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use fusec::{compile_file, Result};
//!
//! fn main() -> Result<()> {
//!     let result = compile_file("App.fuse")?;
//!     println!("{}", result.html);
//!     Ok(())
//! }
//! ```
//!
//! # Compilation Pipeline
//!
//! 1. **Sections**: split script/template/style/store, scan imports
//! 2. **Imports**: resolve, cycle-check and recursively compile children
//! 3. **Constants**: extract literal initial values, merge props
//! 4. **References**: parse template interpolation spans
//! 5. **Lifecycle**: extract hook bodies (before any rewriting)
//! 6. **Reactivity**: accessor/updater codegen plus the mutation rewrite
//! 7. **Computed**: dependency graph, memoized getters, cascade wiring
//! 8. **Directives & events**: template-side compilation
//! 9. **CSS**: leak heuristics, scoping, child merge
//! 10. **Assembly**: artifact merge and optional minification

pub mod computed;
pub mod constants;
pub mod css_parser;
pub mod css_scoper;
pub mod directives;
pub mod error;
pub mod events;
pub mod imports;
pub mod lifecycle;
pub mod minify;
pub mod reactivity;
pub mod script;
pub mod section;
pub mod session;
pub mod template;
pub mod types;
pub mod utils;

pub mod cli;

use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

// Re-export commonly used types and functions
pub use constants::{parse_literal, ConstValue, ConstantExtractor};
pub use error::{CompilerError, Result, Warning};
pub use section::SectionSplitter;
pub use session::{instance_id, scope_id, scope_marker, CompileSession, ScopeRegistry};
pub use types::{
    CompileResult, ComponentMetadata, ComputedVariable, CssProperty, CssRule, HookKind,
    LifecycleHook, ParsedComponent, ReactiveVariable, ResolvedImport, TemplateRef,
};

/// Compiler version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Compilation options and settings
#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    /// Minify every output artifact.
    pub minify: bool,

    /// Per-artifact minify switches, OR-ed with `minify`.
    pub minify_html: bool,
    pub minify_css: bool,
    pub minify_js: bool,

    /// Surface warnings through the logger in addition to the result.
    pub dev_mode: bool,

    /// Externally supplied override values (route params, props). These
    /// take precedence over extracted constants of the same name.
    pub props: HashMap<String, Value>,
}

/// A compiler instance owning the session caches. Compiles performed
/// through one instance share the selector cache, the scope-id collision
/// registry and the literal cache; separate instances are fully
/// independent.
pub struct Compiler {
    options: CompilerOptions,
    session: CompileSession,
}

impl Compiler {
    pub fn new() -> Self {
        Self::with_options(CompilerOptions::default())
    }

    pub fn with_options(options: CompilerOptions) -> Self {
        Self {
            options,
            session: CompileSession::new(),
        }
    }

    pub fn session(&self) -> &CompileSession {
        &self.session
    }

    /// Compile a `.fuse` file from disk.
    pub fn compile_file(&mut self, path: &str) -> Result<CompileResult> {
        let source = fs::read_to_string(path)?;
        let mut visited = Vec::new();
        if let Ok(canonical) = fs::canonicalize(path) {
            visited.push(canonical);
        }
        let mut import_cache = HashMap::new();
        self.compile_inner(&source, path, &mut visited, &mut import_cache)
    }

    /// Compile source text. `filename` provides the component name and the
    /// base for import resolution.
    pub fn compile_source(&mut self, source: &str, filename: &str) -> Result<CompileResult> {
        let mut visited = Vec::new();
        let mut import_cache = HashMap::new();
        self.compile_inner(source, filename, &mut visited, &mut import_cache)
    }

    fn compile_inner(
        &mut self,
        source: &str,
        filename: &str,
        visited: &mut Vec<PathBuf>,
        import_cache: &mut HashMap<PathBuf, (ParsedComponent, CompileResult)>,
    ) -> Result<CompileResult> {
        log::debug!("compiling '{}' ({} bytes)", filename, source.len());

        // Phase 1: section splitting.
        let split = SectionSplitter::new().split(source, filename)?;
        let component = split.component;
        let mut warnings = split.warnings;

        // Scope-id collision check: a warning, never silently resolved.
        if self
            .session
            .scope_registry
            .register(&component.scope_id, &component.name)
        {
            let owner = self
                .session
                .scope_registry
                .owner(&component.scope_id)
                .unwrap_or("<unknown>")
                .to_string();
            warnings.push(
                Warning::new(format!(
                    "scope id '{}' for component '{}' collides with component '{}'",
                    component.scope_id, component.name, owner
                ))
                .with_file(filename)
                .with_suggestion("rename one of the components"),
            );
        }

        // Store files carry no template or style; the body becomes the JS
        // artifact directly.
        if component.is_store {
            log::debug!("'{}' is a store component", component.name);
            let store_body = component.store.clone().unwrap_or_default();
            let normalized = script::ScriptNormalizer::new().normalize(&store_body, filename)?;
            let metadata = ComponentMetadata {
                name: component.name.clone(),
                scope_id: component.scope_id.clone(),
                children: Vec::new(),
            };
            let mut result = CompileResult::empty(metadata);
            result.js_imports = normalized.imports.clone();
            result.js_body = normalized.body.clone();
            result.js = assemble_js(&normalized.imports, &normalized.body);
            result.warnings = warnings;
            return Ok(result);
        }

        // Phase 2: import resolution (recursive, cycle-checked).
        let resolved_imports =
            self.resolve_imports(&component, filename, visited, import_cache)?;
        for import in &resolved_imports {
            warnings.extend(import.output.warnings.iter().cloned());
        }

        // Phase 3: script normalization (comment strip + import hoist),
        // so every later scan sees clean text.
        let normalized =
            script::ScriptNormalizer::new().normalize(&component.script, filename)?;

        // Phase 4: constant extraction, props overrides included.
        let constant_set =
            ConstantExtractor::new().extract(&normalized.body, &self.options.props, &mut self.session);

        // Phase 5: template reference parsing.
        let refs = template::parse_refs(&component.template);

        // Phase 6: lifecycle hooks come out before any rewriting, so
        // callback text is never transformed.
        let (script_no_hooks, hooks) = lifecycle::extract_hooks(&normalized.body);
        let has_update_hooks = hooks.iter().any(|h| h.kind == HookKind::Update);

        // Phase 7: computed and reactive declarations come out next.
        let (script_no_computed, mut computeds) = computed::extract_computed(&script_no_hooks);
        let declarations = reactivity::find_reactive_declarations(&script_no_computed);
        let script_rest = reactivity::strip_declarations(&script_no_computed, &declarations);

        let reactive_names: HashSet<String> =
            declarations.iter().map(|d| d.name.clone()).collect();
        let computed_names: HashSet<String> =
            computeds.iter().map(|c| c.name.clone()).collect();
        let all_names: HashSet<String> =
            reactive_names.union(&computed_names).cloned().collect();

        log::debug!(
            "'{}': {} reactive, {} computed, {} hooks, {} refs",
            component.name,
            reactive_names.len(),
            computed_names.len(),
            hooks.len(),
            refs.len()
        );

        // Phase 8: the mutation rewrite over the remaining script.
        let rewritten_script = reactivity::rewrite_mutations(script_rest.trim(), &all_names);

        // Phase 9: reactive codegen.
        let transformer =
            reactivity::ReactivityTransformer::new(&component.scope_id, has_update_hooks);
        let variables = transformer.build_variables(&declarations, &constant_set, &refs);
        let reactive_js = transformer.generate(&variables);

        // Phase 10: computed codegen and cascade wiring.
        computed::resolve_dependencies(&mut computeds, &reactive_names);
        let computed_engine = computed::ComputedEngine::new(&component.scope_id);
        let computed_js = computed_engine.generate(&computeds);
        let computed_wiring = computed_engine.generate_wiring(&computeds, &reactive_names);

        // Phase 11: template-side compilation: directives, then event
        // handlers, then interpolations, then scope markers, then child
        // usages.
        let mut directive_compiler =
            directives::DirectiveCompiler::new(&component.scope_id, &all_names);
        let html = directive_compiler.compile(&component.template);

        let (html, events_js) =
            events::EventHandlerCompiler::new(&component.scope_id, &all_names).compile(&html);

        let html = template::TemplateCompiler::new(filename).render_interpolations(
            &html,
            &template::parse_refs(&html),
            &reactive_names,
            &computed_names,
            &constant_set,
            &mut warnings,
        );
        let mut html = template::inject_scope_markers(&html, &component.scope_id);

        for import in &resolved_imports {
            let (substituted, usage_count) = imports::substitute_usages(&html, import);
            html = substituted;
            log::debug!(
                "'{}': substituted {} usage(s) of <{}>",
                component.name,
                usage_count,
                import.alias
            );
        }

        // Phase 12: CSS leak heuristics and scoping.
        warnings.extend(css_scoper::detect_css_leaks(
            &component.style,
            component.style_isolated,
            resolved_imports.len(),
            filename,
        ));
        let child_markers: Vec<String> = resolved_imports
            .iter()
            .map(|import| scope_marker(&import.component.scope_id))
            .collect();
        let own_css = css_scoper::CssScoper::new(&mut self.session).scope_stylesheet(
            &component.style,
            &component.scope_id,
            component.style_isolated,
            &child_markers,
        );

        // Phase 13: assembly.
        let js_body = assemble_body(
            &component.name,
            &lifecycle::generate_declarations(&hooks),
            &reactive_js,
            &computed_js,
            directive_compiler.functions_js(),
            &computed_wiring,
            directive_compiler.wiring_js(),
            &rewritten_script,
            &events_js,
            directive_compiler.init_js(),
            &lifecycle::generate_execution(&hooks),
        );

        let css = imports::merge_css(&own_css, &resolved_imports);
        let js_imports = imports::merge_js_imports(&normalized.imports, &resolved_imports);
        let js_body = imports::merge_js_bodies(&js_body, &resolved_imports);
        let js = assemble_js(&js_imports, &js_body);

        let metadata = ComponentMetadata {
            name: component.name.clone(),
            scope_id: component.scope_id.clone(),
            children: resolved_imports
                .iter()
                .map(|import| import.alias.clone())
                .collect(),
        };

        let minify_html = self.options.minify || self.options.minify_html;
        let minify_css = self.options.minify || self.options.minify_css;
        let minify_js = self.options.minify || self.options.minify_js;

        if self.options.dev_mode {
            for warning in &warnings {
                log::warn!("{}", warning);
            }
        }

        Ok(CompileResult {
            html: if minify_html { minify::minify_html(&html) } else { html },
            css: if minify_css { minify::minify_css(&css) } else { css },
            js: if minify_js { minify::minify_js(&js) } else { js },
            js_imports,
            js_body,
            metadata,
            warnings,
        })
    }

    /// Resolve, cycle-check and recursively compile every import of a
    /// component. Results are cached by canonical path for the duration of
    /// one top-level compile call.
    fn resolve_imports(
        &mut self,
        component: &ParsedComponent,
        filename: &str,
        visited: &mut Vec<PathBuf>,
        import_cache: &mut HashMap<PathBuf, (ParsedComponent, CompileResult)>,
    ) -> Result<Vec<ResolvedImport>> {
        let mut resolved = Vec::new();

        for (alias, import_path) in &component.imports {
            let resolved_path = imports::resolve_path(filename, import_path);
            let display_path = resolved_path.display().to_string();

            let outcome = (|| -> Result<(ParsedComponent, CompileResult)> {
                let canonical = imports::canonical_import_path(&resolved_path)?;

                if visited.contains(&canonical) {
                    return Err(CompilerError::CircularImport {
                        chain: imports::chain_message(visited, &canonical),
                    });
                }

                if let Some(cached) = import_cache.get(&canonical) {
                    log::debug!("import cache hit for {}", display_path);
                    return Ok(cached.clone());
                }

                let child_source =
                    fs::read_to_string(&canonical).map_err(|_| CompilerError::ImportNotFound {
                        path: display_path.clone(),
                    })?;

                visited.push(canonical.clone());
                let child_filename = canonical.display().to_string();
                let output =
                    self.compile_inner(&child_source, &child_filename, visited, import_cache);
                visited.pop();
                let output = output?;

                let child_split = SectionSplitter::new().split(&child_source, &child_filename)?;
                let entry = (child_split.component, output);
                import_cache.insert(canonical, entry.clone());
                Ok(entry)
            })();

            let (child_component, output) = outcome
                .map_err(|err| CompilerError::import(&component.name, &display_path, err))?;

            resolved.push(ResolvedImport {
                alias: alias.clone(),
                instance_id: instance_id(alias, &component.scope_id),
                component: child_component,
                output,
            });
        }

        Ok(resolved)
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}

fn assemble_js(imports: &str, body: &str) -> String {
    let mut out = String::new();
    if !imports.trim().is_empty() {
        out.push_str(imports.trim_end());
        out.push_str("\n\n");
    }
    out.push_str(body);
    out
}

#[allow(clippy::too_many_arguments)]
fn assemble_body(
    name: &str,
    hook_declarations: &str,
    reactive_js: &str,
    computed_js: &str,
    directive_functions: &str,
    computed_wiring: &str,
    directive_wiring: &str,
    script_body: &str,
    events_js: &str,
    directive_init: &str,
    hook_execution: &str,
) -> String {
    let mut out = format!("// {} component glue\n", name);
    for section in [
        hook_declarations,
        reactive_js,
        computed_js,
        directive_functions,
        computed_wiring,
        directive_wiring,
        script_body,
        events_js,
        directive_init,
        hook_execution,
    ] {
        if section.trim().is_empty() {
            continue;
        }
        out.push_str(section.trim_end());
        out.push_str("\n");
    }
    out
}

/// Compile a file with a fresh compiler and default options.
pub fn compile_file(path: &str) -> Result<CompileResult> {
    Compiler::new().compile_file(path)
}

/// Compile source text with a fresh compiler and default options.
pub fn compile_source(source: &str, filename: &str) -> Result<CompileResult> {
    Compiler::new().compile_source(source, filename)
}
