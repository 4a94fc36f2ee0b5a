//! Per-component CSS scoping
//!
//! Prefixes every selector of a non-global rule with the component's scope
//! marker. `:root` is the sole global escape hatch; `@`-rule preludes are
//! left untouched while the rules inside them are scoped. A non-isolated
//! style additionally emits double-scoped variants so a parent stylesheet
//! can target rendered children.

use crate::css_parser::{write_stylesheet, CssParser};
use crate::error::Warning;
use crate::session::{scope_marker, CompileSession};
use crate::types::CssRule;

pub struct CssScoper<'s> {
    session: &'s mut CompileSession,
}

impl<'s> CssScoper<'s> {
    pub fn new(session: &'s mut CompileSession) -> Self {
        Self { session }
    }

    /// Scope a raw stylesheet for the component identified by `scope_id`.
    ///
    /// `child_markers` holds the scope markers of resolved child components
    /// and only matters for non-isolated styles.
    pub fn scope_stylesheet(
        &mut self,
        css: &str,
        scope_id: &str,
        isolated: bool,
        child_markers: &[String],
    ) -> String {
        let rules = CssParser::new().parse(css);
        let marker = scope_marker(scope_id);
        let mut scoped: Vec<CssRule> = Vec::with_capacity(rules.len());

        for rule in rules {
            // Standalone at-rules (`@import`, `@charset`) pass through.
            if rule.selectors.is_empty() {
                scoped.push(rule);
                continue;
            }

            let mut selectors = Vec::new();
            for selector in &rule.selectors {
                selectors.push(self.scope_selector(&marker, selector));
                if !isolated {
                    for child in child_markers {
                        selectors.push(format!("[{}] [{}] {}", marker, child, selector.trim()));
                    }
                }
            }

            scoped.push(CssRule {
                selectors,
                properties: rule.properties,
                at_prelude: rule.at_prelude,
            });
        }

        write_stylesheet(&scoped)
    }

    /// Rewrite one selector, memoized by (marker, selector) for the
    /// session. `:root` stays bare and already-marked selectors are left
    /// alone.
    fn scope_selector(&mut self, marker: &str, selector: &str) -> String {
        let key = (marker.to_string(), selector.to_string());
        if let Some(cached) = self.session.selector_cache.get(&key) {
            return cached.clone();
        }

        let trimmed = selector.trim();
        let rewritten = if trimmed == ":root" || trimmed.contains(marker) {
            trimmed.to_string()
        } else {
            format!("[{}] {}", marker, trimmed)
        };

        self.session.selector_cache.insert(key, rewritten.clone());
        rewritten
    }
}

/// Heuristic CSS checks, warnings only.
pub fn detect_css_leaks(
    css: &str,
    isolated: bool,
    child_count: usize,
    filename: &str,
) -> Vec<Warning> {
    let mut warnings = Vec::new();

    if css.trim().is_empty() {
        return warnings;
    }

    if !isolated && child_count == 0 {
        warnings.push(
            Warning::new("non-isolated <style> has no resolved child components to target")
                .with_file(filename)
                .with_suggestion("use <style isolated> unless styles must reach children"),
        );
    }

    let rules = CssParser::new().parse(css);
    for rule in &rules {
        for selector in &rule.selectors {
            let trimmed = selector.trim();
            if trimmed.eq_ignore_ascii_case("body") || trimmed.eq_ignore_ascii_case("html") {
                warnings.push(
                    Warning::new(format!(
                        "selector '{}' targets the document root and will leak outside the component",
                        trimmed
                    ))
                    .with_file(filename)
                    .with_suggestion("scope the rule to an element inside the template"),
                );
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{scope_id, CompileSession};

    fn scope(css: &str, name: &str, isolated: bool, children: &[String]) -> String {
        let mut session = CompileSession::new();
        let id = scope_id(name);
        CssScoper::new(&mut session).scope_stylesheet(css, &id, isolated, children)
    }

    #[test]
    fn test_plain_rule_gets_marker_prefix() {
        let id = scope_id("Widget");
        let css = scope(".box { color: red; }", "Widget", true, &[]);
        assert!(css.contains(&format!("[data-fx-{}] .box {{ color: red; }}", id)));
    }

    #[test]
    fn test_root_left_bare() {
        let css = scope(":root { --c: red; }", "Widget", true, &[]);
        assert!(css.starts_with(":root {"));
        assert!(!css.contains("data-fx"));
        assert!(css.contains("--c: red;"));
    }

    #[test]
    fn test_already_marked_selector_untouched() {
        let id = scope_id("Widget");
        let marked = format!("[data-fx-{}] .box {{ color: red; }}", id);
        let css = scope(&marked, "Widget", true, &[]);
        let occurrences = css.matches(&format!("data-fx-{}", id)).count();
        assert_eq!(occurrences, 1);
    }

    #[test]
    fn test_at_rule_prelude_untouched_inner_scoped() {
        let id = scope_id("Widget");
        let css = scope(
            "@media (max-width: 600px) { .a { color: red; } }",
            "Widget",
            true,
            &[],
        );
        assert!(css.contains("@media (max-width: 600px) {"));
        assert!(css.contains(&format!("[data-fx-{}] .a", id)));
    }

    #[test]
    fn test_unscoped_parent_emits_child_variants() {
        let parent = scope_id("Parent");
        let children = vec![
            scope_marker(&scope_id("ChildA")),
            scope_marker(&scope_id("ChildB")),
        ];
        let css = scope(".row { gap: 4px; }", "Parent", false, &children);
        for child in &children {
            assert!(
                css.contains(&format!("[data-fx-{}] [{}] .row", parent, child)),
                "missing variant for {}: {}",
                child,
                css
            );
        }
        // Own scoped selector is still present.
        assert!(css.contains(&format!("[data-fx-{}] .row", parent)));
    }

    #[test]
    fn test_isolated_style_ignores_children() {
        let children = vec![scope_marker(&scope_id("Child"))];
        let css = scope(".row { gap: 4px; }", "Parent", true, &children);
        assert!(!css.contains(&children[0]));
    }

    #[test]
    fn test_selector_cache_reused() {
        let mut session = CompileSession::new();
        let id = scope_id("Widget");
        let first =
            CssScoper::new(&mut session).scope_stylesheet(".a { color: red; }", &id, true, &[]);
        assert_eq!(session.selector_cache.len(), 1);
        let second =
            CssScoper::new(&mut session).scope_stylesheet(".a { color: blue; }", &id, true, &[]);
        assert_eq!(session.selector_cache.len(), 1);
        assert!(first.contains("[data-fx-"));
        assert!(second.contains("[data-fx-"));
    }

    #[test]
    fn test_leak_detection_flags_document_selectors() {
        let warnings = detect_css_leaks("body { margin: 0; }", true, 0, "App.fuse");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.contains("body"));
    }

    #[test]
    fn test_leak_detection_flags_childless_unscoped_style() {
        let warnings = detect_css_leaks(".a { color: red; }", false, 0, "App.fuse");
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].suggestion.as_deref().unwrap().contains("isolated"));
    }
}
