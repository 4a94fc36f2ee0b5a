//! Template reference parsing and HTML preparation
//!
//! Scans template text for the three interpolation spellings, resolves
//! each span to a base variable and property path where possible, renders
//! interpolations into reactive-marked spans or constant text, and injects
//! the component scope marker onto every plain HTML element.

use crate::constants::ConstValue;
use crate::error::Warning;
use crate::session::scope_marker;
use crate::types::TemplateRef;
use crate::utils::{html_escape, is_ident_char, is_ident_start};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Scan template text for `{{expr}}`, `{{{expr}}}` and `{{@expr}}` spans.
pub fn parse_refs(template: &str) -> Vec<TemplateRef> {
    let chars: Vec<char> = template.chars().collect();
    let mut refs = Vec::new();
    let mut i = 0;

    while i + 1 < chars.len() {
        if chars[i] != '{' || chars[i + 1] != '{' {
            i += 1;
            continue;
        }

        let (expr_start, close_token, escaped) = if chars.get(i + 2) == Some(&'{') {
            (i + 3, "}}}", false)
        } else if chars.get(i + 2) == Some(&'@') {
            (i + 3, "}}", false)
        } else {
            (i + 2, "}}", true)
        };

        let rest: String = chars[expr_start..].iter().collect();
        let close = match rest.find(close_token) {
            Some(offset) => expr_start + offset,
            None => {
                i += 2;
                continue;
            }
        };
        let end = close + close_token.len();
        let raw: String = chars[i..end].iter().collect();
        let expr: String = chars[expr_start..close].iter().collect::<String>().trim().to_string();
        let (base, path) = analyze_expression(&expr);

        refs.push(TemplateRef {
            start: i,
            end,
            raw,
            expr,
            escaped,
            base,
            path,
        });
        i = end;
    }

    refs
}

/// Resolve an interpolation expression to its base variable and property
/// path. Plain access chains yield both; call expressions yield only the
/// base name; anything else yields neither. Deliberately shallow.
fn analyze_expression(expr: &str) -> (Option<String>, Vec<String>) {
    let chars: Vec<char> = expr.chars().collect();
    if chars.is_empty() || !is_ident_start(chars[0]) {
        return (None, Vec::new());
    }

    let mut segments: Vec<String> = Vec::new();
    let mut i = 0;
    loop {
        let start = i;
        while i < chars.len() && is_ident_char(chars[i]) {
            i += 1;
        }
        if start == i {
            return (None, Vec::new());
        }
        segments.push(chars[start..i].iter().collect());

        if i == chars.len() {
            // Pure identifier chain.
            let base = segments.remove(0);
            return (Some(base), segments);
        }
        match chars[i] {
            '.' => i += 1,
            '(' => {
                // A call expression: track the base only.
                return (Some(segments.remove(0)), Vec::new());
            }
            _ => return (None, Vec::new()),
        }
    }
}

/// Render interpolation spans into the template HTML.
///
/// Reactive and computed bases become `data-bind-` spans seeded with the
/// known initial value; provably constant bases are substituted directly
/// with no wiring; anything else is dropped with a warning.
pub struct TemplateCompiler {
    filename: String,
}

impl TemplateCompiler {
    pub fn new(filename: &str) -> Self {
        Self {
            filename: filename.to_string(),
        }
    }

    pub fn render_interpolations(
        &self,
        template: &str,
        refs: &[TemplateRef],
        reactive_names: &HashSet<String>,
        computed_names: &HashSet<String>,
        constants: &HashMap<String, ConstValue>,
        warnings: &mut Vec<Warning>,
    ) -> String {
        let chars: Vec<char> = template.chars().collect();
        let mut out = String::with_capacity(template.len());
        let mut cursor = 0;

        for reference in refs {
            if reference.start > cursor {
                out.extend(&chars[cursor..reference.start]);
            }
            cursor = reference.end;

            match &reference.base {
                Some(base) if reactive_names.contains(base) || computed_names.contains(base) => {
                    let initial = constants
                        .get(base)
                        .and_then(|value| value.as_literal())
                        .and_then(|value| descend(value, &reference.path))
                        .map(render_value)
                        .unwrap_or_default();
                    let text = if reference.escaped {
                        html_escape(&initial)
                    } else {
                        initial
                    };
                    out.push_str(&format!(
                        "<span data-bind-{}>{}</span>",
                        base, text
                    ));
                }
                Some(base) => match constants.get(base).and_then(|v| v.as_literal()) {
                    Some(value) => {
                        let rendered = descend(value, &reference.path)
                            .map(render_value)
                            .unwrap_or_default();
                        if reference.escaped {
                            out.push_str(&html_escape(&rendered));
                        } else {
                            out.push_str(&rendered);
                        }
                    }
                    None => {
                        warnings.push(
                            Warning::new(format!(
                                "template reference '{}' does not resolve to a reactive, computed or constant value",
                                reference.expr
                            ))
                            .with_file(&self.filename),
                        );
                    }
                },
                None => {
                    warnings.push(
                        Warning::new(format!(
                            "template expression '{}' is not a supported reference",
                            reference.expr
                        ))
                        .with_file(&self.filename)
                        .with_suggestion("use a variable, access chain or call expression"),
                    );
                }
            }
        }

        if cursor < chars.len() {
            out.extend(&chars[cursor..]);
        }
        out
    }
}

fn descend<'v>(value: &'v Value, path: &[String]) -> Option<&'v Value> {
    let mut current = value;
    for segment in path {
        current = current.get(segment)?;
    }
    Some(current)
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Inject the scope marker attribute onto every plain HTML element open
/// tag. Capitalized tags are component usages and are left alone; closing
/// tags, comments and doctypes are skipped.
pub fn inject_scope_markers(html: &str, scope_id: &str) -> String {
    let marker = scope_marker(scope_id);
    let chars: Vec<char> = html.chars().collect();
    let mut out = String::with_capacity(html.len() + 64);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c != '<' {
            out.push(c);
            i += 1;
            continue;
        }
        let next = chars.get(i + 1).copied();
        let is_element_open = matches!(next, Some(n) if n.is_ascii_lowercase());
        if !is_element_open {
            out.push(c);
            i += 1;
            continue;
        }

        // Copy the open tag up to its terminating `>`, respecting quotes,
        // and place the marker just before the close.
        let mut tag = String::from('<');
        i += 1;
        let mut quote: Option<char> = None;
        while i < chars.len() {
            let t = chars[i];
            match quote {
                Some(q) => {
                    tag.push(t);
                    if t == q {
                        quote = None;
                    }
                    i += 1;
                }
                None => match t {
                    '"' | '\'' => {
                        tag.push(t);
                        quote = Some(t);
                        i += 1;
                    }
                    '>' => {
                        i += 1;
                        let self_closing = tag.ends_with('/');
                        let body = if self_closing {
                            tag[..tag.len() - 1].trim_end()
                        } else {
                            tag.trim_end()
                        };
                        if body.contains(&marker) {
                            out.push_str(&tag);
                            out.push('>');
                        } else {
                            out.push_str(body);
                            out.push(' ');
                            out.push_str(&marker);
                            if self_closing {
                                out.push_str("/>");
                            } else {
                                out.push('>');
                            }
                        }
                        break;
                    }
                    _ => {
                        tag.push(t);
                        i += 1;
                    }
                },
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn set(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_three_forms() {
        let refs = parse_refs("<p>{{a}} {{{b}}} {{@c}}</p>");
        assert_eq!(refs.len(), 3);
        assert!(refs[0].escaped);
        assert!(!refs[1].escaped);
        assert!(!refs[2].escaped);
        assert_eq!(refs[0].expr, "a");
        assert_eq!(refs[1].expr, "b");
        assert_eq!(refs[2].expr, "c");
        assert_eq!(refs[0].raw, "{{a}}");
        assert_eq!(refs[1].raw, "{{{b}}}");
        assert_eq!(refs[2].raw, "{{@c}}");
    }

    #[test]
    fn test_base_and_path_resolution() {
        let refs = parse_refs("{{user.address.city}}");
        assert_eq!(refs[0].base.as_deref(), Some("user"));
        assert_eq!(refs[0].path, vec!["address".to_string(), "city".to_string()]);
    }

    #[test]
    fn test_call_expression_base_only() {
        let refs = parse_refs("{{list.map(x => x)}}");
        assert_eq!(refs[0].base.as_deref(), Some("list"));
        assert!(refs[0].path.is_empty());
    }

    #[test]
    fn test_complex_expression_has_no_base() {
        let refs = parse_refs("{{a + b}}");
        assert_eq!(refs[0].base, None);
        assert!(refs[0].path.is_empty());
    }

    #[test]
    fn test_render_reactive_span_with_initial() {
        let template = "<p>{{x}}</p>";
        let refs = parse_refs(template);
        let mut constants = HashMap::new();
        constants.insert("x".to_string(), ConstValue::Literal(json!(0)));
        let mut warnings = Vec::new();
        let html = TemplateCompiler::new("App.fuse").render_interpolations(
            template,
            &refs,
            &set(&["x"]),
            &set(&[]),
            &constants,
            &mut warnings,
        );
        assert_eq!(html, "<p><span data-bind-x>0</span></p>");
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_render_constant_substituted_without_wiring() {
        let template = "<p>{{label}}</p>";
        let refs = parse_refs(template);
        let mut constants = HashMap::new();
        constants.insert("label".to_string(), ConstValue::Literal(json!("Items")));
        let mut warnings = Vec::new();
        let html = TemplateCompiler::new("App.fuse").render_interpolations(
            template,
            &refs,
            &set(&[]),
            &set(&[]),
            &constants,
            &mut warnings,
        );
        assert_eq!(html, "<p>Items</p>");
    }

    #[test]
    fn test_render_escapes_escaped_spans_only() {
        let template = "{{a}}{{{b}}}";
        let refs = parse_refs(template);
        let mut constants = HashMap::new();
        constants.insert("a".to_string(), ConstValue::Literal(json!("<b>")));
        constants.insert("b".to_string(), ConstValue::Literal(json!("<b>")));
        let mut warnings = Vec::new();
        let html = TemplateCompiler::new("App.fuse").render_interpolations(
            template,
            &refs,
            &set(&["a", "b"]),
            &set(&[]),
            &constants,
            &mut warnings,
        );
        assert!(html.contains("<span data-bind-a>&lt;b&gt;</span>"));
        assert!(html.contains("<span data-bind-b><b></span>"));
    }

    #[test]
    fn test_render_unresolved_warns() {
        let template = "<p>{{missing}}</p>";
        let refs = parse_refs(template);
        let mut warnings = Vec::new();
        let html = TemplateCompiler::new("App.fuse").render_interpolations(
            template,
            &refs,
            &set(&[]),
            &set(&[]),
            &HashMap::new(),
            &mut warnings,
        );
        assert_eq!(html, "<p></p>");
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_inject_scope_markers() {
        let id = "abc123";
        let html = inject_scope_markers("<div class=\"a\"><p>hi</p><br/></div>", id);
        assert_eq!(
            html,
            "<div class=\"a\" data-fx-abc123><p data-fx-abc123>hi</p><br data-fx-abc123/></div>"
        );
    }

    #[test]
    fn test_inject_skips_components_and_closers() {
        let html = inject_scope_markers("<div><Counter/></div>", "abc123");
        assert_eq!(html, "<div data-fx-abc123><Counter/></div>");
    }

    #[test]
    fn test_inject_respects_quoted_gt() {
        let html = inject_scope_markers("<input value=\"a > b\">", "abc123");
        assert_eq!(html, "<input value=\"a > b\" data-fx-abc123>");
    }
}
