//! Computed-property engine
//!
//! Parses `name = computed(() => expr [, deps])` declarations with
//! depth-aware scanning, resolves dependencies (explicit list or inferred
//! whole-identifier containment), and emits memoized getters with
//! cascading invalidation: pull-based reads, push-based invalidation
//! chained through each dependency's update or invalidate function.

use crate::session::scope_marker;
use crate::types::ComputedVariable;
use crate::utils::{
    capitalize, contains_identifier, find_matching, is_ident_char, is_ident_start,
    is_valid_identifier, split_top_level,
};
use std::collections::HashSet;

/// Extract computed declarations, returning the script with them removed.
pub fn extract_computed(script: &str) -> (String, Vec<ComputedVariable>) {
    let chars: Vec<char> = script.chars().collect();
    let mut computeds = Vec::new();
    let mut removals: Vec<(usize, usize)> = Vec::new();
    let mut i = 0;
    let mut string_delim: Option<char> = None;

    while i < chars.len() {
        let c = chars[i];
        if let Some(delim) = string_delim {
            if c == '\\' {
                i += 2;
                continue;
            }
            if c == delim {
                string_delim = None;
            }
            i += 1;
            continue;
        }
        match c {
            '"' | '\'' | '`' => {
                string_delim = Some(c);
                i += 1;
            }
            c if is_ident_start(c) => {
                let start = i;
                let preceded_by_dot = start > 0 && chars[start - 1] == '.';
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                if preceded_by_dot {
                    continue;
                }
                let name: String = chars[start..i].iter().collect();

                let mut j = skip_ws(&chars, i);
                if chars.get(j) != Some(&'=')
                    || matches!(chars.get(j + 1), Some('=') | Some('>'))
                {
                    continue;
                }
                j = skip_ws(&chars, j + 1);
                if !word_at(&chars, j, "computed") {
                    continue;
                }
                let open = skip_ws(&chars, j + "computed".len());
                if chars.get(open) != Some(&'(') {
                    continue;
                }
                let text: String = chars.iter().collect();
                let close = match find_matching(&text, open, '(', ')') {
                    Some(close) => close,
                    None => continue,
                };
                let inner: String = chars[open + 1..close].iter().collect();
                let (expr, explicit_deps) = match parse_arguments(&inner) {
                    Some(parsed) => parsed,
                    None => continue,
                };
                let mut end = close + 1;
                let after = skip_ws(&chars, end);
                if chars.get(after) == Some(&';') {
                    end = after + 1;
                }
                computeds.push(ComputedVariable {
                    name,
                    expr,
                    explicit_deps,
                    deps: Vec::new(),
                });
                removals.push((start, end));
                i = end;
            }
            _ => i += 1,
        }
    }

    let mut out = String::with_capacity(script.len());
    let mut cursor = 0;
    for (start, end) in removals {
        if start > cursor {
            out.extend(&chars[cursor..start]);
        }
        cursor = end;
    }
    if cursor < chars.len() {
        out.extend(&chars[cursor..]);
    }
    (out, computeds)
}

fn skip_ws(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

fn word_at(chars: &[char], at: usize, word: &str) -> bool {
    let end = at + word.len();
    if end > chars.len() {
        return false;
    }
    let slice: String = chars[at..end].iter().collect();
    slice == word && !chars.get(end).map(|&c| is_ident_char(c)).unwrap_or(false)
}

/// Split the `computed(...)` argument list into the arrow body and the
/// optional explicit dependency list. The body may itself contain
/// parentheses and commas, so the split is depth-aware.
fn parse_arguments(inner: &str) -> Option<(String, Option<Vec<String>>)> {
    let parts = split_top_level(inner, ',');
    if parts.is_empty() {
        return None;
    }

    // Re-join everything up to a trailing `[...]` part, in case the arrow
    // body itself contained a top-level comma.
    let (arrow_parts, deps_part): (&[String], Option<&String>) = match parts.last() {
        Some(last) if last.starts_with('[') && parts.len() > 1 => {
            (&parts[..parts.len() - 1], Some(last))
        }
        _ => (&parts[..], None),
    };
    let arrow = arrow_parts.join(", ");
    let arrow_pos = arrow.find("=>")?;
    let expr = arrow[arrow_pos + 2..].trim().to_string();
    if expr.is_empty() {
        return None;
    }

    let explicit_deps = deps_part.map(|list| {
        list.trim_start_matches('[')
            .trim_end_matches(']')
            .split(',')
            .map(|dep| dep.trim().to_string())
            .filter(|dep| is_valid_identifier(dep))
            .collect()
    });

    Some((expr, explicit_deps))
}

/// Fill in each computed's dependency list: the explicit list when the
/// author gave one, otherwise every known reactive or computed name that
/// appears as a whole identifier in the expression.
pub fn resolve_dependencies(
    computeds: &mut [ComputedVariable],
    reactive_names: &HashSet<String>,
) {
    let computed_names: Vec<String> = computeds.iter().map(|c| c.name.clone()).collect();
    for computed in computeds.iter_mut() {
        if let Some(explicit) = &computed.explicit_deps {
            computed.deps = explicit.clone();
            continue;
        }
        let mut deps = Vec::new();
        for name in reactive_names {
            if contains_identifier(&computed.expr, name) {
                deps.push(name.clone());
            }
        }
        for name in &computed_names {
            if *name != computed.name && contains_identifier(&computed.expr, name) {
                deps.push(name.clone());
            }
        }
        deps.sort();
        computed.deps = deps;
    }
}

pub struct ComputedEngine {
    scope_id: String,
}

impl ComputedEngine {
    pub fn new(scope_id: &str) -> Self {
        Self {
            scope_id: scope_id.to_string(),
        }
    }

    /// Memoized getter, invalidator and DOM updater for each computed.
    pub fn generate(&self, computeds: &[ComputedVariable]) -> String {
        let mut out = String::new();
        for computed in computeds {
            let name = &computed.name;
            let cap = capitalize(name);
            let recompute = if computed.expr.trim_start().starts_with('{') {
                format!("(function () {})()", computed.expr.trim())
            } else {
                format!("({})", computed.expr.trim())
            };
            out.push_str(&format!(
                "let _{name}_cache;\n\
                 let _{name}_dirty = true;\n\
                 function {name}() {{\n\
                 \x20 if (_{name}_dirty) {{\n\
                 \x20   _{name}_cache = {recompute};\n\
                 \x20   _{name}_dirty = false;\n\
                 \x20 }}\n\
                 \x20 return _{name}_cache;\n\
                 }}\n\
                 function invalidate{cap}() {{\n\
                 \x20 _{name}_dirty = true;\n\
                 \x20 update{cap}DOM({name}());\n\
                 }}\n",
                name = name,
                cap = cap,
                recompute = recompute,
            ));
            out.push_str(&format!(
                "function update{cap}DOM(value) {{\n\
                 \x20 document.querySelectorAll('[{marker}][data-bind-{name}]').forEach(function (el) {{\n\
                 \x20   el.textContent = (value !== null && typeof value === 'object') ? JSON.stringify(value) : value;\n\
                 \x20 }});\n\
                 }}\n",
                cap = cap,
                marker = scope_marker(&self.scope_id),
                name = name,
            ));
        }
        out
    }

    /// Chain each dependency's existing update/invalidate function so it
    /// also invalidates the dependent. Correct through chains of
    /// computed-on-computed, since wrapping composes.
    pub fn generate_wiring(
        &self,
        computeds: &[ComputedVariable],
        reactive_names: &HashSet<String>,
    ) -> String {
        let computed_names: HashSet<&str> =
            computeds.iter().map(|c| c.name.as_str()).collect();
        let mut out = String::new();
        for computed in computeds {
            let cap = capitalize(&computed.name);
            for dep in &computed.deps {
                if reactive_names.contains(dep) {
                    out.push_str(&format!(
                        "update{dep}DOM = (function (prev) {{ return function (value) {{ prev(value); invalidate{cap}(); }}; }})(update{dep}DOM);\n",
                        dep = capitalize(dep),
                        cap = cap,
                    ));
                } else if computed_names.contains(dep.as_str()) {
                    out.push_str(&format!(
                        "invalidate{dep} = (function (prev) {{ return function () {{ prev(); invalidate{cap}(); }}; }})(invalidate{dep});\n",
                        dep = capitalize(dep),
                        cap = cap,
                    ));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_extract_basic() {
        let (rest, computeds) = extract_computed("total = computed(() => a() + b());\nlet z = 1;");
        assert_eq!(computeds.len(), 1);
        assert_eq!(computeds[0].name, "total");
        assert_eq!(computeds[0].expr, "a() + b()");
        assert!(computeds[0].explicit_deps.is_none());
        assert!(rest.contains("let z = 1;"));
        assert!(!rest.contains("computed"));
    }

    #[test]
    fn test_extract_with_explicit_deps() {
        let (_, computeds) = extract_computed("total = computed(() => a() + b(), [a, b])");
        assert_eq!(
            computeds[0].explicit_deps,
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_extract_body_with_nested_parens_and_comma() {
        let (_, computeds) =
            extract_computed("label = computed(() => join(first(), last(), ', '))");
        assert_eq!(computeds[0].expr, "join(first(), last(), ', ')");
    }

    #[test]
    fn test_resolve_inferred_dependencies() {
        let (_, mut computeds) = extract_computed(
            "total = computed(() => a() + b())\ngrand = computed(() => total() * 2)",
        );
        resolve_dependencies(&mut computeds, &set(&["a", "b", "c"]));
        assert_eq!(computeds[0].deps, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(computeds[1].deps, vec!["total".to_string()]);
    }

    #[test]
    fn test_explicit_deps_win_over_inference() {
        let (_, mut computeds) = extract_computed("total = computed(() => a() + b(), [a])");
        resolve_dependencies(&mut computeds, &set(&["a", "b"]));
        assert_eq!(computeds[0].deps, vec!["a".to_string()]);
    }

    #[test]
    fn test_generate_memoized_getter() {
        let (_, mut computeds) = extract_computed("total = computed(() => a() + b())");
        resolve_dependencies(&mut computeds, &set(&["a", "b"]));
        let js = ComputedEngine::new("abc123").generate(&computeds);
        assert!(js.contains("let _total_cache;"));
        assert!(js.contains("let _total_dirty = true;"));
        assert!(js.contains("function total()"));
        assert!(js.contains("_total_cache = (a() + b());"));
        assert!(js.contains("function invalidateTotal()"));
        assert!(js.contains("function updateTotalDOM(value)"));
    }

    #[test]
    fn test_wiring_covers_both_reactive_deps() {
        let (_, mut computeds) = extract_computed("total = computed(() => a() + b())");
        let reactive = set(&["a", "b"]);
        resolve_dependencies(&mut computeds, &reactive);
        let wiring = ComputedEngine::new("abc123").generate_wiring(&computeds, &reactive);
        assert!(wiring.contains("updateADOM = (function (prev)"));
        assert!(wiring.contains("updateBDOM = (function (prev)"));
        assert_eq!(wiring.matches("invalidateTotal();").count(), 2);
    }

    #[test]
    fn test_wiring_computed_on_computed() {
        let (_, mut computeds) = extract_computed(
            "total = computed(() => a())\ngrand = computed(() => total() * 2)",
        );
        let reactive = set(&["a"]);
        resolve_dependencies(&mut computeds, &reactive);
        let wiring = ComputedEngine::new("abc123").generate_wiring(&computeds, &reactive);
        // a's update invalidates total; total's invalidate cascades to grand.
        assert!(wiring.contains("updateADOM = (function (prev)"));
        assert!(wiring.contains("invalidateTotal = (function (prev)"));
        assert!(wiring.contains("invalidateGrand();"));
    }

    #[test]
    fn test_block_body_wrapped_in_iife() {
        let (_, computeds) =
            extract_computed("total = computed(() => { return a() + 1; })");
        let js = ComputedEngine::new("abc123").generate(&computeds);
        assert!(js.contains("(function () { return a() + 1; })()"));
    }
}
