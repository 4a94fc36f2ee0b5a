//! Cross-file import resolution support
//!
//! Path resolution, the circular-dependency chain check, per-usage
//! instance identity and the template/artifact merging for resolved
//! children. The recursive compile itself lives on `Compiler`, which owns
//! the session; everything path- and text-shaped lives here.

use crate::error::{CompilerError, Result};
use crate::types::ResolvedImport;
use crate::utils::is_ident_char;
use std::path::{Path, PathBuf};

/// Resolve an import path relative to the importing file.
pub fn resolve_path(importing_file: &str, import_path: &str) -> PathBuf {
    let base = Path::new(importing_file)
        .parent()
        .unwrap_or_else(|| Path::new(""));
    base.join(import_path)
}

/// Canonicalize for the visited set; a missing file is an import error,
/// not a raw IO error.
pub fn canonical_import_path(resolved: &Path) -> Result<PathBuf> {
    resolved
        .canonicalize()
        .map_err(|_| CompilerError::ImportNotFound {
            path: resolved.display().to_string(),
        })
}

/// Render the resolution chain for a circular-import error, ending with
/// the offending path.
pub fn chain_message(visited: &[PathBuf], offending: &Path) -> String {
    let mut parts: Vec<String> = visited
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    parts.push(offending.display().to_string());
    parts.join(" -> ")
}

/// Replace every `<Alias/>` / `<Alias>...</Alias>` usage with the child's
/// compiled HTML wrapped in a per-usage container. All occurrences share
/// the import's instance id and are distinguished by an occurrence index.
/// Returns the rewritten template and the number of usages substituted.
pub fn substitute_usages(template: &str, import: &ResolvedImport) -> (String, usize) {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::with_capacity(template.len());
    let mut occurrence = 0usize;
    let mut i = 0;
    let needle: Vec<char> = format!("<{}", import.alias).chars().collect();

    while i < chars.len() {
        if !starts_with_at(&chars, i, &needle)
            || chars
                .get(i + needle.len())
                .map(|&c| is_ident_char(c))
                .unwrap_or(false)
        {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        // Walk to the end of the open tag.
        let mut j = i + needle.len();
        let mut quote: Option<char> = None;
        while j < chars.len() {
            let c = chars[j];
            match quote {
                Some(q) => {
                    if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    '"' | '\'' => quote = Some(c),
                    '>' => break,
                    _ => {}
                },
            }
            j += 1;
        }
        if j >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }

        let self_closing = chars[j - 1] == '/';
        let mut end = j + 1;
        if !self_closing {
            let close = format!("</{}>", import.alias);
            let rest: String = chars[end..].iter().collect();
            match rest.find(&close) {
                Some(offset) => end = end + offset + close.len(),
                None => {
                    out.push(chars[i]);
                    i += 1;
                    continue;
                }
            }
        }

        out.push_str(&format!(
            "<div data-fx-inst-{}-{}>{}</div>",
            import.instance_id, occurrence, import.output.html
        ));
        occurrence += 1;
        i = end;
    }

    (out, occurrence)
}

fn starts_with_at(chars: &[char], at: usize, needle: &[char]) -> bool {
    chars.len() >= at + needle.len() && &chars[at..at + needle.len()] == needle
}

/// Children CSS first, own CSS last, so a parent can override.
pub fn merge_css(own: &str, imports: &[ResolvedImport]) -> String {
    let mut out = String::new();
    for import in imports {
        if !import.output.css.trim().is_empty() {
            out.push_str(import.output.css.trim_end());
            out.push('\n');
        }
    }
    if !own.trim().is_empty() {
        out.push_str(own.trim_end());
        out.push('\n');
    }
    out
}

/// Hoisted import statements from children and parent, deduplicated in
/// first-seen order.
pub fn merge_js_imports(own: &str, imports: &[ResolvedImport]) -> String {
    let mut seen = std::collections::HashSet::new();
    let mut out = String::new();
    let lines = imports
        .iter()
        .flat_map(|import| import.output.js_imports.lines())
        .chain(own.lines());
    for line in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
            continue;
        }
        out.push_str(trimmed);
        out.push('\n');
    }
    out
}

/// Each child body runs in its own function scope; inline handlers stay
/// reachable because they are assigned onto `window`.
pub fn merge_js_bodies(own: &str, imports: &[ResolvedImport]) -> String {
    let mut out = String::new();
    for import in imports {
        if import.output.js_body.trim().is_empty() {
            continue;
        }
        out.push_str(&format!(
            "// {} component\n(function () {{\n{}\n}})();\n",
            import.alias,
            import.output.js_body.trim_end()
        ));
    }
    out.push_str(own);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CompileResult, ComponentMetadata, ParsedComponent};

    fn child(alias: &str, html: &str) -> ResolvedImport {
        let metadata = ComponentMetadata {
            name: alias.to_string(),
            scope_id: crate::session::scope_id(alias),
            children: vec![],
        };
        let mut output = CompileResult::empty(metadata);
        output.html = html.to_string();
        output.css = format!(".{} {{ color: red; }}", alias.to_lowercase());
        output.js_imports = "import './shared.js';\n".to_string();
        output.js_body = format!("let _{} = 1;", alias.to_lowercase());
        ResolvedImport {
            alias: alias.to_string(),
            component: ParsedComponent {
                name: alias.to_string(),
                script: String::new(),
                template: String::new(),
                style: String::new(),
                style_isolated: true,
                imports: vec![],
                scope_id: crate::session::scope_id(alias),
                store: None,
                is_store: false,
            },
            output,
            instance_id: crate::session::instance_id(alias, "parent"),
        }
    }

    #[test]
    fn test_resolve_path_relative() {
        let resolved = resolve_path("src/App.fuse", "./ui/Badge.fuse");
        assert_eq!(resolved, PathBuf::from("src/./ui/Badge.fuse"));
    }

    #[test]
    fn test_chain_message_lists_all_files() {
        let visited = vec![PathBuf::from("A.fuse"), PathBuf::from("B.fuse")];
        let message = chain_message(&visited, Path::new("A.fuse"));
        assert_eq!(message, "A.fuse -> B.fuse -> A.fuse");
    }

    #[test]
    fn test_substitute_two_sibling_usages() {
        let import = child("Counter", "<p>c</p>");
        let (html, count) =
            substitute_usages("<div><Counter/><Counter></Counter></div>", &import);
        assert_eq!(count, 2);
        let id = &import.instance_id;
        assert!(html.contains(&format!("data-fx-inst-{}-0", id)));
        assert!(html.contains(&format!("data-fx-inst-{}-1", id)));
        assert_eq!(html.matches("<p>c</p>").count(), 2);
        assert!(!html.contains("<Counter"));
    }

    #[test]
    fn test_substitute_does_not_match_prefix_alias() {
        let import = child("Count", "<p>c</p>");
        let (html, count) = substitute_usages("<CountBadge/>", &import);
        assert_eq!(count, 0);
        assert_eq!(html, "<CountBadge/>");
    }

    #[test]
    fn test_merge_css_children_first() {
        let imports = vec![child("Counter", "<p/>")];
        let css = merge_css("[data-fx-p] .own { color: blue; }", &imports);
        let child_pos = css.find(".counter").unwrap();
        let own_pos = css.find(".own").unwrap();
        assert!(child_pos < own_pos);
    }

    #[test]
    fn test_merge_js_imports_dedup() {
        let imports = vec![child("A", ""), child("B", "")];
        let merged = merge_js_imports("import './shared.js';\nimport './own.js';", &imports);
        assert_eq!(merged.matches("./shared.js").count(), 1);
        assert!(merged.contains("./own.js"));
    }

    #[test]
    fn test_merge_js_bodies_wraps_children() {
        let imports = vec![child("Counter", "")];
        let merged = merge_js_bodies("let parent = 1;", &imports);
        assert!(merged.contains("(function () {"));
        assert!(merged.contains("let _counter = 1;"));
        assert!(merged.trim_end().ends_with("let parent = 1;"));
    }
}
