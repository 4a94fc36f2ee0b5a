//! Reactivity transformation engine
//!
//! Rewrites declarations, reads, writes and compound mutations of reactive
//! variables into accessor-function calls, and generates the paired
//! accessor / DOM-patch functions. The mutation rewrite is a dedicated
//! scanner over the (otherwise opaque) script text covering the narrow
//! author-facing grammar: `x++`, `x--`, `++x`, `--x`, `x = v`, `x += v`,
//! `x -= v`, and bare reads.

use crate::constants::{statement_end, ConstValue};
use crate::session::scope_marker;
use crate::types::{ReactiveVariable, TemplateRef};
use crate::utils::{capitalize, is_ident_char, is_ident_start, pascal_path};
use std::collections::{HashMap, HashSet};

/// A `name = wrap(initializer)` declaration found in the script.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactiveDeclaration {
    pub name: String,
    pub initializer: String,
    /// Byte span of the whole declaration, trailing `;` included.
    pub start: usize,
    pub end: usize,
}

/// Scan the script for reactive declarations of the form
/// `name = wrap(initializer)`.
pub fn find_reactive_declarations(script: &str) -> Vec<ReactiveDeclaration> {
    let chars: Vec<char> = script.chars().collect();
    let mut found = Vec::new();
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
                if !matches_word(&chars, j, "wrap") {
                    continue;
                }
                let open = skip_ws(&chars, j + 4);
                if chars.get(open) != Some(&'(') {
                    continue;
                }
                let text: String = chars.iter().collect();
                let close = match crate::utils::find_matching(&text, open, '(', ')') {
                    Some(close) => close,
                    None => continue,
                };
                let initializer: String = chars[open + 1..close].iter().collect();
                let mut end = close + 1;
                let after = skip_ws(&chars, end);
                if chars.get(after) == Some(&';') {
                    end = after + 1;
                }
                found.push(ReactiveDeclaration {
                    name,
                    initializer: initializer.trim().to_string(),
                    start,
                    end,
                });
                i = end;
            }
            _ => i += 1,
        }
    }
    found
}

fn matches_word(chars: &[char], at: usize, word: &str) -> bool {
    let end = at + word.len();
    if end > chars.len() {
        return false;
    }
    let slice: String = chars[at..end].iter().collect();
    if slice != word {
        return false;
    }
    !chars.get(end).map(|&c| is_ident_char(c)).unwrap_or(false)
}

fn skip_ws(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

/// Remove the given declaration spans from the script.
pub fn strip_declarations(script: &str, declarations: &[ReactiveDeclaration]) -> String {
    let chars: Vec<char> = script.chars().collect();
    let mut out = String::with_capacity(script.len());
    let mut cursor = 0;
    for declaration in declarations {
        if declaration.start > cursor {
            out.extend(&chars[cursor..declaration.start]);
        }
        cursor = declaration.end;
    }
    if cursor < chars.len() {
        out.extend(&chars[cursor..]);
    }
    out
}

/// Rewrite mutations and reads of the named variables into accessor calls.
///
/// Strings, comments and identifier boundaries are respected; member
/// accesses (`obj.x`) are never touched. A closure-local shadow of a
/// reactive name is still rewritten, a known limit of the narrow grammar.
pub fn rewrite_mutations(source: &str, names: &HashSet<String>) -> String {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        // Copy strings verbatim.
        if c == '"' || c == '\'' || c == '`' {
            out.push(c);
            i += 1;
            while i < chars.len() {
                out.push(chars[i]);
                if chars[i] == '\\' {
                    if let Some(&next) = chars.get(i + 1) {
                        out.push(next);
                        i += 2;
                        continue;
                    }
                }
                if chars[i] == c {
                    i += 1;
                    break;
                }
                i += 1;
            }
            continue;
        }

        // Copy comments verbatim.
        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                out.push(chars[i]);
                i += 1;
            }
            continue;
        }
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            out.push_str("/*");
            i += 2;
            while i < chars.len() {
                out.push(chars[i]);
                if chars[i] == '/' && chars[i - 1] == '*' {
                    i += 1;
                    break;
                }
                i += 1;
            }
            continue;
        }

        // Prefix increment/decrement: `++x` / `--x`.
        if (c == '+' || c == '-') && chars.get(i + 1) == Some(&c) {
            let j = skip_ws(&chars, i + 2);
            if let Some((name, name_end)) = read_name(&chars, j, names) {
                let op = if c == '+' { '+' } else { '-' };
                out.push_str(&format!("{n}({n}() {op} 1)", n = name, op = op));
                i = name_end;
                continue;
            }
            out.push(c);
            out.push(c);
            i += 2;
            continue;
        }

        if is_ident_start(c) {
            let preceded_by_dot = i > 0 && chars[i - 1] == '.';
            let start = i;
            while i < chars.len() && is_ident_char(chars[i]) {
                i += 1;
            }
            let ident: String = chars[start..i].iter().collect();
            if preceded_by_dot || !names.contains(&ident) {
                out.push_str(&ident);
                continue;
            }

            let j = skip_ws(&chars, i);
            let next = chars.get(j).copied();
            let next2 = chars.get(j + 1).copied();

            // Postfix increment/decrement.
            if (next == Some('+') && next2 == Some('+'))
                || (next == Some('-') && next2 == Some('-'))
            {
                let op = if next == Some('+') { '+' } else { '-' };
                out.push_str(&format!("{n}({n}() {op} 1)", n = ident, op = op));
                i = j + 2;
                continue;
            }

            // Compound assignment: `x += v` / `x -= v`.
            if (next == Some('+') || next == Some('-')) && next2 == Some('=') {
                let op = next.unwrap();
                let rhs_start = j + 2;
                let rhs_end = statement_end(&chars, rhs_start);
                let rhs: String = chars[rhs_start..rhs_end].iter().collect();
                let rhs = rewrite_mutations(rhs.trim(), names);
                out.push_str(&format!("{n}({n}() {op} {rhs})", n = ident, op = op, rhs = rhs));
                i = rhs_end;
                continue;
            }

            // Plain assignment: `x = v` (not `==`, not `=>`).
            if next == Some('=') && !matches!(next2, Some('=') | Some('>')) {
                let rhs_start = j + 1;
                let rhs_end = statement_end(&chars, rhs_start);
                let rhs: String = chars[rhs_start..rhs_end].iter().collect();
                let rhs = rewrite_mutations(rhs.trim(), names);
                out.push_str(&format!("{n}({rhs})", n = ident, rhs = rhs));
                i = rhs_end;
                continue;
            }

            // Already a call: leave verbatim.
            if next == Some('(') {
                out.push_str(&ident);
                continue;
            }

            // Arrow-function parameter: `x => ...` is a binding, not a read.
            if next == Some('=') && next2 == Some('>') {
                out.push_str(&ident);
                continue;
            }

            // Bare read.
            out.push_str(&ident);
            out.push_str("()");
            continue;
        }

        out.push(c);
        i += 1;
    }

    out
}

fn read_name(chars: &[char], at: usize, names: &HashSet<String>) -> Option<(String, usize)> {
    if at >= chars.len() || !is_ident_start(chars[at]) {
        return None;
    }
    let mut end = at;
    while end < chars.len() && is_ident_char(chars[end]) {
        end += 1;
    }
    let ident: String = chars[at..end].iter().collect();
    if names.contains(&ident) {
        Some((ident, end))
    } else {
        None
    }
}

/// Builds `ReactiveVariable` records and generates the per-variable glue:
/// backing storage, accessor, DOM updater and property setters.
pub struct ReactivityTransformer {
    scope_id: String,
    has_update_hooks: bool,
}

impl ReactivityTransformer {
    pub fn new(scope_id: &str, has_update_hooks: bool) -> Self {
        Self {
            scope_id: scope_id.to_string(),
            has_update_hooks,
        }
    }

    /// Combine declarations, extracted constants and template references
    /// into variable records.
    pub fn build_variables(
        &self,
        declarations: &[ReactiveDeclaration],
        constants: &HashMap<String, ConstValue>,
        refs: &[TemplateRef],
    ) -> Vec<ReactiveVariable> {
        declarations
            .iter()
            .map(|declaration| {
                let initial = constants
                    .get(&declaration.name)
                    .and_then(|v| v.as_literal())
                    .cloned();
                let is_object = match &initial {
                    Some(value) => value.is_object() || value.is_array(),
                    None => {
                        let trimmed = declaration.initializer.trim_start();
                        trimmed.starts_with('{') || trimmed.starts_with('[')
                    }
                };
                let mut paths: Vec<Vec<String>> = Vec::new();
                for reference in refs {
                    if reference.base.as_deref() == Some(declaration.name.as_str())
                        && !reference.path.is_empty()
                        && !paths.contains(&reference.path)
                    {
                        paths.push(reference.path.clone());
                    }
                }
                ReactiveVariable {
                    name: declaration.name.clone(),
                    initializer: declaration.initializer.clone(),
                    initial,
                    is_object,
                    paths,
                }
            })
            .collect()
    }

    /// Generate backing declarations, accessors, DOM updaters and property
    /// setters for every reactive variable.
    pub fn generate(&self, variables: &[ReactiveVariable]) -> String {
        let mut out = String::new();
        for variable in variables {
            out.push_str(&self.generate_backing(variable));
            out.push_str(&self.generate_accessor(variable));
            out.push_str(&self.generate_updater(variable));
            out.push_str(&self.generate_setters(variable));
        }
        out
    }

    fn generate_backing(&self, variable: &ReactiveVariable) -> String {
        let init = match &variable.initial {
            Some(value) => value.to_string(),
            None if variable.initializer.is_empty() => "undefined".to_string(),
            None => variable.initializer.clone(),
        };
        format!("let _{} = {};\n", variable.name, init)
    }

    fn generate_accessor(&self, variable: &ReactiveVariable) -> String {
        let name = &variable.name;
        let update_hook_call = if self.has_update_hooks {
            format!("  runUpdateHooks('{}');\n", name)
        } else {
            String::new()
        };
        format!(
            "function {name}(value) {{\n\
             \x20 if (arguments.length === 0) {{ return _{name}; }}\n\
             \x20 _{name} = value;\n\
             \x20 update{cap}DOM(_{name});\n\
             {hooks}\
             \x20 return _{name};\n\
             }}\n",
            name = name,
            cap = capitalize(name),
            hooks = update_hook_call,
        )
    }

    fn generate_updater(&self, variable: &ReactiveVariable) -> String {
        let name = &variable.name;
        let marker = scope_marker(&self.scope_id);

        // Compatibility special case: a boolean named exactly `mounted`
        // renders as status text and toggles an `.indicator` class.
        let is_mounted_flag = name == "mounted"
            && variable
                .initial
                .as_ref()
                .map(|value| value.is_boolean())
                .unwrap_or(false);
        if is_mounted_flag {
            return format!(
                "function update{cap}DOM(value) {{\n\
                 \x20 document.querySelectorAll('[{marker}][data-bind-{name}]').forEach(function (el) {{\n\
                 \x20   el.textContent = value ? 'Mounted' : 'Not Mounted';\n\
                 \x20 }});\n\
                 \x20 var indicator = document.querySelector('.indicator[{marker}]');\n\
                 \x20 if (indicator) {{ indicator.classList.toggle('active', !!value); }}\n\
                 }}\n",
                cap = capitalize(name),
                marker = marker,
                name = name,
            );
        }

        format!(
            "function update{cap}DOM(value) {{\n\
             \x20 document.querySelectorAll('[{marker}][data-bind-{name}]').forEach(function (el) {{\n\
             \x20   el.textContent = (value !== null && typeof value === 'object') ? JSON.stringify(value) : value;\n\
             \x20 }});\n\
             }}\n",
            cap = capitalize(name),
            marker = marker,
            name = name,
        )
    }

    fn generate_setters(&self, variable: &ReactiveVariable) -> String {
        if !variable.is_object {
            return String::new();
        }
        let mut out = String::new();
        for path in &variable.paths {
            out.push_str(&format!(
                "function set{cap}{path_name}(value) {{\n\
                 \x20 _{name}.{path} = value;\n\
                 \x20 update{cap}DOM(_{name});\n\
                 }}\n",
                cap = capitalize(&variable.name),
                path_name = pascal_path(path),
                name = variable.name,
                path = path.join("."),
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::scope_id;
    use serde_json::json;

    fn names(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_find_declarations() {
        let declarations =
            find_reactive_declarations("count = wrap(0);\nuser = wrap({ name: 'Ada' })\n");
        assert_eq!(declarations.len(), 2);
        assert_eq!(declarations[0].name, "count");
        assert_eq!(declarations[0].initializer, "0");
        assert_eq!(declarations[1].initializer, "{ name: 'Ada' }");
    }

    #[test]
    fn test_find_declarations_skips_strings_and_members() {
        let declarations =
            find_reactive_declarations("let s = 'x = wrap(1)'; obj.y = wrap(2); z = wrap(3)");
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0].name, "z");
    }

    #[test]
    fn test_strip_declarations() {
        let script = "count = wrap(0);\nfunction inc() { count++; }";
        let declarations = find_reactive_declarations(script);
        let stripped = strip_declarations(script, &declarations);
        assert!(!stripped.contains("wrap"));
        assert!(stripped.contains("function inc()"));
    }

    #[test]
    fn test_rewrite_increment_decrement() {
        let set = names(&["x"]);
        assert_eq!(rewrite_mutations("x++", &set), "x(x() + 1)");
        assert_eq!(rewrite_mutations("x--", &set), "x(x() - 1)");
        assert_eq!(rewrite_mutations("++x", &set), "x(x() + 1)");
        assert_eq!(rewrite_mutations("--x", &set), "x(x() - 1)");
    }

    #[test]
    fn test_rewrite_assignments() {
        let set = names(&["x", "y"]);
        assert_eq!(rewrite_mutations("x = 5", &set), "x(5)");
        assert_eq!(rewrite_mutations("x += 2", &set), "x(x() + 2)");
        assert_eq!(rewrite_mutations("x -= 2", &set), "x(x() - 2)");
        // The right-hand side is rewritten too.
        assert_eq!(rewrite_mutations("x = y + 1", &set), "x(y() + 1)");
    }

    #[test]
    fn test_rewrite_bare_reads() {
        let set = names(&["x"]);
        assert_eq!(rewrite_mutations("console.log(x)", &set), "console.log(x())");
        assert_eq!(rewrite_mutations("if (x > 2) {}", &set), "if (x() > 2) {}");
        // Comparison is a read, not an assignment.
        assert_eq!(rewrite_mutations("x == 2", &set), "x() == 2");
        // Arrow parameter position is left as a call boundary case.
        assert_eq!(rewrite_mutations("x => 1", &set), "x => 1");
    }

    #[test]
    fn test_rewrite_leaves_calls_members_strings_comments() {
        let set = names(&["x"]);
        assert_eq!(rewrite_mutations("x(3)", &set), "x(3)");
        assert_eq!(rewrite_mutations("obj.x + 1", &set), "obj.x + 1");
        assert_eq!(rewrite_mutations("'x = 1'", &set), "'x = 1'");
        assert_eq!(rewrite_mutations("// x++\ny", &set), "// x++\ny");
        // Identifier boundaries: `xx` is a different name.
        assert_eq!(rewrite_mutations("xx + 1", &set), "xx + 1");
    }

    #[test]
    fn test_rewrite_object_member_write_reads_base() {
        let set = names(&["user"]);
        assert_eq!(
            rewrite_mutations("user.name = 'Ada'", &set),
            "user().name = 'Ada'"
        );
    }

    #[test]
    fn test_generate_accessor_and_updater() {
        let transformer = ReactivityTransformer::new(&scope_id("App"), false);
        let variable = ReactiveVariable {
            name: "x".to_string(),
            initializer: "0".to_string(),
            initial: Some(json!(0)),
            is_object: false,
            paths: vec![],
        };
        let js = transformer.generate(&[variable]);
        assert!(js.contains("let _x = 0;"));
        assert!(js.contains("function x(value)"));
        assert!(js.contains("if (arguments.length === 0) { return _x; }"));
        assert!(js.contains("function updateXDOM(value)"));
        assert!(js.contains("data-bind-x"));
        assert!(!js.contains("runUpdateHooks"));
    }

    #[test]
    fn test_generate_with_update_hooks() {
        let transformer = ReactivityTransformer::new(&scope_id("App"), true);
        let variable = ReactiveVariable {
            name: "count".to_string(),
            initializer: "0".to_string(),
            initial: Some(json!(0)),
            is_object: false,
            paths: vec![],
        };
        let js = transformer.generate(&[variable]);
        assert!(js.contains("runUpdateHooks('count');"));
    }

    #[test]
    fn test_generate_property_setters() {
        let transformer = ReactivityTransformer::new(&scope_id("App"), false);
        let variable = ReactiveVariable {
            name: "user".to_string(),
            initializer: "{ name: 'Ada' }".to_string(),
            initial: Some(json!({"name": "Ada"})),
            is_object: true,
            paths: vec![vec!["name".to_string()]],
        };
        let js = transformer.generate(&[variable]);
        assert!(js.contains("function setUserName(value)"));
        assert!(js.contains("_user.name = value;"));
        assert!(js.contains("updateUserDOM(_user);"));
    }

    #[test]
    fn test_mounted_special_case() {
        let transformer = ReactivityTransformer::new(&scope_id("App"), false);
        let variable = ReactiveVariable {
            name: "mounted".to_string(),
            initializer: "false".to_string(),
            initial: Some(json!(false)),
            is_object: false,
            paths: vec![],
        };
        let js = transformer.generate(&[variable]);
        assert!(js.contains("'Mounted' : 'Not Mounted'"));
        assert!(js.contains(".indicator"));
        assert!(js.contains("classList.toggle('active'"));
    }

    #[test]
    fn test_build_variables_paths_and_object_flag() {
        let transformer = ReactivityTransformer::new(&scope_id("App"), false);
        let declarations = find_reactive_declarations("user = wrap({ name: 'Ada' })");
        let refs = vec![TemplateRef {
            start: 0,
            end: 0,
            raw: "{{user.name}}".to_string(),
            expr: "user.name".to_string(),
            escaped: true,
            base: Some("user".to_string()),
            path: vec!["name".to_string()],
        }];
        let mut constants = HashMap::new();
        constants.insert(
            "user".to_string(),
            ConstValue::Literal(json!({"name": "Ada"})),
        );
        let variables = transformer.build_variables(&declarations, &constants, &refs);
        assert!(variables[0].is_object);
        assert_eq!(variables[0].paths, vec![vec!["name".to_string()]]);
    }
}
