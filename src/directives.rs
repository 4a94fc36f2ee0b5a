//! Conditional and loop directive compilation
//!
//! Conditional runs (`if` + `else-if`* + `else`?) are grouped by scanning
//! forward over depth-matched element spans; each branch gets a unique
//! marker and one evaluator toggles display, run once at load. Loop
//! elements (`each="item[, index] in expr"`) keep their element as the
//! container: the inner markup becomes a template-literal item renderer
//! and the whole list is rebuilt as a single HTML string assignment, with
//! the render function chained onto every dependency's update function.

use crate::reactivity::rewrite_mutations;
use crate::template::inject_scope_markers;
use crate::utils::{capitalize, contains_identifier, is_ident_char, template_literal_escape};
use std::collections::HashSet;

pub struct DirectiveCompiler {
    scope_id: String,
    names: HashSet<String>,
    group_count: usize,
    each_count: usize,
    functions: String,
    wiring: String,
    init: String,
}

impl DirectiveCompiler {
    pub fn new(scope_id: &str, names: &HashSet<String>) -> Self {
        Self {
            scope_id: scope_id.to_string(),
            names: names.clone(),
            group_count: 0,
            each_count: 0,
            functions: String::new(),
            wiring: String::new(),
            init: String::new(),
        }
    }

    /// Transform the template, collecting generated JS along the way.
    pub fn compile(&mut self, template: &str) -> String {
        let chars: Vec<char> = template.chars().collect();
        let mut out = String::with_capacity(template.len());
        let mut i = 0;

        while i < chars.len() {
            let element = match next_element(&chars, i) {
                Some(element) => element,
                None => {
                    out.extend(&chars[i..]);
                    break;
                }
            };
            out.extend(&chars[i..element.start]);

            if get_attr(&element.attrs, "each").is_some() {
                let rendered = self.compile_loop(&chars, &element);
                out.push_str(&rendered);
                i = element.end;
            } else if get_attr(&element.attrs, "if").is_some() {
                let (rendered, next) = self.compile_conditional(&chars, element);
                out.push_str(&rendered);
                i = next;
            } else {
                // Plain element: copy the open tag and keep scanning inside
                // it, so nested directives are still found.
                out.extend(&chars[element.start..element.open_end]);
                i = element.open_end;
            }
        }

        out
    }

    /// Generated directive functions (evaluators and render functions).
    pub fn functions_js(&self) -> &str {
        &self.functions
    }

    /// Wrapper assignments chaining loop renders onto dependency updates.
    pub fn wiring_js(&self) -> &str {
        &self.wiring
    }

    /// Initial invocations, run once at load.
    pub fn init_js(&self) -> &str {
        &self.init
    }

    fn compile_conditional(&mut self, chars: &[char], first: ElementSpan) -> (String, usize) {
        let group = self.group_count;
        self.group_count += 1;

        struct Branch {
            element: ElementSpan,
            condition: Option<String>,
        }

        let mut branches = vec![Branch {
            condition: get_attr(&first.attrs, "if"),
            element: first,
        }];
        let mut gap_text: Vec<String> = Vec::new();

        // Scan forward over whitespace for else-if / else continuations.
        loop {
            let last_end = branches.last().unwrap().element.end;
            let mut j = last_end;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            let candidate = match next_element(chars, j) {
                Some(candidate) if candidate.start == j => candidate,
                _ => break,
            };
            if let Some(condition) = get_attr(&candidate.attrs, "else-if") {
                gap_text.push(chars[last_end..j].iter().collect());
                branches.push(Branch {
                    condition: Some(condition),
                    element: candidate,
                });
            } else if has_attr(&candidate.attrs, "else") {
                gap_text.push(chars[last_end..j].iter().collect());
                branches.push(Branch {
                    condition: None,
                    element: candidate,
                });
                break;
            } else {
                break;
            }
        }

        let chain_end = branches.last().unwrap().element.end;
        let mut rendered = String::new();
        let mut entries = String::new();

        for (index, branch) in branches.iter().enumerate() {
            if index > 0 {
                rendered.push_str(&gap_text[index - 1]);
            }
            let marker = format!("data-if-{}-{}-{}", self.scope_id, group, index);
            let element = &branch.element;
            let mut attrs = remove_attr(&element.attrs, "if");
            attrs = remove_attr(&attrs, "else-if");
            attrs = remove_attr(&attrs, "else");

            let inner: String = chars[element.inner_start..element.inner_end].iter().collect();
            let inner = self.compile(&inner);

            rendered.push('<');
            rendered.push_str(&element.tag);
            if !attrs.trim().is_empty() {
                rendered.push(' ');
                rendered.push_str(attrs.trim());
            }
            rendered.push(' ');
            rendered.push_str(&marker);
            if element.self_closing {
                rendered.push_str("/>");
            } else {
                rendered.push('>');
                rendered.push_str(&inner);
                rendered.push_str(&format!("</{}>", element.tag));
            }

            let test = match &branch.condition {
                Some(condition) => format!(
                    "function () {{ return ({}); }}",
                    rewrite_mutations(condition, &self.names)
                ),
                None => "null".to_string(),
            };
            entries.push_str(&format!(
                "    {{ el: document.querySelector('[{}]'), test: {} }},\n",
                marker, test
            ));
        }

        let eval_name = format!("evalIf_{}_{}", self.scope_id, group);
        self.functions.push_str(&format!(
            "function {name}() {{\n\
             \x20 var branches = [\n{entries}  ];\n\
             \x20 var matched = false;\n\
             \x20 branches.forEach(function (branch) {{\n\
             \x20   if (!branch.el) {{ return; }}\n\
             \x20   var take = !matched && (branch.test === null || branch.test());\n\
             \x20   branch.el.style.display = take ? '' : 'none';\n\
             \x20   if (take) {{ matched = true; }}\n\
             \x20 }});\n\
             }}\n",
            name = eval_name,
            entries = entries,
        ));
        self.init.push_str(&format!("{}();\n", eval_name));

        (rendered, chain_end)
    }

    fn compile_loop(&mut self, chars: &[char], element: &ElementSpan) -> String {
        let index = self.each_count;
        self.each_count += 1;

        let binding = get_attr(&element.attrs, "each").unwrap_or_default();
        let (item, item_index, array_expr) = match parse_each_binding(&binding) {
            Some(parsed) => parsed,
            None => {
                log::warn!("ignoring malformed each directive '{}'", binding);
                let raw: String = chars[element.start..element.end].iter().collect();
                return raw;
            }
        };

        // Loop locals shadow reactive names inside the item template.
        let mut loop_names = self.names.clone();
        loop_names.remove(&item);
        if let Some(idx) = &item_index {
            loop_names.remove(idx);
        }

        let inner: String = chars[element.inner_start..element.inner_end].iter().collect();
        let item_template = build_item_template(&inner, &loop_names);
        let item_template = inject_scope_markers(&item_template, &self.scope_id);

        let marker = format!("data-each-{}-{}", self.scope_id, index);
        let attrs = remove_attr(&element.attrs, "each");
        let mut rendered = String::new();
        rendered.push('<');
        rendered.push_str(&element.tag);
        if !attrs.trim().is_empty() {
            rendered.push(' ');
            rendered.push_str(attrs.trim());
        }
        rendered.push(' ');
        rendered.push_str(&marker);
        rendered.push_str(&format!("></{}>", element.tag));

        let render_name = format!("renderEach_{}_{}", self.scope_id, index);
        let holder = format!("_eachEl_{}_{}", self.scope_id, index);
        let rewritten_expr = rewrite_mutations(&array_expr, &self.names);
        let index_line = match &item_index {
            Some(idx) => format!("    var {} = _i;\n", idx),
            None => String::new(),
        };

        self.functions.push_str(&format!(
            "var {holder} = null;\n\
             function {name}() {{\n\
             \x20 var el = document.querySelector('[{marker}]') || {holder};\n\
             \x20 if (!el) {{ return; }}\n\
             \x20 {holder} = el;\n\
             \x20 var source = ({expr});\n\
             \x20 var out = '';\n\
             \x20 for (var _i = 0; _i < source.length; _i++) {{\n\
             \x20   var {item} = source[_i];\n\
             {index_line}\
             \x20   out += `{template}`;\n\
             \x20 }}\n\
             \x20 el.innerHTML = out;\n\
             }}\n",
            holder = holder,
            name = render_name,
            marker = marker,
            expr = rewritten_expr,
            item = item,
            index_line = index_line,
            template = item_template,
        ));
        self.init.push_str(&format!("{}();\n", render_name));

        // Re-render whenever any used reactive value (the array included)
        // changes.
        let mut deps: Vec<&String> = self
            .names
            .iter()
            .filter(|name| {
                contains_identifier(&array_expr, name) || contains_identifier(&inner, name)
            })
            .collect();
        deps.sort();
        for dep in deps {
            self.wiring.push_str(&format!(
                "update{dep}DOM = (function (prev) {{ return function (value) {{ prev(value); {render}(); }}; }})(update{dep}DOM);\n",
                dep = capitalize(dep),
                render = render_name,
            ));
        }

        rendered
    }
}

/// Convert the loop element's inner markup into a JS template literal:
/// interpolations become `${...}` with reactive reads rewritten to
/// accessor calls, static text is escaped.
fn build_item_template(inner: &str, names: &HashSet<String>) -> String {
    let refs = crate::template::parse_refs(inner);
    let chars: Vec<char> = inner.chars().collect();
    let mut out = String::new();
    let mut cursor = 0;
    for reference in &refs {
        if reference.start > cursor {
            let text: String = chars[cursor..reference.start].iter().collect();
            out.push_str(&template_literal_escape(&text));
        }
        cursor = reference.end;
        out.push_str("${");
        out.push_str(&rewrite_mutations(&reference.expr, names));
        out.push('}');
    }
    if cursor < chars.len() {
        let text: String = chars[cursor..].iter().collect();
        out.push_str(&template_literal_escape(&text));
    }
    out
}

/// Parse `item in expr` or `item, index in expr`.
fn parse_each_binding(binding: &str) -> Option<(String, Option<String>, String)> {
    let in_pos = find_top_level_in(binding)?;
    let lhs = binding[..in_pos].trim();
    let array_expr = binding[in_pos + 4..].trim();
    if array_expr.is_empty() {
        return None;
    }
    let mut parts = lhs.split(',').map(|p| p.trim());
    let item = parts.next()?.to_string();
    if !crate::utils::is_valid_identifier(&item) {
        return None;
    }
    let item_index = match parts.next() {
        Some(idx) if crate::utils::is_valid_identifier(idx) => Some(idx.to_string()),
        Some(_) => return None,
        None => None,
    };
    Some((item, item_index, array_expr.to_string()))
}

/// Position of the binding ` in ` keyword, outside brackets and strings.
fn find_top_level_in(binding: &str) -> Option<usize> {
    let chars: Vec<char> = binding.chars().collect();
    let mut depth = 0i32;
    let mut string_delim: Option<char> = None;
    for i in 0..chars.len() {
        let c = chars[i];
        if let Some(delim) = string_delim {
            if c == delim {
                string_delim = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => string_delim = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            'i' if depth == 0
                && i > 0
                && chars[i - 1].is_whitespace()
                && chars.get(i + 1) == Some(&'n')
                && chars.get(i + 2).map(|&c| c.is_whitespace()).unwrap_or(false) =>
            {
                return Some(i - 1);
            }
            _ => {}
        }
    }
    None
}

#[derive(Debug, Clone)]
struct ElementSpan {
    start: usize,
    tag: String,
    attrs: String,
    /// Index just past the `>` of the open tag.
    open_end: usize,
    inner_start: usize,
    inner_end: usize,
    /// Index just past the closing tag (== open_end when self-closing).
    end: usize,
    self_closing: bool,
}

/// Find the next element open tag at or after `from` and resolve its
/// balanced closing tag by tag-name depth.
fn next_element(chars: &[char], from: usize) -> Option<ElementSpan> {
    let mut i = from;
    loop {
        while i < chars.len() && chars[i] != '<' {
            i += 1;
        }
        if i + 1 >= chars.len() {
            return None;
        }
        if !chars[i + 1].is_ascii_alphabetic() {
            i += 1;
            continue;
        }

        let start = i;
        let mut j = i + 1;
        while j < chars.len() && (is_ident_char(chars[j]) || chars[j] == '-') {
            j += 1;
        }
        let tag: String = chars[i + 1..j].iter().collect();

        // Walk to the end of the open tag, respecting quotes.
        let attrs_start = j;
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
            return None;
        }

        let self_closing = chars[j - 1] == '/' || is_void_tag(&tag);
        let attrs_end = if chars[j - 1] == '/' { j - 1 } else { j };
        let attrs: String = chars[attrs_start..attrs_end].iter().collect();
        let open_end = j + 1;

        if self_closing {
            return Some(ElementSpan {
                start,
                tag,
                attrs: attrs.trim().to_string(),
                open_end,
                inner_start: open_end,
                inner_end: open_end,
                end: open_end,
                self_closing: true,
            });
        }

        let (inner_end, end) = find_balanced_close(chars, open_end, &tag)?;
        return Some(ElementSpan {
            start,
            tag,
            attrs: attrs.trim().to_string(),
            open_end,
            inner_start: open_end,
            inner_end,
            end,
            self_closing: false,
        });
    }
}

fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag.to_ascii_lowercase().as_str(),
        "br" | "hr" | "img" | "input" | "meta" | "link" | "area" | "base" | "col" | "embed"
            | "source" | "track" | "wbr"
    )
}

/// Returns (inner_end, end) for the element whose content starts at
/// `from`, matching same-named open/close tags by depth.
fn find_balanced_close(chars: &[char], from: usize, tag: &str) -> Option<(usize, usize)> {
    let mut depth = 1usize;
    let mut i = from;
    while i < chars.len() {
        if chars[i] != '<' {
            i += 1;
            continue;
        }
        if chars.get(i + 1) == Some(&'/') {
            let mut j = i + 2;
            let name_start = j;
            while j < chars.len() && (is_ident_char(chars[j]) || chars[j] == '-') {
                j += 1;
            }
            let name: String = chars[name_start..j].iter().collect();
            while j < chars.len() && chars[j] != '>' {
                j += 1;
            }
            if name.eq_ignore_ascii_case(tag) {
                depth -= 1;
                if depth == 0 {
                    return Some((i, j + 1));
                }
            }
            i = j + 1;
            continue;
        }
        if chars.get(i + 1).map(|c| c.is_ascii_alphabetic()).unwrap_or(false) {
            let mut j = i + 1;
            let name_start = j;
            while j < chars.len() && (is_ident_char(chars[j]) || chars[j] == '-') {
                j += 1;
            }
            let name: String = chars[name_start..j].iter().collect();
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
                return None;
            }
            let self_closing = chars[j - 1] == '/' || is_void_tag(&name);
            if name.eq_ignore_ascii_case(tag) && !self_closing {
                depth += 1;
            }
            i = j + 1;
            continue;
        }
        i += 1;
    }
    None
}

fn get_attr(attrs: &str, name: &str) -> Option<String> {
    for (attr_name, value) in parse_attrs(attrs) {
        if attr_name == name {
            return value.or(Some(String::new()));
        }
    }
    None
}

fn has_attr(attrs: &str, name: &str) -> bool {
    parse_attrs(attrs).iter().any(|(n, _)| n == name)
}

fn remove_attr(attrs: &str, name: &str) -> String {
    parse_attrs(attrs)
        .into_iter()
        .filter(|(n, _)| n != name)
        .map(|(n, v)| match v {
            Some(value) => format!("{}=\"{}\"", n, value),
            None => n,
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Tokenize raw attribute text into (name, optional value) pairs.
fn parse_attrs(attrs: &str) -> Vec<(String, Option<String>)> {
    let chars: Vec<char> = attrs.chars().collect();
    let mut pairs = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }
        let name_start = i;
        while i < chars.len() && !chars[i].is_whitespace() && chars[i] != '=' {
            i += 1;
        }
        let name: String = chars[name_start..i].iter().collect();
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        if chars.get(i) != Some(&'=') {
            if !name.is_empty() {
                pairs.push((name, None));
            }
            continue;
        }
        i += 1;
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }
        let value = match chars.get(i) {
            Some(&q) if q == '"' || q == '\'' => {
                i += 1;
                let value_start = i;
                while i < chars.len() && chars[i] != q {
                    i += 1;
                }
                let value: String = chars[value_start..i].iter().collect();
                i += 1;
                value
            }
            _ => {
                let value_start = i;
                while i < chars.len() && !chars[i].is_whitespace() {
                    i += 1;
                }
                chars[value_start..i].iter().collect()
            }
        };
        pairs.push((name, Some(value)));
    }
    pairs
}
