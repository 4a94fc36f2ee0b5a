//! Scanning and identifier utilities shared across the pipeline
//!
//! The script body is treated as opaque text with narrow pattern
//! recognition, so every helper here is quote- and depth-aware rather than
//! grammar-aware.

pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if is_ident_start(c) => chars.all(is_ident_char),
        _ => false,
    }
}

/// Capitalize the first character: `count` -> `Count`.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Join path segments in PascalCase: `["address", "city"]` -> `AddressCity`.
pub fn pascal_path(segments: &[String]) -> String {
    segments.iter().map(|s| capitalize(s)).collect()
}

/// True when `name` occurs as a whole identifier in `text`, outside string
/// literals and comments. Used for dependency inference.
pub fn contains_identifier(text: &str, name: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
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
            '/' if i + 1 < chars.len() && chars[i + 1] == '/' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            '/' if i + 1 < chars.len() && chars[i + 1] == '*' => {
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
            }
            c if is_ident_start(c) => {
                let start = i;
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().collect();
                let preceded_by_dot = start > 0 && chars[start - 1] == '.';
                if ident == name && !preceded_by_dot {
                    return true;
                }
            }
            _ => i += 1,
        }
    }
    false
}

/// Find the index of the delimiter closing the one at `open_index`,
/// tracking nesting depth and skipping string literals. Returns `None` for
/// unbalanced input.
pub fn find_matching(text: &str, open_index: usize, open: char, close: char) -> Option<usize> {
    let chars: Vec<char> = text.chars().collect();
    if chars.get(open_index) != Some(&open) {
        return None;
    }
    let mut depth = 0usize;
    let mut string_delim: Option<char> = None;
    let mut i = open_index;
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
            '"' | '\'' | '`' => string_delim = Some(c),
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split on `sep` at the top level only: separators nested inside
/// parentheses, brackets, braces or strings do not count.
pub fn split_top_level(text: &str, sep: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut string_delim: Option<char> = None;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if let Some(delim) = string_delim {
            current.push(c);
            if c == '\\' {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
                continue;
            }
            if c == delim {
                string_delim = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => {
                string_delim = Some(c);
                current.push(c);
            }
            '(' | '[' | '{' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' | '}' => {
                depth -= 1;
                current.push(c);
            }
            c if c == sep && depth == 0 => {
                parts.push(current.trim().to_string());
                current = String::new();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        parts.push(current.trim().to_string());
    }
    parts
}

pub fn html_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escape text for embedding inside a JS template literal.
pub fn template_literal_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '`' => out.push_str("\\`"),
            '\\' => out.push_str("\\\\"),
            '$' if chars.get(i + 1) == Some(&'{') => out.push_str("\\$"),
            c => out.push(c),
        }
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_identifier() {
        assert!(is_valid_identifier("count"));
        assert!(is_valid_identifier("_private"));
        assert!(is_valid_identifier("item2"));
        assert!(!is_valid_identifier("2items"));
        assert!(!is_valid_identifier(""));
        assert!(!is_valid_identifier("a-b"));
    }

    #[test]
    fn test_capitalize_and_pascal_path() {
        assert_eq!(capitalize("count"), "Count");
        assert_eq!(
            pascal_path(&["address".to_string(), "city".to_string()]),
            "AddressCity"
        );
    }

    #[test]
    fn test_contains_identifier_boundaries() {
        assert!(contains_identifier("count + 1", "count"));
        assert!(!contains_identifier("counter + 1", "count"));
        assert!(!contains_identifier("discount", "count"));
        assert!(!contains_identifier("obj.count", "count"));
        assert!(!contains_identifier("'count'", "count"));
        assert!(!contains_identifier("// count", "count"));
        assert!(contains_identifier("total(count)", "count"));
    }

    #[test]
    fn test_find_matching_skips_strings() {
        let text = "wrap({ label: ')' })";
        let close = find_matching(text, 4, '(', ')').unwrap();
        assert_eq!(close, text.len() - 1);
    }

    #[test]
    fn test_find_matching_unbalanced() {
        assert_eq!(find_matching("wrap(1, [2", 4, '(', ')'), None);
    }

    #[test]
    fn test_split_top_level() {
        let parts = split_top_level("() => f(a, b), [a, b]", ',');
        assert_eq!(parts, vec!["() => f(a, b)", "[a, b]"]);
        let selectors = split_top_level(".a, .b:is(x, y)", ',');
        assert_eq!(selectors, vec![".a", ".b:is(x, y)"]);
    }

    #[test]
    fn test_template_literal_escape() {
        assert_eq!(template_literal_escape("a`b"), "a\\`b");
        assert_eq!(template_literal_escape("${x}"), "\\${x}");
        assert_eq!(template_literal_escape("$x"), "$x");
    }
}
