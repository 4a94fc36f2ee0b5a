//! Compile-time constant extraction
//!
//! Finds literal initial values in the script section: reactive
//! declarations with a literal argument (`name = wrap(literal)`) and plain
//! `const name = literal` declarations. Literals are parsed by a small
//! recursive-descent parser into `serde_json::Value`, never by evaluating
//! host-language code. Externally supplied override values (route params, props)
//! always win over extracted values.

use crate::reactivity::find_reactive_declarations;
use crate::session::CompileSession;
use crate::utils::{is_ident_char, is_ident_start};
use serde_json::Value;
use std::collections::HashMap;

/// An extracted compile-time value.
///
/// `Raw` keeps initializer text that did not parse as a literal; it can
/// seed a backing variable but is never a provable constant for template
/// substitution.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstValue {
    Literal(Value),
    Raw(String),
}

impl ConstValue {
    pub fn as_literal(&self) -> Option<&Value> {
        match self {
            ConstValue::Literal(value) => Some(value),
            ConstValue::Raw(_) => None,
        }
    }

    /// Display text for direct substitution into template output.
    pub fn render_html(&self) -> String {
        match self {
            ConstValue::Literal(Value::String(s)) => s.clone(),
            ConstValue::Literal(value) => value.to_string(),
            ConstValue::Raw(raw) => raw.clone(),
        }
    }

    /// JS initializer text. JSON literals are valid JS expressions.
    pub fn render_js(&self) -> String {
        match self {
            ConstValue::Literal(value) => value.to_string(),
            ConstValue::Raw(raw) => raw.clone(),
        }
    }
}

pub struct ConstantExtractor;

impl ConstantExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the name -> value map from a script, merging `props`
    /// overrides on top.
    pub fn extract(
        &self,
        script: &str,
        props: &HashMap<String, Value>,
        session: &mut CompileSession,
    ) -> HashMap<String, ConstValue> {
        let mut constants = HashMap::new();

        for declaration in find_reactive_declarations(script) {
            let value = match parse_literal_cached(session, &declaration.initializer) {
                Some(literal) => ConstValue::Literal(literal),
                None => ConstValue::Raw(declaration.initializer.clone()),
            };
            constants.insert(declaration.name.clone(), value);
        }

        for (name, text) in find_const_declarations(script) {
            let value = match parse_literal_cached(session, &text) {
                Some(literal) => ConstValue::Literal(literal),
                None => ConstValue::Raw(text),
            };
            constants.insert(name, value);
        }

        for (name, value) in props {
            constants.insert(name.clone(), ConstValue::Literal(value.clone()));
        }

        constants
    }
}

impl Default for ConstantExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan for `const name = <initializer>` declarations. The initializer
/// runs to the first top-level `;` or newline, tracked through brackets
/// and strings.
fn find_const_declarations(script: &str) -> Vec<(String, String)> {
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
                while i < chars.len() && is_ident_char(chars[i]) {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let preceded_by_dot = start > 0 && chars[start - 1] == '.';
                if word != "const" || preceded_by_dot {
                    continue;
                }
                let mut j = skip_ws(&chars, i);
                if j >= chars.len() || !is_ident_start(chars[j]) {
                    continue;
                }
                let name_start = j;
                while j < chars.len() && is_ident_char(chars[j]) {
                    j += 1;
                }
                let name: String = chars[name_start..j].iter().collect();
                j = skip_ws(&chars, j);
                if chars.get(j) != Some(&'=') || chars.get(j + 1) == Some(&'=') {
                    continue;
                }
                let rhs_start = j + 1;
                let rhs_end = statement_end(&chars, rhs_start);
                let initializer: String = chars[rhs_start..rhs_end].iter().collect();
                let initializer = initializer.trim().to_string();
                if !initializer.is_empty() {
                    found.push((name, initializer));
                }
                i = rhs_end;
            }
            _ => i += 1,
        }
    }
    found
}

fn skip_ws(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

/// Index of the first top-level `;` or newline after `from`, or the end of
/// input. Newlines inside brackets do not terminate the statement.
pub(crate) fn statement_end(chars: &[char], from: usize) -> usize {
    let mut depth = 0i32;
    let mut string_delim: Option<char> = None;
    let mut i = from;
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
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                if depth == 0 {
                    return i;
                }
                depth -= 1;
            }
            ';' if depth == 0 => return i,
            '\n' if depth == 0 => return i,
            _ => {}
        }
        i += 1;
    }
    chars.len()
}

/// Parse a restricted literal grammar: numbers, strings (single or double
/// quoted), booleans, null, arrays and objects. Returns `None` when the
/// text is not entirely one literal.
pub fn parse_literal(text: &str) -> Option<Value> {
    let chars: Vec<char> = text.chars().collect();
    let mut parser = LiteralParser { chars: &chars, pos: 0 };
    let value = parser.parse_value()?;
    parser.skip_ws();
    if parser.pos == parser.chars.len() {
        Some(value)
    } else {
        None
    }
}

pub fn parse_literal_cached(session: &mut CompileSession, text: &str) -> Option<Value> {
    if let Some(cached) = session.literal_cache.get(text) {
        return cached.clone();
    }
    let parsed = parse_literal(text);
    session
        .literal_cache
        .insert(text.to_string(), parsed.clone());
    parsed
}

struct LiteralParser<'a> {
    chars: &'a [char],
    pos: usize,
}

impl<'a> LiteralParser<'a> {
    fn skip_ws(&mut self) {
        while self.pos < self.chars.len() && self.chars[self.pos].is_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let end = self.pos + keyword.len();
        if end > self.chars.len() {
            return false;
        }
        let slice: String = self.chars[self.pos..end].iter().collect();
        if slice != keyword {
            return false;
        }
        if let Some(&next) = self.chars.get(end) {
            if is_ident_char(next) {
                return false;
            }
        }
        self.pos = end;
        true
    }

    fn parse_value(&mut self) -> Option<Value> {
        self.skip_ws();
        match self.peek()? {
            '"' | '\'' => self.parse_string().map(Value::String),
            '[' => self.parse_array(),
            '{' => self.parse_object(),
            't' => self.eat_keyword("true").then(|| Value::Bool(true)),
            'f' => self.eat_keyword("false").then(|| Value::Bool(false)),
            'n' => self.eat_keyword("null").then(|| Value::Null),
            c if c == '-' || c.is_ascii_digit() => self.parse_number(),
            _ => None,
        }
    }

    fn parse_string(&mut self) -> Option<String> {
        let quote = self.peek()?;
        self.pos += 1;
        let mut out = String::new();
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == quote {
                return Some(out);
            }
            if c == '\\' {
                let escaped = self.peek()?;
                self.pos += 1;
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    other => out.push(other),
                }
                continue;
            }
            out.push(c);
        }
        None
    }

    fn parse_number(&mut self) -> Option<Value> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == '.' || c == 'e' || c == 'E' || c == '+' || c == '-' {
                // `+`/`-` only continue a number directly after an exponent.
                if (c == '+' || c == '-')
                    && !matches!(self.chars.get(self.pos - 1), Some('e') | Some('E'))
                {
                    break;
                }
                self.pos += 1;
            } else {
                break;
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if let Ok(int) = text.parse::<i64>() {
            return Some(Value::Number(int.into()));
        }
        let float = text.parse::<f64>().ok()?;
        serde_json::Number::from_f64(float).map(Value::Number)
    }

    fn parse_array(&mut self) -> Option<Value> {
        self.eat('[');
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.eat(']') {
                return Some(Value::Array(items));
            }
            items.push(self.parse_value()?);
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            if self.eat(']') {
                return Some(Value::Array(items));
            }
            return None;
        }
    }

    fn parse_object(&mut self) -> Option<Value> {
        self.eat('{');
        let mut map = serde_json::Map::new();
        loop {
            self.skip_ws();
            if self.eat('}') {
                return Some(Value::Object(map));
            }
            let key = match self.peek()? {
                '"' | '\'' => self.parse_string()?,
                c if is_ident_start(c) => {
                    let start = self.pos;
                    while self.pos < self.chars.len() && is_ident_char(self.chars[self.pos]) {
                        self.pos += 1;
                    }
                    self.chars[start..self.pos].iter().collect()
                }
                _ => return None,
            };
            self.skip_ws();
            if !self.eat(':') {
                return None;
            }
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_ws();
            if self.eat(',') {
                continue;
            }
            if self.eat('}') {
                return Some(Value::Object(map));
            }
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_scalars() {
        assert_eq!(parse_literal("42"), Some(json!(42)));
        assert_eq!(parse_literal("-3.5"), Some(json!(-3.5)));
        assert_eq!(parse_literal("true"), Some(json!(true)));
        assert_eq!(parse_literal("null"), Some(json!(null)));
        assert_eq!(parse_literal("\"hi\""), Some(json!("hi")));
        assert_eq!(parse_literal("'hi'"), Some(json!("hi")));
    }

    #[test]
    fn test_parse_nested_structures() {
        assert_eq!(
            parse_literal("[1, 'two', [3]]"),
            Some(json!([1, "two", [3]]))
        );
        assert_eq!(
            parse_literal("{ name: 'Ada', tags: ['a', 'b'], meta: { id: 1 } }"),
            Some(json!({"name": "Ada", "tags": ["a", "b"], "meta": {"id": 1}}))
        );
    }

    #[test]
    fn test_parse_rejects_expressions() {
        assert_eq!(parse_literal("1 + 2"), None);
        assert_eq!(parse_literal("new Date()"), None);
        assert_eq!(parse_literal("[1, 2"), None);
        assert_eq!(parse_literal("truely"), None);
    }

    #[test]
    fn test_extract_wrap_and_const() {
        let mut session = CompileSession::new();
        let script = "count = wrap(0)\nconst label = 'Items'\nuser = wrap({ name: 'Ada' })";
        let constants =
            ConstantExtractor::new().extract(script, &HashMap::new(), &mut session);
        assert_eq!(constants["count"], ConstValue::Literal(json!(0)));
        assert_eq!(constants["label"], ConstValue::Literal(json!("Items")));
        assert_eq!(
            constants["user"],
            ConstValue::Literal(json!({"name": "Ada"}))
        );
    }

    #[test]
    fn test_unparseable_initializer_falls_back_to_raw() {
        let mut session = CompileSession::new();
        let constants = ConstantExtractor::new().extract(
            "stamp = wrap(Date.now())",
            &HashMap::new(),
            &mut session,
        );
        assert_eq!(
            constants["stamp"],
            ConstValue::Raw("Date.now()".to_string())
        );
        assert!(constants["stamp"].as_literal().is_none());
    }

    #[test]
    fn test_props_override_extracted_values() {
        let mut session = CompileSession::new();
        let mut props = HashMap::new();
        props.insert("count".to_string(), json!(9));
        let constants =
            ConstantExtractor::new().extract("count = wrap(0)", &props, &mut session);
        assert_eq!(constants["count"], ConstValue::Literal(json!(9)));
    }

    #[test]
    fn test_render_forms() {
        assert_eq!(ConstValue::Literal(json!("hi")).render_html(), "hi");
        assert_eq!(ConstValue::Literal(json!("hi")).render_js(), "\"hi\"");
        assert_eq!(ConstValue::Literal(json!(3)).render_html(), "3");
        assert_eq!(ConstValue::Raw("Date.now()".into()).render_js(), "Date.now()");
    }

    #[test]
    fn test_const_scan_ignores_strings_and_members() {
        let found = find_const_declarations("let s = 'const x = 1'; obj.const = 2; const y = 3;");
        assert_eq!(found, vec![("y".to_string(), "3".to_string())]);
    }
}
