//! Hand-rolled structural CSS parser
//!
//! A single-pass character state machine that turns raw CSS text into
//! ordered `CssRule` records. It understands comments, quoted strings,
//! comma-separated selector lists, declaration blocks and `@`-rules with
//! one extra nesting level. Malformed input degrades gracefully:
//! unterminated rules are dropped, never a panic.

use crate::types::{CssProperty, CssRule};
use crate::utils::split_top_level;

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Between,
    Selector,
    AtPrelude,
    Property,
    Value,
}

pub struct CssParser;

impl CssParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, css: &str) -> Vec<CssRule> {
        let chars: Vec<char> = css.chars().collect();
        let mut rules = Vec::new();

        let mut state = State::Between;
        let mut selector_buf = String::new();
        let mut prelude_buf = String::new();
        let mut name_buf = String::new();
        let mut value_buf = String::new();
        let mut properties: Vec<CssProperty> = Vec::new();
        let mut selectors: Vec<String> = Vec::new();
        // Prelude of the @-rule body we are currently inside, if any.
        let mut current_at: Option<String> = None;
        // Paren depth inside a value, so `url(a;b)` never ends a declaration.
        let mut value_parens = 0usize;

        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];

            // Comments are skipped from every state.
            if c == '/' && chars.get(i + 1) == Some(&'*') {
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                i = (i + 2).min(chars.len());
                continue;
            }

            // Quoted strings never change state; copy them verbatim into
            // the buffer the current state is filling.
            if (c == '"' || c == '\'') && state != State::Between {
                let buf = match state {
                    State::Selector => &mut selector_buf,
                    State::AtPrelude => &mut prelude_buf,
                    State::Property => &mut name_buf,
                    State::Value => &mut value_buf,
                    State::Between => unreachable!(),
                };
                buf.push(c);
                i += 1;
                while i < chars.len() {
                    buf.push(chars[i]);
                    if chars[i] == '\\' {
                        if let Some(&escaped) = chars.get(i + 1) {
                            buf.push(escaped);
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

            match state {
                State::Between => match c {
                    '@' => {
                        prelude_buf.clear();
                        prelude_buf.push('@');
                        state = State::AtPrelude;
                    }
                    '}' => {
                        // Closing an @-rule body.
                        current_at = None;
                    }
                    c if c.is_whitespace() => {}
                    _ => {
                        selector_buf.clear();
                        selector_buf.push(c);
                        state = State::Selector;
                    }
                },
                State::Selector => match c {
                    '{' => {
                        selectors = split_top_level(&selector_buf, ',');
                        properties = Vec::new();
                        name_buf.clear();
                        state = State::Property;
                    }
                    '}' | ';' => {
                        // Malformed selector without a block; drop it.
                        selector_buf.clear();
                        state = State::Between;
                    }
                    _ => selector_buf.push(c),
                },
                State::AtPrelude => match c {
                    ';' => {
                        rules.push(CssRule {
                            selectors: Vec::new(),
                            properties: Vec::new(),
                            at_prelude: Some(prelude_buf.trim().to_string()),
                        });
                        state = State::Between;
                    }
                    '{' => {
                        current_at = Some(prelude_buf.trim().to_string());
                        state = State::Between;
                    }
                    _ => prelude_buf.push(c),
                },
                State::Property => match c {
                    ':' => {
                        value_buf.clear();
                        value_parens = 0;
                        state = State::Value;
                    }
                    ';' => name_buf.clear(),
                    '}' => {
                        if !selectors.is_empty() {
                            rules.push(CssRule {
                                selectors: std::mem::take(&mut selectors),
                                properties: std::mem::take(&mut properties),
                                at_prelude: current_at.clone(),
                            });
                        }
                        name_buf.clear();
                        state = State::Between;
                    }
                    _ => name_buf.push(c),
                },
                State::Value => match c {
                    '(' => {
                        value_parens += 1;
                        value_buf.push(c);
                    }
                    ')' => {
                        value_parens = value_parens.saturating_sub(1);
                        value_buf.push(c);
                    }
                    ';' if value_parens == 0 => {
                        push_property(&mut properties, &mut name_buf, &mut value_buf);
                        state = State::Property;
                    }
                    '}' if value_parens == 0 => {
                        push_property(&mut properties, &mut name_buf, &mut value_buf);
                        if !selectors.is_empty() {
                            rules.push(CssRule {
                                selectors: std::mem::take(&mut selectors),
                                properties: std::mem::take(&mut properties),
                                at_prelude: current_at.clone(),
                            });
                        }
                        state = State::Between;
                    }
                    _ => value_buf.push(c),
                },
            }
            i += 1;
        }

        // Anything still open at end of input is an unterminated rule and
        // is dropped.
        rules
    }
}

impl Default for CssParser {
    fn default() -> Self {
        Self::new()
    }
}

fn push_property(properties: &mut Vec<CssProperty>, name: &mut String, value: &mut String) {
    let n = name.trim().to_string();
    let v = value.trim().to_string();
    name.clear();
    value.clear();
    if !n.is_empty() && !v.is_empty() {
        properties.push(CssProperty { name: n, value: v });
    }
}

/// Serialize rule records back to CSS text, regrouping consecutive rules
/// that share an `@`-rule prelude into one block.
pub fn write_stylesheet(rules: &[CssRule]) -> String {
    let mut out = String::new();
    let mut i = 0;
    while i < rules.len() {
        let rule = &rules[i];
        match &rule.at_prelude {
            None => {
                write_rule(&mut out, rule, "");
                i += 1;
            }
            Some(prelude) if rule.selectors.is_empty() => {
                // Standalone at-rule such as `@import`.
                out.push_str(prelude);
                out.push_str(";\n");
                i += 1;
            }
            Some(prelude) => {
                out.push_str(prelude);
                out.push_str(" {\n");
                while i < rules.len()
                    && rules[i].at_prelude.as_deref() == Some(prelude.as_str())
                    && !rules[i].selectors.is_empty()
                {
                    write_rule(&mut out, &rules[i], "  ");
                    i += 1;
                }
                out.push_str("}\n");
            }
        }
    }
    out
}

fn write_rule(out: &mut String, rule: &CssRule, indent: &str) {
    out.push_str(indent);
    out.push_str(&rule.selectors.join(", "));
    out.push_str(" {");
    for property in &rule.properties {
        out.push(' ');
        out.push_str(&property.name);
        out.push_str(": ");
        out.push_str(&property.value);
        out.push(';');
    }
    out.push_str(" }\n");
}
