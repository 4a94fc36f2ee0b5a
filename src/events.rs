//! Inline event handler compilation
//!
//! Rewrites `onX="code"` attribute bodies through the reactivity mutation
//! rewrite, hoists each into a uniquely named, window-addressable function
//! and replaces the attribute value with a call. An extra DOM-update call
//! is appended only when the handler mutates a reactive value in a way the
//! rewritten accessor calls do not already cover (array method mutation).

use crate::reactivity::rewrite_mutations;
use crate::utils::capitalize;
use regex::Regex;
use std::collections::HashSet;

const MUTATING_METHODS: [&str; 7] =
    ["push", "pop", "splice", "shift", "unshift", "sort", "reverse"];

pub struct EventHandlerCompiler {
    scope_id: String,
    names: HashSet<String>,
    attr_regex: Regex,
}

impl EventHandlerCompiler {
    pub fn new(scope_id: &str, names: &HashSet<String>) -> Self {
        Self {
            scope_id: scope_id.to_string(),
            names: names.clone(),
            attr_regex: Regex::new(r#"\bon([a-z]+)\s*=\s*"([^"]*)""#).unwrap(),
        }
    }

    /// Replace inline handler attributes in the template and return the
    /// transformed template plus the generated handler definitions.
    pub fn compile(&self, template: &str) -> (String, String) {
        let mut js = String::new();
        let mut counter = 0usize;

        let rewritten_template = self
            .attr_regex
            .replace_all(template, |captures: &regex::Captures| {
                let event_name = &captures[1];
                let body = captures[2].trim();
                if body.is_empty() {
                    return captures[0].to_string();
                }

                let handler_name = format!("fxHandler_{}_{}", self.scope_id, counter);
                counter += 1;

                let mut rewritten = rewrite_mutations(body, &self.names);
                if !rewritten.ends_with(';') {
                    rewritten.push(';');
                }

                for name in self.extra_update_targets(&rewritten) {
                    rewritten.push_str(&format!(
                        " update{}DOM({}());",
                        capitalize(&name),
                        name
                    ));
                }

                js.push_str(&format!(
                    "window.{name} = function (event) {{ {body} }};\n",
                    name = handler_name,
                    body = rewritten,
                ));

                format!("on{}=\"{}(event)\"", event_name, handler_name)
            })
            .into_owned();

        (rewritten_template, js)
    }

    /// Reactive names mutated through array methods, which bypass the
    /// accessor and so still need an explicit update.
    fn extra_update_targets(&self, rewritten: &str) -> Vec<String> {
        let mut targets = Vec::new();
        for name in &self.names {
            let mutated = MUTATING_METHODS
                .iter()
                .any(|method| rewritten.contains(&format!("{}().{}(", name, method)));
            if mutated {
                targets.push(name.clone());
            }
        }
        targets.sort();
        targets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> HashSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn compile(template: &str, reactive: &[&str]) -> (String, String) {
        EventHandlerCompiler::new("abc123", &names(reactive)).compile(template)
    }

    #[test]
    fn test_click_handler_rewritten() {
        let (html, js) = compile("<button onclick=\"count++\">+</button>", &["count"]);
        assert_eq!(
            html,
            "<button onclick=\"fxHandler_abc123_0(event)\">+</button>"
        );
        assert!(js.contains("window.fxHandler_abc123_0 = function (event)"));
        assert!(js.contains("count(count() + 1);"));
        // Accessor call already triggers the DOM update.
        assert!(!js.contains("updateCountDOM("));
    }

    #[test]
    fn test_multiple_handlers_numbered() {
        let (html, js) = compile(
            "<button onclick=\"a = 1\">x</button><input oninput=\"b = 2\">",
            &["a", "b"],
        );
        assert!(html.contains("fxHandler_abc123_0(event)"));
        assert!(html.contains("fxHandler_abc123_1(event)"));
        assert!(js.contains("a(1);"));
        assert!(js.contains("b(2);"));
    }

    #[test]
    fn test_array_mutation_gets_extra_update() {
        let (_, js) = compile(
            "<button onclick=\"items.push('x')\">add</button>",
            &["items"],
        );
        assert!(js.contains("items().push('x');"));
        assert!(js.contains("updateItemsDOM(items());"));
    }

    #[test]
    fn test_empty_handler_left_alone() {
        let (html, js) = compile("<button onclick=\"\">noop</button>", &["x"]);
        assert_eq!(html, "<button onclick=\"\">noop</button>");
        assert!(js.is_empty());
    }

    #[test]
    fn test_non_event_attributes_untouched() {
        let (html, _) = compile("<a href=\"x\" font=\"y\">l</a>", &["x"]);
        assert_eq!(html, "<a href=\"x\" font=\"y\">l</a>");
    }
}
