//! Lifecycle hook extraction and the two-half code split
//!
//! Hooks are pulled out of the script before the mutation rewrite runs, so
//! callback text is never transformed. Generated code comes in two halves:
//! declarations (hook arrays and runners, emitted before the reactivity
//! wrappers that may reference the update runner) and execution (the
//! invocations, emitted after every function is declared).

use crate::types::{HookKind, LifecycleHook};
use crate::utils::{find_matching, is_ident_char, is_ident_start};

const HOOK_KINDS: [HookKind; 3] = [HookKind::Mount, HookKind::Destroy, HookKind::Update];

/// Extract `mount(...)`, `destroy(...)` and `update(...)` calls from the
/// script, returning the script with the calls removed plus the hooks in
/// source order. Paren and brace depth tracking captures complete callback
/// bodies even when they contain nested braces.
pub fn extract_hooks(script: &str) -> (String, Vec<LifecycleHook>) {
    let chars: Vec<char> = script.chars().collect();
    let mut hooks = Vec::new();
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
                let word: String = chars[start..i].iter().collect();
                let kind = match HOOK_KINDS.iter().find(|k| k.callee() == word) {
                    Some(kind) => *kind,
                    None => continue,
                };
                let open = skip_ws(&chars, i);
                if chars.get(open) != Some(&'(') {
                    continue;
                }
                let text: String = chars.iter().collect();
                let close = match find_matching(&text, open, '(', ')') {
                    Some(close) => close,
                    None => continue,
                };
                let body: String = chars[open + 1..close].iter().collect();
                let mut end = close + 1;
                let after = skip_ws(&chars, end);
                if chars.get(after) == Some(&';') {
                    end = after + 1;
                }
                hooks.push(LifecycleHook {
                    kind,
                    body: body.trim().to_string(),
                    offset: start,
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
    (out, hooks)
}

fn skip_ws(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i].is_whitespace() {
        i += 1;
    }
    i
}

fn hooks_of(hooks: &[LifecycleHook], kind: HookKind) -> Vec<&LifecycleHook> {
    hooks.iter().filter(|h| h.kind == kind).collect()
}

/// Hook arrays, runner functions and registrations. Must precede the
/// reactive accessor functions, which may call the update runner.
pub fn generate_declarations(hooks: &[LifecycleHook]) -> String {
    let mut out = String::new();
    for kind in HOOK_KINDS {
        let of_kind = hooks_of(hooks, kind);
        if of_kind.is_empty() {
            continue;
        }
        let callee = kind.callee();
        let array = format!("_{}Hooks", callee);
        let param = if kind == HookKind::Update { "name" } else { "" };
        out.push_str(&format!("var {} = [];\n", array));
        out.push_str(&format!(
            "function run{}Hooks({param}) {{ {array}.forEach(function (fn) {{ fn({param}); }}); }}\n",
            crate::utils::capitalize(callee),
            param = param,
            array = array,
        ));
        for hook in of_kind {
            out.push_str(&format!("{}.push({});\n", array, hook.body));
        }
    }
    out
}

/// The invocations: run mount hooks now, run destroy hooks on teardown.
/// Must come after all function declarations, since mount callbacks
/// commonly call reactive accessor functions.
pub fn generate_execution(hooks: &[LifecycleHook]) -> String {
    let mut out = String::new();
    if !hooks_of(hooks, HookKind::Mount).is_empty() {
        out.push_str("runMountHooks();\n");
    }
    if !hooks_of(hooks, HookKind::Destroy).is_empty() {
        out.push_str("window.addEventListener('beforeunload', runDestroyHooks);\n");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_and_remove() {
        let script = "count = wrap(0)\nmount(() => { count(1); })\nfunction f() {}";
        let (rest, hooks) = extract_hooks(script);
        assert_eq!(hooks.len(), 1);
        assert_eq!(hooks[0].kind, HookKind::Mount);
        assert_eq!(hooks[0].body, "() => { count(1); }");
        assert!(!rest.contains("mount"));
        assert!(rest.contains("function f() {}"));
    }

    #[test]
    fn test_nested_braces_in_body() {
        let script = "mount(() => { if (a) { b(); } });";
        let (rest, hooks) = extract_hooks(script);
        assert_eq!(hooks[0].body, "() => { if (a) { b(); } }");
        assert_eq!(rest.trim(), "");
    }

    #[test]
    fn test_grouping_by_kind() {
        let script = "mount(() => a())\nupdate((name) => log(name))\ndestroy(() => b())\nmount(() => c())";
        let (_, hooks) = extract_hooks(script);
        assert_eq!(hooks.len(), 4);
        let declarations = generate_declarations(&hooks);
        assert_eq!(declarations.matches("_mountHooks.push").count(), 2);
        assert_eq!(declarations.matches("_updateHooks.push").count(), 1);
        assert!(declarations.contains("function runUpdateHooks(name)"));
        assert!(declarations.contains("function runMountHooks()"));
    }

    #[test]
    fn test_member_calls_are_not_hooks() {
        let script = "app.mount(() => {});";
        let (rest, hooks) = extract_hooks(script);
        assert!(hooks.is_empty());
        assert_eq!(rest, script);
    }

    #[test]
    fn test_hook_inside_string_ignored() {
        let script = "let s = 'mount(() => {})';";
        let (rest, hooks) = extract_hooks(script);
        assert!(hooks.is_empty());
        assert_eq!(rest, script);
    }

    #[test]
    fn test_execution_half() {
        let script = "mount(() => a())\ndestroy(() => b())";
        let (_, hooks) = extract_hooks(script);
        let execution = generate_execution(&hooks);
        assert!(execution.contains("runMountHooks();"));
        assert!(execution.contains("beforeunload"));

        let (_, update_only) = extract_hooks("update((n) => log(n))");
        assert_eq!(generate_execution(&update_only), "");
    }
}
