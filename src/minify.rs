//! Simple whitespace-stripping minifiers
//!
//! Pure text passes, order-independent with respect to the correctness of
//! the pipeline. Deliberately conservative: the JS pass never joins lines
//! (automatic semicolon insertion), and the HTML pass only collapses
//! inter-tag whitespace.

pub fn minify_css(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let chars: Vec<char> = css.chars().collect();
    let mut i = 0;
    let mut pending_space = false;

    while i < chars.len() {
        let c = chars[i];
        if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                i += 1;
            }
            i = (i + 2).min(chars.len());
            continue;
        }
        if c.is_whitespace() {
            pending_space = true;
            i += 1;
            continue;
        }
        if pending_space {
            let boundary = matches!(c, '{' | '}' | ':' | ';' | ',')
                || matches!(out.as_bytes().last(), Some(b'{') | Some(b'}') | Some(b':') | Some(b';') | Some(b',') | None);
            if !boundary {
                out.push(' ');
            }
            pending_space = false;
        }
        out.push(c);
        i += 1;
    }
    out
}

pub fn minify_js(js: &str) -> String {
    js.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn minify_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut chars = html.chars().peekable();
    let mut last_was_gt = false;

    while let Some(c) = chars.next() {
        if c.is_whitespace() {
            // Collapse runs; drop entirely between a `>` and the next `<`.
            while chars.peek().map(|c| c.is_whitespace()).unwrap_or(false) {
                chars.next();
            }
            if last_was_gt && chars.peek() == Some(&'<') {
                continue;
            }
            out.push(' ');
            continue;
        }
        last_was_gt = c == '>';
        out.push(c);
    }
    out.trim().to_string()
}
