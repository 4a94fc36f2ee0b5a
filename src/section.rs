//! Section splitting for `.fuse` single-file components
//!
//! Locates the first occurrence of each recognized section tag, extracts
//! its depth-matched inner content, and scans the whole source for import
//! declarations.

use crate::error::{CompilerError, Result, Warning};
use crate::session;
use crate::types::ParsedComponent;
use regex::Regex;
use std::path::Path;

/// One extracted section: inner content plus the raw attribute text of the
/// opening tag.
#[derive(Debug, Clone)]
struct Section {
    content: String,
    attributes: String,
}

#[derive(Debug)]
pub struct SplitOutput {
    pub component: ParsedComponent,
    pub warnings: Vec<Warning>,
}

pub struct SectionSplitter {
    import_regex: Regex,
}

impl SectionSplitter {
    pub fn new() -> Self {
        Self {
            import_regex: Regex::new(
                r#"(?i)<import\s+([A-Za-z_][A-Za-z0-9_]*)\s+from\s+"([^"]+)"\s*/?>"#,
            )
            .unwrap(),
        }
    }

    /// Split raw source text into a `ParsedComponent`.
    ///
    /// Missing template is a warning unless a store section is present.
    /// A missing closing tag for a present section is a structural error.
    pub fn split(&self, source: &str, filename: &str) -> Result<SplitOutput> {
        if filename.is_empty() {
            return Err(CompilerError::section(
                "<unknown>",
                "cannot split sections without a filename",
            ));
        }

        let name = component_name(filename);
        let mut warnings = Vec::new();

        let script = find_section(source, "script", filename)?;
        let template = find_section(source, "template", filename)?;
        let style = find_section(source, "style", filename)?;
        let store = find_section(source, "store", filename)?;

        // Absence of a style tag defaults to isolated; a bare <style>
        // without the attribute opts into parent->child targeting.
        let style_isolated = match &style {
            Some(section) => has_attribute(&section.attributes, "isolated"),
            None => true,
        };

        let is_store = store.is_some();
        if template.is_none() && !is_store {
            warnings.push(
                Warning::new("component has no <template> section")
                    .with_file(filename)
                    .with_suggestion("add a <template> section or convert the file to a <store>"),
            );
        }

        let imports: Vec<(String, String)> = self
            .import_regex
            .captures_iter(source)
            .map(|c| (c[1].to_string(), c[2].to_string()))
            .collect();

        // Import declarations are top-level; scrub any that ended up inside
        // the extracted template so they never reach the HTML output.
        let template_text = template
            .map(|s| self.import_regex.replace_all(&s.content, "").into_owned())
            .unwrap_or_default();

        let scope_id = session::scope_id(&name);
        log::debug!(
            "split '{}': script={}b template={}b style={}b store={} imports={}",
            filename,
            script.as_ref().map(|s| s.content.len()).unwrap_or(0),
            template_text.len(),
            style.as_ref().map(|s| s.content.len()).unwrap_or(0),
            is_store,
            imports.len()
        );

        Ok(SplitOutput {
            component: ParsedComponent {
                name,
                script: script.map(|s| s.content).unwrap_or_default(),
                template: template_text,
                style: style.map(|s| s.content).unwrap_or_default(),
                style_isolated,
                imports,
                scope_id,
                store: store.map(|s| s.content),
                is_store,
            },
            warnings,
        })
    }
}

impl Default for SectionSplitter {
    fn default() -> Self {
        Self::new()
    }
}

fn component_name(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

fn has_attribute(attributes: &str, name: &str) -> bool {
    attributes
        .split_whitespace()
        .any(|attr| attr == name || attr.starts_with(&format!("{}=", name)))
}

/// Locate the first `<tag ...>` (case-insensitive) and return its inner
/// content up through the depth-matched closing tag. Same-named nested tags
/// increase depth; self-closing occurrences do not.
fn find_section(source: &str, tag: &str, filename: &str) -> Result<Option<Section>> {
    // ASCII-only lowering keeps byte offsets aligned with `source`.
    let lower = source.to_ascii_lowercase();
    let open = match scan_tag_open(&lower, 0, tag) {
        Some(open) => open,
        None => return Ok(None),
    };

    let attributes = source[open.attr_start..open.attr_end].trim().to_string();
    if open.self_closing {
        return Ok(Some(Section {
            content: String::new(),
            attributes,
        }));
    }

    let close_tag = format!("</{}", tag);
    let mut depth = 1usize;
    let mut cursor = open.content_start;
    loop {
        let next_close = lower[cursor..].find(&close_tag).map(|i| cursor + i);
        let next_open = scan_tag_open(&lower, cursor, tag);

        match (next_open, next_close) {
            (Some(nested), Some(close)) if nested.tag_start < close => {
                if !nested.self_closing {
                    depth += 1;
                }
                cursor = nested.content_start;
            }
            (_, Some(close)) => {
                depth -= 1;
                if depth == 0 {
                    let content = source[open.content_start..close].to_string();
                    return Ok(Some(Section {
                        content,
                        attributes,
                    }));
                }
                cursor = close + close_tag.len();
            }
            (_, None) => {
                return Err(CompilerError::section(
                    filename,
                    format!("unterminated <{}> section", tag),
                ));
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TagOpen {
    tag_start: usize,
    attr_start: usize,
    attr_end: usize,
    /// Index just past the `>` of the opening tag.
    content_start: usize,
    self_closing: bool,
}

/// Find the next `<tag` occurrence at or after `from`, where the tag name
/// is followed by whitespace, `>` or `/`. Quoted attribute values may
/// contain `>` and are skipped.
fn scan_tag_open(lower: &str, from: usize, tag: &str) -> Option<TagOpen> {
    let needle = format!("<{}", tag);
    let bytes = lower.as_bytes();
    let mut search = from;
    loop {
        let found = lower[search..].find(&needle)? + search;
        let after_name = found + needle.len();
        match bytes.get(after_name) {
            Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r') | Some(b'>') | Some(b'/') => {}
            _ => {
                search = after_name;
                continue;
            }
        }

        // Walk to the closing `>` of the opening tag, respecting quotes.
        let mut i = after_name;
        let mut quote: Option<u8> = None;
        while i < bytes.len() {
            let b = bytes[i];
            match quote {
                Some(q) => {
                    if b == q {
                        quote = None;
                    }
                }
                None => match b {
                    b'"' | b'\'' => quote = Some(b),
                    b'>' => {
                        let self_closing = i > after_name && bytes[i - 1] == b'/';
                        let attr_end = if self_closing { i - 1 } else { i };
                        return Some(TagOpen {
                            tag_start: found,
                            attr_start: after_name,
                            attr_end,
                            content_start: i + 1,
                            self_closing,
                        });
                    }
                    _ => {}
                },
            }
            i += 1;
        }
        return None;
    }
}
