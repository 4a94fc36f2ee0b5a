//! Script normalization
//!
//! The narrow baseline pass the pipeline runs before any scanning: strips
//! comments (so downstream scanners see clean text) and hoists top-level
//! `import` statements out of the body, producing the imports/body split
//! the compile result exposes for downstream bundling. Failures here are
//! fatal and wrap the offending source location.

use crate::error::{CompilerError, Result};

#[derive(Debug, Clone, Default)]
pub struct NormalizedScript {
    /// Hoisted `import ...;` statements, one per line.
    pub imports: String,
    /// The script body with comments stripped and imports removed.
    pub body: String,
}

pub struct ScriptNormalizer;

impl ScriptNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, script: &str, filename: &str) -> Result<NormalizedScript> {
        let stripped = strip_comments(script, filename)?;

        let mut imports = String::new();
        let mut body = String::new();
        for line in stripped.lines() {
            let trimmed = line.trim_start();
            if trimmed.starts_with("import ") || trimmed.starts_with("import\"")
                || trimmed.starts_with("import'")
            {
                imports.push_str(trimmed.trim_end());
                if !trimmed.trim_end().ends_with(';') {
                    imports.push(';');
                }
                imports.push('\n');
            } else {
                body.push_str(line);
                body.push('\n');
            }
        }

        Ok(NormalizedScript {
            imports,
            body: body.trim_matches('\n').to_string(),
        })
    }
}

impl Default for ScriptNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

fn strip_comments(script: &str, filename: &str) -> Result<String> {
    let chars: Vec<char> = script.chars().collect();
    let mut out = String::with_capacity(script.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '"' || c == '\'' || c == '`' {
            let start_line = line_of(&chars, i);
            out.push(c);
            i += 1;
            let mut closed = false;
            while i < chars.len() {
                let s = chars[i];
                if s == '\\' {
                    out.push(s);
                    if let Some(&next) = chars.get(i + 1) {
                        out.push(next);
                    }
                    i += 2;
                    continue;
                }
                if s == '\n' && c != '`' {
                    return Err(CompilerError::script(
                        filename,
                        format!("unterminated string literal starting on line {}", start_line),
                    ));
                }
                out.push(s);
                i += 1;
                if s == c {
                    closed = true;
                    break;
                }
            }
            if !closed {
                return Err(CompilerError::script(
                    filename,
                    format!("unterminated string literal starting on line {}", start_line),
                ));
            }
            continue;
        }

        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if c == '/' && chars.get(i + 1) == Some(&'*') {
            let start_line = line_of(&chars, i);
            i += 2;
            let mut closed = false;
            while i + 1 < chars.len() {
                if chars[i] == '*' && chars[i + 1] == '/' {
                    i += 2;
                    closed = true;
                    break;
                }
                i += 1;
            }
            if !closed {
                return Err(CompilerError::script(
                    filename,
                    format!("unterminated block comment starting on line {}", start_line),
                ));
            }
            continue;
        }

        out.push(c);
        i += 1;
    }

    Ok(out)
}

fn line_of(chars: &[char], at: usize) -> usize {
    chars[..at].iter().filter(|&&c| c == '\n').count() + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hoists_imports() {
        let normalized = ScriptNormalizer::new()
            .normalize(
                "import { api } from './api.js';\ncount = wrap(0)\nimport './side.js'\n",
                "App.fuse",
            )
            .unwrap();
        assert!(normalized.imports.contains("import { api } from './api.js';"));
        assert!(normalized.imports.contains("import './side.js';"));
        assert_eq!(normalized.body, "count = wrap(0)");
    }

    #[test]
    fn test_strips_comments() {
        let normalized = ScriptNormalizer::new()
            .normalize("let a = 1; // trailing\n/* block */ let b = 2;", "App.fuse")
            .unwrap();
        assert!(!normalized.body.contains("trailing"));
        assert!(!normalized.body.contains("block"));
        assert!(normalized.body.contains("let a = 1;"));
        assert!(normalized.body.contains("let b = 2;"));
    }

    #[test]
    fn test_comment_markers_in_strings_kept() {
        let normalized = ScriptNormalizer::new()
            .normalize("let url = 'https://example.com';", "App.fuse")
            .unwrap();
        assert!(normalized.body.contains("https://example.com"));
    }

    #[test]
    fn test_unterminated_block_comment_fails() {
        let err = ScriptNormalizer::new()
            .normalize("let a = 1;\n/* oops", "App.fuse")
            .unwrap_err();
        assert!(matches!(err, CompilerError::ScriptNormalization { .. }));
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_unterminated_string_fails() {
        let err = ScriptNormalizer::new()
            .normalize("let a = 'oops\nlet b = 1;", "App.fuse")
            .unwrap_err();
        assert!(matches!(err, CompilerError::ScriptNormalization { .. }));
    }
}
