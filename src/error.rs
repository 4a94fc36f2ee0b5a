//! Error and diagnostic types for the Fuse compiler

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompilerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Section error in {file}: {message}")]
    Section { file: String, message: String },

    #[error("CSS error in {file}: {message}")]
    Css { file: String, message: String },

    #[error("Circular import detected: {chain}")]
    CircularImport { chain: String },

    #[error("Import not found: {path}")]
    ImportNotFound { path: String },

    #[error("Script normalization failed in {file}: {message}")]
    ScriptNormalization { file: String, message: String },

    #[error("Import '{path}' failed while compiling component '{component}': {source}")]
    Import {
        component: String,
        path: String,
        #[source]
        source: Box<CompilerError>,
    },

    #[error("Compile error: {message}")]
    Compile { message: String },
}

pub type Result<T> = std::result::Result<T, CompilerError>;

impl CompilerError {
    pub fn section(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Section {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn css(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Css {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn script(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ScriptNormalization {
            file: file.into(),
            message: message.into(),
        }
    }

    pub fn compile(message: impl Into<String>) -> Self {
        Self::Compile {
            message: message.into(),
        }
    }

    /// Wrap a nested error with the importing component's name and the
    /// resolved path, so diagnostics crossing an import boundary always
    /// identify both sides.
    pub fn import(
        component: impl Into<String>,
        path: impl Into<String>,
        source: CompilerError,
    ) -> Self {
        Self::Import {
            component: component.into(),
            path: path.into(),
            source: Box::new(source),
        }
    }
}

/// A non-fatal diagnostic collected during compilation.
///
/// Warnings never abort a compile; they ride along on the result so callers
/// (and the CLI in dev mode) can surface them.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Warning {
    pub message: String,
    pub file: Option<String>,
    pub line: Option<usize>,
    pub column: Option<usize>,
    pub suggestion: Option<String>,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            file: None,
            line: None,
            column: None,
            suggestion: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn with_location(mut self, file: impl Into<String>, line: usize, column: usize) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self.column = Some(column);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{}:{}: {}", file, line, self.message)?,
            (Some(file), None) => write!(f, "{}: {}", file, self.message)?,
            _ => write!(f, "{}", self.message)?,
        }
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (hint: {})", suggestion)?;
        }
        Ok(())
    }
}
