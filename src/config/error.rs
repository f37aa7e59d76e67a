use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: invalid `{directive}` directive: {message}")]
    Directive {
        line: usize,
        directive: String,
        message: String,
    },

    #[error("line {line}: server block has no `listen` directive")]
    MissingListen { line: usize },

    #[error("line {line}: location block is missing its path")]
    MissingLocationPath { line: usize },

    #[error("line {line}: `{block}` block is never closed")]
    Unterminated { block: &'static str, line: usize },
}

impl ConfigError {
    pub(crate) fn directive(line: usize, directive: &str, message: impl Into<String>) -> Self {
        ConfigError::Directive {
            line,
            directive: directive.to_string(),
            message: message.into(),
        }
    }

    /// 1-based source line the error points at, if any.
    pub fn line(&self) -> Option<usize> {
        match self {
            ConfigError::Io { .. } => None,
            ConfigError::Directive { line, .. }
            | ConfigError::MissingListen { line }
            | ConfigError::MissingLocationPath { line }
            | ConfigError::Unterminated { line, .. } => Some(*line),
        }
    }
}
