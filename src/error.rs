//! Error types for md2pdf operations.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading config or converting a document.
#[derive(Error, Debug)]
pub enum Error {
    /// Reading a file failed.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Writing a file failed.
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A config file is not valid YAML or has the wrong shape.
    #[error("invalid config file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// A config value could not be interpreted.
    #[error("invalid value for `{field}`: {message}")]
    InvalidValue { field: String, message: String },

    /// Refused to replace an existing file.
    #[error("{} already exists", .0.display())]
    AlreadyExists(PathBuf),

    /// The renderer rejected the document.
    #[error("{0}")]
    Render(String),
}

impl Error {
    /// Create an invalid value error.
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Result type alias using md2pdf's Error type.
pub type Result<T> = std::result::Result<T, Error>;
