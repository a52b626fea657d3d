use std::path::PathBuf;

use thiserror::Error;

/// Result type for jremap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during constant pool operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstPoolError {
    #[error("Constant pool is out of space")]
    OutOfSpace,
    #[error("Invalid constant pool index: {0}")]
    InvalidIndex(u16),
    #[error("Constant pool entry {index} is not a {expected}")]
    UnexpectedKind { index: u16, expected: &'static str },
    #[error("Unknown constant pool tag {tag} at index {index}")]
    UnknownTag { tag: u8, index: u16 },
    #[error("Utf8 constant of {len} bytes exceeds the 65535 byte limit")]
    Utf8TooLong { len: usize },
}

/// Error types for jremap
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Malformed class file: {message}")]
    ClassFormat { message: String },

    #[error("Constant pool error: {0}")]
    ConstPool(#[from] ConstPoolError),

    #[error("Cannot resolve type '{name}' in the classpath")]
    UnresolvableType { name: String },

    #[error("Circular supertype chain through '{name}'")]
    CircularHierarchy { name: String },

    #[error("Rename rules do not converge for '{symbol}' after {steps} steps")]
    RewriteCycle { symbol: String, steps: usize },

    #[error("Unsupported bytecode in {method}: {message}")]
    UnsupportedBytecode { method: String, message: String },

    #[error("Frame computation failed in {method}: {message}")]
    Frame { method: String, message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Displays only the path; the cause is reachable through `source()`
    #[error("while processing {}", .path.display())]
    InFile {
        path: PathBuf,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a class format error
    pub fn class_format(message: impl Into<String>) -> Self {
        Self::ClassFormat { message: message.into() }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a frame computation error for a method
    pub fn frame(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Frame { method: method.into(), message: message.into() }
    }

    /// Attach the path of the file being processed
    pub fn in_file(self, path: impl Into<PathBuf>) -> Self {
        match self {
            already @ Self::InFile { .. } => already,
            other => Self::InFile { path: path.into(), source: Box::new(other) },
        }
    }

    /// Innermost error, skipping file context wrappers
    pub fn root(&self) -> &Error {
        match self {
            Self::InFile { source, .. } => source.root(),
            other => other,
        }
    }
}
