// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Core error types for robostream.
//!
//! Errors fall into a small taxonomy:
//! - schema registration problems (duplicate or reserved identifiers)
//! - usage errors (operation invoked in the wrong state or with bad arguments)
//! - corruption (bad checksum, truncated footer, unreadable index)
//! - low-level decoding and I/O failures
//!
//! "Not found" is never an error: lookups return `Option`.

use std::fmt;

/// Errors that can occur while reading or writing stream files.
#[derive(Debug, Clone)]
pub enum StreamError {
    /// Invalid type registration (duplicate or reserved identifier)
    Schema {
        /// Type string or schema id being registered
        type_name: String,
        /// Why the registration was rejected
        reason: String,
    },

    /// Operation invoked in the wrong state or with invalid arguments
    Usage {
        /// Operation that was attempted
        operation: String,
        /// What was wrong
        reason: String,
    },

    /// File content failed validation
    Corruption {
        /// File the corruption was found in
        path: String,
        /// What failed to validate
        reason: String,
    },

    /// Buffer too short for requested read
    BufferTooShort {
        /// Requested bytes
        requested: usize,
        /// Available bytes
        available: usize,
        /// Cursor position when error occurred
        cursor_pos: u64,
    },

    /// Structured decode failure
    Decode {
        /// What was being decoded
        context: String,
        /// Error message
        message: String,
    },

    /// I/O failure
    Io {
        /// Operation during which the failure happened
        context: String,
        /// Error message
        message: String,
    },
}

impl StreamError {
    /// Create a schema registration error.
    pub fn schema(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        StreamError::Schema {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a usage error.
    pub fn usage(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        StreamError::Usage {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Create a corruption error.
    pub fn corruption(path: impl Into<String>, reason: impl Into<String>) -> Self {
        StreamError::Corruption {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a buffer too short error.
    pub fn buffer_too_short(requested: usize, available: usize, cursor_pos: u64) -> Self {
        StreamError::BufferTooShort {
            requested,
            available,
            cursor_pos,
        }
    }

    /// Create a decode error.
    pub fn decode(context: impl Into<String>, message: impl Into<String>) -> Self {
        StreamError::Decode {
            context: context.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    pub fn io(context: impl Into<String>, err: impl fmt::Display) -> Self {
        StreamError::Io {
            context: context.into(),
            message: err.to_string(),
        }
    }

    /// Check if this is a schema registration error.
    pub fn is_schema(&self) -> bool {
        matches!(self, StreamError::Schema { .. })
    }

    /// Check if this is a usage error.
    pub fn is_usage(&self) -> bool {
        matches!(self, StreamError::Usage { .. })
    }

    /// Check if this is a corruption error.
    pub fn is_corruption(&self) -> bool {
        matches!(self, StreamError::Corruption { .. })
    }

    /// Re-label a decoding failure found while loading `path` as corruption.
    ///
    /// Usage and schema errors pass through untouched.
    pub fn into_corruption(self, path: &str) -> Self {
        match self {
            StreamError::BufferTooShort { .. } | StreamError::Decode { .. } => {
                StreamError::corruption(path, self.to_string())
            }
            other => other,
        }
    }

    /// Get structured fields for logging.
    pub fn log_fields(&self) -> Vec<(&'static str, String)> {
        match self {
            StreamError::Schema { type_name, reason } => {
                vec![("type", type_name.clone()), ("reason", reason.clone())]
            }
            StreamError::Usage { operation, reason } => {
                vec![("operation", operation.clone()), ("reason", reason.clone())]
            }
            StreamError::Corruption { path, reason } => {
                vec![("path", path.clone()), ("reason", reason.clone())]
            }
            StreamError::BufferTooShort {
                requested,
                available,
                cursor_pos,
            } => vec![
                ("requested", requested.to_string()),
                ("available", available.to_string()),
                ("cursor", cursor_pos.to_string()),
            ],
            StreamError::Decode { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
            StreamError::Io { context, message } => {
                vec![("context", context.clone()), ("message", message.clone())]
            }
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Schema { type_name, reason } => {
                write!(f, "Schema error for '{type_name}': {reason}")
            }
            StreamError::Usage { operation, reason } => {
                write!(f, "Usage error in {operation}: {reason}")
            }
            StreamError::Corruption { path, reason } => {
                write!(f, "Corrupted file '{path}': {reason}")
            }
            StreamError::BufferTooShort {
                requested,
                available,
                cursor_pos,
            } => write!(
                f,
                "Buffer too short: requested {requested} bytes at position {cursor_pos}, but only {available} bytes available"
            ),
            StreamError::Decode { context, message } => {
                write!(f, "Decode error in {context}: {message}")
            }
            StreamError::Io { context, message } => write!(f, "IO error in {context}: {message}"),
        }
    }
}

impl std::error::Error for StreamError {}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Io {
            context: "IO".to_string(),
            message: err.to_string(),
        }
    }
}

/// Result type for robostream operations.
pub type Result<T> = std::result::Result<T, StreamError>;
