// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error taxonomy shared by every handle type.
//!
//! Failures are always returned, never panicked. `NoData` and `Timeout` are
//! expected outcomes of read/take/wait calls and can be told apart from real
//! failures with [`Error::is_no_data`] and [`Error::is_timeout`].

/// Kind of named endpoint a lookup was performed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A `Subscriber::DataReader` name.
    Input,
    /// A `Publisher::DataWriter` name.
    Output,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Input => write!(f, "Subscription::DataReader"),
            EntityKind::Output => write!(f, "Publication::DataWriter"),
        }
    }
}

/// Errors returned by connector operations.
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Open-time Errors
    // ========================================================================
    /// Participant profile not found or configuration unreadable/malformed.
    Config(String),
    /// Native library (or one of its symbols) could not be loaded.
    Library(String),

    // ========================================================================
    // Lifecycle Errors
    // ========================================================================
    /// The owning connector has been closed.
    Deleted,
    /// Reader or writer name lookup failed.
    NotFound { kind: EntityKind, name: String },
    /// The native layer rejected a by-name field access.
    FieldNotFound { field: String, message: String },

    // ========================================================================
    // Expected Outcomes
    // ========================================================================
    /// The operation succeeded but produced nothing.
    NoData,
    /// A blocking operation's deadline elapsed.
    Timeout,

    // ========================================================================
    // Local Validation
    // ========================================================================
    /// Argument rejected before reaching the native layer.
    InvalidArgument(String),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Uncategorized native failure.
    Native { code: i32, message: String },
    /// Structured value could not be converted to or from JSON.
    Json(serde_json::Error),
    /// Native layer returned text that could not be parsed.
    InvalidResponse(String),
}

impl Error {
    /// `true` for [`Error::NoData`].
    pub fn is_no_data(&self) -> bool {
        matches!(self, Error::NoData)
    }

    /// `true` for [`Error::Timeout`].
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }

    /// `true` for [`Error::Deleted`].
    pub fn is_deleted(&self) -> bool {
        matches!(self, Error::Deleted)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Config(msg) => write!(
                f,
                "invalid participant profile, xml path or xml profile: {}",
                msg
            ),
            Error::Library(msg) => write!(f, "native library unavailable: {}", msg),
            Error::Deleted => write!(f, "connector has been deleted"),
            Error::NotFound { kind, name } => write!(f, "invalid {} name: {}", kind, name),
            Error::FieldNotFound { field, message } => {
                write!(f, "field '{}' not found: {}", field, message)
            }
            Error::NoData => write!(f, "DDS Exception: No Data"),
            Error::Timeout => write!(f, "DDS Exception: Timeout"),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::Native { code, message } => {
                write!(f, "DDS Exception: {} (error code {})", message, code)
            }
            Error::Json(e) => write!(f, "JSON conversion failed: {}", e),
            Error::InvalidResponse(msg) => write!(f, "unexpected native response: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

/// Convenient alias for results using the crate `Error` type.
pub type Result<T> = core::result::Result<T, Error>;
