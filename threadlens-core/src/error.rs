use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed taxonomy of failure kinds.
///
/// Every failure surfaced by the core is classified into exactly one kind;
/// the kind determines the default severity and recovery posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Store handle was never initialized, or is in an unusable state.
    Initialization,
    /// The engine handle is closed, locked, or otherwise unreachable.
    Connection,
    /// Dataset bytes could not be parsed or loaded.
    Loading,
    /// A query failed (bad SQL, missing table/column, row shape mismatch).
    Query,
    /// Transaction control failed or was used out of order.
    Transaction,
    /// The engine ran out of memory or hit an allocation limit.
    Memory,
    /// The database file or its pages are damaged.
    Corruption,
    /// The operation was denied (read-only store, access denied).
    Permission,
    /// The underlying engine reported a timeout.
    Timeout,
    /// Anything that matched no classification rule.
    Unknown,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialization => "Initialization",
            Self::Connection => "Connection",
            Self::Loading => "Loading",
            Self::Query => "Query",
            Self::Transaction => "Transaction",
            Self::Memory => "Memory",
            Self::Corruption => "Corruption",
            Self::Permission => "Permission",
            Self::Timeout => "Timeout",
            Self::Unknown => "Unknown",
        }
    }

    /// Default severity for this kind.
    pub fn default_severity(self) -> Severity {
        match self {
            Self::Initialization | Self::Transaction => Severity::High,
            Self::Corruption => Severity::Critical,
            Self::Connection
            | Self::Loading
            | Self::Query
            | Self::Memory
            | Self::Permission
            | Self::Timeout
            | Self::Unknown => Severity::Medium,
        }
    }

    /// Whether errors of this kind are recoverable by default.
    pub fn default_recoverable(self) -> bool {
        !matches!(self, Self::Corruption | Self::Permission)
    }

    /// Whether errors of this kind may be retried by default.
    pub fn default_retryable(self) -> bool {
        matches!(
            self,
            Self::Connection | Self::Loading | Self::Query | Self::Memory | Self::Timeout
        )
    }

    /// Short message suitable for direct display to a user.
    pub fn user_message(self) -> &'static str {
        match self {
            Self::Initialization => "The dataset is not ready yet. Try reloading it.",
            Self::Connection => "Lost contact with the dataset. Retrying may help.",
            Self::Loading => "The dataset could not be loaded.",
            Self::Query => "The query could not be completed.",
            Self::Transaction => "A data update failed and was rolled back.",
            Self::Memory => "Ran out of memory while processing the dataset.",
            Self::Corruption => "The dataset appears to be damaged and cannot be used.",
            Self::Permission => "The dataset is read-only or access was denied.",
            Self::Timeout => "The operation took too long and was cancelled.",
            Self::Unknown => "An unexpected error occurred.",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How bad a failure is, from the consumer's perspective.
///
/// Critical errors must never be silently retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Ordered classification rules. First matching pattern wins; all matching is
/// against the lowercased raw message. Narrow patterns come before broad ones
/// ("disk image is malformed" before "database"), but the scheme stays
/// best-effort: a query error whose *data* mentions "timeout" will
/// misclassify. Classifying on structured engine codes would fix that.
const CLASSIFICATION_RULES: &[(&[&str], ErrorKind)] = &[
    (
        &[
            "disk image is malformed",
            "file is not a database",
            "database corruption",
            "malformed database",
            "corrupt",
        ],
        ErrorKind::Corruption,
    ),
    (
        &["permission denied", "access denied", "readonly", "read-only"],
        ErrorKind::Permission,
    ),
    (
        &["out of memory", "cannot allocate", "memory"],
        ErrorKind::Memory,
    ),
    (&["timeout", "timed out"], ErrorKind::Timeout),
    (
        &["not initialized", "initialization failed"],
        ErrorKind::Initialization,
    ),
    (
        &[
            "database is locked",
            "unable to open",
            "connection",
            "handle is closed",
        ],
        ErrorKind::Connection,
    ),
    (
        &[
            "cannot start a transaction",
            "no transaction is active",
            "transaction",
            "savepoint",
        ],
        ErrorKind::Transaction,
    ),
    (
        &[
            "no such table",
            "no such column",
            "syntax error",
            "wrong number of parameters",
            "invalid column",
            "query",
        ],
        ErrorKind::Query,
    ),
    (
        &["expected value", "invalid type", "eof while parsing", "failed to load"],
        ErrorKind::Loading,
    ),
];

/// Classify a raw failure message into an [`ErrorKind`].
///
/// Heuristic by design: an ordered list of substring checks evaluated
/// first-match-wins, falling through to [`ErrorKind::Unknown`].
pub fn classify(raw_message: &str) -> ErrorKind {
    let lower = raw_message.to_lowercase();
    for (patterns, kind) in CLASSIFICATION_RULES {
        if patterns.iter().any(|p| lower.contains(p)) {
            return *kind;
        }
    }
    ErrorKind::Unknown
}

/// A classified failure with severity and recovery posture attached.
///
/// All fallible operations in `threadlens-core` return
/// [`Result<T, StructuredError>`](Result). Raw engine failures are wrapped at
/// the store boundary; higher layers only ever see this type.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind} error: {message}")]
pub struct StructuredError {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: String,
    /// Short text safe to show to a user verbatim.
    pub user_message: String,
    pub recoverable: bool,
    pub retryable: bool,
    /// Free-form diagnostic context (query shape, parameter counts, etc.).
    pub context: HashMap<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl StructuredError {
    /// Build an error of a known kind with the kind's default posture.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            severity: kind.default_severity(),
            message: message.into(),
            user_message: kind.user_message().to_string(),
            recoverable: kind.default_recoverable(),
            retryable: kind.default_retryable(),
            context: HashMap::new(),
            timestamp: Utc::now(),
        }
    }

    /// Wrap an opaque raw failure, classifying it by message.
    pub fn classified(raw_message: impl Into<String>) -> Self {
        let message = raw_message.into();
        Self::new(classify(&message), message)
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_context(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    pub fn is_critical(&self) -> bool {
        self.severity == Severity::Critical
    }
}

impl From<rusqlite::Error> for StructuredError {
    fn from(err: rusqlite::Error) -> Self {
        Self::classified(err.to_string())
    }
}

impl From<serde_json::Error> for StructuredError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::Loading, err.to_string())
    }
}

/// Convenience alias for `Result<T, StructuredError>`.
pub type Result<T> = std::result::Result<T, StructuredError>;
