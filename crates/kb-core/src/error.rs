//! Error types for KB Core
//!
//! Every failure crossing the posting controller is a [`KbError`]: the
//! underlying [`KbErrorKind`] plus the trace of operations in progress.
//!
//! Three audiences:
//! - User errors: bad posted data or configuration, shown to the end user
//! - Integrity violations: the store refused to break its invariants
//! - Everything else: a defect or an environmental failure

use crate::trace::TraceFrame;
use kb_breakdown::{BreakdownError, IntervalError, SerializeError, TableError};
use kb_store::StoreError;
use kb_uid::UidError;
use std::fmt::{self, Display};

/// Main KB error type
#[derive(Debug)]
pub struct KbError {
    /// What went wrong
    pub kind: KbErrorKind,
    /// Operations in progress, outermost first
    pub trace: Vec<TraceFrame>,
}

impl Display for KbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        for frame in &self.trace {
            write!(f, "\n  {frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for KbError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl KbError {
    /// Check if the end user can fix the cause
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        self.kind.is_user_error()
    }

    /// Check if the store rejected the operation to protect its data
    #[must_use]
    pub fn is_integrity_violation(&self) -> bool {
        self.kind.is_integrity_violation()
    }
}

/// Underlying failure
#[derive(Debug, thiserror::Error)]
#[allow(missing_docs)]
pub enum KbErrorKind {
    /// Posted table is malformed
    #[error("table error: {0}")]
    Table(#[from] TableError),

    /// Columns cannot be partitioned
    #[error("interval error: {0}")]
    Interval(#[from] IntervalError),

    /// Rows cannot be turned into a tree
    #[error("{0}")]
    Breakdown(#[from] BreakdownError),

    /// Tree (de)serialization failed
    #[error("serialization error: {0}")]
    Serialize(#[from] SerializeError),

    /// Store operation failed
    #[error("{0}")]
    Store(#[from] StoreError),

    /// Malformed UID
    #[error("UID error: {0}")]
    Uid(#[from] UidError),

    /// Reference column cannot be resolved
    #[error("reference column '{column}': {detail}")]
    Reference { column: String, detail: String },

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),
}

impl KbErrorKind {
    /// Check if the end user can fix the cause
    #[must_use]
    pub fn is_user_error(&self) -> bool {
        match self {
            Self::Table(_) | Self::Reference { .. } | Self::Config(_) => true,
            Self::Interval(e) => matches!(
                e,
                IntervalError::MissingSplitColumn { .. }
                    | IntervalError::MissingMandatoryColumns { .. }
            ),
            Self::Breakdown(e) => e.is_user_error(),
            Self::Store(e) => e.is_user_error(),
            Self::Serialize(_) | Self::Uid(_) => false,
        }
    }

    /// Check if the store rejected the operation to protect its data
    #[must_use]
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_integrity_violation())
    }
}

impl From<KbErrorKind> for KbError {
    fn from(kind: KbErrorKind) -> Self {
        Self {
            kind,
            trace: Vec::new(),
        }
    }
}

macro_rules! impl_from_for_kb_error {
    ($($source:ty),* $(,)?) => {
        $(
            impl From<$source> for KbError {
                fn from(err: $source) -> Self {
                    KbErrorKind::from(err).into()
                }
            }
        )*
    };
}

impl_from_for_kb_error!(
    TableError,
    IntervalError,
    BreakdownError,
    SerializeError,
    StoreError,
    UidError,
);

#[cfg(test)]
mod tests {
    use super::*;
    use kb_store::ForeignKeyError;

    #[test]
    fn display_includes_trace() {
        let mut err = KbError::from(KbErrorKind::Config("bad".into()));
        err.trace.push(TraceFrame::new("loading configuration").with("path", "kb.toml"));
        assert_eq!(
            err.to_string(),
            "configuration error: bad\n  while loading configuration [path=kb.toml]"
        );
    }

    #[test]
    fn classification() {
        let missing = KbError::from(IntervalError::MissingSplitColumn {
            column: "Mid".into(),
        });
        assert!(missing.is_user_error());
        assert!(!missing.is_integrity_violation());

        let orphan = KbError::from(StoreError::ForeignKey(ForeignKeyError::Orphaned {
            candidate: "a".into(),
            missing: vec![],
            referencing: vec![],
        }));
        assert!(orphan.is_integrity_violation());

        let gap = KbError::from(StoreError::VersionGap {
            handle: "h".into(),
            latest: 1,
        });
        assert!(gap.is_integrity_violation());
        assert!(!gap.is_user_error());
    }
}
