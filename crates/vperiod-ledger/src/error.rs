//! # Design
//!
//! - Constant error messages; context lives in fields.
//! - Journal corruption records the 1-based line that failed to decode.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors produced by the ledger store.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// IO failures while reading or writing the journal.
    #[error("ledger io failure")]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// Path involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// A commit record could not be serialised.
    #[error("ledger encode failure")]
    Encode {
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// A journal line could not be decoded during replay.
    #[error("ledger journal corrupt")]
    CorruptJournal {
        /// 1-based line number of the offending record.
        line: usize,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
    /// Journal records are not in contiguous height order.
    #[error("ledger journal out of order")]
    OutOfOrder {
        /// 1-based line number of the offending record.
        line: usize,
        /// Height the replay expected.
        expected: u64,
        /// Height found in the record.
        found: u64,
    },
    /// An earlier append could not be rolled back; the journal is read-only.
    #[error("ledger journal poisoned")]
    JournalPoisoned {
        /// Journal file.
        path: PathBuf,
    },
    /// A commit was attempted with no writes.
    #[error("ledger write set empty")]
    EmptyWriteSet,
}

impl LedgerError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_helper_keeps_context_out_of_message() {
        let err = LedgerError::io(
            "journal.open",
            "/tmp/ledger",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "ledger io failure");
        assert!(matches!(
            err,
            LedgerError::Io {
                operation: "journal.open",
                ..
            }
        ));
        assert!(std::error::Error::source(&err).is_some());
    }
}
