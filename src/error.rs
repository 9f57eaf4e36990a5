use std::{error::Error, fmt};

use backtrace::Backtrace;
use log::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The transaction lost a lock race (timeout) or was aborted
    /// explicitly. The caller has to roll it back.
    TransactionAborted,

    /// Structural or semantic error, e.g. schema mismatch on insert,
    /// eviction request while all pages are dirty, histogram range
    /// violation.
    Db,

    /// Disk read/write failure from the heap file or the log.
    Io,
}

pub struct DbError {
    kind: ErrorKind,
    details: String,
    backtrace: Backtrace,
}

impl DbError {
    pub fn new(msg: &str) -> DbError {
        DbError::with_kind(ErrorKind::Db, msg)
    }

    pub fn io(msg: &str) -> DbError {
        DbError::with_kind(ErrorKind::Io, msg)
    }

    pub fn abort(msg: &str) -> DbError {
        DbError::with_kind(ErrorKind::TransactionAborted, msg)
    }

    fn with_kind(kind: ErrorKind, msg: &str) -> DbError {
        DbError {
            kind,
            details: msg.to_string(),
            backtrace: Backtrace::new(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_abort(&self) -> bool {
        self.kind == ErrorKind::TransactionAborted
    }

    pub fn show_backtrace(&self) {
        error!("{}\n{:?}", self.details, self.backtrace);
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.details)
    }
}

impl fmt::Debug for DbError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl Error for DbError {}
