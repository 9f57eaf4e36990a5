use core::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::{buffer_pool::BufferPool, types::DbResult, Database};

pub type TransactionID = u32;

static TRANSACTION_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Eq, PartialEq, Hash, Clone, Copy)]
pub struct Transaction {
    // increase monotonically by 1
    id: TransactionID,
}

impl Transaction {
    pub fn new() -> Self {
        let id = TRANSACTION_ID.fetch_add(1, Ordering::Relaxed);
        let instance = Self { id };
        instance.start().unwrap();
        instance
    }

    fn start(&self) -> DbResult {
        Database::mut_log_manager().log_start(self)
    }

    pub fn get_id(&self) -> TransactionID {
        self.id
    }

    /// Flush the pages this transaction dirtied (writing their WAL
    /// records first), write the COMMIT record and release all locks.
    pub fn commit(&self) -> DbResult {
        BufferPool::tx_complete(self, true)
    }

    /// Revert every page this transaction dirtied to its on-disk
    /// image, write the ABORT record and release all locks.
    pub fn abort(&self) -> DbResult {
        BufferPool::tx_complete(self, false)
    }
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "tx_{}", self.id)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}
