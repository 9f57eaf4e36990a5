use core::fmt;
use std::{
    collections::{HashMap, HashSet},
    thread::sleep,
    time::{Duration, Instant},
};

use crate::{
    error::DbError,
    heap::page_id::HeapPageID,
    transaction::{Transaction, TransactionID},
    types::DbResult,
    Database,
};

/// How long a transaction keeps retrying a lock before it gives up
/// and aborts. Timing out is also how deadlocks get resolved.
pub const ACQUIRE_TIMEOUT: Duration = Duration::from_millis(100);

const RETRY_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Lock {
    SLock,
    XLock,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum Permission {
    ReadOnly,
    ReadWrite,
}

impl Permission {
    pub fn to_lock(&self) -> Lock {
        match self {
            Permission::ReadOnly => Lock::SLock,
            Permission::ReadWrite => Lock::XLock,
        }
    }
}

/// Page-level lock table. Every mutation happens behind the
/// database-wide lock on this struct, the individual operations are
/// non-blocking.
pub struct ConcurrentStatus {
    s_lock_map: HashMap<HeapPageID, HashSet<TransactionID>>,
    x_lock_map: HashMap<HeapPageID, TransactionID>,

    hold_pages: HashMap<TransactionID, HashSet<HeapPageID>>,
}

impl ConcurrentStatus {
    pub fn new() -> Self {
        Self {
            s_lock_map: HashMap::new(),
            x_lock_map: HashMap::new(),
            hold_pages: HashMap::new(),
        }
    }

    /// Request a lock on the given page. This api is blocking: it
    /// polls `add_lock` until the lock is granted or ACQUIRE_TIMEOUT
    /// has passed, in which case the requesting transaction aborts.
    pub fn request_lock(tx: &Transaction, lock: &Lock, pid: &HeapPageID) -> DbResult {
        let start_time = Instant::now();
        loop {
            // acquire RwLock on "concurrent_status"
            {
                let mut concurrent_status = Database::mut_concurrent_status();
                if concurrent_status.add_lock(tx.get_id(), lock, pid)? {
                    return Ok(());
                }
            }
            // release RwLock on "concurrent_status"

            if Instant::now().duration_since(start_time) >= ACQUIRE_TIMEOUT {
                break;
            }

            sleep(RETRY_INTERVAL);
        }

        Err(DbError::abort(&format!(
            "acquire lock timeout, args: {:?}, {:?}, {:?}, concurrent status: {}",
            tx,
            lock,
            pid,
            Database::concurrent_status(),
        )))
    }

    // Add a lock to the given page. This api is idempotent and does
    // not block.
    //
    // # Return
    //
    // Return a bool value to indicate whether the lock is added
    // successfully.
    pub fn add_lock(
        &mut self,
        tid: TransactionID,
        lock: &Lock,
        pid: &HeapPageID,
    ) -> Result<bool, DbError> {
        // A page held by another transaction with X-Lock blocks
        // everyone else.
        if let Some(v) = self.x_lock_map.get(pid) {
            if *v != tid {
                return Ok(false);
            }
        }

        match lock {
            Lock::SLock => {
                // The exclusive lock already covers shared access.
                if self.x_lock_map.get(pid) != Some(&tid) {
                    self.s_lock_map
                        .entry(*pid)
                        .or_insert_with(HashSet::new)
                        .insert(tid);
                }
            }
            Lock::XLock => {
                // An S-Lock held by any other transaction blocks the
                // upgrade.
                if let Some(holders) = self.s_lock_map.get(pid) {
                    for holder in holders {
                        if *holder != tid {
                            return Ok(false);
                        }
                    }
                }

                // The upgrade replaces the shared entry.
                if let Some(holders) = self.s_lock_map.get_mut(pid) {
                    holders.remove(&tid);
                    if holders.is_empty() {
                        self.s_lock_map.remove(pid);
                    }
                }

                self.x_lock_map.insert(*pid, tid);
            }
        }

        self.hold_pages
            .entry(tid)
            .or_insert_with(HashSet::new)
            .insert(*pid);
        Ok(true)
    }

    pub fn release_lock(&mut self, tid: TransactionID, pid: &HeapPageID) {
        if let Some(holders) = self.s_lock_map.get_mut(pid) {
            holders.remove(&tid);
            if holders.is_empty() {
                self.s_lock_map.remove(pid);
            }
        }

        if self.x_lock_map.get(pid) == Some(&tid) {
            self.x_lock_map.remove(pid);
        }

        if let Some(pages) = self.hold_pages.get_mut(&tid) {
            pages.remove(pid);
        }
    }

    /// Drop every lock held by the transaction.
    pub fn release_all(&mut self, tid: TransactionID) {
        let hold_pages = match self.hold_pages.remove(&tid) {
            Some(pages) => pages,
            None => return,
        };

        for pid in hold_pages {
            if let Some(holders) = self.s_lock_map.get_mut(&pid) {
                holders.remove(&tid);
                if holders.is_empty() {
                    self.s_lock_map.remove(&pid);
                }
            }

            if self.x_lock_map.get(&pid) == Some(&tid) {
                self.x_lock_map.remove(&pid);
            }
        }
    }

    pub fn holds_lock(&self, tid: TransactionID, pid: &HeapPageID) -> bool {
        if self.x_lock_map.get(pid) == Some(&tid) {
            return true;
        }

        match self.s_lock_map.get(pid) {
            Some(holders) => holders.contains(&tid),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.s_lock_map.clear();
        self.x_lock_map.clear();
        self.hold_pages.clear();
    }
}

impl fmt::Display for ConcurrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut depiction = "\n".to_string();

        depiction.push_str("s_lock_map: {");
        for (k, v) in self.s_lock_map.iter() {
            depiction.push_str(&format!("\n\t{} -> {:?},", k.get_short_repr(), v));
        }
        depiction.push_str("\n}\n");

        depiction.push_str("x_lock_map: {");
        for (k, v) in self.x_lock_map.iter() {
            depiction.push_str(&format!("\n\t{} -> {:?},", k.get_short_repr(), v));
        }
        depiction.push_str("\n}\n");

        write!(f, "{}", depiction)
    }
}

impl fmt::Debug for ConcurrentStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(i: u32) -> HeapPageID {
        HeapPageID::new(1, i)
    }

    #[test]
    fn test_shared_locks_coexist() {
        let mut status = ConcurrentStatus::new();

        assert!(status.add_lock(1, &Lock::SLock, &pid(0)).unwrap());
        assert!(status.add_lock(2, &Lock::SLock, &pid(0)).unwrap());

        assert!(status.holds_lock(1, &pid(0)));
        assert!(status.holds_lock(2, &pid(0)));
    }

    #[test]
    fn test_exclusive_lock_excludes_others() {
        let mut status = ConcurrentStatus::new();

        assert!(status.add_lock(1, &Lock::XLock, &pid(0)).unwrap());
        assert!(!status.add_lock(2, &Lock::SLock, &pid(0)).unwrap());
        assert!(!status.add_lock(2, &Lock::XLock, &pid(0)).unwrap());

        // the holder itself can re-acquire in either mode
        assert!(status.add_lock(1, &Lock::SLock, &pid(0)).unwrap());
        assert!(status.add_lock(1, &Lock::XLock, &pid(0)).unwrap());
    }

    #[test]
    fn test_upgrade() {
        let mut status = ConcurrentStatus::new();

        assert!(status.add_lock(1, &Lock::SLock, &pid(0)).unwrap());

        // sole shared holder upgrades
        assert!(status.add_lock(1, &Lock::XLock, &pid(0)).unwrap());
        assert!(!status.add_lock(2, &Lock::SLock, &pid(0)).unwrap());
    }

    #[test]
    fn test_upgrade_denied_with_other_readers() {
        let mut status = ConcurrentStatus::new();

        assert!(status.add_lock(1, &Lock::SLock, &pid(0)).unwrap());
        assert!(status.add_lock(2, &Lock::SLock, &pid(0)).unwrap());

        assert!(!status.add_lock(1, &Lock::XLock, &pid(0)).unwrap());
    }

    #[test]
    fn test_release() {
        let mut status = ConcurrentStatus::new();

        assert!(status.add_lock(1, &Lock::XLock, &pid(0)).unwrap());
        status.release_lock(1, &pid(0));

        assert!(!status.holds_lock(1, &pid(0)));
        assert!(status.add_lock(2, &Lock::XLock, &pid(0)).unwrap());
    }

    #[test]
    fn test_release_all() {
        let mut status = ConcurrentStatus::new();

        assert!(status.add_lock(1, &Lock::SLock, &pid(0)).unwrap());
        assert!(status.add_lock(1, &Lock::XLock, &pid(1)).unwrap());
        assert!(status.add_lock(2, &Lock::SLock, &pid(0)).unwrap());

        status.release_all(1);

        assert!(!status.holds_lock(1, &pid(0)));
        assert!(!status.holds_lock(1, &pid(1)));
        assert!(status.holds_lock(2, &pid(0)));
    }
}
