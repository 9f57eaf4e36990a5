use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, RwLock,
    },
};

use log::debug;
use slab::Slab;

use crate::{
    error::DbError,
    heap::{page::HeapPage, page_id::HeapPageID},
    storage::tuple::{Tuple, WrappedTuple},
    transaction::{ConcurrentStatus, Permission, Transaction},
    tx_log::LogManager,
    types::{DbResult, Pod, ResultPod},
    utils::HandyRwLock,
    Database,
};

pub const DEFAULT_PAGE_SIZE: usize = 4096;
pub const DEFAULT_PAGES: usize = 50;

static PAGE_SIZE: AtomicUsize = AtomicUsize::new(DEFAULT_PAGE_SIZE);

const NIL: usize = usize::MAX;

struct LruEntry {
    pid: HeapPageID,
    page: Pod<HeapPage>,

    prev: usize,
    next: usize,
}

/// Recency list over a slab arena: entries carry prev/next indices
/// instead of pointers, most-recent at the head.
struct LruList {
    arena: Slab<LruEntry>,
    head: usize,
    tail: usize,
}

impl LruList {
    fn new() -> Self {
        Self {
            arena: Slab::new(),
            head: NIL,
            tail: NIL,
        }
    }

    fn len(&self) -> usize {
        self.arena.len()
    }

    fn push_front(&mut self, pid: HeapPageID, page: Pod<HeapPage>) -> usize {
        let key = self.arena.insert(LruEntry {
            pid,
            page,
            prev: NIL,
            next: self.head,
        });

        if self.head != NIL {
            self.arena[self.head].prev = key;
        } else {
            self.tail = key;
        }
        self.head = key;

        key
    }

    fn unlink(&mut self, key: usize) -> LruEntry {
        let entry = self.arena.remove(key);

        if entry.prev != NIL {
            self.arena[entry.prev].next = entry.next;
        } else {
            self.head = entry.next;
        }

        if entry.next != NIL {
            self.arena[entry.next].prev = entry.prev;
        } else {
            self.tail = entry.prev;
        }

        entry
    }

    /// Move the entry to the head, returning its new arena key.
    fn touch(&mut self, key: usize) -> usize {
        if self.head == key {
            return key;
        }

        let entry = self.unlink(key);
        self.push_front(entry.pid, entry.page)
    }

    fn clear(&mut self) {
        self.arena.clear();
        self.head = NIL;
        self.tail = NIL;
    }
}

/// A bounded page cache. Pages enter on the first access, move to the
/// head of the recency list on every hit and leave through LRU
/// eviction, which skips dirty pages (no-steal: the disk never sees
/// uncommitted data).
pub struct BufferPool {
    page_table: HashMap<HeapPageID, usize>,
    lru: LruList,
    capacity: usize,
}

impl BufferPool {
    pub fn new() -> Self {
        Self {
            page_table: HashMap::new(),
            lru: LruList::new(),
            capacity: DEFAULT_PAGES,
        }
    }

    pub fn set_page_size(page_size: usize) {
        PAGE_SIZE.store(page_size, Ordering::Relaxed);
    }

    pub fn get_page_size() -> usize {
        PAGE_SIZE.load(Ordering::Relaxed)
    }

    pub fn get_capacity(&self) -> usize {
        self.capacity
    }

    /// Change the capacity, evicting from the cold end when the cache
    /// currently holds more pages than the new bound.
    pub fn resize(&mut self, capacity: usize) -> DbResult {
        self.capacity = capacity;
        while self.lru.len() > self.capacity {
            self.evict_page()?;
        }
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.lru.len()
    }

    pub fn is_cached(&self, pid: &HeapPageID) -> bool {
        self.page_table.contains_key(pid)
    }

    pub fn all_keys(&self) -> Vec<HeapPageID> {
        self.lru.arena.iter().map(|(_, entry)| entry.pid).collect()
    }

    pub fn clear(&mut self) {
        self.page_table.clear();
        self.lru.clear();
    }

    /// Retrieve the specified page with the associated permissions.
    /// Will acquire a lock and may block (bounded by the lock
    /// timeout) if that lock is held by another transaction.
    ///
    /// The retrieved page is looked up in the cache first. On a miss
    /// it is read from the heap file and installed at the head of the
    /// recency list, evicting the coldest clean page when the cache
    /// is full.
    pub fn get_page(tx: &Transaction, perm: Permission, pid: &HeapPageID) -> ResultPod<HeapPage> {
        // We request the lock on the page before touching the cache.
        // Here are the reasons:
        //
        // 1. (main reason) Logically, getting a page from the cache is an
        //    access operation, which requires the permission of the page.
        //
        // 2. If we request the lock on a page after getting access to the
        //    cache, the request may be blocked by other transactions while
        //    we hold the cache guard. e.g: T1: hold page1, request cache
        //    (for other pages) T2: hold cache, request page1 => deadlock
        ConcurrentStatus::request_lock(tx, &perm.to_lock(), pid)?;

        Database::mut_buffer_pool().fetch_page(pid)
    }

    fn fetch_page(&mut self, pid: &HeapPageID) -> ResultPod<HeapPage> {
        if let Some(&key) = self.page_table.get(pid) {
            let key = self.lru.touch(key);
            self.page_table.insert(*pid, key);
            return Ok(self.lru.arena[key].page.clone());
        }

        if self.lru.len() >= self.capacity {
            self.evict_page()?;
        }

        let table_rc = Database::catalog()
            .get_table(&pid.get_table_id())
            .ok_or_else(|| DbError::new(&format!("table {} not found", pid.get_table_id())))?;

        let page = table_rc.rl().read_page(pid)?;
        let page_rc = Arc::new(RwLock::new(page));

        let key = self.lru.push_front(*pid, page_rc.clone());
        self.page_table.insert(*pid, key);

        debug!("page {} loaded from disk", pid);
        Ok(page_rc)
    }

    /// Walk the recency list from the cold end and discard the first
    /// clean page. Dirty pages must stay resident until their
    /// transaction finishes (no-steal), so a cache full of dirty
    /// pages cannot evict anything.
    fn evict_page(&mut self) -> DbResult {
        let mut key = self.lru.tail;
        while key != NIL {
            let entry = &self.lru.arena[key];
            let pid = entry.pid;
            let prev = entry.prev;

            if entry.page.rl().get_dirtier().is_none() {
                self.lru.unlink(key);
                self.page_table.remove(&pid);
                debug!("page {} evicted", pid);
                return Ok(());
            }

            key = prev;
        }

        Err(DbError::new("all pages are dirty"))
    }

    /// Re-insert a page at the head of the recency list, adding it
    /// when it is not resident (e.g. a freshly appended page).
    fn touch_page(&mut self, pid: &HeapPageID, page_rc: &Pod<HeapPage>) -> DbResult {
        if let Some(&key) = self.page_table.get(pid) {
            let key = self.lru.touch(key);
            self.page_table.insert(*pid, key);
            return Ok(());
        }

        if self.lru.len() >= self.capacity {
            self.evict_page()?;
        }

        let key = self.lru.push_front(*pid, page_rc.clone());
        self.page_table.insert(*pid, key);
        Ok(())
    }

    /// Add the tuple to the specified table on behalf of the
    /// transaction. Marks any page that was dirtied by the operation
    /// and moves it to the head of the recency list.
    pub fn insert_tuple(tx: &Transaction, table_id: u32, tuple: &Tuple) -> DbResult {
        let table_rc = Database::catalog()
            .get_table(&table_id)
            .ok_or_else(|| DbError::new(&format!("table {} not found", table_id)))?;

        let dirtied = table_rc.rl().insert_tuple(tx, tuple)?;

        let mut bp = Database::mut_buffer_pool();
        for page_rc in dirtied {
            page_rc.wl().set_dirty(Some(tx.get_id()));
            let pid = page_rc.rl().get_pid();
            bp.touch_page(&pid, &page_rc)?;
        }
        Ok(())
    }

    /// Remove the tuple from its page on behalf of the transaction.
    pub fn delete_tuple(tx: &Transaction, tuple: &WrappedTuple) -> DbResult {
        let table_id = tuple.get_pid().get_table_id();
        let table_rc = Database::catalog()
            .get_table(&table_id)
            .ok_or_else(|| DbError::new(&format!("table {} not found", table_id)))?;

        let page_rc = table_rc.rl().delete_tuple(tx, tuple)?;

        let mut bp = Database::mut_buffer_pool();
        page_rc.wl().set_dirty(Some(tx.get_id()));
        let pid = page_rc.rl().get_pid();
        bp.touch_page(&pid, &page_rc)?;
        Ok(())
    }

    /// Write the content of a specific page to disk. The WAL record
    /// (before/after image) has to reach the log before the data page
    /// is overwritten.
    pub fn flush_page(&mut self, pid: &HeapPageID, log_manager: &mut LogManager) -> DbResult {
        let key = match self.page_table.get(pid) {
            Some(&key) => key,
            // Not resident, nothing to write.
            None => return Ok(()),
        };
        let page_rc = self.lru.arena[key].page.clone();

        let tid = match page_rc.rl().get_dirtier() {
            Some(tid) => tid,
            // Clean pages are already on disk.
            None => return Ok(()),
        };

        let (before, after) = {
            let page = page_rc.rl();
            (page.get_before_image(), page.get_page_data())
        };

        log_manager.log_write(tid, &before, &after)?;
        log_manager.force()?;

        let table_rc = Database::catalog()
            .get_table(&pid.get_table_id())
            .ok_or_else(|| DbError::new(&format!("table {} not found", pid.get_table_id())))?;
        table_rc.rl().write_page_to_disk(pid, &after)?;

        page_rc.wl().set_dirty(None);
        debug!("page {} flushed", pid);
        Ok(())
    }

    /// Flush every dirty page to disk.
    pub fn flush_all_pages(&mut self, log_manager: &mut LogManager) -> DbResult {
        for pid in self.all_keys() {
            self.flush_page(&pid, log_manager)?;
        }
        Ok(())
    }

    /// Write the pages dirtied by the transaction to disk, then
    /// refresh the rollback baseline of every resident page.
    pub fn flush_pages(&mut self, tx: &Transaction, log_manager: &mut LogManager) -> DbResult {
        for pid in self.all_keys() {
            let key = self.page_table[&pid];
            let page_rc = self.lru.arena[key].page.clone();

            if page_rc.rl().get_dirtier() == Some(tx.get_id()) {
                self.flush_page(&pid, log_manager)?;
            }
        }

        for pid in self.all_keys() {
            let key = self.page_table[&pid];
            self.lru.arena[key].page.wl().set_before_image();
        }

        Ok(())
    }

    /// Reload the on-disk image of every page the transaction
    /// dirtied, replacing the in-memory content.
    fn restore_pages(&mut self, tx: &Transaction) -> DbResult {
        for pid in self.all_keys() {
            let key = self.page_table[&pid];
            let page_rc = self.lru.arena[key].page.clone();

            if page_rc.rl().get_dirtier() != Some(tx.get_id()) {
                continue;
            }

            let table_rc = Database::catalog()
                .get_table(&pid.get_table_id())
                .ok_or_else(|| DbError::new(&format!("table {} not found", pid.get_table_id())))?;
            let page = table_rc.rl().read_page(&pid)?;

            *page_rc.wl() = page;
            debug!("page {} restored from disk", pid);
        }

        Ok(())
    }

    /// Finish the transaction: flush its pages and log the COMMIT, or
    /// revert its pages and log the ABORT. Either way, all its locks
    /// are released afterwards.
    pub fn tx_complete(tx: &Transaction, commit: bool) -> DbResult {
        {
            let mut log_manager = Database::mut_log_manager();
            let mut bp = Database::mut_buffer_pool();

            if commit {
                // The flushes write their UPDATE records first, so the
                // COMMIT record lands after them.
                bp.flush_pages(tx, &mut log_manager)?;
                log_manager.log_commit(tx)?;
            } else {
                log_manager.log_abort(tx)?;
                bp.restore_pages(tx)?;
            }
        }

        Database::mut_concurrent_status().release_all(tx.get_id());
        Ok(())
    }

    /// Remove the page from the cache without flushing it.
    pub fn discard_page(&mut self, pid: &HeapPageID) {
        if let Some(key) = self.page_table.remove(pid) {
            self.lru.unlink(key);
        }
    }

    /// Release a single lock before the transaction ends. Only safe
    /// when the page was not modified, the heap-file insert probe
    /// uses it to let readers pass full pages.
    pub fn unsafe_release_page(tx: &Transaction, pid: &HeapPageID) {
        Database::mut_concurrent_status().release_lock(tx.get_id(), pid);
    }

    pub fn holds_lock(tx: &Transaction, pid: &HeapPageID) -> bool {
        Database::concurrent_status().holds_lock(tx.get_id(), pid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::Schema;

    fn new_page_pod(index: u32) -> (HeapPageID, Pod<HeapPage>) {
        let pid = HeapPageID::new(1, index);
        let schema = Schema::small_int_schema(2);
        let page = HeapPage::new(&pid, &HeapPage::empty_page_data(), &schema);
        (pid, Arc::new(RwLock::new(page)))
    }

    #[test]
    fn test_lru_order() {
        let mut lru = LruList::new();

        let (pid_0, pod_0) = new_page_pod(0);
        let (pid_1, pod_1) = new_page_pod(1);
        let (pid_2, pod_2) = new_page_pod(2);

        let k0 = lru.push_front(pid_0, pod_0);
        let _k1 = lru.push_front(pid_1, pod_1);
        let _k2 = lru.push_front(pid_2, pod_2);

        assert_eq!(lru.len(), 3);
        assert_eq!(lru.arena[lru.head].pid, pid_2);
        assert_eq!(lru.arena[lru.tail].pid, pid_0);

        // touching the tail makes it the head
        let k0 = lru.touch(k0);
        assert_eq!(lru.arena[lru.head].pid, pid_0);
        assert_eq!(lru.arena[lru.tail].pid, pid_1);

        // touching the head is a no-op
        assert_eq!(lru.touch(k0), k0);
        assert_eq!(lru.arena[lru.head].pid, pid_0);
    }

    #[test]
    fn test_lru_unlink() {
        let mut lru = LruList::new();

        let (pid_0, pod_0) = new_page_pod(0);
        let (pid_1, pod_1) = new_page_pod(1);
        let (pid_2, pod_2) = new_page_pod(2);

        let _k0 = lru.push_front(pid_0, pod_0);
        let k1 = lru.push_front(pid_1, pod_1);
        let _k2 = lru.push_front(pid_2, pod_2);

        // unlink the middle entry
        let entry = lru.unlink(k1);
        assert_eq!(entry.pid, pid_1);
        assert_eq!(lru.len(), 2);
        assert_eq!(lru.arena[lru.head].pid, pid_2);
        assert_eq!(lru.arena[lru.tail].pid, pid_0);
        assert_eq!(lru.arena[lru.head].next, lru.tail);
        assert_eq!(lru.arena[lru.tail].prev, lru.head);

        // unlink down to a single entry
        lru.unlink(lru.head);
        assert_eq!(lru.head, lru.tail);

        lru.unlink(lru.head);
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.head, NIL);
        assert_eq!(lru.tail, NIL);
    }
}
