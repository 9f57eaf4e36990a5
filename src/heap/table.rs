use std::{
    collections::hash_map::DefaultHasher,
    fs::{File, OpenOptions},
    hash::{Hash, Hasher},
    io::{prelude::*, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use log::debug;

use crate::{
    buffer_pool::BufferPool,
    error::DbError,
    storage::{
        schema::Schema,
        tuple::{Tuple, WrappedTuple},
    },
    transaction::{Permission, Transaction},
    types::{DbResult, Pod, ResultPod},
    utils::HandyRwLock,
};

use super::{page::HeapPage, page_id::HeapPageID};

/// A table stored as an ordered sequence of heap pages in a single
/// file, indexed by page number.
pub struct HeapTable {
    pub schema: Schema,

    file: Mutex<File>,
    file_path: PathBuf,

    table_id: u32,
}

impl HeapTable {
    pub fn new<P: AsRef<Path>>(file_path: P, schema: &Schema) -> Self {
        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .open(&file_path)
            .unwrap();

        // The table id has to survive restarts, so derive it from the
        // absolute path of the backing file.
        let absolute_path = file_path
            .as_ref()
            .canonicalize()
            .expect("cannot resolve table path");
        let mut hasher = DefaultHasher::new();
        absolute_path.to_string_lossy().hash(&mut hasher);
        let table_id = hasher.finish() as u32;

        Self {
            schema: schema.clone(),
            file: Mutex::new(file),
            file_path: absolute_path,
            table_id,
        }
    }

    pub fn get_id(&self) -> u32 {
        self.table_id
    }

    pub fn get_file_path(&self) -> PathBuf {
        self.file_path.clone()
    }

    fn get_file(&self) -> MutexGuard<'_, File> {
        self.file.lock().unwrap()
    }

    pub fn num_pages(&self) -> usize {
        let len = self.get_file().metadata().unwrap().len() as usize;
        len / BufferPool::get_page_size()
    }

    /// Read the page image at `pid` from disk. Fails when the page
    /// lies beyond the end of the file.
    pub fn read_page(&self, pid: &HeapPageID) -> Result<HeapPage, DbError> {
        let page_size = BufferPool::get_page_size();

        if pid.page_index as usize >= self.num_pages() {
            return Err(DbError::io(&format!(
                "page {} is beyond the end of the file ({} pages)",
                pid,
                self.num_pages(),
            )));
        }

        let start_pos = pid.page_index as usize * page_size;

        let mut file = self.get_file();
        file.seek(SeekFrom::Start(start_pos as u64))
            .map_err(|e| DbError::io(&e.to_string()))?;

        let mut buf: Vec<u8> = vec![0; page_size];
        file.read_exact(&mut buf)
            .map_err(|e| DbError::io(&e.to_string()))?;

        Ok(HeapPage::new(pid, &buf, &self.schema))
    }

    /// Write a page image to disk, extending the file when the page
    /// lies at (or past) the current end.
    pub fn write_page_to_disk(&self, pid: &HeapPageID, data: &[u8]) -> DbResult {
        let page_size = BufferPool::get_page_size();
        let start_pos = pid.page_index as usize * page_size;

        let mut file = self.get_file();
        file.seek(SeekFrom::Start(start_pos as u64))
            .map_err(|e| DbError::io(&e.to_string()))?;
        file.write_all(data)
            .map_err(|e| DbError::io(&e.to_string()))?;
        file.flush().map_err(|e| DbError::io(&e.to_string()))?;

        Ok(())
    }

    /// Add the tuple to the first page with a free slot, appending a
    /// fresh page when the table is packed. Returns the pages dirtied
    /// by the operation.
    ///
    /// The probe fetches every candidate page with ReadWrite
    /// permission; a page that turns out to be full is unlocked right
    /// away so that readers can go on. This trades strict 2PL on the
    /// non-modifying probes for less contention.
    pub fn insert_tuple(
        &self,
        tx: &Transaction,
        tuple: &Tuple,
    ) -> Result<Vec<Pod<HeapPage>>, DbError> {
        for i in 0..self.num_pages() {
            let pid = HeapPageID::new(self.table_id, i as u32);
            let page_rc = BufferPool::get_page(tx, Permission::ReadWrite, &pid)?;

            let has_room = page_rc.rl().empty_slots_count() > 0;
            if has_room {
                page_rc.wl().insert_tuple(tuple)?;
                return Ok(vec![page_rc]);
            }

            BufferPool::unsafe_release_page(tx, &pid);
        }

        // every existing page is packed, append a fresh one
        let pid = HeapPageID::new(self.table_id, self.num_pages() as u32);
        debug!("table {} appends page {}", self.table_id, pid);
        self.write_page_to_disk(&pid, &HeapPage::empty_page_data())?;

        let page_rc = BufferPool::get_page(tx, Permission::ReadWrite, &pid)?;
        page_rc.wl().insert_tuple(tuple)?;
        Ok(vec![page_rc])
    }

    /// Remove the tuple from the page recorded in its record id.
    /// Returns the dirtied page.
    pub fn delete_tuple(&self, tx: &Transaction, tuple: &WrappedTuple) -> ResultPod<HeapPage> {
        let pid = tuple.get_pid();
        let page_rc = BufferPool::get_page(tx, Permission::ReadWrite, &pid)?;
        page_rc.wl().delete_tuple(tuple.get_slot_number())?;
        Ok(page_rc)
    }

    /// A restartable cursor over the table. The page count is
    /// captured here, pages appended while the cursor is open are not
    /// visible to it.
    pub fn iter(&self, tx: &Transaction) -> HeapTableIterator {
        HeapTableIterator::new(tx, self.table_id, self.num_pages())
    }
}

pub struct HeapTableIterator {
    tx: Transaction,
    table_id: u32,

    page_count: usize,
    page_index: usize,

    buffer: Vec<WrappedTuple>,
    cursor: usize,
}

impl HeapTableIterator {
    pub fn new(tx: &Transaction, table_id: u32, page_count: usize) -> Self {
        Self {
            tx: *tx,
            table_id,
            page_count,
            page_index: 0,
            buffer: Vec::new(),
            cursor: 0,
        }
    }

    pub fn rewind(&mut self) {
        self.page_index = 0;
        self.buffer.clear();
        self.cursor = 0;
    }

    /// Fetch the next tuple, pulling the next page through the buffer
    /// pool (ReadOnly) when the current one is exhausted.
    pub fn try_next(&mut self) -> Result<Option<WrappedTuple>, DbError> {
        loop {
            if self.cursor < self.buffer.len() {
                let tuple = self.buffer[self.cursor].clone();
                self.cursor += 1;
                return Ok(Some(tuple));
            }

            if self.page_index >= self.page_count {
                return Ok(None);
            }

            let pid = HeapPageID::new(self.table_id, self.page_index as u32);
            let page_rc = BufferPool::get_page(&self.tx, Permission::ReadOnly, &pid)?;

            self.buffer = page_rc.rl().iter().collect();
            self.cursor = 0;
            self.page_index += 1;
        }
    }
}

impl Iterator for HeapTableIterator {
    type Item = WrappedTuple;

    fn next(&mut self) -> Option<Self::Item> {
        self.try_next().expect("table scan failed")
    }
}
