use std::{
    collections::HashMap,
    fs::{File, OpenOptions},
    io::{Seek, SeekFrom, Write},
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard},
};

use log::debug;

use crate::{
    error::DbError,
    transaction::{Transaction, TransactionID},
    types::DbResult,
};

#[derive(Debug, PartialEq, Clone, Copy)]
enum RecordType {
    Abort,
    Commit,
    Update,
    Start,
}

impl RecordType {
    fn to_u8(self) -> u8 {
        match self {
            RecordType::Abort => 0,
            RecordType::Commit => 1,
            RecordType::Update => 2,
            RecordType::Start => 3,
        }
    }
}

/// Write-ahead log: an append-only stream of START / UPDATE / COMMIT
/// / ABORT records. UPDATE records carry the before and after image
/// of a page and must be forced to disk before that page is
/// overwritten.
pub struct LogManager {
    file: Mutex<File>,
    file_path: PathBuf,

    /// Byte offset of each active transaction's START record.
    tx_start_position: HashMap<TransactionID, u64>,

    /// The absolute position of the file descriptor cursor.
    current_offset: u64,

    total_records: usize,

    /// Cleared when an append fails. A broken log cannot guarantee
    /// write-ahead ordering anymore, so commits are refused.
    healthy: bool,
}

impl LogManager {
    pub fn new<P: AsRef<Path>>(file_path: P) -> Self {
        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .open(&file_path)
            .unwrap();

        Self {
            file: Mutex::new(file),
            file_path: file_path.as_ref().to_path_buf(),
            tx_start_position: HashMap::new(),
            current_offset: 0,
            total_records: 0,
            healthy: true,
        }
    }

    pub fn reset(&mut self) {
        let file = OpenOptions::new()
            .write(true)
            .read(true)
            .create(true)
            .truncate(true)
            .open(&self.file_path)
            .unwrap();

        self.file = Mutex::new(file);
        self.tx_start_position.clear();
        self.current_offset = 0;
        self.total_records = 0;
        self.healthy = true;
    }

    pub fn records_count(&self) -> usize {
        self.total_records
    }

    fn get_file(&self) -> MutexGuard<'_, File> {
        self.file.lock().unwrap()
    }

    pub fn log_start(&mut self, tx: &Transaction) -> DbResult {
        let mut record: Vec<u8> = Vec::new();
        record.push(RecordType::Start.to_u8());
        record.extend_from_slice(&tx.get_id().to_be_bytes());
        record.extend_from_slice(&self.current_offset.to_be_bytes());

        let start = self.current_offset;
        self.append(&record)?;
        self.tx_start_position.insert(tx.get_id(), start);
        Ok(())
    }

    /// Write an UPDATE record for the page (with the provided before
    /// and after images).
    pub fn log_write(&mut self, tid: TransactionID, before: &[u8], after: &[u8]) -> DbResult {
        debug!(
            "update record, tx: {}, before: {}.., after: {}..",
            tid,
            hex::encode(&before[..8.min(before.len())]),
            hex::encode(&after[..8.min(after.len())]),
        );

        let mut record: Vec<u8> = Vec::new();
        record.push(RecordType::Update.to_u8());
        record.extend_from_slice(&tid.to_be_bytes());
        record.extend_from_slice(&(before.len() as u32).to_be_bytes());
        record.extend_from_slice(before);
        record.extend_from_slice(&(after.len() as u32).to_be_bytes());
        record.extend_from_slice(after);
        record.extend_from_slice(&self.current_offset.to_be_bytes());

        self.append(&record)
    }

    /// Write a COMMIT record and force the log to disk. A log that
    /// already failed an append refuses the commit.
    pub fn log_commit(&mut self, tx: &Transaction) -> DbResult {
        if !self.healthy {
            return Err(DbError::io("log is broken, refusing to commit"));
        }

        let mut record: Vec<u8> = Vec::new();
        record.push(RecordType::Commit.to_u8());
        record.extend_from_slice(&tx.get_id().to_be_bytes());
        record.extend_from_slice(&self.current_offset.to_be_bytes());

        self.append(&record)?;
        self.force()?;
        self.tx_start_position.remove(&tx.get_id());
        Ok(())
    }

    /// Write an ABORT record and force the log to disk.
    pub fn log_abort(&mut self, tx: &Transaction) -> DbResult {
        let mut record: Vec<u8> = Vec::new();
        record.push(RecordType::Abort.to_u8());
        record.extend_from_slice(&tx.get_id().to_be_bytes());
        record.extend_from_slice(&self.current_offset.to_be_bytes());

        self.append(&record)?;
        self.force()?;
        self.tx_start_position.remove(&tx.get_id());
        Ok(())
    }

    /// Fsync the log file.
    pub fn force(&mut self) -> DbResult {
        let result = self.get_file().sync_all();
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.healthy = false;
                Err(DbError::io(&e.to_string()))
            }
        }
    }

    fn append(&mut self, record: &[u8]) -> DbResult {
        let result = {
            let mut file = self.get_file();
            file.seek(SeekFrom::Start(self.current_offset))
                .and_then(|_| file.write_all(record))
        };

        match result {
            Ok(_) => {
                self.current_offset += record.len() as u64;
                self.total_records += 1;
                Ok(())
            }
            Err(e) => {
                self.healthy = false;
                Err(DbError::io(&e.to_string()))
            }
        }
    }
}
