use std::{
    mem,
    path::PathBuf,
    sync::{Arc, Once, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::{
    buffer_pool::BufferPool,
    catalog::Catalog,
    transaction::ConcurrentStatus,
    tx_log::LogManager,
    types::Pod,
    utils::HandyRwLock,
};

/// We collect all global services here.
///
/// These variables cannot be initialized as static variables, because
/// their initialization functions all rely on non-const fn (e.g.
/// `HashMap::new()`).
pub struct Database {
    path: PathBuf,

    buffer_pool: Pod<BufferPool>,
    catalog: Pod<Catalog>,
    concurrent_status: Pod<ConcurrentStatus>,
    log_manager: Pod<LogManager>,
}

static mut SINGLETON: *mut Database = 0 as *mut Database;

impl Database {
    fn new() -> Self {
        let db_name = "default_db";
        let db_path = PathBuf::from("data").join(db_name);
        if !db_path.exists() {
            std::fs::create_dir_all(&db_path).unwrap();
        }

        let log_path = db_path.join("wal.log");

        Self {
            path: db_path,

            buffer_pool: Arc::new(RwLock::new(BufferPool::new())),
            catalog: Arc::new(RwLock::new(Catalog::new())),
            concurrent_status: Arc::new(RwLock::new(ConcurrentStatus::new())),
            log_manager: Arc::new(RwLock::new(LogManager::new(log_path))),
        }
    }

    /// Reset the in-memory status of the database, used by tests
    /// mostly.
    ///
    /// Actions:
    /// - The page cache is cleared.
    /// - The catalog is cleared.
    /// - The lock table is cleared.
    /// - The log file is truncated.
    pub fn reset() {
        // Initialize the new db instance.
        let singleton = Self::new();

        // Truncate the log before the instance goes live (going
        // through the accessors here would re-enter global()).
        singleton.log_manager.wl().reset();

        unsafe {
            if !SINGLETON.is_null() {
                // Drop the previous db instance if it's already
                // initialized.
                mem::drop(Box::from_raw(SINGLETON));
            }

            // Put it in the heap so it can outlive this call.
            SINGLETON = mem::transmute(Box::new(singleton));
        }
    }

    pub fn global() -> &'static Self {
        static INIT: Once = Once::new();

        INIT.call_once(|| unsafe {
            if SINGLETON.is_null() {
                Self::reset();
            }
        });

        unsafe { SINGLETON.as_ref().unwrap() }
    }

    pub fn path() -> PathBuf {
        Self::global().path.clone()
    }

    pub fn buffer_pool() -> RwLockReadGuard<'static, BufferPool> {
        Self::global().buffer_pool.rl()
    }

    pub fn mut_buffer_pool() -> RwLockWriteGuard<'static, BufferPool> {
        Self::global().buffer_pool.wl()
    }

    pub fn catalog() -> RwLockReadGuard<'static, Catalog> {
        Self::global().catalog.rl()
    }

    pub fn mut_catalog() -> RwLockWriteGuard<'static, Catalog> {
        Self::global().catalog.wl()
    }

    pub fn concurrent_status() -> RwLockReadGuard<'static, ConcurrentStatus> {
        Self::global().concurrent_status.rl()
    }

    pub fn mut_concurrent_status() -> RwLockWriteGuard<'static, ConcurrentStatus> {
        Self::global().concurrent_status.wl()
    }

    pub fn log_manager() -> RwLockReadGuard<'static, LogManager> {
        Self::global().log_manager.rl()
    }

    pub fn mut_log_manager() -> RwLockWriteGuard<'static, LogManager> {
        Self::global().log_manager.wl()
    }
}
