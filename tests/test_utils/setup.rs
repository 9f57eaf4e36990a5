use std::sync::{Mutex, MutexGuard};

use heap_db::{
    buffer_pool::{BufferPool, DEFAULT_PAGE_SIZE},
    utils, Database,
};
use once_cell::sync::Lazy;

// The database is a process-wide singleton, tests sharing it cannot
// overlap.
static SERIAL: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// # Conduct the initialization
///
/// - Setting up log configurations.
/// - Reset page size.
/// - Reset the database singleton (page cache, catalog, lock table,
///   log file).
///
/// The returned guard keeps other tests of the same binary from
/// touching the database until it is dropped.
pub fn setup() -> MutexGuard<'static, ()> {
    let guard = SERIAL.lock().unwrap_or_else(|e| e.into_inner());

    utils::init_log();
    BufferPool::set_page_size(DEFAULT_PAGE_SIZE);
    Database::reset();

    guard
}
