mod concurrent_status;
mod tx;

pub use concurrent_status::{ConcurrentStatus, Lock, Permission, ACQUIRE_TIMEOUT};
pub use tx::{Transaction, TransactionID};
