mod histogram;
mod table_stats;

pub use histogram::{IntHistogram, StringHistogram};
pub use table_stats::{TableStats, NUM_HIST_BINS};
