mod setup;
mod tables;

pub use setup::setup;
pub use tables::{new_empty_heap_table, new_random_heap_table, table_path};
