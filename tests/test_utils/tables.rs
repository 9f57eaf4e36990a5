use std::sync::{Arc, RwLock};

use heap_db::{
    catalog::TableRC,
    storage::{schema::Schema, tuple::Tuple},
    transaction::Transaction,
    utils::HandyRwLock,
    BufferPool, Database, HeapTable,
};
use log::debug;
use rand::prelude::*;

pub fn table_path(name: &str) -> String {
    format!("data/default_db/{}.db", name)
}

/// Create an empty int-column table and register it with the catalog.
/// A stale backing file from an earlier run is removed first.
pub fn new_empty_heap_table(name: &str, columns: usize) -> TableRC {
    let path = table_path(name);
    let _ = std::fs::remove_file(&path);

    let schema = Schema::small_int_schema(columns);
    let table_rc = Arc::new(RwLock::new(HeapTable::new(&path, &schema)));
    Database::mut_catalog().add_table(Arc::clone(&table_rc), name);
    table_rc
}

/// Create a table filled with `rows` random int tuples, committed
/// before returning.
///
/// # Arguments:
///
/// - int_tuples: This is a reference used to return all inserted
///   data. Only works when it's not None.
pub fn new_random_heap_table(
    name: &str,
    columns: usize,
    rows: usize,
    int_tuples: Option<&mut Vec<Vec<i64>>>,
) -> TableRC {
    let table_rc = new_empty_heap_table(name, columns);

    let table_id = table_rc.rl().get_id();

    let mut rng = rand::thread_rng();
    let mut rows_written: Vec<Vec<i64>> = Vec::new();

    let tx = Transaction::new();
    for _ in 0..rows {
        let value = rng.gen_range(i64::min_value() / 2, i64::max_value() / 2);
        let tuple = Tuple::new_int_tuples(value, columns);
        BufferPool::insert_tuple(&tx, table_id, &tuple).unwrap();
        rows_written.push(vec![value; columns]);
    }
    tx.commit().unwrap();

    if let Some(int_tuples) = int_tuples {
        *int_tuples = rows_written;
    }

    debug!("table construction finished, insert {} rows in total", rows);
    table_rc
}
