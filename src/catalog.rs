use std::collections::HashMap;

use crate::{heap::table::HeapTable, types::Pod};

pub type TableID = u32;
pub type TableRC = Pod<HeapTable>;

/// Registry of the tables the database knows about, keyed by the
/// stable table id (the hash of the backing file path).
pub struct Catalog {
    tables: HashMap<TableID, TableRC>,
    table_names: HashMap<TableID, String>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
            table_names: HashMap::new(),
        }
    }

    pub fn add_table(&mut self, table_rc: TableRC, name: &str) {
        let table_id = {
            let table = table_rc.read().unwrap();
            table.get_id()
        };

        self.tables.insert(table_id, table_rc);
        self.table_names.insert(table_id, name.to_string());
    }

    pub fn get_table(&self, table_id: &TableID) -> Option<TableRC> {
        self.tables.get(table_id).cloned()
    }

    pub fn get_table_name(&self, table_id: &TableID) -> Option<String> {
        self.table_names.get(table_id).cloned()
    }

    pub fn table_ids(&self) -> Vec<TableID> {
        self.tables.keys().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.tables.clear();
        self.table_names.clear();
    }
}
