use std::collections::HashMap;

use log::debug;

use crate::{
    error::DbError,
    predicate::Op,
    storage::{schema::Type, tuple::Cell},
    transaction::Transaction,
    utils::HandyRwLock,
    Database,
};

use super::histogram::{IntHistogram, StringHistogram};

pub const NUM_HIST_BINS: usize = 100;

/// Per-table statistics: one histogram per column, plus the page and
/// tuple counts the planner needs for scan cost and cardinality
/// estimates.
pub struct TableStats {
    num_pages: usize,
    num_tuples: usize,
    io_cost_per_page: usize,

    int_histograms: HashMap<usize, IntHistogram>,
    string_histograms: HashMap<usize, StringHistogram>,
}

impl TableStats {
    /// Build the statistics with two sequential scans: the first one
    /// finds the value range of every int column, the second one
    /// populates the histograms.
    pub fn new(table_id: u32, io_cost_per_page: usize) -> Result<Self, DbError> {
        let table_rc = Database::catalog()
            .get_table(&table_id)
            .ok_or_else(|| DbError::new(&format!("table {} not found", table_id)))?;
        let table = table_rc.rl();
        let schema = table.schema.clone();

        let tx = Transaction::new();

        // pass 1: (min, max) of every int column
        let mut ranges: HashMap<usize, (i64, i64)> = HashMap::new();
        let mut num_tuples = 0;

        let mut iter = table.iter(&tx);
        while let Some(tuple) = iter.try_next()? {
            num_tuples += 1;

            for (i, field) in schema.fields.iter().enumerate() {
                if field.t != Type::Int64 {
                    continue;
                }

                let v = tuple.get_cell(i).get_int64()?;
                let range = ranges.entry(i).or_insert((v, v));
                range.0 = range.0.min(v);
                range.1 = range.1.max(v);
            }
        }

        let mut int_histograms: HashMap<usize, IntHistogram> = HashMap::new();
        let mut string_histograms: HashMap<usize, StringHistogram> = HashMap::new();
        for (i, field) in schema.fields.iter().enumerate() {
            match field.t {
                Type::Int64 => {
                    let (min, max) = ranges.get(&i).cloned().unwrap_or((0, 0));
                    int_histograms.insert(i, IntHistogram::new(NUM_HIST_BINS, min, max));
                }
                Type::Bytes(_) => {
                    string_histograms.insert(i, StringHistogram::new(NUM_HIST_BINS));
                }
            }
        }

        // pass 2: populate the histograms
        iter.rewind();
        while let Some(tuple) = iter.try_next()? {
            for (i, field) in schema.fields.iter().enumerate() {
                match field.t {
                    Type::Int64 => {
                        let v = tuple.get_cell(i).get_int64()?;
                        int_histograms.get_mut(&i).unwrap().add_value(v)?;
                    }
                    Type::Bytes(_) => {
                        let s = tuple.get_cell(i).get_string()?;
                        string_histograms.get_mut(&i).unwrap().add_value(&s)?;
                    }
                }
            }
        }

        let num_pages = table.num_pages();
        tx.commit()?;

        debug!(
            "stats for table {}: {} tuples over {} pages",
            table_id, num_tuples, num_pages
        );

        Ok(Self {
            num_pages,
            num_tuples,
            io_cost_per_page,
            int_histograms,
            string_histograms,
        })
    }

    /// Cost of a full sequential scan of the table.
    pub fn estimate_scan_cost(&self) -> f64 {
        (self.num_pages * self.io_cost_per_page) as f64
    }

    pub fn num_tuples(&self) -> usize {
        self.num_tuples
    }

    /// Number of tuples a scan with the given predicate selectivity
    /// would emit.
    pub fn estimate_table_cardinality(&self, selectivity: f64) -> usize {
        (self.num_tuples as f64 * selectivity) as usize
    }

    /// Estimated selectivity of `<field> <op> <constant>` on this
    /// table.
    pub fn estimate_selectivity(
        &self,
        field: usize,
        op: Op,
        constant: &Cell,
    ) -> Result<f64, DbError> {
        match constant {
            Cell::Int64(v) => {
                let hist = self
                    .int_histograms
                    .get(&field)
                    .ok_or_else(|| DbError::new(&format!("no int histogram for field {}", field)))?;
                Ok(hist.estimate_selectivity(op, *v))
            }
            Cell::String(s) => {
                let hist = self.string_histograms.get(&field).ok_or_else(|| {
                    DbError::new(&format!("no string histogram for field {}", field))
                })?;
                Ok(hist.estimate_selectivity(op, s))
            }
        }
    }

    pub fn avg_selectivity(&self, field: usize, _op: Op) -> Result<f64, DbError> {
        if let Some(hist) = self.int_histograms.get(&field) {
            return Ok(hist.avg_selectivity());
        }
        if let Some(hist) = self.string_histograms.get(&field) {
            return Ok(hist.avg_selectivity());
        }
        Err(DbError::new(&format!("no histogram for field {}", field)))
    }
}
