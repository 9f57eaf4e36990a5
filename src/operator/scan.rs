use crate::{
    error::DbError,
    heap::table::HeapTableIterator,
    operator::OpIterator,
    storage::{schema::Schema, tuple::WrappedTuple},
    transaction::Transaction,
    types::DbResult,
    utils::HandyRwLock,
    Database,
};

/// Sequential scan over a heap table. The page count is captured on
/// `open`, so pages appended afterwards stay invisible to this scan.
pub struct SeqScan {
    tx: Transaction,
    table_id: u32,
    schema: Schema,

    iter: Option<HeapTableIterator>,
    peeked: Option<WrappedTuple>,
}

impl SeqScan {
    pub fn new(tx: &Transaction, table_id: u32) -> Result<Self, DbError> {
        let table_rc = Database::catalog()
            .get_table(&table_id)
            .ok_or_else(|| DbError::new(&format!("table {} not found", table_id)))?;
        let schema = table_rc.rl().schema.clone();

        Ok(Self {
            tx: *tx,
            table_id,
            schema,
            iter: None,
            peeked: None,
        })
    }
}

impl OpIterator for SeqScan {
    fn open(&mut self) -> DbResult {
        let table_rc = Database::catalog()
            .get_table(&self.table_id)
            .ok_or_else(|| DbError::new(&format!("table {} not found", self.table_id)))?;
        let table = table_rc.rl();

        self.iter = Some(table.iter(&self.tx));
        self.peeked = None;
        Ok(())
    }

    fn close(&mut self) -> DbResult {
        self.iter = None;
        self.peeked = None;
        Ok(())
    }

    fn has_next(&mut self) -> Result<bool, DbError> {
        if self.peeked.is_some() {
            return Ok(true);
        }

        let iter = self
            .iter
            .as_mut()
            .ok_or_else(|| DbError::new("operator is not open"))?;
        self.peeked = iter.try_next()?;
        Ok(self.peeked.is_some())
    }

    fn next(&mut self) -> Result<WrappedTuple, DbError> {
        if !self.has_next()? {
            return Err(DbError::new("no more tuples"));
        }
        Ok(self.peeked.take().unwrap())
    }

    fn rewind(&mut self) -> DbResult {
        let iter = self
            .iter
            .as_mut()
            .ok_or_else(|| DbError::new("operator is not open"))?;
        iter.rewind();
        self.peeked = None;
        Ok(())
    }

    fn get_schema(&self) -> Schema {
        self.schema.clone()
    }

    fn get_children(&self) -> Vec<&dyn OpIterator> {
        vec![]
    }

    fn set_children(&mut self, _children: Vec<Box<dyn OpIterator>>) {}
}
