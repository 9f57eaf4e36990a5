use crate::{
    buffer_pool::BufferPool,
    error::DbError,
    operator::OpIterator,
    storage::{
        schema::{Field, Schema, Type},
        tuple::{Cell, Tuple, WrappedTuple},
    },
    transaction::Transaction,
    types::DbResult,
};

/// Drains its child on the first `next` call, deleting every tuple
/// (located through its record id), and emits a single one-field
/// tuple holding the number of deleted records.
pub struct Delete {
    tx: Transaction,
    child: Box<dyn OpIterator>,
    schema: Schema,
    done: bool,
}

impl Delete {
    pub fn new(tx: &Transaction, child: Box<dyn OpIterator>) -> Self {
        Self {
            tx: *tx,
            child,
            schema: Schema::new(vec![Field::new("count", Type::Int64)]),
            done: false,
        }
    }
}

impl OpIterator for Delete {
    fn open(&mut self) -> DbResult {
        self.done = false;
        self.child.open()
    }

    fn close(&mut self) -> DbResult {
        self.child.close()
    }

    fn has_next(&mut self) -> Result<bool, DbError> {
        Ok(!self.done)
    }

    fn next(&mut self) -> Result<WrappedTuple, DbError> {
        if self.done {
            return Err(DbError::new("no more tuples"));
        }

        let mut count: i64 = 0;
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            BufferPool::delete_tuple(&self.tx, &tuple)?;
            count += 1;
        }

        self.done = true;
        Ok(WrappedTuple::new_unstored(Tuple::new_from_cells(&[
            Cell::Int64(count),
        ])))
    }

    fn rewind(&mut self) -> DbResult {
        self.child.rewind()?;
        self.done = false;
        Ok(())
    }

    fn get_schema(&self) -> Schema {
        self.schema.clone()
    }

    fn get_children(&self) -> Vec<&dyn OpIterator> {
        vec![self.child.as_ref()]
    }

    fn set_children(&mut self, mut children: Vec<Box<dyn OpIterator>>) {
        self.child = children.remove(0);
    }
}
