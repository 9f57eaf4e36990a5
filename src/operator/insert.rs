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
    utils::HandyRwLock,
    Database,
};

/// Drains its child on the first `next` call, inserting every tuple
/// into the target table, and emits a single one-field tuple holding
/// the number of inserted records.
pub struct Insert {
    tx: Transaction,
    child: Box<dyn OpIterator>,
    table_id: u32,
    schema: Schema,
    done: bool,
}

impl Insert {
    pub fn new(
        tx: &Transaction,
        child: Box<dyn OpIterator>,
        table_id: u32,
    ) -> Result<Self, DbError> {
        let table_rc = Database::catalog()
            .get_table(&table_id)
            .ok_or_else(|| DbError::new(&format!("table {} not found", table_id)))?;
        let table_schema = table_rc.rl().schema.clone();

        if child.get_schema() != table_schema {
            return Err(DbError::new(&format!(
                "child schema {:?} does not match table schema {:?}",
                child.get_schema(),
                table_schema,
            )));
        }

        Ok(Self {
            tx: *tx,
            child,
            table_id,
            schema: Schema::new(vec![Field::new("count", Type::Int64)]),
            done: false,
        })
    }
}

impl OpIterator for Insert {
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
            BufferPool::insert_tuple(&self.tx, self.table_id, &tuple)?;
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
