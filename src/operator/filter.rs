use crate::{
    error::DbError,
    operator::OpIterator,
    predicate::Predicate,
    storage::{schema::Schema, tuple::WrappedTuple},
    types::DbResult,
};

/// Streams the child tuples that satisfy the predicate.
pub struct Filter {
    predicate: Predicate,
    child: Box<dyn OpIterator>,
    peeked: Option<WrappedTuple>,
}

impl Filter {
    pub fn new(predicate: Predicate, child: Box<dyn OpIterator>) -> Self {
        Self {
            predicate,
            child,
            peeked: None,
        }
    }
}

impl OpIterator for Filter {
    fn open(&mut self) -> DbResult {
        self.peeked = None;
        self.child.open()
    }

    fn close(&mut self) -> DbResult {
        self.peeked = None;
        self.child.close()
    }

    fn has_next(&mut self) -> Result<bool, DbError> {
        if self.peeked.is_some() {
            return Ok(true);
        }

        while self.child.has_next()? {
            let tuple = self.child.next()?;
            if self.predicate.matches(&tuple.get_cell(self.predicate.field_index)) {
                self.peeked = Some(tuple);
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn next(&mut self) -> Result<WrappedTuple, DbError> {
        if !self.has_next()? {
            return Err(DbError::new("no more tuples"));
        }
        Ok(self.peeked.take().unwrap())
    }

    fn rewind(&mut self) -> DbResult {
        self.peeked = None;
        self.child.rewind()
    }

    fn get_schema(&self) -> Schema {
        self.child.get_schema()
    }

    fn get_children(&self) -> Vec<&dyn OpIterator> {
        vec![self.child.as_ref()]
    }

    fn set_children(&mut self, mut children: Vec<Box<dyn OpIterator>>) {
        self.child = children.remove(0);
    }
}
