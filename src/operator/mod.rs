mod aggregate;
mod delete;
mod filter;
mod insert;
mod scan;

pub use aggregate::{Aggregate, AggregateOp, Aggregator, IntegerAggregator, StringAggregator};
pub use delete::Delete;
pub use filter::Filter;
pub use insert::Insert;
pub use scan::SeqScan;

use crate::{
    error::DbError,
    storage::{schema::Schema, tuple::WrappedTuple},
    types::DbResult,
};

/// Volcano-style pull iterator: every operator produces one tuple per
/// `next` call and pulls its input from its children on demand.
pub trait OpIterator {
    fn open(&mut self) -> DbResult;

    fn close(&mut self) -> DbResult;

    fn has_next(&mut self) -> Result<bool, DbError>;

    fn next(&mut self) -> Result<WrappedTuple, DbError>;

    /// Restart the stream from the beginning.
    fn rewind(&mut self) -> DbResult;

    /// Schema of the tuples this operator emits.
    fn get_schema(&self) -> Schema;

    fn get_children(&self) -> Vec<&dyn OpIterator>;

    fn set_children(&mut self, children: Vec<Box<dyn OpIterator>>);
}
