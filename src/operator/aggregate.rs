use std::{collections::HashMap, fmt};

use crate::{
    error::DbError,
    operator::OpIterator,
    storage::{
        schema::{Field, Schema, Type},
        tuple::{Cell, Tuple, WrappedTuple},
    },
    types::DbResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateOp {
    Min,
    Max,
    Sum,
    Avg,
    Count,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            AggregateOp::Min => "MIN",
            AggregateOp::Max => "MAX",
            AggregateOp::Sum => "SUM",
            AggregateOp::Avg => "AVG",
            AggregateOp::Count => "COUNT",
        };
        write!(f, "{}", name)
    }
}

/// Streaming aggregation handler: tuples are merged in one at a time,
/// grouped results are read out at the end. The group key is `None`
/// when no grouping field was given.
pub trait Aggregator {
    fn merge(&mut self, tuple: &Tuple) -> DbResult;

    fn results(&self) -> Vec<Tuple>;
}

/// Aggregates int64 columns. AVG keeps both the running sum and the
/// count, the division happens when results are read.
pub struct IntegerAggregator {
    gfield: Option<usize>,
    afield: usize,
    op: AggregateOp,

    // group key -> (running value, count); the value is the running
    // sum for SUM/AVG and the running extremum for MIN/MAX
    groups: HashMap<Option<Cell>, (i64, i64)>,

    // first-seen order of the group keys, to keep the output stable
    order: Vec<Option<Cell>>,
}

impl IntegerAggregator {
    pub fn new(gfield: Option<usize>, afield: usize, op: AggregateOp) -> Self {
        Self {
            gfield,
            afield,
            op,
            groups: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn group_key(&self, tuple: &Tuple) -> Option<Cell> {
        self.gfield.map(|g| tuple.get_cell(g))
    }
}

impl Aggregator for IntegerAggregator {
    fn merge(&mut self, tuple: &Tuple) -> DbResult {
        let key = self.group_key(tuple);
        let v = tuple.get_cell(self.afield).get_int64()?;

        if !self.groups.contains_key(&key) {
            let init = match self.op {
                AggregateOp::Min => i64::max_value(),
                AggregateOp::Max => i64::min_value(),
                _ => 0,
            };
            self.groups.insert(key.clone(), (init, 0));
            self.order.push(key.clone());
        }

        let entry = self.groups.get_mut(&key).unwrap();
        entry.0 = match self.op {
            AggregateOp::Sum | AggregateOp::Avg => entry.0 + v,
            AggregateOp::Min => entry.0.min(v),
            AggregateOp::Max => entry.0.max(v),
            AggregateOp::Count => 0,
        };
        entry.1 += 1;

        Ok(())
    }

    fn results(&self) -> Vec<Tuple> {
        let mut tuples = Vec::new();
        for key in &self.order {
            let (value, count) = self.groups[key];
            let agg = match self.op {
                AggregateOp::Sum | AggregateOp::Min | AggregateOp::Max => value,
                AggregateOp::Avg => value / count,
                AggregateOp::Count => count,
            };

            let cells = match key {
                Some(group) => vec![group.clone(), Cell::Int64(agg)],
                None => vec![Cell::Int64(agg)],
            };
            tuples.push(Tuple::new_from_cells(&cells));
        }
        tuples
    }
}

/// Aggregates string columns. COUNT is the only operation that makes
/// sense here, everything else is rejected up front.
pub struct StringAggregator {
    gfield: Option<usize>,

    groups: HashMap<Option<Cell>, i64>,
    order: Vec<Option<Cell>>,
}

impl StringAggregator {
    pub fn new(
        gfield: Option<usize>,
        _afield: usize,
        op: AggregateOp,
    ) -> Result<Self, DbError> {
        if op != AggregateOp::Count {
            return Err(DbError::new(&format!(
                "string aggregator only supports COUNT, got {}",
                op
            )));
        }

        Ok(Self {
            gfield,
            groups: HashMap::new(),
            order: Vec::new(),
        })
    }
}

impl Aggregator for StringAggregator {
    fn merge(&mut self, tuple: &Tuple) -> DbResult {
        let key = self.gfield.map(|g| tuple.get_cell(g));

        if !self.groups.contains_key(&key) {
            self.groups.insert(key.clone(), 0);
            self.order.push(key.clone());
        }
        *self.groups.get_mut(&key).unwrap() += 1;

        Ok(())
    }

    fn results(&self) -> Vec<Tuple> {
        let mut tuples = Vec::new();
        for key in &self.order {
            let count = self.groups[key];
            let cells = match key {
                Some(group) => vec![group.clone(), Cell::Int64(count)],
                None => vec![Cell::Int64(count)],
            };
            tuples.push(Tuple::new_from_cells(&cells));
        }
        tuples
    }
}

/// Grouped aggregation operator: drains the child into an aggregator
/// on `open`, then exposes the aggregated result stream.
pub struct Aggregate {
    child: Box<dyn OpIterator>,
    afield: usize,
    gfield: Option<usize>,
    op: AggregateOp,

    schema: Schema,

    results: Vec<WrappedTuple>,
    cursor: usize,
}

impl Aggregate {
    pub fn new(
        child: Box<dyn OpIterator>,
        afield: usize,
        gfield: Option<usize>,
        op: AggregateOp,
    ) -> Result<Self, DbError> {
        let child_schema = child.get_schema();

        // COUNT is the only operation defined on string columns, fail
        // at construction like the aggregator would.
        if let Type::Bytes(_) = child_schema.fields[afield].t {
            if op != AggregateOp::Count {
                return Err(DbError::new(&format!(
                    "string aggregator only supports COUNT, got {}",
                    op
                )));
            }
        }

        let agg_field = Field::new(
            &format!("{}({})", op, child_schema.fields[afield].name),
            Type::Int64,
        );

        let schema = match gfield {
            Some(g) => Schema::new(vec![child_schema.fields[g].clone(), agg_field]),
            None => Schema::new(vec![agg_field]),
        };

        Ok(Self {
            child,
            afield,
            gfield,
            op,
            schema,
            results: Vec::new(),
            cursor: 0,
        })
    }

    fn build_aggregator(&self) -> Result<Box<dyn Aggregator>, DbError> {
        let child_schema = self.child.get_schema();
        match child_schema.fields[self.afield].t {
            Type::Int64 => Ok(Box::new(IntegerAggregator::new(
                self.gfield,
                self.afield,
                self.op,
            ))),
            Type::Bytes(_) => Ok(Box::new(StringAggregator::new(
                self.gfield,
                self.afield,
                self.op,
            )?)),
        }
    }
}

impl OpIterator for Aggregate {
    fn open(&mut self) -> DbResult {
        self.child.open()?;

        let mut aggregator = self.build_aggregator()?;
        while self.child.has_next()? {
            let tuple = self.child.next()?;
            aggregator.merge(&tuple)?;
        }

        self.results = aggregator
            .results()
            .into_iter()
            .map(WrappedTuple::new_unstored)
            .collect();
        self.cursor = 0;
        Ok(())
    }

    fn close(&mut self) -> DbResult {
        self.results.clear();
        self.cursor = 0;
        self.child.close()
    }

    fn has_next(&mut self) -> Result<bool, DbError> {
        Ok(self.cursor < self.results.len())
    }

    fn next(&mut self) -> Result<WrappedTuple, DbError> {
        if self.cursor >= self.results.len() {
            return Err(DbError::new("no more tuples"));
        }

        let tuple = self.results[self.cursor].clone();
        self.cursor += 1;
        Ok(tuple)
    }

    fn rewind(&mut self) -> DbResult {
        self.cursor = 0;
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

#[cfg(test)]
mod tests {
    use super::*;

    fn merge_all(aggregator: &mut dyn Aggregator, rows: &[(i64, i64)]) {
        for (group, value) in rows {
            let tuple =
                Tuple::new_from_cells(&[Cell::Int64(*group), Cell::Int64(*value)]);
            aggregator.merge(&tuple).unwrap();
        }
    }

    fn grouped_results(aggregator: &dyn Aggregator) -> Vec<(i64, i64)> {
        aggregator
            .results()
            .iter()
            .map(|t| {
                (
                    t.get_cell(0).get_int64().unwrap(),
                    t.get_cell(1).get_int64().unwrap(),
                )
            })
            .collect()
    }

    static ROWS: [(i64, i64); 3] = [(1, 10), (1, 20), (2, 30)];

    #[test]
    fn test_grouped_sum() {
        let mut aggregator = IntegerAggregator::new(Some(0), 1, AggregateOp::Sum);
        merge_all(&mut aggregator, &ROWS);
        assert_eq!(grouped_results(&aggregator), vec![(1, 30), (2, 30)]);
    }

    #[test]
    fn test_grouped_avg() {
        let mut aggregator = IntegerAggregator::new(Some(0), 1, AggregateOp::Avg);
        merge_all(&mut aggregator, &ROWS);
        assert_eq!(grouped_results(&aggregator), vec![(1, 15), (2, 30)]);
    }

    #[test]
    fn test_grouped_count() {
        let mut aggregator = IntegerAggregator::new(Some(0), 1, AggregateOp::Count);
        merge_all(&mut aggregator, &ROWS);
        assert_eq!(grouped_results(&aggregator), vec![(1, 2), (2, 1)]);
    }

    #[test]
    fn test_grouped_min_max() {
        let mut aggregator = IntegerAggregator::new(Some(0), 1, AggregateOp::Min);
        merge_all(&mut aggregator, &ROWS);
        assert_eq!(grouped_results(&aggregator), vec![(1, 10), (2, 30)]);

        let mut aggregator = IntegerAggregator::new(Some(0), 1, AggregateOp::Max);
        merge_all(&mut aggregator, &ROWS);
        assert_eq!(grouped_results(&aggregator), vec![(1, 20), (2, 30)]);
    }

    #[test]
    fn test_no_grouping() {
        let mut aggregator = IntegerAggregator::new(None, 1, AggregateOp::Sum);
        merge_all(&mut aggregator, &ROWS);

        let results = aggregator.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].get_cell(0).get_int64().unwrap(), 60);
    }

    #[test]
    fn test_string_count() {
        let mut aggregator =
            StringAggregator::new(Some(0), 1, AggregateOp::Count).unwrap();

        for (group, name) in &[(1, "a"), (1, "b"), (2, "c")] {
            let tuple = Tuple::new_from_cells(&[
                Cell::Int64(*group),
                Cell::String(name.to_string()),
            ]);
            aggregator.merge(&tuple).unwrap();
        }

        assert_eq!(grouped_results(&aggregator), vec![(1, 2), (2, 1)]);
    }

    #[test]
    fn test_string_rejects_sum() {
        assert!(StringAggregator::new(Some(0), 1, AggregateOp::Sum).is_err());
    }
}
