mod test_utils;

use heap_db::{
    operator::{Aggregate, AggregateOp, Delete, Filter, Insert, OpIterator, SeqScan},
    storage::tuple::{Cell, Tuple},
    transaction::Transaction,
    utils::HandyRwLock,
    BufferPool, Op, Predicate,
};

/// Insert `values` as (value, value) pairs into a fresh 2-column
/// table, committed.
fn table_with_values(name: &str, values: &[i64]) -> u32 {
    let table_rc = test_utils::new_empty_heap_table(name, 2);
    let table_id = table_rc.rl().get_id();

    let tx = Transaction::new();
    for v in values {
        BufferPool::insert_tuple(&tx, table_id, &Tuple::new_int_tuples(*v, 2)).unwrap();
    }
    tx.commit().unwrap();

    table_id
}

fn drain(op: &mut dyn OpIterator) -> Vec<Vec<i64>> {
    let mut rows = Vec::new();
    while op.has_next().unwrap() {
        let tuple = op.next().unwrap();
        rows.push(
            tuple
                .get_cells()
                .iter()
                .map(|c| c.get_int64().unwrap())
                .collect(),
        );
    }
    rows
}

#[test]
fn test_filter() {
    let _guard = test_utils::setup();

    let values: Vec<i64> = (0..100).collect();
    let table_id = table_with_values("op_filter", &values);

    let tx = Transaction::new();
    let scan = SeqScan::new(&tx, table_id).unwrap();
    let predicate = Predicate::new(0, Op::GreaterThanOrEq, &Cell::Int64(50));
    let mut filter = Filter::new(predicate, Box::new(scan));

    filter.open().unwrap();
    let rows = drain(&mut filter);
    assert_eq!(rows.len(), 50);
    assert!(rows.iter().all(|r| r[0] >= 50));

    // rewinding replays the stream
    filter.rewind().unwrap();
    assert_eq!(drain(&mut filter).len(), 50);

    filter.close().unwrap();
    tx.commit().unwrap();
}

#[test]
fn test_insert_operator() {
    let _guard = test_utils::setup();

    let source_values: Vec<i64> = (0..10).collect();
    let source_id = table_with_values("op_insert_src", &source_values);
    let dest_rc = test_utils::new_empty_heap_table("op_insert_dst", 2);
    let dest_id = dest_rc.rl().get_id();

    let tx = Transaction::new();
    let scan = SeqScan::new(&tx, source_id).unwrap();
    let mut insert = Insert::new(&tx, Box::new(scan), dest_id).unwrap();

    insert.open().unwrap();
    assert!(insert.has_next().unwrap());

    let count = insert.next().unwrap();
    assert_eq!(count.get_cell(0).get_int64().unwrap(), 10);

    // the count comes out exactly once
    assert!(!insert.has_next().unwrap());

    insert.close().unwrap();
    tx.commit().unwrap();

    let tx = Transaction::new();
    assert_eq!(dest_rc.rl().iter(&tx).count(), 10);
    tx.commit().unwrap();
}

#[test]
fn test_insert_schema_mismatch() {
    let _guard = test_utils::setup();

    let source_id = table_with_values("op_mismatch_src", &[1, 2, 3]);
    let dest_rc = test_utils::new_empty_heap_table("op_mismatch_dst", 3);
    let dest_id = dest_rc.rl().get_id();

    let tx = Transaction::new();
    let scan = SeqScan::new(&tx, source_id).unwrap();

    let result = Insert::new(&tx, Box::new(scan), dest_id);
    assert!(result.is_err());
    tx.abort().unwrap();
}

#[test]
fn test_delete_operator() {
    let _guard = test_utils::setup();

    let values: Vec<i64> = (0..20).collect();
    let table_id = table_with_values("op_delete", &values);

    let tx = Transaction::new();
    let scan = SeqScan::new(&tx, table_id).unwrap();
    let predicate = Predicate::new(0, Op::LessThan, &Cell::Int64(10));
    let filter = Filter::new(predicate, Box::new(scan));
    let mut delete = Delete::new(&tx, Box::new(filter));

    delete.open().unwrap();
    let count = delete.next().unwrap();
    assert_eq!(count.get_cell(0).get_int64().unwrap(), 10);
    delete.close().unwrap();
    tx.commit().unwrap();

    // only the tuples >= 10 survive
    let tx = Transaction::new();
    let mut scan = SeqScan::new(&tx, table_id).unwrap();
    scan.open().unwrap();
    let rows = drain(&mut scan);
    assert_eq!(rows.len(), 10);
    assert!(rows.iter().all(|r| r[0] >= 10));
    scan.close().unwrap();
    tx.commit().unwrap();
}

#[test]
fn test_aggregate_operator() {
    let _guard = test_utils::setup();

    let table_rc = test_utils::new_empty_heap_table("op_aggregate", 2);
    let table_id = table_rc.rl().get_id();

    let tx = Transaction::new();
    for (group, value) in &[(1i64, 10i64), (1, 20), (2, 30)] {
        let tuple = Tuple::new_from_cells(&[Cell::Int64(*group), Cell::Int64(*value)]);
        BufferPool::insert_tuple(&tx, table_id, &tuple).unwrap();
    }
    tx.commit().unwrap();

    let tx = Transaction::new();

    let cases: Vec<(AggregateOp, Vec<Vec<i64>>)> = vec![
        (AggregateOp::Sum, vec![vec![1, 30], vec![2, 30]]),
        (AggregateOp::Avg, vec![vec![1, 15], vec![2, 30]]),
        (AggregateOp::Count, vec![vec![1, 2], vec![2, 1]]),
        (AggregateOp::Min, vec![vec![1, 10], vec![2, 30]]),
        (AggregateOp::Max, vec![vec![1, 20], vec![2, 30]]),
    ];

    for (op, expected) in cases {
        let scan = SeqScan::new(&tx, table_id).unwrap();
        let mut aggregate = Aggregate::new(Box::new(scan), 1, Some(0), op).unwrap();

        aggregate.open().unwrap();
        let mut rows = drain(&mut aggregate);
        rows.sort();
        assert_eq!(rows, expected, "op: {}", op);
        aggregate.close().unwrap();
    }

    // without grouping a single row comes out
    let scan = SeqScan::new(&tx, table_id).unwrap();
    let mut aggregate = Aggregate::new(Box::new(scan), 1, None, AggregateOp::Sum).unwrap();
    aggregate.open().unwrap();
    assert_eq!(drain(&mut aggregate), vec![vec![60]]);
    aggregate.close().unwrap();

    tx.commit().unwrap();
}

#[test]
fn test_aggregate_schema() {
    let _guard = test_utils::setup();

    let table_id = table_with_values("op_agg_schema", &[1, 2, 3]);

    let tx = Transaction::new();
    let scan = SeqScan::new(&tx, table_id).unwrap();
    let aggregate =
        Aggregate::new(Box::new(scan), 1, Some(0), AggregateOp::Sum).unwrap();

    let schema = aggregate.get_schema();
    assert_eq!(schema.fields.len(), 2);
    assert_eq!(schema.fields[0].name, "int-column-0");
    assert_eq!(schema.fields[1].name, "SUM(int-column-1)");

    tx.commit().unwrap();
}
