use std::fmt;

use crate::storage::tuple::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Equals,
    GreaterThan,
    GreaterThanOrEq,
    LessThan,
    LessThanOrEq,
    NotEquals,
}

#[derive(Clone)]
pub struct Predicate {
    pub field_index: usize,
    pub op: Op,
    pub cell: Cell,
}

impl Predicate {
    pub fn new(field_index: usize, op: Op, cell: &Cell) -> Self {
        Self {
            field_index,
            op,
            cell: cell.clone(),
        }
    }

    pub fn matches(&self, cell: &Cell) -> bool {
        match self.op {
            Op::Equals => cell == &self.cell,
            Op::GreaterThan => cell > &self.cell,
            Op::GreaterThanOrEq => cell >= &self.cell,
            Op::LessThan => cell < &self.cell,
            Op::LessThanOrEq => cell <= &self.cell,
            Op::NotEquals => cell != &self.cell,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "field_index: {}, op: {:?}, cell: {:?}",
            self.field_index, self.op, self.cell
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches() {
        let predicate = Predicate::new(0, Op::LessThan, &Cell::Int64(5));
        assert!(predicate.matches(&Cell::Int64(4)));
        assert!(!predicate.matches(&Cell::Int64(5)));

        let predicate = Predicate::new(0, Op::Equals, &Cell::String("foo".to_string()));
        assert!(predicate.matches(&Cell::String("foo".to_string())));
        assert!(!predicate.matches(&Cell::String("bar".to_string())));
    }

    #[test]
    fn test_complements() {
        let v = Cell::Int64(7);
        for probe in &[Cell::Int64(6), Cell::Int64(7), Cell::Int64(8)] {
            let eq = Predicate::new(0, Op::Equals, &v).matches(probe);
            let ne = Predicate::new(0, Op::NotEquals, &v).matches(probe);
            assert_ne!(eq, ne);

            let lt = Predicate::new(0, Op::LessThan, &v).matches(probe);
            let ge = Predicate::new(0, Op::GreaterThanOrEq, &v).matches(probe);
            assert_ne!(lt, ge);
        }
    }
}
