use std::{
    fmt::{self},
    io::{Cursor, Read},
};

use crate::{
    error::DbError,
    heap::page_id::HeapPageID,
    storage::schema::{Schema, Type},
};

#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Cell {
    Int64(i64),
    String(String),
}

impl Cell {
    pub fn get_int64(&self) -> Result<i64, DbError> {
        match self {
            Cell::Int64(v) => Ok(*v),
            _ => Err(DbError::new("not an int64 cell")),
        }
    }

    pub fn get_string(&self) -> Result<String, DbError> {
        match self {
            Cell::String(v) => Ok(v.clone()),
            _ => Err(DbError::new("not a string cell")),
        }
    }

    pub fn read_from<R: Read>(reader: &mut R, t: Type) -> Self {
        match t {
            Type::Int64 => {
                let mut buf = [0u8; 8];
                reader.read_exact(&mut buf).expect("io error");
                Cell::Int64(i64::from_be_bytes(buf))
            }
            Type::Bytes(size) => {
                let mut len = [0u8; 1];
                reader.read_exact(&mut len).expect("io error");

                let mut buf = vec![0u8; size as usize];
                reader.read_exact(&mut buf).expect("io error");

                let len = (len[0] as usize).min(size as usize);
                buf.truncate(len);
                Cell::String(String::from_utf8_lossy(&buf).to_string())
            }
        }
    }

    pub fn encode(&self, t: Type) -> Vec<u8> {
        match (self, t) {
            (Cell::Int64(v), Type::Int64) => v.to_be_bytes().to_vec(),
            (Cell::String(v), Type::Bytes(size)) => {
                // one length byte, then the payload padded to the
                // declared width
                let size = size as usize;
                let payload = v.as_bytes();
                let len = payload.len().min(size);

                let mut bytes = Vec::with_capacity(1 + size);
                bytes.push(len as u8);
                bytes.extend_from_slice(&payload[..len]);
                bytes.resize(1 + size, 0);
                bytes
            }
            _ => panic!("cell does not match the declared type"),
        }
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Cell::Int64(a), Cell::Int64(b)) => a.partial_cmp(b),
            (Cell::String(a), Cell::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.partial_cmp(other)
            .expect("cannot compare cells of different types")
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Cell::Int64(v) => write!(f, "{}", v),
            Cell::String(v) => write!(f, "{:?}", v),
        }
    }
}

#[derive(Clone)]
pub struct Tuple {
    cells: Vec<Cell>,
}

impl Tuple {
    pub fn new_from_cells(cells: &[Cell]) -> Self {
        Self {
            cells: cells.to_vec(),
        }
    }

    pub fn read_from<R: Read>(reader: &mut R, schema: &Schema) -> Self {
        let mut cells: Vec<Cell> = Vec::new();
        for field in &schema.fields {
            cells.push(Cell::read_from(reader, field.t));
        }
        Tuple { cells }
    }

    pub fn new(schema: &Schema, bytes: &[u8]) -> Self {
        let mut reader = Cursor::new(bytes);
        Self::read_from(&mut reader, schema)
    }

    pub fn new_int_tuples(value: i64, width: usize) -> Self {
        let mut cells: Vec<Cell> = Vec::new();
        for _ in 0..width {
            cells.push(Cell::Int64(value));
        }

        Tuple { cells }
    }

    pub fn to_bytes(&self, schema: &Schema) -> Vec<u8> {
        let mut bytes = Vec::new();
        for (cell, field) in self.cells.iter().zip(&schema.fields) {
            let mut cell_bytes = cell.encode(field.t);
            bytes.append(&mut cell_bytes);
        }
        bytes
    }

    pub fn get_cell(&self, i: usize) -> Cell {
        self.cells[i].clone()
    }

    pub fn set_cell(&mut self, i: usize, c: Cell) {
        self.cells[i] = c;
    }

    pub fn get_cells(&self) -> Vec<Cell> {
        self.cells.clone()
    }
}

impl PartialEq for Tuple {
    fn eq(&self, other: &Self) -> bool {
        if self.cells.len() != other.cells.len() {
            return false;
        }

        for (i, cell) in self.cells.iter().enumerate() {
            if cell != &other.cells[i] {
                return false;
            }
        }

        true
    }
}

impl Eq for Tuple {}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut content: String = "{".to_owned();
        for cell in &self.cells {
            let cell_str = format!("{:?}, ", cell);
            content.push_str(&cell_str);
        }
        content = content.trim_end_matches(", ").to_string();
        content.push('}');
        write!(f, "{}", content)
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

/// A tuple read back from a page, annotated with the slot it occupies.
pub struct WrappedTuple {
    internal: Tuple,
    slot_number: usize,
    pid: HeapPageID,
}

impl std::ops::Deref for WrappedTuple {
    type Target = Tuple;
    fn deref(&self) -> &Self::Target {
        &self.internal
    }
}

impl std::ops::DerefMut for WrappedTuple {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.internal
    }
}

impl WrappedTuple {
    pub fn new(internal: Tuple, slot_number: usize, pid: HeapPageID) -> WrappedTuple {
        WrappedTuple {
            internal,
            slot_number,
            pid,
        }
    }

    /// Wrap a tuple that is not stored on any page (operator output,
    /// e.g. an insertion count).
    pub fn new_unstored(internal: Tuple) -> WrappedTuple {
        WrappedTuple {
            internal,
            slot_number: 0,
            pid: HeapPageID::new(0, 0),
        }
    }

    pub fn get_slot_number(&self) -> usize {
        self.slot_number
    }

    pub fn get_pid(&self) -> HeapPageID {
        self.pid
    }

    pub fn get_tuple(&self) -> &Tuple {
        &self.internal
    }
}

impl Clone for WrappedTuple {
    fn clone(&self) -> WrappedTuple {
        WrappedTuple {
            internal: self.internal.clone(),
            slot_number: self.slot_number,
            pid: self.pid,
        }
    }
}

impl PartialEq for WrappedTuple {
    fn eq(&self, other: &Self) -> bool {
        self.internal == other.internal
    }
}

impl Eq for WrappedTuple {}

impl fmt::Display for WrappedTuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} @ {}/{}", self.internal, self.pid, self.slot_number)
    }
}

impl fmt::Debug for WrappedTuple {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::Field;

    #[test]
    fn test_int_round_trip() {
        let schema = Schema::small_int_schema(3);
        let tuple = Tuple::new_int_tuples(-42, 3);

        let bytes = tuple.to_bytes(&schema);
        assert_eq!(bytes.len(), schema.get_tuple_size());

        let decoded = Tuple::new(&schema, &bytes);
        assert_eq!(tuple, decoded);
    }

    #[test]
    fn test_string_padding() {
        let schema = Schema::new(vec![
            Field::new("id", Type::Int64),
            Field::new("name", Type::Bytes(8)),
        ]);

        let tuple =
            Tuple::new_from_cells(&[Cell::Int64(7), Cell::String("ok".to_string())]);

        let bytes = tuple.to_bytes(&schema);
        assert_eq!(bytes.len(), schema.get_tuple_size());

        let decoded = Tuple::new(&schema, &bytes);
        assert_eq!(decoded.get_cell(1), Cell::String("ok".to_string()));
    }

    #[test]
    fn test_string_truncated_to_declared_width() {
        let schema = Schema::new(vec![Field::new("name", Type::Bytes(4))]);

        let tuple = Tuple::new_from_cells(&[Cell::String("overflow".to_string())]);
        let decoded = Tuple::new(&schema, &tuple.to_bytes(&schema));
        assert_eq!(decoded.get_cell(0), Cell::String("over".to_string()));
    }
}
