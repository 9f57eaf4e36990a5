use std::io::Cursor;

use bit_vec::BitVec;

use crate::{
    buffer_pool::BufferPool,
    error::DbError,
    storage::{
        schema::Schema,
        tuple::{Tuple, WrappedTuple},
    },
    transaction::TransactionID,
    types::DbResult,
};

use super::page_id::HeapPageID;

/// A tuple-slotted page: a bitmap header telling which slots are
/// occupied, followed by the fixed-size tuple slots.
pub struct HeapPage {
    pid: HeapPageID,
    schema: Schema,

    pub slot_count: usize,

    // indicate slots' status: true means occupied, false means empty
    header: BitVec<u32>,

    // all tuples (include empty slots)
    tuples: Vec<Tuple>,

    // the transaction that made the page differ from its disk image
    dirtier: Option<TransactionID>,

    // page content as of the last flush, used for undo and logging
    before_image: Vec<u8>,
}

impl HeapPage {
    pub fn new(pid: &HeapPageID, bytes: &[u8], schema: &Schema) -> Self {
        let slot_count = Self::calculate_slots_count(schema);
        let header_size = Self::calculate_header_size(slot_count);

        let mut tuples = Vec::new();
        for i in 0..slot_count {
            let start = header_size + i * schema.get_tuple_size();
            let end = start + schema.get_tuple_size();
            let t = Tuple::read_from(&mut Cursor::new(&bytes[start..end]), schema);
            tuples.push(t);
        }

        Self {
            pid: *pid,
            schema: schema.clone(),
            slot_count,
            header: BitVec::from_bytes(&bytes[..header_size]),
            tuples,
            dirtier: None,
            before_image: bytes.to_vec(),
        }
    }

    /// Retrieve the maximum number of tuples this page can hold: each
    /// tuple costs its disk size plus one header bit.
    pub fn calculate_slots_count(schema: &Schema) -> usize {
        let bits_per_tuple_including_header = schema.get_tuple_size() * 8 + 1;
        BufferPool::get_page_size() * 8 / bits_per_tuple_including_header
    }

    // Computes the number of bytes in the header of a page with each
    // tuple occupying tuple_size bytes
    pub fn calculate_header_size(slot_count: usize) -> usize {
        slot_count / 8 + 1
    }

    pub fn empty_page_data() -> Vec<u8> {
        vec![0; BufferPool::get_page_size()]
    }

    pub fn get_pid(&self) -> HeapPageID {
        self.pid
    }

    pub fn get_schema(&self) -> Schema {
        self.schema.clone()
    }

    pub fn get_page_data(&self) -> Vec<u8> {
        let header_size = Self::calculate_header_size(self.slot_count);

        let mut bytes = self.header.to_bytes();
        bytes.resize(header_size, 0);

        for tuple in &self.tuples {
            bytes.append(&mut tuple.to_bytes(&self.schema));
        }

        bytes.resize(BufferPool::get_page_size(), 0);
        bytes
    }

    pub fn is_slot_used(&self, slot: usize) -> bool {
        self.header.get(slot).unwrap_or(false)
    }

    pub fn empty_slots_count(&self) -> usize {
        let mut count = 0;
        for i in 0..self.slot_count {
            if !self.is_slot_used(i) {
                count += 1;
            }
        }
        count
    }

    /// Returns the number of tuples currently stored on this page
    pub fn tuples_count(&self) -> usize {
        self.slot_count - self.empty_slots_count()
    }

    /// Adds the tuple to the first empty slot of the page and returns
    /// the slot number.
    pub fn insert_tuple(&mut self, tuple: &Tuple) -> Result<usize, DbError> {
        for i in 0..self.slot_count {
            if !self.is_slot_used(i) {
                self.tuples[i] = tuple.clone();
                self.header.set(i, true);
                return Ok(i);
            }
        }

        Err(DbError::new(&format!(
            "no empty slot on page {}",
            self.pid
        )))
    }

    pub fn delete_tuple(&mut self, slot: usize) -> DbResult {
        if slot >= self.slot_count || !self.is_slot_used(slot) {
            return Err(DbError::new(&format!(
                "slot {} of page {} is not used",
                slot, self.pid
            )));
        }

        self.header.set(slot, false);
        Ok(())
    }

    pub fn set_dirty(&mut self, dirtier: Option<TransactionID>) {
        self.dirtier = dirtier;
    }

    pub fn get_dirtier(&self) -> Option<TransactionID> {
        self.dirtier
    }

    pub fn set_before_image(&mut self) {
        self.before_image = self.get_page_data();
    }

    pub fn get_before_image(&self) -> Vec<u8> {
        self.before_image.clone()
    }

    pub fn iter(&self) -> HeapPageIterator {
        HeapPageIterator {
            page: self,
            cursor: 0,
        }
    }
}

pub struct HeapPageIterator<'page> {
    page: &'page HeapPage,
    cursor: usize,
}

impl Iterator for HeapPageIterator<'_> {
    type Item = WrappedTuple;

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.page.slot_count {
            let slot = self.cursor;
            self.cursor += 1;

            if self.page.is_slot_used(slot) {
                return Some(WrappedTuple::new(
                    self.page.tuples[slot].clone(),
                    slot,
                    self.page.pid,
                ));
            }
        }

        None
    }
}
