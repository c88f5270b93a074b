//! # Record Source Port
//!
//! The per-task-attempt iteration interface of the processing framework.

use crate::domain::entities::Record;
use crate::domain::errors::Result;

/// Yields `(key, value)` pairs until exhausted.
///
/// Keys are opaque to the exporter (input offsets for file sources); only
/// the value is written. Records must be yielded in input order.
pub trait RecordSource {
    fn next_key_value(&mut self) -> Result<Option<(u64, Record)>>;
}

/// Any iterator of records is a source; keys are the record positions.
pub struct IterSource<I> {
    inner: I,
    position: u64,
}

impl<I> IterSource<I> {
    pub fn new(inner: I) -> Self {
        Self { inner, position: 0 }
    }
}

impl<I: Iterator<Item = Record>> RecordSource for IterSource<I> {
    fn next_key_value(&mut self) -> Result<Option<(u64, Record)>> {
        Ok(self.inner.next().map(|r| {
            let key = self.position;
            self.position += 1;
            (key, r)
        }))
    }
}
