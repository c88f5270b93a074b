//! Domain types shared by every layer: records, task identity, delimiters
//! and the crate-wide error type.

pub mod delimiters;
pub mod entities;
pub mod errors;
