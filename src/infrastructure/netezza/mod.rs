//! Netezza adapters: the bulk-load statement renderer and the `nzsql` client.

pub mod nzsql;
pub mod statement;
