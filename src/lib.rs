//! # Netezza External-Table Exporter
//!
//! Streams records into a Netezza table through an external table backed by
//! a named pipe: a background worker runs
//! `INSERT INTO <table> SELECT * FROM EXTERNAL '<pipe>' USING (...)` while
//! the caller writes delimited records into the pipe.
//!
//! The crate follows the **Hexagonal Architecture** (Ports and Adapters):
//! the session logic in `application` only sees the traits in `ports`, and
//! `infrastructure` supplies the FIFO, `nzsql` and log-upload adapters.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod ports;
