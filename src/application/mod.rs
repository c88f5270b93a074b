//! Application layer: the export session and the local job that drives it.

pub mod export_session;
pub mod job;
pub mod runtime;
pub mod statement_runner;
pub mod throughput;
