//! Ports: the traits the application layer talks to. Each one has a
//! production adapter under `infrastructure` and test doubles beside the
//! code that uses it.

pub mod channel_port;
pub mod connection_port;
pub mod log_upload_port;
pub mod record_source;
