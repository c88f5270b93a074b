pub mod file_source;
