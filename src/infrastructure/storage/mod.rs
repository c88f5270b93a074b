pub mod log_uploader;
