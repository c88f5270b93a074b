pub mod local;
pub mod netezza;
pub mod pipe;
pub mod storage;
