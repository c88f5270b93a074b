pub mod named_fifo;
