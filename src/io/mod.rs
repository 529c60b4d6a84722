// src/io/mod.rs
//
// Device I/O for the board link.

pub mod error;
pub mod serial;

pub use error::{OpenError, ReadLoopError, SendError, WriteError};
