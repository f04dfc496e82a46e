// kernel/src/kernel/ipc/mod.rs
//! Inter-process communication
//!
//! - [`channel`]: the blocking byte channel
//! - [`pipe`]: named pipe endpoints and the registry that binds paths to channels

pub mod channel;
pub mod pipe;

pub use channel::{PipeChannel, PipeEnd};
pub use pipe::{PipeEndpoint, PipeRegistry};
