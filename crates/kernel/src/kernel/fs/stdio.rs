// kernel/src/kernel/fs/stdio.rs
//! Standard I/O (stdin, stdout) backed by a console device
//!
//! Every process starts with descriptor 0 open for reading from the
//! console and descriptor 1 open for writing to it. They are ordinary
//! descriptors afterwards: they can be closed and their slots reused.

use alloc::collections::VecDeque;
use alloc::vec::Vec;
use spin::Mutex;

/// Descriptor number of standard input in a fresh process
pub const STDIN_FD: u32 = 0;

/// Descriptor number of standard output in a fresh process
pub const STDOUT_FD: u32 = 1;

/// Which side of the console an open-file entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleEnd {
    /// Keyboard side (stdin)
    Input,
    /// Screen side (stdout)
    Output,
}

/// Console device collaborator
pub trait Console: Send + Sync {
    /// Read whatever input is available; 0 if none
    fn read(&self, buf: &mut [u8]) -> usize;

    /// Write all of `data`, returning the count written
    fn write(&self, data: &[u8]) -> usize;
}

/// Console backed by in-memory buffers
///
/// Input is queued with [`BufferConsole::push_input`]; output accumulates
/// until [`BufferConsole::take_output`] drains it.
#[derive(Default)]
pub struct BufferConsole {
    input: Mutex<VecDeque<u8>>,
    output: Mutex<Vec<u8>>,
}

impl BufferConsole {
    /// Create a console with no pending input
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for processes reading stdin
    pub fn push_input(&self, data: &[u8]) {
        self.input.lock().extend(data.iter().copied());
    }

    /// Drain everything written to stdout so far
    pub fn take_output(&self) -> Vec<u8> {
        core::mem::take(&mut *self.output.lock())
    }
}

impl Console for BufferConsole {
    fn read(&self, buf: &mut [u8]) -> usize {
        let mut input = self.input.lock();
        let count = buf.len().min(input.len());
        for (dst, src) in buf.iter_mut().zip(input.drain(..count)) {
            *dst = src;
        }
        count
    }

    fn write(&self, data: &[u8]) -> usize {
        self.output.lock().extend_from_slice(data);
        data.len()
    }
}

/// Console that forwards output to the `log` facade
///
/// Used when no console device is attached; input is always empty.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogConsole;

impl Console for LogConsole {
    fn read(&self, _buf: &mut [u8]) -> usize {
        0
    }

    fn write(&self, data: &[u8]) -> usize {
        match core::str::from_utf8(data) {
            Ok(text) => log::info!("[console] {}", text.trim_end()),
            Err(_) => log::info!("[console] {} bytes of binary output", data.len()),
        }
        data.len()
    }
}
