//! Blocking byte channel behind a named pipe
//!
//! `PipeChannel` is a fixed-capacity ring buffer shared by any number of
//! reader and writer endpoints. Reads and writes are futures: a reader
//! waits while the buffer is empty and a writer could still show up, a
//! writer waits while the buffer is full and a reader could still drain it.
//!
//! # Wake protocol
//!
//! Waiters register on a [`WaitQueue`] while holding the state lock and
//! re-check their condition on every poll. Every state change that can
//! unblock the other side (data, space, endpoint attach/detach) wakes the
//! corresponding queue after the state lock has been released.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::task::Poll;
use futures_util::future::poll_fn;
use spin::Mutex;

use crate::errors::FileError;
use crate::kernel::r#async::WaitQueue;

/// Which side of a pipe an endpoint is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeEnd {
    /// Consumer (attached by `open`)
    Reader,
    /// Producer (attached by `creat`)
    Writer,
}

/// Byte ring buffer
///
/// `head` and `tail` are free-running counters; their difference is the
/// number of buffered bytes and `counter & mask` is the storage index.
struct RingBuffer {
    /// Buffer storage
    buffer: Vec<u8>,
    /// Head index (consumer reads here)
    head: u32,
    /// Tail index (producer writes here)
    tail: u32,
    /// Capacity mask (size - 1, for wrapping)
    mask: u32,
}

impl RingBuffer {
    /// Create a new ring buffer with given capacity (must be power of 2)
    fn new(capacity: usize) -> Self {
        assert!(capacity.is_power_of_two(), "Capacity must be power of 2");
        assert!(capacity <= (u32::MAX as usize) / 2, "Capacity too large");

        #[allow(clippy::cast_possible_truncation)]
        let mask = (capacity - 1) as u32;
        Self {
            buffer: vec![0; capacity],
            head: 0,
            tail: 0,
            mask,
        }
    }

    fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of buffered bytes
    fn len(&self) -> usize {
        self.tail.wrapping_sub(self.head) as usize
    }

    fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    fn free(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Copy in as many bytes as fit, returning the count
    fn push_slice(&mut self, data: &[u8]) -> usize {
        let count = data.len().min(self.free());
        for &byte in &data[..count] {
            self.buffer[(self.tail & self.mask) as usize] = byte;
            self.tail = self.tail.wrapping_add(1);
        }
        count
    }

    /// Copy out as many bytes as are buffered, returning the count
    fn pop_slice(&mut self, buf: &mut [u8]) -> usize {
        let count = buf.len().min(self.len());
        for byte in &mut buf[..count] {
            *byte = self.buffer[(self.head & self.mask) as usize];
            self.head = self.head.wrapping_add(1);
        }
        count
    }

    fn clear(&mut self) {
        self.head = self.tail;
    }
}

/// Channel state guarded by one lock
struct PipeState {
    buffer: RingBuffer,
    /// Open reader endpoints
    readers: u32,
    /// Open writer endpoints
    writers: u32,
    /// Some reader has attached at least once
    reader_attached: bool,
    /// Some writer has attached at least once
    writer_attached: bool,
}

impl PipeState {
    /// All writers are gone and none can make the buffer non-empty again
    fn writers_finished(&self) -> bool {
        self.writer_attached && self.writers == 0
    }

    /// All readers are gone; nobody will ever drain the buffer
    fn readers_finished(&self) -> bool {
        self.reader_attached && self.readers == 0
    }
}

/// Blocking byte channel shared by pipe endpoints
pub struct PipeChannel {
    name: String,
    state: Mutex<PipeState>,
    /// Readers waiting for data or for the last writer to leave
    readable: WaitQueue,
    /// Writers waiting for space or for the last reader to leave
    writable: WaitQueue,
}

impl PipeChannel {
    /// Create an empty channel
    ///
    /// # Panics
    ///
    /// Panics if capacity is not a power of 2.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(PipeState {
                buffer: RingBuffer::new(capacity),
                readers: 0,
                writers: 0,
                reader_attached: false,
                writer_attached: false,
            }),
            readable: WaitQueue::new(),
            writable: WaitQueue::new(),
        }
    }

    /// Path this channel is bound to
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the channel capacity
    pub fn capacity(&self) -> usize {
        self.state.lock().buffer.capacity()
    }

    /// Bytes available to read
    pub fn len(&self) -> usize {
        self.state.lock().buffer.len()
    }

    /// Check if the channel is empty
    pub fn is_empty(&self) -> bool {
        self.state.lock().buffer.is_empty()
    }

    /// Bytes that can be written without blocking
    pub fn available_to_write(&self) -> usize {
        self.state.lock().buffer.free()
    }

    /// Open endpoints as `(readers, writers)`
    pub fn endpoints(&self) -> (u32, u32) {
        let state = self.state.lock();
        (state.readers, state.writers)
    }

    /// Attach an endpoint
    pub fn attach(&self, end: PipeEnd) {
        {
            let mut state = self.state.lock();
            match end {
                PipeEnd::Reader => {
                    state.readers += 1;
                    state.reader_attached = true;
                }
                PipeEnd::Writer => {
                    state.writers += 1;
                    state.writer_attached = true;
                }
            }
        }
        self.wake_all();
    }

    /// Detach an endpoint
    ///
    /// Returns `true` when the channel is finished and should be torn
    /// down: no endpoint is open and some reader has already attached.
    /// A channel only writers have seen is kept, with or without data, so
    /// that the first reader still gets the bytes and then end of file.
    /// Buffered bytes are discarded on teardown.
    ///
    /// # Panics
    ///
    /// Panics if no endpoint of that kind is attached.
    pub fn detach(&self, end: PipeEnd) -> bool {
        let finished = {
            let mut state = self.state.lock();
            let count = match end {
                PipeEnd::Reader => &mut state.readers,
                PipeEnd::Writer => &mut state.writers,
            };
            assert!(*count > 0, "pipe {}: {:?} detached more often than attached", self.name, end);
            *count -= 1;

            let idle = state.readers == 0 && state.writers == 0;
            let finished = idle && state.reader_attached;
            if finished {
                state.buffer.clear();
            }
            finished
        };
        // 相手側は条件 (EOF / broken pipe) を再評価する
        self.wake_all();
        finished
    }

    /// Read up to `buf.len()` bytes
    ///
    /// Completes as soon as any data is buffered, with `min(buf.len(),
    /// available)` bytes. On an empty channel it waits while a writer is
    /// attached or no writer has attached yet, and returns 0 (end of
    /// file) once every writer that attached has closed.
    pub async fn read(&self, buf: &mut [u8]) -> usize {
        if buf.is_empty() {
            return 0;
        }
        poll_fn(|cx| {
            let mut state = self.state.lock();
            let count = state.buffer.pop_slice(buf);
            if count > 0 {
                drop(state);
                self.writable.wake_all();
                return Poll::Ready(count);
            }
            if state.writers_finished() {
                return Poll::Ready(0);
            }
            self.readable.register(cx.waker());
            Poll::Pending
        })
        .await
    }

    /// Write all of `data`
    ///
    /// Copies what fits and waits for space while a reader is attached or
    /// no reader has attached yet.
    ///
    /// # Errors
    ///
    /// `BrokenPipe` if every reader has closed before any byte of this
    /// call was written. If some bytes were written first, the partial
    /// count is returned instead.
    pub async fn write(&self, data: &[u8]) -> Result<usize, FileError> {
        let mut written = 0;
        poll_fn(|cx| {
            let mut state = self.state.lock();
            if state.readers_finished() {
                return Poll::Ready(if written > 0 {
                    Ok(written)
                } else {
                    Err(FileError::BrokenPipe)
                });
            }

            let count = state.buffer.push_slice(&data[written..]);
            written += count;
            let done = written == data.len();
            if !done {
                self.writable.register(cx.waker());
            }
            drop(state);

            if count > 0 {
                self.readable.wake_all();
            }
            if done { Poll::Ready(Ok(written)) } else { Poll::Pending }
        })
        .await
    }

    fn wake_all(&self) {
        self.readable.wake_all();
        self.writable.wake_all();
    }
}

impl core::fmt::Debug for PipeChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PipeChannel")
            .field("name", &self.name)
            .field("buffered", &state.buffer.len())
            .field("readers", &state.readers)
            .field("writers", &state.writers)
            .finish()
    }
}
