//! Named pipes
//!
//! Paths under the pipe prefix (`/pipe/` by default) do not go to the file
//! system. They name a [`PipeChannel`] held in the [`PipeRegistry`]:
//!
//! - `creat(path)` attaches a writer endpoint
//! - `open(path)` attaches a reader endpoint
//!
//! Either call creates the channel if none exists under that name, so the
//! two sides may arrive in any order.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;

use super::channel::{PipeChannel, PipeEnd};
use crate::errors::FileError;

/// One attached side of a pipe, owned by an open-file entry
#[derive(Debug, Clone)]
pub struct PipeEndpoint {
    channel: Arc<PipeChannel>,
    end: PipeEnd,
}

impl PipeEndpoint {
    /// Channel this endpoint is attached to
    pub fn channel(&self) -> &Arc<PipeChannel> {
        &self.channel
    }

    /// Which side this endpoint is on
    pub fn end(&self) -> PipeEnd {
        self.end
    }
}

/// Registry of live pipe channels, keyed by path
#[derive(Debug)]
pub struct PipeRegistry {
    prefix: &'static str,
    capacity: usize,
    max_pipes: usize,
    channels: BTreeMap<String, Arc<PipeChannel>>,
}

impl PipeRegistry {
    /// Create an empty registry
    pub fn new(prefix: &'static str, capacity: usize, max_pipes: usize) -> Self {
        Self {
            prefix,
            capacity,
            max_pipes,
            channels: BTreeMap::new(),
        }
    }

    /// Whether `path` is in the pipe namespace
    pub fn is_pipe_path(&self, path: &str) -> bool {
        path.starts_with(self.prefix)
    }

    /// Attach an endpoint to the channel named `path`, creating it if needed
    ///
    /// # Errors
    ///
    /// - `InvalidPath` if nothing follows the prefix
    /// - `PipeTableFull` if a new channel is needed and the limit is reached
    pub fn attach(&mut self, path: &str, end: PipeEnd) -> Result<PipeEndpoint, FileError> {
        if path.len() <= self.prefix.len() || !self.is_pipe_path(path) {
            return Err(FileError::InvalidPath);
        }

        let channel = match self.channels.get(path) {
            Some(channel) => Arc::clone(channel),
            None => {
                if self.channels.len() >= self.max_pipes {
                    log::debug!("[Pipe] {} refused: {} pipes already exist", path, self.max_pipes);
                    return Err(FileError::PipeTableFull);
                }
                let channel = Arc::new(PipeChannel::new(path, self.capacity));
                self.channels.insert(path.to_string(), Arc::clone(&channel));
                log::debug!("[Pipe] created {}", path);
                channel
            }
        };

        channel.attach(end);
        Ok(PipeEndpoint { channel, end })
    }

    /// Detach an endpoint, tearing its channel down once it is finished
    pub fn detach(&mut self, endpoint: &PipeEndpoint) {
        if !endpoint.channel.detach(endpoint.end) {
            return;
        }
        let name = endpoint.channel.name();
        if self
            .channels
            .get(name)
            .is_some_and(|live| Arc::ptr_eq(live, &endpoint.channel))
        {
            self.channels.remove(name);
            log::debug!("[Pipe] released {}", name);
        }
    }

    /// Live channel bound to `path`
    pub fn get(&self, path: &str) -> Option<&Arc<PipeChannel>> {
        self.channels.get(path)
    }

    /// Number of live channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Check if no channel exists
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
