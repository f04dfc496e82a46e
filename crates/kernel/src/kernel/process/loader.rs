// kernel/src/kernel/process/loader.rs
//! Program loader
//!
//! A program image is an async function that receives the process's
//! [`UserContext`] and resolves to how the process finished. Images are
//! looked up by path through a [`ProgramLoader`]; [`ProgramRegistry`] is the
//! in-memory loader.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use core::future::Future;
use futures_util::future::BoxFuture;
use spin::Mutex;

use super::ProcessExit;
use crate::errors::LoadError;
use crate::kernel::core::config::KernelConfig;
use crate::kernel::syscall::UserContext;

/// Bytes of argument page used per argument besides its text
/// (pointer slot plus terminating NUL)
const ARG_OVERHEAD: usize = 4 + 1;

/// Loaded program image
pub type Program = Arc<dyn Fn(UserContext) -> BoxFuture<'static, ProcessExit> + Send + Sync>;

/// Resolves executable paths to program images
pub trait ProgramLoader: Send + Sync {
    /// Image registered under `path`, if any
    fn load(&self, path: &str) -> Option<Program>;
}

/// In-memory program table
#[derive(Default)]
pub struct ProgramRegistry {
    programs: Mutex<BTreeMap<String, Program>>,
}

impl ProgramRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the image under `path`
    pub fn register<F, Fut>(&self, path: &str, image: F)
    where
        F: Fn(UserContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcessExit> + Send + 'static,
    {
        let program: Program = Arc::new(move |ctx: UserContext| Box::pin(image(ctx)) as BoxFuture<'static, ProcessExit>);
        self.programs.lock().insert(path.to_string(), program);
    }

    /// Number of registered images
    pub fn len(&self) -> usize {
        self.programs.lock().len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.programs.lock().is_empty()
    }
}

impl ProgramLoader for ProgramRegistry {
    fn load(&self, path: &str) -> Option<Program> {
        self.programs.lock().get(path).cloned()
    }
}

impl core::fmt::Debug for ProgramRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProgramRegistry")
            .field("programs", &self.programs.lock().keys().collect::<alloc::vec::Vec<_>>())
            .finish()
    }
}

/// Check an exec request before anything is allocated
///
/// # Errors
///
/// - `NotExecutable` if the path lacks the executable suffix
/// - `EmptyArgument` if any argument is the empty string
/// - `ArgumentsTooLarge` if the arguments do not fit in the argument page
pub fn validate_image(config: &KernelConfig, path: &str, args: &[&str]) -> Result<(), LoadError> {
    if !path.ends_with(config.executable_suffix) || path.len() == config.executable_suffix.len() {
        return Err(LoadError::NotExecutable);
    }
    if args.iter().any(|arg| arg.is_empty()) {
        return Err(LoadError::EmptyArgument);
    }
    let needed: usize = args.iter().map(|arg| ARG_OVERHEAD + arg.len()).sum();
    if needed > config.max_arg_bytes {
        return Err(LoadError::ArgumentsTooLarge);
    }
    Ok(())
}
