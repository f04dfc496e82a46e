//! Shared harness for the kernel integration tests

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;

use rany_kernel::kernel::fs::{BufferConsole, RamFs};
use rany_kernel::kernel::process::ProgramRegistry;
use rany_kernel::prelude::*;
use spin::Mutex;

/// Values recorded by a program for the test to inspect
pub type Record = Arc<Mutex<Vec<i64>>>;

/// One kernel with in-memory collaborators
pub struct Harness {
    pub kernel: Arc<Kernel>,
    pub fs: Arc<RamFs>,
    pub console: Arc<BufferConsole>,
    programs: Arc<ProgramRegistry>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(KernelConfig::default())
    }

    pub fn with_config(config: KernelConfig) -> Self {
        Self::with_fs(config, RamFs::new())
    }

    pub fn with_fs(config: KernelConfig, fs: RamFs) -> Self {
        let fs = Arc::new(fs);
        let console = Arc::new(BufferConsole::new());
        let programs = Arc::new(ProgramRegistry::new());
        let kernel = Kernel::new(config, fs.clone(), programs.clone(), console.clone())
            .expect("valid configuration");
        Self {
            kernel,
            fs,
            console,
            programs,
        }
    }

    /// Register a program image
    pub fn register<F, Fut>(&self, path: &str, program: F)
    where
        F: Fn(UserContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ProcessExit> + Send + 'static,
    {
        self.programs.register(path, program);
    }

    /// Boot `path` as the root process and run until nothing can progress
    pub fn boot_and_run(&self, path: &str) -> ProcessId {
        let pid = self.kernel.boot(path, &[]).expect("boot");
        self.kernel.run_until_idle();
        pid
    }
}
