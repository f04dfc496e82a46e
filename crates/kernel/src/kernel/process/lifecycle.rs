// kernel/src/kernel/process/lifecycle.rs
//! Process lifecycle management
//!
//! `boot` / `exec` create a process and spawn its program as a task,
//! `exit_process` runs when that task finishes, `join` waits for a child
//! and frees its record.

use alloc::sync::Arc;
use core::task::Poll;
use futures_util::future::poll_fn;

use super::loader::validate_image;
use super::{Process, ProcessExit};
use crate::errors::unified::Result;
use crate::errors::{LoadError, ProcessError};
use crate::kernel::Kernel;
use crate::kernel::core::types::ProcessId;
use crate::kernel::fs::FileDescriptorTable;
use crate::kernel::syscall::UserContext;
use rany_os_abi::JoinOutcome;

impl Kernel {
    /// Start the root process
    ///
    /// The root process has no parent and is the only one allowed to halt
    /// the machine.
    ///
    /// # Errors
    ///
    /// Same as `exec`.
    pub fn boot(self: &Arc<Self>, path: &str, args: &[&str]) -> Result<ProcessId> {
        let pid = self.spawn_process(None, path, args)?;
        self.halted.store(false, core::sync::atomic::Ordering::SeqCst);
        Ok(pid)
    }

    /// Start a child of `parent`
    ///
    /// Returns as soon as the child is scheduled; the child starts with a
    /// fresh descriptor table holding only stdin and stdout.
    pub(crate) fn exec(self: &Arc<Self>, parent: ProcessId, path: &str, args: &[&str]) -> Result<ProcessId> {
        self.spawn_process(Some(parent), path, args)
    }

    fn spawn_process(self: &Arc<Self>, parent: Option<ProcessId>, path: &str, args: &[&str]) -> Result<ProcessId> {
        validate_image(&self.config, path, args)?;
        let program = self.loader.load(path).ok_or(LoadError::ImageNotFound)?;

        let pid = {
            let mut processes = self.processes.lock();
            if let Some(parent) = parent {
                if !processes.get(parent).is_some_and(Process::is_running) {
                    return Err(ProcessError::NoSuchProcess.into());
                }
            }
            let pid = processes.allocate_pid()?;

            let mut fd_table = FileDescriptorTable::new(self.config.fd_table_size);
            Self::install_stdio(&mut *self.files.lock(), &mut fd_table)?;
            processes.insert(Process::new(pid, parent, path, args, fd_table));

            if let Some(parent) = parent.and_then(|p| processes.get_mut(p)) {
                parent.adopt(pid);
            }
            pid
        };

        let ctx = UserContext::new(Arc::clone(self), pid);
        let kernel = Arc::clone(self);
        self.executor.spawn(async move {
            let exit = program(ctx).await;
            kernel.exit_process(pid, exit);
        });

        match parent {
            Some(parent) => log::info!("[Process] {} exec {} -> {}", parent, path, pid),
            None => log::info!("[Process] boot {} as {}", path, pid),
        }
        Ok(pid)
    }

    /// Terminate a process
    ///
    /// Closes every descriptor, orphans running children and frees the
    /// records of terminated children nobody can join anymore. The record
    /// itself is kept for the parent to join, or freed at once if there is
    /// no parent.
    pub(crate) fn exit_process(&self, pid: ProcessId, exit: ProcessExit) {
        let mut processes = self.processes.lock();
        let Some(process) = processes.get_mut(pid) else {
            log::warn!("[Process] exit of unknown {}", pid);
            return;
        };
        if !process.is_running() {
            return;
        }

        process.terminate(exit);
        let descriptors = process.fd_table_mut().drain();
        let children = process.take_children();
        let parent = process.parent();
        let waiters = Arc::clone(process.exit_waiters());

        {
            let mut files = self.files.lock();
            for id in descriptors {
                self.release_entry(&mut *files, id);
            }
        }

        for child in children {
            let running = match processes.get_mut(child) {
                Some(record) if record.is_running() => {
                    record.orphan();
                    true
                }
                Some(_) => false,
                None => continue,
            };
            if !running {
                processes.remove(child);
                log::debug!("[Process] released unjoined {} of exiting {}", child, pid);
            }
        }

        let joinable = parent.is_some_and(|p| processes.get(p).is_some_and(Process::is_running));
        if !joinable {
            processes.remove(pid);
        }

        match exit {
            ProcessExit::Exited(status) => log::info!("[Process] {} exited with status {}", pid, status),
            ProcessExit::Faulted => log::warn!("[Process] {} terminated abnormally", pid),
        }

        let idle = processes.running_count() == 0;
        drop(processes);

        waiters.wake_all();
        if idle {
            log::info!("[Kernel] no process left running");
            self.mark_halted();
        }
    }

    /// Wait for a child to terminate, then free its record
    ///
    /// Fails immediately for a pid that is not an unjoined child of
    /// `caller`. Blocks while the child is running.
    pub(crate) async fn join(&self, caller: ProcessId, child: ProcessId) -> Result<JoinOutcome> {
        poll_fn(|cx| {
            let mut processes = self.processes.lock();
            let Some(parent) = processes.get(caller) else {
                return Poll::Ready(Err(ProcessError::NoSuchProcess.into()));
            };
            if !parent.children().contains(&child) {
                let err = if parent.has_joined(child) {
                    ProcessError::AlreadyJoined
                } else {
                    ProcessError::NotAChild
                };
                return Poll::Ready(Err(err.into()));
            }

            let Some(record) = processes.get(child) else {
                return Poll::Ready(Err(ProcessError::NotAChild.into()));
            };
            let Some(exit) = record.state().exit() else {
                // exit_process は同じロックの下で状態を変えるので起床を取りこぼさない
                record.exit_waiters().register(cx.waker());
                return Poll::Pending;
            };

            processes.remove(child);
            if let Some(parent) = processes.get_mut(caller) {
                parent.mark_joined(child);
            }
            log::info!("[Process] {} joined {} ({:?})", caller, child, exit);
            Poll::Ready(Ok(exit.into()))
        })
        .await
    }

    /// Halt the machine
    ///
    /// # Errors
    ///
    /// `PermissionDenied` unless `pid` is the root process.
    pub(crate) fn halt(&self, pid: ProcessId) -> Result<()> {
        let root = self
            .processes
            .lock()
            .get(pid)
            .ok_or(ProcessError::NoSuchProcess)?
            .is_root();
        if !root {
            log::warn!("[Kernel] halt refused for {}", pid);
            return Err(ProcessError::PermissionDenied.into());
        }
        log::info!("[Kernel] halt requested by {}", pid);
        self.mark_halted();
        Ok(())
    }
}
