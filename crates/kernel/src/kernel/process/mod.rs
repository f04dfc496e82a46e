// kernel/src/kernel/process/mod.rs
//! Process management module
//!
//! This module provides the process control block and the process table.
//! Lifecycle operations (`exec`, `exit`, `join`, `halt`) live in
//! [`lifecycle`], program images in [`loader`].
//!
//! # State machine
//!
//! ```text
//! Running ──exit(status)──> Exited(status) ──join──> (record freed)
//!    └──────fault─────────> Faulted ─────────join──> (record freed)
//! ```
//!
//! A process whose parent is gone (or that has no parent) is released as
//! soon as it terminates, since nobody can join it.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;

use crate::errors::ProcessError;
use crate::kernel::core::types::ProcessId;
use crate::kernel::fs::FileDescriptorTable;
use crate::kernel::r#async::WaitQueue;
use rany_os_abi::JoinOutcome;

pub mod lifecycle;
pub mod loader;

pub use loader::{Program, ProgramLoader, ProgramRegistry};

/// How a program finished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessExit {
    /// Normal termination with a status
    Exited(i32),
    /// Abnormal termination (unhandled fault); no status
    Faulted,
}

impl From<i32> for ProcessExit {
    fn from(status: i32) -> Self {
        Self::Exited(status)
    }
}

impl From<ProcessExit> for JoinOutcome {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Exited(status) => Self::Exited(status),
            ProcessExit::Faulted => Self::Faulted,
        }
    }
}

/// Process state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Runnable or blocked in a syscall
    Running,
    /// Terminated; waiting to be joined
    Exited(i32),
    /// Terminated abnormally; waiting to be joined
    Faulted,
}

impl ProcessState {
    /// Termination outcome, if the process has terminated
    pub const fn exit(self) -> Option<ProcessExit> {
        match self {
            Self::Running => None,
            Self::Exited(status) => Some(ProcessExit::Exited(status)),
            Self::Faulted => Some(ProcessExit::Faulted),
        }
    }
}

impl From<ProcessExit> for ProcessState {
    fn from(exit: ProcessExit) -> Self {
        match exit {
            ProcessExit::Exited(status) => Self::Exited(status),
            ProcessExit::Faulted => Self::Faulted,
        }
    }
}

/// Process control block
#[derive(Debug)]
pub struct Process {
    pid: ProcessId,
    parent: Option<ProcessId>,
    /// Started by `boot` (allowed to halt the machine)
    root: bool,
    state: ProcessState,
    path: String,
    args: Vec<String>,
    fd_table: FileDescriptorTable,
    /// Children that have not been joined yet
    children: BTreeSet<ProcessId>,
    /// Children already joined (their records are gone)
    joined: BTreeSet<ProcessId>,
    /// Joiner parked until this process terminates
    exit_waiters: Arc<WaitQueue>,
}

impl Process {
    /// Create a running process
    pub fn new(
        pid: ProcessId,
        parent: Option<ProcessId>,
        path: &str,
        args: &[&str],
        fd_table: FileDescriptorTable,
    ) -> Self {
        Self {
            pid,
            parent,
            root: parent.is_none(),
            state: ProcessState::Running,
            path: path.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
            fd_table,
            children: BTreeSet::new(),
            joined: BTreeSet::new(),
            exit_waiters: Arc::new(WaitQueue::new()),
        }
    }

    #[must_use]
    pub const fn pid(&self) -> ProcessId {
        self.pid
    }

    #[must_use]
    pub const fn parent(&self) -> Option<ProcessId> {
        self.parent
    }

    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.root
    }

    #[must_use]
    pub const fn state(&self) -> ProcessState {
        self.state
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.state, ProcessState::Running)
    }

    /// Executable path the process was started from
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Argument vector
    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn fd_table(&self) -> &FileDescriptorTable {
        &self.fd_table
    }

    pub fn fd_table_mut(&mut self) -> &mut FileDescriptorTable {
        &mut self.fd_table
    }

    /// Unjoined children
    pub fn children(&self) -> &BTreeSet<ProcessId> {
        &self.children
    }

    /// Whether `child` was joined by this process
    pub fn has_joined(&self, child: ProcessId) -> bool {
        self.joined.contains(&child)
    }

    pub fn exit_waiters(&self) -> &Arc<WaitQueue> {
        &self.exit_waiters
    }

    /// Record a newly started child
    pub(crate) fn adopt(&mut self, child: ProcessId) {
        self.children.insert(child);
    }

    /// Move a child from the unjoined to the joined set
    pub(crate) fn mark_joined(&mut self, child: ProcessId) {
        self.children.remove(&child);
        self.joined.insert(child);
    }

    pub(crate) fn take_children(&mut self) -> BTreeSet<ProcessId> {
        core::mem::take(&mut self.children)
    }

    /// Detach from a parent that has terminated
    pub(crate) fn orphan(&mut self) {
        self.parent = None;
    }

    pub(crate) fn terminate(&mut self, exit: ProcessExit) {
        debug_assert!(self.is_running(), "{} terminated twice", self.pid);
        self.state = exit.into();
    }
}

/// Process table
#[derive(Debug)]
pub struct ProcessTable {
    processes: BTreeMap<ProcessId, Process>,
    next_pid: u32,
    pid_limit: u32,
    max_processes: usize,
}

impl ProcessTable {
    /// Create an empty table; pids are drawn from `0..pid_limit`
    pub fn new(pid_limit: u32, max_processes: usize) -> Self {
        Self {
            processes: BTreeMap::new(),
            next_pid: 0,
            pid_limit,
            max_processes,
        }
    }

    /// Reserve the next pid
    ///
    /// Pids increase monotonically and wrap at the limit, skipping any pid
    /// whose record still exists.
    ///
    /// # Errors
    ///
    /// `TableFull` if the process limit is reached or every pid is taken.
    pub fn allocate_pid(&mut self) -> Result<ProcessId, ProcessError> {
        if self.processes.len() >= self.max_processes {
            return Err(ProcessError::TableFull);
        }
        for _ in 0..self.pid_limit {
            let candidate = ProcessId::new(self.next_pid);
            self.next_pid = (self.next_pid + 1) % self.pid_limit;
            if !self.processes.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(ProcessError::TableFull)
    }

    /// Insert a process record
    ///
    /// A reused pid names a new process, so earlier joins of that pid are
    /// forgotten by every record.
    ///
    /// # Panics
    ///
    /// Panics if the pid is already in use.
    pub fn insert(&mut self, process: Process) {
        let pid = process.pid();
        for other in self.processes.values_mut() {
            other.joined.remove(&pid);
        }
        let previous = self.processes.insert(pid, process);
        assert!(previous.is_none(), "{pid} allocated twice");
    }

    pub fn get(&self, pid: ProcessId) -> Option<&Process> {
        self.processes.get(&pid)
    }

    pub fn get_mut(&mut self, pid: ProcessId) -> Option<&mut Process> {
        self.processes.get_mut(&pid)
    }

    pub fn contains(&self, pid: ProcessId) -> bool {
        self.processes.contains_key(&pid)
    }

    pub fn remove(&mut self, pid: ProcessId) -> Option<Process> {
        self.processes.remove(&pid)
    }

    /// Number of records (running or awaiting join)
    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Number of processes that have not terminated
    pub fn running_count(&self) -> usize {
        self.processes.values().filter(|p| p.is_running()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process(pid: u32, parent: Option<u32>) -> Process {
        Process::new(
            ProcessId::new(pid),
            parent.map(ProcessId::new),
            "test.coff",
            &["a", "b"],
            FileDescriptorTable::new(4),
        )
    }

    #[test]
    fn test_pids_are_monotonic() {
        let mut table = ProcessTable::new(100, 10);
        let a = table.allocate_pid().unwrap();
        let b = table.allocate_pid().unwrap();
        assert_eq!((a.get(), b.get()), (0, 1));
    }

    #[test]
    fn test_pid_wraps_and_skips_live_records() {
        let mut table = ProcessTable::new(3, 3);
        for _ in 0..3 {
            let pid = table.allocate_pid().unwrap();
            table.insert(process(pid.get(), None));
        }
        assert_eq!(table.allocate_pid(), Err(ProcessError::TableFull));

        table.remove(ProcessId::new(1));
        assert_eq!(table.allocate_pid(), Ok(ProcessId::new(1)));
    }

    #[test]
    fn test_process_limit() {
        let mut table = ProcessTable::new(100, 1);
        let pid = table.allocate_pid().unwrap();
        table.insert(process(pid.get(), None));
        assert_eq!(table.allocate_pid(), Err(ProcessError::TableFull));
    }

    #[test]
    fn test_children_and_join_bookkeeping() {
        let mut parent = process(0, None);
        let child = ProcessId::new(1);
        parent.adopt(child);
        assert!(parent.children().contains(&child));

        parent.mark_joined(child);
        assert!(!parent.children().contains(&child));
        assert!(parent.has_joined(child));
    }

    #[test]
    fn test_reused_pid_clears_join_history() {
        let mut table = ProcessTable::new(10, 10);
        table.insert(process(0, None));
        table.insert(process(2, None));
        let child = ProcessId::new(1);
        let first = table.get_mut(ProcessId::new(0)).unwrap();
        first.adopt(child);
        first.mark_joined(child);

        // pid 1 が別の親の子として再利用される
        table.insert(process(1, Some(2)));
        table.get_mut(ProcessId::new(2)).unwrap().adopt(child);
        assert!(!table.get(ProcessId::new(0)).unwrap().has_joined(child));
    }

    #[test]
    fn test_state_transitions() {
        let mut p = process(2, Some(0));
        assert!(p.is_running());
        assert!(!p.is_root());
        assert_eq!(p.state().exit(), None);
        p.terminate(ProcessExit::Exited(7));
        assert_eq!(p.state(), ProcessState::Exited(7));
        assert_eq!(p.state().exit(), Some(ProcessExit::Exited(7)));
        assert_eq!(JoinOutcome::from(ProcessExit::Faulted), JoinOutcome::Faulted);
        assert_eq!(p.args(), ["a", "b"]);
    }

    #[test]
    fn test_running_count() {
        let mut table = ProcessTable::new(10, 10);
        table.insert(process(0, None));
        table.insert(process(1, Some(0)));
        assert_eq!(table.running_count(), 2);
        table.get_mut(ProcessId::new(1)).unwrap().terminate(ProcessExit::Faulted);
        assert_eq!(table.running_count(), 1);
        assert_eq!(table.len(), 2);
    }
}
