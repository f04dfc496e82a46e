//! exec / join / exit / halt across processes

mod common;

use std::sync::Arc;

use common::{Harness, Record};
use rany_kernel::kernel::core::config::KernelConfig;
use rany_kernel::kernel::process::ProcessState;
use rany_kernel::prelude::*;

fn exit_with_first_arg(h: &Harness, path: &str) {
    h.register(path, |ctx: UserContext| async move {
        let status = ctx.args().first().and_then(|a| a.parse().ok()).unwrap_or(0);
        ProcessExit::Exited(status)
    });
}

#[test]
fn join_returns_child_status_and_frees_the_record() {
    let h = Harness::new();
    let kernel = h.kernel.clone();
    exit_with_first_arg(&h, "child.coff");
    let done: Record = Arc::default();
    let out = done.clone();
    h.register("main.coff", move |ctx: UserContext| {
        let out = out.clone();
        let kernel = kernel.clone();
        async move {
            let child = ctx.exec("child.coff", &["42"]).unwrap();
            assert_eq!(kernel.process_state(child), Some(ProcessState::Running));
            assert_eq!(ctx.join(child).await, Ok(JoinOutcome::Exited(42)));
            assert_eq!(kernel.process_state(child), None);
            assert_eq!(ctx.join(child).await, Err(SyscallError::AlreadyJoined));
            out.lock().push(1);
            ProcessExit::Exited(0)
        }
    });

    h.boot_and_run("main.coff");
    assert_eq!(*done.lock(), [1]);
    assert_eq!(h.kernel.process_count(), 0);
}

#[test]
fn failed_exec_leaves_the_table_untouched() {
    let h = Harness::new();
    let kernel = h.kernel.clone();
    exit_with_first_arg(&h, "child.coff");
    let done: Record = Arc::default();
    let out = done.clone();
    h.register("main.coff", move |ctx: UserContext| {
        let out = out.clone();
        let kernel = kernel.clone();
        async move {
            let before = (kernel.process_count(), kernel.open_file_count());
            assert_eq!(ctx.exec("missing.coff", &[]), Err(SyscallError::NotFound));
            assert_eq!(ctx.exec("child", &[]), Err(SyscallError::LoadFailure));
            assert_eq!(ctx.exec("child.coff", &["ok", ""]), Err(SyscallError::LoadFailure));
            let huge = "x".repeat(2000);
            assert_eq!(ctx.exec("child.coff", &[huge.as_str()]), Err(SyscallError::LoadFailure));
            assert_eq!((kernel.process_count(), kernel.open_file_count()), before);

            // no pid was consumed by the failures
            let child = ctx.exec("child.coff", &[]).unwrap();
            assert_eq!(child, ProcessId::new(1));
            ctx.join(child).await.unwrap();
            out.lock().push(1);
            ProcessExit::Exited(0)
        }
    });

    h.boot_and_run("main.coff");
    assert_eq!(*done.lock(), [1]);
}

#[test]
fn join_on_non_child_or_sibling_fails_immediately() {
    let h = Harness::new();
    exit_with_first_arg(&h, "child.coff");
    let sibling_result: Record = Arc::default();
    let out = sibling_result.clone();
    h.register("sibling.coff", move |ctx: UserContext| {
        let out = out.clone();
        async move {
            let target: u32 = ctx.args()[0].parse().unwrap();
            let result = ctx.join(ProcessId::new(target)).await;
            assert_eq!(result, Err(SyscallError::NotAChild));
            // the parent is not a child either
            assert_eq!(ctx.join(ProcessId::ROOT).await, Err(SyscallError::NotAChild));
            out.lock().push(1);
            ProcessExit::Exited(0)
        }
    });
    h.register("main.coff", |ctx: UserContext| async move {
        assert_eq!(ctx.join(ctx.pid()).await, Err(SyscallError::NotAChild));
        assert_eq!(ctx.join(ProcessId::new(1234)).await, Err(SyscallError::NotAChild));

        let child = ctx.exec("child.coff", &["3"]).unwrap();
        let arg = child.get().to_string();
        let sibling = ctx.exec("sibling.coff", &[arg.as_str()]).unwrap();
        assert_eq!(ctx.join(sibling).await, Ok(JoinOutcome::Exited(0)));
        assert_eq!(ctx.join(child).await, Ok(JoinOutcome::Exited(3)));
        ProcessExit::Exited(0)
    });

    h.boot_and_run("main.coff");
    assert_eq!(*sibling_result.lock(), [1]);
}

#[test]
fn pids_are_reused_only_after_join() {
    let h = Harness::with_config(KernelConfig::new().with_pid_limit(3).with_max_processes(3));
    exit_with_first_arg(&h, "child.coff");
    let done: Record = Arc::default();
    let out = done.clone();
    h.register("main.coff", move |ctx: UserContext| {
        let out = out.clone();
        async move {
            let first = ctx.exec("child.coff", &["1"]).unwrap();
            let second = ctx.exec("child.coff", &["2"]).unwrap();
            assert_eq!((first.get(), second.get()), (1, 2));

            // both exit without being joined; their pids stay reserved
            assert_eq!(ctx.join(second).await, Ok(JoinOutcome::Exited(2)));
            assert_eq!(ctx.exec("child.coff", &[]), Ok(ProcessId::new(2)));
            assert_eq!(ctx.exec("child.coff", &[]), Err(SyscallError::TableFull));

            assert_eq!(ctx.join(first).await, Ok(JoinOutcome::Exited(1)));
            let reused = ctx.exec("child.coff", &["5"]).unwrap();
            assert_eq!(reused, first);
            // a reused pid is a fresh child
            assert_eq!(ctx.join(reused).await, Ok(JoinOutcome::Exited(5)));
            out.lock().push(1);
            ProcessExit::Exited(0)
        }
    });

    h.boot_and_run("main.coff");
    assert_eq!(*done.lock(), [1]);
}

#[test]
fn child_starts_with_fresh_stdio_only() {
    let h = Harness::new();
    let record: Record = Arc::default();
    let out = record.clone();
    h.register("child.coff", move |ctx: UserContext| {
        let out = out.clone();
        async move {
            let fd = ctx.creat("child.txt").unwrap();
            out.lock().push(fd);
            ctx.write(1, b"child ").await.unwrap();
            ProcessExit::Exited(0)
        }
    });
    h.register("main.coff", |ctx: UserContext| async move {
        for i in 0..5 {
            ctx.creat(&format!("parent{i}.txt")).unwrap();
        }
        ctx.close(1).unwrap();
        let child = ctx.exec("child.coff", &[]).unwrap();
        ctx.join(child).await.unwrap();
        assert_eq!(ctx.write(1, b"parent").await, Err(SyscallError::BadDescriptor));
        ProcessExit::Exited(0)
    });

    h.boot_and_run("main.coff");
    // 0 and 1 are stdio; the child's first file gets slot 2
    assert_eq!(*record.lock(), [2]);
    assert_eq!(h.console.take_output(), b"child ");
}

#[test]
fn exiting_parent_orphans_running_children() {
    let h = Harness::new();
    let kernel = h.kernel.clone();
    let record: Record = Arc::default();

    let out = record.clone();
    h.register("grandchild.coff", move |ctx: UserContext| {
        let out = out.clone();
        async move {
            let fd = ctx.open("/pipe/go").unwrap();
            let mut buf = [0u8; 1];
            let count = ctx.read(fd, &mut buf).await.unwrap();
            out.lock().push(count as i64);
            ProcessExit::Exited(9)
        }
    });
    let out = record.clone();
    h.register("parent.coff", move |ctx: UserContext| {
        let out = out.clone();
        async move {
            let grandchild = ctx.exec("grandchild.coff", &[]).unwrap();
            out.lock().push(grandchild.as_raw());
            ProcessExit::Exited(0)
        }
    });
    let out = record.clone();
    h.register("main.coff", move |ctx: UserContext| {
        let out = out.clone();
        let kernel = kernel.clone();
        async move {
            let parent = ctx.exec("parent.coff", &[]).unwrap();
            assert_eq!(ctx.join(parent).await, Ok(JoinOutcome::Exited(0)));

            let grandchild = ProcessId::new(u32::try_from(out.lock()[0]).unwrap());
            assert_eq!(kernel.process_state(grandchild), Some(ProcessState::Running));
            assert_eq!(ctx.join(grandchild).await, Err(SyscallError::NotAChild));

            let fd = ctx.creat("/pipe/go").unwrap();
            ctx.write(fd, b"!").await.unwrap();
            ctx.close(fd).unwrap();
            ProcessExit::Exited(0)
        }
    });

    h.boot_and_run("main.coff");
    assert_eq!(*record.lock(), [2, 1]);
    // the orphan is released as soon as it exits
    assert_eq!(h.kernel.process_count(), 0);
    assert!(h.kernel.is_halted());
}

#[test]
fn unjoined_children_are_released_with_their_parent() {
    let h = Harness::new();
    let kernel = h.kernel.clone();
    exit_with_first_arg(&h, "child.coff");
    let done: Record = Arc::default();
    let out = done.clone();
    h.register("main.coff", move |ctx: UserContext| {
        let out = out.clone();
        let kernel = kernel.clone();
        async move {
            let ignored = ctx.exec("child.coff", &["3"]).unwrap();
            let waited = ctx.exec("child.coff", &["4"]).unwrap();
            ctx.join(waited).await.unwrap();
            assert_eq!(kernel.process_state(ignored), Some(ProcessState::Exited(3)));
            assert_eq!(kernel.process_count(), 2);
            out.lock().push(1);
            ProcessExit::Exited(0)
        }
    });

    h.boot_and_run("main.coff");
    assert_eq!(*done.lock(), [1]);
    assert_eq!(h.kernel.process_count(), 0);
}

#[test]
fn blocked_joiner_wakes_on_fault() {
    let h = Harness::new();
    h.register("crash.coff", |ctx: UserContext| async move {
        let _ = ctx.write(1, b"about to fault").await;
        ProcessExit::Faulted
    });
    let done: Record = Arc::default();
    let out = done.clone();
    h.register("main.coff", move |ctx: UserContext| {
        let out = out.clone();
        async move {
            let child = ctx.exec("crash.coff", &[]).unwrap();
            let outcome = ctx.join(child).await.unwrap();
            assert_eq!(outcome, JoinOutcome::Faulted);
            assert_eq!(outcome.to_raw(), 0);
            out.lock().push(1);
            ProcessExit::Exited(0)
        }
    });

    h.boot_and_run("main.coff");
    assert_eq!(*done.lock(), [1]);
}

#[test]
fn only_root_may_halt() {
    let h = Harness::new();
    h.register("child.coff", |ctx: UserContext| async move {
        assert_eq!(ctx.halt(), Err(SyscallError::PermissionDenied));
        ProcessExit::Exited(0)
    });
    h.register("main.coff", |ctx: UserContext| async move {
        let child = ctx.exec("child.coff", &[]).unwrap();
        ctx.join(child).await.unwrap();
        assert_eq!(ctx.halt(), Ok(()));
        ProcessExit::Exited(0)
    });

    h.boot_and_run("main.coff");
    assert!(h.kernel.is_halted());
    assert_eq!(h.kernel.run_until_idle(), 0);
}

#[test]
fn boot_rejects_bad_images() {
    let h = Harness::new();
    assert!(h.kernel.boot("nothing.coff", &[]).is_err());
    assert!(h.kernel.boot("plain", &[]).is_err());
    assert_eq!(h.kernel.process_count(), 0);
}

#[test]
fn joined_pid_reused_by_another_parent_is_not_a_child() {
    let h = Harness::with_config(KernelConfig::new().with_pid_limit(4).with_max_processes(4));
    let kernel = h.kernel.clone();
    exit_with_first_arg(&h, "child.coff");
    h.register("noop.coff", |_ctx: UserContext| async { ProcessExit::Exited(0) });
    h.register("blocked.coff", |ctx: UserContext| async move {
        let fd = ctx.open("/pipe/gate").unwrap();
        let mut buf = [0u8; 1];
        ctx.read(fd, &mut buf).await.unwrap();
        ProcessExit::Exited(0)
    });
    h.register("spawner.coff", |ctx: UserContext| async move {
        let child = ctx.exec("blocked.coff", &[]).unwrap();
        assert_eq!(child, ProcessId::new(1));
        assert_eq!(ctx.join(child).await, Ok(JoinOutcome::Exited(0)));
        ProcessExit::Exited(0)
    });
    let done: Record = Arc::default();
    let out = done.clone();
    h.register("main.coff", move |ctx: UserContext| {
        let out = out.clone();
        let kernel = kernel.clone();
        async move {
            let first = ctx.exec("child.coff", &["1"]).unwrap();
            assert_eq!(first, ProcessId::new(1));
            ctx.join(first).await.unwrap();

            let spawner = ctx.exec("spawner.coff", &[]).unwrap();
            // let the spawner start its child under the freed pid
            let gate = ctx.exec("noop.coff", &[]).unwrap();
            ctx.join(gate).await.unwrap();
            assert_eq!(kernel.process_state(first), Some(ProcessState::Running));

            assert_eq!(ctx.join(first).await, Err(SyscallError::NotAChild));

            let fd = ctx.creat("/pipe/gate").unwrap();
            ctx.close(fd).unwrap();
            assert_eq!(ctx.join(spawner).await, Ok(JoinOutcome::Exited(0)));
            out.lock().push(1);
            ProcessExit::Exited(0)
        }
    });

    h.boot_and_run("main.coff");
    assert_eq!(*done.lock(), [1]);
    assert_eq!(h.kernel.process_count(), 0);
}
