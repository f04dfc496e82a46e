//! Named pipes between processes

mod common;

use std::sync::Arc;

use common::{Harness, Record};
use rany_kernel::kernel::core::config::KernelConfig;
use rany_kernel::prelude::*;

fn register_pipe_pair(h: &Harness, received: &Record) {
    h.register("writer.coff", |ctx: UserContext| async move {
        let fd = ctx.creat("/pipe/numbers").unwrap();
        assert_eq!(ctx.write(fd, b"12345").await, Ok(5));
        ctx.close(fd).unwrap();
        ProcessExit::Exited(0)
    });

    let out = received.clone();
    h.register("reader.coff", move |ctx: UserContext| {
        let out = out.clone();
        async move {
            let fd = ctx.open("/pipe/numbers").unwrap();
            let mut buf = [0u8; 10];
            let first = ctx.read(fd, &mut buf).await.unwrap();
            assert_eq!(&buf[..first], b"12345");
            let second = ctx.read(fd, &mut buf).await.unwrap();
            ctx.close(fd).unwrap();
            out.lock().extend([first as i64, second as i64]);
            ProcessExit::Exited(0)
        }
    });
}

fn run_pair(order: [&'static str; 2]) -> (Harness, Record) {
    let h = Harness::new();
    let received: Record = Arc::default();
    register_pipe_pair(&h, &received);
    h.register("main.coff", move |ctx: UserContext| async move {
        let first = ctx.exec(order[0], &[]).unwrap();
        let second = ctx.exec(order[1], &[]).unwrap();
        assert_eq!(ctx.join(first).await, Ok(JoinOutcome::Exited(0)));
        assert_eq!(ctx.join(second).await, Ok(JoinOutcome::Exited(0)));
        ProcessExit::Exited(0)
    });
    h.boot_and_run("main.coff");
    (h, received)
}

#[test]
fn writer_first_rendezvous_keeps_data_for_reader() {
    let (h, received) = run_pair(["writer.coff", "reader.coff"]);
    assert_eq!(*received.lock(), [5, 0]);
    assert_eq!(h.kernel.pipe_count(), 0);
    assert!(h.kernel.is_halted());
}

#[test]
fn reader_first_blocks_until_data_arrives() {
    let (h, received) = run_pair(["reader.coff", "writer.coff"]);
    assert_eq!(*received.lock(), [5, 0]);
    assert_eq!(h.kernel.pipe_count(), 0);
}

#[test]
fn writer_blocks_on_full_pipe_until_reader_drains() {
    const TOTAL: usize = 3000;

    let h = Harness::new();
    let record: Record = Arc::default();
    h.register("writer.coff", |ctx: UserContext| async move {
        let fd = ctx.creat("/pipe/bulk").unwrap();
        let data = vec![7u8; TOTAL];
        assert_eq!(ctx.write(fd, &data).await, Ok(TOTAL));
        ctx.close(fd).unwrap();
        ProcessExit::Exited(0)
    });
    let out = record.clone();
    h.register("reader.coff", move |ctx: UserContext| {
        let out = out.clone();
        async move {
            let fd = ctx.open("/pipe/bulk").unwrap();
            let mut buf = [0u8; 100];
            let mut total = 0;
            let mut reads = 0;
            loop {
                let count = ctx.read(fd, &mut buf).await.unwrap();
                if count == 0 {
                    break;
                }
                assert!(buf[..count].iter().all(|&b| b == 7));
                total += count;
                reads += 1;
            }
            out.lock().extend([total as i64, reads]);
            ProcessExit::Exited(0)
        }
    });
    h.register("main.coff", |ctx: UserContext| async move {
        let writer = ctx.exec("writer.coff", &[]).unwrap();
        let reader = ctx.exec("reader.coff", &[]).unwrap();
        ctx.join(writer).await.unwrap();
        ctx.join(reader).await.unwrap();
        ProcessExit::Exited(0)
    });

    h.boot_and_run("main.coff");
    let record = record.lock().clone();
    assert_eq!(record[0], TOTAL as i64);
    assert!(record[1] >= 30);
}

#[test]
fn write_without_readers_is_a_broken_pipe() {
    let h = Harness::new();
    let done: Record = Arc::default();
    let out = done.clone();
    h.register("main.coff", move |ctx: UserContext| {
        let out = out.clone();
        async move {
            let w = ctx.creat("/pipe/gone").unwrap();
            let r = ctx.open("/pipe/gone").unwrap();
            assert_eq!(ctx.write(w, b"ab").await, Ok(2));
            ctx.close(r).unwrap();
            assert_eq!(ctx.write(w, b"cd").await, Err(SyscallError::BrokenPipe));
            ctx.close(w).unwrap();
            out.lock().push(1);
            ProcessExit::Exited(0)
        }
    });

    h.boot_and_run("main.coff");
    assert_eq!(*done.lock(), [1]);
    assert_eq!(h.kernel.pipe_count(), 0);
}

#[test]
fn reads_return_what_is_available() {
    let h = Harness::new();
    let done: Record = Arc::default();
    let out = done.clone();
    h.register("main.coff", move |ctx: UserContext| {
        let out = out.clone();
        async move {
            let w = ctx.creat("/pipe/short").unwrap();
            let r = ctx.open("/pipe/short").unwrap();
            ctx.write(w, b"abc").await.unwrap();

            let mut small = [0u8; 2];
            assert_eq!(ctx.read(r, &mut small).await, Ok(2));
            assert_eq!(&small, b"ab");
            let mut large = [0u8; 64];
            assert_eq!(ctx.read(r, &mut large).await, Ok(1));
            assert_eq!(large[0], b'c');
            assert_eq!(ctx.read(r, &mut []).await, Ok(0));

            ctx.close(w).unwrap();
            assert_eq!(ctx.read(r, &mut large).await, Ok(0));
            out.lock().push(1);
            ProcessExit::Exited(0)
        }
    });

    h.boot_and_run("main.coff");
    assert_eq!(*done.lock(), [1]);
}

#[test]
fn pipe_limit_is_enforced() {
    let h = Harness::with_config(KernelConfig::new().with_max_pipes(2));
    let kernel = h.kernel.clone();
    let done: Record = Arc::default();
    let out = done.clone();
    h.register("main.coff", move |ctx: UserContext| {
        let out = out.clone();
        let kernel = kernel.clone();
        async move {
            let a = ctx.open("/pipe/a").unwrap();
            ctx.open("/pipe/b").unwrap();
            assert_eq!(ctx.creat("/pipe/c"), Err(SyscallError::TableFull));
            // attaching to an existing pipe needs no new channel
            ctx.creat("/pipe/a").unwrap();
            assert_eq!(kernel.pipe_count(), 2);
            assert_eq!(ctx.open("/pipe/"), Err(SyscallError::InvalidArgument));

            ctx.close(a).unwrap();
            // a's writer is still attached
            assert_eq!(kernel.pipe_count(), 2);
            out.lock().push(1);
            ProcessExit::Exited(0)
        }
    });

    h.boot_and_run("main.coff");
    assert_eq!(*done.lock(), [1]);
    assert_eq!(h.kernel.pipe_count(), 0);
}

#[test]
fn reader_waits_for_a_late_writer_and_sees_eof_after_it_closes() {
    let h = Harness::new();
    let record: Record = Arc::default();
    let out = record.clone();
    h.register("reader.coff", move |ctx: UserContext| {
        let out = out.clone();
        async move {
            let fd = ctx.open("/pipe/late").unwrap();
            let mut buf = [0u8; 4];
            let count = ctx.read(fd, &mut buf).await.unwrap();
            out.lock().push(count as i64);
            ProcessExit::Exited(0)
        }
    });
    h.register("main.coff", |ctx: UserContext| async move {
        let reader = ctx.exec("reader.coff", &[]).unwrap();
        // let the reader block on the empty pipe first
        let gate = ctx.exec("noop.coff", &[]).unwrap();
        ctx.join(gate).await.unwrap();

        let fd = ctx.creat("/pipe/late").unwrap();
        ctx.close(fd).unwrap();
        assert_eq!(ctx.join(reader).await, Ok(JoinOutcome::Exited(0)));
        ProcessExit::Exited(0)
    });
    h.register("noop.coff", |_ctx: UserContext| async { ProcessExit::Exited(0) });

    h.boot_and_run("main.coff");
    assert_eq!(*record.lock(), [0]);
}

#[test]
fn late_reader_sees_eof_after_writer_closed_without_writing() {
    let h = Harness::new();
    let record: Record = Arc::default();
    h.register("writer.coff", |ctx: UserContext| async move {
        let fd = ctx.creat("/pipe/empty").unwrap();
        ctx.close(fd).unwrap();
        ProcessExit::Exited(0)
    });
    let out = record.clone();
    h.register("reader.coff", move |ctx: UserContext| {
        let out = out.clone();
        async move {
            let fd = ctx.open("/pipe/empty").unwrap();
            let mut buf = [0u8; 6];
            let count = ctx.read(fd, &mut buf).await.unwrap();
            ctx.close(fd).unwrap();
            out.lock().push(count as i64);
            ProcessExit::Exited(0)
        }
    });
    let kernel = h.kernel.clone();
    h.register("main.coff", move |ctx: UserContext| {
        let kernel = kernel.clone();
        async move {
            let writer = ctx.exec("writer.coff", &[]).unwrap();
            ctx.join(writer).await.unwrap();
            // the writer left, but no reader has seen the channel yet
            assert_eq!(kernel.pipe_count(), 1);

            let reader = ctx.exec("reader.coff", &[]).unwrap();
            assert_eq!(ctx.join(reader).await, Ok(JoinOutcome::Exited(0)));
            ProcessExit::Exited(0)
        }
    });

    h.boot_and_run("main.coff");
    assert_eq!(*record.lock(), [0]);
    assert_eq!(h.kernel.pipe_count(), 0);
    assert!(h.kernel.is_halted());
    assert_eq!(h.kernel.process_count(), 0);
}
