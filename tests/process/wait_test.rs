/*!
 * Wait Tests
 * Blocking, child-only access, options and lock discipline
 */

use crate::common::{boot, completes_promptly, run, shutdown, Gate, SimKernel, TIMEOUT};
use pretty_assertions::assert_eq;
use proc_kernel::core::types::USER_NULL;
use proc_kernel::process::{wexitstatus, WAIT_NO_OPTIONS};
use proc_kernel::{Errno, ExitStatus, Pid};
use std::time::Duration;

#[test]
fn test_wait_blocks_until_child_exits() {
    let kernel = boot();
    let gate = Gate::new();
    let (tx, rx) = flume::unbounded();

    let child_gate = gate.clone();
    kernel.platform().install_program("/bin/patient", move |env| {
        let child_gate = child_gate.clone();
        let child = env
            .fork(move |_| {
                child_gate.wait();
                17
            })
            .unwrap();
        tx.send(env.waitpid(child).map(wexitstatus)).unwrap();
        // Reaped: a second wait has nothing to find
        tx.send(env.waitpid(child).map(wexitstatus)).unwrap();
        0
    });

    let pid = kernel.spawn_program("/bin/patient", &["patient"]).unwrap();
    assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());

    gate.open();
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Ok(17));
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Err(Errno::ESRCH));
    assert_eq!(kernel.wait_child(pid).unwrap(), ExitStatus::Exited(0));

    shutdown(&kernel);
}

#[test]
fn test_wait_after_child_already_exited() {
    let kernel = boot();

    kernel.platform().install_program("/bin/late", |env| {
        let child = env.fork(|_| 9).unwrap();
        std::thread::sleep(Duration::from_millis(20));
        wexitstatus(env.waitpid(child).unwrap())
    });

    assert_eq!(run(&kernel, "/bin/late", &["late"]), ExitStatus::Exited(9));
    shutdown(&kernel);
}

#[test]
fn test_sibling_cannot_wait() {
    let kernel = boot();
    let gate = Gate::new();
    let (tx, rx) = flume::unbounded();

    let child_gate = gate.clone();
    kernel.platform().install_program("/bin/siblings", move |env| {
        let child_gate = child_gate.clone();
        let first = env
            .fork(move |_| {
                child_gate.wait();
                1
            })
            .unwrap();

        let report = tx.clone();
        let second = env
            .fork(move |sibling| {
                report
                    .send(sibling.waitpid_raw(first.as_u32() as i32, USER_NULL, 0))
                    .unwrap();
                2
            })
            .unwrap();

        assert_eq!(wexitstatus(env.waitpid(second).unwrap()), 2);
        assert_eq!(wexitstatus(env.waitpid(first).unwrap()), 1);
        0
    });

    let pid = kernel.spawn_program("/bin/siblings", &["siblings"]).unwrap();
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Err(Errno::ECHILD));

    // The rejected wait had no effect on the target
    gate.open();
    assert_eq!(kernel.wait_child(pid).unwrap(), ExitStatus::Exited(0));
    shutdown(&kernel);
}

#[test]
fn test_kernel_cannot_wait_for_grandchildren() {
    let kernel = boot();
    let gate = Gate::new();
    let (tx, rx) = flume::unbounded();

    let child_gate = gate.clone();
    kernel.platform().install_program("/bin/holder", move |env| {
        let child_gate = child_gate.clone();
        let child = env
            .fork(move |_| {
                child_gate.wait();
                0
            })
            .unwrap();
        tx.send(child).unwrap();
        env.waitpid(child).unwrap();
        0
    });

    let pid = kernel.spawn_program("/bin/holder", &["holder"]).unwrap();
    let grandchild: Pid = rx.recv_timeout(TIMEOUT).unwrap();
    assert!(kernel.wait_child(grandchild).is_err());

    gate.open();
    assert_eq!(kernel.wait_child(pid).unwrap(), ExitStatus::Exited(0));
    shutdown(&kernel);
}

#[test]
fn test_options_and_pid_validation() {
    let kernel = boot();
    let gate = Gate::new();
    let (tx, rx) = flume::unbounded();

    let child_gate = gate.clone();
    kernel.platform().install_program("/bin/picky", move |env| {
        let child_gate = child_gate.clone();
        let child = env
            .fork(move |_| {
                child_gate.wait();
                0
            })
            .unwrap();
        let raw = child.as_u32() as i32;

        // None of these may block even though the child is still running
        tx.send(vec![
            env.waitpid_raw(raw, USER_NULL, 1),
            env.waitpid_raw(raw, USER_NULL, u64::MAX),
            env.waitpid_raw(0, USER_NULL, WAIT_NO_OPTIONS),
            env.waitpid_raw(-1, USER_NULL, WAIT_NO_OPTIONS),
            env.waitpid_raw(30_000, USER_NULL, WAIT_NO_OPTIONS),
        ])
        .unwrap();

        env.waitpid(child).unwrap();
        0
    });

    let pid = kernel.spawn_program("/bin/picky", &["picky"]).unwrap();
    assert_eq!(
        rx.recv_timeout(TIMEOUT).unwrap(),
        vec![
            Err(Errno::EINVAL),
            Err(Errno::EINVAL),
            Err(Errno::EINVAL),
            Err(Errno::EINVAL),
            Err(Errno::ESRCH),
        ]
    );

    gate.open();
    assert_eq!(kernel.wait_child(pid).unwrap(), ExitStatus::Exited(0));
    shutdown(&kernel);
}

#[test]
fn test_bad_status_buffer_keeps_the_zombie() {
    let kernel = boot();
    let (tx, rx) = flume::unbounded();

    kernel.platform().install_program("/bin/sloppy", move |env| {
        let child = env.fork(|_| 6).unwrap();
        let raw = child.as_u32() as i32;

        let fault = env.waitpid_raw(raw, 0xdead_0000, WAIT_NO_OPTIONS);
        let retry = env.waitpid(child).map(wexitstatus);
        tx.send((fault, retry)).unwrap();
        0
    });

    assert_eq!(run(&kernel, "/bin/sloppy", &["sloppy"]), ExitStatus::Exited(0));
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), (Err(Errno::EFAULT), Ok(6)));
    shutdown(&kernel);
}

#[test]
fn test_null_status_pointer_still_reaps() {
    let kernel = boot();
    let (tx, rx) = flume::unbounded();

    kernel.platform().install_program("/bin/careless", move |env| {
        let child = env.fork(|_| 0).unwrap();
        let first = env.waitpid_raw(child.as_u32() as i32, USER_NULL, WAIT_NO_OPTIONS);
        let second = env.waitpid_raw(child.as_u32() as i32, USER_NULL, WAIT_NO_OPTIONS);
        tx.send((child, first, second)).unwrap();
        0
    });

    assert_eq!(run(&kernel, "/bin/careless", &["careless"]), ExitStatus::Exited(0));
    let (child, first, second) = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(first, Ok(child));
    assert_eq!(second, Err(Errno::ESRCH));
    shutdown(&kernel);
}

/// After every failing wait the table must be usable from another thread
#[test]
fn test_lock_released_on_every_wait_path() {
    let kernel = boot();
    let (step_tx, step_rx) = flume::unbounded::<(&'static str, Result<Pid, Errno>)>();
    let ack = Gate::new();

    let program_ack = ack.clone();
    kernel.platform().install_program("/bin/paths", move |env| {
        let sibling_step = step_tx.clone();
        let sibling_ack = program_ack.clone();
        let other = env.fork(|_| 0).unwrap();
        let child = env
            .fork(move |sibling| {
                sibling_step
                    .send((
                        "not-a-child",
                        sibling.waitpid_raw(other.as_u32() as i32, USER_NULL, 0),
                    ))
                    .unwrap();
                sibling_ack.wait();
                0
            })
            .unwrap();
        let raw = child.as_u32() as i32;

        let step = |name: &'static str, result: Result<Pid, Errno>| {
            step_tx.send((name, result)).unwrap();
            program_ack.wait();
        };
        step("unknown", env.waitpid_raw(30_000, USER_NULL, 0));
        step("options", env.waitpid_raw(raw, USER_NULL, 4));
        step("bad-buffer", env.waitpid_raw(raw, 0x10, 0));
        step("success", env.waitpid_raw(raw, USER_NULL, 0));
        env.waitpid(other).unwrap();
        0
    });

    let pid = kernel.spawn_program("/bin/paths", &["paths"]).unwrap();

    let mut seen = Vec::new();
    for _ in 0..5 {
        let (name, result) = step_rx.recv_timeout(TIMEOUT).unwrap();
        assert!(
            table_is_free(&kernel),
            "table lock still held after {name}"
        );
        seen.push((name, result.map(|_| ())));
        ack.open();
    }
    seen.sort_by_key(|(name, _)| *name);

    assert_eq!(
        seen,
        vec![
            ("bad-buffer", Err(Errno::EFAULT)),
            ("not-a-child", Err(Errno::ECHILD)),
            ("options", Err(Errno::EINVAL)),
            ("success", Ok(())),
            ("unknown", Err(Errno::ESRCH)),
        ]
    );

    assert_eq!(kernel.wait_child(pid).unwrap(), ExitStatus::Exited(0));
    shutdown(&kernel);
}

fn table_is_free(kernel: &SimKernel) -> bool {
    let kernel = SimKernel::clone(kernel);
    completes_promptly(move || {
        let _ = kernel.table().snapshot();
        let _ = kernel.table().lookup(Pid(2));
    })
}
