/*!
 * Exit Tests
 * Status delivery, faults, orphans and quiescence
 */

use crate::common::{boot, run, shutdown, wait_for_zombie, Gate, TIMEOUT};
use pretty_assertions::assert_eq;
use proc_kernel::core::limits::SIGSEGV;
use proc_kernel::process::{wexitstatus, wifexited, wifsignaled, wtermsig};
use proc_kernel::sim::programs::{self, EXEC_FAILED};
use proc_kernel::{ExitStatus, Pid};

#[test]
fn test_exit_code_reaches_the_kernel() {
    let kernel = boot();
    assert_eq!(run(&kernel, programs::TRUE, &["true"]), ExitStatus::Exited(0));
    assert_eq!(run(&kernel, programs::FALSE, &["false"]), ExitStatus::Exited(1));
    shutdown(&kernel);
}

#[test]
fn test_exit_code_is_truncated_in_the_wait_status() {
    let kernel = boot();
    let (tx, rx) = flume::unbounded();

    kernel.platform().install_program("/bin/codes", move |env| {
        for code in [42, 256 + 7, -1] {
            let child = env.fork(move |_| code).unwrap();
            tx.send(env.waitpid(child).unwrap()).unwrap();
        }
        0
    });

    assert_eq!(run(&kernel, "/bin/codes", &["codes"]), ExitStatus::Exited(0));
    let statuses: Vec<i32> = rx.try_iter().collect();
    assert!(statuses.iter().all(|&s| wifexited(s)));
    assert_eq!(
        statuses.iter().map(|&s| wexitstatus(s)).collect::<Vec<_>>(),
        vec![42, 7, 255]
    );

    shutdown(&kernel);
}

#[test]
fn test_explicit_exit_skips_the_rest_of_the_program() {
    let kernel = boot();
    let (tx, rx) = flume::unbounded();

    kernel.platform().install_program("/bin/early", move |env| {
        tx.send("before").unwrap();
        env.exit(3);
    });

    assert_eq!(run(&kernel, "/bin/early", &["early"]), ExitStatus::Exited(3));
    assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec!["before"]);
    shutdown(&kernel);
}

#[test]
fn test_faulting_program_is_killed() {
    let kernel = boot();
    let (tx, rx) = flume::unbounded();

    kernel.platform().install_program("/bin/crash", |_| panic!("null dereference"));
    kernel.platform().install_program("/bin/watcher", move |env| {
        let child = env
            .fork(|child| {
                let errno = child.execv("/bin/crash", &["crash"]);
                panic!("exec failed: {errno}");
            })
            .unwrap();
        tx.send(env.waitpid(child).unwrap()).unwrap();
        0
    });

    assert_eq!(
        run(&kernel, "/bin/crash", &["crash"]),
        ExitStatus::Signaled(SIGSEGV)
    );
    assert_eq!(run(&kernel, "/bin/watcher", &["watcher"]), ExitStatus::Exited(0));

    let status = rx.recv_timeout(TIMEOUT).unwrap();
    assert!(wifsignaled(status));
    assert_eq!(wtermsig(status), i32::from(SIGSEGV));

    shutdown(&kernel);
}

#[test]
fn test_failed_exec_in_child_reports_127() {
    let kernel = boot();

    kernel.platform().install_program("/bin/shell", |env| {
        let child = env
            .fork(|child| {
                child.execv("/bin/nonexistent", &["nonexistent"]);
                EXEC_FAILED
            })
            .unwrap();
        wexitstatus(env.waitpid(child).unwrap())
    });

    assert_eq!(
        run(&kernel, "/bin/shell", &["shell"]),
        ExitStatus::Exited(EXEC_FAILED)
    );
    shutdown(&kernel);
}

#[test]
fn test_orphan_is_detached_and_cleaned_up() {
    let kernel = boot();
    let gate = Gate::new();
    let (tx, rx) = flume::unbounded();

    let child_gate = gate.clone();
    kernel.platform().install_program("/bin/abandon", move |env| {
        let child_gate = child_gate.clone();
        let child = env
            .fork(move |_| {
                child_gate.wait();
                0
            })
            .unwrap();
        tx.send(child).unwrap();
        0
    });

    let parent = kernel.spawn_program("/bin/abandon", &["abandon"]).unwrap();
    let orphan: Pid = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(kernel.wait_child(parent).unwrap(), ExitStatus::Exited(0));

    let info = kernel.table().lookup(orphan).unwrap();
    assert_eq!(info.parent, None);

    gate.open();
    shutdown(&kernel);
    assert!(kernel.table().lookup(orphan).is_none());
    assert!(kernel.processes().is_empty());
}

#[test]
fn test_zombie_children_are_reaped_with_their_parent() {
    let kernel = boot();
    let gate = Gate::new();
    let (tx, rx) = flume::unbounded();

    let parent_gate = gate.clone();
    kernel.platform().install_program("/bin/neglect", move |env| {
        let child = env.fork(|_| 4).unwrap();
        tx.send(child).unwrap();
        parent_gate.wait();
        0
    });

    let parent = kernel.spawn_program("/bin/neglect", &["neglect"]).unwrap();
    let child = rx.recv_timeout(TIMEOUT).unwrap();
    wait_for_zombie(&kernel, child);
    assert_eq!(
        kernel.table().lookup(child).unwrap().exit_status,
        Some(ExitStatus::Exited(4))
    );

    gate.open();
    assert_eq!(kernel.wait_child(parent).unwrap(), ExitStatus::Exited(0));
    assert!(kernel.table().lookup(child).is_none());
    shutdown(&kernel);
}

#[test]
fn test_quiescence_after_init() {
    let kernel = boot();
    let init = kernel
        .spawn_program(programs::INIT, &[programs::INIT])
        .unwrap();

    assert!(kernel.wait_quiescent(Some(TIMEOUT)));
    assert_eq!(kernel.table().live_count(), 0);

    // init stays a zombie until the kernel reaps it; all its jobs passed
    assert_eq!(kernel.processes().len(), 1);
    assert_eq!(kernel.wait_child(init).unwrap(), ExitStatus::Exited(0));
    shutdown(&kernel);
}
