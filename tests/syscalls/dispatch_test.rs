/*!
 * Dispatch Tests
 * Raw register interface seen from user programs
 */

use crate::common::{boot, run, shutdown, TIMEOUT};
use pretty_assertions::assert_eq;
use proc_kernel::core::limits::INSTRUCTION_SIZE;
use proc_kernel::core::types::USER_NULL;
use proc_kernel::platform::reg;
use proc_kernel::process::wexitstatus;
use proc_kernel::syscalls::numbers::{SYS_EXIT, SYS_GETPID, SYS_WAITPID};
use proc_kernel::{Errno, ExitStatus, Pid, Syscall};

#[test]
fn test_unknown_number_returns_enosys() {
    let kernel = boot();
    let (tx, rx) = flume::unbounded();

    kernel.platform().install_program("/bin/probe", move |env| {
        let before = env.frame().epc;
        let result = env.syscall_raw(1, [0; 4]);
        let frame = *env.frame();
        tx.send((result, frame.regs[reg::A3], frame.epc - before))
            .unwrap();

        let result = env.syscall_raw(u64::MAX, [0; 4]);
        tx.send((result, env.frame().regs[reg::A3], 0)).unwrap();
        0
    });

    assert_eq!(run(&kernel, "/bin/probe", &["probe"]), ExitStatus::Exited(0));
    assert_eq!(
        rx.recv_timeout(TIMEOUT).unwrap(),
        (Err(Errno::ENOSYS), 1, INSTRUCTION_SIZE)
    );
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), (Err(Errno::ENOSYS), 1, 0));
    shutdown(&kernel);
}

#[test]
fn test_success_clears_the_error_flag() {
    let kernel = boot();
    let (tx, rx) = flume::unbounded();

    kernel.platform().install_program("/bin/whoami", move |env| {
        // A stale error flag from the last failed call must not survive
        let _ = env.syscall_raw(99, [0; 4]);
        let before = env.frame().epc;
        let raw = env.syscall_raw(SYS_GETPID, [0; 4]);
        let frame = *env.frame();
        tx.send((raw, frame.regs[reg::A3], frame.epc - before, env.getpid()))
            .unwrap();
        0
    });

    let pid = kernel.spawn_program("/bin/whoami", &["whoami"]).unwrap();
    let (raw, a3, step, typed) = rx.recv_timeout(TIMEOUT).unwrap();
    assert_eq!(raw, Ok(u64::from(pid)));
    assert_eq!(a3, 0);
    assert_eq!(step, INSTRUCTION_SIZE);
    assert_eq!(typed, pid);

    assert_eq!(kernel.wait_child(pid).unwrap(), ExitStatus::Exited(0));
    shutdown(&kernel);
}

#[test]
fn test_exit_code_comes_from_the_low_word() {
    let kernel = boot();
    let (tx, rx) = flume::unbounded();

    kernel.platform().install_program("/bin/raw-exit", move |env| {
        for a0 in [(-2i64) as u64, 0x1_0000_0003] {
            let child = env
                .fork(move |child| {
                    let _ = child.syscall_raw(SYS_EXIT, [a0, 0, 0, 0]);
                    unreachable!("exit returned");
                })
                .unwrap();
            tx.send(wexitstatus(env.waitpid(child).unwrap())).unwrap();
        }
        0
    });

    assert_eq!(run(&kernel, "/bin/raw-exit", &["raw-exit"]), ExitStatus::Exited(0));
    assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![254, 3]);
    shutdown(&kernel);
}

#[test]
fn test_negative_pid_in_register_is_rejected() {
    let kernel = boot();
    let (tx, rx) = flume::unbounded();

    kernel.platform().install_program("/bin/neg", move |env| {
        let result = env.syscall_raw(SYS_WAITPID, [(-5i64) as u64, USER_NULL, 0, 0]);
        tx.send(result).unwrap();
        0
    });

    assert_eq!(run(&kernel, "/bin/neg", &["neg"]), ExitStatus::Exited(0));
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), Err(Errno::EINVAL));
    shutdown(&kernel);
}

#[test]
fn test_typed_and_raw_calls_agree() {
    let kernel = boot();
    let (tx, rx) = flume::unbounded();

    kernel.platform().install_program("/bin/agree", move |env| {
        let typed = env.syscall(Syscall::Getpid).map(|v| Pid(v as u32));
        let raw = env.syscall_raw(SYS_GETPID, [7, 7, 7, 7]).map(|v| Pid(v as u32));
        tx.send((typed, raw)).unwrap();
        0
    });

    let pid = kernel.spawn_program("/bin/agree", &["agree"]).unwrap();
    assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), (Ok(pid), Ok(pid)));
    assert_eq!(kernel.wait_child(pid).unwrap(), ExitStatus::Exited(0));
    shutdown(&kernel);
}
