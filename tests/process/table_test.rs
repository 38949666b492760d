/*!
 * Process Table Tests
 * Pid uniqueness and lock behaviour under concurrency
 */

use crate::common::completes_promptly;
use pretty_assertions::assert_eq;
use proc_kernel::process::{ExitStatus, ProcessState, ProcessTable};
use proc_kernel::{KernelConfig, KernelError, Pid};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone)]
enum Op {
    Register,
    Exit(usize),
    Reap(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Register),
        2 => any::<usize>().prop_map(Op::Exit),
        2 => any::<usize>().prop_map(Op::Reap),
    ]
}

proptest! {
    /// A pid is never handed out while a record with that pid still exists
    #[test]
    fn prop_pids_are_unique(ops in prop::collection::vec(op(), 1..200)) {
        let config = KernelConfig::default()
            .with_pid_range(2, 12)
            .with_max_processes(16);
        let table = ProcessTable::new(&config);
        let mut running: Vec<Pid> = Vec::new();
        let mut zombies: Vec<Pid> = Vec::new();

        for op in ops {
            match op {
                Op::Register => {
                    let before: HashSet<Pid> = table.snapshot().iter().map(|p| p.pid).collect();
                    match table.register(Pid::KERNEL, "p") {
                        Ok(pid) => {
                            prop_assert!(!before.contains(&pid));
                            prop_assert!((2..=12).contains(&pid.as_u32()));
                            running.push(pid);
                        }
                        Err(e) => {
                            prop_assert!(matches!(e, KernelError::ProcessLimit(_)));
                            prop_assert_eq!(before.len(), 11);
                        }
                    }
                }
                Op::Exit(i) if !running.is_empty() => {
                    let pid = running.swap_remove(i % running.len());
                    table.record_exit(pid, ExitStatus::Exited(0));
                    table.retire(pid);
                    zombies.push(pid);
                }
                Op::Reap(i) if !zombies.is_empty() => {
                    let pid = zombies.swap_remove(i % zombies.len());
                    prop_assert_eq!(table.reap(Pid::KERNEL, pid), Ok(ExitStatus::Exited(0)));
                }
                _ => {}
            }

            let rows = table.snapshot();
            let unique: HashSet<Pid> = rows.iter().map(|p| p.pid).collect();
            prop_assert_eq!(unique.len(), rows.len());
            prop_assert_eq!(rows.len(), running.len() + zombies.len());
            prop_assert_eq!(table.live_count(), running.len());
        }
    }
}

#[test]
fn test_concurrent_registration_yields_distinct_pids() {
    let table = Arc::new(ProcessTable::new(&KernelConfig::default().with_max_processes(1000)));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let table = Arc::clone(&table);
            thread::spawn(move || {
                (0..100)
                    .map(|_| table.register(Pid::KERNEL, "worker").unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let pids: Vec<Pid> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let unique: HashSet<Pid> = pids.iter().copied().collect();
    assert_eq!(unique.len(), 800);
    assert_eq!(table.len(), 800);
}

#[test]
fn test_reaped_pid_is_not_reused_immediately() {
    let table = ProcessTable::new(&KernelConfig::default());
    let first = table.register(Pid::KERNEL, "a").unwrap();
    table.record_exit(first, ExitStatus::Exited(0));
    table.retire(first);
    table.reap(Pid::KERNEL, first).unwrap();

    // The cursor keeps moving forward
    let second = table.register(Pid::KERNEL, "b").unwrap();
    assert!(second > first);
}

#[test]
fn test_failed_operations_release_the_lock() {
    let table = Arc::new(ProcessTable::new(&KernelConfig::default().with_max_processes(1)));
    let parent = table.register(Pid::KERNEL, "parent").unwrap();

    let failures = [
        table.register(parent, "over-limit").map(|_| ()),
        table.wait_for_exit(parent, Pid(999)).map(|_| ()),
        table.wait_for_exit(Pid(999), parent).map(|_| ()),
        table.reap(Pid::KERNEL, parent).map(|_| ()),
    ];
    assert!(failures.iter().all(Result::is_err));

    let probe = Arc::clone(&table);
    assert!(completes_promptly(move || {
        let _ = probe.snapshot();
    }));
    assert!(!table.is_locked());
    assert_eq!(table.lookup(parent).unwrap().state, ProcessState::Running);
}
