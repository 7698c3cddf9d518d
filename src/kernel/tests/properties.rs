//! Nucleus-wide properties: fairness, pid allocation, teardown, accounting.

mod common;

use common::{booted, create, resumed_pid, run_until, v0, ROOT_ENTRY};
use kaya_common::consts::{
    BUS_TODLOW, GETCPUTIME, INT_DISK, MAXPROC, PASSEREN, SCHED_PSEUDO_CLOCK, TERMINATEPROCESS,
    VERHOGEN, WAITCLOCK, WAITIO,
};
use kaya_common::{KernelPanic, KernelResult};
use kaya_hal::Bus;
use kaya_kernel::boot;
use kaya_kernel::config::Config;
use kaya_kernel::process::Pid;
use kaya_kernel::sync::SemKey;
use kaya_kernel::testutil::{Event, SimMachine};
use kaya_kernel::{Dispatch, Kernel};

const SEM: u32 = 0x2000_9000;

fn pids(raw: &[u32]) -> Vec<Pid> {
    raw.iter().copied().map(Pid::new).collect()
}

#[test]
fn waiters_wake_in_arrival_order() {
    let mut k = booted();
    for _ in 0..3 {
        create(&mut k);
    }
    k.platform_mut().write_word(SEM, 0);

    // 1, 2 and 3 block in that order; 4 is left running.
    for _ in 0..3 {
        k.inject(Event::sys(PASSEREN, SEM, 0, 0)).unwrap();
    }
    assert_eq!(k.current(), Some(Pid::new(4)));

    for _ in 0..3 {
        k.inject(Event::sys(VERHOGEN, SEM, 0, 0)).unwrap();
    }
    assert_eq!(k.ready_pids(), pids(&[1, 2, 3]));
    assert_eq!(k.semaphore(SemKey::User(SEM)), 0);
}

#[test]
fn ready_queue_is_round_robin() {
    let mut k = booted();
    create(&mut k);
    create(&mut k);

    let order: Vec<_> = (0..6)
        .map(|_| resumed_pid(k.inject(Event::Timer)))
        .collect();
    assert_eq!(order, pids(&[2, 3, 1, 2, 3, 1]));
}

#[test]
fn pids_are_never_reused() {
    let mut k = booted();
    let mut last = 1;
    for _ in 0..MAXPROC * 3 {
        let pid = create(&mut k);
        assert!(pid > last);
        last = pid;
        assert_eq!(v0(k.inject(Event::sys(TERMINATEPROCESS, pid, 0, 0))), 0);
    }
    assert_eq!(k.process_count(), 1);
    assert_eq!(last, 1 + MAXPROC as u32 * 3);
}

/// Root with subtree 2 -> {3 -> 5, 4} and a second child 6.
fn family() -> Kernel<SimMachine> {
    let mut k = booted();
    assert_eq!(create(&mut k), 2);
    run_until(&mut k, 2);
    assert_eq!(create(&mut k), 3);
    assert_eq!(create(&mut k), 4);
    run_until(&mut k, 3);
    assert_eq!(create(&mut k), 5);
    run_until(&mut k, 1);
    assert_eq!(create(&mut k), 6);
    assert_eq!(k.process_count(), 6);
    k
}

#[test]
fn teardown_removes_whole_subtree() {
    let mut k = family();
    assert_eq!(v0(k.inject(Event::sys(TERMINATEPROCESS, 2, 0, 0))), 0);

    assert_eq!(k.process_count(), 2);
    for pid in 2..=5 {
        assert!(k.pcb(Pid::new(pid)).is_none(), "pid {} survived", pid);
    }
    assert_eq!(k.children(Pid::new(1)), pids(&[6]));
    assert_eq!(k.ready_pids(), pids(&[6]));
}

#[test]
fn killing_an_ancestor_kills_the_caller() {
    let mut k = family();
    run_until(&mut k, 5);

    let next = k.inject(Event::sys(TERMINATEPROCESS, 2, 0, 0));
    assert_eq!(k.process_count(), 2);
    assert!(k.pcb(Pid::new(5)).is_none());
    let pid = resumed_pid(next);
    assert!(pid == Pid::new(1) || pid == Pid::new(6));
}

#[test]
fn teardown_of_blocked_processes_keeps_counters_exact() {
    let mut k = booted();
    create(&mut k);
    create(&mut k);
    k.platform_mut().write_word(SEM, 0);

    // 1 waits on a disk, 2 on the clock, 3 on a user semaphore.
    k.inject(Event::sys(WAITIO, INT_DISK as u32, 0, 0)).unwrap();
    k.inject(Event::sys(WAITCLOCK, 0, 0, 0)).unwrap();
    assert_eq!(k.inject(Event::sys(PASSEREN, SEM, 0, 0)), Ok(Dispatch::Idle));
    assert_eq!(k.soft_block_count(), 2);
    assert_eq!(k.process_count(), 3);

    let next = k.inject(Event::Device {
        line: INT_DISK,
        device: 0,
        status: 1,
    });
    assert_eq!(resumed_pid(next), Pid::new(1));
    assert_eq!(k.soft_block_count(), 1);

    k.inject(Event::sys(TERMINATEPROCESS, 2, 0, 0)).unwrap();
    assert_eq!(k.soft_block_count(), 0);
    assert_eq!(k.semaphore(SemKey::PseudoClock), 0);

    k.inject(Event::sys(TERMINATEPROCESS, 3, 0, 0)).unwrap();
    assert_eq!(k.semaphore(SemKey::User(SEM)), 0);
    assert_eq!(k.process_count(), 1);
    assert!(k.active_semaphores().is_empty());
}

#[test]
fn deadlock_is_detected() {
    let mut k = booted();
    create(&mut k);
    k.platform_mut().write_word(SEM, 0);

    k.inject(Event::sys(PASSEREN, SEM, 0, 0)).unwrap();
    assert_eq!(
        k.inject(Event::sys(PASSEREN, SEM, 0, 0)),
        Err(KernelPanic::Deadlock)
    );
}

#[test]
fn clock_waiters_are_released_each_tick() {
    let mut k = booted();
    create(&mut k);

    k.inject(Event::sys(WAITCLOCK, 0, 0, 0)).unwrap();
    assert_eq!(k.inject(Event::sys(WAITCLOCK, 0, 0, 0)), Ok(Dispatch::Idle));
    assert_eq!(k.semaphore(SemKey::PseudoClock), -2);
    assert_eq!(k.platform().timer_micros(), SCHED_PSEUDO_CLOCK);

    assert_eq!(resumed_pid(k.inject(Event::Timer)), Pid::new(1));
    assert_eq!(k.ready_pids(), pids(&[2]));
    assert_eq!(k.semaphore(SemKey::PseudoClock), 0);
    assert_eq!(k.soft_block_count(), 0);
}

/// Handle `event`, then cross-check the counters.
fn step(k: &mut Kernel<SimMachine>, event: Event) -> KernelResult<Dispatch> {
    let next = k.inject(event);
    k.check_accounting();
    next
}

#[test]
fn counters_match_descriptors_at_every_step() {
    let mut k = booted();
    k.check_accounting();
    k.platform_mut().write_word(SEM, 0);
    for _ in 0..3 {
        create(&mut k);
        k.check_accounting();
    }

    // Root on a disk, 2 on the clock, 3 on a user semaphore; 4 runs.
    step(&mut k, Event::sys(WAITIO, INT_DISK as u32, 1, 0)).unwrap();
    step(&mut k, Event::sys(WAITCLOCK, 0, 0, 0)).unwrap();
    assert_eq!(resumed_pid(step(&mut k, Event::sys(PASSEREN, SEM, 0, 0))), Pid::new(4));
    assert_eq!(k.soft_block_count(), 2);

    assert_eq!(create(&mut k), 5);
    k.check_accounting();
    assert_eq!(resumed_pid(step(&mut k, Event::Timer)), Pid::new(5));

    assert_eq!(v0(step(&mut k, Event::sys(TERMINATEPROCESS, 3, 0, 0))), 0);
    assert_eq!(k.semaphore(SemKey::User(SEM)), 0);

    step(
        &mut k,
        Event::Device {
            line: INT_DISK,
            device: 1,
            status: 0x11,
        },
    )
    .unwrap();
    assert_eq!(k.soft_block_count(), 1);
    assert_eq!(k.ready_pids(), pids(&[4, 1]));

    step(&mut k, Event::sys(TERMINATEPROCESS, 2, 0, 0)).unwrap();
    assert_eq!(k.soft_block_count(), 0);
    assert_eq!(k.semaphore(SemKey::PseudoClock), 0);

    assert_eq!(
        resumed_pid(step(&mut k, Event::sys(TERMINATEPROCESS, u32::MAX, 0, 0))),
        Pid::new(4)
    );
    // 4 is a child of the root, so it goes down with it.
    assert_eq!(
        step(&mut k, Event::sys(TERMINATEPROCESS, 1, 0, 0)),
        Ok(Dispatch::Halt)
    );
    assert_eq!(k.process_count(), 0);
}

#[test]
fn cpu_time_is_exact_across_a_clock_wrap() {
    let mut sim = SimMachine::new().with_timescale(4);
    sim.write_word(BUS_TODLOW, u32::MAX - 400);
    let mut k = boot::init(sim, Config::new(ROOT_ENTRY)).unwrap();
    k.schedule().unwrap();

    k.platform_mut().advance(200);
    assert_eq!(v0(k.inject(Event::sys(GETCPUTIME, 0, 0, 0))), 200);
    // No quantum or pseudo-clock expiry was faked by the wrap.
    assert_eq!(k.current(), Some(Pid::new(1)));
    assert_eq!(k.semaphore(SemKey::PseudoClock), 0);
    assert_eq!(k.platform().timer_micros(), 4_800);
}
