//! Process creation and teardown.

use super::{BlockReason, Pid, ProcessHandle};
use crate::sync::SemKey;
use crate::Kernel;
use kaya_common::ProcessorState;
use kaya_hal::Platform;

impl<P: Platform> Kernel<P> {
    /// Create a ready process running `state`, child of `parent`.
    ///
    /// `None` when the descriptor pool is exhausted.
    pub(crate) fn spawn(
        &mut self,
        state: ProcessorState,
        parent: Option<ProcessHandle>,
    ) -> Option<ProcessHandle> {
        let handle = self.procs.alloc()?;
        self.sched.pid_count += 1;
        let pid = Pid::new(self.sched.pid_count);

        let pcb = self.procs.get_mut(handle);
        pcb.pid = pid;
        pcb.state = state;
        let inserted = self.pids.insert(pid, handle);
        debug_assert!(inserted, "pid table out of sync with the pool");
        if let Some(parent) = parent {
            self.procs.attach_child(parent, handle);
        }
        self.ready.enqueue(handle);
        self.sched.process_count += 1;
        log::debug!("created {:?} (parent {:?})", pid, parent.map(|p| self.procs.get(p).pid));
        Some(handle)
    }

    /// Destroy `pid` and all its descendants. `false` if `pid` is not live.
    pub(crate) fn terminate(&mut self, pid: Pid) -> bool {
        let Some(victim) = self.pids.lookup(pid) else {
            return false;
        };
        self.procs.detach_child(victim);
        self.destroy(victim);
        true
    }

    fn destroy(&mut self, victim: ProcessHandle) {
        while let Some(child) = self.procs.detach_first_child(victim) {
            self.destroy(child);
        }

        let pcb = self.procs.get(victim);
        let (pid, blocked, key) = (pcb.pid, pcb.blocked, pcb.sem_key);
        match blocked {
            BlockReason::None => {
                self.ready.remove(victim);
            }
            BlockReason::Semaphore => {
                if let Some(key) = key {
                    self.sems.adjust(&mut self.platform, key, 1);
                }
                self.asl.remove_specific(&mut self.procs, victim);
            }
            BlockReason::PseudoClock => {
                self.sems.adjust(&mut self.platform, SemKey::PseudoClock, 1);
                self.asl.remove_specific(&mut self.procs, victim);
                self.sched.soft_block_count -= 1;
            }
            // The completion still arrives and must find the count intact.
            BlockReason::Device => {
                self.asl.remove_specific(&mut self.procs, victim);
                self.sched.soft_block_count -= 1;
            }
        }

        if self.sched.current == Some(victim) {
            self.sched.current = None;
        }
        self.pids.remove(pid);
        self.procs.free(victim);
        self.sched.process_count -= 1;
        log::debug!("terminated {:?}", pid);
    }
}
