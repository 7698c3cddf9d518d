//! Process descriptors and the fixed-capacity pool they live in.
//!
//! Descriptors are addressed by [`ProcessHandle`], a small index into the
//! pool. The pool also owns the process tree: each descriptor records its
//! parent handle and the ordered list of its children.

use crate::sync::SemKey;
use alloc::vec::Vec;
use crossbeam_queue::ArrayQueue;
use kaya_common::consts::MAXPROC;
use kaya_common::ProcessorState;

mod lifecycle;
mod queue;
mod table;

pub use queue::ProcQueue;
pub use table::PidTable;

/// Index of a descriptor in the [`ProcessPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProcessHandle(usize);

impl ProcessHandle {
    /// Handle for pool slot `index`.
    pub const fn from_index(index: usize) -> Self {
        ProcessHandle(index)
    }

    /// The pool slot this handle names.
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A process identifier, assigned once and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(u32);

impl Pid {
    /// Wrap a raw pid.
    pub const fn new(raw: u32) -> Self {
        Pid(raw)
    }

    /// The raw pid, as returned to user code.
    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

/// Why a process is off the ready queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockReason {
    /// Not blocked.
    #[default]
    None,
    /// Waiting for a device completion (soft-blocked).
    Device,
    /// Waiting for the next pseudo-clock tick (soft-blocked).
    PseudoClock,
    /// Waiting on a user semaphore.
    Semaphore,
}

impl BlockReason {
    /// Whether this counts towards the soft-block counter.
    pub fn is_soft(self) -> bool {
        matches!(self, BlockReason::Device | BlockReason::PseudoClock)
    }
}

/// Exception classes a process may hand to its own handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FaultClass {
    /// Address translation faults.
    Tlb = 0,
    /// Program traps.
    ProgramTrap = 1,
    /// Syscalls and breakpoints.
    SysBreak = 2,
}

impl FaultClass {
    /// Number of delegable classes.
    pub const COUNT: usize = 3;

    /// Slot of this class in per-process arrays.
    pub const fn index(self) -> usize {
        self as usize
    }
}

/// A registered user-level handler: where to save the faulting state, and
/// the state to load in its place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delegation {
    /// Address of the user old-state buffer.
    pub old_area: u32,
    /// Address of the user new-state buffer.
    pub new_area: u32,
}

/// A process control block.
#[derive(Debug, Clone)]
pub struct Pcb {
    /// Process id, zero while the slot is free.
    pub pid: Pid,
    /// Saved processor state.
    pub state: ProcessorState,
    /// Parent process, `None` for the root and for detached descriptors.
    pub parent: Option<ProcessHandle>,
    /// Children, oldest first.
    pub children: Vec<ProcessHandle>,
    /// CPU time used over the process lifetime, in microseconds.
    pub cpu_time: u32,
    /// CPU time used in the current quantum, in microseconds.
    pub slice_time: u32,
    /// Semaphore the process is queued on.
    pub sem_key: Option<SemKey>,
    /// Why the process is blocked.
    pub blocked: BlockReason,
    /// Registered handlers, one slot per [`FaultClass`].
    pub delegations: [Option<Delegation>; FaultClass::COUNT],
    /// Registration requests seen, one counter per [`FaultClass`].
    pub delegation_requests: [u32; FaultClass::COUNT],
}

impl Pcb {
    fn new() -> Self {
        Self {
            pid: Pid(0),
            state: ProcessorState::default(),
            parent: None,
            children: Vec::new(),
            cpu_time: 0,
            slice_time: 0,
            sem_key: None,
            blocked: BlockReason::None,
            delegations: [None; FaultClass::COUNT],
            delegation_requests: [0; FaultClass::COUNT],
        }
    }

    /// The handler registered for `class`, if any.
    pub fn delegation(&self, class: FaultClass) -> Option<Delegation> {
        self.delegations[class.index()]
    }
}

/// Fixed pool of [`MAXPROC`] descriptors with a free list.
#[derive(Debug)]
pub struct ProcessPool {
    slots: Vec<Pcb>,
    in_use: [bool; MAXPROC],
    free: ArrayQueue<ProcessHandle>,
}

impl Default for ProcessPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessPool {
    /// Create a pool with every descriptor free.
    pub fn new() -> Self {
        let free = ArrayQueue::new(MAXPROC);
        for index in 0..MAXPROC {
            // Capacity equals the number of slots.
            let _ = free.push(ProcessHandle(index));
        }
        Self {
            slots: (0..MAXPROC).map(|_| Pcb::new()).collect(),
            in_use: [false; MAXPROC],
            free,
        }
    }

    /// Take a blank descriptor off the free list.
    pub fn alloc(&mut self) -> Option<ProcessHandle> {
        let handle = self.free.pop()?;
        self.slots[handle.0] = Pcb::new();
        self.in_use[handle.0] = true;
        Some(handle)
    }

    /// Return a descriptor to the free list.
    pub fn free(&mut self, handle: ProcessHandle) {
        debug_assert!(self.in_use[handle.0], "double free of process slot");
        self.in_use[handle.0] = false;
        self.slots[handle.0].pid = Pid(0);
        let pushed = self.free.push(handle);
        debug_assert!(pushed.is_ok(), "process free list overflow");
    }

    /// Whether `handle` names an allocated descriptor.
    pub fn is_allocated(&self, handle: ProcessHandle) -> bool {
        self.in_use.get(handle.0).copied().unwrap_or(false)
    }

    /// Number of allocated descriptors.
    pub fn live(&self) -> usize {
        self.in_use.iter().filter(|&&used| used).count()
    }

    /// Handles of every allocated descriptor.
    pub fn handles(&self) -> impl Iterator<Item = ProcessHandle> + '_ {
        (0..MAXPROC)
            .filter(|&i| self.in_use[i])
            .map(ProcessHandle)
    }

    /// Descriptor behind `handle`.
    pub fn get(&self, handle: ProcessHandle) -> &Pcb {
        &self.slots[handle.0]
    }

    /// Mutable descriptor behind `handle`.
    pub fn get_mut(&mut self, handle: ProcessHandle) -> &mut Pcb {
        &mut self.slots[handle.0]
    }

    /// Make `child` the youngest child of `parent`.
    pub fn attach_child(&mut self, parent: ProcessHandle, child: ProcessHandle) {
        self.slots[parent.0].children.push(child);
        self.slots[child.0].parent = Some(parent);
    }

    /// Detach and return the oldest child of `parent`.
    pub fn detach_first_child(&mut self, parent: ProcessHandle) -> Option<ProcessHandle> {
        let children = &mut self.slots[parent.0].children;
        if children.is_empty() {
            return None;
        }
        let child = children.remove(0);
        self.slots[child.0].parent = None;
        Some(child)
    }

    /// Detach `child` from its parent. `None` if it has no parent.
    pub fn detach_child(&mut self, child: ProcessHandle) -> Option<ProcessHandle> {
        let parent = self.slots[child.0].parent.take()?;
        self.slots[parent.0].children.retain(|&c| c != child);
        Some(child)
    }

    /// Children of `handle`, oldest first.
    pub fn children(&self, handle: ProcessHandle) -> &[ProcessHandle] {
        &self.slots[handle.0].children
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_exhaustion() {
        let mut pool = ProcessPool::new();
        let handles: Vec<_> = (0..MAXPROC).map(|_| pool.alloc().unwrap()).collect();
        assert_eq!(pool.live(), MAXPROC);
        assert!(pool.alloc().is_none());

        pool.free(handles[4]);
        assert_eq!(pool.live(), MAXPROC - 1);
        assert_eq!(pool.alloc(), Some(handles[4]));
    }

    #[test]
    fn test_alloc_returns_blank_descriptor() {
        let mut pool = ProcessPool::new();
        let h = pool.alloc().unwrap();
        pool.get_mut(h).cpu_time = 42;
        pool.get_mut(h).blocked = BlockReason::Device;
        pool.free(h);

        // Drain until the recycled slot comes back.
        let mut again = pool.alloc().unwrap();
        while again != h {
            again = pool.alloc().unwrap();
        }
        assert_eq!(pool.get(h).cpu_time, 0);
        assert_eq!(pool.get(h).blocked, BlockReason::None);
        assert!(pool.get(h).children.is_empty());
    }

    #[test]
    fn test_tree_operations() {
        let mut pool = ProcessPool::new();
        let parent = pool.alloc().unwrap();
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        let c = pool.alloc().unwrap();
        pool.attach_child(parent, a);
        pool.attach_child(parent, b);
        pool.attach_child(parent, c);
        assert_eq!(pool.children(parent), &[a, b, c]);
        assert_eq!(pool.get(b).parent, Some(parent));

        assert_eq!(pool.detach_child(b), Some(b));
        assert_eq!(pool.get(b).parent, None);
        assert_eq!(pool.children(parent), &[a, c]);
        assert_eq!(pool.detach_child(b), None);

        assert_eq!(pool.detach_first_child(parent), Some(a));
        assert_eq!(pool.detach_first_child(parent), Some(c));
        assert_eq!(pool.detach_first_child(parent), None);
    }

    #[test]
    fn test_root_has_no_parent_to_detach_from() {
        let mut pool = ProcessPool::new();
        let root = pool.alloc().unwrap();
        assert_eq!(pool.detach_child(root), None);
    }

    #[test]
    fn test_soft_block_reasons() {
        assert!(BlockReason::Device.is_soft());
        assert!(BlockReason::PseudoClock.is_soft());
        assert!(!BlockReason::Semaphore.is_soft());
        assert!(!BlockReason::None.is_soft());
    }
}
