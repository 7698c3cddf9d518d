//! Active semaphore list.
//!
//! A fixed pool of descriptors, each binding a [`SemKey`] to the FIFO queue
//! of processes blocked on it. A descriptor is on the active list (kept
//! sorted by key) exactly while its queue is non-empty, and goes back to the
//! free list the moment the last waiter leaves.

use super::SemKey;
use crate::process::{ProcQueue, ProcessHandle, ProcessPool};
use alloc::vec::Vec;
use crossbeam_queue::ArrayQueue;
use kaya_common::consts::MAXPROC;
use kaya_common::{KernelPanic, KernelResult};

#[derive(Debug, Clone, Default)]
struct Semd {
    key: Option<SemKey>,
    queue: ProcQueue,
}

/// The semaphore descriptor pool.
#[derive(Debug)]
pub struct SemaphoreDirectory {
    table: Vec<Semd>,
    /// Indices into `table`, sorted by key.
    active: Vec<usize>,
    free: ArrayQueue<usize>,
}

impl Default for SemaphoreDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl SemaphoreDirectory {
    /// Create a directory with every descriptor free.
    pub fn new() -> Self {
        let free = ArrayQueue::new(MAXPROC);
        for index in 0..MAXPROC {
            let _ = free.push(index);
        }
        Self {
            table: (0..MAXPROC).map(|_| Semd::default()).collect(),
            active: Vec::with_capacity(MAXPROC),
            free,
        }
    }

    /// Position in `active` and table index of the descriptor for `key`.
    fn find(&self, key: SemKey) -> Option<(usize, usize)> {
        self.active
            .iter()
            .enumerate()
            .find(|&(_, &index)| self.table[index].key == Some(key))
            .map(|(pos, &index)| (pos, index))
    }

    fn release(&mut self, pos: usize) {
        let index = self.active.remove(pos);
        self.table[index].key = None;
        let pushed = self.free.push(index);
        debug_assert!(pushed.is_ok(), "semaphore free list overflow");
    }

    /// Queue `process` on `key`, activating a descriptor if needed.
    ///
    /// Fails only when a new descriptor is needed and none is free.
    pub fn block(
        &mut self,
        pool: &mut ProcessPool,
        key: SemKey,
        process: ProcessHandle,
    ) -> KernelResult<()> {
        let index = match self.find(key) {
            Some((_, index)) => index,
            None => {
                let index = self.free.pop().ok_or(KernelPanic::SemaphorePoolExhausted)?;
                self.table[index].key = Some(key);
                let table = &self.table;
                let pos = self
                    .active
                    .partition_point(|&other| table[other].key < Some(key));
                self.active.insert(pos, index);
                index
            }
        };
        self.table[index].queue.enqueue(process);
        pool.get_mut(process).sem_key = Some(key);
        log::trace!("blocked {:?} on {:?}", pool.get(process).pid, key);
        Ok(())
    }

    /// Dequeue the oldest waiter on `key`.
    pub fn wake_one(&mut self, pool: &mut ProcessPool, key: SemKey) -> Option<ProcessHandle> {
        let (pos, index) = self.find(key)?;
        let process = self.table[index].queue.dequeue()?;
        if self.table[index].queue.is_empty() {
            self.release(pos);
        }
        pool.get_mut(process).sem_key = None;
        log::trace!("woke {:?} from {:?}", pool.get(process).pid, key);
        Some(process)
    }

    /// Take `process` out of the queue of the semaphore it is blocked on.
    pub fn remove_specific(
        &mut self,
        pool: &mut ProcessPool,
        process: ProcessHandle,
    ) -> Option<ProcessHandle> {
        let key = pool.get(process).sem_key?;
        let (pos, index) = self.find(key)?;
        self.table[index].queue.remove(process)?;
        if self.table[index].queue.is_empty() {
            self.release(pos);
        }
        pool.get_mut(process).sem_key = None;
        Some(process)
    }

    /// Oldest waiter on `key`, left in place.
    pub fn peek(&self, key: SemKey) -> Option<ProcessHandle> {
        let (_, index) = self.find(key)?;
        self.table[index].queue.peek()
    }

    /// Number of processes waiting on `key`.
    pub fn waiters(&self, key: SemKey) -> usize {
        self.find(key)
            .map(|(_, index)| self.table[index].queue.len())
            .unwrap_or(0)
    }

    /// Keys with at least one waiter, in ascending order.
    pub fn active_keys(&self) -> impl Iterator<Item = SemKey> + '_ {
        self.active.iter().filter_map(|&index| self.table[index].key)
    }

    /// Number of free descriptors.
    pub fn free_descriptors(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{DeviceClass, DeviceKey};

    fn setup(n: usize) -> (ProcessPool, Vec<ProcessHandle>) {
        let mut pool = ProcessPool::new();
        let handles = (0..n).map(|_| pool.alloc().unwrap()).collect();
        (pool, handles)
    }

    #[test]
    fn test_wake_order_is_fifo() {
        let (mut pool, p) = setup(3);
        let mut asl = SemaphoreDirectory::new();
        let key = SemKey::User(0x2000_4000);
        for &h in &p {
            asl.block(&mut pool, key, h).unwrap();
        }
        assert_eq!(asl.waiters(key), 3);
        assert_eq!(pool.get(p[1]).sem_key, Some(key));

        assert_eq!(asl.wake_one(&mut pool, key), Some(p[0]));
        assert_eq!(asl.wake_one(&mut pool, key), Some(p[1]));
        assert_eq!(asl.wake_one(&mut pool, key), Some(p[2]));
        assert_eq!(asl.wake_one(&mut pool, key), None);
        assert_eq!(pool.get(p[2]).sem_key, None);
    }

    #[test]
    fn test_descriptor_recycled_when_empty() {
        let (mut pool, p) = setup(1);
        let mut asl = SemaphoreDirectory::new();
        asl.block(&mut pool, SemKey::PseudoClock, p[0]).unwrap();
        assert_eq!(asl.free_descriptors(), MAXPROC - 1);

        asl.wake_one(&mut pool, SemKey::PseudoClock);
        assert_eq!(asl.free_descriptors(), MAXPROC);
        assert_eq!(asl.active_keys().count(), 0);
    }

    #[test]
    fn test_active_list_sorted_by_key() {
        let (mut pool, p) = setup(4);
        let mut asl = SemaphoreDirectory::new();
        let disk = SemKey::Device(DeviceKey::new(DeviceClass::Disk, 1).unwrap());
        asl.block(&mut pool, SemKey::User(0x300), p[0]).unwrap();
        asl.block(&mut pool, SemKey::PseudoClock, p[1]).unwrap();
        asl.block(&mut pool, SemKey::User(0x100), p[2]).unwrap();
        asl.block(&mut pool, disk, p[3]).unwrap();

        let keys: Vec<_> = asl.active_keys().collect();
        assert_eq!(
            keys,
            [disk, SemKey::PseudoClock, SemKey::User(0x100), SemKey::User(0x300)]
        );
    }

    #[test]
    fn test_remove_specific_waiter() {
        let (mut pool, p) = setup(3);
        let mut asl = SemaphoreDirectory::new();
        let key = SemKey::User(0x80);
        for &h in &p {
            asl.block(&mut pool, key, h).unwrap();
        }

        assert_eq!(asl.remove_specific(&mut pool, p[1]), Some(p[1]));
        assert_eq!(asl.remove_specific(&mut pool, p[1]), None);
        assert_eq!(asl.peek(key), Some(p[0]));
        assert_eq!(asl.wake_one(&mut pool, key), Some(p[0]));
        assert_eq!(asl.wake_one(&mut pool, key), Some(p[2]));
        assert_eq!(asl.peek(key), None);
    }

    #[test]
    fn test_exhaustion_is_reported() {
        let (mut pool, p) = setup(MAXPROC);
        let mut asl = SemaphoreDirectory::new();
        for (i, &h) in p.iter().enumerate() {
            asl.block(&mut pool, SemKey::User(i as u32 * 4), h).unwrap();
        }
        assert_eq!(asl.free_descriptors(), 0);

        // Joining an active key needs no descriptor; a new key does.
        assert_eq!(
            asl.block(&mut pool, SemKey::User(0x2000), p[0]),
            Err(KernelPanic::SemaphorePoolExhausted)
        );
    }
}
