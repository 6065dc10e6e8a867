//! `ShmQueue<T>`: a SysV shared-memory, fixed-capacity MWMR ring.
//!
//! Layout: a 64-byte aligned [`Header`] (capacity/elem_size/head_seq/tail_seq)
//! immediately followed by `capacity` cache-line-aligned [`Slot<T>`]s, each
//! `{sequence: AtomicU64, payload: T}`. The sequence-counter discipline
//! (claim via fetch-add, spin until the slot's sequence matches, publish by
//! advancing it) is the same one used for lock-free, torn-read-free shared
//! memory slots elsewhere in this codebase, generalized here from opaque
//! byte payloads to a typed `T` and from mmap-backed storage to SysV
//! `shmget`/`shmat` segments so unrelated processes can attach by key.

use crate::errors::ShmError;
use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::os::raw::c_void;
use std::sync::atomic::{AtomicU64, Ordering};

/// Marker for types safe to place in shared memory: plain bits, no
/// pointers, no destructors that matter across a process boundary.
///
/// # Safety
/// Implementors must be `Copy`, `#[repr(C)]`, and contain no pointers or
/// heap-owning fields; every bit pattern the type can hold must be valid
/// (it may be read back after being written by a different process).
pub unsafe trait ShmRecord: Copy {}

const MAGIC: u32 = 0x5146_4C57; // "QFLW"
const VERSION: u32 = 1;

#[repr(C, align(64))]
struct Header {
    magic: u32,
    version: u32,
    capacity: u32,
    elem_size: u32,
    head_seq: AtomicU64,
    tail_seq: AtomicU64,
    _pad: [u8; 32],
}

const _: () = assert!(std::mem::size_of::<Header>() == 64);

#[repr(C, align(64))]
struct Slot<T> {
    sequence: AtomicU64,
    payload: UnsafeCell<T>,
}

unsafe impl<T: Send> Send for Slot<T> {}
unsafe impl<T: Send> Sync for Slot<T> {}

/// A SysV-shared MWMR ring of `T`.
///
/// Cheaply `Clone`-free by design: share via `Arc<ShmQueue<T>>` across
/// threads within one process; across processes, attach by key.
pub struct ShmQueue<T: ShmRecord> {
    addr: *mut u8,
    size: usize,
    capacity: u32,
    key: i32,
    _marker: PhantomData<T>,
}

unsafe impl<T: ShmRecord + Send> Send for ShmQueue<T> {}
unsafe impl<T: ShmRecord + Send> Sync for ShmQueue<T> {}

impl<T: ShmRecord> ShmQueue<T> {
    fn segment_size(capacity: u32) -> usize {
        std::mem::size_of::<Header>() + capacity as usize * std::mem::size_of::<Slot<T>>()
    }

    fn header(&self) -> &Header {
        unsafe { &*(self.addr as *const Header) }
    }

    fn slot(&self, seq_or_idx: u64) -> &Slot<T> {
        let idx = (seq_or_idx % self.capacity as u64) as usize;
        unsafe {
            let base = self.addr.add(std::mem::size_of::<Header>()) as *const Slot<T>;
            &*base.add(idx)
        }
    }

    /// Attach to an existing segment for `key`, creating and initializing
    /// it if this is the first attacher.
    pub fn create(key: i32, capacity: u32) -> Result<Self, ShmError> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(ShmError::BadCapacity {
                key,
                found: capacity,
                expected: capacity.next_power_of_two().max(1),
            });
        }

        let size = Self::segment_size(capacity);
        let elem_size = std::mem::size_of::<T>() as u32;

        let created;
        let shmid = unsafe {
            let id = libc::shmget(
                key,
                size,
                libc::IPC_CREAT | libc::IPC_EXCL | 0o600,
            );
            if id >= 0 {
                created = true;
                id
            } else {
                created = false;
                let id = libc::shmget(key, size, 0o600);
                if id < 0 {
                    return Err(ShmError::Allocate {
                        key,
                        source: std::io::Error::last_os_error(),
                    });
                }
                id
            }
        };

        let addr = unsafe { libc::shmat(shmid, std::ptr::null(), 0) };
        if addr as isize == -1 {
            return Err(ShmError::Attach {
                key,
                source: std::io::Error::last_os_error(),
            });
        }
        let addr = addr as *mut u8;

        let queue = Self {
            addr,
            size,
            capacity,
            key,
            _marker: PhantomData,
        };

        if created {
            unsafe {
                std::ptr::write(
                    queue.addr as *mut Header,
                    Header {
                        magic: MAGIC,
                        version: VERSION,
                        capacity,
                        elem_size,
                        head_seq: AtomicU64::new(0),
                        tail_seq: AtomicU64::new(0),
                        _pad: [0; 32],
                    },
                );
            }
            for idx in 0..capacity as u64 {
                queue.slot(idx).sequence.store(idx, Ordering::Relaxed);
            }
        } else {
            let header = queue.header();
            if header.magic != MAGIC {
                return Err(ShmError::BadCapacity {
                    key,
                    found: header.capacity,
                    expected: capacity,
                });
            }
            if header.capacity != capacity {
                return Err(ShmError::BadCapacity {
                    key,
                    found: header.capacity,
                    expected: capacity,
                });
            }
            if header.elem_size != elem_size {
                return Err(ShmError::BadElemSize {
                    key,
                    found: header.elem_size,
                    expected: elem_size,
                });
            }
        }

        Ok(queue)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn key(&self) -> i32 {
        self.key
    }

    pub fn is_empty(&self) -> bool {
        let header = self.header();
        header.head_seq.load(Ordering::Acquire) == header.tail_seq.load(Ordering::Acquire)
    }

    pub fn len(&self) -> u64 {
        let header = self.header();
        header
            .tail_seq
            .load(Ordering::Acquire)
            .saturating_sub(header.head_seq.load(Ordering::Acquire))
    }

    /// Wait-free claim-and-publish enqueue. Spins up to `max_attempts`
    /// waiting for the claimed slot to free up; returns `Full` if the
    /// consumer never catches up within the budget.
    pub fn enqueue(&self, value: T, max_attempts: u32) -> Result<(), ShmError> {
        let header = self.header();
        let claimed = header.tail_seq.fetch_add(1, Ordering::AcqRel);
        let slot = self.slot(claimed);

        let mut attempts = 0u32;
        while slot.sequence.load(Ordering::Acquire) != claimed {
            std::hint::spin_loop();
            attempts += 1;
            if attempts >= max_attempts {
                return Err(ShmError::Full { attempts });
            }
        }

        unsafe {
            std::ptr::write(slot.payload.get(), value);
        }
        slot.sequence.store(claimed + 1, Ordering::Release);
        Ok(())
    }

    /// Blocks (bounded by `max_attempts`) until a value is available.
    pub fn dequeue(&self, max_attempts: u32) -> Result<T, ShmError> {
        let header = self.header();
        let mut attempts = 0u32;
        loop {
            let head = header.head_seq.load(Ordering::Acquire);
            let slot = self.slot(head);
            if slot.sequence.load(Ordering::Acquire) != head + 1 {
                attempts += 1;
                if attempts >= max_attempts {
                    return Err(ShmError::Empty);
                }
                std::hint::spin_loop();
                continue;
            }

            let value = unsafe { std::ptr::read(slot.payload.get()) };

            if header
                .head_seq
                .compare_exchange(head, head + 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                slot.sequence.store(head + self.capacity as u64, Ordering::Release);
                return Ok(value);
            }
            // Lost the race to another reader; retry from the current head.
        }
    }

    /// Non-blocking dequeue: `None` if the queue was empty at the time of
    /// the check (single attempt, no spin budget).
    pub fn try_dequeue(&self) -> Option<T> {
        self.dequeue(1).ok()
    }
}

impl<T: ShmRecord> Drop for ShmQueue<T> {
    fn drop(&mut self) {
        unsafe {
            libc::shmdt(self.addr as *const c_void);
        }
    }
}

impl<T: ShmRecord> ShmQueue<T> {
    /// Mark the underlying segment for destruction once every attacher has
    /// detached. Only the process tearing down the whole session should
    /// call this; restarting a single end of the pipe must not.
    pub fn destroy(key: i32, capacity: u32) -> Result<(), ShmError> {
        let size = Self::segment_size(capacity);
        let shmid = unsafe { libc::shmget(key, size, 0o600) };
        if shmid < 0 {
            return Err(ShmError::Allocate {
                key,
                source: std::io::Error::last_os_error(),
            });
        }
        let rc = unsafe { libc::shmctl(shmid, libc::IPC_RMID, std::ptr::null_mut()) };
        if rc < 0 {
            return Err(ShmError::Allocate {
                key,
                source: std::io::Error::last_os_error(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    #[repr(C)]
    struct Tick {
        seq: u64,
        value: f64,
    }
    unsafe impl ShmRecord for Tick {}

    fn unique_key(salt: i32) -> i32 {
        // Keep test segments from colliding with each other or with the
        // process-global keys used in production.
        0x7A00 + salt + (std::process::id() as i32 & 0xFF)
    }

    #[test]
    fn rejects_non_power_of_two_capacity() {
        let err = ShmQueue::<Tick>::create(unique_key(1), 3).unwrap_err();
        assert!(matches!(err, ShmError::BadCapacity { .. }));
    }

    #[test]
    fn enqueue_dequeue_round_trip() {
        let key = unique_key(2);
        let q = ShmQueue::<Tick>::create(key, 8).unwrap();
        assert!(q.is_empty());

        q.enqueue(Tick { seq: 1, value: 1.5 }, 1000).unwrap();
        q.enqueue(Tick { seq: 2, value: 2.5 }, 1000).unwrap();
        assert_eq!(q.len(), 2);

        let a = q.dequeue(1000).unwrap();
        let b = q.dequeue(1000).unwrap();
        assert_eq!(a.seq, 1);
        assert_eq!(b.seq, 2);
        assert!(q.is_empty());

        let _ = ShmQueue::<Tick>::destroy(key, 8);
    }

    #[test]
    fn try_dequeue_on_empty_returns_none() {
        let key = unique_key(3);
        let q = ShmQueue::<Tick>::create(key, 8).unwrap();
        assert!(q.try_dequeue().is_none());
        let _ = ShmQueue::<Tick>::destroy(key, 8);
    }

    #[test]
    fn wraps_around_capacity() {
        let key = unique_key(4);
        let q = ShmQueue::<Tick>::create(key, 4).unwrap();
        for i in 0..20u64 {
            q.enqueue(
                Tick {
                    seq: i,
                    value: i as f64,
                },
                1000,
            )
            .unwrap();
            let out = q.dequeue(1000).unwrap();
            assert_eq!(out.seq, i);
        }
        let _ = ShmQueue::<Tick>::destroy(key, 4);
    }

    #[test]
    fn second_attach_validates_capacity_and_elem_size() {
        let key = unique_key(5);
        let q1 = ShmQueue::<Tick>::create(key, 16).unwrap();
        let q2 = ShmQueue::<Tick>::create(key, 16).unwrap();
        q1.enqueue(Tick { seq: 9, value: 9.0 }, 1000).unwrap();
        let out = q2.dequeue(1000).unwrap();
        assert_eq!(out.seq, 9);
        let _ = ShmQueue::<Tick>::destroy(key, 16);
    }
}
