use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::prelude::{CoreError, CoreResult};

/// Fixed-capacity circular buffer that evicts its oldest entry when full.
///
/// `left` is the slot of the oldest occupied entry and `right` the next write
/// position, both counted monotonically and folded back together so that
/// `0 <= left < capacity` and `right - left <= capacity` always hold.
#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    left: usize,
    right: usize,
}

impl<T> RingBuffer<T> {
    /// Allocates every slot up front. Fails rather than aborting when the
    /// storage cannot be reserved.
    pub fn new(capacity: usize) -> CoreResult<Self> {
        if capacity == 0 {
            return Err(CoreError::InvalidSettings(
                "ring capacity must be at least 1".into(),
            ));
        }
        let mut slots = Vec::new();
        slots.try_reserve_exact(capacity).map_err(|err| {
            CoreError::Allocation(format!("{} ring slots: {}", capacity, err))
        })?;
        slots.resize_with(capacity, || None);
        Ok(Self {
            slots,
            left: 0,
            right: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn occupancy(&self) -> usize {
        self.right - self.left
    }

    pub fn is_empty(&self) -> bool {
        self.occupancy() == 0
    }

    pub fn is_full(&self) -> bool {
        self.occupancy() == self.capacity()
    }

    /// Current `(left, right)` index pair.
    pub fn indices(&self) -> (usize, usize) {
        (self.left, self.right)
    }

    /// Writes `item` as the newest entry and returns the entry it displaced,
    /// if the buffer was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let capacity = self.capacity();
        if self.occupancy() == capacity {
            self.left += 1;
        }
        let evicted = self.slots[self.right % capacity].replace(item);
        self.right += 1;
        if self.left >= capacity {
            self.left -= capacity;
            self.right -= capacity;
        }
        evicted
    }

    /// The `n` most recent entries, oldest first.
    pub fn window(&self, n: usize) -> CoreResult<impl Iterator<Item = &T> + '_> {
        let available = self.occupancy();
        if n > available {
            return Err(CoreError::Underflow {
                requested: n,
                available,
            });
        }
        let capacity = self.capacity();
        let start = self.right - n;
        Ok((start..self.right).filter_map(move |idx| self.slots[idx % capacity].as_ref()))
    }

    pub fn latest(&self) -> Option<&T> {
        if self.is_empty() {
            return None;
        }
        self.slots[(self.right - 1) % self.capacity()].as_ref()
    }
}

impl<T: Clone> RingBuffer<T> {
    pub fn peek_window(&self, n: usize) -> CoreResult<Vec<T>> {
        Ok(self.window(n)?.cloned().collect())
    }
}

/// A ring buffer shared between a producer and any number of readers.
///
/// Every mutation of the index pair and the written slot happens under one
/// lock, so readers never observe a torn `(left, right)` pair.
#[derive(Debug)]
pub struct SharedRing<T> {
    inner: Arc<Mutex<RingBuffer<T>>>,
}

impl<T> Clone for SharedRing<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> SharedRing<T> {
    pub fn new(capacity: usize) -> CoreResult<Self> {
        Ok(Self {
            inner: Arc::new(Mutex::new(RingBuffer::new(capacity)?)),
        })
    }

    // The guarded state is only index arithmetic plus one slot write, which
    // cannot be left half-applied by a panicking holder.
    fn lock(&self) -> MutexGuard<'_, RingBuffer<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, item: T) -> Option<T> {
        self.lock().push(item)
    }

    /// Pushes and then runs `inspect` inside the same critical section.
    pub fn push_then<R>(
        &self,
        item: T,
        inspect: impl FnOnce(&RingBuffer<T>) -> R,
    ) -> (Option<T>, R) {
        let mut ring = self.lock();
        let evicted = ring.push(item);
        let result = inspect(&*ring);
        (evicted, result)
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity()
    }

    pub fn occupancy(&self) -> usize {
        self.lock().occupancy()
    }

    pub fn indices(&self) -> (usize, usize) {
        self.lock().indices()
    }
}

impl<T: Clone> SharedRing<T> {
    pub fn peek_window(&self, n: usize) -> CoreResult<Vec<T>> {
        self.lock().peek_window(n)
    }

    /// Every entry currently held, oldest first.
    pub fn peek_all(&self) -> Vec<T> {
        let ring = self.lock();
        let occupancy = ring.occupancy();
        ring.peek_window(occupancy).unwrap_or_default()
    }

    pub fn latest(&self) -> Option<T> {
        self.lock().latest().cloned()
    }
}
