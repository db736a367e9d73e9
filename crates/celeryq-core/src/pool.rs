use parking_lot::Mutex;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

/// Objects that can be handed out again after use.
///
/// `Default` should be cheap: it fills the slot a detached or released object
/// leaves behind. `reset` establishes the state a caller sees on acquisition,
/// for new and recycled objects alike.
pub trait Recycle: Default + Send {
    fn reset(&mut self);
}

/// Snapshot of pool activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Acquisitions served from the free list
    pub reused: u64,
    /// Acquisitions that had to build a new object
    pub created: u64,
    /// Objects currently waiting in the free list
    pub idle: usize,
}

/// Bounded free list of reusable objects, safe to share across threads
pub struct Pool<T: Recycle> {
    free: Mutex<Vec<T>>,
    capacity: usize,
    reused: AtomicU64,
    created: AtomicU64,
}

impl<T: Recycle> Pool<T> {
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// At most `capacity` released objects are retained; the rest are dropped
    pub fn with_capacity(capacity: usize) -> Self {
        Pool {
            free: Mutex::new(Vec::with_capacity(capacity)),
            capacity,
            reused: AtomicU64::new(0),
            created: AtomicU64::new(0),
        }
    }

    /// Take an object out of the pool. It goes back when the guard drops.
    pub fn acquire(&self) -> Pooled<'_, T> {
        let recycled = self.free.lock().pop();
        let item = match recycled {
            Some(item) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                item
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                let mut item = T::default();
                item.reset();
                item
            }
        };
        Pooled { pool: self, item }
    }

    fn release(&self, mut item: T) {
        item.reset();
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(item);
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            reused: self.reused.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            idle: self.free.lock().len(),
        }
    }
}

impl<T: Recycle> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive handle on a pooled object
pub struct Pooled<'a, T: Recycle> {
    pool: &'a Pool<T>,
    item: T,
}

impl<T: Recycle> Pooled<'_, T> {
    /// Keep the object for good. The pool receives an empty placeholder instead.
    pub fn detach(mut self) -> T {
        std::mem::take(&mut self.item)
    }
}

impl<T: Recycle> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T: Recycle> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.item
    }
}

impl<T: Recycle> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.item));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ResultMessage, Task, Value};
    use std::sync::Arc;

    #[test]
    fn test_released_task_is_reset_and_reused() {
        let pool: Pool<Task> = Pool::new();

        let first_id = {
            let mut task = pool.acquire();
            task.name = "add".to_string();
            task.args.push(Value::Int(1));
            task.id().to_string()
        };

        let task = pool.acquire();
        assert!(task.name.is_empty());
        assert!(task.args.is_empty());
        assert_ne!(task.id(), first_id);

        let stats = pool.stats();
        assert_eq!(stats.created, 1);
        assert_eq!(stats.reused, 1);
    }

    #[test]
    fn test_fresh_objects_match_recycled_ones() {
        let pool: Pool<ResultMessage> = Pool::new();
        let msg = pool.acquire();
        assert_eq!(*msg, ResultMessage::default());
    }

    #[test]
    fn test_free_list_is_bounded() {
        let pool: Pool<Task> = Pool::with_capacity(2);
        let guards: Vec<_> = (0..5).map(|_| pool.acquire()).collect();
        drop(guards);

        assert_eq!(pool.stats().idle, 2);
    }

    #[test]
    fn test_detach_keeps_contents() {
        let pool: Pool<Task> = Pool::new();
        let mut guard = pool.acquire();
        guard.name = "kept".to_string();
        let task = guard.detach();

        assert_eq!(task.name, "kept");
        assert_eq!(pool.stats().idle, 1);
        assert!(pool.acquire().name.is_empty());
    }

    #[test]
    fn test_concurrent_acquire_release() {
        let pool: Arc<Pool<Task>> = Arc::new(Pool::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let mut task = pool.acquire();
                        assert!(task.args.is_empty());
                        task.args.push(Value::Int(i));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.created + stats.reused, 800);
        assert!(stats.idle <= Pool::<Task>::DEFAULT_CAPACITY);
    }
}
