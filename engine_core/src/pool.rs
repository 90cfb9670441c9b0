//! Named object pools with explicit acquire/release bookkeeping.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolHandle(usize);

impl PoolHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("pool `{0}` does not exist")]
    UnknownPool(String),
    #[error("pool `{0}` already exists")]
    Duplicate(String),
    #[error("pool `{0}` has nothing available and does not expand")]
    Exhausted(String),
    #[error("object {handle} is not checked out of pool `{pool}`")]
    NotOutstanding { pool: String, handle: PoolHandle },
}

type Factory<T> = Box<dyn FnMut() -> T>;

pub struct ObjectPool<T> {
    factory: Factory<T>,
    expand: bool,
    slots: Vec<T>,
    available: VecDeque<PoolHandle>,
    outstanding: HashSet<PoolHandle>,
}

impl<T> ObjectPool<T> {
    fn new(expand: bool, factory: Factory<T>) -> Self {
        Self {
            factory,
            expand,
            slots: Vec::new(),
            available: VecDeque::new(),
            outstanding: HashSet::new(),
        }
    }

    fn create(&mut self) -> PoolHandle {
        let handle = PoolHandle(self.slots.len());
        self.slots.push((self.factory)());
        handle
    }

    pub fn expands(&self) -> bool {
        self.expand
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    pub fn outstanding_count(&self) -> usize {
        self.outstanding.len()
    }

    pub fn is_outstanding(&self, handle: PoolHandle) -> bool {
        self.outstanding.contains(&handle)
    }

    /// Checked-out handles in creation order.
    pub fn outstanding(&self) -> Vec<PoolHandle> {
        let mut handles: Vec<PoolHandle> = self.outstanding.iter().copied().collect();
        handles.sort_unstable();
        handles
    }

    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        self.slots.get(handle.0)
    }

    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        self.slots.get_mut(handle.0)
    }

    fn acquire(&mut self) -> Option<PoolHandle> {
        let handle = if self.expand && self.available.is_empty() {
            self.create()
        } else {
            self.available.pop_front()?
        };
        self.outstanding.insert(handle);
        Some(handle)
    }

    fn release(&mut self, handle: PoolHandle) -> bool {
        if !self.outstanding.remove(&handle) {
            return false;
        }
        self.available.push_back(handle);
        true
    }
}

/// Owner of every pool in a session.
pub struct PoolManager<T> {
    pools: HashMap<String, ObjectPool<T>>,
}

impl<T> Default for PoolManager<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PoolManager<T> {
    pub fn new() -> Self {
        Self {
            pools: HashMap::new(),
        }
    }

    pub fn create_pool(
        &mut self,
        name: &str,
        expand: bool,
        factory: impl FnMut() -> T + 'static,
    ) -> Result<(), PoolError> {
        if self.pools.contains_key(name) {
            log::error!("refusing to create duplicate pool `{name}`");
            return Err(PoolError::Duplicate(name.to_string()));
        }
        self.pools
            .insert(name.to_string(), ObjectPool::new(expand, Box::new(factory)));
        Ok(())
    }

    /// Creates `count` objects and queues them as available.
    pub fn prefill(&mut self, name: &str, count: usize) -> Result<(), PoolError> {
        let pool = self.lookup_mut(name)?;
        for _ in 0..count {
            let handle = pool.create();
            pool.available.push_back(handle);
        }
        Ok(())
    }

    pub fn pool(&self, name: &str) -> Option<&ObjectPool<T>> {
        self.pools.get(name)
    }

    pub fn pool_mut(&mut self, name: &str) -> Option<&mut ObjectPool<T>> {
        self.pools.get_mut(name)
    }

    pub fn get(&self, name: &str, handle: PoolHandle) -> Option<&T> {
        self.pools.get(name)?.get(handle)
    }

    pub fn get_mut(&mut self, name: &str, handle: PoolHandle) -> Option<&mut T> {
        self.pools.get_mut(name)?.get_mut(handle)
    }

    /// Checks out an object, creating one when the pool expands and is empty.
    pub fn acquire(&mut self, name: &str) -> Result<PoolHandle, PoolError> {
        let pool = self.lookup_mut(name)?;
        pool.acquire()
            .ok_or_else(|| PoolError::Exhausted(name.to_string()))
    }

    /// Returns a checked-out object. Anything else is logged and refused.
    pub fn release(&mut self, name: &str, handle: PoolHandle) -> Result<(), PoolError> {
        let Some(pool) = self.pools.get_mut(name) else {
            log::error!("cannot return {handle} to missing pool `{name}`");
            return Err(PoolError::UnknownPool(name.to_string()));
        };
        if !pool.release(handle) {
            log::error!("refusing to return {handle} to pool `{name}`: not checked out");
            return Err(PoolError::NotOutstanding {
                pool: name.to_string(),
                handle,
            });
        }
        Ok(())
    }

    fn lookup_mut(&mut self, name: &str) -> Result<&mut ObjectPool<T>, PoolError> {
        self.pools
            .get_mut(name)
            .ok_or_else(|| PoolError::UnknownPool(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_pool(expand: bool) -> PoolManager<u32> {
        let mut pools = PoolManager::new();
        let mut next = 0;
        pools
            .create_pool("shots", expand, move || {
                next += 1;
                next
            })
            .expect("create pool");
        pools
    }

    #[test]
    fn fixed_pool_hands_back_the_released_object() {
        let mut pools = counter_pool(false);
        pools.prefill("shots", 1).expect("prefill");

        let first = pools.acquire("shots").expect("first acquire");
        assert_eq!(
            pools.acquire("shots"),
            Err(PoolError::Exhausted("shots".to_string()))
        );

        pools.release("shots", first).expect("release");
        let again = pools.acquire("shots").expect("second acquire");
        assert_eq!(again, first);
        assert_eq!(pools.get("shots", again), Some(&1));
    }

    #[test]
    fn expanding_pool_creates_when_empty() {
        let mut pools = counter_pool(true);
        let a = pools.acquire("shots").expect("a");
        let b = pools.acquire("shots").expect("b");
        assert_ne!(a, b);
        assert_eq!(pools.get("shots", b), Some(&2));
        let pool = pools.pool("shots").expect("pool");
        assert_eq!(pool.outstanding(), vec![a, b]);
        assert_eq!(pool.available_count(), 0);
    }

    #[test]
    fn releases_are_checked() {
        let mut pools = counter_pool(true);
        let handle = pools.acquire("shots").expect("acquire");

        assert_eq!(
            pools.release("missing", handle),
            Err(PoolError::UnknownPool("missing".to_string()))
        );
        pools.release("shots", handle).expect("release");
        assert!(matches!(
            pools.release("shots", handle),
            Err(PoolError::NotOutstanding { .. })
        ));
        let pool = pools.pool("shots").expect("pool");
        assert_eq!(pool.available_count(), 1);
        assert_eq!(pool.outstanding_count(), 0);
    }

    #[test]
    fn duplicate_and_unknown_pools_are_refused() {
        let mut pools = counter_pool(false);
        assert_eq!(
            pools.create_pool("shots", true, || 0),
            Err(PoolError::Duplicate("shots".to_string()))
        );
        assert_eq!(
            pools.acquire("nope"),
            Err(PoolError::UnknownPool("nope".to_string()))
        );
    }
}
