use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Flags<K> = Arc<Mutex<HashMap<K, bool>>>;

fn lock<K>(flags: &Flags<K>) -> MutexGuard<'_, HashMap<K, bool>> {
    flags.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct OperationTracker<K> {
    flags: Flags<K>,
}

impl<K> Default for OperationTracker<K> {
    fn default() -> Self {
        Self {
            flags: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<K> OperationTracker<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as running. Returns `None` if it already is. The flag drops
    /// back to `false` when the returned guard is dropped.
    pub fn start(&self, key: K) -> Option<OperationGuard<K>> {
        let mut flags = lock(&self.flags);
        if flags.get(&key).copied().unwrap_or(false) {
            return None;
        }
        flags.insert(key.clone(), true);
        Some(OperationGuard {
            key,
            flags: self.flags.clone(),
        })
    }

    pub fn is_running(&self, key: &K) -> bool {
        lock(&self.flags).get(key).copied().unwrap_or(false)
    }

    pub fn snapshot(&self) -> HashMap<K, bool> {
        lock(&self.flags).clone()
    }
}

#[derive(Debug)]
pub struct OperationGuard<K: Eq + Hash + Clone> {
    key: K,
    flags: Flags<K>,
}

impl<K: Eq + Hash + Clone> Drop for OperationGuard<K> {
    fn drop(&mut self) {
        lock(&self.flags).insert(self.key.clone(), false);
    }
}
