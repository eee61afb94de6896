//! Per-item advisory locking.
//!
//! Every mutating operation on an item acquires this lock for the item's
//! uid before touching the row or the blob. Acquisition is a non-blocking
//! try-lock: contention fails immediately with `ResourceBusy` instead of
//! waiting, so no operation ever blocks on another and no deadlock cycle
//! can form.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use notevault_core::error::AppError;
use notevault_core::result::AppResult;

/// Number of shards in the lock table.
const SHARD_COUNT: usize = 16;

/// Sharded table of held item locks.
///
/// The shard for a uid is derived from a stable function of the uid
/// itself, so every holder of a clone of this table contends on the same
/// slot for the same item. Locks are non-reentrant: a second acquisition
/// of a held uid fails even from the same task.
#[derive(Debug, Clone)]
pub struct ResourceLock {
    shards: Arc<Vec<DashMap<Uuid, ()>>>,
}

impl Default for ResourceLock {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceLock {
    /// Create an empty lock table.
    pub fn new() -> Self {
        let shards = (0..SHARD_COUNT).map(|_| DashMap::new()).collect();
        Self {
            shards: Arc::new(shards),
        }
    }

    fn shard_index(uid: Uuid) -> usize {
        (uid.as_u128() % SHARD_COUNT as u128) as usize
    }

    /// Try to acquire the lock for `uid` without blocking.
    ///
    /// Returns `ResourceBusy` if a concurrent operation holds it. The
    /// returned guard releases the lock when dropped, on every exit path.
    pub fn try_acquire(&self, uid: Uuid) -> AppResult<LockGuard> {
        let index = Self::shard_index(uid);
        match self.shards[index].entry(uid) {
            Entry::Occupied(_) => Err(AppError::resource_busy(format!(
                "Item {uid} is locked by a concurrent operation"
            ))),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(LockGuard {
                    shards: Arc::clone(&self.shards),
                    index,
                    uid,
                })
            }
        }
    }

    /// Whether the lock for `uid` is currently held.
    pub fn is_held(&self, uid: Uuid) -> bool {
        self.shards[Self::shard_index(uid)].contains_key(&uid)
    }
}

/// Guard representing a held item lock; releases on drop.
#[derive(Debug)]
pub struct LockGuard {
    shards: Arc<Vec<DashMap<Uuid, ()>>>,
    index: usize,
    uid: Uuid,
}

impl LockGuard {
    /// The uid this guard locks.
    pub fn uid(&self) -> Uuid {
        self.uid
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.shards[self.index].remove(&self.uid);
    }
}
