//! Per-resource serialization.
//!
//! Assign, return and reconciliation of the same resource must not
//! interleave between reading the ledger head and appending the next
//! event. Different resources never contend.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub struct ResourceLocks {
    held: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `resource_id`. Released on drop.
    pub async fn acquire(&self, resource_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut held = self.held.lock().await;
            // Forget locks nobody is holding or waiting on.
            held.retain(|id, lock| *id == resource_id || Arc::strong_count(lock) > 1);
            Arc::clone(
                held.entry(resource_id)
                    .or_insert_with(|| Arc::new(Mutex::new(()))),
            )
        };
        lock.lock_owned().await
    }
}
