use std::collections::HashMap;
use std::sync::Arc;

use common::AggregateId;
use tokio::sync::{Mutex, OwnedMutexGuard};

// Idle entries are pruned once the table grows past this size.
const PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per aggregate id.
///
/// Holding the guard makes the caller the only in-process writer of that stream.
#[derive(Clone, Default)]
pub(crate) struct KeyedLocks {
    table: Arc<Mutex<HashMap<AggregateId, Arc<Mutex<()>>>>>,
}

impl KeyedLocks {
    pub(crate) async fn lock(&self, id: AggregateId) -> OwnedMutexGuard<()> {
        let entry = {
            let mut table = self.table.lock().await;
            if table.len() > PRUNE_THRESHOLD {
                table.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            table.entry(id).or_default().clone()
        };
        entry.lock_owned().await
    }
}
