//! Per-loan mutual exclusion.
//!
//! Payment application is a read-modify-write over a loan and its schedule.
//! Every such sequence runs while holding that loan's guard; different loans
//! never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug, Default)]
pub struct LoanLocks {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl LoanLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `loan_id`. The scope ends when the guard drops.
    pub async fn acquire(&self, loan_id: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop slots nobody is waiting on so the map tracks only live loans.
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(loan_id.to_string()).or_default())
        };
        slot.lock_owned().await
    }
}
