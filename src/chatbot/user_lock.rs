//! Per-user serialization.
//!
//! Handlers for the same user run one at a time; different users run in
//! parallel. Locks are created on demand and live as long as the process.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::chatbot::message::UserId;

#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<UserId, Arc<Mutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to the user's state.
    pub async fn acquire(&self, user_id: &UserId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(user_id.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }
}
