//! Users who opted in with `/start`.

use std::collections::HashSet;

use crate::chatbot::message::UserId;

/// Opt-in set. There is no way out short of a restart.
#[derive(Debug, Default)]
pub struct ActiveUsers {
    users: HashSet<UserId>,
}

impl ActiveUsers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the user was not active before.
    pub fn activate(&mut self, user_id: &UserId) -> bool {
        self.users.insert(user_id.clone())
    }

    pub fn is_active(&self, user_id: &UserId) -> bool {
        self.users.contains(user_id)
    }
}
