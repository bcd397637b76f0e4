use uuid::Uuid;

use crate::models::user::{GlobalRole, User};

/// Principal is the authenticated caller as the live user record describes it,
/// not as the token last claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: GlobalRole,
}

impl Principal {
    pub fn new(user_id: Uuid, role: GlobalRole) -> Self {
        Self { user_id, role }
    }

    pub fn user(user_id: Uuid) -> Self {
        Self::new(user_id, GlobalRole::User)
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self::new(user_id, GlobalRole::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == GlobalRole::Admin
    }
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.role)
    }
}
