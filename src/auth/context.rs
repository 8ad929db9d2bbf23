use std::collections::HashSet;

use uuid::Uuid;

use crate::rbac::Role;

/// Identity resolved by the authenticator for one request.
///
/// Handlers receive this value explicitly; nothing is written back onto the
/// request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
    pub permissions: HashSet<String>,
}

impl AuthContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin.as_str()
    }

    /// Admin passes unconditionally; everyone else needs every listed permission.
    pub fn has_all(&self, required: &[&str]) -> bool {
        self.is_admin() || required.iter().all(|p| self.permissions.contains(*p))
    }
}
