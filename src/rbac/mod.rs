//! Role-based access control.
//!
//! Four fixed role labels each map to a hand-maintained permission list. The
//! lists are cumulative by convention only; nothing enforces that a higher
//! role's list contains the one below it.

pub mod resolver;

use serde::{Deserialize, Serialize};

pub use resolver::{InitReport, PermissionResolver, RbacError, RoleAssignment};

const USER_PERMISSIONS: &[&str] = &["users:read:own", "profile:read", "profile:update"];

const EDITOR_PERMISSIONS: &[&str] = &[
    "users:read:own",
    "profile:read",
    "profile:update",
    "documents:read",
    "documents:create",
    "documents:update:own",
];

const MODERATOR_PERMISSIONS: &[&str] = &[
    "users:read:own",
    "profile:read",
    "profile:update",
    "documents:read",
    "documents:create",
    "documents:update:own",
    "users:read",
    "users:update",
];

const ADMIN_PERMISSIONS: &[&str] = &[
    "users:read",
    "users:create",
    "users:update",
    "users:delete",
    "profile:read",
    "profile:update",
    "documents:read",
    "documents:create",
    "documents:update",
    "documents:delete",
    "roles:read",
    "roles:create",
    "roles:update",
    "roles:delete",
];

/// Role labels stored on a user record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Editor,
    Moderator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::User, Role::Editor, Role::Moderator, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Editor => "EDITOR",
            Role::Moderator => "MODERATOR",
            Role::Admin => "ADMIN",
        }
    }

    /// Exact, case-sensitive match on the stored label.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "USER" => Some(Role::User),
            "EDITOR" => Some(Role::Editor),
            "MODERATOR" => Some(Role::Moderator),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    /// Unknown labels resolve to [`Role::User`].
    pub fn from_label_or_default(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    pub fn permissions(&self) -> &'static [&'static str] {
        match self {
            Role::User => USER_PERMISSIONS,
            Role::Editor => EDITOR_PERMISSIONS,
            Role::Moderator => MODERATOR_PERMISSIONS,
            Role::Admin => ADMIN_PERMISSIONS,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::User => "Standard account with access to its own profile",
            Role::Editor => "Can read and author documents",
            Role::Moderator => "Editor who can also review and update users",
            Role::Admin => "Full administrative access",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_round_trip() {
        for role in Role::ALL {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn labels_are_case_sensitive() {
        assert_eq!(Role::parse("admin"), None);
        assert_eq!(Role::from_label_or_default("admin"), Role::User);
        assert_eq!(Role::from_label_or_default("SUPERUSER"), Role::User);
    }

    #[test]
    fn lists_are_cumulative_below_admin() {
        let ladder = [Role::User, Role::Editor, Role::Moderator];
        for pair in ladder.windows(2) {
            for perm in pair[0].permissions() {
                assert!(
                    pair[1].permissions().contains(perm),
                    "{} missing {}",
                    pair[1],
                    perm
                );
            }
        }
    }

    #[test]
    fn admin_list_covers_management() {
        let admin = Role::Admin.permissions();
        assert_eq!(admin.len(), 14);
        for perm in ["users:delete", "roles:create", "documents:delete"] {
            assert!(admin.contains(&perm));
        }
        assert!(!admin.contains(&"users:read:own"));
    }

    #[test]
    fn lists_have_no_duplicates() {
        for role in Role::ALL {
            let perms = role.permissions();
            let unique: std::collections::HashSet<_> = perms.iter().collect();
            assert_eq!(unique.len(), perms.len(), "{}", role);
        }
    }
}
