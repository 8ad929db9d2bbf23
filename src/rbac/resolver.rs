use std::sync::Arc;

use futures::future::try_join_all;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use super::Role;
use crate::database::models::{NewPermission, NewRole, Permission, RoleChanges, RoleStatus};
use crate::database::{Database, DatabaseError};

#[derive(Debug, Error)]
pub enum RbacError {
    #[error("user {0} not found")]
    UserNotFound(Uuid),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Outcome of a successful role assignment.
#[derive(Debug, Clone)]
pub struct RoleAssignment {
    pub user_id: Uuid,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub permissions: usize,
    pub roles_created: usize,
    pub roles_updated: usize,
}

/// Reconciles users' direct permission grants with the role table.
#[derive(Clone)]
pub struct PermissionResolver {
    db: Arc<dyn Database>,
}

impl PermissionResolver {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    /// Find a permission by exact name, creating it when absent.
    ///
    /// A concurrent creator winning the race surfaces as a conflict; the
    /// record it wrote is returned instead.
    pub async fn find_or_create(&self, name: &str) -> Result<Permission, RbacError> {
        if let Some(existing) = self.db.find_permission_by_name(name).await? {
            return Ok(existing);
        }

        match self.db.create_permission(NewPermission::from_name(name)).await {
            Ok(created) => {
                debug!("Created permission {}", created.name);
                Ok(created)
            }
            Err(DatabaseError::Conflict(_)) => self
                .db
                .find_permission_by_name(name)
                .await?
                .ok_or_else(|| {
                    DatabaseError::NotFound(format!("permission {} vanished after conflict", name))
                        .into()
                }),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_or_create_all<S: AsRef<str>>(
        &self,
        names: &[S],
    ) -> Result<Vec<Permission>, RbacError> {
        try_join_all(names.iter().map(|name| self.find_or_create(name.as_ref()))).await
    }

    /// Replace the user's direct grants with the permission list of `label`.
    ///
    /// Grants left over from a previous role are revoked. Unknown labels get
    /// the `USER` list.
    pub async fn assign_role_to_user(
        &self,
        user_id: Uuid,
        label: &str,
    ) -> Result<RoleAssignment, RbacError> {
        let role = Role::from_label_or_default(label);
        if role.as_str() != label {
            debug!("Unknown role label '{}' resolved to {}", label, role);
        }

        let permissions = self.find_or_create_all(role.permissions()).await?;
        let ids: Vec<Uuid> = permissions.iter().map(|p| p.id).collect();

        match self.db.set_user_permissions(user_id, &ids).await {
            Ok(()) => {}
            Err(DatabaseError::NotFound(_)) => return Err(RbacError::UserNotFound(user_id)),
            Err(e) => return Err(e.into()),
        }

        info!(
            "Assigned {} ({} permissions) to user {}",
            role,
            permissions.len(),
            user_id
        );
        Ok(RoleAssignment {
            user_id,
            role,
            permissions,
        })
    }

    /// `Ok(false)` for a missing user; `Err` only when the lookup itself fails.
    pub async fn check_permission(&self, user_id: Uuid, name: &str) -> Result<bool, RbacError> {
        let Some(user) = self.db.find_user_by_id(user_id).await? else {
            return Ok(false);
        };

        if user.role == Role::Admin.as_str() {
            return Ok(true);
        }
        Ok(user.permissions.iter().any(|p| p.name == name))
    }

    /// Seed every permission in the role table and one role entity per label.
    /// Safe to run repeatedly.
    pub async fn initialize(&self) -> Result<InitReport, RbacError> {
        let mut report = InitReport::default();
        let mut seen = std::collections::HashSet::new();

        for role in Role::ALL {
            let permissions = self.find_or_create_all(role.permissions()).await?;
            let permission_ids: Vec<Uuid> = permissions.iter().map(|p| p.id).collect();
            seen.extend(permission_ids.iter().copied());

            match self.db.find_role_by_name(role.as_str()).await? {
                Some(existing) => {
                    self.db
                        .update_role(
                            existing.id,
                            RoleChanges {
                                permission_ids: Some(permission_ids),
                                ..RoleChanges::default()
                            },
                        )
                        .await?;
                    report.roles_updated += 1;
                }
                None => {
                    self.db
                        .create_role(NewRole {
                            name: role.as_str().to_string(),
                            description: role.description().to_string(),
                            status: RoleStatus::Active,
                            permission_ids,
                        })
                        .await?;
                    report.roles_created += 1;
                }
            }
        }

        report.permissions = seen.len();
        info!(
            "RBAC initialized: {} permissions, {} roles created, {} roles updated",
            report.permissions, report.roles_created, report.roles_updated
        );
        Ok(report)
    }
}
