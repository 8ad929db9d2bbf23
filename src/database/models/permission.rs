use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A `resource:action[:own]` grant. `name` is the natural key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
    pub resource: String,
    pub action: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPermission {
    pub name: String,
    pub resource: String,
    pub action: String,
    pub description: String,
}

impl NewPermission {
    /// Split `name` on its first `:` into resource and action. A name without a
    /// separator uses the whole name as the resource and an empty action.
    ///
    /// `documents:update:own` becomes resource `documents`, action `update`,
    /// description `update documents`.
    pub fn from_name(name: &str) -> Self {
        let (resource, rest) = name.split_once(':').unwrap_or((name, ""));
        let action = rest.split(':').next().unwrap_or_default();

        Self {
            name: name.to_string(),
            resource: resource.to_string(),
            action: action.to_string(),
            description: format!("{} {}", action, resource),
        }
    }
}
