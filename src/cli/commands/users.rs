use std::sync::Arc;

use anyhow::{anyhow, bail};
use clap::Args;
use serde_json::json;

use crate::auth::hash_password;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::DEFAULT_PASSWORD_MIN_LENGTH;
use crate::database::models::NewUser;
use crate::database::{DatabaseError, PgDatabase, UserRepository};
use crate::handlers::utils::{is_valid_email, normalize_email};
use crate::rbac::{PermissionResolver, Role};

#[derive(Args, Debug)]
pub struct CreateUserArgs {
    #[arg(long)]
    pub email: String,

    #[arg(long)]
    pub password: String,

    #[arg(long)]
    pub name: String,

    /// USER, EDITOR, MODERATOR or ADMIN
    #[arg(long, default_value = "USER")]
    pub role: String,
}

pub async fn handle_create(
    db: &PgDatabase,
    args: CreateUserArgs,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let email = normalize_email(&args.email);
    if !is_valid_email(&email) {
        bail!("invalid email address: {}", args.email);
    }
    if args.password.chars().count() < DEFAULT_PASSWORD_MIN_LENGTH {
        bail!(
            "password must be at least {} characters",
            DEFAULT_PASSWORD_MIN_LENGTH
        );
    }
    let role = Role::parse(&args.role).ok_or_else(|| anyhow!("unknown role: {}", args.role))?;

    let user = db
        .create_user(NewUser {
            email: email.clone(),
            password_hash: hash_password(&args.password)?,
            name: args.name,
            role: role.as_str().to_string(),
        })
        .await
        .map_err(|e| match e {
            DatabaseError::Conflict(_) => anyhow!("a user with email {} already exists", email),
            other => other.into(),
        })?;

    let assignment = PermissionResolver::new(Arc::new(db.clone()))
        .assign_role_to_user(user.id, role.as_str())
        .await?;

    output_success(
        output_format,
        &format!(
            "Created {} ({}) with {} permissions",
            user.email,
            role,
            assignment.permissions.len()
        ),
        Some(json!({
            "id": user.id,
            "email": user.email,
            "role": role.as_str(),
        })),
    )
}
