//! Role, capability and assignment queries.

use sqlx::PgConnection;
use std::collections::BTreeSet;

use crate::{
    models::role::{Role, UserRoleAssignment},
    types::{RoleId, UserId},
};

const ROLE_COLUMNS: &str = "id, name, display_name, description, is_system, created_at, updated_at";
const ASSIGNMENT_COLUMNS: &str = "user_id, role_id, expires_at, assigned_by, created_at";

pub async fn fetch_role(conn: &mut PgConnection, id: RoleId) -> Result<Option<Role>, sqlx::Error> {
    let query = format!("SELECT {} FROM roles WHERE id = $1 FOR UPDATE", ROLE_COLUMNS);
    sqlx::query_as::<_, Role>(&query)
        .bind(id)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_role_by_name(
    conn: &mut PgConnection,
    name: &str,
) -> Result<Option<Role>, sqlx::Error> {
    let query = format!("SELECT {} FROM roles WHERE name = $1", ROLE_COLUMNS);
    sqlx::query_as::<_, Role>(&query)
        .bind(name)
        .fetch_optional(conn)
        .await
}

pub async fn insert_role(conn: &mut PgConnection, role: &Role) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO roles \
         (id, name, display_name, description, is_system, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(role.id)
    .bind(&role.name)
    .bind(&role.display_name)
    .bind(&role.description)
    .bind(role.is_system)
    .bind(role.created_at)
    .bind(role.updated_at)
    .execute(conn)
    .await
    .map(|_| ())
}

pub async fn update_role(conn: &mut PgConnection, role: &Role) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE roles SET name = $2, display_name = $3, description = $4, updated_at = $5 \
         WHERE id = $1",
    )
    .bind(role.id)
    .bind(&role.name)
    .bind(&role.display_name)
    .bind(&role.description)
    .bind(role.updated_at)
    .execute(conn)
    .await
    .map(|_| ())
}

pub async fn delete_role(conn: &mut PgConnection, id: RoleId) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM role_capabilities WHERE role_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM user_roles WHERE role_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM roles WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await
        .map(|_| ())
}

pub async fn fetch_role_capabilities(
    conn: &mut PgConnection,
    id: RoleId,
) -> Result<BTreeSet<String>, sqlx::Error> {
    let names: Vec<String> = sqlx::query_scalar(
        "SELECT capability_name FROM role_capabilities WHERE role_id = $1",
    )
    .bind(id)
    .fetch_all(conn)
    .await?;
    Ok(names.into_iter().collect())
}

pub async fn replace_role_capabilities(
    conn: &mut PgConnection,
    id: RoleId,
    capabilities: &BTreeSet<String>,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM role_capabilities WHERE role_id = $1")
        .bind(id)
        .execute(&mut *conn)
        .await?;
    for capability in capabilities {
        sqlx::query("INSERT INTO role_capabilities (role_id, capability_name) VALUES ($1, $2)")
            .bind(id)
            .bind(capability)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

pub async fn existing_capabilities(
    conn: &mut PgConnection,
    names: &BTreeSet<String>,
) -> Result<BTreeSet<String>, sqlx::Error> {
    let requested: Vec<String> = names.iter().cloned().collect();
    let found: Vec<String> =
        sqlx::query_scalar("SELECT name FROM capabilities WHERE name = ANY($1)")
            .bind(requested)
            .fetch_all(conn)
            .await?;
    Ok(found.into_iter().collect())
}

pub async fn list_role_assignments(
    conn: &mut PgConnection,
    role_id: RoleId,
) -> Result<Vec<UserRoleAssignment>, sqlx::Error> {
    let query = format!(
        "SELECT {} FROM user_roles WHERE role_id = $1",
        ASSIGNMENT_COLUMNS
    );
    sqlx::query_as::<_, UserRoleAssignment>(&query)
        .bind(role_id)
        .fetch_all(conn)
        .await
}

pub async fn fetch_assignment(
    conn: &mut PgConnection,
    user_id: UserId,
    role_id: RoleId,
) -> Result<Option<UserRoleAssignment>, sqlx::Error> {
    let query = format!(
        "SELECT {} FROM user_roles WHERE user_id = $1 AND role_id = $2",
        ASSIGNMENT_COLUMNS
    );
    sqlx::query_as::<_, UserRoleAssignment>(&query)
        .bind(user_id)
        .bind(role_id)
        .fetch_optional(conn)
        .await
}

pub async fn upsert_assignment(
    conn: &mut PgConnection,
    assignment: &UserRoleAssignment,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO user_roles (user_id, role_id, expires_at, assigned_by, created_at) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (user_id, role_id) DO UPDATE \
         SET expires_at = EXCLUDED.expires_at, assigned_by = EXCLUDED.assigned_by",
    )
    .bind(assignment.user_id)
    .bind(assignment.role_id)
    .bind(assignment.expires_at)
    .bind(&assignment.assigned_by)
    .bind(assignment.created_at)
    .execute(conn)
    .await
    .map(|_| ())
}

pub async fn delete_assignment(
    conn: &mut PgConnection,
    user_id: UserId,
    role_id: RoleId,
) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
        .bind(user_id)
        .bind(role_id)
        .execute(conn)
        .await
        .map(|_| ())
}
