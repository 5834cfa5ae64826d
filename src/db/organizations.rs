use crate::db::{models::*, DbPool};
use crate::error::{Error, Result};
use crate::utils;

/// Create an organization and enrol its owner as an active member
pub async fn create_organization(pool: &DbPool, name: &str, owner_id: &str) -> Result<Organization> {
    let now = utils::now();
    let mut tx = pool.begin().await?;

    let organization = sqlx::query_as::<_, Organization>(
        "INSERT INTO organizations (name, owner_id, created_at) VALUES (?, ?, ?) RETURNING *",
    )
    .bind(name)
    .bind(owner_id)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO organization_members (organization_id, user_id, role, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(organization.id)
    .bind(owner_id)
    .bind(ORG_ROLE_OWNER)
    .bind(MEMBER_ACTIVE)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(organization)
}

/// Organizations the user is an active member of
pub async fn list_organizations_for_user(pool: &DbPool, user_id: &str) -> Result<Vec<Organization>> {
    let organizations = sqlx::query_as::<_, Organization>(
        r#"
        SELECT o.*
        FROM organizations o
        JOIN organization_members m ON m.organization_id = o.id
        WHERE m.user_id = ? AND m.status = ?
        ORDER BY o.created_at DESC, o.id DESC
        "#,
    )
    .bind(user_id)
    .bind(MEMBER_ACTIVE)
    .fetch_all(pool)
    .await?;

    Ok(organizations)
}

/// The user's membership row in an organization, whatever its status
pub async fn get_membership(
    pool: &DbPool,
    organization_id: i64,
    user_id: &str,
) -> Result<Option<OrganizationMember>> {
    let member = sqlx::query_as::<_, OrganizationMember>(
        "SELECT * FROM organization_members WHERE organization_id = ? AND user_id = ?",
    )
    .bind(organization_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(member)
}

pub async fn list_members(pool: &DbPool, organization_id: i64) -> Result<Vec<MemberWithEmail>> {
    let members = sqlx::query_as::<_, MemberWithEmail>(
        r#"
        SELECT m.id, m.organization_id, m.user_id, p.email, m.role, m.status,
               m.created_at, m.updated_at
        FROM organization_members m
        JOIN profiles p ON p.id = m.user_id
        WHERE m.organization_id = ?
        ORDER BY m.created_at, m.id
        "#,
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    Ok(members)
}

/// Add a member, or reactivate them with the new role if they were
/// previously deactivated
pub async fn add_member(
    pool: &DbPool,
    organization_id: i64,
    user_id: &str,
    role: &str,
) -> Result<OrganizationMember> {
    if role == ORG_ROLE_OWNER {
        return Err(Error::Validation(
            "An organization has exactly one owner".to_string(),
        ));
    }

    let now = utils::now();
    let member = sqlx::query_as::<_, OrganizationMember>(
        r#"
        INSERT INTO organization_members (organization_id, user_id, role, status, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(organization_id, user_id) DO UPDATE SET
            role = excluded.role,
            status = excluded.status,
            updated_at = excluded.updated_at
        WHERE organization_members.role != 'owner'
        RETURNING *
        "#,
    )
    .bind(organization_id)
    .bind(user_id)
    .bind(role)
    .bind(MEMBER_ACTIVE)
    .bind(now)
    .bind(now)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::Validation("The owner's membership cannot be changed".to_string()))?;

    Ok(member)
}

/// Soft-deactivate a member. Rows are never deleted.
pub async fn deactivate_member(
    pool: &DbPool,
    organization_id: i64,
    member_id: i64,
) -> Result<OrganizationMember> {
    let existing = sqlx::query_as::<_, OrganizationMember>(
        "SELECT * FROM organization_members WHERE id = ? AND organization_id = ?",
    )
    .bind(member_id)
    .bind(organization_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| Error::NotFound(format!("Member {member_id} not found")))?;

    if existing.role == ORG_ROLE_OWNER {
        return Err(Error::Validation(
            "The organization owner cannot be deactivated".to_string(),
        ));
    }

    let member = sqlx::query_as::<_, OrganizationMember>(
        r#"
        UPDATE organization_members
        SET status = ?, updated_at = ?
        WHERE id = ?
        RETURNING *
        "#,
    )
    .bind(MEMBER_INACTIVE)
    .bind(utils::now())
    .bind(member_id)
    .fetch_one(pool)
    .await?;

    Ok(member)
}
