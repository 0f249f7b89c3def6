/*
 * Responsibility
 * - templates テーブル向け SQLx 操作
 * - (author_id, body) の一意制約違反は RepoError::Conflict として返す
 */
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult};

#[derive(Debug, Clone, FromRow)]
pub struct TemplateRow {
    pub id: i64,
    pub body: String,
    pub author_id: Uuid,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Body,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone)]
pub struct AdminQuery<'a> {
    pub limit: i64,
    pub offset: i64,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub search: Option<&'a str>,
}

pub async fn create(
    db: &PgPool,
    author_id: Uuid,
    body: &str,
    is_public: bool,
) -> RepoResult<TemplateRow> {
    let row = sqlx::query_as::<_, TemplateRow>(
        r#"
        INSERT INTO templates (author_id, body, is_public)
        VALUES ($1, $2, $3)
        RETURNING id, body, author_id, is_public, created_at, updated_at
        "#,
    )
    .bind(author_id)
    .bind(body)
    .bind(is_public)
    .fetch_one(db)
    .await
    .map_err(RepoError::from_sqlx)?;

    Ok(row)
}

/// Insert, or return the author's existing template with the same body.
///
/// The second value is `true` when a row was inserted.
pub async fn save(db: &PgPool, author_id: Uuid, body: &str) -> RepoResult<(TemplateRow, bool)> {
    let inserted = sqlx::query_as::<_, TemplateRow>(
        r#"
        INSERT INTO templates (author_id, body)
        VALUES ($1, $2)
        ON CONFLICT (author_id, body) DO NOTHING
        RETURNING id, body, author_id, is_public, created_at, updated_at
        "#,
    )
    .bind(author_id)
    .bind(body)
    .fetch_optional(db)
    .await?;

    if let Some(row) = inserted {
        return Ok((row, true));
    }

    let existing = sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT id, body, author_id, is_public, created_at, updated_at
        FROM templates
        WHERE author_id = $1 AND body = $2
        "#,
    )
    .bind(author_id)
    .bind(body)
    .fetch_one(db)
    .await?;

    Ok((existing, false))
}

pub async fn get(db: &PgPool, id: i64) -> RepoResult<Option<TemplateRow>> {
    let row = sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT id, body, author_id, is_public, created_at, updated_at
        FROM templates
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    Ok(row)
}

pub async fn list_public(db: &PgPool) -> RepoResult<Vec<TemplateRow>> {
    let rows = sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT id, body, author_id, is_public, created_at, updated_at
        FROM templates
        WHERE is_public
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .fetch_all(db)
    .await?;

    Ok(rows)
}

pub async fn list_by_author(db: &PgPool, author_id: Uuid) -> RepoResult<Vec<TemplateRow>> {
    let rows = sqlx::query_as::<_, TemplateRow>(
        r#"
        SELECT id, body, author_id, is_public, created_at, updated_at
        FROM templates
        WHERE author_id = $1
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(author_id)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

// Sort column and direction come from closed enums, never from the request string.
fn order_clause(sort_by: SortField, order: SortOrder) -> &'static str {
    match (sort_by, order) {
        (SortField::CreatedAt, SortOrder::Asc) => "ORDER BY created_at ASC, id ASC",
        (SortField::CreatedAt, SortOrder::Desc) => "ORDER BY created_at DESC, id DESC",
        (SortField::UpdatedAt, SortOrder::Asc) => "ORDER BY updated_at ASC, id ASC",
        (SortField::UpdatedAt, SortOrder::Desc) => "ORDER BY updated_at DESC, id DESC",
        (SortField::Body, SortOrder::Asc) => "ORDER BY body ASC, id ASC",
        (SortField::Body, SortOrder::Desc) => "ORDER BY body DESC, id DESC",
    }
}

fn search_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let escaped = s
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_");
            format!("%{escaped}%")
        })
}

pub async fn admin_page(db: &PgPool, q: &AdminQuery<'_>) -> RepoResult<Vec<TemplateRow>> {
    let sql = format!(
        r#"
        SELECT id, body, author_id, is_public, created_at, updated_at
        FROM templates
        WHERE ($1::text IS NULL OR body ILIKE $1)
        {}
        LIMIT $2 OFFSET $3
        "#,
        order_clause(q.sort_by, q.sort_order)
    );

    let rows = sqlx::query_as::<_, TemplateRow>(&sql)
        .bind(search_pattern(q.search))
        .bind(q.limit)
        .bind(q.offset)
        .fetch_all(db)
        .await?;

    Ok(rows)
}

pub async fn admin_count(db: &PgPool, search: Option<&str>) -> RepoResult<i64> {
    let n = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM templates
        WHERE ($1::text IS NULL OR body ILIKE $1)
        "#,
    )
    .bind(search_pattern(search))
    .fetch_one(db)
    .await?;

    Ok(n)
}

pub async fn update(
    db: &PgPool,
    id: i64,
    body: Option<&str>,
    is_public: Option<bool>,
) -> RepoResult<Option<TemplateRow>> {
    let row = sqlx::query_as::<_, TemplateRow>(
        r#"
        UPDATE templates
        SET
            body = COALESCE($2, body),
            is_public = COALESCE($3, is_public),
            updated_at = now()
        WHERE id = $1
        RETURNING id, body, author_id, is_public, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(body)
    .bind(is_public)
    .fetch_optional(db)
    .await
    // same author already has a template with this body
    .map_err(RepoError::from_sqlx)?;

    Ok(row)
}

pub async fn delete(db: &PgPool, id: i64) -> RepoResult<Option<TemplateRow>> {
    let row = sqlx::query_as::<_, TemplateRow>(
        r#"
        DELETE FROM templates
        WHERE id = $1
        RETURNING id, body, author_id, is_public, created_at, updated_at
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_pattern_escapes_like_wildcards() {
        assert_eq!(search_pattern(Some(" 50%_off ")).as_deref(), Some(r"%50\%\_off%"));
        assert_eq!(search_pattern(Some("   ")), None);
        assert_eq!(search_pattern(None), None);
    }

    #[test]
    fn order_clause_is_stable_with_id_tiebreak() {
        assert!(order_clause(SortField::Body, SortOrder::Asc).ends_with("id ASC"));
        assert_eq!(
            order_clause(SortField::default(), SortOrder::default()),
            "ORDER BY created_at DESC, id DESC"
        );
    }
}
