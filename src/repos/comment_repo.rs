/*
 * Responsibility
 * - comments テーブル向け SQLx 操作
 * - 一覧はトップレベルのみ (返信は parent_id で紐づく)
 * - いいね数は comment_likes から毎回数える
 */
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult};

#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    pub id: i64,
    pub recipe_id: i64,
    pub author_id: Uuid,
    pub parent_id: Option<i64>,
    pub content: String,
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub likes: i64,
}

pub async fn list_top_level(
    db: &PgPool,
    recipe_id: i64,
    limit: i64,
    offset: i64,
) -> RepoResult<Vec<CommentRow>> {
    let rows = sqlx::query_as::<_, CommentRow>(
        r#"
        SELECT c.id, c.recipe_id, c.author_id, c.parent_id, c.content, c.is_edited,
               c.created_at, c.updated_at,
               (SELECT COUNT(*) FROM comment_likes l WHERE l.comment_id = c.id) AS likes
        FROM comments c
        WHERE c.recipe_id = $1 AND c.parent_id IS NULL
        ORDER BY c.created_at DESC, c.id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(recipe_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

pub async fn count_top_level(db: &PgPool, recipe_id: i64) -> RepoResult<i64> {
    let n = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM comments
        WHERE recipe_id = $1 AND parent_id IS NULL
        "#,
    )
    .bind(recipe_id)
    .fetch_one(db)
    .await?;

    Ok(n)
}

pub async fn create(
    db: &PgPool,
    recipe_id: i64,
    author_id: Uuid,
    parent_id: Option<i64>,
    content: &str,
) -> RepoResult<CommentRow> {
    let row = sqlx::query_as::<_, CommentRow>(
        r#"
        INSERT INTO comments (recipe_id, author_id, parent_id, content)
        VALUES ($1, $2, $3, $4)
        RETURNING id, recipe_id, author_id, parent_id, content, is_edited, created_at, updated_at,
                  0::BIGINT AS likes
        "#,
    )
    .bind(recipe_id)
    .bind(author_id)
    .bind(parent_id)
    .bind(content)
    .fetch_one(db)
    .await?;

    Ok(row)
}

pub async fn get(db: &PgPool, id: i64) -> RepoResult<Option<CommentRow>> {
    let row = sqlx::query_as::<_, CommentRow>(
        r#"
        SELECT c.id, c.recipe_id, c.author_id, c.parent_id, c.content, c.is_edited,
               c.created_at, c.updated_at,
               (SELECT COUNT(*) FROM comment_likes l WHERE l.comment_id = c.id) AS likes
        FROM comments c
        WHERE c.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    Ok(row)
}

pub async fn update(db: &PgPool, id: i64, content: &str) -> RepoResult<Option<CommentRow>> {
    let row = sqlx::query_as::<_, CommentRow>(
        r#"
        UPDATE comments c
        SET content = $2, is_edited = true, updated_at = now()
        WHERE c.id = $1
        RETURNING c.id, c.recipe_id, c.author_id, c.parent_id, c.content, c.is_edited,
                  c.created_at, c.updated_at,
                  (SELECT COUNT(*) FROM comment_likes l WHERE l.comment_id = c.id) AS likes
        "#,
    )
    .bind(id)
    .bind(content)
    .fetch_optional(db)
    .await?;

    Ok(row)
}

pub async fn delete(db: &PgPool, id: i64) -> RepoResult<Option<CommentRow>> {
    let row = sqlx::query_as::<_, CommentRow>(
        r#"
        DELETE FROM comments
        WHERE id = $1
        RETURNING id, recipe_id, author_id, parent_id, content, is_edited, created_at, updated_at,
                  0::BIGINT AS likes
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    Ok(row)
}

/// Flip a user's like on a comment. Returns whether it is liked afterwards and the new count.
pub async fn toggle_like(db: &PgPool, comment_id: i64, user_id: Uuid) -> RepoResult<(bool, i64)> {
    let mut tx = db.begin().await?;

    let removed = sqlx::query(
        r#"
        DELETE FROM comment_likes
        WHERE comment_id = $1 AND user_id = $2
        "#,
    )
    .bind(comment_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if removed == 0 {
        sqlx::query(
            r#"
            INSERT INTO comment_likes (comment_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(comment_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(RepoError::from_sqlx)?;
    }

    let likes = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM comment_likes WHERE comment_id = $1
        "#,
    )
    .bind(comment_id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((removed == 0, likes))
}
