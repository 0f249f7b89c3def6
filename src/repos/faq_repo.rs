/*
 * Responsibility
 * - faqs テーブル向け SQLx 操作
 * - 一覧はレシピごとに新しい順で最大 10 件
 */
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use crate::repos::error::RepoResult;

pub const LIST_LIMIT: i64 = 10;

#[derive(Debug, Clone, FromRow)]
pub struct FaqRow {
    pub id: i64,
    pub recipe_id: i64,
    pub question: String,
    pub answer: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub async fn list_for_recipe(db: &PgPool, recipe_id: i64) -> RepoResult<Vec<FaqRow>> {
    let rows = sqlx::query_as::<_, FaqRow>(
        r#"
        SELECT id, recipe_id, question, answer, created_at, updated_at
        FROM faqs
        WHERE recipe_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2
        "#,
    )
    .bind(recipe_id)
    .bind(LIST_LIMIT)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

pub async fn create(db: &PgPool, recipe_id: i64, question: &str, answer: &str) -> RepoResult<FaqRow> {
    let row = sqlx::query_as::<_, FaqRow>(
        r#"
        INSERT INTO faqs (recipe_id, question, answer)
        VALUES ($1, $2, $3)
        RETURNING id, recipe_id, question, answer, created_at, updated_at
        "#,
    )
    .bind(recipe_id)
    .bind(question)
    .bind(answer)
    .fetch_one(db)
    .await?;

    Ok(row)
}

pub async fn get(db: &PgPool, id: i64) -> RepoResult<Option<FaqRow>> {
    let row = sqlx::query_as::<_, FaqRow>(
        r#"
        SELECT id, recipe_id, question, answer, created_at, updated_at
        FROM faqs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    Ok(row)
}

// None keeps the stored value.
pub async fn update(
    db: &PgPool,
    id: i64,
    question: Option<&str>,
    answer: Option<&str>,
) -> RepoResult<Option<FaqRow>> {
    let row = sqlx::query_as::<_, FaqRow>(
        r#"
        UPDATE faqs
        SET question = COALESCE($2, question),
            answer = COALESCE($3, answer),
            updated_at = now()
        WHERE id = $1
        RETURNING id, recipe_id, question, answer, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(question)
    .bind(answer)
    .fetch_optional(db)
    .await?;

    Ok(row)
}

pub async fn delete(db: &PgPool, id: i64) -> RepoResult<Option<FaqRow>> {
    let row = sqlx::query_as::<_, FaqRow>(
        r#"
        DELETE FROM faqs
        WHERE id = $1
        RETURNING id, recipe_id, question, answer, created_at, updated_at
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    Ok(row)
}
