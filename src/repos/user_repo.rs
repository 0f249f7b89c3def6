/*
 * Responsibility
 * - users テーブル向け SQLx 操作
 * - PgPool を受け取り CRUD を提供
 * - DB エラーは RepoError/AppError に変換しやすい形で返す
 */
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repos::error::RepoError;

#[derive(Debug, FromRow)]
pub struct UserRow {
    #[sqlx(rename = "user_id")]
    pub id: Uuid,
    pub user_name: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub async fn create(
    db: &PgPool,
    user_name: &str,
    bio: Option<&str>,
    profile_picture: Option<&str>,
) -> Result<UserRow, RepoError> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        INSERT INTO users (user_name, bio, profile_picture)
        VALUES ($1, $2, $3)
        RETURNING user_id, user_name, bio, profile_picture, created_at
        "#,
    )
    .bind(user_name)
    .bind(bio)
    .bind(profile_picture)
    .fetch_one(db)
    .await
    // user_name is unique
    .map_err(RepoError::from_sqlx)?;

    Ok(row)
}

pub async fn get(db: &PgPool, user_id: Uuid) -> Result<Option<UserRow>, RepoError> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT user_id, user_name, bio, profile_picture, created_at
        FROM users
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    Ok(row)
}

pub async fn update(
    db: &PgPool,
    user_id: Uuid,
    user_name: Option<&str>,
    bio: Option<Option<&str>>,
    profile_picture: Option<Option<&str>>,
) -> Result<Option<UserRow>, RepoError> {
    // bio / profile_picture:
    // Some(Some(v)) -> set to v
    // Some(None)    -> set to NULL
    // None          -> do not update
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        UPDATE users
        SET
            user_name = COALESCE($2, user_name),
            bio = CASE
                WHEN $3 = false THEN bio
                ELSE $4
            END,
            profile_picture = CASE
                WHEN $5 = false THEN profile_picture
                ELSE $6
            END,
            updated_at = now()
        WHERE user_id = $1
        RETURNING user_id, user_name, bio, profile_picture, created_at
        "#,
    )
    .bind(user_id)
    .bind(user_name)
    .bind(bio.is_some()) // $3: flag to set bio
    .bind(bio.flatten()) // $4: new bio value
    .bind(profile_picture.is_some()) // $5: flag to set profile_picture
    .bind(profile_picture.flatten()) // $6: new profile_picture value
    .fetch_optional(db)
    .await
    .map_err(RepoError::from_sqlx)?;

    Ok(row)
}

pub async fn exists(db: &PgPool, user_id: Uuid) -> Result<bool, RepoError> {
    let found = sqlx::query_scalar::<_, bool>(
        r#"
        SELECT EXISTS (SELECT 1 FROM users WHERE user_id = $1)
        "#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;

    Ok(found)
}
