/*
 * Responsibility
 * - recipes / saved_recipes テーブル向け SQLx 操作
 * - キャッシュは知らない (呼び出し側の handler が get_or_compute / invalidate を使う)
 */
use chrono::{DateTime, Utc};
use sqlx::{PgPool, types::Json};
use uuid::Uuid;

use crate::domain::{
    Category,
    recipe::{CookingTime, Direction, Ingredient},
};
use crate::repos::error::{RepoError, RepoResult};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecipeRow {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub ingredients: Json<Vec<Ingredient>>,
    pub directions: Json<Vec<Direction>>,
    pub prep_minutes: Option<i32>,
    pub cook_minutes: Option<i32>,
    pub category: Option<String>,
    pub template_id: Option<i64>,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecipeRow {
    // Rows written before a category was renamed read as uncategorized.
    pub fn category(&self) -> Option<Category> {
        self.category.as_deref().and_then(|c| c.parse().ok())
    }
}

#[derive(Debug)]
pub struct NewRecipe<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub ingredients: &'a [Ingredient],
    pub directions: &'a [Direction],
    pub cooking_time: CookingTime,
    pub category: Option<Category>,
    pub template_id: Option<i64>,
    pub author_id: Uuid,
}

/// Partial update: `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct RecipeChanges<'a> {
    pub title: Option<&'a str>,
    pub description: Option<&'a str>,
    pub ingredients: Option<&'a [Ingredient]>,
    pub directions: Option<&'a [Direction]>,
    pub cooking_time: Option<CookingTime>,
    pub category: Option<Category>,
}

pub async fn list(
    db: &PgPool,
    category: Option<Category>,
    limit: i64,
    offset: i64,
) -> RepoResult<Vec<RecipeRow>> {
    let rows = sqlx::query_as::<_, RecipeRow>(
        r#"
        SELECT
            id, title, description, ingredients, directions, prep_minutes, cook_minutes,
            category, template_id, author_id, created_at, updated_at
        FROM recipes
        WHERE ($1::text IS NULL OR category = $1)
        ORDER BY created_at DESC, id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(category.map(|c| c.as_str()))
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

pub async fn count(db: &PgPool, category: Option<Category>) -> RepoResult<i64> {
    let n = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM recipes
        WHERE ($1::text IS NULL OR category = $1)
        "#,
    )
    .bind(category.map(|c| c.as_str()))
    .fetch_one(db)
    .await?;

    Ok(n)
}

pub async fn latest(db: &PgPool, limit: i64) -> RepoResult<Vec<RecipeRow>> {
    list(db, None, limit, 0).await
}

// Substring match on title/description/ingredient names. No ranking.
pub async fn search(db: &PgPool, term: &str, limit: i64) -> RepoResult<Vec<RecipeRow>> {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    let pattern = format!("%{}%", escaped.trim());

    let rows = sqlx::query_as::<_, RecipeRow>(
        r#"
        SELECT
            id, title, description, ingredients, directions, prep_minutes, cook_minutes,
            category, template_id, author_id, created_at, updated_at
        FROM recipes
        WHERE title ILIKE $1
            OR description ILIKE $1
            OR EXISTS (
                SELECT 1 FROM jsonb_array_elements(ingredients) AS i
                WHERE i->>'name' ILIKE $1
            )
        ORDER BY created_at DESC, id DESC
        LIMIT $2
        "#,
    )
    .bind(pattern)
    .bind(limit)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

pub async fn get(db: &PgPool, id: i64) -> RepoResult<Option<RecipeRow>> {
    let row = sqlx::query_as::<_, RecipeRow>(
        r#"
        SELECT
            id, title, description, ingredients, directions, prep_minutes, cook_minutes,
            category, template_id, author_id, created_at, updated_at
        FROM recipes
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    Ok(row)
}

pub async fn list_by_author(db: &PgPool, author_id: Uuid) -> RepoResult<Vec<RecipeRow>> {
    let rows = sqlx::query_as::<_, RecipeRow>(
        r#"
        SELECT
            id, title, description, ingredients, directions, prep_minutes, cook_minutes,
            category, template_id, author_id, created_at, updated_at
        FROM recipes
        WHERE author_id = $1
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(author_id)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

pub async fn list_saved_by(db: &PgPool, user_id: Uuid) -> RepoResult<Vec<RecipeRow>> {
    let rows = sqlx::query_as::<_, RecipeRow>(
        r#"
        SELECT
            r.id, r.title, r.description, r.ingredients, r.directions, r.prep_minutes,
            r.cook_minutes, r.category, r.template_id, r.author_id, r.created_at, r.updated_at
        FROM saved_recipes s
        JOIN recipes r ON r.id = s.recipe_id
        WHERE s.user_id = $1
        ORDER BY r.created_at DESC, r.id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    Ok(rows)
}

pub async fn create(db: &PgPool, new: &NewRecipe<'_>) -> RepoResult<RecipeRow> {
    let row = sqlx::query_as::<_, RecipeRow>(
        r#"
        INSERT INTO recipes (
            title, description, ingredients, directions, prep_minutes, cook_minutes,
            category, template_id, author_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING
            id, title, description, ingredients, directions, prep_minutes, cook_minutes,
            category, template_id, author_id, created_at, updated_at
        "#,
    )
    .bind(new.title)
    .bind(new.description)
    .bind(Json(new.ingredients))
    .bind(Json(new.directions))
    .bind(new.cooking_time.prep)
    .bind(new.cooking_time.cook)
    .bind(new.category.map(|c| c.as_str()))
    .bind(new.template_id)
    .bind(new.author_id)
    .fetch_one(db)
    .await?;

    Ok(row)
}

pub async fn update(
    db: &PgPool,
    id: i64,
    changes: &RecipeChanges<'_>,
) -> RepoResult<Option<RecipeRow>> {
    let row = sqlx::query_as::<_, RecipeRow>(
        r#"
        UPDATE recipes
        SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            ingredients = COALESCE($4, ingredients),
            directions = COALESCE($5, directions),
            prep_minutes = CASE WHEN $6 THEN $7 ELSE prep_minutes END,
            cook_minutes = CASE WHEN $6 THEN $8 ELSE cook_minutes END,
            category = COALESCE($9, category),
            updated_at = now()
        WHERE id = $1
        RETURNING
            id, title, description, ingredients, directions, prep_minutes, cook_minutes,
            category, template_id, author_id, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(changes.title)
    .bind(changes.description)
    .bind(changes.ingredients.map(Json))
    .bind(changes.directions.map(Json))
    .bind(changes.cooking_time.is_some()) // $6: flag to set cooking time
    .bind(changes.cooking_time.and_then(|t| t.prep))
    .bind(changes.cooking_time.and_then(|t| t.cook))
    .bind(changes.category.map(|c| c.as_str()))
    .fetch_optional(db)
    .await?;

    Ok(row)
}

// Returns the deleted row so the caller can invalidate by its category/author.
pub async fn delete(db: &PgPool, id: i64) -> RepoResult<Option<RecipeRow>> {
    let row = sqlx::query_as::<_, RecipeRow>(
        r#"
        DELETE FROM recipes
        WHERE id = $1
        RETURNING
            id, title, description, ingredients, directions, prep_minutes, cook_minutes,
            category, template_id, author_id, created_at, updated_at
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;

    Ok(row)
}

/// Flip a user's bookmark on a recipe. Returns whether the recipe is saved afterwards.
pub async fn toggle_saved(db: &PgPool, user_id: Uuid, recipe_id: i64) -> RepoResult<bool> {
    let mut tx = db.begin().await?;

    let removed = sqlx::query(
        r#"
        DELETE FROM saved_recipes
        WHERE user_id = $1 AND recipe_id = $2
        "#,
    )
    .bind(user_id)
    .bind(recipe_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if removed == 0 {
        sqlx::query(
            r#"
            INSERT INTO saved_recipes (user_id, recipe_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(recipe_id)
        .execute(&mut *tx)
        .await
        .map_err(RepoError::from_sqlx)?;
    }

    tx.commit().await?;
    Ok(removed == 0)
}
