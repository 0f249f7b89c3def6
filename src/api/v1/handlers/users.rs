/*
 * Responsibility
 * - /users 系 handler
 * - users は UUID をそのまま扱う (復号化なし)
 * - プロフィール / 作成レシピ / 保存レシピはキャッシュ (UserProfile)
 */
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    api::v1::{
        dto::{
            recipes::RecipeResponse,
            users::{CreateUserRequest, UpdateUserRequest, UserResponse},
        },
        extractors::AuthCtxExtractor,
    },
    error::AppError,
    repos::{error::RepoError, recipe_repo, user_repo},
    services::{
        cache::{ResourceClass, keys},
        invalidation::Mutation,
    },
    state::AppState,
};

fn name_taken(e: RepoError) -> AppError {
    match e {
        RepoError::Conflict => AppError::conflict("USER_NAME_TAKEN", "user_name is already taken"),
        other => other.into(),
    }
}

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    req.validate().map_err(AppError::validation)?;

    let row = user_repo::create(
        &state.db,
        req.user_name.trim(),
        req.bio.as_deref(),
        req.profile_picture.as_deref(),
    )
    .await
    .map_err(name_taken)?;

    Ok((StatusCode::CREATED, Json(row.into())))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    let res = state
        .cache
        .get_or_compute(&keys::user_profile(user_id), ResourceClass::UserProfile, || async {
            let row = user_repo::get(&state.db, user_id)
                .await?
                .ok_or(AppError::not_found("user"))?;
            Ok::<_, AppError>(UserResponse::from(row))
        })
        .await?;

    Ok(Json(res))
}

pub async fn update_user(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, AppError> {
    if !ctx.owns(user_id) {
        return Err(AppError::Forbidden);
    }
    req.validate().map_err(AppError::validation)?;

    // bio / profile_picture tri-state:
    // - None: do not update
    // - Some(None): set NULL
    // - Some(Some(v)): set v
    let bio: Option<Option<&str>> = req.bio.as_ref().map(|inner| inner.as_deref());
    let picture: Option<Option<&str>> = req.profile_picture.as_ref().map(|inner| inner.as_deref());

    let row = user_repo::update(
        &state.db,
        user_id,
        req.user_name.as_deref().map(str::trim),
        bio,
        picture,
    )
    .await
    .map_err(name_taken)?
    .ok_or(AppError::not_found("user"))?;

    state
        .invalidator
        .invalidate(&Mutation::UserProfile { user_id })
        .await;

    Ok(Json(row.into()))
}

pub async fn created_recipes(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<RecipeResponse>>, AppError> {
    let res = state
        .cache
        .get_or_compute(&keys::user_created(user_id), ResourceClass::UserProfile, || async {
            if !user_repo::exists(&state.db, user_id).await? {
                return Err(AppError::not_found("user"));
            }
            let rows = recipe_repo::list_by_author(&state.db, user_id).await?;
            Ok::<_, AppError>(RecipeResponse::from_rows(rows, &state.id_codec)?)
        })
        .await?;

    Ok(Json(res))
}

// Bookmarks are private to their owner.
pub async fn saved_recipes(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<RecipeResponse>>, AppError> {
    if !ctx.owns(user_id) {
        return Err(AppError::Forbidden);
    }

    let res = state
        .cache
        .get_or_compute(&keys::user_saved(user_id), ResourceClass::UserProfile, || async {
            let rows = recipe_repo::list_saved_by(&state.db, user_id).await?;
            Ok::<_, AppError>(RecipeResponse::from_rows(rows, &state.id_codec)?)
        })
        .await?;

    Ok(Json(res))
}
