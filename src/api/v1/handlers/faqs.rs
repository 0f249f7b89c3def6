/*
 * Responsibility
 * - /recipes/{id}/faqs と /faqs/{id} の handler
 * - 一覧は faqs:{recipe_id} にキャッシュ、書き込みで Mutation::Faqs を流す
 * - 書き込めるのはレシピの作者のみ
 */
use axum::{Json, extract::State, http::StatusCode};

use crate::{
    api::v1::{
        dto::faqs::{CreateFaqRequest, FaqResponse, UpdateFaqRequest},
        extractors::{AuthCtxExtractor, PublicFaqId, PublicRecipeId},
        handlers::recipes::load_recipe,
    },
    error::AppError,
    repos::{
        faq_repo::{self, FaqRow},
        recipe_repo,
    },
    services::{
        cache::{ResourceClass, keys},
        invalidation::Mutation,
    },
    state::AppState,
};

// Reads the recipe row, not the cached detail.
async fn require_recipe_author(
    state: &AppState,
    recipe_id: i64,
    user_id: uuid::Uuid,
) -> Result<(), AppError> {
    let recipe = recipe_repo::get(&state.db, recipe_id)
        .await?
        .ok_or(AppError::not_found("recipe"))?;
    if recipe.author_id != user_id {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

async fn owned_faq(state: &AppState, faq_id: i64, user_id: uuid::Uuid) -> Result<FaqRow, AppError> {
    let row = faq_repo::get(&state.db, faq_id)
        .await?
        .ok_or(AppError::not_found("faq"))?;
    require_recipe_author(state, row.recipe_id, user_id).await?;
    Ok(row)
}

async fn invalidate(state: &AppState, recipe_id: i64) {
    state
        .invalidator
        .invalidate(&Mutation::Faqs { recipe_id })
        .await;
}

pub async fn list_faqs(
    State(state): State<AppState>,
    recipe_id: PublicRecipeId,
) -> Result<Json<Vec<FaqResponse>>, AppError> {
    load_recipe(&state, recipe_id.id).await?;

    let res = state
        .cache
        .get_or_compute(&keys::faqs(recipe_id.id), ResourceClass::Faqs, || async {
            let rows = faq_repo::list_for_recipe(&state.db, recipe_id.id).await?;
            Ok::<_, AppError>(FaqResponse::from_rows(rows, &state.id_codec)?)
        })
        .await?;

    Ok(Json(res))
}

pub async fn create_faq(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    recipe_id: PublicRecipeId,
    Json(req): Json<CreateFaqRequest>,
) -> Result<(StatusCode, Json<FaqResponse>), AppError> {
    req.validate().map_err(AppError::validation)?;
    require_recipe_author(&state, recipe_id.id, ctx.user_id).await?;

    let row = faq_repo::create(
        &state.db,
        recipe_id.id,
        req.question.trim(),
        req.answer.trim(),
    )
    .await?;

    invalidate(&state, row.recipe_id).await;

    Ok((
        StatusCode::CREATED,
        Json(FaqResponse::from_row(row, &state.id_codec)?),
    ))
}

pub async fn update_faq(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    faq_id: PublicFaqId,
    Json(req): Json<UpdateFaqRequest>,
) -> Result<Json<FaqResponse>, AppError> {
    req.validate().map_err(AppError::validation)?;
    owned_faq(&state, faq_id.id, ctx.user_id).await?;

    let row = faq_repo::update(
        &state.db,
        faq_id.id,
        req.question.as_deref().map(str::trim),
        req.answer.as_deref().map(str::trim),
    )
    .await?
    .ok_or(AppError::not_found("faq"))?;

    invalidate(&state, row.recipe_id).await;

    Ok(Json(FaqResponse::from_row(row, &state.id_codec)?))
}

pub async fn delete_faq(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    faq_id: PublicFaqId,
) -> Result<StatusCode, AppError> {
    owned_faq(&state, faq_id.id, ctx.user_id).await?;

    let row = faq_repo::delete(&state.db, faq_id.id)
        .await?
        .ok_or(AppError::not_found("faq"))?;

    invalidate(&state, row.recipe_id).await;

    Ok(StatusCode::NO_CONTENT)
}
