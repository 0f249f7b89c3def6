/*
 * Responsibility
 * - /recipes 系 handler (一覧 / 最新 / 検索 / 詳細 / CRUD / like / save)
 * - 読み取りは cache.get_or_compute (エンドポイントごとの ResourceClass)
 * - 書き込みは DB 更新 → invalidator.invalidate → レスポンス の順
 * - like は LikeQueue 経由 (DB を直接触らない)
 */
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};

use crate::{
    api::v1::{
        dto::recipes::{
            CreateRecipeRequest, LatestQuery, LikeCountResponse, LikeCountsQuery,
            LikeStatusResponse, ListRecipesQuery, RecipeListResponse, RecipeResponse, SearchQuery, ToggleLikeResponse,
            ToggleSaveResponse, UpdateRecipeRequest,
        },
        extractors::{AuthCtxExtractor, MaybeAuthCtx, PublicRecipeId},
    },
    error::AppError,
    repos::{
        recipe_repo::{self, NewRecipe, RecipeChanges},
        user_repo,
    },
    services::{
        cache::{ResourceClass, keys},
        invalidation::{Mutation, MutationKind},
    },
    state::AppState,
};

/// Recipe detail through the cache. Shared by every handler that needs "does it exist".
pub(crate) async fn load_recipe(state: &AppState, recipe_id: i64) -> Result<RecipeResponse, AppError> {
    state
        .cache
        .get_or_compute(&keys::recipe(recipe_id), ResourceClass::RecipeDetail, || async {
            let row = recipe_repo::get(&state.db, recipe_id)
                .await?
                .ok_or(AppError::not_found("recipe"))?;
            Ok::<_, AppError>(RecipeResponse::from_row(row, &state.id_codec)?)
        })
        .await
}

pub async fn list_recipes(
    State(state): State<AppState>,
    Query(q): Query<ListRecipesQuery>,
) -> Result<Json<RecipeListResponse>, AppError> {
    let (page, category) = q
        .normalize()
        .map_err(|m| AppError::bad_request("INVALID_CATEGORY", m))?;

    let (key, class) = match category {
        Some(c) => (keys::category(c, &page.params()), ResourceClass::CategoryList),
        None => (keys::recipe_list(&page.params()), ResourceClass::RecipeList),
    };

    let res = state
        .cache
        .get_or_compute(&key, class, || async {
            let rows = recipe_repo::list(&state.db, category, page.limit, page.offset()).await?;
            let total = recipe_repo::count(&state.db, category).await?;
            Ok::<_, AppError>(RecipeListResponse {
                items: RecipeResponse::from_rows(rows, &state.id_codec)?,
                page: page.page,
                limit: page.limit,
                total,
                total_pages: page.total_pages(total),
            })
        })
        .await?;

    Ok(Json(res))
}

pub async fn latest_recipes(
    State(state): State<AppState>,
    Query(q): Query<LatestQuery>,
) -> Result<Json<Vec<RecipeResponse>>, AppError> {
    let limit = q.limit();
    let key = keys::latest(&keys::Params::new().with("limit", limit));

    let res = state
        .cache
        .get_or_compute(&key, ResourceClass::LatestRecipes, || async {
            let rows = recipe_repo::latest(&state.db, limit).await?;
            Ok::<_, AppError>(RecipeResponse::from_rows(rows, &state.id_codec)?)
        })
        .await?;

    Ok(Json(res))
}

pub async fn search_recipes(
    State(state): State<AppState>,
    Query(q): Query<SearchQuery>,
) -> Result<Json<Vec<RecipeResponse>>, AppError> {
    let (term, limit) = q.normalize().map_err(AppError::validation)?;
    let key = keys::search(&term, &keys::Params::new().with("limit", limit));

    let res = state
        .cache
        .get_or_compute(&key, ResourceClass::SearchResults, || async {
            let rows = recipe_repo::search(&state.db, &term, limit).await?;
            Ok::<_, AppError>(RecipeResponse::from_rows(rows, &state.id_codec)?)
        })
        .await?;

    Ok(Json(res))
}

pub async fn get_recipe(
    State(state): State<AppState>,
    recipe_id: PublicRecipeId,
) -> Result<Json<RecipeResponse>, AppError> {
    Ok(Json(load_recipe(&state, recipe_id.id).await?))
}

pub async fn create_recipe(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Json(req): Json<CreateRecipeRequest>,
) -> Result<(StatusCode, Json<RecipeResponse>), AppError> {
    req.validate().map_err(AppError::validation)?;

    if !user_repo::exists(&state.db, ctx.user_id).await? {
        return Err(AppError::not_found("user"));
    }
    let template_id = req
        .template_id
        .as_deref()
        .map(|t| state.id_codec.decode(t))
        .transpose()?;

    let row = recipe_repo::create(
        &state.db,
        &NewRecipe {
            title: req.title.trim(),
            description: req.description.as_deref(),
            ingredients: &req.ingredients,
            directions: &req.directions,
            cooking_time: req.cooking_time,
            category: req.category,
            template_id,
            author_id: ctx.user_id,
        },
    )
    .await?;

    state
        .invalidator
        .invalidate(&Mutation::Recipe {
            kind: MutationKind::Create,
            recipe_id: row.id,
            author_id: row.author_id,
            categories: row.category().into_iter().collect(),
        })
        .await;

    Ok((
        StatusCode::CREATED,
        Json(RecipeResponse::from_row(row, &state.id_codec)?),
    ))
}

pub async fn update_recipe(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    recipe_id: PublicRecipeId,
    Json(req): Json<UpdateRecipeRequest>,
) -> Result<Json<RecipeResponse>, AppError> {
    req.validate().map_err(AppError::validation)?;

    // Ownership and the old category come from the database, not the cache.
    let before = recipe_repo::get(&state.db, recipe_id.id)
        .await?
        .ok_or(AppError::not_found("recipe"))?;
    if !ctx.owns(before.author_id) {
        return Err(AppError::Forbidden);
    }

    let row = recipe_repo::update(
        &state.db,
        recipe_id.id,
        &RecipeChanges {
            title: req.title.as_deref().map(str::trim),
            description: req.description.as_deref(),
            ingredients: req.ingredients.as_deref(),
            directions: req.directions.as_deref(),
            cooking_time: req.cooking_time,
            category: req.category,
        },
    )
    .await?
    .ok_or(AppError::not_found("recipe"))?;

    let mut categories: Vec<_> = before.category().into_iter().collect();
    categories.extend(row.category());
    state
        .invalidator
        .invalidate(&Mutation::Recipe {
            kind: MutationKind::Update,
            recipe_id: row.id,
            author_id: row.author_id,
            categories,
        })
        .await;

    Ok(Json(RecipeResponse::from_row(row, &state.id_codec)?))
}

pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    recipe_id: PublicRecipeId,
) -> Result<StatusCode, AppError> {
    let existing = recipe_repo::get(&state.db, recipe_id.id)
        .await?
        .ok_or(AppError::not_found("recipe"))?;
    if !ctx.owns(existing.author_id) {
        return Err(AppError::Forbidden);
    }

    let row = recipe_repo::delete(&state.db, recipe_id.id)
        .await?
        .ok_or(AppError::not_found("recipe"))?;

    state
        .invalidator
        .invalidate(&Mutation::Recipe {
            kind: MutationKind::Delete,
            recipe_id: row.id,
            author_id: row.author_id,
            categories: row.category().into_iter().collect(),
        })
        .await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn toggle_like(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    recipe_id: PublicRecipeId,
) -> Result<Json<ToggleLikeResponse>, AppError> {
    load_recipe(&state, recipe_id.id).await?;

    let outcome = state.likes.toggle_like(recipe_id.id, ctx.user_id).await?;

    Ok(Json(ToggleLikeResponse {
        liked: outcome.liked,
        likes: outcome.likes,
    }))
}

pub async fn like_status(
    State(state): State<AppState>,
    MaybeAuthCtx(ctx): MaybeAuthCtx,
    recipe_id: PublicRecipeId,
) -> Result<Json<LikeStatusResponse>, AppError> {
    load_recipe(&state, recipe_id.id).await?;

    let res = match ctx {
        Some(c) => {
            let likers = state.likes.current_like_set(recipe_id.id).await?;
            LikeStatusResponse {
                likes: likers.len(),
                liked: Some(likers.contains(&c.user_id)),
            }
        }
        None => LikeStatusResponse {
            likes: state.likes.current_like_count(recipe_id.id).await?,
            liked: None,
        },
    };

    Ok(Json(res))
}

/// Counts for a page of recipe cards. Unknown recipes report 0.
pub async fn like_counts(
    State(state): State<AppState>,
    Query(q): Query<LikeCountsQuery>,
) -> Result<Json<Vec<LikeCountResponse>>, AppError> {
    let public = q.public_ids().map_err(AppError::validation)?;
    let ids = public
        .iter()
        .map(|p| state.id_codec.decode(p))
        .collect::<Result<Vec<_>, _>>()?;

    let counts = state.likes.current_like_counts(&ids).await?;

    Ok(Json(
        public
            .into_iter()
            .zip(counts)
            .map(|(id, likes)| LikeCountResponse {
                id: id.to_string(),
                likes,
            })
            .collect(),
    ))
}

pub async fn toggle_save(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    recipe_id: PublicRecipeId,
) -> Result<Json<ToggleSaveResponse>, AppError> {
    load_recipe(&state, recipe_id.id).await?;
    if !user_repo::exists(&state.db, ctx.user_id).await? {
        return Err(AppError::not_found("user"));
    }

    let saved = recipe_repo::toggle_saved(&state.db, ctx.user_id, recipe_id.id).await?;

    state
        .invalidator
        .invalidate(&Mutation::SavedRecipes {
            user_id: ctx.user_id,
        })
        .await;

    Ok(Json(ToggleSaveResponse { saved }))
}
