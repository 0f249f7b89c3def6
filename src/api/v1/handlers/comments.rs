/*
 * Responsibility
 * - /recipes/{id}/comments と /comments/{id} の handler
 * - 一覧は comments:{recipe_id}:{page,limit} にキャッシュ、書き込みで comments:{recipe_id}:* を消す
 * - コメントへのいいねは DB に直接書く (like ledger を通さない)
 */
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};

use crate::{
    api::v1::{
        dto::{
            comments::{
                CommentListResponse, CommentResponse, CreateCommentRequest, ListCommentsQuery,
                ToggleCommentLikeResponse, UpdateCommentRequest,
            },
            pagination::Page,
        },
        extractors::{AuthCtxExtractor, PublicCommentId, PublicRecipeId},
        handlers::recipes::load_recipe,
    },
    error::AppError,
    repos::{
        comment_repo::{self, CommentRow},
        user_repo,
    },
    services::{
        cache::{ResourceClass, keys},
        invalidation::Mutation,
    },
    state::AppState,
};

async fn owned_comment(
    state: &AppState,
    comment_id: i64,
    user_id: uuid::Uuid,
) -> Result<CommentRow, AppError> {
    let row = comment_repo::get(&state.db, comment_id)
        .await?
        .ok_or(AppError::not_found("comment"))?;
    if row.author_id != user_id {
        return Err(AppError::Forbidden);
    }
    Ok(row)
}

pub async fn list_comments(
    State(state): State<AppState>,
    recipe_id: PublicRecipeId,
    Query(q): Query<ListCommentsQuery>,
) -> Result<Json<CommentListResponse>, AppError> {
    load_recipe(&state, recipe_id.id).await?;

    let page = Page::new(q.page, q.limit, 20, 100);
    let key = keys::comments(recipe_id.id, &page.params());

    let res = state
        .cache
        .get_or_compute(&key, ResourceClass::Comments, || async {
            let rows =
                comment_repo::list_top_level(&state.db, recipe_id.id, page.limit, page.offset())
                    .await?;
            let total = comment_repo::count_top_level(&state.db, recipe_id.id).await?;
            let items = rows
                .into_iter()
                .map(|r| CommentResponse::from_row(r, &state.id_codec))
                .collect::<Result<Vec<_>, _>>()?;
            Ok::<_, AppError>(CommentListResponse {
                items,
                page: page.page,
                limit: page.limit,
                total,
                total_pages: page.total_pages(total),
            })
        })
        .await?;

    Ok(Json(res))
}

pub async fn create_comment(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    recipe_id: PublicRecipeId,
    Json(req): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>), AppError> {
    req.validate().map_err(AppError::validation)?;
    load_recipe(&state, recipe_id.id).await?;
    if !user_repo::exists(&state.db, ctx.user_id).await? {
        return Err(AppError::not_found("user"));
    }

    let parent_id = match req.parent_id.as_deref() {
        None => None,
        Some(public) => {
            let id = state.id_codec.decode(public)?;
            // A reply must stay on the same recipe as its parent.
            let parent = comment_repo::get(&state.db, id)
                .await?
                .filter(|p| p.recipe_id == recipe_id.id)
                .ok_or(AppError::not_found("parent comment"))?;
            Some(parent.id)
        }
    };

    let row = comment_repo::create(
        &state.db,
        recipe_id.id,
        ctx.user_id,
        parent_id,
        req.content.trim(),
    )
    .await?;

    state
        .invalidator
        .invalidate(&Mutation::Comments {
            recipe_id: row.recipe_id,
        })
        .await;

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse::from_row(row, &state.id_codec)?),
    ))
}

pub async fn update_comment(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    comment_id: PublicCommentId,
    Json(req): Json<UpdateCommentRequest>,
) -> Result<Json<CommentResponse>, AppError> {
    req.validate().map_err(AppError::validation)?;
    owned_comment(&state, comment_id.id, ctx.user_id).await?;

    let row = comment_repo::update(&state.db, comment_id.id, req.content.trim())
        .await?
        .ok_or(AppError::not_found("comment"))?;

    state
        .invalidator
        .invalidate(&Mutation::Comments {
            recipe_id: row.recipe_id,
        })
        .await;

    Ok(Json(CommentResponse::from_row(row, &state.id_codec)?))
}

pub async fn delete_comment(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    comment_id: PublicCommentId,
) -> Result<StatusCode, AppError> {
    owned_comment(&state, comment_id.id, ctx.user_id).await?;

    let row = comment_repo::delete(&state.db, comment_id.id)
        .await?
        .ok_or(AppError::not_found("comment"))?;

    state
        .invalidator
        .invalidate(&Mutation::Comments {
            recipe_id: row.recipe_id,
        })
        .await;

    Ok(StatusCode::NO_CONTENT)
}

/// Cached pages embed like counts, so a like drops every page of the thread.
pub async fn toggle_comment_like(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    comment_id: PublicCommentId,
) -> Result<Json<ToggleCommentLikeResponse>, AppError> {
    let comment = comment_repo::get(&state.db, comment_id.id)
        .await?
        .ok_or(AppError::not_found("comment"))?;
    if !user_repo::exists(&state.db, ctx.user_id).await? {
        return Err(AppError::not_found("user"));
    }

    let (liked, likes) = comment_repo::toggle_like(&state.db, comment.id, ctx.user_id).await?;

    state
        .invalidator
        .invalidate(&Mutation::Comments {
            recipe_id: comment.recipe_id,
        })
        .await;

    Ok(Json(ToggleCommentLikeResponse { liked, likes }))
}
