/*
 * Responsibility
 * - /templates 系 handler と /admin/templates
 * - 非公開テンプレートは作者以外には 404 (存在を漏らさない)
 * - 書き込み後は Mutation::Template で公開一覧 / 作者一覧 / admin 一覧を無効化
 */
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};

use crate::{
    api::v1::{
        dto::templates::{
            AdminTemplatesQuery, CreateTemplateRequest, SaveTemplateRequest, TemplatePageResponse,
            TemplateResponse, UpdateTemplateRequest,
        },
        extractors::{AuthCtxExtractor, MaybeAuthCtx, PublicTemplateId},
    },
    error::AppError,
    repos::{
        error::RepoError,
        template_repo::{self, AdminQuery, TemplateRow},
        user_repo,
    },
    services::{
        cache::{ResourceClass, keys},
        invalidation::{Mutation, MutationKind},
    },
    state::AppState,
};

fn duplicate_body(e: RepoError) -> AppError {
    match e {
        RepoError::Conflict => {
            AppError::conflict("DUPLICATE_TEMPLATE", "a template with this body already exists")
        }
        other => other.into(),
    }
}

async fn invalidate(state: &AppState, kind: MutationKind, row: &TemplateRow, public_before: bool) {
    state
        .invalidator
        .invalidate(&Mutation::Template {
            kind,
            template_id: row.id,
            author_id: row.author_id,
            public_before,
            public_after: kind != MutationKind::Delete && row.is_public,
        })
        .await;
}

// Ownership checks read the row itself, never the cached copy.
async fn owned_row(state: &AppState, template_id: i64, user_id: uuid::Uuid) -> Result<TemplateRow, AppError> {
    let row = template_repo::get(&state.db, template_id)
        .await?
        .ok_or(AppError::not_found("template"))?;
    if row.author_id != user_id {
        return Err(AppError::Forbidden);
    }
    Ok(row)
}

pub async fn create_template(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Json(req): Json<CreateTemplateRequest>,
) -> Result<(StatusCode, Json<TemplateResponse>), AppError> {
    req.validate().map_err(AppError::validation)?;
    if !user_repo::exists(&state.db, ctx.user_id).await? {
        return Err(AppError::not_found("user"));
    }

    let row = template_repo::create(&state.db, ctx.user_id, &req.body, req.is_public)
        .await
        .map_err(duplicate_body)?;

    invalidate(&state, MutationKind::Create, &row, false).await;

    Ok((
        StatusCode::CREATED,
        Json(TemplateResponse::from_row(row, &state.id_codec)?),
    ))
}

/// Upsert by body: returns the caller's existing template when the body is already saved.
pub async fn save_template(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    Json(req): Json<SaveTemplateRequest>,
) -> Result<(StatusCode, Json<TemplateResponse>), AppError> {
    req.validate().map_err(AppError::validation)?;
    if !user_repo::exists(&state.db, ctx.user_id).await? {
        return Err(AppError::not_found("user"));
    }

    let (row, inserted) = template_repo::save(&state.db, ctx.user_id, &req.body).await?;

    let status = if inserted {
        invalidate(&state, MutationKind::Create, &row, false).await;
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((status, Json(TemplateResponse::from_row(row, &state.id_codec)?)))
}

pub async fn list_public(
    State(state): State<AppState>,
) -> Result<Json<Vec<TemplateResponse>>, AppError> {
    let res = state
        .cache
        .get_or_compute(&keys::templates_public(), ResourceClass::Templates, || async {
            let rows = template_repo::list_public(&state.db).await?;
            Ok::<_, AppError>(TemplateResponse::from_rows(rows, &state.id_codec)?)
        })
        .await?;

    Ok(Json(res))
}

pub async fn my_templates(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
) -> Result<Json<Vec<TemplateResponse>>, AppError> {
    let res = state
        .cache
        .get_or_compute(
            &keys::templates_by_author(ctx.user_id),
            ResourceClass::Templates,
            || async {
                let rows = template_repo::list_by_author(&state.db, ctx.user_id).await?;
                Ok::<_, AppError>(TemplateResponse::from_rows(rows, &state.id_codec)?)
            },
        )
        .await?;

    Ok(Json(res))
}

pub async fn get_template(
    State(state): State<AppState>,
    MaybeAuthCtx(ctx): MaybeAuthCtx,
    template_id: PublicTemplateId,
) -> Result<Json<TemplateResponse>, AppError> {
    let res = state
        .cache
        .get_or_compute(&keys::template(template_id.id), ResourceClass::Templates, || async {
            let row = template_repo::get(&state.db, template_id.id)
                .await?
                .ok_or(AppError::not_found("template"))?;
            Ok::<_, AppError>(TemplateResponse::from_row(row, &state.id_codec)?)
        })
        .await?;

    let visible = res.is_public || ctx.is_some_and(|c| c.owns(res.author_id));
    if !visible {
        return Err(AppError::not_found("template"));
    }

    Ok(Json(res))
}

pub async fn update_template(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    template_id: PublicTemplateId,
    Json(req): Json<UpdateTemplateRequest>,
) -> Result<Json<TemplateResponse>, AppError> {
    req.validate().map_err(AppError::validation)?;
    let before = owned_row(&state, template_id.id, ctx.user_id).await?;

    let row = template_repo::update(&state.db, template_id.id, req.body.as_deref(), req.is_public)
        .await
        .map_err(duplicate_body)?
        .ok_or(AppError::not_found("template"))?;

    invalidate(&state, MutationKind::Update, &row, before.is_public).await;

    Ok(Json(TemplateResponse::from_row(row, &state.id_codec)?))
}

pub async fn delete_template(
    State(state): State<AppState>,
    AuthCtxExtractor(ctx): AuthCtxExtractor,
    template_id: PublicTemplateId,
) -> Result<StatusCode, AppError> {
    owned_row(&state, template_id.id, ctx.user_id).await?;

    let row = template_repo::delete(&state.db, template_id.id)
        .await?
        .ok_or(AppError::not_found("template"))?;

    invalidate(&state, MutationKind::Delete, &row, row.is_public).await;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn admin_templates(
    State(state): State<AppState>,
    Query(q): Query<AdminTemplatesQuery>,
) -> Result<Json<TemplatePageResponse>, AppError> {
    let params = q.normalize().map_err(AppError::validation)?;
    let key = keys::templates_admin(&params.cache_params());

    let res = state
        .cache
        .get_or_compute(&key, ResourceClass::Templates, || async {
            let query = AdminQuery {
                limit: params.page.limit,
                offset: params.page.offset(),
                sort_by: params.sort_by,
                sort_order: params.sort_order,
                search: params.search.as_deref(),
            };
            let rows = template_repo::admin_page(&state.db, &query).await?;
            let total = template_repo::admin_count(&state.db, query.search).await?;
            Ok::<_, AppError>(TemplatePageResponse {
                items: TemplateResponse::from_rows(rows, &state.id_codec)?,
                page: params.page.page,
                limit: params.page.limit,
                total,
                total_pages: params.page.total_pages(total),
            })
        })
        .await?;

    Ok(Json(res))
}
