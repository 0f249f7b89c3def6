//! `Authorization: Bearer <user uuid>` → AuthCtx を extensions に入れる
//!
//! - トークン発行・署名検証は上流の認証サービスの責務。ここでは形式だけを見る。
//! - ヘッダが無いリクエストはそのまま通す (公開 GET のため)。認証必須かどうかは extractor が決める。
//! - ヘッダがあるのに壊れている場合は 401 (黙って匿名扱いにしない)。

use axum::{
    Router,
    body::Body,
    http::{Request, header},
    middleware::{self, Next},
    response::Response,
};
use uuid::Uuid;

use crate::api::v1::extractors::AuthCtx;
use crate::error::AppError;

pub fn apply<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn(identity_middleware))
}

fn parse_bearer(value: &str) -> Option<Uuid> {
    let token = value.strip_prefix("Bearer ")?;
    Uuid::parse_str(token.trim()).ok()
}

async fn identity_middleware(mut req: Request<Body>, next: Next) -> Result<Response, AppError> {
    if let Some(value) = req.headers().get(header::AUTHORIZATION) {
        let user_id = value
            .to_str()
            .ok()
            .and_then(parse_bearer)
            .ok_or_else(|| {
                tracing::warn!("malformed authorization header");
                AppError::Unauthorized
            })?;

        // middleware → extractor への受け渡し
        req.extensions_mut().insert(AuthCtx::new(user_id));
    }

    Ok(next.run(req).await)
}
