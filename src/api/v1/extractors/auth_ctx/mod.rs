/*!
 * Caller identity extractor
 *
 * Responsibility:
 * - middleware::identity が載せた AuthCtx を handler に提供する
 * - HTTP / axum 依存は core に閉じ込め、型定義は types に分離する
 */

mod core;
mod types;

pub use self::core::{AuthCtxExtractor, MaybeAuthCtx};
pub use types::AuthCtx;
