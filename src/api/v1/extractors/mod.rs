/*
 * Responsibility
 * - handler 引数として使う extractor の公開窓口
 */
pub mod auth_ctx;
pub mod public_id;

pub use auth_ctx::{AuthCtx, AuthCtxExtractor, MaybeAuthCtx};
pub use public_id::{PublicCommentId, PublicFaqId, PublicRecipeId, PublicTemplateId};
