/*
 * Responsibility
 *  - リソースごとの「意味付きID型」を宣言する
 *  - decode ロジック / extractor 実装はここに置かない (core 側)
 */
use super::core::PublicId;

// recipes
pub enum RecipeTag {}
pub type PublicRecipeId = PublicId<RecipeTag>;

// templates
pub enum TemplateTag {}
pub type PublicTemplateId = PublicId<TemplateTag>;

// comments
pub enum CommentTag {}
pub type PublicCommentId = PublicId<CommentTag>;

// faqs
pub enum FaqTag {}
pub type PublicFaqId = PublicId<FaqTag>;
