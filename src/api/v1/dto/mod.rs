/*
 * Responsibility
 * - v1 の request/response DTO
 * - response DTO はキャッシュにもそのまま入る (Serialize + Deserialize)
 */
pub mod comments;
pub mod faqs;
pub mod pagination;
pub mod recipes;
pub mod templates;
pub mod users;
