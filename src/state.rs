/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - db: PgPool, id_codec: IdCodec, cache, invalidator, likes
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 */
use sqlx::PgPool;

use crate::repos::like_repo::PgLikeRepo;
use crate::services::{
    cache::{Cache, CacheBackend},
    id_codec::IdCodec,
    invalidation::Invalidator,
    likes::LikeQueue,
};

pub type AppCache = Cache<CacheBackend>;
pub type AppLikes = LikeQueue<CacheBackend, PgLikeRepo>;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub id_codec: IdCodec,
    pub cache: AppCache,
    pub invalidator: Invalidator<CacheBackend>,
    pub likes: AppLikes,
}

impl AppState {
    pub fn new(db: PgPool, id_codec: IdCodec, cache: AppCache) -> Self {
        let invalidator = Invalidator::new(cache.clone());
        let likes = LikeQueue::new(cache.clone(), PgLikeRepo::new(db.clone()));
        Self {
            db,
            id_codec,
            cache,
            invalidator,
            likes,
        }
    }
}
