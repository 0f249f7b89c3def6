/*
 * Responsibility
 * - recipe_likes テーブル (永続化された like 集合) の読み書き
 * - like ledger の flush から呼ばれる一括適用 (1 トランザクション)
 * - LikeStore trait でテスト時に差し替え可能にする
 */
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::repos::error::RepoResult;

/// Net change for one recipe's like collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LikeDelta {
    pub recipe_id: i64,
    pub add: BTreeSet<Uuid>,
    pub remove: BTreeSet<Uuid>,
}

impl LikeDelta {
    pub fn new(recipe_id: i64) -> Self {
        Self {
            recipe_id,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// Primary-store side of the like queue.
#[async_trait]
pub trait LikeStore: Send + Sync + 'static {
    async fn fetch_likers(&self, recipe_id: i64) -> RepoResult<Vec<Uuid>>;

    // All deltas commit together or not at all.
    async fn apply_deltas(&self, deltas: &[LikeDelta]) -> RepoResult<()>;
}

#[derive(Clone, Debug)]
pub struct PgLikeRepo {
    db: PgPool,
}

impl PgLikeRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl LikeStore for PgLikeRepo {
    async fn fetch_likers(&self, recipe_id: i64) -> RepoResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT user_id
            FROM recipe_likes
            WHERE recipe_id = $1
            ORDER BY created_at, user_id
            "#,
        )
        .bind(recipe_id)
        .fetch_all(&self.db)
        .await?;

        Ok(ids)
    }

    async fn apply_deltas(&self, deltas: &[LikeDelta]) -> RepoResult<()> {
        // A delta whose adds and removes are both empty has nothing to write.
        let deltas: Vec<&LikeDelta> = deltas.iter().filter(|d| !d.is_empty()).collect();
        if deltas.is_empty() {
            return Ok(());
        }

        let mut tx = self.db.begin().await?;

        for delta in deltas {
            if !delta.add.is_empty() {
                let add: Vec<Uuid> = delta.add.iter().copied().collect();
                // Rows whose recipe or user is gone are skipped instead of failing the batch.
                sqlx::query(
                    r#"
                    INSERT INTO recipe_likes (recipe_id, user_id)
                    SELECT $1, u.user_id
                    FROM users u
                    WHERE u.user_id = ANY($2::uuid[])
                        AND EXISTS (SELECT 1 FROM recipes r WHERE r.id = $1)
                    ON CONFLICT DO NOTHING
                    "#,
                )
                .bind(delta.recipe_id)
                .bind(&add)
                .execute(&mut *tx)
                .await?;
            }

            if !delta.remove.is_empty() {
                let remove: Vec<Uuid> = delta.remove.iter().copied().collect();
                sqlx::query(
                    r#"
                    DELETE FROM recipe_likes
                    WHERE recipe_id = $1 AND user_id = ANY($2::uuid[])
                    "#,
                )
                .bind(delta.recipe_id)
                .bind(&remove)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delta_is_empty_until_it_names_a_user() {
        let mut delta = LikeDelta::new(3);
        assert!(delta.is_empty());

        delta.remove.insert(Uuid::from_u128(1));
        assert!(!delta.is_empty());
    }
}
