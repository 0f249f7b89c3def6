//! In-memory `LikeStore` with fault injection, for queue and scheduler tests.
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::repos::error::{RepoError, RepoResult};
use crate::repos::like_repo::{LikeDelta, LikeStore};
use crate::services::likes::LikeAction;

#[derive(Default)]
struct Inner {
    likes: BTreeMap<i64, BTreeSet<Uuid>>,
    // Every (recipe, user, action) that reached the store, in order.
    applied: Vec<(i64, Uuid, LikeAction)>,
    fail_apply: bool,
}

/// Pauses a store call until released, so a test can act while it is in flight.
#[derive(Clone, Default)]
pub struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[derive(Clone, Default)]
pub struct MemoryLikeStore {
    inner: Arc<Mutex<Inner>>,
    gate: Arc<Mutex<Option<Gate>>>,
    fetch_gate: Arc<Mutex<Option<Gate>>>,
}

impl MemoryLikeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, recipe_id: i64, users: &[Uuid]) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .likes
            .entry(recipe_id)
            .or_default()
            .extend(users.iter().copied());
    }

    pub fn likers(&self, recipe_id: i64) -> BTreeSet<Uuid> {
        let inner = self.inner.lock().unwrap();
        inner.likes.get(&recipe_id).cloned().unwrap_or_default()
    }

    pub fn applied(&self) -> Vec<(i64, Uuid, LikeAction)> {
        self.inner.lock().unwrap().applied.clone()
    }

    pub fn fail_apply(&self, fail: bool) {
        self.inner.lock().unwrap().fail_apply = fail;
    }

    /// Gate the next `apply_deltas`.
    pub fn install_gate(&self) -> Gate {
        let gate = Gate::default();
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Gate the next `fetch_likers` after it has read the likers, so its answer is stale.
    pub fn install_fetch_gate(&self) -> Gate {
        let gate = Gate::default();
        *self.fetch_gate.lock().unwrap() = Some(gate.clone());
        gate
    }
}

async fn pass(gate: Option<Gate>) {
    if let Some(gate) = gate {
        gate.entered.notify_one();
        gate.release.notified().await;
    }
}

#[async_trait]
impl LikeStore for MemoryLikeStore {
    async fn fetch_likers(&self, recipe_id: i64) -> RepoResult<Vec<Uuid>> {
        let likers: Vec<Uuid> = self.likers(recipe_id).into_iter().collect();
        let gate = self.fetch_gate.lock().unwrap().take();
        pass(gate).await;
        Ok(likers)
    }

    async fn apply_deltas(&self, deltas: &[LikeDelta]) -> RepoResult<()> {
        let gate = self.gate.lock().unwrap().take();
        pass(gate).await;

        let mut inner = self.inner.lock().unwrap();
        if inner.fail_apply {
            return Err(RepoError::Db(sqlx::Error::PoolTimedOut));
        }
        for delta in deltas {
            for user in &delta.add {
                inner.likes.entry(delta.recipe_id).or_default().insert(*user);
                inner.applied.push((delta.recipe_id, *user, LikeAction::Add));
            }
            for user in &delta.remove {
                inner.likes.entry(delta.recipe_id).or_default().remove(user);
                inner.applied.push((delta.recipe_id, *user, LikeAction::Remove));
            }
        }
        Ok(())
    }
}
