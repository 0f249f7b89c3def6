//! Pending-like ledger and its flush into the primary store.
//!
//! Ledger layout: hash `likes:pending`, field `{recipe_id}:{user_id}`, value `add` | `remove`.
//! One field per pair, so repeated toggles overwrite instead of growing the ledger.
//!
//! Flush protocol:
//! 1. snapshot the ledger (HGETALL), nothing is cleared yet
//! 2. group by recipe into add/remove sets
//! 3. apply every delta in one database transaction
//! 4. remove exactly the snapshotted field/value pairs (compare-and-delete)
//!
//! A pair rewritten between 1 and 4 no longer matches its snapshotted value and survives
//! step 4, so it is picked up by the next flush. A failure before step 4 leaves the ledger
//! untouched; reapplying is harmless because adds and removes are set operations.
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::repos::error::RepoError;
use crate::repos::like_repo::{LikeDelta, LikeStore};
use crate::services::cache::keys::{self, LIKE_LEDGER};
use crate::services::cache::{Cache, CacheClient, CacheError, CacheResult, CacheResultExt, ResourceClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeAction {
    Add,
    Remove,
}

impl LikeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            LikeAction::Add => "add",
            LikeAction::Remove => "remove",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "add" => Some(LikeAction::Add),
            "remove" => Some(LikeAction::Remove),
            _ => None,
        }
    }
}

impl fmt::Display for LikeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum LikeError {
    #[error("like ledger unavailable: {0}")]
    Ledger(#[from] CacheError),
    #[error("like store error: {0}")]
    Store(#[from] RepoError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub liked: bool,
    pub likes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Another flush held the lock; nothing was read.
    pub skipped: bool,
    pub entities: usize,
    pub actions: usize,
    pub malformed: usize,
    pub cleared: u64,
}

fn ledger_field(recipe_id: i64, user_id: Uuid) -> String {
    format!("{recipe_id}:{user_id}")
}

fn parse_entry(field: &str, value: &str) -> Option<(i64, Uuid, LikeAction)> {
    let (recipe, user) = field.split_once(':')?;
    let recipe_id = recipe.parse().ok()?;
    let user_id = user.parse().ok()?;
    Some((recipe_id, user_id, LikeAction::parse(value)?))
}

struct Grouped {
    deltas: Vec<LikeDelta>,
    // Field/value pairs to compare-and-delete once the deltas are committed.
    processed: Vec<(String, String)>,
    actions: usize,
    malformed: usize,
}

fn group(snapshot: impl IntoIterator<Item = (String, String)>) -> Grouped {
    let mut by_recipe: BTreeMap<i64, LikeDelta> = BTreeMap::new();
    let mut processed = Vec::new();
    let mut actions = 0;
    let mut malformed = 0;

    for (field, value) in snapshot {
        match parse_entry(&field, &value) {
            Some((recipe_id, user_id, action)) => {
                let delta = by_recipe
                    .entry(recipe_id)
                    .or_insert_with(|| LikeDelta::new(recipe_id));
                match action {
                    LikeAction::Add => delta.add.insert(user_id),
                    LikeAction::Remove => delta.remove.insert(user_id),
                };
                actions += 1;
            }
            None => {
                tracing::warn!(field = %field, value = %value, "dropping malformed like ledger entry");
                malformed += 1;
            }
        }
        processed.push((field, value));
    }

    Grouped {
        deltas: by_recipe.into_values().collect(),
        processed,
        actions,
        malformed,
    }
}

pub struct LikeQueue<C: CacheClient, S: LikeStore> {
    cache: Cache<C>,
    store: Arc<S>,
    flush_lock: Arc<Mutex<()>>,
}

impl<C: CacheClient, S: LikeStore> Clone for LikeQueue<C, S> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            store: Arc::clone(&self.store),
            flush_lock: Arc::clone(&self.flush_lock),
        }
    }
}

impl<C: CacheClient, S: LikeStore> LikeQueue<C, S> {
    pub fn new(cache: Cache<C>, store: S) -> Self {
        Self {
            cache,
            store: Arc::new(store),
            flush_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Upsert the pending intent for (recipe, user). Last write wins.
    pub async fn record_action(
        &self,
        recipe_id: i64,
        user_id: Uuid,
        action: LikeAction,
    ) -> CacheResult<()> {
        self.cache
            .hash_set(LIKE_LEDGER, &ledger_field(recipe_id, user_id), action.as_str())
            .await
    }

    /// Users currently liking the recipe, as seen by readers.
    ///
    /// Served from the cached like set. On a miss the set is rebuilt from the store with the
    /// recipe's pending ledger actions laid over it, then cached.
    ///
    /// The ledger is read before the store. A flush that commits and clears in between then
    /// shows up in the store read, so a pending action is never lost from the rebuilt set.
    pub async fn current_like_set(&self, recipe_id: i64) -> Result<Vec<Uuid>, LikeError> {
        let key = keys::like_set(recipe_id);
        if let Some(set) = self.cache.get::<Vec<Uuid>>(&key).await.or_log("get", &key).flatten() {
            return Ok(set);
        }

        let pending = self
            .cache
            .hash_get_all(LIKE_LEDGER)
            .await
            .or_log("hgetall", LIKE_LEDGER)
            .unwrap_or_default();

        let mut set: BTreeSet<Uuid> = self.store.fetch_likers(recipe_id).await?.into_iter().collect();
        for (field, value) in &pending {
            match parse_entry(field, value) {
                Some((r, user, LikeAction::Add)) if r == recipe_id => {
                    set.insert(user);
                }
                Some((r, user, LikeAction::Remove)) if r == recipe_id => {
                    set.remove(&user);
                }
                _ => {}
            }
        }

        let set: Vec<Uuid> = set.into_iter().collect();
        self.cache
            .set(&key, &set, ResourceClass::LikeStatus.ttl())
            .await
            .or_log("set", &key);
        Ok(set)
    }

    pub async fn current_like_count(&self, recipe_id: i64) -> Result<usize, LikeError> {
        Ok(self.current_like_set(recipe_id).await?.len())
    }

    /// Like counts for several recipes, in input order.
    ///
    /// Cached sets come back in one batched read. Only the misses are rebuilt, one by one,
    /// through `current_like_set`.
    pub async fn current_like_counts(&self, recipe_ids: &[i64]) -> Result<Vec<usize>, LikeError> {
        let set_keys: Vec<String> = recipe_ids.iter().map(|&id| keys::like_set(id)).collect();
        let cached = self
            .cache
            .multi_get::<Vec<Uuid>>(&set_keys)
            .await
            .or_log("mget", "like sets")
            .unwrap_or_else(|| vec![None; set_keys.len()]);

        let mut counts = Vec::with_capacity(recipe_ids.len());
        for (&recipe_id, hit) in recipe_ids.iter().zip(cached) {
            let n = match hit {
                Some(set) => set.len(),
                None => self.current_like_count(recipe_id).await?,
            };
            counts.push(n);
        }
        Ok(counts)
    }

    /// Flip the user's like on the recipe without touching the primary store.
    ///
    /// If the ledger cannot be written the change goes straight to the store instead, so the
    /// intent is never dropped.
    ///
    /// The cached like set is updated read-modify-write, not atomically. Two users toggling the
    /// same recipe at once can each overwrite the other's membership in the cached copy. The
    /// ledger keeps both actions, and the next flush drops the cached set, so the copy is wrong
    /// for at most one flush interval (or the like-status TTL, whichever ends first).
    pub async fn toggle_like(&self, recipe_id: i64, user_id: Uuid) -> Result<ToggleOutcome, LikeError> {
        let mut set = self.current_like_set(recipe_id).await?;
        let liked = !set.contains(&user_id);
        let action = if liked { LikeAction::Add } else { LikeAction::Remove };

        if let Err(e) = self.record_action(recipe_id, user_id, action).await {
            tracing::warn!(
                backend = self.cache.backend_name(),
                recipe_id,
                %user_id,
                %action,
                error = %e,
                "like ledger unavailable; writing through"
            );
            let mut delta = LikeDelta::new(recipe_id);
            match action {
                LikeAction::Add => delta.add.insert(user_id),
                LikeAction::Remove => delta.remove.insert(user_id),
            };
            self.store.apply_deltas(&[delta]).await?;
        }

        if liked {
            set.push(user_id);
        } else {
            set.retain(|u| *u != user_id);
        }
        let key = keys::like_set(recipe_id);
        self.cache
            .set(&key, &set, ResourceClass::LikeStatus.ttl())
            .await
            .or_log("set", &key);

        Ok(ToggleOutcome {
            liked,
            likes: set.len(),
        })
    }

    /// Drain the ledger into the primary store. See the module docs for the protocol.
    ///
    /// Only one flush runs at a time; a call that finds one in progress returns immediately
    /// with `skipped` set.
    pub async fn flush(&self) -> Result<FlushReport, LikeError> {
        let Ok(_guard) = self.flush_lock.try_lock() else {
            tracing::debug!("like flush already running; skipping");
            return Ok(FlushReport {
                skipped: true,
                ..FlushReport::default()
            });
        };

        let snapshot = self.cache.hash_get_all(LIKE_LEDGER).await?;
        if snapshot.is_empty() {
            return Ok(FlushReport::default());
        }

        let grouped = group(snapshot);
        if !grouped.deltas.is_empty() {
            // On failure the ledger is untouched and the next flush retries.
            self.store.apply_deltas(&grouped.deltas).await?;
        }

        let cleared = match self.cache.hash_del_if_eq(LIKE_LEDGER, &grouped.processed).await {
            Ok(n) => n,
            Err(e) => {
                // Already committed; the entries are reapplied (idempotently) next time.
                tracing::warn!(error = %e, "failed to clear flushed like ledger entries");
                0
            }
        };

        // Cached like sets are rebuilt from the store on their next read.
        let like_keys: Vec<String> = grouped
            .deltas
            .iter()
            .map(|d| keys::like_set(d.recipe_id))
            .collect();
        if !like_keys.is_empty() {
            self.cache
                .delete_many(&like_keys)
                .await
                .or_log("del", "likes:{recipe_id}");
        }

        let report = FlushReport {
            skipped: false,
            entities: grouped.deltas.len(),
            actions: grouped.actions,
            malformed: grouped.malformed,
            cleared,
        };
        tracing::info!(
            entities = report.entities,
            actions = report.actions,
            malformed = report.malformed,
            cleared = report.cleared,
            "like ledger flushed"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::MemoryClient;
    use crate::services::likes::testing::MemoryLikeStore;

    fn user(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn queue() -> (LikeQueue<MemoryClient, MemoryLikeStore>, MemoryClient, MemoryLikeStore) {
        let client = MemoryClient::new();
        let store = MemoryLikeStore::new();
        let queue = LikeQueue::new(Cache::new(client.clone(), ""), store.clone());
        (queue, client, store)
    }

    async fn ledger(client: &MemoryClient) -> std::collections::HashMap<String, String> {
        client.hash_get_all(LIKE_LEDGER).await.unwrap()
    }

    #[tokio::test]
    async fn add_then_remove_before_flush_is_no_net_change() {
        let (queue, client, store) = queue();
        store.seed(1, &[user(7)]);

        queue.record_action(1, user(2), LikeAction::Add).await.unwrap();
        queue.record_action(1, user(2), LikeAction::Remove).await.unwrap();
        assert_eq!(ledger(&client).await.len(), 1);

        let report = queue.flush().await.unwrap();
        assert_eq!(report.actions, 1);
        assert_eq!(store.likers(1), BTreeSet::from([user(7)]));
        assert_eq!(store.applied(), vec![(1, user(2), LikeAction::Remove)]);
        assert!(ledger(&client).await.is_empty());
    }

    #[tokio::test]
    async fn like_is_visible_immediately_and_durable_after_flush() {
        let (queue, client, store) = queue();
        let (r1, u1) = (1, user(1));

        let outcome = queue.toggle_like(r1, u1).await.unwrap();
        assert_eq!(outcome, ToggleOutcome { liked: true, likes: 1 });
        assert_eq!(queue.current_like_set(r1).await.unwrap(), vec![u1]);
        assert!(store.likers(r1).is_empty());

        queue.flush().await.unwrap();

        assert!(store.likers(r1).contains(&u1));
        assert!(!ledger(&client).await.contains_key(&format!("{r1}:{u1}")));
        // rebuilt from the store after the flush dropped the cached set
        assert_eq!(queue.current_like_count(r1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn toggling_twice_unlikes() {
        let (queue, _, store) = queue();
        store.seed(4, &[user(1), user(2)]);

        let first = queue.toggle_like(4, user(2)).await.unwrap();
        assert_eq!(first, ToggleOutcome { liked: false, likes: 1 });
        let second = queue.toggle_like(4, user(2)).await.unwrap();
        assert_eq!(second, ToggleOutcome { liked: true, likes: 2 });

        queue.flush().await.unwrap();
        assert_eq!(store.likers(4), BTreeSet::from([user(1), user(2)]));
    }

    #[tokio::test]
    async fn concurrent_duplicate_adds_apply_once() {
        let (queue, _, store) = queue();

        let (a, b) = tokio::join!(
            queue.record_action(3, user(2), LikeAction::Add),
            queue.record_action(3, user(2), LikeAction::Add),
        );
        a.unwrap();
        b.unwrap();

        queue.flush().await.unwrap();
        assert_eq!(store.applied(), vec![(3, user(2), LikeAction::Add)]);

        // nothing left to reapply
        let again = queue.flush().await.unwrap();
        assert_eq!(again.actions, 0);
        assert_eq!(store.applied().len(), 1);
    }

    #[tokio::test]
    async fn failed_apply_leaves_ledger_for_retry() {
        let (queue, client, store) = queue();
        queue.record_action(1, user(1), LikeAction::Add).await.unwrap();
        queue.record_action(2, user(1), LikeAction::Add).await.unwrap();

        store.fail_apply(true);
        assert!(matches!(queue.flush().await, Err(LikeError::Store(_))));
        assert_eq!(ledger(&client).await.len(), 2);
        assert!(store.applied().is_empty());

        store.fail_apply(false);
        let report = queue.flush().await.unwrap();
        assert_eq!((report.entities, report.cleared), (2, 2));
        assert!(ledger(&client).await.is_empty());
    }

    #[tokio::test]
    async fn late_arrivals_survive_an_in_flight_flush() {
        let (queue, client, store) = queue();
        queue.record_action(1, user(1), LikeAction::Add).await.unwrap();
        queue.record_action(1, user(2), LikeAction::Add).await.unwrap();

        let gate = store.install_gate();
        let flushing = tokio::spawn({
            let queue = queue.clone();
            async move { queue.flush().await }
        });
        gate.entered.notified().await;

        // snapshot taken; rewrite one pair and add a new one
        queue.record_action(1, user(2), LikeAction::Remove).await.unwrap();
        queue.record_action(9, user(3), LikeAction::Add).await.unwrap();
        let overlapping = queue.flush().await.unwrap();
        assert!(overlapping.skipped);

        gate.release.notify_one();
        let report = flushing.await.unwrap().unwrap();
        assert_eq!(report.cleared, 1);

        let rest = ledger(&client).await;
        assert_eq!(rest.len(), 2);
        assert_eq!(rest.get(&format!("1:{}", user(2))).map(String::as_str), Some("remove"));
        assert_eq!(rest.get(&format!("9:{}", user(3))).map(String::as_str), Some("add"));

        queue.flush().await.unwrap();
        assert_eq!(store.likers(1), BTreeSet::from([user(1)]));
        assert_eq!(store.likers(9), BTreeSet::from([user(3)]));
    }

    #[tokio::test]
    async fn malformed_entries_are_dropped() {
        let (queue, client, store) = queue();
        client.hash_set(LIKE_LEDGER, "not-a-field", "add").await.unwrap();
        client
            .hash_set(LIKE_LEDGER, &format!("1:{}", user(1)), "maybe")
            .await
            .unwrap();
        queue.record_action(1, user(2), LikeAction::Add).await.unwrap();

        let report = queue.flush().await.unwrap();
        assert_eq!((report.actions, report.malformed, report.cleared), (1, 2, 3));
        assert_eq!(store.likers(1), BTreeSet::from([user(2)]));
        assert!(ledger(&client).await.is_empty());
    }

    #[tokio::test]
    async fn like_set_miss_overlays_pending_actions() {
        let (queue, _, store) = queue();
        store.seed(5, &[user(1), user(2)]);
        queue.record_action(5, user(2), LikeAction::Remove).await.unwrap();
        queue.record_action(5, user(3), LikeAction::Add).await.unwrap();
        queue.record_action(6, user(4), LikeAction::Add).await.unwrap();

        assert_eq!(queue.current_like_set(5).await.unwrap(), vec![user(1), user(3)]);
    }

    #[tokio::test]
    async fn unavailable_ledger_writes_through() {
        let (queue, client, store) = queue();
        client.set_unavailable(true);

        let outcome = queue.toggle_like(8, user(1)).await.unwrap();
        assert_eq!(outcome, ToggleOutcome { liked: true, likes: 1 });
        assert_eq!(store.likers(8), BTreeSet::from([user(1)]));

        assert!(matches!(queue.flush().await, Err(LikeError::Ledger(_))));
    }

    #[tokio::test]
    async fn batched_counts_reuse_cached_sets_and_rebuild_misses() {
        let (queue, _, store) = queue();
        store.seed(1, &[user(1), user(2)]);
        store.seed(2, &[user(3)]);

        // cache recipe 1, then move the store underneath it
        assert_eq!(queue.current_like_count(1).await.unwrap(), 2);
        store.seed(1, &[user(9)]);

        let counts = queue.current_like_counts(&[1, 2, 7, 1]).await.unwrap();
        assert_eq!(counts, vec![2, 1, 0, 2]);

        // the miss for recipe 2 was cached on the way
        store.seed(2, &[user(8)]);
        assert_eq!(queue.current_like_counts(&[2]).await.unwrap(), vec![1]);
        assert!(queue.current_like_counts(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batched_counts_fall_back_to_the_store_when_cache_is_down() {
        let (queue, client, store) = queue();
        store.seed(4, &[user(1)]);
        client.set_unavailable(true);

        assert_eq!(queue.current_like_counts(&[4, 5]).await.unwrap(), vec![1, 0]);
    }

    #[tokio::test]
    async fn rebuild_racing_a_flush_keeps_the_pending_like() {
        let (queue, client, store) = queue();
        queue.record_action(2, user(1), LikeAction::Add).await.unwrap();

        // the store read completes before the flush but its answer arrives after it
        let gate = store.install_fetch_gate();
        let reading = tokio::spawn({
            let queue = queue.clone();
            async move { queue.current_like_set(2).await }
        });
        gate.entered.notified().await;

        queue.flush().await.unwrap();
        assert!(store.likers(2).contains(&user(1)));
        assert!(ledger(&client).await.is_empty());

        gate.release.notify_one();
        assert_eq!(reading.await.unwrap().unwrap(), vec![user(1)]);
        // the cached copy agrees
        assert_eq!(queue.current_like_set(2).await.unwrap(), vec![user(1)]);
    }

    #[tokio::test]
    async fn concurrent_toggles_by_different_users_all_land() {
        let (queue, _, store) = queue();
        store.seed(3, &[user(9)]);

        let (a, b) = tokio::join!(queue.toggle_like(3, user(1)), queue.toggle_like(3, user(2)));
        assert!(a.unwrap().liked);
        assert!(b.unwrap().liked);

        queue.flush().await.unwrap();
        assert_eq!(store.likers(3), BTreeSet::from([user(1), user(2), user(9)]));
        // the flush dropped whatever the racing writers left in the cache
        assert_eq!(queue.current_like_count(3).await.unwrap(), 3);
    }

    #[test]
    fn ledger_fields_round_trip() {
        let field = ledger_field(42, user(5));
        assert_eq!(parse_entry(&field, "add"), Some((42, user(5), LikeAction::Add)));
        assert_eq!(parse_entry("42", "add"), None);
        assert_eq!(parse_entry(&field, "ADD"), None);
    }
}
