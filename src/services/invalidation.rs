//! Mutation → cache invalidation rules.
//!
//! Write handlers describe what they changed as a `Mutation` and call `Invalidator::invalidate`
//! after the database write succeeded and before responding. `plan` is pure so the rules can be
//! tested without a store.
//!
//! Pattern invalidation is coarse on purpose: every parametrized variant of an affected list
//! is dropped rather than guessing which page or filter the change lands on.
use uuid::Uuid;

use crate::domain::Category;
use crate::services::cache::{Cache, CacheClient, keys};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Recipe {
        kind: MutationKind,
        recipe_id: i64,
        author_id: Uuid,
        /// Categories the recipe had before and/or after the write.
        categories: Vec<Category>,
    },
    Template {
        kind: MutationKind,
        template_id: i64,
        author_id: Uuid,
        public_before: bool,
        public_after: bool,
    },
    UserProfile {
        user_id: Uuid,
    },
    SavedRecipes {
        user_id: Uuid,
    },
    /// Comment written, edited, deleted or liked.
    Comments {
        recipe_id: i64,
    },
    Faqs {
        recipe_id: i64,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationPlan {
    pub keys: Vec<String>,
    pub patterns: Vec<String>,
}

impl InvalidationPlan {
    fn key(&mut self, key: String) {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
    }

    fn pattern(&mut self, pattern: String) {
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }
}

pub fn plan(mutation: &Mutation) -> InvalidationPlan {
    let mut plan = InvalidationPlan::default();

    match mutation {
        Mutation::Recipe {
            kind,
            recipe_id,
            author_id,
            categories,
        } => {
            plan.key(keys::recipe(*recipe_id));
            plan.key(keys::user_profile(*author_id));
            plan.key(keys::user_created(*author_id));
            plan.pattern(keys::recipe_list_pattern());
            plan.pattern(keys::latest_pattern());
            for category in categories {
                plan.pattern(keys::category_pattern(*category));
            }
            plan.pattern(keys::search_pattern());

            if *kind != MutationKind::Create {
                plan.pattern(keys::user_saved_pattern());
            }
            if *kind == MutationKind::Delete {
                plan.key(keys::like_set(*recipe_id));
                plan.pattern(keys::comments_pattern(*recipe_id));
                plan.key(keys::faqs(*recipe_id));
            }
        }
        Mutation::Template {
            kind,
            template_id,
            author_id,
            public_before,
            public_after,
        } => {
            if *kind != MutationKind::Create {
                plan.key(keys::template(*template_id));
            }
            plan.key(keys::templates_by_author(*author_id));
            if *public_before || *public_after {
                plan.key(keys::templates_public());
            }
            plan.pattern(keys::templates_admin_pattern());
        }
        Mutation::UserProfile { user_id } => {
            plan.key(keys::user_profile(*user_id));
        }
        Mutation::SavedRecipes { user_id } => {
            plan.key(keys::user_saved(*user_id));
        }
        Mutation::Comments { recipe_id } => {
            plan.pattern(keys::comments_pattern(*recipe_id));
        }
        Mutation::Faqs { recipe_id } => {
            plan.key(keys::faqs(*recipe_id));
        }
    }

    plan
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvalidationReport {
    pub keys_deleted: u64,
    pub pattern_keys_deleted: u64,
    pub failures: usize,
}

#[derive(Clone)]
pub struct Invalidator<C: CacheClient> {
    cache: Cache<C>,
}

impl<C: CacheClient> Invalidator<C> {
    pub fn new(cache: Cache<C>) -> Self {
        Self { cache }
    }

    /// Run every step of the plan. A failing step is logged and the rest still run;
    /// the mutation that triggered this is never rolled back.
    pub async fn invalidate(&self, mutation: &Mutation) -> InvalidationReport {
        let plan = plan(mutation);
        let mut report = InvalidationReport::default();

        if !plan.keys.is_empty() {
            match self.cache.delete_many(&plan.keys).await {
                Ok(n) => report.keys_deleted = n,
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(
                        backend = self.cache.backend_name(),
                        keys = ?plan.keys,
                        error = %e,
                        "key invalidation failed; entries will expire by ttl"
                    );
                }
            }
        }

        for pattern in &plan.patterns {
            match self.cache.delete_by_pattern(pattern).await {
                Ok(n) => report.pattern_keys_deleted += n,
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(
                        backend = self.cache.backend_name(),
                        pattern = %pattern,
                        error = %e,
                        "pattern invalidation failed; entries will expire by ttl"
                    );
                }
            }
        }

        tracing::debug!(
            ?mutation,
            keys_deleted = report.keys_deleted,
            pattern_keys_deleted = report.pattern_keys_deleted,
            failures = report.failures,
            "cache invalidated"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::MemoryClient;
    use crate::services::cache::keys::Params;
    use std::time::Duration;

    const TTL: Duration = Duration::from_secs(600);

    fn user(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    #[test]
    fn recipe_update_covers_both_categories() {
        let p = plan(&Mutation::Recipe {
            kind: MutationKind::Update,
            recipe_id: 2,
            author_id: user(1),
            categories: vec![Category::Dessert, Category::Snack],
        });

        assert!(p.keys.contains(&"recipe:2".to_string()));
        assert!(p.keys.contains(&keys::user_profile(user(1))));
        assert!(p.keys.contains(&keys::user_created(user(1))));
        for pattern in [
            "recipes:*",
            "latest:*",
            "category:Dessert:*",
            "category:Snack:*",
            "search:*",
        ] {
            assert!(p.patterns.contains(&pattern.to_string()), "missing {pattern}");
        }
        assert!(!p.keys.contains(&keys::like_set(2)));
    }

    #[test]
    fn recipe_delete_also_drops_likes_and_comments() {
        let p = plan(&Mutation::Recipe {
            kind: MutationKind::Delete,
            recipe_id: 5,
            author_id: user(1),
            categories: vec![Category::Lunch, Category::Lunch],
        });

        assert!(p.keys.contains(&"likes:5".to_string()));
        assert!(p.patterns.contains(&"comments:5:*".to_string()));
        assert!(p.keys.contains(&"faqs:5".to_string()));
        assert_eq!(
            p.patterns.iter().filter(|s| s.starts_with("category:")).count(),
            1
        );
    }

    #[test]
    fn private_template_leaves_public_list_alone() {
        let private = plan(&Mutation::Template {
            kind: MutationKind::Update,
            template_id: 3,
            author_id: user(9),
            public_before: false,
            public_after: false,
        });
        assert!(!private.keys.contains(&keys::templates_public()));
        assert!(private.keys.contains(&keys::template(3)));
        assert!(private.keys.contains(&keys::templates_by_author(user(9))));
        assert_eq!(private.patterns, vec![keys::templates_admin_pattern()]);

        let unpublished = plan(&Mutation::Template {
            kind: MutationKind::Update,
            template_id: 3,
            author_id: user(9),
            public_before: true,
            public_after: false,
        });
        assert!(unpublished.keys.contains(&keys::templates_public()));
    }

    #[test]
    fn profile_update_is_a_single_key() {
        let p = plan(&Mutation::UserProfile { user_id: user(4) });
        assert_eq!(p.keys, vec![keys::user_profile(user(4))]);
        assert!(p.patterns.is_empty());
    }

    #[test]
    fn comment_activity_drops_every_page_of_the_thread() {
        let p = plan(&Mutation::Comments { recipe_id: 8 });
        assert!(p.keys.is_empty());
        assert_eq!(p.patterns, vec!["comments:8:*".to_string()]);
    }

    #[test]
    fn faq_change_is_a_single_key() {
        let p = plan(&Mutation::Faqs { recipe_id: 8 });
        assert_eq!(p.keys, vec!["faqs:8".to_string()]);
        assert!(p.patterns.is_empty());
    }

    #[tokio::test]
    async fn comment_like_clears_cached_pages_but_not_faqs() {
        let cache = Cache::new(MemoryClient::new(), "");
        let invalidator = Invalidator::new(cache.clone());
        let first = Params::new().with("page", 1).with("limit", 20);
        let second = Params::new().with("page", 2).with("limit", 20);

        cache.set(&keys::comments(4, &first), &vec![1], TTL).await.unwrap();
        cache.set(&keys::comments(4, &second), &vec![2], TTL).await.unwrap();
        cache.set(&keys::comments(40, &first), &vec![3], TTL).await.unwrap();
        cache.set(&keys::faqs(4), &vec!["q"], TTL).await.unwrap();

        let report = invalidator.invalidate(&Mutation::Comments { recipe_id: 4 }).await;

        assert_eq!(report.pattern_keys_deleted, 2);
        let other: Option<Vec<i64>> = cache.get(&keys::comments(40, &first)).await.unwrap();
        assert_eq!(other, Some(vec![3]));
        let faqs: Option<Vec<String>> = cache.get(&keys::faqs(4)).await.unwrap();
        assert_eq!(faqs, Some(vec!["q".to_string()]));

        invalidator.invalidate(&Mutation::Faqs { recipe_id: 4 }).await;
        let faqs: Option<Vec<String>> = cache.get(&keys::faqs(4)).await.unwrap();
        assert_eq!(faqs, None);
    }

    #[tokio::test]
    async fn category_change_clears_old_and_new_listings() {
        let cache = Cache::new(MemoryClient::new(), "");
        let invalidator = Invalidator::new(cache.clone());
        let page = Params::new().with("page", 1).with("limit", 10);

        cache.set(&keys::category(Category::Dessert, &page), &vec![2], TTL).await.unwrap();
        cache.set(&keys::category(Category::Snack, &page), &Vec::<i64>::new(), TTL).await.unwrap();
        cache.set(&keys::category(Category::Dinner, &page), &vec![7], TTL).await.unwrap();
        cache.set(&keys::recipe_list(&page), &vec![2, 7], TTL).await.unwrap();
        cache.set(&keys::recipe(2), &"dessert", TTL).await.unwrap();

        let report = invalidator
            .invalidate(&Mutation::Recipe {
                kind: MutationKind::Update,
                recipe_id: 2,
                author_id: user(1),
                categories: vec![Category::Dessert, Category::Snack],
            })
            .await;

        assert_eq!(report.failures, 0);
        assert_eq!(report.keys_deleted, 1);
        assert_eq!(report.pattern_keys_deleted, 3);
        let snack: Option<Vec<i64>> = cache.get(&keys::category(Category::Snack, &page)).await.unwrap();
        assert_eq!(snack, None, "next Snack listing must recompute and include R2");
        let dinner: Option<Vec<i64>> = cache.get(&keys::category(Category::Dinner, &page)).await.unwrap();
        assert_eq!(dinner, Some(vec![7]));
    }

    #[tokio::test]
    async fn store_outage_is_reported_not_raised() {
        let client = MemoryClient::new();
        let invalidator = Invalidator::new(Cache::new(client.clone(), ""));
        client.set_unavailable(true);

        let report = invalidator
            .invalidate(&Mutation::Comments { recipe_id: 1 })
            .await;
        assert_eq!(report.failures, 1);

        let report = invalidator
            .invalidate(&Mutation::Recipe {
                kind: MutationKind::Create,
                recipe_id: 1,
                author_id: user(1),
                categories: vec![],
            })
            .await;
        // one batched key delete + recipes, latest, search
        assert_eq!(report.failures, 4);
    }
}
