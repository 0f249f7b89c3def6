//! Cache key construction.
//!
//! Keys are `namespace[:discriminator]`. Parametrized discriminators go through `Params`,
//! which sorts names and form-encodes values so that logically equivalent queries land on
//! the same key. Every `*_pattern` function returns the glob that covers all variants its
//! key builder can produce.
use std::collections::BTreeMap;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use url::form_urlencoded;
use uuid::Uuid;

use crate::domain::Category;

/// Hash of pending like/unlike intents (`{recipe_id}:{user_id}` -> `add` | `remove`).
pub const LIKE_LEDGER: &str = "likes:pending";

/// Canonical parameter tuple.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(BTreeMap<&'static str, String>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &'static str, value: impl ToString) -> Self {
        self.0.insert(name, value.to_string());
        self
    }

    // Absent optional parameters are omitted, not keyed as empty.
    pub fn with_opt<V: ToString>(self, name: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(name, v),
            None => self,
        }
    }

    pub fn canonical(&self) -> String {
        let mut ser = form_urlencoded::Serializer::new(String::new());
        for (name, value) in &self.0 {
            ser.append_pair(name, value);
        }
        ser.finish()
    }
}

/// Normalize a free-text search term and hash it to a fixed-length discriminator.
pub fn search_digest(term: &str) -> String {
    let normalized = term
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    URL_SAFE_NO_PAD.encode(Sha256::digest(normalized.as_bytes()))
}

// recipes

pub fn recipe(id: i64) -> String {
    format!("recipe:{id}")
}

pub fn recipe_list(params: &Params) -> String {
    format!("recipes:{}", params.canonical())
}

pub fn recipe_list_pattern() -> String {
    "recipes:*".to_string()
}

pub fn latest(params: &Params) -> String {
    format!("latest:{}", params.canonical())
}

pub fn latest_pattern() -> String {
    "latest:*".to_string()
}

pub fn category(category: Category, params: &Params) -> String {
    format!("category:{category}:{}", params.canonical())
}

pub fn category_pattern(category: Category) -> String {
    format!("category:{category}:*")
}

pub fn search(term: &str, params: &Params) -> String {
    format!("search:{}:{}", search_digest(term), params.canonical())
}

pub fn search_pattern() -> String {
    "search:*".to_string()
}

pub fn comments(recipe_id: i64, params: &Params) -> String {
    format!("comments:{recipe_id}:{}", params.canonical())
}

pub fn comments_pattern(recipe_id: i64) -> String {
    format!("comments:{recipe_id}:*")
}

// At most a handful per recipe, so one unparametrized key.
pub fn faqs(recipe_id: i64) -> String {
    format!("faqs:{recipe_id}")
}

pub fn like_set(recipe_id: i64) -> String {
    format!("likes:{recipe_id}")
}

// users

pub fn user_profile(user_id: Uuid) -> String {
    format!("user:{user_id}")
}

pub fn user_created(user_id: Uuid) -> String {
    format!("user:{user_id}:created")
}

pub fn user_saved(user_id: Uuid) -> String {
    format!("user:{user_id}:saved")
}

// Every user's saved list; they embed recipe summaries.
pub fn user_saved_pattern() -> String {
    "user:*:saved".to_string()
}

// templates

pub fn template(id: i64) -> String {
    format!("template:{id}")
}

pub fn templates_public() -> String {
    "templates:public".to_string()
}

pub fn templates_by_author(author_id: Uuid) -> String {
    format!("templates:author:{author_id}")
}

pub fn templates_admin(params: &Params) -> String {
    format!("templates:admin:{}", params.canonical())
}

pub fn templates_admin_pattern() -> String {
    "templates:admin:*".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glob::Pattern;

    fn glob_match(pattern: &str, key: &str) -> bool {
        Pattern::new(pattern).unwrap().matches(key)
    }

    #[test]
    fn parameter_order_does_not_change_the_key() {
        let a = Params::new().with("page", 2).with("limit", 10);
        let b = Params::new().with("limit", 10).with("page", 2);
        assert_eq!(recipe_list(&a), recipe_list(&b));
        assert_eq!(recipe_list(&a), "recipes:limit=10&page=2");
    }

    #[test]
    fn absent_parameters_are_omitted() {
        let none: Option<&str> = None;
        let p = Params::new().with("page", 1).with_opt("search", none);
        assert_eq!(p.canonical(), "page=1");
    }

    #[test]
    fn values_cannot_forge_extra_parameters() {
        let p = Params::new().with("search", "a&page=9");
        assert_eq!(p.canonical(), "search=a%26page%3D9");
    }

    #[test]
    fn search_terms_are_normalized_before_hashing() {
        let p = Params::new().with("limit", 10);
        assert_eq!(search("  Chocolate   Cake ", &p), search("chocolate cake", &p));
        assert_ne!(search("chocolate cake", &p), search("carrot cake", &p));
        assert!(glob_match(&search_pattern(), &search("x", &p)));
    }

    #[test]
    fn patterns_cover_their_keys_only() {
        let p = Params::new().with("page", 1);
        assert!(glob_match(&recipe_list_pattern(), &recipe_list(&p)));
        assert!(!glob_match(&recipe_list_pattern(), &recipe(1)));
        assert!(glob_match(
            &category_pattern(Category::Dessert),
            &category(Category::Dessert, &p)
        ));
        assert!(!glob_match(
            &category_pattern(Category::Dessert),
            &category(Category::Snack, &p)
        ));
        assert!(glob_match(&comments_pattern(7), &comments(7, &p)));
        assert!(!glob_match(&comments_pattern(7), &comments(70, &p)));
        assert!(!glob_match(&templates_admin_pattern(), &templates_public()));
    }
}
