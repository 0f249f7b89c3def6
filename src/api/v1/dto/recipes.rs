/*
 * Responsibility
 * - Recipes / likes / saves の request/response DTO
 * - validation (形式チェック) 用の validate()
 * - query の正規化 (デフォルト適用) はキャッシュキー生成より前に行う
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::v1::dto::pagination::Page;
use crate::domain::{
    Category,
    recipe::{CookingTime, Direction, Ingredient},
};
use crate::repos::recipe_repo::RecipeRow;
use crate::services::id_codec::{self, IdCodec};

const MAX_TITLE: usize = 200;
const MAX_DESCRIPTION: usize = 2000;
const MAX_ITEMS: usize = 100;
const MAX_SEARCH: usize = 100;

#[derive(Debug, Deserialize)]
pub struct ListRecipesQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<String>,
}

impl ListRecipesQuery {
    pub fn normalize(&self) -> Result<(Page, Option<Category>), &'static str> {
        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(c) => Some(c.parse::<Category>().map_err(|_| "unknown category")?),
        };
        Ok((Page::new(self.page, self.limit, 10, 50), category))
    }
}

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    pub limit: Option<i64>,
}

impl LatestQuery {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(10).clamp(1, 50)
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub limit: Option<i64>,
}

impl SearchQuery {
    pub fn normalize(&self) -> Result<(String, i64), &'static str> {
        let term = self.q.as_deref().map(str::trim).unwrap_or_default();
        if term.is_empty() {
            return Err("q is required");
        }
        if term.chars().count() > MAX_SEARCH {
            return Err("q must be <= 100 chars");
        }
        Ok((term.to_string(), self.limit.unwrap_or(20).clamp(1, 50)))
    }
}

fn validate_parts(
    title: Option<&str>,
    description: Option<&str>,
    ingredients: Option<&[Ingredient]>,
    directions: Option<&[Direction]>,
    cooking_time: Option<&CookingTime>,
) -> Result<(), &'static str> {
    if let Some(title) = title {
        if title.trim().is_empty() {
            return Err("title is required");
        }
        if title.chars().count() > MAX_TITLE {
            return Err("title must be <= 200 chars");
        }
    }
    if let Some(d) = description
        && d.chars().count() > MAX_DESCRIPTION
    {
        return Err("description must be <= 2000 chars");
    }
    if let Some(ingredients) = ingredients {
        if ingredients.is_empty() {
            return Err("at least one ingredient is required");
        }
        if ingredients.len() > MAX_ITEMS {
            return Err("too many ingredients");
        }
        if ingredients.iter().any(|i| i.name.trim().is_empty()) {
            return Err("ingredient name is required");
        }
    }
    if let Some(directions) = directions {
        if directions.len() > MAX_ITEMS {
            return Err("too many directions");
        }
        if directions.iter().any(|d| d.instruction.trim().is_empty()) {
            return Err("direction instruction is required");
        }
    }
    if let Some(t) = cooking_time
        && (t.prep.is_some_and(|m| m < 0) || t.cook.is_some_and(|m| m < 0))
    {
        return Err("cooking time must be non-negative");
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    pub title: String,
    pub description: Option<String>,
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub directions: Vec<Direction>,
    #[serde(default)]
    pub cooking_time: CookingTime,
    pub category: Option<Category>,
    // public template id
    pub template_id: Option<String>,
}

impl CreateRecipeRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_parts(
            Some(self.title.as_str()),
            self.description.as_deref(),
            Some(self.ingredients.as_slice()),
            Some(self.directions.as_slice()),
            Some(&self.cooking_time),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecipeRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub ingredients: Option<Vec<Ingredient>>,
    pub directions: Option<Vec<Direction>>,
    pub cooking_time: Option<CookingTime>,
    pub category: Option<Category>,
}

impl UpdateRecipeRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_parts(
            self.title.as_deref(),
            self.description.as_deref(),
            self.ingredients.as_deref(),
            self.directions.as_deref(),
            self.cooking_time.as_ref(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub ingredients: Vec<Ingredient>,
    pub directions: Vec<Direction>,
    pub cooking_time: CookingTime,
    pub category: Option<Category>,
    pub template_id: Option<String>,
    pub author_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RecipeResponse {
    pub fn from_row(row: RecipeRow, codec: &IdCodec) -> id_codec::Result<Self> {
        let category = row.category();
        Ok(Self {
            id: codec.encode(row.id)?,
            title: row.title,
            description: row.description,
            ingredients: row.ingredients.0,
            directions: row.directions.0,
            cooking_time: CookingTime {
                prep: row.prep_minutes,
                cook: row.cook_minutes,
            },
            category,
            template_id: row.template_id.map(|t| codec.encode(t)).transpose()?,
            author_id: row.author_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    pub fn from_rows(rows: Vec<RecipeRow>, codec: &IdCodec) -> id_codec::Result<Vec<Self>> {
        rows.into_iter().map(|r| Self::from_row(r, codec)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeListResponse {
    pub items: Vec<RecipeResponse>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Serialize)]
pub struct LikeStatusResponse {
    pub likes: usize,
    // present only when the caller identified themselves
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
}

const MAX_LIKE_COUNT_IDS: usize = 50;

/// `?ids=a,b,c` with public recipe ids.
#[derive(Debug, Deserialize)]
pub struct LikeCountsQuery {
    pub ids: String,
}

impl LikeCountsQuery {
    // Request order is kept, duplicates included.
    pub fn public_ids(&self) -> Result<Vec<&str>, &'static str> {
        let ids: Vec<&str> = self
            .ids
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if ids.is_empty() {
            return Err("ids is required");
        }
        if ids.len() > MAX_LIKE_COUNT_IDS {
            return Err("at most 50 ids per request");
        }
        Ok(ids)
    }
}

#[derive(Debug, Serialize)]
pub struct LikeCountResponse {
    pub id: String,
    pub likes: usize,
}

#[derive(Debug, Serialize)]
pub struct ToggleLikeResponse {
    pub liked: bool,
    pub likes: usize,
}

#[derive(Debug, Serialize)]
pub struct ToggleSaveResponse {
    pub saved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(json: serde_json::Value) -> CreateRecipeRequest {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn create_requires_title_and_ingredients() {
        let ok = create(serde_json::json!({
            "title": "Pancakes",
            "ingredients": [{"name": "flour", "quantity": "200", "unit": "g"}],
            "category": "Breakfast"
        }));
        assert_eq!(ok.validate(), Ok(()));
        assert_eq!(ok.category, Some(Category::Breakfast));

        let blank = create(serde_json::json!({
            "title": "  ",
            "ingredients": [{"name": "flour", "quantity": "200"}]
        }));
        assert_eq!(blank.validate(), Err("title is required"));

        let empty = create(serde_json::json!({"title": "Water", "ingredients": []}));
        assert!(empty.validate().is_err());
    }

    #[test]
    fn update_rejects_negative_minutes() {
        let req: UpdateRecipeRequest =
            serde_json::from_value(serde_json::json!({"cooking_time": {"prep": -5}})).unwrap();
        assert!(req.validate().is_err());
    }

    #[test]
    fn list_query_parses_category_case_insensitively() {
        let q = ListRecipesQuery {
            page: None,
            limit: None,
            category: Some("dessert".into()),
        };
        let (page, category) = q.normalize().unwrap();
        assert_eq!(category, Some(Category::Dessert));
        assert_eq!((page.page, page.limit), (1, 10));

        let bad = ListRecipesQuery {
            page: None,
            limit: None,
            category: Some("brunch".into()),
        };
        assert!(bad.normalize().is_err());
    }

    #[test]
    fn search_requires_a_term() {
        let q = SearchQuery {
            q: Some("   ".into()),
            limit: None,
        };
        assert!(q.normalize().is_err());
        let q = SearchQuery {
            q: Some(" cake ".into()),
            limit: Some(500),
        };
        assert_eq!(q.normalize(), Ok(("cake".to_string(), 50)));
    }

    #[test]
    fn like_count_ids_are_split_and_bounded() {
        let q = LikeCountsQuery {
            ids: " a, b,,a ".into(),
        };
        assert_eq!(q.public_ids().unwrap(), vec!["a", "b", "a"]);

        let q = LikeCountsQuery { ids: " , ".into() };
        assert_eq!(q.public_ids(), Err("ids is required"));

        let q = LikeCountsQuery {
            ids: vec!["x"; 51].join(","),
        };
        assert_eq!(q.public_ids(), Err("at most 50 ids per request"));
    }

}
