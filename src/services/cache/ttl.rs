//! Expiry per logical resource class.
//!
//! The class is picked by the endpoint that produced the value, never a global default.
use std::time::Duration;

use crate::services::cache::client::ttl_seconds;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceClass {
    RecipeDetail,
    RecipeList,
    LatestRecipes,
    CategoryList,
    UserProfile,
    LikeStatus,
    SearchResults,
    Templates,
    Comments,
    Faqs,
}

impl ResourceClass {
    pub const fn seconds(self) -> u64 {
        match self {
            ResourceClass::RecipeDetail => 3600,
            ResourceClass::RecipeList => 1800,
            // time-window freshness matters
            ResourceClass::LatestRecipes => 300,
            ResourceClass::CategoryList => 3600,
            ResourceClass::UserProfile => 1800,
            // reconciled by the like ledger flush
            ResourceClass::LikeStatus => 300,
            ResourceClass::SearchResults => 900,
            ResourceClass::Templates => 1800,
            // threads hang off a recipe and share its duration
            ResourceClass::Comments | ResourceClass::Faqs => 3600,
        }
    }

    pub fn ttl(self) -> Duration {
        ttl_seconds(self.seconds())
    }

    pub fn name(self) -> &'static str {
        match self {
            ResourceClass::RecipeDetail => "recipe_detail",
            ResourceClass::RecipeList => "recipe_list",
            ResourceClass::LatestRecipes => "latest_recipes",
            ResourceClass::CategoryList => "category_list",
            ResourceClass::UserProfile => "user_profile",
            ResourceClass::LikeStatus => "like_status",
            ResourceClass::SearchResults => "search_results",
            ResourceClass::Templates => "templates",
            ResourceClass::Comments => "comments",
            ResourceClass::Faqs => "faqs",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_follow_churn_table() {
        assert_eq!(ResourceClass::RecipeDetail.ttl(), Duration::from_secs(3600));
        assert_eq!(ResourceClass::RecipeList.seconds(), 1800);
        assert_eq!(ResourceClass::LatestRecipes.seconds(), 300);
        assert_eq!(ResourceClass::CategoryList.seconds(), 3600);
        assert_eq!(ResourceClass::UserProfile.seconds(), 1800);
        assert_eq!(ResourceClass::LikeStatus.seconds(), 300);
        assert_eq!(ResourceClass::SearchResults.seconds(), 900);
        assert_eq!(ResourceClass::Templates.seconds(), 1800);
        assert_eq!(ResourceClass::Comments.seconds(), 3600);
        assert_eq!(ResourceClass::Faqs.seconds(), 3600);
    }
}
