//! JSON-shaped parts of a recipe (stored as `jsonb`, returned as-is).
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub quantity: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Direction {
    pub step: i32,
    pub instruction: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CookingTime {
    #[serde(default)]
    pub prep: Option<i32>,
    #[serde(default)]
    pub cook: Option<i32>,
}
