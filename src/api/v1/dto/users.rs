/*
 * Responsibility
 * - Users の request/response DTO
 * - validation (形式チェック) 用の validate()
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::repos::user_repo::UserRow;

const MAX_NAME: usize = 50;
const MAX_BIO: usize = 500;
const MAX_URL: usize = 256;

// Tri-state field:
// - missing      -> None (do not update)
// - null         -> Some(None) (set NULL)
// - value        -> Some(Some(v))
// Plain `Option<Option<T>>` would read `null` as missing.
fn tri_state<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

fn validate_name(name: &str) -> Result<(), &'static str> {
    let name = name.trim();
    if name.is_empty() {
        return Err("user_name is required");
    }
    if name.chars().count() > MAX_NAME {
        return Err("user_name must be <= 50 chars");
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub user_name: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
}

impl CreateUserRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_name(&self.user_name)?;
        if let Some(bio) = &self.bio
            && bio.chars().count() > MAX_BIO
        {
            return Err("bio must be <= 500 chars");
        }
        if let Some(url) = &self.profile_picture
            && url.len() > MAX_URL
        {
            return Err("profile_picture must be <= 256 chars");
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub user_name: Option<String>,
    #[serde(default, deserialize_with = "tri_state")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "tri_state")]
    pub profile_picture: Option<Option<String>>,
}

impl UpdateUserRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(name) = &self.user_name {
            validate_name(name)?;
        }
        if let Some(Some(bio)) = &self.bio
            && bio.chars().count() > MAX_BIO
        {
            return Err("bio must be <= 500 chars");
        }
        if let Some(Some(url)) = &self.profile_picture
            && url.len() > MAX_URL
        {
            return Err("profile_picture must be <= 256 chars");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub user_name: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for UserResponse {
    fn from(u: UserRow) -> Self {
        Self {
            id: u.id,
            user_name: u.user_name,
            bio: u.bio,
            profile_picture: u.profile_picture,
            created_at: u.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: &str) -> UpdateUserRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn update_distinguishes_missing_from_null() {
        assert_eq!(update(r#"{}"#).bio, None);
        assert_eq!(update(r#"{"bio": null}"#).bio, Some(None));
        assert_eq!(update(r#"{"bio": "hi"}"#).bio, Some(Some("hi".to_string())));
    }

    #[test]
    fn names_must_be_present_and_short() {
        let req = CreateUserRequest {
            user_name: " ".into(),
            bio: None,
            profile_picture: None,
        };
        assert_eq!(req.validate(), Err("user_name is required"));
        assert!(update(&format!(r#"{{"user_name": "{}"}}"#, "x".repeat(51))).validate().is_err());
    }
}
