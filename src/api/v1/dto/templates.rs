/*
 * Responsibility
 * - Templates の request/response DTO
 * - admin 一覧の query 正規化 (sortBy / sortOrder は閉じた enum に落とす)
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::v1::dto::pagination::Page;
use crate::repos::template_repo::{SortField, SortOrder, TemplateRow};
use crate::services::cache::keys::Params;
use crate::services::id_codec::{self, IdCodec};

const MAX_BODY: usize = 5000;

fn validate_body(body: &str) -> Result<(), &'static str> {
    if body.trim().is_empty() {
        return Err("body is required");
    }
    if body.chars().count() > MAX_BODY {
        return Err("body must be <= 5000 chars");
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct CreateTemplateRequest {
    pub body: String,
    #[serde(default)]
    pub is_public: bool,
}

impl CreateTemplateRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_body(&self.body)
    }
}

#[derive(Debug, Deserialize)]
pub struct SaveTemplateRequest {
    pub body: String,
}

impl SaveTemplateRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_body(&self.body)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateTemplateRequest {
    pub body: Option<String>,
    pub is_public: Option<bool>,
}

impl UpdateTemplateRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(body) = &self.body {
            validate_body(body)?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminTemplatesQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(rename = "sortOrder")]
    pub sort_order: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminTemplatesParams {
    pub page: Page,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
    pub search: Option<String>,
}

impl AdminTemplatesQuery {
    pub fn normalize(&self) -> Result<AdminTemplatesParams, &'static str> {
        let sort_by = match self.sort_by.as_deref() {
            None | Some("createdAt") => SortField::CreatedAt,
            Some("updatedAt") => SortField::UpdatedAt,
            Some("body") => SortField::Body,
            Some(_) => return Err("sortBy must be one of createdAt, updatedAt, body"),
        };
        let sort_order = match self.sort_order.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("desc") => SortOrder::Desc,
            Some("asc") => SortOrder::Asc,
            Some(_) => return Err("sortOrder must be asc or desc"),
        };
        let search = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(AdminTemplatesParams {
            page: Page::new(self.page, self.limit, 10, 100),
            sort_by,
            sort_order,
            search,
        })
    }
}

impl AdminTemplatesParams {
    pub fn cache_params(&self) -> Params {
        let sort_by = match self.sort_by {
            SortField::CreatedAt => "createdAt",
            SortField::UpdatedAt => "updatedAt",
            SortField::Body => "body",
        };
        let sort_order = match self.sort_order {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        };
        self.page
            .params()
            .with("sortBy", sort_by)
            .with("sortOrder", sort_order)
            .with_opt("search", self.search.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateResponse {
    pub id: String,
    pub body: String,
    pub author_id: Uuid,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TemplateResponse {
    pub fn from_row(row: TemplateRow, codec: &IdCodec) -> id_codec::Result<Self> {
        Ok(Self {
            id: codec.encode(row.id)?,
            body: row.body,
            author_id: row.author_id,
            is_public: row.is_public,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    pub fn from_rows(rows: Vec<TemplateRow>, codec: &IdCodec) -> id_codec::Result<Vec<Self>> {
        rows.into_iter().map(|r| Self::from_row(r, codec)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplatePageResponse {
    pub items: Vec<TemplateResponse>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(sort_by: Option<&str>, sort_order: Option<&str>, search: Option<&str>) -> AdminTemplatesQuery {
        AdminTemplatesQuery {
            page: None,
            limit: None,
            sort_by: sort_by.map(str::to_string),
            sort_order: sort_order.map(str::to_string),
            search: search.map(str::to_string),
        }
    }

    #[test]
    fn defaults_collide_with_explicit_defaults() {
        let implicit = query(None, None, Some("  ")).normalize().unwrap();
        let explicit = query(Some("createdAt"), Some("DESC"), None).normalize().unwrap();
        assert_eq!(implicit, explicit);
        assert_eq!(
            implicit.cache_params().canonical(),
            explicit.cache_params().canonical()
        );
    }

    #[test]
    fn unknown_sort_is_rejected() {
        assert!(query(Some("author_id; DROP"), None, None).normalize().is_err());
        assert!(query(None, Some("sideways"), None).normalize().is_err());
    }
}
