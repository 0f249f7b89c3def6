/*
 * Responsibility
 * - Comments の request/response DTO
 */
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repos::comment_repo::CommentRow;
use crate::services::id_codec::{self, IdCodec};

const MAX_CONTENT: usize = 2000;

fn validate_content(content: &str) -> Result<(), &'static str> {
    if content.trim().is_empty() {
        return Err("content is required");
    }
    if content.chars().count() > MAX_CONTENT {
        return Err("content must be <= 2000 chars");
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct ListCommentsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    // public id of the comment being answered
    pub parent_id: Option<String>,
}

impl CreateCommentRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_content(&self.content)
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
}

impl UpdateCommentRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_content(&self.content)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentResponse {
    pub id: String,
    pub recipe_id: String,
    pub author_id: Uuid,
    pub parent_id: Option<String>,
    pub content: String,
    pub is_edited: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub likes: i64,
}

impl CommentResponse {
    pub fn from_row(row: CommentRow, codec: &IdCodec) -> id_codec::Result<Self> {
        Ok(Self {
            id: codec.encode(row.id)?,
            recipe_id: codec.encode(row.recipe_id)?,
            author_id: row.author_id,
            parent_id: row.parent_id.map(|p| codec.encode(p)).transpose()?,
            content: row.content,
            is_edited: row.is_edited,
            created_at: row.created_at,
            updated_at: row.updated_at,
            likes: row.likes,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ToggleCommentLikeResponse {
    pub liked: bool,
    pub likes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentListResponse {
    pub items: Vec<CommentResponse>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}
