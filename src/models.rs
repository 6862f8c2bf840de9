use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::policy::Authored;

/// Highest rating a review may carry.
pub const MAX_RATING: i32 = 5;

// --- Core Application Schemas (Mapped to Database) ---

/// User
///
/// A row of the `users` table. Users created through GitHub sign-in have no
/// password hash; credential users always do. The hash never leaves the server.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    // Unique; this is what ownership checks compare.
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    #[serde(skip)]
    #[ts(skip)]
    pub password_hash: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// NewUser
///
/// Insert payload for the `users` table, built by the registration and
/// sign-in handlers.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: String,
    pub name: Option<String>,
    pub image: Option<String>,
    pub password_hash: Option<String>,
}

/// Category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
}

/// Tag
///
/// Tags are created on demand when an article references a name that does
/// not exist yet ("connect or create").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
}

/// AuthorSummary
///
/// The slice of the author embedded in article and review responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct AuthorSummary {
    pub name: Option<String>,
    pub email: String,
}

/// Article
///
/// An article as served by the API: the `articles` row joined with its
/// author, its category and its tag set.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    // Drafts (false) are visible to their author only.
    pub published: bool,
    pub author_id: Uuid,
    pub author: AuthorSummary,
    pub category: Category,
    pub tags: Vec<Tag>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// Review
///
/// A review as served by the API, joined with its author.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct Review {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    /// 0 to 5 inclusive.
    pub rating: i32,
    pub published: bool,
    pub author_id: Uuid,
    pub author: AuthorSummary,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

impl Authored for Article {
    fn is_published(&self) -> bool {
        self.published
    }

    fn author_email(&self) -> &str {
        &self.author.email
    }
}

impl Authored for Review {
    fn is_published(&self) -> bool {
        self.published
    }

    fn author_email(&self) -> &str {
        &self.author.email
    }
}

// --- Query Parameters ---

/// ArticleFilter
///
/// Query parameters accepted by `GET /articles`.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct ArticleFilter {
    /// Case-insensitive match against title, content or any tag name.
    pub search: Option<String>,
    /// Exact category name.
    pub category: Option<String>,
    /// Exact tag name.
    pub tag: Option<String>,
}

// --- Request Payloads (Input Schemas) ---

/// CreateArticleRequest
///
/// Input payload for `POST /articles`. Tags are given by name and are
/// connected to existing tags or created.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateArticleRequest {
    pub title: String,
    pub content: String,
    pub category_id: Uuid,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published: bool,
}

/// UpdateArticleRequest
///
/// Partial update payload for `PUT /articles/{id}`. When `tags` is present it
/// replaces the article's whole tag set.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateArticleRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

/// CreateReviewRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateReviewRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub rating: i32,
    #[serde(default)]
    pub published: bool,
}

/// UpdateReviewRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateReviewRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
}

/// NameRequest
///
/// Payload for creating or renaming a category or a tag.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct NameRequest {
    pub name: String,
}

/// RegisterUserRequest
///
/// Input payload for `POST /auth/register`. The password is hashed before it
/// reaches the repository and is never logged.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct RegisterUserRequest {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub password: String,
}

/// LoginRequest
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// SessionResponse
///
/// Returned by every sign-in flow: the bearer token and the signed-in user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

// --- Validation ---

fn require_text(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} must not be empty"));
    }
    Ok(())
}

fn require_rating(rating: i32) -> Result<(), String> {
    if !(0..=MAX_RATING).contains(&rating) {
        return Err(format!("rating must be between 0 and {MAX_RATING}"));
    }
    Ok(())
}

impl CreateArticleRequest {
    pub fn validate(&self) -> Result<(), String> {
        require_text("title", &self.title)?;
        require_text("content", &self.content)
    }
}

impl UpdateArticleRequest {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        if let Some(content) = &self.content {
            require_text("content", content)?;
        }
        Ok(())
    }
}

impl CreateReviewRequest {
    pub fn validate(&self) -> Result<(), String> {
        require_text("title", &self.title)?;
        require_text("content", &self.content)?;
        require_rating(self.rating)
    }
}

impl UpdateReviewRequest {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(title) = &self.title {
            require_text("title", title)?;
        }
        if let Some(content) = &self.content {
            require_text("content", content)?;
        }
        match self.rating {
            Some(rating) => require_rating(rating),
            None => Ok(()),
        }
    }
}

impl NameRequest {
    pub fn validate(&self) -> Result<(), String> {
        require_text("name", &self.name)
    }
}

impl RegisterUserRequest {
    pub fn validate(&self) -> Result<(), String> {
        if !self.email.contains('@') {
            return Err("email is not valid".to_string());
        }
        if self.password.len() < 8 {
            return Err("password must be at least 8 characters".to_string());
        }
        Ok(())
    }
}

/// normalize_tag_names
///
/// Trims tag names, drops blanks and removes duplicates while keeping the
/// first-seen order.
pub fn normalize_tag_names(names: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        let trimmed = name.trim();
        if !trimmed.is_empty() && !seen.iter().any(|s| s == trimmed) {
            seen.push(trimmed.to_string());
        }
    }
    seen
}
