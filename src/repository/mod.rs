use crate::{
    models::{
        Article, ArticleFilter, Category, CreateArticleRequest, CreateReviewRequest, NewUser,
        Review, Tag, UpdateArticleRequest, UpdateReviewRequest, User,
    },
    policy::Visibility,
};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

mod memory;
mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// RepositoryError
///
/// A persistence failure. Every variant surfaces as a 500 unless a handler
/// asks `is_unique_violation` first.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// Foreign-key or restrict violation detected by the in-memory store.
    #[error("constraint violation: {0}")]
    Constraint(String),
    /// Unique violation detected by the in-memory store.
    #[error("duplicate value: {0}")]
    Duplicate(String),
}

impl RepositoryError {
    /// True when a unique index rejected the write, in either store.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            RepositoryError::Duplicate(_) => true,
            RepositoryError::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

pub type RepoResult<T> = Result<T, RepositoryError>;

/// Repository Trait
///
/// Abstract contract for all persistence operations. Handlers only talk to
/// `Arc<dyn Repository>`, so Postgres and the in-memory store are
/// interchangeable.
///
/// Authorization is not done here: handlers consult `crate::policy` first.
/// The only policy-shaped input is the `Visibility` scope of list queries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    // Fails with a constraint violation when the email is taken.
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    // Insert by email, or refresh name and image of the existing user.
    async fn upsert_user(&self, user: NewUser) -> RepoResult<User>;

    // --- Articles ---
    // Newest first, restricted to what `scope` admits.
    async fn list_articles(
        &self,
        scope: &Visibility,
        filter: &ArticleFilter,
    ) -> RepoResult<Vec<Article>>;
    // Every article of one author, drafts included.
    async fn list_articles_by_author(&self, author_id: Uuid) -> RepoResult<Vec<Article>>;
    // No visibility check; callers apply `policy::can_read`.
    async fn get_article(&self, id: Uuid) -> RepoResult<Option<Article>>;
    // Tags are connected or created by name. A missing category is a
    // constraint violation.
    async fn create_article(&self, author_id: Uuid, req: CreateArticleRequest)
    -> RepoResult<Article>;
    // Partial update; `None` when the article does not exist.
    async fn update_article(&self, id: Uuid, req: UpdateArticleRequest)
    -> RepoResult<Option<Article>>;
    async fn delete_article(&self, id: Uuid) -> RepoResult<bool>;

    // --- Reviews ---
    async fn list_reviews(&self, scope: &Visibility) -> RepoResult<Vec<Review>>;
    async fn list_reviews_by_author(&self, author_id: Uuid) -> RepoResult<Vec<Review>>;
    async fn get_review(&self, id: Uuid) -> RepoResult<Option<Review>>;
    async fn create_review(&self, author_id: Uuid, req: CreateReviewRequest) -> RepoResult<Review>;
    async fn update_review(&self, id: Uuid, req: UpdateReviewRequest)
    -> RepoResult<Option<Review>>;
    async fn delete_review(&self, id: Uuid) -> RepoResult<bool>;

    // --- Categories ---
    // Ordered by name.
    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>>;
    async fn create_category(&self, name: &str) -> RepoResult<Category>;
    async fn rename_category(&self, id: Uuid, name: &str) -> RepoResult<Option<Category>>;
    // Fails with a constraint violation while articles still reference it.
    async fn delete_category(&self, id: Uuid) -> RepoResult<bool>;

    // --- Tags ---
    async fn list_tags(&self) -> RepoResult<Vec<Tag>>;
    async fn get_tag(&self, id: Uuid) -> RepoResult<Option<Tag>>;
    // Idempotent: returns the existing tag when the name is taken.
    async fn connect_or_create_tag(&self, name: &str) -> RepoResult<Tag>;
    async fn rename_tag(&self, id: Uuid, name: &str) -> RepoResult<Option<Tag>>;
    async fn delete_tag(&self, id: Uuid) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The shared handle to the persistence layer stored in the application state.
pub type RepositoryState = Arc<dyn Repository>;

/// Categories and tags every fresh store starts with.
pub const DEFAULT_CATEGORIES: [&str; 4] = ["Technology", "Travel", "Food", "Lifestyle"];
pub const DEFAULT_TAGS: [&str; 4] = ["Programming", "Design", "Tutorial", "Review"];
