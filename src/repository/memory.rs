use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DEFAULT_CATEGORIES, DEFAULT_TAGS, RepoResult, Repository, RepositoryError};
use crate::{
    models::{
        Article, ArticleFilter, AuthorSummary, Category, CreateArticleRequest,
        CreateReviewRequest, NewUser, Review, Tag, UpdateArticleRequest, UpdateReviewRequest,
        User, normalize_tag_names,
    },
    policy::Visibility,
};

#[derive(Clone)]
struct ArticleRecord {
    id: Uuid,
    title: String,
    content: String,
    published: bool,
    author_id: Uuid,
    category_id: Uuid,
    tag_ids: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone)]
struct ReviewRecord {
    id: Uuid,
    title: String,
    content: String,
    rating: i32,
    published: bool,
    author_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    categories: Vec<Category>,
    tags: Vec<Tag>,
    articles: Vec<ArticleRecord>,
    reviews: Vec<ReviewRecord>,
}

impl Tables {
    fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn author(&self, id: Uuid) -> AuthorSummary {
        self.user(id)
            .map(|u| AuthorSummary {
                name: u.name.clone(),
                email: u.email.clone(),
            })
            .unwrap_or_default()
    }

    fn article(&self, record: &ArticleRecord) -> Article {
        let category = self
            .categories
            .iter()
            .find(|c| c.id == record.category_id)
            .cloned()
            .unwrap_or_default();

        let mut tags: Vec<Tag> = self
            .tags
            .iter()
            .filter(|t| record.tag_ids.contains(&t.id))
            .cloned()
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));

        Article {
            id: record.id,
            title: record.title.clone(),
            content: record.content.clone(),
            published: record.published,
            author_id: record.author_id,
            author: self.author(record.author_id),
            category,
            tags,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    fn review(&self, record: &ReviewRecord) -> Review {
        Review {
            id: record.id,
            title: record.title.clone(),
            content: record.content.clone(),
            rating: record.rating,
            published: record.published,
            author_id: record.author_id,
            author: self.author(record.author_id),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    fn require_category(&self, id: Uuid) -> RepoResult<()> {
        if self.categories.iter().any(|c| c.id == id) {
            Ok(())
        } else {
            Err(RepositoryError::Constraint(format!(
                "articles.category_id references missing category {id}"
            )))
        }
    }

    fn connect_or_create(&mut self, name: &str) -> Tag {
        if let Some(tag) = self.tags.iter().find(|t| t.name == name) {
            return tag.clone();
        }
        let tag = Tag {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.tags.push(tag.clone());
        tag
    }

    fn connect_all(&mut self, names: &[String]) -> Vec<Uuid> {
        normalize_tag_names(names)
            .iter()
            .map(|name| self.connect_or_create(name).id)
            .collect()
    }
}

fn newest_first<T>(items: &mut [T], created_at: impl Fn(&T) -> DateTime<Utc>) {
    items.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn matches_filter(article: &Article, filter: &ArticleFilter) -> bool {
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let needle = search.to_lowercase();
        let hit = contains_ci(&article.title, &needle)
            || contains_ci(&article.content, &needle)
            || article.tags.iter().any(|t| contains_ci(&t.name, &needle));
        if !hit {
            return false;
        }
    }
    if let Some(category) = filter.category.as_deref() {
        if article.category.name != category {
            return false;
        }
    }
    if let Some(tag) = filter.tag.as_deref() {
        if !article.tags.iter().any(|t| t.name == tag) {
            return false;
        }
    }
    true
}

/// InMemoryRepository
///
/// A `Repository` held entirely in process memory. It enforces the same
/// unique and foreign-key rules as the SQL schema, reporting violations as
/// `RepositoryError::Duplicate` or `RepositoryError::Constraint`. Used by the
/// test suite and by `USE_IN_MEMORY_STORE=1` for local demos.
#[derive(Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

impl InMemoryRepository {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding the default categories and tags.
    pub fn seeded() -> Self {
        let mut tables = Tables::default();
        for name in DEFAULT_CATEGORIES {
            tables.categories.push(Category {
                id: Uuid::new_v4(),
                name: name.to_string(),
            });
        }
        for name in DEFAULT_TAGS {
            tables.connect_or_create(name);
        }
        Self {
            tables: RwLock::new(tables),
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    // --- USERS ---

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.tables.read().await.user(id).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.email == user.email) {
            return Err(RepositoryError::Duplicate(format!(
                "users.email {} already exists",
                user.email
            )));
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            image: user.image,
            password_hash: user.password_hash,
            created_at: Utc::now(),
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    async fn upsert_user(&self, user: NewUser) -> RepoResult<User> {
        let mut tables = self.tables.write().await;
        if let Some(existing) = tables.users.iter_mut().find(|u| u.email == user.email) {
            existing.name = user.name;
            existing.image = user.image;
            return Ok(existing.clone());
        }
        let created = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            image: user.image,
            password_hash: None,
            created_at: Utc::now(),
        };
        tables.users.push(created.clone());
        Ok(created)
    }

    // --- ARTICLES ---

    async fn list_articles(
        &self,
        scope: &Visibility,
        filter: &ArticleFilter,
    ) -> RepoResult<Vec<Article>> {
        let tables = self.tables.read().await;
        let mut articles: Vec<Article> = tables
            .articles
            .iter()
            .map(|record| tables.article(record))
            .filter(|article| scope.admits(article.published, &article.author.email))
            .filter(|article| matches_filter(article, filter))
            .collect();
        newest_first(&mut articles, |a| a.created_at);
        Ok(articles)
    }

    async fn list_articles_by_author(&self, author_id: Uuid) -> RepoResult<Vec<Article>> {
        let tables = self.tables.read().await;
        let mut articles: Vec<Article> = tables
            .articles
            .iter()
            .filter(|record| record.author_id == author_id)
            .map(|record| tables.article(record))
            .collect();
        newest_first(&mut articles, |a| a.created_at);
        Ok(articles)
    }

    async fn get_article(&self, id: Uuid) -> RepoResult<Option<Article>> {
        let tables = self.tables.read().await;
        Ok(tables
            .articles
            .iter()
            .find(|record| record.id == id)
            .map(|record| tables.article(record)))
    }

    async fn create_article(
        &self,
        author_id: Uuid,
        req: CreateArticleRequest,
    ) -> RepoResult<Article> {
        let mut tables = self.tables.write().await;
        if tables.user(author_id).is_none() {
            return Err(RepositoryError::Constraint(format!(
                "articles.author_id references missing user {author_id}"
            )));
        }
        // Checked before any tag is created so a failed insert leaves no trace.
        tables.require_category(req.category_id)?;

        let tag_ids = tables.connect_all(&req.tags);
        let now = Utc::now();
        let record = ArticleRecord {
            id: Uuid::new_v4(),
            title: req.title,
            content: req.content,
            published: req.published,
            author_id,
            category_id: req.category_id,
            tag_ids,
            created_at: now,
            updated_at: now,
        };
        let article = tables.article(&record);
        tables.articles.push(record);
        Ok(article)
    }

    async fn update_article(
        &self,
        id: Uuid,
        req: UpdateArticleRequest,
    ) -> RepoResult<Option<Article>> {
        let mut tables = self.tables.write().await;
        let Some(index) = tables.articles.iter().position(|record| record.id == id) else {
            return Ok(None);
        };
        if let Some(category_id) = req.category_id {
            tables.require_category(category_id)?;
        }
        let tag_ids = req.tags.as_deref().map(|names| tables.connect_all(names));

        let record = &mut tables.articles[index];
        if let Some(title) = req.title {
            record.title = title;
        }
        if let Some(content) = req.content {
            record.content = content;
        }
        if let Some(published) = req.published {
            record.published = published;
        }
        if let Some(category_id) = req.category_id {
            record.category_id = category_id;
        }
        if let Some(tag_ids) = tag_ids {
            record.tag_ids = tag_ids;
        }
        record.updated_at = Utc::now();

        let record = record.clone();
        Ok(Some(tables.article(&record)))
    }

    async fn delete_article(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.articles.len();
        tables.articles.retain(|record| record.id != id);
        Ok(tables.articles.len() < before)
    }

    // --- REVIEWS ---

    async fn list_reviews(&self, scope: &Visibility) -> RepoResult<Vec<Review>> {
        let tables = self.tables.read().await;
        let mut reviews: Vec<Review> = tables
            .reviews
            .iter()
            .map(|record| tables.review(record))
            .filter(|review| scope.admits(review.published, &review.author.email))
            .collect();
        newest_first(&mut reviews, |r| r.created_at);
        Ok(reviews)
    }

    async fn list_reviews_by_author(&self, author_id: Uuid) -> RepoResult<Vec<Review>> {
        let tables = self.tables.read().await;
        let mut reviews: Vec<Review> = tables
            .reviews
            .iter()
            .filter(|record| record.author_id == author_id)
            .map(|record| tables.review(record))
            .collect();
        newest_first(&mut reviews, |r| r.created_at);
        Ok(reviews)
    }

    async fn get_review(&self, id: Uuid) -> RepoResult<Option<Review>> {
        let tables = self.tables.read().await;
        Ok(tables
            .reviews
            .iter()
            .find(|record| record.id == id)
            .map(|record| tables.review(record)))
    }

    async fn create_review(&self, author_id: Uuid, req: CreateReviewRequest) -> RepoResult<Review> {
        let mut tables = self.tables.write().await;
        if tables.user(author_id).is_none() {
            return Err(RepositoryError::Constraint(format!(
                "reviews.author_id references missing user {author_id}"
            )));
        }
        let now = Utc::now();
        let record = ReviewRecord {
            id: Uuid::new_v4(),
            title: req.title,
            content: req.content,
            rating: req.rating,
            published: req.published,
            author_id,
            created_at: now,
            updated_at: now,
        };
        let review = tables.review(&record);
        tables.reviews.push(record);
        Ok(review)
    }

    async fn update_review(&self, id: Uuid, req: UpdateReviewRequest) -> RepoResult<Option<Review>> {
        let mut tables = self.tables.write().await;
        let Some(record) = tables.reviews.iter_mut().find(|record| record.id == id) else {
            return Ok(None);
        };
        if let Some(title) = req.title {
            record.title = title;
        }
        if let Some(content) = req.content {
            record.content = content;
        }
        if let Some(rating) = req.rating {
            record.rating = rating;
        }
        if let Some(published) = req.published {
            record.published = published;
        }
        record.updated_at = Utc::now();

        let record = record.clone();
        Ok(Some(tables.review(&record)))
    }

    async fn delete_review(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.reviews.len();
        tables.reviews.retain(|record| record.id != id);
        Ok(tables.reviews.len() < before)
    }

    // --- CATEGORIES ---

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let mut categories = self.tables.read().await.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        let tables = self.tables.read().await;
        Ok(tables.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn create_category(&self, name: &str) -> RepoResult<Category> {
        let mut tables = self.tables.write().await;
        if tables.categories.iter().any(|c| c.name == name) {
            return Err(RepositoryError::Duplicate(format!(
                "categories.name {name} already exists"
            )));
        }
        let category = Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        tables.categories.push(category.clone());
        Ok(category)
    }

    async fn rename_category(&self, id: Uuid, name: &str) -> RepoResult<Option<Category>> {
        let mut tables = self.tables.write().await;
        if tables.categories.iter().any(|c| c.name == name && c.id != id) {
            return Err(RepositoryError::Duplicate(format!(
                "categories.name {name} already exists"
            )));
        }
        Ok(tables
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .map(|category| {
                category.name = name.to_string();
                category.clone()
            }))
    }

    async fn delete_category(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.articles.iter().any(|record| record.category_id == id) {
            return Err(RepositoryError::Constraint(format!(
                "category {id} is still referenced by articles"
            )));
        }
        let before = tables.categories.len();
        tables.categories.retain(|c| c.id != id);
        Ok(tables.categories.len() < before)
    }

    // --- TAGS ---

    async fn list_tags(&self) -> RepoResult<Vec<Tag>> {
        let mut tags = self.tables.read().await.tags.clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn get_tag(&self, id: Uuid) -> RepoResult<Option<Tag>> {
        let tables = self.tables.read().await;
        Ok(tables.tags.iter().find(|t| t.id == id).cloned())
    }

    async fn connect_or_create_tag(&self, name: &str) -> RepoResult<Tag> {
        Ok(self.tables.write().await.connect_or_create(name))
    }

    async fn rename_tag(&self, id: Uuid, name: &str) -> RepoResult<Option<Tag>> {
        let mut tables = self.tables.write().await;
        if tables.tags.iter().any(|t| t.name == name && t.id != id) {
            return Err(RepositoryError::Duplicate(format!(
                "tags.name {name} already exists"
            )));
        }
        Ok(tables.tags.iter_mut().find(|t| t.id == id).map(|tag| {
            tag.name = name.to_string();
            tag.clone()
        }))
    }

    async fn delete_tag(&self, id: Uuid) -> RepoResult<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.tags.len();
        tables.tags.retain(|t| t.id != id);
        let removed = tables.tags.len() < before;
        if removed {
            // article_tags rows cascade in SQL.
            for record in tables.articles.iter_mut() {
                record.tag_ids.retain(|tag_id| *tag_id != id);
            }
        }
        Ok(removed)
    }
}
