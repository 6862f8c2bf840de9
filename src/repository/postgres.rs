use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool, Postgres, query_builder::QueryBuilder};
use std::collections::HashMap;
use uuid::Uuid;

use super::{RepoResult, Repository, RepositoryError};
use crate::{
    models::{
        Article, ArticleFilter, AuthorSummary, Category, CreateArticleRequest,
        CreateReviewRequest, NewUser, Review, Tag, UpdateArticleRequest, UpdateReviewRequest,
        User, normalize_tag_names,
    },
    policy::Visibility,
};

const USER_COLUMNS: &str = "id, email, name, image, password_hash, created_at";

const ARTICLE_SELECT: &str = r#"
    SELECT
        a.id, a.title, a.content, a.published, a.author_id,
        a.created_at, a.updated_at,
        a.category_id, c.name AS category_name,
        u.name AS author_name, u.email AS author_email
    FROM articles a
    JOIN users u ON u.id = a.author_id
    JOIN categories c ON c.id = a.category_id
"#;

const REVIEW_SELECT: &str = r#"
    SELECT
        r.id, r.title, r.content, r.rating, r.published, r.author_id,
        r.created_at, r.updated_at,
        u.name AS author_name, u.email AS author_email
    FROM reviews r
    JOIN users u ON u.id = r.author_id
"#;

/// ArticleRow
///
/// One `articles` row joined with its author and category. Tags are loaded
/// by a second query and attached in `attach_tags`.
#[derive(FromRow)]
struct ArticleRow {
    id: Uuid,
    title: String,
    content: String,
    published: bool,
    author_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    category_id: Uuid,
    category_name: String,
    author_name: Option<String>,
    author_email: String,
}

impl ArticleRow {
    fn into_article(self, tags: Vec<Tag>) -> Article {
        Article {
            id: self.id,
            title: self.title,
            content: self.content,
            published: self.published,
            author_id: self.author_id,
            author: AuthorSummary {
                name: self.author_name,
                email: self.author_email,
            },
            category: Category {
                id: self.category_id,
                name: self.category_name,
            },
            tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct ArticleTagRow {
    article_id: Uuid,
    id: Uuid,
    name: String,
}

#[derive(FromRow)]
struct ReviewRow {
    id: Uuid,
    title: String,
    content: String,
    rating: i32,
    published: bool,
    author_id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    author_name: Option<String>,
    author_email: String,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            title: row.title,
            content: row.content,
            rating: row.rating,
            published: row.published,
            author_id: row.author_id,
            author: AuthorSummary {
                name: row.author_name,
                email: row.author_email,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// upsert_tag
///
/// Connect-or-create on the unique `tags.name` column. The no-op
/// `DO UPDATE` makes `RETURNING` yield the existing row on conflict.
async fn upsert_tag(conn: &mut PgConnection, name: &str) -> Result<Tag, sqlx::Error> {
    sqlx::query_as::<_, Tag>(
        r#"
        INSERT INTO tags (id, name) VALUES ($1, $2)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id, name
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .fetch_one(&mut *conn)
    .await
}

/// Connects each named tag to the article, creating missing tags.
async fn link_tags(
    conn: &mut PgConnection,
    article_id: Uuid,
    names: &[String],
) -> Result<(), sqlx::Error> {
    for name in names {
        let tag = upsert_tag(&mut *conn, name).await?;
        sqlx::query(
            "INSERT INTO article_tags (article_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(article_id)
        .bind(tag.id)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Escapes `LIKE` metacharacters so a search term matches literally.
/// Used together with `ESCAPE '\'`.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// PostgresRepository
///
/// The `Repository` implementation backed by PostgreSQL through a sqlx pool.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_tags(&self, rows: Vec<ArticleRow>) -> RepoResult<Vec<Article>> {
        if rows.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let tag_rows = sqlx::query_as::<_, ArticleTagRow>(
            r#"
            SELECT at.article_id, t.id, t.name
            FROM article_tags at
            JOIN tags t ON t.id = at.tag_id
            WHERE at.article_id = ANY($1)
            ORDER BY t.name ASC
            "#,
        )
        .bind(&ids[..])
        .fetch_all(&self.pool)
        .await?;

        let mut by_article: HashMap<Uuid, Vec<Tag>> = HashMap::new();
        for row in tag_rows {
            by_article.entry(row.article_id).or_default().push(Tag {
                id: row.id,
                name: row.name,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let tags = by_article.remove(&row.id).unwrap_or_default();
                row.into_article(tags)
            })
            .collect())
    }

    async fn fetch_articles(&self, builder: &mut QueryBuilder<'_, Postgres>) -> RepoResult<Vec<Article>> {
        let rows = builder
            .build_query_as::<ArticleRow>()
            .fetch_all(&self.pool)
            .await?;
        self.attach_tags(rows).await
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let created = sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO users (id, email, name, image, password_hash, created_at)
               VALUES ($1, $2, $3, $4, $5, NOW())
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(user.email)
        .bind(user.name)
        .bind(user.image)
        .bind(user.password_hash)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    /// upsert_user
    ///
    /// Sign-in sync for OAuth users: keyed by email, refreshes name and image,
    /// leaves any stored password hash alone.
    async fn upsert_user(&self, user: NewUser) -> RepoResult<User> {
        let upserted = sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO users (id, email, name, image, created_at)
               VALUES ($1, $2, $3, $4, NOW())
               ON CONFLICT (email) DO UPDATE SET name = EXCLUDED.name, image = EXCLUDED.image
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(user.email)
        .bind(user.name)
        .bind(user.image)
        .fetch_one(&self.pool)
        .await?;
        Ok(upserted)
    }

    // --- ARTICLES ---

    /// list_articles
    ///
    /// The opening WHERE clause is `Visibility::admits` expressed in SQL:
    /// published rows, plus drafts of the scope's owner if there is one.
    async fn list_articles(
        &self,
        scope: &Visibility,
        filter: &ArticleFilter,
    ) -> RepoResult<Vec<Article>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(ARTICLE_SELECT);

        builder.push(" WHERE (a.published = true");
        if let Some(email) = scope.draft_owner() {
            builder.push(" OR u.email = ");
            builder.push_bind(email.to_string());
        }
        builder.push(")");

        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", escape_like(search));
            builder.push(" AND (a.title ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\' OR a.content ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(
                " ESCAPE '\\' OR EXISTS (SELECT 1 FROM article_tags at JOIN tags t ON t.id = at.tag_id \
                 WHERE at.article_id = a.id AND t.name ILIKE ",
            );
            builder.push_bind(pattern);
            builder.push(" ESCAPE '\\'))");
        }

        if let Some(category) = filter.category.as_deref() {
            builder.push(" AND c.name = ");
            builder.push_bind(category.to_string());
        }

        if let Some(tag) = filter.tag.as_deref() {
            builder.push(
                " AND EXISTS (SELECT 1 FROM article_tags at JOIN tags t ON t.id = at.tag_id \
                 WHERE at.article_id = a.id AND t.name = ",
            );
            builder.push_bind(tag.to_string());
            builder.push(")");
        }

        builder.push(" ORDER BY a.created_at DESC");

        self.fetch_articles(&mut builder).await
    }

    async fn list_articles_by_author(&self, author_id: Uuid) -> RepoResult<Vec<Article>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(ARTICLE_SELECT);
        builder.push(" WHERE a.author_id = ");
        builder.push_bind(author_id);
        builder.push(" ORDER BY a.created_at DESC");
        self.fetch_articles(&mut builder).await
    }

    async fn get_article(&self, id: Uuid) -> RepoResult<Option<Article>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(ARTICLE_SELECT);
        builder.push(" WHERE a.id = ");
        builder.push_bind(id);
        Ok(self.fetch_articles(&mut builder).await?.into_iter().next())
    }

    /// create_article
    ///
    /// Inserts the article and connects its tags in one transaction. An
    /// unknown `category_id` trips the foreign key and rolls everything back.
    async fn create_article(
        &self,
        author_id: Uuid,
        req: CreateArticleRequest,
    ) -> RepoResult<Article> {
        let tags = normalize_tag_names(&req.tags);
        let id = Uuid::new_v4();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO articles (id, title, content, published, author_id, category_id, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())"#,
        )
        .bind(id)
        .bind(&req.title)
        .bind(&req.content)
        .bind(req.published)
        .bind(author_id)
        .bind(req.category_id)
        .execute(&mut *tx)
        .await?;

        link_tags(&mut tx, id, &tags).await?;
        tx.commit().await?;

        self.get_article(id)
            .await?
            .ok_or(RepositoryError::Database(sqlx::Error::RowNotFound))
    }

    /// update_article
    ///
    /// `COALESCE` keeps columns whose field is `None`. A present tag list
    /// replaces the article's tag set.
    async fn update_article(
        &self,
        id: Uuid,
        req: UpdateArticleRequest,
    ) -> RepoResult<Option<Article>> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            r#"
            UPDATE articles
            SET title = COALESCE($2, title),
                content = COALESCE($3, content),
                published = COALESCE($4, published),
                category_id = COALESCE($5, category_id),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(req.title)
        .bind(req.content)
        .bind(req.published)
        .bind(req.category_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        if let Some(names) = req.tags {
            sqlx::query("DELETE FROM article_tags WHERE article_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            link_tags(&mut tx, id, &normalize_tag_names(&names)).await?;
        }

        tx.commit().await?;
        self.get_article(id).await
    }

    async fn delete_article(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM articles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- REVIEWS ---

    async fn list_reviews(&self, scope: &Visibility) -> RepoResult<Vec<Review>> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(REVIEW_SELECT);
        builder.push(" WHERE (r.published = true");
        if let Some(email) = scope.draft_owner() {
            builder.push(" OR u.email = ");
            builder.push_bind(email.to_string());
        }
        builder.push(") ORDER BY r.created_at DESC");

        let rows = builder
            .build_query_as::<ReviewRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn list_reviews_by_author(&self, author_id: Uuid) -> RepoResult<Vec<Review>> {
        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            "{REVIEW_SELECT} WHERE r.author_id = $1 ORDER BY r.created_at DESC"
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Review::from).collect())
    }

    async fn get_review(&self, id: Uuid) -> RepoResult<Option<Review>> {
        let row = sqlx::query_as::<_, ReviewRow>(&format!("{REVIEW_SELECT} WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Review::from))
    }

    async fn create_review(&self, author_id: Uuid, req: CreateReviewRequest) -> RepoResult<Review> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"INSERT INTO reviews (id, title, content, rating, published, author_id, created_at, updated_at)
               VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())"#,
        )
        .bind(id)
        .bind(req.title)
        .bind(req.content)
        .bind(req.rating)
        .bind(req.published)
        .bind(author_id)
        .execute(&self.pool)
        .await?;

        self.get_review(id)
            .await?
            .ok_or(RepositoryError::Database(sqlx::Error::RowNotFound))
    }

    async fn update_review(&self, id: Uuid, req: UpdateReviewRequest) -> RepoResult<Option<Review>> {
        let result = sqlx::query(
            r#"
            UPDATE reviews
            SET title = COALESCE($2, title),
                content = COALESCE($3, content),
                rating = COALESCE($4, rating),
                published = COALESCE($5, published),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(req.title)
        .bind(req.content)
        .bind(req.rating)
        .bind(req.published)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get_review(id).await
    }

    async fn delete_review(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- CATEGORIES ---

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let categories =
            sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name ASC")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }

    async fn get_category(&self, id: Uuid) -> RepoResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    async fn create_category(&self, name: &str) -> RepoResult<Category> {
        let category = sqlx::query_as::<_, Category>(
            "INSERT INTO categories (id, name) VALUES ($1, $2) RETURNING id, name",
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(category)
    }

    async fn rename_category(&self, id: Uuid, name: &str) -> RepoResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(
            "UPDATE categories SET name = $2 WHERE id = $1 RETURNING id, name",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(category)
    }

    async fn delete_category(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // --- TAGS ---

    async fn list_tags(&self) -> RepoResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags ORDER BY name ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(tags)
    }

    async fn get_tag(&self, id: Uuid) -> RepoResult<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>("SELECT id, name FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tag)
    }

    async fn connect_or_create_tag(&self, name: &str) -> RepoResult<Tag> {
        let mut conn = self.pool.acquire().await?;
        Ok(upsert_tag(&mut conn, name).await?)
    }

    async fn rename_tag(&self, id: Uuid, name: &str) -> RepoResult<Option<Tag>> {
        let tag = sqlx::query_as::<_, Tag>("UPDATE tags SET name = $2 WHERE id = $1 RETURNING id, name")
            .bind(id)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(tag)
    }

    async fn delete_tag(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
