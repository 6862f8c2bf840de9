use axum::{extract::State, http::StatusCode};
use uuid::Uuid;

use crate::{
    AppState,
    extract::{Json, Path, Query},
    auth::{Identity, MaybeIdentity},
    error::{AppError, ErrorBody},
    models::{Article, ArticleFilter, CreateArticleRequest, UpdateArticleRequest},
    policy::{self, Visibility},
};

/// Loads an article for a mutation and checks that `identity` is its author.
async fn owned_article(state: &AppState, id: Uuid, identity: &Identity) -> Result<Article, AppError> {
    let article = state.repo.get_article(id).await?.ok_or(AppError::NotFound)?;
    policy::can_mutate(&article, Some(identity))?;
    Ok(article)
}

/// list_articles
///
/// [Public Route] Published articles plus the caller's own drafts, newest
/// first. The visibility scope is pushed down into the repository query.
#[utoipa::path(
    get,
    path = "/articles",
    params(ArticleFilter),
    responses((status = 200, description = "Visible articles", body = [Article]))
)]
pub async fn list_articles(
    caller: MaybeIdentity,
    State(state): State<AppState>,
    Query(filter): Query<ArticleFilter>,
) -> Result<Json<Vec<Article>>, AppError> {
    let scope = Visibility::for_caller(caller.as_ref());
    let articles = state.repo.list_articles(&scope, &filter).await?;
    Ok(Json(articles))
}

/// get_article
///
/// [Public Route] A single article. Drafts of other users answer 404 so
/// their existence is not revealed.
#[utoipa::path(
    get,
    path = "/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 200, description = "Found", body = Article),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_article(
    caller: MaybeIdentity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Article>, AppError> {
    state
        .repo
        .get_article(id)
        .await?
        .filter(|article| policy::can_read(article, caller.as_ref()))
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// my_articles
///
/// [Authenticated Route] Every article of the caller, drafts included.
#[utoipa::path(
    get,
    path = "/me/articles",
    responses((status = 200, description = "My Articles", body = [Article]))
)]
pub async fn my_articles(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<Json<Vec<Article>>, AppError> {
    Ok(Json(state.repo.list_articles_by_author(identity.id).await?))
}

/// create_article
///
/// [Authenticated Route] The caller becomes the author. Tags are connected
/// or created by name in the same transaction as the insert.
#[utoipa::path(
    post,
    path = "/articles",
    request_body = CreateArticleRequest,
    responses(
        (status = 201, description = "Created", body = Article),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 401, description = "No session", body = ErrorBody)
    )
)]
pub async fn create_article(
    identity: Identity,
    State(state): State<AppState>,
    Json(payload): Json<CreateArticleRequest>,
) -> Result<(StatusCode, Json<Article>), AppError> {
    payload.validate().map_err(AppError::BadRequest)?;

    let article = state.repo.create_article(identity.id, payload).await?;
    tracing::info!(article_id = %article.id, author = %identity.email, "article created");
    Ok((StatusCode::CREATED, Json(article)))
}

/// update_article
///
/// [Authenticated Route] Partial update, author only. A `tags` list replaces
/// the whole tag set.
#[utoipa::path(
    put,
    path = "/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    request_body = UpdateArticleRequest,
    responses(
        (status = 200, description = "Updated", body = Article),
        (status = 403, description = "Not the author", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_article(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateArticleRequest>,
) -> Result<Json<Article>, AppError> {
    owned_article(&state, id, &identity).await?;
    payload.validate().map_err(AppError::BadRequest)?;

    let article = state
        .repo
        .update_article(id, payload)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(article_id = %id, "article updated");
    Ok(Json(article))
}

/// delete_article
///
/// [Authenticated Route] Author only. Tag links go with the article; the
/// tags themselves stay.
#[utoipa::path(
    delete,
    path = "/articles/{id}",
    params(("id" = Uuid, Path, description = "Article ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_article(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    owned_article(&state, id, &identity).await?;

    if !state.repo.delete_article(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(article_id = %id, "article deleted");
    Ok(StatusCode::NO_CONTENT)
}
