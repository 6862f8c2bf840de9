//! Categories and tags.
//!
//! Reads are public. Writes need a session but no ownership: taxonomy is
//! shared by every author.

use axum::{extract::State, http::StatusCode};
use uuid::Uuid;

use crate::{
    AppState,
    extract::{Json, Path},
    auth::Identity,
    error::{AppError, ErrorBody},
    models::{Category, NameRequest, Tag},
};

// --- Categories ---

#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "All categories", body = [Category]))
)]
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>, AppError> {
    Ok(Json(state.repo.list_categories().await?))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Found", body = Category),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, AppError> {
    state
        .repo
        .get_category(id)
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// create_category
///
/// [Authenticated Route] A duplicate name is a constraint violation (500).
#[utoipa::path(
    post,
    path = "/categories",
    request_body = NameRequest,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 400, description = "Blank name", body = ErrorBody)
    )
)]
pub async fn create_category(
    identity: Identity,
    State(state): State<AppState>,
    Json(payload): Json<NameRequest>,
) -> Result<(StatusCode, Json<Category>), AppError> {
    payload.validate().map_err(AppError::BadRequest)?;

    let category = state.repo.create_category(payload.name.trim()).await?;
    tracing::info!(category = %category.name, by = %identity.email, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    put,
    path = "/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    request_body = NameRequest,
    responses(
        (status = 200, description = "Renamed", body = Category),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_category(
    _identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NameRequest>,
) -> Result<Json<Category>, AppError> {
    payload.validate().map_err(AppError::BadRequest)?;

    state
        .repo
        .rename_category(id, payload.name.trim())
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

/// delete_category
///
/// [Authenticated Route] Fails with 500 while any article still uses it.
#[utoipa::path(
    delete,
    path = "/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_category(
    _identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.repo.delete_category(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(category_id = %id, "category deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- Tags ---

#[utoipa::path(
    get,
    path = "/tags",
    responses((status = 200, description = "All tags", body = [Tag]))
)]
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<Vec<Tag>>, AppError> {
    Ok(Json(state.repo.list_tags().await?))
}

#[utoipa::path(
    get,
    path = "/tags/{id}",
    params(("id" = Uuid, Path, description = "Tag ID")),
    responses(
        (status = 200, description = "Found", body = Tag),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_tag(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Tag>, AppError> {
    state.repo.get_tag(id).await?.map(Json).ok_or(AppError::NotFound)
}

/// create_tag
///
/// [Authenticated Route] Connect-or-create: posting an existing name returns
/// the existing tag.
#[utoipa::path(
    post,
    path = "/tags",
    request_body = NameRequest,
    responses(
        (status = 201, description = "Created or existing", body = Tag),
        (status = 400, description = "Blank name", body = ErrorBody)
    )
)]
pub async fn create_tag(
    _identity: Identity,
    State(state): State<AppState>,
    Json(payload): Json<NameRequest>,
) -> Result<(StatusCode, Json<Tag>), AppError> {
    payload.validate().map_err(AppError::BadRequest)?;

    let tag = state.repo.connect_or_create_tag(payload.name.trim()).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

#[utoipa::path(
    put,
    path = "/tags/{id}",
    params(("id" = Uuid, Path, description = "Tag ID")),
    request_body = NameRequest,
    responses(
        (status = 200, description = "Renamed", body = Tag),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_tag(
    _identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NameRequest>,
) -> Result<Json<Tag>, AppError> {
    payload.validate().map_err(AppError::BadRequest)?;

    state
        .repo
        .rename_tag(id, payload.name.trim())
        .await?
        .map(Json)
        .ok_or(AppError::NotFound)
}

#[utoipa::path(
    delete,
    path = "/tags/{id}",
    params(("id" = Uuid, Path, description = "Tag ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_tag(
    _identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.repo.delete_tag(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(tag_id = %id, "tag deleted");
    Ok(StatusCode::NO_CONTENT)
}
