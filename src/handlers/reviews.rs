use axum::{extract::State, http::StatusCode};
use uuid::Uuid;

use crate::{
    AppState,
    extract::{Json, Path},
    auth::{Identity, MaybeIdentity},
    error::{AppError, ErrorBody},
    models::{CreateReviewRequest, Review, UpdateReviewRequest},
    policy::{self, Visibility},
};

async fn owned_review(state: &AppState, id: Uuid, identity: &Identity) -> Result<Review, AppError> {
    let review = state.repo.get_review(id).await?.ok_or(AppError::NotFound)?;
    policy::can_mutate(&review, Some(identity))?;
    Ok(review)
}

/// list_reviews
///
/// [Public Route] Published reviews plus the caller's own drafts, newest first.
#[utoipa::path(
    get,
    path = "/reviews",
    responses((status = 200, description = "Visible reviews", body = [Review]))
)]
pub async fn list_reviews(
    caller: MaybeIdentity,
    State(state): State<AppState>,
) -> Result<Json<Vec<Review>>, AppError> {
    let scope = Visibility::for_caller(caller.as_ref());
    Ok(Json(state.repo.list_reviews(&scope).await?))
}

/// get_review
#[utoipa::path(
    get,
    path = "/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 200, description = "Found", body = Review),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn get_review(
    caller: MaybeIdentity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Review>, AppError> {
    state
        .repo
        .get_review(id)
        .await?
        .filter(|review| policy::can_read(review, caller.as_ref()))
        .map(Json)
        .ok_or(AppError::NotFound)
}

#[utoipa::path(
    get,
    path = "/me/reviews",
    responses((status = 200, description = "My Reviews", body = [Review]))
)]
pub async fn my_reviews(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<Json<Vec<Review>>, AppError> {
    Ok(Json(state.repo.list_reviews_by_author(identity.id).await?))
}

/// create_review
///
/// [Authenticated Route] Rating defaults to 0 and must stay within 0..=5.
#[utoipa::path(
    post,
    path = "/reviews",
    request_body = CreateReviewRequest,
    responses(
        (status = 201, description = "Created", body = Review),
        (status = 400, description = "Invalid payload", body = ErrorBody)
    )
)]
pub async fn create_review(
    identity: Identity,
    State(state): State<AppState>,
    Json(payload): Json<CreateReviewRequest>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    payload.validate().map_err(AppError::BadRequest)?;

    let review = state.repo.create_review(identity.id, payload).await?;
    tracing::info!(review_id = %review.id, author = %identity.email, "review created");
    Ok((StatusCode::CREATED, Json(review)))
}

#[utoipa::path(
    put,
    path = "/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review ID")),
    request_body = UpdateReviewRequest,
    responses(
        (status = 200, description = "Updated", body = Review),
        (status = 403, description = "Not the author", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn update_review(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateReviewRequest>,
) -> Result<Json<Review>, AppError> {
    owned_review(&state, id, &identity).await?;
    payload.validate().map_err(AppError::BadRequest)?;

    let review = state
        .repo
        .update_review(id, payload)
        .await?
        .ok_or(AppError::NotFound)?;
    tracing::info!(review_id = %id, "review updated");
    Ok(Json(review))
}

#[utoipa::path(
    delete,
    path = "/reviews/{id}",
    params(("id" = Uuid, Path, description = "Review ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 403, description = "Not the author", body = ErrorBody),
        (status = 404, description = "Not Found", body = ErrorBody)
    )
)]
pub async fn delete_review(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    owned_review(&state, id, &identity).await?;

    if !state.repo.delete_review(id).await? {
        return Err(AppError::NotFound);
    }
    tracing::info!(review_id = %id, "review deleted");
    Ok(StatusCode::NO_CONTENT)
}
