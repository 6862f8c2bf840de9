use crate::{
    AppState,
    handlers::{articles, reviews, session, taxonomy},
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Every route here sits behind `auth_middleware`, which rejects requests
/// without a valid session with 401 before any handler runs. Handlers still
/// take `Identity` themselves and pass it to the ownership policy.
///
/// Paths shared with the public router (`/articles`, `/reviews`, ...) only add
/// the write methods; the reads stay public.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // The signed-in user's profile.
        .route("/me", get(session::get_me))
        // GET /me/articles, /me/reviews
        // The caller's own content, drafts included.
        .route("/me/articles", get(articles::my_articles))
        .route("/me/reviews", get(reviews::my_reviews))
        // --- Articles ---
        .route("/articles", post(articles::create_article))
        // PUT/DELETE /articles/{id}
        // Author only; other users get 403.
        .route(
            "/articles/{id}",
            put(articles::update_article).delete(articles::delete_article),
        )
        // --- Reviews ---
        .route("/reviews", post(reviews::create_review))
        .route(
            "/reviews/{id}",
            put(reviews::update_review).delete(reviews::delete_review),
        )
        // --- Taxonomy ---
        // Any signed-in user may curate categories and tags.
        .route("/categories", post(taxonomy::create_category))
        .route(
            "/categories/{id}",
            put(taxonomy::update_category).delete(taxonomy::delete_category),
        )
        // POST /tags
        // Connect-or-create by name.
        .route("/tags", post(taxonomy::create_tag))
        .route(
            "/tags/{id}",
            put(taxonomy::update_tag).delete(taxonomy::delete_tag),
        )
}
