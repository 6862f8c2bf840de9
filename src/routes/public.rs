use crate::{
    AppState,
    handlers::{articles, reviews, session, taxonomy},
};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Article and review reads take an
/// optional identity: anonymous callers see published items only, signed-in
/// callers additionally see their own drafts.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // --- Sign-in ---
        .route("/auth/register", post(session::register_user))
        .route("/auth/login", post(session::login))
        // GET /auth/github
        // 303 to GitHub's authorize page; 404 when GitHub is not configured.
        .route("/auth/github", get(session::github_redirect))
        .route("/auth/github/callback", get(session::github_callback))
        // --- Content ---
        // GET /articles?search=...&category=...&tag=...
        .route("/articles", get(articles::list_articles))
        .route("/articles/{id}", get(articles::get_article))
        .route("/reviews", get(reviews::list_reviews))
        .route("/reviews/{id}", get(reviews::get_review))
        // --- Taxonomy ---
        .route("/categories", get(taxonomy::list_categories))
        .route("/categories/{id}", get(taxonomy::get_category))
        .route("/tags", get(taxonomy::list_tags))
        .route("/tags/{id}", get(taxonomy::get_tag))
}
