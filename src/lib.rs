use axum::{
    Router,
    extract::{FromRef, Request},
    http::HeaderName,
    middleware::{self, Next},
    response::Response,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod oauth;
pub mod password;
pub mod policy;
pub mod repository;

// Module for routing segregation (Public, Authenticated).
pub mod routes;
use auth::Identity;
use routes::{authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use oauth::{GitHubProvider, IdentityProviderState, MockIdentityProvider};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// Generates the OpenAPI document from the `#[utoipa::path]` handlers and
/// the `ToSchema` models. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::articles::list_articles, handlers::articles::get_article,
        handlers::articles::my_articles, handlers::articles::create_article,
        handlers::articles::update_article, handlers::articles::delete_article,
        handlers::reviews::list_reviews, handlers::reviews::get_review,
        handlers::reviews::my_reviews, handlers::reviews::create_review,
        handlers::reviews::update_review, handlers::reviews::delete_review,
        handlers::taxonomy::list_categories, handlers::taxonomy::get_category,
        handlers::taxonomy::create_category, handlers::taxonomy::update_category,
        handlers::taxonomy::delete_category, handlers::taxonomy::list_tags,
        handlers::taxonomy::get_tag, handlers::taxonomy::create_tag,
        handlers::taxonomy::update_tag, handlers::taxonomy::delete_tag,
        handlers::session::register_user, handlers::session::login,
        handlers::session::github_redirect, handlers::session::github_callback,
        handlers::session::get_me
    ),
    components(
        schemas(
            models::User, models::AuthorSummary, models::Article, models::Review,
            models::Category, models::Tag, models::CreateArticleRequest,
            models::UpdateArticleRequest, models::CreateReviewRequest,
            models::UpdateReviewRequest, models::NameRequest, models::RegisterUserRequest,
            models::LoginRequest, models::SessionResponse, error::ErrorBody,
            error::ErrorDetail,
        )
    ),
    tags(
        (name = "mini-cms", description = "Articles, reviews and their taxonomy")
    )
)]
pub struct ApiDoc;

/// AppState
///
/// Shared, immutable state handed to every request. Each component is
/// cheap to clone and can be extracted on its own through `FromRef`.
#[derive(Clone)]
pub struct AppState {
    /// Persistence: Postgres in production, in-memory for tests and demos.
    pub repo: RepositoryState,
    /// GitHub sign-in; `None` when no OAuth app is configured.
    pub oauth: Option<IdentityProviderState>,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Guards the authenticated router. Extracting `Identity` is the whole check:
/// when it fails the request is rejected with 401 and the handler never runs.
/// The resolved identity is stored in the request extensions so the handler's
/// own `Identity` extractor does not hit the repository a second time.
async fn auth_middleware(identity: Identity, mut request: Request, next: Next) -> Response {
    request.extensions_mut().insert(identity);
    next.run(request).await
}

/// create_router
///
/// Assembles the routing tree, the scoped auth layer and the observability
/// stack around it.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth_middleware,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for every request, tagged with the `x-request-id` so all log lines
/// of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
