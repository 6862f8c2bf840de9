use mini_cms::{
    AppConfig, AppState, create_router,
    auth::issue_token,
    error::ErrorBody,
    models::{Article, Category, NewUser, Review, SessionResponse, Tag, User},
    oauth::{ExternalProfile, MockIdentityProvider},
    repository::{InMemoryRepository, RepositoryState},
};
use reqwest::{StatusCode, redirect::Policy};
use serde_json::json;
use std::sync::Arc;
use tokio::net::TcpListener;
use uuid::Uuid;

#[derive(Debug)]
pub struct TestUser {
    pub user: User,
    pub token: String,
}

pub struct TestApp {
    pub address: String,
    pub repo: RepositoryState,
    pub client: reqwest::Client,
    pub alice: TestUser,
    pub bob: TestUser,
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn first_category(&self) -> Category {
        self.repo.list_categories().await.unwrap().remove(0)
    }

    async fn create_article(&self, as_user: &TestUser, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(self.url("/articles"))
            .bearer_auth(&as_user.token)
            .json(&body)
            .send()
            .await
            .expect("req fail")
    }
}

async fn spawn_app() -> TestApp {
    let repo = Arc::new(InMemoryRepository::seeded()) as RepositoryState;
    let config = AppConfig::default();

    let mut users = Vec::new();
    for (email, name) in [("alice@example.com", "Alice"), ("bob@example.com", "Bob")] {
        let user = repo
            .create_user(NewUser {
                email: email.to_string(),
                name: Some(name.to_string()),
                ..NewUser::default()
            })
            .await
            .unwrap();
        let token = issue_token(&config, user.id).unwrap();
        users.push(TestUser { user, token });
    }
    let bob = users.pop().unwrap();
    let alice = users.pop().unwrap();

    let provider = MockIdentityProvider::new(ExternalProfile {
        email: Some("octocat@github.example".to_string()),
        name: Some("The Octocat".to_string()),
        image: Some("https://avatars.example/octocat.png".to_string()),
    });

    let state = AppState {
        repo: repo.clone(),
        oauth: Some(Arc::new(provider)),
        config,
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap();

    TestApp {
        address,
        repo,
        client,
        alice,
        bob,
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = app.client.get(app.url("/health")).send().await.expect("req fail");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(app.url("/api-docs/openapi.json"))
        .send()
        .await
        .expect("req fail");

    assert_eq!(response.status(), StatusCode::OK);
    let doc: serde_json::Value = response.json().await.unwrap();
    assert!(doc["paths"]["/articles/{id}"].is_object());
}

#[tokio::test]
async fn test_draft_scenario_between_two_authors() {
    let app = spawn_app().await;
    let category = app.first_category().await;

    // A creates a draft.
    let response = app
        .create_article(
            &app.alice,
            json!({"title": "Draft X", "content": "full content", "category_id": category.id}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let draft: Article = response.json().await.unwrap();
    assert!(!draft.published);

    // B cannot see it.
    let as_bob = app
        .client
        .get(app.url(&format!("/articles/{}", draft.id)))
        .bearer_auth(&app.bob.token)
        .send()
        .await
        .unwrap();
    assert_eq!(as_bob.status(), StatusCode::NOT_FOUND);
    let body: ErrorBody = as_bob.json().await.unwrap();
    assert_eq!(body.error.code, "NOT_FOUND");

    // Neither can an anonymous reader, in the list or by id.
    let anonymous = app
        .client
        .get(app.url(&format!("/articles/{}", draft.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::NOT_FOUND);
    let listed: Vec<Article> = app
        .client
        .get(app.url("/articles"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(listed.iter().all(|a| a.id != draft.id));

    // A sees the full content.
    let as_alice = app
        .client
        .get(app.url(&format!("/articles/{}", draft.id)))
        .bearer_auth(&app.alice.token)
        .send()
        .await
        .unwrap();
    assert_eq!(as_alice.status(), StatusCode::OK);
    let article: Article = as_alice.json().await.unwrap();
    assert_eq!(article.content, "full content");
}

#[tokio::test]
async fn test_mutations_require_session_and_ownership() {
    let app = spawn_app().await;
    let category = app.first_category().await;
    let article: Article = app
        .create_article(
            &app.alice,
            json!({"title": "Owned", "content": "c", "category_id": category.id, "published": true}),
        )
        .await
        .json()
        .await
        .unwrap();
    let path = app.url(&format!("/articles/{}", article.id));

    // No session: 401 from the auth layer.
    let anonymous = app
        .client
        .put(&path)
        .json(&json!({"title": "Hijacked"}))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
    let body: ErrorBody = anonymous.json().await.unwrap();
    assert_eq!(body.error.code, "UNAUTHORIZED");

    let anonymous_create = app
        .client
        .post(app.url("/articles"))
        .json(&json!({"title": "t", "content": "c", "category_id": category.id}))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous_create.status(), StatusCode::UNAUTHORIZED);

    // Someone else's session: 403, even though the article is published.
    let as_bob = app
        .client
        .put(&path)
        .bearer_auth(&app.bob.token)
        .json(&json!({"title": "Hijacked"}))
        .send()
        .await
        .unwrap();
    assert_eq!(as_bob.status(), StatusCode::FORBIDDEN);

    let bob_delete = app
        .client
        .delete(&path)
        .bearer_auth(&app.bob.token)
        .send()
        .await
        .unwrap();
    assert_eq!(bob_delete.status(), StatusCode::FORBIDDEN);

    // The author may do both.
    let updated: Article = app
        .client
        .put(&path)
        .bearer_auth(&app.alice.token)
        .json(&json!({"title": "Renamed"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(updated.title, "Renamed");

    let deleted = app
        .client
        .delete(&path)
        .bearer_auth(&app.alice.token)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_missing_category_is_server_error() {
    let app = spawn_app().await;
    let response = app
        .create_article(
            &app.alice,
            json!({"title": "t", "content": "c", "category_id": Uuid::new_v4()}),
        )
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.error.code, "SERVER_ERROR");
    // The constraint detail stays in the logs.
    assert!(!body.error.message.contains("category"));
}

#[tokio::test]
async fn test_tag_connect_or_create_is_idempotent() {
    let app = spawn_app().await;
    let category = app.first_category().await;

    let first: Article = app
        .create_article(
            &app.alice,
            json!({"title": "One", "content": "c", "category_id": category.id, "tags": ["Rust", "Programming"], "published": true}),
        )
        .await
        .json()
        .await
        .unwrap();
    let second: Article = app
        .create_article(
            &app.bob,
            json!({"title": "Two", "content": "c", "category_id": category.id, "tags": ["Rust"], "published": true}),
        )
        .await
        .json()
        .await
        .unwrap();

    let rust_in_first = first.tags.iter().find(|t| t.name == "Rust").unwrap();
    assert_eq!(rust_in_first.id, second.tags[0].id);

    let tags: Vec<Tag> = app
        .client
        .get(app.url("/tags"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tags.iter().filter(|t| t.name == "Rust").count(), 1);
    assert_eq!(tags.iter().filter(|t| t.name == "Programming").count(), 1);

    // Filtering by the shared tag returns both articles.
    let tagged: Vec<Article> = app
        .client
        .get(app.url("/articles?tag=Rust"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tagged.len(), 2);
}

#[tokio::test]
async fn test_article_search_and_category_filter() {
    let app = spawn_app().await;
    let categories = app.repo.list_categories().await.unwrap();
    let (food, travel) = (
        categories.iter().find(|c| c.name == "Food").unwrap(),
        categories.iter().find(|c| c.name == "Travel").unwrap(),
    );

    for (title, category, tags) in [
        ("Ramen in Tokyo", travel, vec!["Review"]),
        ("Sourdough basics", food, vec!["Tutorial"]),
    ] {
        let response = app
            .create_article(
                &app.alice,
                json!({"title": title, "content": "text", "category_id": category.id, "tags": tags, "published": true}),
            )
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let by_title: Vec<Article> = app
        .client
        .get(app.url("/articles?search=ramen"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_title.len(), 1);
    assert_eq!(by_title[0].title, "Ramen in Tokyo");

    let by_tag_name: Vec<Article> = app
        .client
        .get(app.url("/articles?search=tutorial"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_tag_name.len(), 1);
    assert_eq!(by_tag_name[0].title, "Sourdough basics");

    let by_category: Vec<Article> = app
        .client
        .get(app.url("/articles?category=Travel"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(by_category.len(), 1);
    assert_eq!(by_category[0].category.name, "Travel");
}

#[tokio::test]
async fn test_review_rating_validation_and_visibility() {
    let app = spawn_app().await;

    let invalid = app
        .client
        .post(app.url("/reviews"))
        .bearer_auth(&app.alice.token)
        .json(&json!({"title": "t", "content": "c", "rating": 6}))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = invalid.json().await.unwrap();
    assert_eq!(body.error.code, "BAD_REQUEST");

    let created = app
        .client
        .post(app.url("/reviews"))
        .bearer_auth(&app.alice.token)
        .json(&json!({"title": "Bistro", "content": "fine", "rating": 4}))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let review: Review = created.json().await.unwrap();

    let anonymous = app
        .client
        .get(app.url(&format!("/reviews/{}", review.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::NOT_FOUND);

    let as_bob = app
        .client
        .delete(app.url(&format!("/reviews/{}", review.id)))
        .bearer_auth(&app.bob.token)
        .send()
        .await
        .unwrap();
    assert_eq!(as_bob.status(), StatusCode::FORBIDDEN);

    let mine: Vec<Review> = app
        .client
        .get(app.url("/me/reviews"))
        .bearer_auth(&app.alice.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
}

#[tokio::test]
async fn test_register_and_login_flow() {
    let app = spawn_app().await;

    let registered = app
        .client
        .post(app.url("/auth/register"))
        .json(&json!({"email": "dana@example.com", "name": "Dana", "password": "s3cret-pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(registered.status(), StatusCode::CREATED);
    let user: serde_json::Value = registered.json().await.unwrap();
    assert!(user.get("password_hash").is_none());

    let conflict = app
        .client
        .post(app.url("/auth/register"))
        .json(&json!({"email": "dana@example.com", "password": "s3cret-pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(conflict.status(), StatusCode::CONFLICT);

    let bad_login = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({"email": "dana@example.com", "password": "wrong-pass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_login.status(), StatusCode::UNAUTHORIZED);

    let session: SessionResponse = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({"email": "dana@example.com", "password": "s3cret-pass"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let me: User = app
        .client
        .get(app.url("/me"))
        .bearer_auth(&session.token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(me.email, "dana@example.com");
}

#[tokio::test]
async fn test_github_sign_in_via_mock_provider() {
    let app = spawn_app().await;

    let redirect = app.client.get(app.url("/auth/github")).send().await.unwrap();
    assert_eq!(redirect.status(), StatusCode::SEE_OTHER);
    let location = redirect.headers()["location"].to_str().unwrap();
    assert!(location.contains("client_id=mock"));

    let session: SessionResponse = app
        .client
        .get(app.url("/auth/github/callback?code=valid-code"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(session.user.email, "octocat@github.example");
    assert_eq!(session.user.name.as_deref(), Some("The Octocat"));

    // Signing in again reuses the same user row.
    let again: SessionResponse = app
        .client
        .get(app.url("/auth/github/callback?code=another-code"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(again.user.id, session.user.id);

    let me = app
        .client
        .get(app.url("/me/articles"))
        .bearer_auth(&again.token)
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_taxonomy_requires_session_to_write() {
    let app = spawn_app().await;

    let categories: Vec<Category> = app
        .client
        .get(app.url("/categories"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Food", "Lifestyle", "Technology", "Travel"]);

    let anonymous = app
        .client
        .post(app.url("/categories"))
        .json(&json!({"name": "Music"}))
        .send()
        .await
        .unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let created = app
        .client
        .post(app.url("/categories"))
        .bearer_auth(&app.bob.token)
        .json(&json!({"name": "Music"}))
        .send()
        .await
        .unwrap();
    assert_eq!(created.status(), StatusCode::CREATED);
    let music: Category = created.json().await.unwrap();

    let fetched = app
        .client
        .get(app.url(&format!("/categories/{}", music.id)))
        .send()
        .await
        .unwrap();
    assert_eq!(fetched.status(), StatusCode::OK);

    let deleted = app
        .client
        .delete(app.url(&format!("/categories/{}", music.id)))
        .bearer_auth(&app.alice.token)
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_public_reads_ignore_unusable_tokens() {
    let app = spawn_app().await;
    let category = app.first_category().await;
    let response = app
        .create_article(
            &app.alice,
            json!({"title": "Hidden draft", "content": "c", "category_id": category.id}),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let for_stale_session = app
        .client
        .get(app.url("/articles"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .expect("req fail");
    assert_eq!(for_stale_session.status(), StatusCode::OK);
    let visible: Vec<Article> = for_stale_session.json().await.unwrap();
    assert!(visible.iter().all(|a| a.title != "Hidden draft"));

    let reviews = app
        .client
        .get(app.url("/reviews"))
        .header("Authorization", "Token abc")
        .send()
        .await
        .expect("req fail");
    assert_eq!(reviews.status(), StatusCode::OK);

    // The same token is still refused where a session is required.
    let me = app
        .client
        .get(app.url("/me"))
        .bearer_auth("not-a-jwt")
        .send()
        .await
        .expect("req fail");
    assert_eq!(me.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_malformed_path_id_is_json_bad_request() {
    let app = spawn_app().await;

    for path in ["/articles/not-a-uuid", "/reviews/42", "/categories/x", "/tags/%20"] {
        let response = app.client.get(app.url(path)).send().await.expect("req fail");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{path}");
        let body: ErrorBody = response.json().await.unwrap();
        assert_eq!(body.error.code, "BAD_REQUEST", "{path}");
    }
}

#[tokio::test]
async fn test_malformed_body_is_json_bad_request() {
    let app = spawn_app().await;

    // Missing category_id.
    let missing_field = app
        .create_article(&app.alice, json!({"title": "t", "content": "c"}))
        .await;
    assert_eq!(missing_field.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = missing_field.json().await.unwrap();
    assert_eq!(body.error.code, "BAD_REQUEST");

    let not_json = app
        .client
        .post(app.url("/auth/login"))
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .expect("req fail");
    assert_eq!(not_json.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = not_json.json().await.unwrap();
    assert_eq!(body.error.code, "BAD_REQUEST");

    let no_content_type = app
        .client
        .post(app.url("/auth/register"))
        .body(r#"{"email":"x@example.com","password":"long-enough-pw"}"#)
        .send()
        .await
        .expect("req fail");
    assert_eq!(no_content_type.status(), StatusCode::BAD_REQUEST);
    let body: ErrorBody = no_content_type.json().await.unwrap();
    assert_eq!(body.error.code, "BAD_REQUEST");
}
