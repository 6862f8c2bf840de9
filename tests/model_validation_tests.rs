use chrono::Utc;
use mini_cms::models::{
    CreateArticleRequest, CreateReviewRequest, NameRequest, RegisterUserRequest,
    UpdateArticleRequest, UpdateReviewRequest, User, normalize_tag_names,
};
use uuid::Uuid;

#[test]
fn test_user_serialization_hides_password_hash() {
    let user = User {
        id: Uuid::new_v4(),
        email: "a@x.io".to_string(),
        name: Some("A".to_string()),
        image: None,
        password_hash: Some("$argon2id$secret".to_string()),
        created_at: Utc::now(),
    };

    let json_output = serde_json::to_string(&user).unwrap();

    assert!(json_output.contains(r#""email":"a@x.io""#));
    assert!(!json_output.contains("password_hash"));
    assert!(!json_output.contains("argon2"));
}

#[test]
fn test_create_article_request_defaults() {
    let json = format!(
        r#"{{"title":"T","content":"C","category_id":"{}"}}"#,
        Uuid::new_v4()
    );
    let req: CreateArticleRequest = serde_json::from_str(&json).unwrap();

    assert!(req.tags.is_empty());
    assert!(!req.published, "articles are drafts unless stated otherwise");
    assert!(req.validate().is_ok());
}

#[test]
fn test_create_article_request_rejects_blank_title() {
    let req = CreateArticleRequest {
        title: "   ".to_string(),
        content: "body".to_string(),
        ..CreateArticleRequest::default()
    };
    assert_eq!(req.validate().unwrap_err(), "title must not be empty");
}

#[test]
fn test_update_article_request_optionality() {
    let req: UpdateArticleRequest = serde_json::from_str(r#"{"published":true}"#).unwrap();

    assert_eq!(req.published, Some(true));
    assert!(req.title.is_none());
    assert!(req.tags.is_none(), "absent tags must not clear the tag set");
    assert!(req.validate().is_ok());

    let json_output = serde_json::to_string(&req).unwrap();
    assert_eq!(json_output, r#"{"published":true}"#);

    let blank = UpdateArticleRequest {
        content: Some(String::new()),
        ..UpdateArticleRequest::default()
    };
    assert!(blank.validate().is_err());
}

#[test]
fn test_review_rating_bounds() {
    let mut req = CreateReviewRequest {
        title: "T".to_string(),
        content: "C".to_string(),
        rating: 0,
        published: true,
    };
    assert!(req.validate().is_ok());

    req.rating = 5;
    assert!(req.validate().is_ok());

    req.rating = 6;
    assert!(req.validate().is_err());

    req.rating = -1;
    assert!(req.validate().is_err());

    let update = UpdateReviewRequest {
        rating: Some(9),
        ..UpdateReviewRequest::default()
    };
    assert_eq!(
        update.validate().unwrap_err(),
        "rating must be between 0 and 5"
    );
}

#[test]
fn test_register_request_validation() {
    let ok = RegisterUserRequest {
        email: "a@x.io".to_string(),
        name: None,
        password: "long-enough".to_string(),
    };
    assert!(ok.validate().is_ok());

    let bad_email = RegisterUserRequest {
        email: "not-an-email".to_string(),
        ..ok.clone()
    };
    assert!(bad_email.validate().is_err());

    let short_password = RegisterUserRequest {
        password: "short".to_string(),
        ..ok
    };
    assert!(short_password.validate().is_err());
}

#[test]
fn test_name_request_validation() {
    assert!(NameRequest { name: "Travel".to_string() }.validate().is_ok());
    assert!(NameRequest { name: " ".to_string() }.validate().is_err());
}

#[test]
fn test_normalize_tag_names() {
    let names = vec![
        " Rust ".to_string(),
        "".to_string(),
        "Design".to_string(),
        "Rust".to_string(),
    ];
    assert_eq!(normalize_tag_names(&names), vec!["Rust", "Design"]);
}
