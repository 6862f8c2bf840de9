use mini_cms::password::{
    hash_password, hash_password_blocking, verify_password, verify_password_blocking,
};

#[test]
fn test_hash_and_verify() {
    let hash = hash_password("correct horse battery").unwrap();

    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("correct horse battery", &hash).unwrap());
    assert!(!verify_password("wrong password", &hash).unwrap());
}

#[test]
fn test_hashes_are_salted() {
    let first = hash_password("same-password").unwrap();
    let second = hash_password("same-password").unwrap();

    assert_ne!(first, second);
    assert!(verify_password("same-password", &first).unwrap());
    assert!(verify_password("same-password", &second).unwrap());
}

#[test]
fn test_malformed_hash_is_an_error() {
    assert!(verify_password("anything", "not-a-phc-string").is_err());
}

#[tokio::test]
async fn test_blocking_pool_variants_agree() {
    let hash = hash_password_blocking("off-thread secret".to_string()).await.unwrap();

    assert!(verify_password("off-thread secret", &hash).unwrap());
    assert!(verify_password_blocking("off-thread secret".to_string(), hash.clone()).await.unwrap());
    assert!(!verify_password_blocking("wrong".to_string(), hash).await.unwrap());
    assert!(verify_password_blocking("x".to_string(), "not-a-phc-string".to_string()).await.is_err());
}
