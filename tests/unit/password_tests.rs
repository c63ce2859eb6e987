// ============================
// tests/unit/password_tests.rs
// ============================
//! Credential hasher behavior seen from outside the crate
use backend_lib::auth::CredentialHasher;

fn hasher() -> CredentialHasher {
    CredentialHasher::new(4).unwrap()
}

#[test]
fn test_verify_accepts_only_the_original_password() {
    let hasher = hasher();
    for password in ["secret1", "pässwörd", "a much longer passphrase with spaces"] {
        let hash = hasher.hash(password).unwrap();
        assert!(hasher.verify(password, &hash));
        assert!(!hasher.verify(&format!("{password}x"), &hash));
    }
}

#[test]
fn test_hash_never_contains_plaintext() {
    let hasher = hasher();
    let hash = hasher.hash("secret1").unwrap();
    assert!(!hash.contains("secret1"));
}

#[test]
fn test_hash_from_other_cost_still_verifies() {
    // the PHC string carries its own parameters
    let cheap = CredentialHasher::new(4).unwrap();
    let other = CredentialHasher::new(5).unwrap();
    let hash = cheap.hash("secret1").unwrap();
    assert!(other.verify("secret1", &hash));
}

#[test]
fn test_unknown_user_never_matches() {
    let hasher = hasher();
    assert!(!hasher.verify_unknown_user("secret1"));
    assert!(!hasher.verify_unknown_user(""));
}

#[tokio::test]
async fn test_unknown_user_blocking_variant() {
    let hasher = hasher();
    assert!(!hasher
        .verify_unknown_user_blocking("secret1".to_string())
        .await
        .unwrap());
}
