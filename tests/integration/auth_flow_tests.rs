// =====================================
// tests/integration/auth_flow_tests.rs
// =====================================
//! Credential service behaviour over flat-file storage
use crate::test_utils::{setup_test_env, setup_test_env_with};
use backend_lib::auth::{CredentialService, DefaultCredentials, PasswordHasher, PasswordScheme};
use backend_lib::storage::{AccountStore, FlatFileStorage};
use eventmgmt_common::UserRole;
use std::sync::Arc;

#[tokio::test]
async fn test_register_then_authenticate() {
    let app = setup_test_env();
    let credentials = &app.state.credentials;

    let account = credentials
        .register("Dana@Example.com", "correct horse", UserRole::Organizer)
        .await
        .unwrap()
        .expect("email is free");
    assert_eq!(account.email, "dana@example.com");
    assert_ne!(account.stored_credential, "correct horse");

    let authenticated = credentials
        .authenticate("dana@example.com", "correct horse")
        .await
        .unwrap()
        .expect("password matches");
    assert_eq!(authenticated.id, account.id);

    assert!(credentials
        .authenticate("dana@example.com", "correct horsE")
        .await
        .unwrap()
        .is_none());
    assert!(credentials
        .authenticate("nobody@example.com", "correct horse")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_duplicate_registration_is_refused() {
    let app = setup_test_env();
    let credentials = &app.state.credentials;

    let first = credentials
        .register("erin@example.com", "first-password", UserRole::Organizer)
        .await
        .unwrap();
    assert!(first.is_some());

    let second = credentials
        .register("ERIN@example.com", "second-password", UserRole::Admin)
        .await
        .unwrap();
    assert!(second.is_none());

    // the original credential is untouched
    assert!(credentials
        .authenticate("erin@example.com", "first-password")
        .await
        .unwrap()
        .is_some());
    assert_eq!(app.state.accounts.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_change_and_reset_password() {
    let app = setup_test_env();
    let credentials = &app.state.credentials;
    let account = credentials
        .register("frank@example.com", "original-pw", UserRole::Organizer)
        .await
        .unwrap()
        .unwrap();

    assert!(!credentials
        .change_password(account.id, "wrong-current", "replacement-pw")
        .await
        .unwrap());
    assert!(credentials
        .authenticate("frank@example.com", "original-pw")
        .await
        .unwrap()
        .is_some());

    assert!(credentials
        .change_password(account.id, "original-pw", "replacement-pw")
        .await
        .unwrap());
    assert!(credentials
        .authenticate("frank@example.com", "original-pw")
        .await
        .unwrap()
        .is_none());

    assert!(credentials
        .reset_password(account.id, "after-reset-pw")
        .await
        .unwrap());
    assert!(credentials
        .authenticate("frank@example.com", "after-reset-pw")
        .await
        .unwrap()
        .is_some());

    assert!(!credentials
        .reset_password(uuid::Uuid::now_v7(), "after-reset-pw")
        .await
        .unwrap());
}

#[tokio::test]
async fn test_credentials_survive_restart() {
    let app = setup_test_env();
    app.state
        .credentials
        .register("gina@example.com", "durable-pw", UserRole::Organizer)
        .await
        .unwrap()
        .unwrap();

    let reopened: Arc<dyn AccountStore> =
        Arc::new(FlatFileStorage::new(app.temp_dir.path()).unwrap());
    let credentials = DefaultCredentials::new(reopened, PasswordHasher::default());
    assert!(credentials
        .authenticate("gina@example.com", "durable-pw")
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_login_upgrades_legacy_credential() {
    let app = setup_test_env_with(|settings| {
        settings.password.scheme = PasswordScheme::Scrypt;
        settings.password.scrypt_log_n = 4;
        settings.password.scrypt_r = 8;
        settings.password.scrypt_p = 1;
    });

    // an account written before the scheme changed
    let legacy = DefaultCredentials::new(app.state.accounts.clone(), PasswordHasher::default());
    let account = legacy
        .register("hank@example.com", "legacy-pw", UserRole::Organizer)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(PasswordScheme::of(&account.stored_credential), PasswordScheme::SaltedSha256);

    app.login("hank@example.com", "legacy-pw").await;

    let stored = app
        .state
        .accounts
        .find_by_id(account.id)
        .await
        .unwrap()
        .unwrap()
        .stored_credential;
    assert!(stored.starts_with("$scrypt$"));
    app.login("hank@example.com", "legacy-pw").await;
}

#[tokio::test]
async fn test_concurrent_registration_admits_one() {
    let app = setup_test_env();

    let attempts = (0..8).map(|i| {
        let credentials = app.state.credentials.clone();
        tokio::spawn(async move {
            credentials
                .register("race@example.com", &format!("password-{i}"), UserRole::Organizer)
                .await
                .unwrap()
        })
    });

    let mut created = 0;
    for attempt in attempts.collect::<Vec<_>>() {
        if attempt.await.unwrap().is_some() {
            created += 1;
        }
    }
    assert_eq!(created, 1);
    assert_eq!(app.state.accounts.count().await.unwrap(), 1);
}
