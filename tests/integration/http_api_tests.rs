//! HTTP surface: sessions, role checks and the user administration API
use crate::test_utils::{setup_test_env, setup_test_env_with};
use axum::http::{header, Method, StatusCode};
use backend_lib::handlers::users::TOTAL_COUNT_HEADER;
use serde_json::json;

#[tokio::test]
async fn test_health() {
    let app = setup_test_env();
    let response = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
}

#[tokio::test]
async fn test_register_login_me_logout() {
    let app = setup_test_env();

    let response = app
        .send(
            Method::POST,
            "/auth/register",
            Some(json!({ "email": "Olive@Example.com", "password": "olive-password" })),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body["user"]["email"], "olive@example.com");
    assert_eq!(response.body["user"]["role"], "ORGANIZER");
    assert!(response.body["user"].get("storedCredential").is_none());
    let cookie = response.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));

    let token = app.login("olive@example.com", "olive-password").await;
    let me = app.send(Method::GET, "/auth/me", None, Some(&token)).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["email"], "olive@example.com");

    let logout = app.send(Method::POST, "/auth/logout", None, Some(&token)).await;
    assert_eq!(logout.status, StatusCode::NO_CONTENT);

    let me = app.send(Method::GET, "/auth/me", None, Some(&token)).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
    let me = app.send(Method::GET, "/auth/me", None, None).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_registration_validation() {
    let app = setup_test_env();
    app.register("pat@example.com", "pat-password").await;

    let cases = [
        (json!({ "email": "pat@example.com", "password": "another-pw" }), StatusCode::CONFLICT),
        (json!({ "email": "not-an-email", "password": "long-enough" }), StatusCode::BAD_REQUEST),
        (json!({ "email": "q@example.com", "password": "short" }), StatusCode::BAD_REQUEST),
        (
            json!({ "email": "q@example.com", "password": "long-enough", "confirmPassword": "different" }),
            StatusCode::BAD_REQUEST,
        ),
        (
            json!({ "email": "q@example.com", "password": "long-enough", "role": "ADMIN" }),
            StatusCode::FORBIDDEN,
        ),
    ];
    for (body, expected) in cases {
        let response = app.send(Method::POST, "/auth/register", Some(body.clone()), None).await;
        assert_eq!(response.status, expected, "{body}");
    }
}

#[tokio::test]
async fn test_wrong_password_and_unknown_email_look_alike() {
    let app = setup_test_env();
    app.register("quinn@example.com", "quinn-password").await;

    let wrong = app
        .send(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "quinn@example.com", "password": "nope-nope" })),
            None,
        )
        .await;
    let unknown = app
        .send(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "nobody@example.com", "password": "nope-nope" })),
            None,
        )
        .await;

    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.status, unknown.status);
    assert_eq!(wrong.body, unknown.body);
}

#[tokio::test]
async fn test_login_lockout() {
    let app = setup_test_env_with(|settings| settings.auth_rate_limit.max_attempts = 3);
    app.register("rae@example.com", "rae-password").await;

    let bad = json!({ "email": "rae@example.com", "password": "guess-guess" });
    for _ in 0..3 {
        let response = app.send(Method::POST, "/auth/login", Some(bad.clone()), None).await;
        assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    }

    // locked out even with the right password
    let response = app
        .send(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "rae@example.com", "password": "rae-password" })),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_admin_user_administration() {
    let app = setup_test_env();
    let admin = app.admin_session("admin@example.com", "admin-password").await;
    let sam = app.register("sam@example.com", "sam-password").await;
    app.register("tess@example.com", "tess-password").await;

    let list = app
        .send(Method::GET, "/api/users?count=true&limit=2", None, Some(&admin))
        .await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.body.as_array().unwrap().len(), 2);
    assert_eq!(list.headers[TOTAL_COUNT_HEADER], "3");

    let list = app.send(Method::GET, "/api/users", None, Some(&admin)).await;
    assert!(list.headers.get(TOTAL_COUNT_HEADER).is_none());

    let by_email = app
        .send(Method::GET, "/api/users/email/sam@example.com", None, Some(&admin))
        .await;
    assert_eq!(by_email.status, StatusCode::OK);
    let sam_id = by_email.body["id"].as_str().unwrap().to_string();

    let missing = app
        .send(Method::GET, "/api/users/email/zed@example.com", None, Some(&admin))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);

    let organizers = app
        .send(Method::GET, "/api/users/role/organizer", None, Some(&admin))
        .await;
    assert_eq!(organizers.body.as_array().unwrap().len(), 2);
    let bad_role = app
        .send(Method::GET, "/api/users/role/ATTENDEE", None, Some(&admin))
        .await;
    assert_eq!(bad_role.status, StatusCode::BAD_REQUEST);

    let search = app
        .send(Method::GET, "/api/users/search?email=TESS", None, Some(&admin))
        .await;
    assert_eq!(search.body.as_array().unwrap().len(), 1);
    let empty_search = app
        .send(Method::GET, "/api/users/search?email=", None, Some(&admin))
        .await;
    assert_eq!(empty_search.status, StatusCode::BAD_REQUEST);

    let promoted = app
        .send(
            Method::PUT,
            &format!("/api/users/{sam_id}"),
            Some(json!({ "role": "ADMIN" })),
            Some(&admin),
        )
        .await;
    assert_eq!(promoted.status, StatusCode::OK);
    assert_eq!(promoted.body["role"], "ADMIN");

    // the promotion reaches sam's open session
    let as_sam = app.send(Method::GET, "/api/users", None, Some(&sam)).await;
    assert_eq!(as_sam.status, StatusCode::OK);

    let deleted = app
        .send(Method::DELETE, &format!("/api/users/{sam_id}"), None, Some(&admin))
        .await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    let again = app
        .send(Method::DELETE, &format!("/api/users/{sam_id}"), None, Some(&admin))
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);

    let as_sam = app.send(Method::GET, "/auth/me", None, Some(&sam)).await;
    assert_eq!(as_sam.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_creates_admin_without_switching_session() {
    let app = setup_test_env();
    let admin = app.admin_session("root@example.com", "root-password").await;

    let created = app
        .send(
            Method::POST,
            "/auth/register",
            Some(json!({ "email": "second@example.com", "password": "second-pw", "role": "ADMIN" })),
            Some(&admin),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["role"], "ADMIN");
    assert!(created.body.get("token").is_none());

    let me = app.send(Method::GET, "/auth/me", None, Some(&admin)).await;
    assert_eq!(me.body["email"], "root@example.com");
}

#[tokio::test]
async fn test_organizer_is_confined_to_own_account() {
    let app = setup_test_env();
    let uma = app.register("uma@example.com", "uma-password").await;
    app.register("vic@example.com", "vic-password").await;

    let me = app.send(Method::GET, "/auth/me", None, Some(&uma)).await;
    let uma_id = me.body["id"].as_str().unwrap().to_string();
    let vic_id = app
        .state
        .accounts
        .find_by_email("vic@example.com")
        .await
        .unwrap()
        .unwrap()
        .id;

    let own = app.send(Method::GET, &format!("/api/users/{uma_id}"), None, Some(&uma)).await;
    assert_eq!(own.status, StatusCode::OK);

    let forbidden = [
        (Method::GET, "/api/users".to_string(), None),
        (Method::GET, format!("/api/users/{vic_id}"), None),
        (Method::GET, "/api/users/search?email=vic".to_string(), None),
        (Method::DELETE, format!("/api/users/{vic_id}"), None),
        (Method::PUT, format!("/api/users/{uma_id}"), Some(json!({ "role": "ADMIN" }))),
    ];
    for (method, uri, body) in forbidden {
        let response = app.send(method.clone(), &uri, body, Some(&uma)).await;
        assert_eq!(response.status, StatusCode::FORBIDDEN, "{method} {uri}");
    }

    let unauthenticated = app.send(Method::GET, "/api/users", None, None).await;
    assert_eq!(unauthenticated.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_own_email() {
    let app = setup_test_env();
    let wes = app.register("wes@example.com", "wes-password").await;
    app.register("xan@example.com", "xan-password").await;
    let wes_id = app.send(Method::GET, "/auth/me", None, Some(&wes)).await.body["id"]
        .as_str()
        .unwrap()
        .to_string();

    let taken = app
        .send(
            Method::PUT,
            &format!("/api/users/{wes_id}"),
            Some(json!({ "email": "xan@example.com" })),
            Some(&wes),
        )
        .await;
    assert_eq!(taken.status, StatusCode::CONFLICT);

    let invalid = app
        .send(
            Method::PUT,
            &format!("/api/users/{wes_id}"),
            Some(json!({ "email": "wes-at-example" })),
            Some(&wes),
        )
        .await;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);

    let renamed = app
        .send(
            Method::PUT,
            &format!("/api/users/{wes_id}"),
            Some(json!({ "email": "Wesley@Example.com" })),
            Some(&wes),
        )
        .await;
    assert_eq!(renamed.status, StatusCode::OK);
    assert_eq!(renamed.body["email"], "wesley@example.com");

    let me = app.send(Method::GET, "/auth/me", None, Some(&wes)).await;
    assert_eq!(me.body["email"], "wesley@example.com");
    app.login("wesley@example.com", "wes-password").await;
}

#[tokio::test]
async fn test_change_password_endpoint() {
    let app = setup_test_env();
    let yara = app.register("yara@example.com", "yara-password").await;
    let yara_id = app.send(Method::GET, "/auth/me", None, Some(&yara)).await.body["id"]
        .as_str()
        .unwrap()
        .to_string();
    let uri = format!("/api/users/{yara_id}/password");

    let wrong = app
        .send(
            Method::PUT,
            &uri,
            Some(json!({ "currentPassword": "not-yara", "newPassword": "fresh-password" })),
            Some(&yara),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::BAD_REQUEST);

    let weak = app
        .send(
            Method::PUT,
            &uri,
            Some(json!({ "currentPassword": "yara-password", "newPassword": "weak" })),
            Some(&yara),
        )
        .await;
    assert_eq!(weak.status, StatusCode::BAD_REQUEST);

    let changed = app
        .send(
            Method::PUT,
            &uri,
            Some(json!({ "currentPassword": "yara-password", "newPassword": "fresh-password" })),
            Some(&yara),
        )
        .await;
    assert_eq!(changed.status, StatusCode::OK);

    let me = app.send(Method::GET, "/auth/me", None, Some(&yara)).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
    app.login("yara@example.com", "fresh-password").await;
}

#[tokio::test]
async fn test_session_expiry_and_remember_me() {
    let app = setup_test_env();
    let short = app.register("zoe@example.com", "zoe-password").await;

    let remembered = app
        .send(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "zoe@example.com", "password": "zoe-password", "rememberMe": true })),
            None,
        )
        .await;
    assert_eq!(remembered.status, StatusCode::OK);
    let long = remembered.body["token"].as_str().unwrap().to_string();

    app.clock.advance(chrono::Duration::minutes(31));

    let me = app.send(Method::GET, "/auth/me", None, Some(&short)).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
    let me = app.send(Method::GET, "/auth/me", None, Some(&long)).await;
    assert_eq!(me.status, StatusCode::OK);
}

#[tokio::test]
async fn test_forwarded_header_does_not_dodge_lockout() {
    let app = setup_test_env_with(|settings| settings.auth_rate_limit.max_attempts = 3);
    app.register("amy@example.com", "amy-password").await;

    let bad = json!({ "email": "amy@example.com", "password": "guess-guess" });
    let mut statuses = Vec::new();
    for i in 0..6 {
        let forwarded = format!("203.0.113.{i}");
        let response = app
            .send_with_headers(
                Method::POST,
                "/auth/login",
                Some(bad.clone()),
                None,
                &[("x-forwarded-for", forwarded.as_str()), ("x-real-ip", forwarded.as_str())],
            )
            .await;
        statuses.push(response.status);
    }

    assert_eq!(&statuses[..3], &[StatusCode::UNAUTHORIZED; 3]);
    assert!(statuses[3..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
}

#[tokio::test]
async fn test_trusted_proxy_headers_separate_clients() {
    let app = setup_test_env_with(|settings| {
        settings.auth_rate_limit.max_attempts = 2;
        settings.rate_limit.trust_proxy_headers = true;
    });
    app.register("bea@example.com", "bea-password").await;

    let bad = json!({ "email": "bea@example.com", "password": "guess-guess" });
    for _ in 0..2 {
        app.send_with_headers(
            Method::POST,
            "/auth/login",
            Some(bad.clone()),
            None,
            &[("x-forwarded-for", "198.51.100.1")],
        )
        .await;
    }

    let locked = app
        .send_with_headers(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "bea@example.com", "password": "bea-password" })),
            None,
            &[("x-forwarded-for", "198.51.100.1")],
        )
        .await;
    assert_eq!(locked.status, StatusCode::TOO_MANY_REQUESTS);

    let other = app
        .send_with_headers(
            Method::POST,
            "/auth/login",
            Some(json!({ "email": "bea@example.com", "password": "bea-password" })),
            None,
            &[("x-forwarded-for", "198.51.100.2")],
        )
        .await;
    assert_eq!(other.status, StatusCode::OK);
}

#[tokio::test]
async fn test_password_set_by_update_ends_sessions() {
    let app = setup_test_env();
    let first = app.register("cal@example.com", "cal-password").await;
    let second = app.login("cal@example.com", "cal-password").await;
    let cal_id = app.send(Method::GET, "/auth/me", None, Some(&first)).await.body["id"]
        .as_str()
        .unwrap()
        .to_string();

    app.send(
        Method::POST,
        "/auth/forgot",
        Some(json!({ "email": "cal@example.com" })),
        None,
    )
    .await;
    let reset_token = app.last_reset_token("cal@example.com").unwrap();

    let updated = app
        .send(
            Method::PUT,
            &format!("/api/users/{cal_id}"),
            Some(json!({ "password": "brand-new-pw" })),
            Some(&second),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);

    for token in [&first, &second] {
        let me = app.send(Method::GET, "/auth/me", None, Some(token)).await;
        assert_eq!(me.status, StatusCode::UNAUTHORIZED);
    }
    assert!(!app.state.reset_tokens().is_valid_token(&reset_token));
    app.login("cal@example.com", "brand-new-pw").await;
}
