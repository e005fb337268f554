//! End-to-end auth flows over the full router with in-memory repositories.

mod common;

use axum::http::StatusCode;
use haven_core::auth::password::verify_password;
use haven_core::events::SessionEvent;
use haven_core::store::UserStore;
use serde_json::json;
use uuid::Uuid;

use common::*;

#[tokio::test]
async fn register_creates_an_unverified_user_and_sets_the_cookie() {
    let app = test_app();

    let (status, headers, body) = send(
        &app.router,
        post_json(
            "/auth/register",
            json!({
                "name": "A",
                "email": "a@x.com",
                "password": "Secret1!",
                "confirmPassword": "Secret1!",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user"]["email"], "a@x.com");
    assert_eq!(body["data"]["user"]["isVerified"], false);
    assert_eq!(body["data"]["user"]["role"], "User");
    assert!(body["data"]["token"].as_str().is_some());

    let cookie = set_cookie_value(&headers, "accessToken").expect("transport cookie");
    assert!(!cookie.is_empty());

    // Registration handed a verification code to the mailer.
    assert_eq!(app.mailer.count(), 1);
    assert_eq!(code_from_mail(&app.mailer.last()).len(), 6);
}

#[tokio::test]
async fn register_validates_fields() {
    let app = test_app();

    let (status, _, body) = send(
        &app.router,
        post_json(
            "/auth/register",
            json!({
                "name": "",
                "email": "not-an-email",
                "password": "short",
                "confirmPassword": "different",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["errors"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = test_app();
    register_user(&app, "A", "a@x.com", "Secret1!").await;

    let (status, _, body) = send(
        &app.router,
        post_json(
            "/auth/register",
            json!({
                "name": "A2",
                "email": "a@x.com",
                "password": "Secret1!",
                "confirmPassword": "Secret1!",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn login_token_works_until_the_session_is_revoked() {
    let app = test_app();
    register_user(&app, "A", "a@x.com", "Secret1!").await;
    let token = login_user(&app, "a@x.com", "Secret1!").await;

    let (status, _, body) = send(&app.router, get_auth("/auth/sessions", &token)).await;
    assert_eq!(status, StatusCode::OK);
    // One session from registration, one from the login.
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, headers, _) = send(&app.router, post_auth("/auth/logout", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(set_cookie_value(&headers, "accessToken").as_deref(), Some(""));

    // The very same token no longer authenticates.
    let (status, _, _) = send(&app.router, get_auth("/auth/sessions", &token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_is_a_generic_401() {
    let app = test_app();
    register_user(&app, "A", "a@x.com", "Secret1!").await;

    let (status, _, body) = send(
        &app.router,
        post_json("/auth/login", json!({ "email": "a@x.com", "password": "WrongPass1!" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");

    // Unknown email gets the identical answer.
    let (status, _, body) = send(
        &app.router,
        post_json("/auth/login", json!({ "email": "ghost@x.com", "password": "WrongPass1!" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid email or password");
}

#[tokio::test]
async fn garbage_token_is_rejected_and_the_cookie_cleared() {
    let app = test_app();

    let (status, headers, _) = send(&app.router, get_auth("/auth/sessions", "not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(set_cookie_value(&headers, "accessToken").as_deref(), Some(""));
}

#[tokio::test]
async fn logout_all_kills_every_session_of_that_user_only() {
    let app = test_app();
    let (user_json, token_a1) = register_user(&app, "A", "a@x.com", "Secret1!").await;
    let token_a2 = login_user(&app, "a@x.com", "Secret1!").await;
    let (_, token_b) = register_user(&app, "B", "b@x.com", "Secret1!").await;

    // Watch the event bus like a realtime transport would.
    let user_id = user_json["id"].as_str().unwrap().to_string();
    let (_subscription, mut rx) = app.events.subscribe(&user_id);

    let (status, _, _) = send(&app.router, post_auth("/auth/logout/all", &token_a1)).await;
    assert_eq!(status, StatusCode::OK);

    for token in [&token_a1, &token_a2] {
        let (status, _, _) = send(&app.router, get_auth("/auth/sessions", token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
    let (status, _, _) = send(&app.router, get_auth("/auth/sessions", &token_b)).await;
    assert_eq!(status, StatusCode::OK, "other users keep their sessions");

    let event = rx.try_recv().expect("revocation event");
    assert_eq!(
        event,
        SessionEvent::Revoked {
            user_id: Uuid::parse_str(&user_id).unwrap(),
            session_id: None,
        }
    );
}

#[tokio::test]
async fn logout_device_revokes_only_the_named_session() {
    let app = test_app();
    register_user(&app, "A", "a@x.com", "Secret1!").await;
    let token_1 = login_user(&app, "a@x.com", "Secret1!").await;
    let token_2 = login_user(&app, "a@x.com", "Secret1!").await;

    let (_, _, body) = send(&app.router, get_auth("/auth/sessions", &token_2)).await;
    // Newest first: sessions[0] belongs to token_2.
    let newest = body["data"][0]["id"].as_str().unwrap().to_string();

    let (status, _, _) = send(
        &app.router,
        post_auth(&format!("/auth/logout/{newest}"), &token_1),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(&app.router, get_auth("/auth/sessions", &token_2)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _, _) = send(&app.router, get_auth("/auth/sessions", &token_1)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn verification_code_is_single_use() {
    let app = test_app();
    let (user_json, _) = register_user(&app, "A", "a@x.com", "Secret1!").await;

    let mail = app.mailer.last();
    let code = code_from_mail(&mail);
    let record_id = record_id_from_mail(&mail);

    let (status, _, _) = send(
        &app.router,
        post_json(&format!("/auth/verify/{record_id}"), json!({ "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let user_id = Uuid::parse_str(user_json["id"].as_str().unwrap()).unwrap();
    let user = app.users.find_by_id(user_id).await.unwrap().unwrap();
    assert!(user.is_verified);

    // The same code cannot be redeemed twice.
    let (status, _, _) = send(
        &app.router,
        post_json(&format!("/auth/verify/{record_id}"), json!({ "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn wrong_verification_code_is_rejected() {
    let app = test_app();
    let (user_json, _) = register_user(&app, "A", "a@x.com", "Secret1!").await;
    let record_id = record_id_from_mail(&app.mailer.last());

    // '0' never appears in generated codes.
    let (status, _, _) = send(
        &app.router,
        post_json(&format!("/auth/verify/{record_id}"), json!({ "code": "000000" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let user_id = Uuid::parse_str(user_json["id"].as_str().unwrap()).unwrap();
    let user = app.users.find_by_id(user_id).await.unwrap().unwrap();
    assert!(!user.is_verified);
}

#[tokio::test]
async fn verification_codes_are_normalized_before_comparison() {
    let app = test_app();
    register_user(&app, "A", "a@x.com", "Secret1!").await;

    let mail = app.mailer.last();
    let code = code_from_mail(&mail);
    let record_id = record_id_from_mail(&mail);

    let sloppy = format!("  {}  ", code.to_lowercase());
    let (status, _, _) = send(
        &app.router,
        post_json(&format!("/auth/verify/{record_id}"), json!({ "code": sloppy })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn regenerating_invalidates_the_previous_code() {
    let app = test_app();
    let (_, token) = register_user(&app, "A", "a@x.com", "Secret1!").await;

    let first_mail = app.mailer.last();
    let first_code = code_from_mail(&first_mail);
    let first_id = record_id_from_mail(&first_mail);

    let (status, _, _) = send(&app.router, put_auth("/auth/verify/regenerate", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.mailer.count(), 2);

    // The first code is dead.
    let (status, _, _) = send(
        &app.router,
        post_json(&format!("/auth/verify/{first_id}"), json!({ "code": first_code })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The fresh one works.
    let second_mail = app.mailer.last();
    let (status, _, _) = send(
        &app.router,
        post_json(
            &format!("/auth/verify/{}", record_id_from_mail(&second_mail)),
            json!({ "code": code_from_mail(&second_mail) }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn forgot_password_does_not_reveal_whether_the_email_exists() {
    let app = test_app();
    register_user(&app, "A", "a@x.com", "Secret1!").await;
    let mails_before = app.mailer.count();

    let (status_known, _, body_known) = send(
        &app.router,
        post_json("/auth/forgot-password", json!({ "email": "a@x.com" })),
    )
    .await;
    let (status_unknown, _, body_unknown) = send(
        &app.router,
        post_json("/auth/forgot-password", json!({ "email": "ghost@x.com" })),
    )
    .await;

    assert_eq!(status_known, StatusCode::OK);
    assert_eq!(status_unknown, StatusCode::OK);
    assert_eq!(body_known, body_unknown, "responses must be identical");
    // Only the real account got mail.
    assert_eq!(app.mailer.count(), mails_before + 1);
}

#[tokio::test]
async fn password_reset_recovers_the_account_and_revokes_sessions() {
    let app = test_app();
    let (_, old_token) = register_user(&app, "A", "a@x.com", "Secret1!").await;

    send(
        &app.router,
        post_json("/auth/forgot-password", json!({ "email": "a@x.com" })),
    )
    .await;
    let mail = app.mailer.last();
    let code = code_from_mail(&mail);
    let record_id = record_id_from_mail(&mail);

    // The reset page can resolve the record to an email.
    let (status, _, body) = send(
        &app.router,
        axum::http::Request::builder()
            .method("GET")
            .uri(format!("/auth/forgot-password/{record_id}"))
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "a@x.com");

    let (status, _, _) = send(
        &app.router,
        post_json(
            &format!("/auth/forgot-password/{record_id}"),
            json!({ "code": code, "password": "NewSecret1!", "confirmPassword": "NewSecret1!" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Old password dead, old sessions revoked, new password works.
    let (status, _, _) = send(
        &app.router,
        post_json("/auth/login", json!({ "email": "a@x.com", "password": "Secret1!" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(&app.router, get_auth("/auth/sessions", &old_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    login_user(&app, "a@x.com", "NewSecret1!").await;

    // The code is single-use.
    let (status, _, _) = send(
        &app.router,
        post_json(
            &format!("/auth/forgot-password/{record_id}"),
            json!({ "code": code, "password": "Another1!", "confirmPassword": "Another1!" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn lockout_disables_the_account_and_scrambles_the_password() {
    let mut config = test_config();
    config.login_threshold = 3;
    let app = test_app_with_config(config);
    register_user(&app, "A", "a@x.com", "Secret1!").await;

    for _ in 0..3 {
        let (status, _, _) = send(
            &app.router,
            post_json_from(
                "/auth/login",
                json!({ "email": "a@x.com", "password": "WrongPass1!" }),
                "10.0.0.1",
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    // Over the threshold: even the correct password is answered with 429 and
    // the account is defensively disabled.
    let (status, _, body) = send(
        &app.router,
        post_json_from(
            "/auth/login",
            json!({ "email": "a@x.com", "password": "Secret1!" }),
            "10.0.0.1",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);

    let credentials = app.users.find_credentials("a@x.com").await.unwrap().unwrap();
    assert!(credentials.user.disabled);
    assert!(
        !verify_password("Secret1!", &credentials.password_hash).unwrap(),
        "the original password must no longer match"
    );

    // Reset is the recovery path: it re-enables the account.
    send(
        &app.router,
        post_json("/auth/forgot-password", json!({ "email": "a@x.com" })),
    )
    .await;
    let mail = app.mailer.last();
    let (status, _, _) = send(
        &app.router,
        post_json(
            &format!("/auth/forgot-password/{}", record_id_from_mail(&mail)),
            json!({
                "code": code_from_mail(&mail),
                "password": "Recovered1!",
                "confirmPassword": "Recovered1!",
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    login_user(&app, "a@x.com", "Recovered1!").await;
}

#[tokio::test]
async fn throttle_is_keyed_by_address_and_email() {
    let mut config = test_config();
    config.login_threshold = 3;
    let app = test_app_with_config(config);
    register_user(&app, "A", "a@x.com", "Secret1!").await;

    for _ in 0..3 {
        send(
            &app.router,
            post_json_from(
                "/auth/login",
                json!({ "email": "a@x.com", "password": "WrongPass1!" }),
                "10.0.0.1",
            ),
        )
        .await;
    }

    // A different client address is a different key, so the account is not
    // yet locked and the real password still works.
    let (status, _, _) = send(
        &app.router,
        post_json_from(
            "/auth/login",
            json!({ "email": "a@x.com", "password": "Secret1!" }),
            "10.0.0.2",
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn cookie_transport_requires_the_csrf_pair() {
    let app = test_app();
    let (_, token) = register_user(&app, "A", "a@x.com", "Secret1!").await;

    // State-changing request authenticated by cookie, no CSRF header: 403.
    let (status, _, _) = send(
        &app.router,
        axum::http::Request::builder()
            .method("POST")
            .uri("/auth/logout")
            .header("cookie", format!("accessToken={token}"))
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Fetch the double-submit token, echo it, and the request passes.
    let (status, headers, body) = send(
        &app.router,
        axum::http::Request::builder()
            .method("GET")
            .uri("/auth/csrf")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let csrf = body["data"]["token"].as_str().unwrap().to_string();
    assert_eq!(set_cookie_value(&headers, "XSRF-TOKEN"), Some(csrf.clone()));

    let (status, _, _) = send(
        &app.router,
        axum::http::Request::builder()
            .method("POST")
            .uri("/auth/logout")
            .header(
                "cookie",
                format!("accessToken={token}; XSRF-TOKEN={csrf}"),
            )
            .header("x-xsrf-token", &csrf)
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Bearer transport carries no ambient credential and is exempt.
    let token_2 = login_user(&app, "a@x.com", "Secret1!").await;
    let (status, _, _) = send(&app.router, post_auth("/auth/logout", &token_2)).await;
    assert_eq!(status, StatusCode::OK);
}
