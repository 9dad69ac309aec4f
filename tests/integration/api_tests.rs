//! HTTP surface tests through the real router

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt; // for `oneshot`

use pustakalay_server::{api, AppState};

use crate::common::{admin, make_overdue, test_state};

/// Send one request and decode the JSON body
async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Register through the API and return the bearer token
async fn register(app: &Router, username: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "username": username,
            "email": format!("{}@example.com", username),
            "password": "secret123"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["data"]["access_token"].as_str().unwrap().to_string()
}

async fn admin_token(app: &Router, state: &AppState) -> String {
    admin(state, "librarian").await;
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "librarian", "password": "admin123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    body["data"]["access_token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_check() {
    let state = test_state().await;
    let app = api::create_router(state);

    let (status, body) = send(&app, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, "GET", "/api/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_register_login_and_profile() {
    let state = test_state().await;
    let app = api::create_router(state);

    let token = register(&app, "asha").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "asha@example.com", "password": "secret123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["expires_in"], 24 * 3600);
    assert!(body["data"]["user"].get("password_hash").is_none());

    let (status, body) = send(&app, "GET", "/api/auth/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["username"], "asha");
    assert_eq!(body["data"]["role"], "user");

    let (status, body) = send(
        &app,
        "PUT",
        "/api/auth/profile",
        Some(&token),
        Some(json!({ "phone": "not-a-phone" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid phone number format");

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/change-password",
        Some(&token),
        Some(json!({ "current_password": "wrong-one", "new_password": "newsecret" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/change-password",
        Some(&token),
        Some(json!({ "current_password": "secret123", "new_password": "newsecret" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "username": "asha", "password": "newsecret" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_errors_use_the_envelope() {
    let state = test_state().await;
    let app = api::create_router(state);

    let (status, body) = send(&app, "GET", "/api/auth/profile", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "error");
    assert_eq!(body["error"], "NotAuthenticated");

    let (status, _) = send(&app, "GET", "/api/auth/profile", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({ "username": "no-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, body) = send(&app, "GET", "/api/books/abc", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");

    let (status, body) = send(&app, "GET", "/api/books/77", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 5);
}

#[tokio::test]
async fn test_donate_borrow_return_over_http() {
    let state = test_state().await;
    let app = api::create_router(state);

    let donor = register(&app, "donor").await;
    let reader = register(&app, "reader").await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/donations",
        Some(&donor),
        Some(json!({
            "title": "Ramayana",
            "author": "Valmiki",
            "genre": "धर्म",
            "condition": "good"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let book_id = body["data"]["book"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["condition"], "Good");
    assert_eq!(body["data"]["book"]["category"], "धर्म");
    assert!(body["data"]["donation_ref"].as_str().unwrap().starts_with("DON"));

    let (status, body) = send(
        &app,
        "POST",
        "/api/donations",
        Some(&donor),
        Some(json!({ "title": "  ", "author": "Valmiki" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);

    let (status, body) = send(&app, "GET", &format!("/api/books/{}", book_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["available_copies"], 1);
    assert_eq!(body["data"]["available_copies_detail"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/books/{}/borrow", book_id),
        Some(&reader),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    let loan_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["is_returned"], false);
    assert_eq!(body["data"]["book"]["title"], "Ramayana");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/books/{}/borrow", book_id),
        Some(&donor),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "NoCopyAvailable");

    let (status, body) = send(&app, "GET", "/api/books/borrowed", Some(&reader), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/books/return/{}", loan_id),
        Some(&donor),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/books/return/{}", loan_id),
        Some(&reader),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_returned"], true);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/books/return/{}", loan_id),
        Some(&reader),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 10);

    let (status, body) = send(&app, "GET", "/api/donations/stats", Some(&donor), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_donated"], 1);
    assert_eq!(body["data"]["currently_borrowed"], 0);

    for uri in ["/api/donations/mine", "/api/donations/my-donations"] {
        let (status, body) = send(&app, "GET", uri, Some(&donor), None).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(body["data"]["total"], 1);
        assert_eq!(body["data"]["items"][0]["book"]["title"], "Ramayana");

        let (_, body) = send(&app, "GET", uri, Some(&reader), None).await;
        assert_eq!(body["data"]["total"], 0);
    }
}

#[tokio::test]
async fn test_catalog_listing_and_filters() {
    let state = test_state().await;
    let app = api::create_router(state.clone());
    let token = admin_token(&app, &state).await;

    for (title, author, category) in [
        ("Godan", "Premchand", "उपन्यास"),
        ("Nirmala", "Premchand", "उपन्यास"),
        ("Gita Rahasya", "Tilak", "धर्म"),
    ] {
        let (status, body) = send(
            &app,
            "POST",
            "/api/books",
            Some(&token),
            Some(json!({ "title": title, "author": author, "category": category })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }

    let (status, _) = send(
        &app,
        "POST",
        "/api/books",
        Some(&token),
        Some(json!({ "title": "Godan", "author": "Premchand" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, "GET", "/api/books?search=premchand&per_page=1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let page = &body["data"];
    assert_eq!(page["total"], 2);
    assert_eq!(page["pages"], 2);
    assert_eq!(page["has_next"], true);
    assert_eq!(page["has_prev"], false);
    assert_eq!(page["items"][0]["title"], "Godan");
    assert_eq!(page["items"][0]["total_copies"], 0);

    let (_, body) = send(&app, "GET", "/api/books?available_only=true", None, None).await;
    assert_eq!(body["data"]["total"], 0);

    let (status, body) = send(
        &app,
        "GET",
        "/api/books?page=9223372036854775807&per_page=100",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["items"].as_array().unwrap().len(), 0);

    let (_, body) = send(&app, "GET", "/api/books/categories", None, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let reader = register(&app, "reader").await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/books",
        Some(&reader),
        Some(json!({ "title": "Kafan", "author": "Premchand" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_endpoints() {
    let state = test_state().await;
    let app = api::create_router(state.clone());
    let token = admin_token(&app, &state).await;
    let reader = register(&app, "reader").await;

    let (status, _) = send(&app, "GET", "/api/admin/dashboard", Some(&reader), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "POST",
        "/api/donations",
        Some(&token),
        Some(json!({ "title": "Kamayani", "author": "Jaishankar Prasad" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let book_id = body["data"]["book"]["id"].as_i64().unwrap();

    let (_, body) = send(
        &app,
        "POST",
        &format!("/api/books/{}/borrow", book_id),
        Some(&reader),
        None,
    )
    .await;
    let loan_id = body["data"]["id"].as_i64().unwrap();
    make_overdue(&state, loan_id).await;

    let (status, body) = send(
        &app,
        "GET",
        "/api/admin/borrowings?status=overdue",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["is_overdue"], true);

    let (status, _) = send(
        &app,
        "GET",
        "/api/admin/borrowings?status=lost",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(&app, "GET", "/api/admin/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["overdue_borrowings"], 1);
    assert_eq!(body["data"]["unavailable_copies"], 1);

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/admin/borrowings/{}/force-return", loan_id),
        Some(&reader),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/admin/borrowings/{}/force-return", loan_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_returned"], true);

    let (_, body) = send(&app, "GET", "/api/admin/users", Some(&token), None).await;
    assert_eq!(body["data"]["total"], 2);
    let reader_id = body["data"]["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|u| u["username"] == "reader")
        .and_then(|u| u["id"].as_i64())
        .unwrap();

    let (status, body) = send(
        &app,
        "POST",
        &format!("/api/admin/users/{}/make-admin", reader_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "admin");

    // Promotion is visible on the reader's existing token
    let (status, _) = send(&app, "GET", "/api/admin/dashboard", Some(&reader), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/api/auth/profile", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let own_id = body["data"]["id"].as_i64().unwrap();
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/admin/users/{}/remove-admin", own_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
