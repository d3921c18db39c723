//! API integration tests over the in-process store

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use library_server::{
    api,
    models::book::Book,
    repository::{MemoryStore, Repository},
    AppConfig, AppState,
};

struct TestApp {
    router: Router,
    store: MemoryStore,
}

impl TestApp {
    /// Server with one admin, two readers and three books
    async fn new() -> Self {
        let store = MemoryStore::new();
        for (id, title, category) in [
            ("b1", "Dune", "sf"),
            ("b2", "Foundation", "sf"),
            ("b3", "Middlemarch", "classics"),
        ] {
            store
                .insert_book(Book {
                    book_id: id.to_string(),
                    title: title.to_string(),
                    author: Some("Someone".to_string()),
                    publisher: None,
                    category: Some(category.to_string()),
                    publication_year: None,
                    language: Some("en".to_string()),
                })
                .await;
        }

        let state = AppState::new(AppConfig::default(), Repository::in_memory(store.clone()));
        let app = Self {
            router: api::router(state),
            store,
        };

        app.register("staff@example.org", "Staff", true).await;
        app.register("u1@example.org", "Reader One", false).await;
        app.register("u2@example.org", "Reader Two", false).await;
        app
    }

    async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
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

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    async fn register(&self, email: &str, username: &str, is_admin: bool) {
        let (status, body) = self
            .post(
                "/api/auth/register",
                json!({
                    "username": username,
                    "email": email,
                    "password": "secret-pass",
                    "isAdmin": is_admin
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {email}: {body}");
    }

    async fn borrow(&self, user: &str, book: &str) -> (StatusCode, Value) {
        self.post("/api/borrow", json!({ "userAccount": user, "bookId": book }))
            .await
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/ready").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_borrow_return_scenario() {
    let app = TestApp::new().await;

    let (status, body) = app.borrow("u1@example.org", "b1").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], 1);
    assert_eq!(body["data"]["statusText"], "on loan");
    let record_id = body["data"]["recordId"].as_i64().unwrap();

    let (status, body) = app.borrow("u2@example.org", "b1").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], 6);
    assert_eq!(body["message"], "book already on loan");

    let (status, body) = app
        .post(
            "/api/borrow/return",
            json!({ "userAccount": "u1@example.org", "bookId": "b1" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["recordId"].as_i64(), Some(record_id));
    assert_eq!(body["data"]["status"], 2);
    assert!(body["data"]["returnTime"].is_string());

    let (status, body) = app
        .post(
            "/api/borrow/return",
            json!({ "userAccount": "u1@example.org", "bookId": "b1" }),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NoSuchData");
}

#[tokio::test]
async fn test_invalid_arguments() {
    let app = TestApp::new().await;

    let (status, body) = app.borrow("", "b1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 5);

    let (status, _) = app
        .post("/api/borrow", json!({ "userAccount": "u1@example.org" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // malformed JSON still renders the error envelope
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/borrow")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let (status, body) = app.get("/api/borrow/records/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = app.get("/api/borrow/available").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_application_flow() {
    let app = TestApp::new().await;

    let apply = json!({
        "bookId": "b2",
        "userAccount": "u1@example.org",
        "userRemark": "for the weekend"
    });

    let (status, body) = app.post("/api/userborrow/apply", apply.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], 0);
    assert_eq!(body["data"]["adminAccount"], "staff@example.org");
    let application_id = body["data"]["applicationId"].as_i64().unwrap();

    let (status, body) = app.post("/api/userborrow/apply", apply).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "duplicate application");

    let (status, body) = app
        .get("/api/borrow/applications?admin_account=staff@example.org")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["userNickname"], "Reader One");
    assert_eq!(body["data"][0]["bookTitle"], "Foundation");

    let (status, body) = app
        .post(
            &format!("/api/borrow/applications/{application_id}/process"),
            json!({ "decision": "approve", "adminRemark": "enjoy" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["application"]["status"], 1);
    assert_eq!(body["data"]["record"]["bookId"], "b2");

    let (status, _) = app
        .post(
            &format!("/api/borrow/applications/{application_id}/process"),
            json!({ "decision": "reject" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .get("/api/userborrow/applications?userAccount=u1@example.org")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["statusText"], "approved");

    let (_, body) = app.get("/api/borrow/borrowed?userAccount=u1@example.org").await;
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["book"]["title"], "Foundation");
}

#[tokio::test]
async fn test_approval_fails_while_book_on_loan() {
    let app = TestApp::new().await;

    let (_, body) = app
        .post(
            "/api/userborrow/apply",
            json!({ "bookId": "b3", "userAccount": "u1@example.org" }),
        )
        .await;
    let application_id = body["data"]["applicationId"].as_i64().unwrap();

    let (status, _) = app.borrow("u2@example.org", "b3").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post(
            &format!("/api/borrow/applications/{application_id}/process"),
            json!({ "decision": "approve" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "book already on loan");

    let (_, body) = app
        .get("/api/userborrow/applications?userAccount=u1@example.org")
        .await;
    assert_eq!(body["data"][0]["status"], 0);
}

#[tokio::test]
async fn test_delete_then_lookup_is_not_found() {
    let app = TestApp::new().await;
    let (_, body) = app.borrow("u1@example.org", "b1").await;
    let record_id = body["data"]["recordId"].as_i64().unwrap();

    let (status, body) = app.get(&format!("/api/borrow/records/{record_id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["bookId"], "b1");

    let (status, body) = app
        .request(Method::DELETE, &format!("/api/borrow/{record_id}"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body.get("data").is_none());

    let (status, _) = app.get(&format!("/api/borrow/records/{record_id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/borrow/{record_id}"), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_record_listing_pagination() {
    let app = TestApp::new().await;
    for i in 0..15 {
        let id = format!("p{:02}", i);
        app.store
            .insert_book(Book {
                book_id: id.clone(),
                title: format!("Volume {i}"),
                author: None,
                publisher: None,
                category: None,
                publication_year: None,
                language: None,
            })
            .await;
        let (status, _) = app.borrow("u2@example.org", &id).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = app.get("/api/borrow/list?status=1&page=2&size=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 5);
    assert_eq!(body["pagination"]["total"], 15);
    assert_eq!(body["pagination"]["page"], 2);
    assert_eq!(body["pagination"]["pageSize"], 10);
    assert_eq!(body["pagination"]["totalPages"], 2);
    assert_eq!(body["data"][0]["nickname"], "Reader Two");

    // out of range values are clamped
    let (_, body) = app.get("/api/borrow/list?page=0&size=1000").await;
    assert_eq!(body["pagination"]["page"], 1);
    assert_eq!(body["pagination"]["pageSize"], 100);

    let (_, body) = app.get("/api/userborrow/borrowed?userAccount=u2@example.org&size=4").await;
    assert_eq!(body["pagination"]["totalPages"], 4);
}

#[tokio::test]
async fn test_catalog_and_available_books() {
    let app = TestApp::new().await;
    app.borrow("u1@example.org", "b1").await;

    let (status, body) = app.get("/api/books?category=sf").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 2);

    let (status, body) = app.get("/api/borrow/available?keyword=o").await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|b| b["bookId"].as_str())
        .collect();
    assert!(!ids.contains(&"b1"));
    assert!(ids.contains(&"b2"));
}

#[tokio::test]
async fn test_login() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post(
            "/api/auth/login",
            json!({ "email": "u1@example.org", "password": "secret-pass" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["account"], "u1@example.org");
    assert_eq!(body["data"]["kind"], "user");
    assert!(body["data"].get("userPassword").is_none());

    let (status, body) = app
        .post(
            "/api/auth/login",
            json!({ "email": "u1@example.org", "password": "wrong" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], 2);

    let (status, _) = app
        .post(
            "/api/auth/register",
            json!({
                "username": "Dup",
                "email": "u1@example.org",
                "password": "secret-pass",
                "isAdmin": false
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
