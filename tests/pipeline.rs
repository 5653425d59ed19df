use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use schema_crud::{
    common_routes, entity_routes, ApiError, ConfigError, CrudCore, Entity, ErrorCode, FieldDef, FieldKind,
    MemoryStore, Registry, RouteOptions, Verb,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Role {
    id: i64,
    name: String,
}

impl Entity for Role {
    const TABLE: &'static str = "role";
    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("id", "id", FieldKind::Integer).crud("allow_get"),
            FieldDef::new("name", "name", FieldKind::String)
                .crud("required_on_create,partial_update,allow_get")
                .storage("column:name;unique"),
        ];
        FIELDS
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct User {
    id: i64,
    email: String,
    nickname: String,
    password: String,
    role_id: i64,
    #[serde(default)]
    role: Option<Role>,
}

impl Entity for User {
    const TABLE: &'static str = "users";
    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("id", "id", FieldKind::Integer).crud("allow_get"),
            FieldDef::new("email", "email", FieldKind::String)
                .crud("required_on_create,allow_get")
                .storage("column:email;unique"),
            FieldDef::new("nickname", "nickname", FieldKind::String)
                .crud("partial_update,allow_get")
                .storage("default:anonymous"),
            FieldDef::new("password", "password", FieldKind::String).crud("required_on_create"),
            FieldDef::new("role_id", "role_id", FieldKind::Integer).crud("partial_update,allow_get"),
            FieldDef::new("role", "role", FieldKind::Pointer).storage("foreignKey:RoleID"),
        ];
        FIELDS
    }
}

fn core(store: MemoryStore) -> CrudCore {
    CrudCore::init(store, Registry::builder().register::<Role>().register::<User>()).unwrap()
}

fn app(store: MemoryStore, users: RouteOptions<User>) -> Router {
    let core = core(store);
    Router::new()
        .merge(entity_routes::<Role, ()>(&core, "roles", RouteOptions::new()).unwrap())
        .merge(entity_routes::<User, ()>(&core, "users", users).unwrap())
        .merge(common_routes::<()>(core))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            req = req.header("content-type", "application/json");
            Body::from(v.to_string())
        }
        None => Body::empty(),
    };
    let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_user(app: &Router, email: &str) {
    let (status, body) = send(app, "POST", "/users", Some(json!({"email": email, "password": "secret"}))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}

#[tokio::test]
async fn create_then_read_returns_only_readable_fields() {
    let app = app(MemoryStore::new(), RouteOptions::new());
    let (status, body) = send(
        &app,
        "POST",
        "/users",
        Some(json!({"email": "a@example.com", "password": "secret", "nickname": "al"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({"code": 201, "data": true}));

    let (status, body) = send(&app, "GET", "/users/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({"id": 1, "email": "a@example.com", "nickname": "al", "role_id": 0})
    );

    let (status, body) = send(&app, "GET", "/users/1?fields=email", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"email": "a@example.com"}));

    let (status, body) = send(&app, "GET", "/users/1?fields=password", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 4010);
}

#[tokio::test]
async fn create_applies_declared_defaults() {
    let app = app(MemoryStore::new(), RouteOptions::new());
    create_user(&app, "d@example.com").await;
    let (_, body) = send(&app, "GET", "/users/1?fields=nickname", None).await;
    assert_eq!(body["data"]["nickname"], "anonymous");
}

#[tokio::test]
async fn create_rejects_missing_and_unknown_fields() {
    let store = MemoryStore::new();
    let app = app(store.clone(), RouteOptions::new());

    let (status, body) = send(&app, "POST", "/users", Some(json!({"email": "a@example.com"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 3003);
    assert_eq!(body["message"], "missing required field 'password'");

    let (status, body) = send(
        &app,
        "POST",
        "/users",
        Some(json!({"email": "a@example.com", "password": "x", "id": 7})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 3004);

    let (status, body) = send(&app, "POST", "/users", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 1001);

    assert!(store.raw_rows("users").await.is_empty());
}

#[tokio::test]
async fn duplicate_unique_value_conflicts() {
    let store = MemoryStore::new();
    let app = app(store.clone(), RouteOptions::new());
    create_user(&app, "dup@example.com").await;

    let (status, body) = send(
        &app,
        "POST",
        "/users",
        Some(json!({"email": "dup@example.com", "password": "other"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], 3001);
    assert_eq!(body["message"], "email already exists");
    assert_eq!(store.raw_rows("users").await.len(), 1);
}

#[tokio::test]
async fn update_changes_only_partial_fields() {
    let app = app(MemoryStore::new(), RouteOptions::new());
    create_user(&app, "u@example.com").await;

    let (status, body) = send(&app, "PATCH", "/users/1", Some(json!({"email": "other@example.com"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 5004);
    let (_, body) = send(&app, "GET", "/users/1", None).await;
    assert_eq!(body["data"]["email"], "u@example.com");

    let (status, body) = send(&app, "PATCH", "/users/1", Some(json!({"nickname": "renamed"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nickname"], "renamed");
    assert_eq!(body["data"]["email"], "u@example.com");
    assert!(body["data"].get("password").is_none());

    let (status, body) = send(&app, "PATCH", "/users/1", Some(json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 5008);

    let (status, body) = send(&app, "PATCH", "/users/1", Some(json!({"role_id": "not a number"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 5004);

    let (status, body) = send(&app, "PATCH", "/users/99", Some(json!({"nickname": "x"}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 5001);
}

#[tokio::test]
async fn read_missing_or_invalid_id() {
    let app = app(MemoryStore::new(), RouteOptions::new());

    let (status, body) = send(&app, "GET", "/users/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 4001);
    assert!(body.get("data").is_none());

    let (status, body) = send(&app, "GET", "/users/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 4003);

    let (status, _) = send(&app, "GET", "/users/0", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_paginates() {
    let app = app(MemoryStore::new(), RouteOptions::new());
    for i in 1..=25 {
        let (status, _) = send(&app, "POST", "/roles", Some(json!({"name": format!("role-{i:02}")}))).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, body) = send(&app, "GET", "/roles", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["data"].as_array().unwrap().len(), 10);
    assert_eq!(
        body["data"]["pagination"],
        json!({"total": 25, "perPage": 10, "currentPage": 1, "totalPages": 3})
    );
    assert_eq!(body["data"]["data"][0]["id"], 1);

    let (status, body) = send(&app, "GET", "/roles?page=2", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["data"].as_array().unwrap().len(), 10);
    assert_eq!(body["data"]["data"][0]["name"], "role-11");
    assert_eq!(body["data"]["data"][9]["name"], "role-20");
    assert_eq!(
        body["data"]["pagination"],
        json!({"total": 25, "perPage": 10, "currentPage": 2, "totalPages": 3})
    );

    let (_, body) = send(&app, "GET", "/roles?page=3", None).await;
    assert_eq!(body["data"]["data"].as_array().unwrap().len(), 5);
    assert_eq!(body["data"]["data"][0]["name"], "role-21");

    let (status, body) = send(&app, "GET", "/roles?page=4", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["data"].as_array().unwrap().is_empty());
    assert_eq!(body["data"]["pagination"]["total"], 25);

    let (_, body) = send(&app, "GET", "/roles?per_page=500&page=0", None).await;
    assert_eq!(body["data"]["pagination"]["perPage"], 10);
    assert_eq!(body["data"]["pagination"]["currentPage"], 1);
}

#[tokio::test]
async fn list_filters_and_sorts() {
    let app = app(MemoryStore::new(), RouteOptions::new());
    for name in ["admin", "administrator", "guest"] {
        send(&app, "POST", "/roles", Some(json!({"name": name}))).await;
    }

    let names = |body: &Value| -> Vec<String> {
        body["data"]["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap().to_string())
            .collect()
    };

    let (_, body) = send(&app, "GET", "/roles?name=like:min", None).await;
    assert_eq!(names(&body), ["admin", "administrator"]);
    let (_, body) = send(&app, "GET", "/roles?name=start:adm", None).await;
    assert_eq!(body["data"]["pagination"]["total"], 2);
    let (_, body) = send(&app, "GET", "/roles?name=end:est", None).await;
    assert_eq!(names(&body), ["guest"]);
    let (_, body) = send(&app, "GET", "/roles?name=admin", None).await;
    assert_eq!(names(&body), ["admin"]);
    let (_, body) = send(&app, "GET", "/roles?name=like:%25", None).await;
    assert!(names(&body).is_empty());

    let (_, body) = send(&app, "GET", "/roles?nonexistent=x", None).await;
    assert_eq!(body["data"]["pagination"]["total"], 3);

    let (_, body) = send(&app, "GET", "/roles?sort_by=name&sort_order=asc", None).await;
    assert_eq!(names(&body), ["admin", "administrator", "guest"]);
    let (_, body) = send(&app, "GET", "/roles?sort_by=name", None).await;
    assert_eq!(names(&body), ["guest", "administrator", "admin"]);

    let (status, body) = send(&app, "GET", "/roles?sort_by=secret", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 4006);

    let (status, body) = send(&app, "GET", "/roles?id=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 4004);
}

#[tokio::test]
async fn list_ignores_non_readable_filters() {
    let app = app(MemoryStore::new(), RouteOptions::new());
    create_user(&app, "a@example.com").await;
    create_user(&app, "b@example.com").await;

    let (status, body) = send(&app, "GET", "/users?password=nomatch", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["total"], 2);
}

#[tokio::test]
async fn delete_is_soft_and_not_repeatable() {
    let store = MemoryStore::new();
    let app = app(store.clone(), RouteOptions::new());
    create_user(&app, "gone@example.com").await;

    let (status, body) = send(&app, "DELETE", "/users/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);

    let (status, _) = send(&app, "GET", "/users/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = send(&app, "GET", "/users", None).await;
    assert_eq!(body["data"]["pagination"]["total"], 0);

    let (status, body) = send(&app, "DELETE", "/users/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], 6001);

    let rows = store.raw_rows("users").await;
    assert_eq!(rows.len(), 1);
    assert!(!rows[0]["deleted_at"].is_null());

    // the unique value of a deleted row is free again
    create_user(&app, "gone@example.com").await;
}

#[tokio::test]
async fn expansion_inlines_related_entity() {
    let app = app(MemoryStore::new(), RouteOptions::new());
    send(&app, "POST", "/roles", Some(json!({"name": "admin"}))).await;
    let (status, _) = send(
        &app,
        "POST",
        "/users",
        Some(json!({"email": "e@example.com", "password": "x", "role_id": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    create_user(&app, "norole@example.com").await;

    let (status, body) = send(&app, "GET", "/users/1?fields=email&expand=role", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({"email": "e@example.com", "role": {"id": 1, "name": "admin"}})
    );

    let (_, body) = send(&app, "GET", "/users/1?expand=role", None).await;
    assert_eq!(body["data"]["role_id"], 1);
    assert_eq!(body["data"]["role"]["name"], "admin");

    let (_, body) = send(&app, "GET", "/users?expand=role&sort_by=id&sort_order=asc", None).await;
    assert_eq!(body["data"]["data"][0]["role"]["name"], "admin");
    assert_eq!(body["data"]["data"][1]["role"], Value::Null);

    let (status, body) = send(&app, "GET", "/users/1?expand=manager", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 4007);
}

#[tokio::test]
async fn hooks_run_around_the_pipeline() {
    let deleted = Arc::new(AtomicUsize::new(0));
    let counter = deleted.clone();
    let options = RouteOptions::<User>::new()
        .before_create(|user: &mut User| {
            user.nickname = user.email.split('@').next().unwrap_or_default().to_string();
            Ok(())
        })
        .after_get(|record| {
            record.insert("decorated".into(), json!(true));
            Ok(())
        })
        .before_update(|payload| {
            if payload.get("nickname").and_then(Value::as_str) == Some("root") {
                return Err("reserved nickname".into());
            }
            Ok(())
        })
        .after_delete(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    let app = app(MemoryStore::new(), options);
    create_user(&app, "hooked@example.com").await;

    let (_, body) = send(&app, "GET", "/users/1", None).await;
    assert_eq!(body["data"]["nickname"], "hooked");
    assert_eq!(body["data"]["decorated"], true);

    let (status, body) = send(&app, "PATCH", "/users/1", Some(json!({"nickname": "root"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 5007);
    assert_eq!(body["message"], "update hook failed");

    let (status, _) = send(&app, "DELETE", "/users/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(deleted.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn interceptor_short_circuits_one_verb() {
    let options = RouteOptions::<User>::new().intercept(Verb::Delete, |parts| {
        if parts.headers.contains_key("x-admin") {
            Ok(())
        } else {
            Err(ApiError::new(ErrorCode::Forbidden))
        }
    });
    let app = app(MemoryStore::new(), options);
    create_user(&app, "i@example.com").await;

    let (status, body) = send(&app, "DELETE", "/users/1", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 1003);

    let (status, _) = send(&app, "GET", "/users/1", None).await;
    assert_eq!(status, StatusCode::OK);

    let req = Request::builder()
        .method("DELETE")
        .uri("/users/1")
        .header("x-admin", "1")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn transactional_create_rolls_back_on_after_hook_failure() {
    let store = MemoryStore::new();
    let options = RouteOptions::<User>::new()
        .transactional(true)
        .after_create(|_| Err("audit sink unavailable".into()));
    let app = app(store.clone(), options);

    let (status, body) = send(
        &app,
        "POST",
        "/users",
        Some(json!({"email": "tx@example.com", "password": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 3006);
    assert!(store.raw_rows("users").await.is_empty());
}

#[tokio::test]
async fn direct_create_keeps_row_when_after_hook_fails() {
    let store = MemoryStore::new();
    let options = RouteOptions::<User>::new().after_create(|_| Err("audit sink unavailable".into()));
    let app = app(store.clone(), options);

    let (status, _) = send(
        &app,
        "POST",
        "/users",
        Some(json!({"email": "direct@example.com", "password": "x"})),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(store.raw_rows("users").await.len(), 1);
}

async fn nickname_of(app: &Router, id: u32) -> Value {
    let (status, body) = send(app, "GET", &format!("/users/{id}?fields=nickname"), None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    body["data"]["nickname"].clone()
}

#[tokio::test]
async fn transactional_update_rolls_back_on_after_hook_failure() {
    let options = RouteOptions::<User>::new()
        .transactional(true)
        .after_update(|_| Err("audit sink unavailable".into()));
    let app = app(MemoryStore::new(), options);
    create_user(&app, "tx@example.com").await;

    let (status, body) = send(&app, "PATCH", "/users/1", Some(json!({"nickname": "changed"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 5007);
    assert_eq!(nickname_of(&app, 1).await, "anonymous");
}

#[tokio::test]
async fn direct_update_keeps_change_when_after_hook_fails() {
    let options = RouteOptions::<User>::new().after_update(|_| Err("audit sink unavailable".into()));
    let app = app(MemoryStore::new(), options);
    create_user(&app, "direct@example.com").await;

    let (status, _) = send(&app, "PATCH", "/users/1", Some(json!({"nickname": "changed"}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(nickname_of(&app, 1).await, "changed");
}

#[tokio::test]
async fn transactional_delete_rolls_back_on_after_hook_failure() {
    let store = MemoryStore::new();
    let options = RouteOptions::<User>::new()
        .transactional(true)
        .after_delete(|_| Err("audit sink unavailable".into()));
    let app = app(store.clone(), options);
    create_user(&app, "tx@example.com").await;

    let (status, body) = send(&app, "DELETE", "/users/1", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], 6006);

    let (status, body) = send(&app, "GET", "/users/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "tx@example.com");
    assert!(store.raw_rows("users").await[0]["deleted_at"].is_null());
}

#[tokio::test]
async fn direct_delete_keeps_deletion_when_after_hook_fails() {
    let store = MemoryStore::new();
    let options = RouteOptions::<User>::new().after_delete(|_| Err("audit sink unavailable".into()));
    let app = app(store.clone(), options);
    create_user(&app, "direct@example.com").await;

    let (status, _) = send(&app, "DELETE", "/users/1", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = send(&app, "GET", "/users/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!store.raw_rows("users").await[0]["deleted_at"].is_null());
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Note {
    id: i64,
    title: String,
    created_at: String,
}

impl Entity for Note {
    const TABLE: &'static str = "notes";
    fn fields() -> &'static [FieldDef] {
        const FIELDS: &[FieldDef] = &[
            FieldDef::new("id", "id", FieldKind::Integer).crud("allow_get"),
            FieldDef::new("title", "title", FieldKind::String).crud("required_on_create,partial_update,allow_get"),
            FieldDef::new("created_at", "created_at", FieldKind::String).crud("partial_update,allow_get"),
        ];
        FIELDS
    }
}

#[tokio::test]
async fn update_of_store_managed_column_is_rejected() {
    let core = CrudCore::init(MemoryStore::new(), Registry::builder().register::<Note>()).unwrap();
    let app: Router = entity_routes::<Note, ()>(&core, "notes", RouteOptions::new()).unwrap();
    let (status, _) = send(&app, "POST", "/notes", Some(json!({"title": "t"}))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(&app, "PATCH", "/notes/1", Some(json!({"created_at": "2020-01-01"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 5004);

    let (status, body) = send(&app, "GET", "/notes/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["data"]["created_at"], "2020-01-01");

    let (status, body) = send(&app, "PATCH", "/notes/1", Some(json!({"title": "renamed"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "renamed");
}

#[tokio::test]
async fn common_routes_report_health() {
    let app = app(MemoryStore::new(), RouteOptions::new());
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));

    let (status, body) = send(&app, "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["store"], "ok");

    let (_, body) = send(&app, "GET", "/version", None).await;
    assert_eq!(body["name"], "schema-crud");
}

#[test]
fn route_registration_validates_inputs() {
    let core = core(MemoryStore::new());
    let err = entity_routes::<User, ()>(&core, "bad segment", RouteOptions::new()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidSegment(_)));

    let only_roles = CrudCore::init(MemoryStore::new(), Registry::builder().register::<Role>()).unwrap();
    let err = entity_routes::<User, ()>(&only_roles, "users", RouteOptions::new()).unwrap_err();
    assert!(matches!(err, ConfigError::UnregisteredEntity(_)));
}
