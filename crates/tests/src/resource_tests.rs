use crate::fixtures::test_app::TestApp;
use bson::oid::ObjectId;
use serde_json::{Value, json};

async fn get(app: &TestApp, path: &str) -> (u16, Value) {
    let resp = app.auth_get(path, &app.token).send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn add_then_get_by_id() {
    let app = TestApp::spawn().await;
    let id = app
        .seed_record("project", json!({ "name": "Atlas", "status": "Running" }))
        .await;

    let (status, json) = get(&app, &format!("/api/resource/project/{id}?select=name,status")).await;

    assert_eq!(status, 200);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["name"], "Atlas");
    assert_eq!(json["data"]["status"], "Running");
}

#[tokio::test]
async fn get_by_id_without_select_returns_the_whole_record() {
    let app = TestApp::spawn().await;
    let task_id = app.seed_task("Ship it", app.user_id).await;
    app.seed_item(&task_id, json!({ "name": "Write notes", "status": "Pending" }))
        .await;

    let (status, json) = get(&app, &format!("/api/resource/task/{task_id}")).await;

    assert_eq!(status, 200);
    assert_eq!(json["data"]["title"], "Ship it");
    assert_eq!(json["data"]["isDone"], false);
    assert_eq!(json["data"]["list"][0]["name"], "Write notes");
    assert!(json["data"].get("dueDate").is_some());

    let user_id = app
        .seed_record(
            "user",
            json!({ "name": "Mira", "username": "mira", "password": "hunter2" }),
        )
        .await;
    let (status, json) = get(&app, &format!("/api/resource/user/{user_id}")).await;

    assert_eq!(status, 200);
    assert_eq!(json["data"]["username"], "mira");
    assert_eq!(json["data"]["name"], "Mira");
    assert!(json["data"].get("password").is_none());
}

#[tokio::test]
async fn client_supplied_id_is_ignored_on_add() {
    let app = TestApp::spawn().await;
    let forced = ObjectId::new().to_hex();

    let id = app
        .seed_record("tag", json!({ "_id": forced, "name": "mine" }))
        .await;

    assert_ne!(id, forced);
}

#[tokio::test]
async fn update_by_id_changes_only_given_fields() {
    let app = TestApp::spawn().await;
    let id = app
        .seed_record("project", json!({ "name": "Atlas", "status": "Running" }))
        .await;

    let (status, json) = app
        .put_json(&format!("/api/resource/project/{id}"), json!({ "status": "Done" }))
        .await;
    assert_eq!(status, 200, "{json}");

    let (_, json) = get(&app, &format!("/api/resource/project/{id}?select=name,status")).await;
    assert_eq!(json["data"]["name"], "Atlas");
    assert_eq!(json["data"]["status"], "Done");
}

#[tokio::test]
async fn missing_record_is_not_found() {
    let app = TestApp::spawn().await;
    let missing = ObjectId::new().to_hex();

    let (status, json) = get(&app, &format!("/api/resource/tag/{missing}")).await;
    assert_eq!(status, 404);
    assert_eq!(json["success"], false);

    let (status, _) = app
        .put_json(&format!("/api/resource/tag/{missing}"), json!({ "name": "x" }))
        .await;
    assert_eq!(status, 404);

    let resp = app
        .auth_delete(&format!("/api/resource/tag/{missing}"), &app.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 404);
}

#[tokio::test]
async fn empty_update_is_a_validation_error() {
    let app = TestApp::spawn().await;
    let id = app.seed_record("tag", json!({ "name": "x" })).await;

    let (status, json) = app
        .put_json(&format!("/api/resource/tag/{id}"), json!({ "_id": id }))
        .await;

    assert_eq!(status, 422);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn update_and_delete_multiple() {
    let app = TestApp::spawn().await;
    let a = app.seed_record("tag", json!({ "name": "a" })).await;
    let b = app.seed_record("tag", json!({ "name": "b" })).await;
    let c = app.seed_record("tag", json!({ "name": "c" })).await;

    let (_, json) = app
        .put_json(
            "/api/resource/tag/update-multiple",
            json!({ "ids": [a, b], "data": { "visibility": false } }),
        )
        .await;
    assert_eq!(json["success"], true);
    assert_eq!(json["count"], 2);

    let (_, json) = app
        .post_json(
            "/api/resource/tag/get-all",
            json!({ "filter": { "visibility": false } }),
        )
        .await;
    assert_eq!(json["count"], 2);

    let (_, json) = app
        .post_json("/api/resource/tag/delete-multiple", json!({ "ids": [a, c] }))
        .await;
    assert_eq!(json["count"], 2);

    let (_, json) = app.post_json("/api/resource/tag/get-all", json!({})).await;
    assert_eq!(json["count"], 1);
    assert_eq!(json["data"][0]["_id"], b);
}

#[tokio::test]
async fn empty_id_list_is_a_soft_failure() {
    let app = TestApp::spawn().await;

    let (status, json) = app
        .put_json(
            "/api/resource/tag/update-multiple",
            json!({ "ids": [], "data": { "name": "x" } }),
        )
        .await;

    assert_eq!(status, 200);
    assert_eq!(json["success"], false);
    assert_eq!(json["message"], "No Data Updated");
}

#[tokio::test]
async fn insert_many_can_replace_the_collection() {
    let app = TestApp::spawn().await;
    app.seed_record("designation", json!({ "name": "old" })).await;

    let (status, json) = app
        .post_json(
            "/api/resource/designation/insert-many",
            json!({ "data": [{ "name": "new-1" }, { "name": "new-2" }], "replace": true }),
        )
        .await;
    assert_eq!(status, 200, "{json}");

    let (_, json) = app
        .post_json("/api/resource/designation/get-all", json!({}))
        .await;
    assert_eq!(json["count"], 2);
}

#[tokio::test]
async fn duplicate_username_is_a_conflict() {
    let app = TestApp::spawn().await;
    app.seed_record("user", json!({ "username": "ada" })).await;

    let (status, json) = app
        .post_json("/api/resource/user/add", json!({ "username": "ada" }))
        .await;

    assert_eq!(status, 409);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn projects_filter_by_technology() {
    let app = TestApp::spawn().await;
    let rust = app.seed_record("technology", json!({ "name": "Rust" })).await;
    let go = app.seed_record("technology", json!({ "name": "Go" })).await;
    app.seed_record(
        "project",
        json!({ "name": "Engine", "technologies": [{ "_id": rust, "name": "Rust" }] }),
    )
    .await;
    app.seed_record(
        "project",
        json!({ "name": "Proxy", "technologies": [{ "_id": go, "name": "Go" }] }),
    )
    .await;

    let (status, json) = app
        .post_json(
            "/api/resource/project/get-all",
            json!({ "filter": { "technologies._id": rust } }),
        )
        .await;

    assert_eq!(status, 200);
    assert_eq!(json["count"], 1);
    assert_eq!(json["data"][0]["name"], "Engine");
}

#[tokio::test]
async fn health_check_is_public() {
    let app = TestApp::spawn().await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();

    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["status"], "ok");
}
