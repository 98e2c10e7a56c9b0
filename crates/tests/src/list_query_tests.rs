use std::collections::HashSet;

use crate::fixtures::test_app::TestApp;
use bson::{Document, doc, oid::ObjectId};
use serde_json::{Value, json};

async fn seed_tags(app: &TestApp, count: usize) {
    let data: Vec<Value> = (0..count)
        .map(|i| json!({ "name": format!("tag-{i:02}"), "color": "blue" }))
        .collect();
    let (status, json) = app
        .post_json("/api/resource/tag/insert-many", json!({ "data": data }))
        .await;
    assert_eq!(status, 200, "{json}");
    assert_eq!(json["count"], count);
}

fn ids(json: &Value) -> Vec<String> {
    json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|record| record["_id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn pages_are_disjoint_and_report_the_total() {
    let app = TestApp::spawn().await;
    seed_tags(&app, 15).await;

    let mut seen = HashSet::new();
    for page in 0..3 {
        let (status, json) = app
            .post_json(
                "/api/resource/tag/get-all",
                json!({
                    "sort": { "name": 1 },
                    "pagination": { "pageSize": 5, "currentPage": page },
                }),
            )
            .await;
        assert_eq!(status, 200);
        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 15);
        let page_ids = ids(&json);
        assert_eq!(page_ids.len(), 5);
        for id in page_ids {
            assert!(seen.insert(id), "record appeared on two pages");
        }
    }
    assert_eq!(seen.len(), 15);

    let (_, json) = app
        .post_json(
            "/api/resource/tag/get-all",
            json!({ "pagination": { "pageSize": 5, "currentPage": 3 } }),
        )
        .await;
    assert_eq!(json["count"], 15);
    assert!(json["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn first_page_is_sorted_by_caller_order() {
    let app = TestApp::spawn().await;
    seed_tags(&app, 6).await;

    let (_, json) = app
        .post_json(
            "/api/resource/tag/get-all",
            json!({
                "sort": { "name": -1 },
                "pagination": { "pageSize": 2, "currentPage": 0 },
            }),
        )
        .await;

    let names: Vec<&str> = json["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|record| record["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["tag-05", "tag-04"]);
}

#[tokio::test]
async fn unpaginated_count_equals_length() {
    let app = TestApp::spawn().await;
    seed_tags(&app, 4).await;

    let (status, json) = app.post_json("/api/resource/tag/get-all", json!({})).await;

    assert_eq!(status, 200);
    assert_eq!(json["count"], 4);
    assert_eq!(json["data"].as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn unfiltered_list_is_served_from_cache_until_a_mutation() {
    let app = TestApp::spawn().await;
    seed_tags(&app, 2).await;

    let (_, first) = app.post_json("/api/resource/tag/get-all", json!({})).await;
    assert_eq!(first["count"], 2);

    // Written behind the service's back: the cached list cannot know about it
    app.db
        .collection::<Document>("tags")
        .insert_one(doc! { "name": "sneaky", "createdAt": bson::DateTime::now() })
        .await
        .unwrap();
    let (_, cached) = app.post_json("/api/resource/tag/get-all", json!({})).await;
    assert_eq!(cached["count"], 2);

    app.seed_record("tag", json!({ "name": "through-the-service" }))
        .await;
    let (_, fresh) = app.post_json("/api/resource/tag/get-all", json!({})).await;
    assert_eq!(fresh["count"], 4);
}

#[tokio::test]
async fn filtered_and_paginated_lists_are_never_cached() {
    let app = TestApp::spawn().await;
    seed_tags(&app, 3).await;

    let filtered = json!({ "filter": { "name": "late" } });
    let paginated = json!({ "pagination": { "pageSize": 10, "currentPage": 0 } });
    let (_, before) = app.post_json("/api/resource/tag/get-all", filtered.clone()).await;
    assert_eq!(before["count"], 0);
    let (_, before_page) = app.post_json("/api/resource/tag/get-all", paginated.clone()).await;
    assert_eq!(before_page["count"], 3);

    app.db
        .collection::<Document>("tags")
        .insert_one(doc! { "name": "late", "createdAt": bson::DateTime::now() })
        .await
        .unwrap();

    let (_, after) = app.post_json("/api/resource/tag/get-all", filtered).await;
    assert_eq!(after["count"], 1);
    let (_, after_page) = app.post_json("/api/resource/tag/get-all", paginated).await;
    assert_eq!(after_page["count"], 4);
}

#[tokio::test]
async fn search_is_case_insensitive_substring() {
    let app = TestApp::spawn().await;
    for name in ["Alpha", "alphabet", "Beta", "axb"] {
        app.seed_record("tag", json!({ "name": name })).await;
    }

    let (_, json) = app
        .post_json("/api/resource/tag/get-all?q=ALP", json!({}))
        .await;
    assert_eq!(json["count"], 2);

    // Metacharacters match literally
    let (_, json) = app
        .post_json("/api/resource/tag/get-all?q=a.b", json!({}))
        .await;
    assert_eq!(json["count"], 0);
}

#[tokio::test]
async fn user_password_is_never_returned() {
    let app = TestApp::spawn().await;
    let id = app
        .seed_record(
            "user",
            json!({ "username": "ada", "name": "Ada", "password": "s3cret", "phoneNo": "555" }),
        )
        .await;

    let (_, list) = app.post_json("/api/resource/user/get-all", json!({})).await;
    assert_eq!(list["count"], 1);
    assert_eq!(list["data"][0]["username"], "ada");
    assert!(list["data"][0].get("password").is_none());

    let (_, list) = app
        .post_json(
            "/api/resource/user/get-all",
            json!({ "select": { "username": 1, "password": 1 } }),
        )
        .await;
    assert!(list["data"][0].get("password").is_none());

    let resp = app
        .auth_get(&format!("/api/resource/user/{id}?select=password"), &app.token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["data"]["_id"], id);
    assert!(json["data"].get("password").is_none());
}

#[tokio::test]
async fn bad_requests_answer_with_the_envelope() {
    let app = TestApp::spawn().await;

    let (status, json) = app
        .post_json("/api/resource/user/get-all", json!({ "filter": { "password": "x" } }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(json["success"], false);

    let (status, json) = app
        .post_json(
            "/api/resource/task/get-all",
            json!({ "filter": { "project._id": "nope" } }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(json["success"], false);

    let (status, json) = app
        .post_json(
            "/api/resource/tag/get-all",
            json!({ "select": { "name": 1, "color": 0 } }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(json["success"], false);

    let (status, _) = app
        .post_json("/api/resource/spaceship/get-all", json!({}))
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn undecodable_bodies_answer_with_the_envelope() {
    let app = TestApp::spawn().await;

    let (status, json) = app
        .post_json(
            "/api/resource/tag/get-all",
            json!({ "pagination": { "currentPage": -1, "pageSize": 5 } }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(json["success"], false);
    assert!(json["message"].is_string());

    let (status, json) = app
        .post_json(
            "/api/resource/tag/get-all",
            json!({ "pagination": { "currentPage": 0, "pageSize": "x" } }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(json["success"], false);

    let (status, json) = app
        .post_json("/api/task/add-list", json!({ "name": "orphan" }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(json["success"], false);

    let resp = app
        .auth_post("/api/resource/tag/get-all", &app.token)
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["success"], false);

    let resp = app
        .auth_post("/api/task/get-user-task-report-by-admin", &app.token)
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn requests_without_a_token_are_rejected() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/resource/tag/get-all"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status().as_u16(), 401);
    let json: Value = resp.json().await.unwrap();
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn user_scoped_task_list_ignores_caller_assignee() {
    let app = TestApp::spawn().await;
    let other = ObjectId::new();
    app.seed_task("mine", app.user_id).await;
    app.seed_task("theirs", other).await;

    let (_, json) = app
        .post_json(
            "/api/task/get-all-by-user",
            json!({ "filter": { "assignTo._id": other.to_hex() } }),
        )
        .await;

    assert_eq!(json["count"], 1);
    assert_eq!(json["data"][0]["title"], "mine");

    let (_, all) = app.post_json("/api/task/get-all", json!({})).await;
    assert_eq!(all["count"], 2);
}

#[tokio::test]
async fn task_date_filters_match_stored_dates() {
    let app = TestApp::spawn().await;
    app.seed_task("march", app.user_id).await;

    let (status, json) = app
        .post_json(
            "/api/task/get-all",
            json!({ "filter": { "dueDate": { "$gte": "2024-03-01", "$lte": "2024-03-31" } } }),
        )
        .await;
    assert_eq!(status, 200, "{json}");
    assert_eq!(json["count"], 1);

    let (_, json) = app
        .post_json("/api/task/get-all", json!({ "filter": { "month": 3 } }))
        .await;
    assert_eq!(json["count"], 1);

    let (_, json) = app
        .post_json(
            "/api/task/get-all",
            json!({ "filter": { "dueDate": { "$gte": "2024-04-01" } } }),
        )
        .await;
    assert_eq!(json["count"], 0);
}
