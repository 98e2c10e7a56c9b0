use bson::oid::ObjectId;
use serde_json::{Value, json};

use super::test_app::TestApp;

impl TestApp {
    pub fn auth_get(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_post(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .post(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_put(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .put(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    pub fn auth_delete(&self, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.client
            .delete(self.url(path))
            .header("Authorization", format!("Bearer {}", token))
    }

    /// POST a JSON body as the default test user and return the envelope.
    pub async fn post_json(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .auth_post(path, &self.token)
            .json(&body)
            .send()
            .await
            .expect("Request failed");
        let status = resp.status().as_u16();
        (status, resp.json().await.expect("Response is not JSON"))
    }

    pub async fn put_json(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .auth_put(path, &self.token)
            .json(&body)
            .send()
            .await
            .expect("Request failed");
        let status = resp.status().as_u16();
        (status, resp.json().await.expect("Response is not JSON"))
    }

    /// Add one record of `kind` and return its id.
    pub async fn seed_record(&self, kind: &str, body: Value) -> String {
        let (status, json) = self
            .post_json(&format!("/api/resource/{kind}/add"), body)
            .await;
        assert_eq!(status, 200, "Seeding {kind} failed: {json}");
        json["data"]["_id"]
            .as_str()
            .expect("Added record has no id")
            .to_string()
    }

    /// A task assigned to `assignee`.
    pub async fn seed_task(&self, title: &str, assignee: ObjectId) -> String {
        self.seed_record(
            "task",
            json!({
                "title": title,
                "assignTo": [{ "_id": assignee.to_hex(), "name": "assignee" }],
                "dueDate": "2024-03-15",
                "isDone": false,
            }),
        )
        .await
    }

    /// Add a checklist item and return its id.
    pub async fn seed_item(&self, task_id: &str, item: Value) -> String {
        let mut body = item;
        body["taskId"] = json!(task_id);
        let (status, json) = self.post_json("/api/task/add-list", body).await;
        assert_eq!(status, 200, "Adding checklist item failed: {json}");
        json["data"]["_id"]
            .as_str()
            .expect("Checklist item has no id")
            .to_string()
    }
}
