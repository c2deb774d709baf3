// client.rs — Producer-side reporting client.
//
// Lets a producer process report progress to a running hub:
//
//     let hub = HubClient::new("http://localhost:3738");
//     let task = hub.task("build-42", "Nightly build").await;
//     task.set_progress(50, 100).await;
//     task.log("halfway there", "info").await;
//     task.complete("done, 100 items processed").await;
//
// Every call is fire-and-forget: a hub outage must never break the
// producer, so transport failures are logged at warn and swallowed.

use serde_json::{json, Value};
use tracing::warn;

pub struct HubClient {
    base_url: String,
    http: reqwest::Client,
}

impl HubClient {
    /// `base_url` is the hub's update API address, e.g. `http://localhost:3738`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Read the hub address from `TASKHUB_URL`, defaulting to the local hub.
    pub fn from_env() -> Self {
        let base_url = std::env::var("TASKHUB_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "http://localhost:3738".to_string());
        Self::new(base_url)
    }

    /// Register a task and return a reporting handle for it.
    pub async fn task(&self, id: &str, name: &str) -> TaskReporter {
        post(
            &self.http,
            &self.base_url,
            &format!("/api/task/{id}"),
            json!({ "name": name }),
        )
        .await;
        TaskReporter {
            base_url: self.base_url.clone(),
            http: self.http.clone(),
            id: id.to_string(),
        }
    }
}

/// Reporting handle for a single task.
pub struct TaskReporter {
    base_url: String,
    http: reqwest::Client,
    id: String,
}

impl TaskReporter {
    pub async fn set_progress(&self, progress: i64, total: i64) {
        self.post("", json!({ "progress": progress, "total": total }))
            .await;
    }

    pub async fn log(&self, message: &str, level: &str) {
        self.post("/log", json!({ "message": message, "level": level }))
            .await;
    }

    pub async fn complete(&self, summary: &str) {
        self.post("/complete", json!({ "summary": summary })).await;
    }

    pub async fn fail(&self, error: &str) {
        self.post("/fail", json!({ "error": error })).await;
    }

    async fn post(&self, suffix: &str, body: Value) {
        let endpoint = format!("/api/task/{}{}", self.id, suffix);
        post(&self.http, &self.base_url, &endpoint, body).await;
    }
}

async fn post(http: &reqwest::Client, base_url: &str, endpoint: &str, body: Value) {
    let url = format!("{base_url}{endpoint}");
    match http.post(&url).json(&body).send().await {
        Ok(resp) if !resp.status().is_success() => {
            warn!(url = %url, status = %resp.status(), "hub update rejected");
        }
        Ok(_) => {}
        Err(e) => {
            warn!(url = %url, err = %e, "hub update failed");
        }
    }
}
