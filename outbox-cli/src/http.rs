//! HTTP executor for the dashboard REST API.
//!
//! | kind            | request                                  |
//! |-----------------|------------------------------------------|
//! | `create-entity` | `POST {base}/entities`                   |
//! | `update-entity` | `PUT {base}/entities/{id}`               |
//! | `delete-entity` | `DELETE {base}/entities/{id}`            |
//! | `send-message`  | `POST {base}/entities/{entityId}/messages` |
//!
//! Every request carries the action id in `X-Idempotency-Key` so the
//! backend can discard replays.

use anyhow::{Context, Result};
use async_trait::async_trait;
use outbox_client::{ActionHandler, ExecutorError};
use outbox_types::{ActionKind, QueuedAction};
use reqwest::Method;
use serde_json::{json, Value};

/// Header carrying the action id.
pub const IDEMPOTENCY_HEADER: &str = "X-Idempotency-Key";

/// One HTTP request derived from a queued action.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

/// Applies every action kind against a REST backend.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpExecutor {
    /// Create an executor for `base_url`.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Map an action onto its request.
    pub fn route(&self, action: &QueuedAction) -> Result<Route, ExecutorError> {
        let base = &self.base_url;
        let payload = &action.payload;

        let route = match action.kind {
            ActionKind::CreateEntity => Route {
                method: Method::POST,
                url: format!("{base}/entities"),
                body: Some(payload.clone()),
            },
            ActionKind::UpdateEntity => Route {
                method: Method::PUT,
                url: format!("{base}/entities/{}", string_field(payload, "id")?),
                body: Some(payload.clone()),
            },
            ActionKind::DeleteEntity => Route {
                method: Method::DELETE,
                url: format!("{base}/entities/{}", string_field(payload, "id")?),
                body: None,
            },
            ActionKind::SendMessage => Route {
                method: Method::POST,
                url: format!(
                    "{base}/entities/{}/messages",
                    string_field(payload, "entityId")?
                ),
                body: Some(json!({ "message": payload.get("message").cloned().unwrap_or(Value::Null) })),
            },
        };

        Ok(route)
    }
}

#[async_trait]
impl ActionHandler for HttpExecutor {
    async fn apply(&self, action: &QueuedAction) -> Result<(), ExecutorError> {
        let route = self.route(action)?;

        let mut req = self
            .client
            .request(route.method, &route.url)
            .header(IDEMPOTENCY_HEADER, action.id.to_string());
        if let Some(body) = &route.body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ExecutorError::Request(e.to_string()))?;

        let status = resp.status();
        if status.is_success() {
            tracing::debug!(action_id = %action.id, %status, url = %route.url, "remote apply succeeded");
            Ok(())
        } else {
            let body = resp
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(256)
                .collect::<String>();
            Err(ExecutorError::Rejected(format!("HTTP {status}: {body}")))
        }
    }
}

fn string_field<'a>(payload: &'a Value, field: &str) -> Result<&'a str, ExecutorError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ExecutorError::Rejected(format!("payload is missing \"{field}\"")))
}
