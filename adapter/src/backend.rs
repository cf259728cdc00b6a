//! REST resources of the chat-bot backend.

use crate::config::Endpoints;
use dataapi::hooks::HeaderHook;
use dataapi::{ApiClient, ApiOptions, DataDrfApiSet, DrfActionApi, Params};
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::Method;
use serde_json::json;
use std::sync::Arc;

const MODULE: &str = "BKCHAT";
const TIMEOUT_SECS: u64 = 30;

static AUTHORIZATION_HEADER: HeaderName = HeaderName::from_static("x-bkapi-authorization");

pub struct BackendApi {
    pub execution_logs: DataDrfApiSet,
    pub task_broadcasts: DataDrfApiSet,
}

impl BackendApi {
    pub const RESOURCES: &'static [&'static str] = &["execution_logs", "task_broadcasts"];

    pub fn new(client: &ApiClient, endpoints: &Endpoints) -> Self {
        let options = ApiOptions {
            default_timeout: Some(TIMEOUT_SECS),
            custom_headers: Some(app_auth_headers(client)),
            ..Default::default()
        };

        BackendApi {
            execution_logs: DataDrfApiSet::new(
                client.clone(),
                endpoints.backend("execution_logs/"),
                MODULE,
                "id",
            )
            .with_options(ApiOptions {
                description: Some("task execution logs".into()),
                ..options.clone()
            }),
            task_broadcasts: DataDrfApiSet::new(
                client.clone(),
                endpoints.backend("task_broadcasts/"),
                MODULE,
                "id",
            )
            .with_options(ApiOptions {
                description: Some("task broadcast subscriptions".into()),
                ..options
            })
            .with_action(
                "broadcast",
                DrfActionApi::new(true, Method::POST).with_options(ApiOptions {
                    description: Some("push a task broadcast to its subscribers".into()),
                    ..Default::default()
                }),
            ),
        }
    }

    pub fn find(&self, resource: &str) -> Option<&DataDrfApiSet> {
        match resource {
            "execution_logs" => Some(&self.execution_logs),
            "task_broadcasts" => Some(&self.task_broadcasts),
            _ => None,
        }
    }
}

// Identifies the app to the backend gateway.
fn app_auth_headers(client: &ApiClient) -> HeaderHook {
    let settings = client.settings().clone();
    Arc::new(move |_params: &Params| {
        let mut headers = HeaderMap::new();
        let auth = json!({
            "bk_app_code": settings.app_code,
            "bk_app_secret": settings.app_secret,
        });
        if let Ok(value) = HeaderValue::from_str(&auth.to_string()) {
            headers.insert(AUTHORIZATION_HEADER.clone(), value);
        }
        headers
    })
}
