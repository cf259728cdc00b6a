//! Grafana HTTP API calls authenticated through the auth-proxy user header.
//!
//! Grafana answers with plain JSON rather than the platform envelope, so
//! responses are wrapped into `{result, code, message, data}` here.

use crate::Params;
use crate::api::{fill_url, query_pairs};
use crate::client::ApiClient;
use crate::context::RequestContext;
use crate::errors::{DataApiError, Result};
use crate::metrics_defs::API_REQUEST;
use http::header::{HeaderName, HeaderValue};
use http::{Method, StatusCode};
use serde_json::{Value, json};
use shared::counter;
use std::time::Duration;

const MODULE: &str = "GRAFANA";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

static WEBAUTH_USER_HEADER: HeaderName = HeaderName::from_static("x-webauth-user");
static ORG_ID_HEADER: HeaderName = HeaderName::from_static("x-grafana-org-id");

#[derive(Clone, Debug)]
pub struct GrafanaApi {
    client: ApiClient,
    method: Method,
    url: String,
    url_keys: Vec<String>,
    with_org_id: bool,
}

impl GrafanaApi {
    pub fn new(client: ApiClient, method: Method, url: impl Into<String>) -> Self {
        GrafanaApi {
            client,
            method,
            url: url.into(),
            url_keys: Vec::new(),
            with_org_id: false,
        }
    }

    pub fn with_url_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.url_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Non-admin endpoints are scoped to an organisation taken from the
    /// `org_id` parameter.
    pub fn with_org_id(mut self) -> Self {
        self.with_org_id = true;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Sends the request and returns the wrapped response. Only transport
    /// failures and a missing `org_id` are errors; HTTP failures come back
    /// as `result: false`.
    pub async fn call(
        &self,
        ctx: &RequestContext,
        mut params: Params,
        timeout: Option<Duration>,
    ) -> Result<Value> {
        let url = fill_url(&self.url, &self.url_keys, &params)?;
        let request_error = |message: String| DataApiError::Request {
            message: format!("[{MODULE}-API]{message}"),
            request_id: ctx.request_id().to_string(),
            status: None,
        };

        let settings = self.client.settings();
        let mut builder = self
            .client
            .http()
            .request(self.method.clone(), &url)
            .timeout(timeout.unwrap_or(DEFAULT_TIMEOUT))
            .header(&WEBAUTH_USER_HEADER, settings.grafana_admin_user.as_str());

        if self.with_org_id {
            let org_id = params
                .remove("org_id")
                .ok_or_else(|| request_error("request is missing org_id".into()))?;
            let org_id = match org_id {
                Value::String(s) => s,
                other => other.to_string(),
            };
            let value = HeaderValue::from_str(&org_id)
                .map_err(|_| request_error(format!("invalid org_id {org_id}")))?;
            builder = builder.header(&ORG_ID_HEADER, value);
        }

        builder = match self.method {
            Method::PUT | Method::POST | Method::PATCH => builder.json(&params),
            _ => builder.query(&query_pairs(&params)),
        };

        tracing::debug!(method = %self.method, url = %url, "sending grafana request");
        let response = builder
            .send()
            .await
            .map_err(|e| request_error(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| request_error(e.to_string()))?;
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);

        let result = status == StatusCode::OK || status == StatusCode::NO_CONTENT;
        let outcome = if result { "success" } else { "failure" };
        counter!(API_REQUEST, "module" => MODULE, "result" => outcome).increment(1);

        if result {
            return Ok(json!({
                "result": true,
                "code": status.as_u16(),
                "message": "",
                "data": body,
            }));
        }

        let message = body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(text);
        tracing::error!(url = %url, status = status.as_u16(), %message, "grafana request failed");
        Ok(json!({
            "result": false,
            "code": status.as_u16(),
            "message": message,
            "data": null,
        }))
    }
}
