use crate::Params;
use crate::audit::{self, AuditRecord, MAX_MESSAGE_RECORD};
use crate::cache;
use crate::client::ApiClient;
use crate::context::RequestContext;
use crate::errors::{DataApiError, Result, SendError};
use crate::hooks::{AfterRequest, BeforeRequest, HeaderHook, ResponseSerializer};
use crate::metrics_defs::{API_REQUEST, API_REQUEST_DURATION};
use crate::response::{DataResponse, is_truthy};
use chrono::{DateTime, Local};
use http::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use reqwest::multipart::{Form, Part};
use serde_json::{Value, json};
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

const DEFAULT_MAX_RECORD: usize = 5000;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

static REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-data-request-id");
static METHOD_OVERRIDE_HEADER: HeaderName = HeaderName::from_static("x-method-override");
static LANGUAGE_HEADER: HeaderName = HeaderName::from_static("blueking-language");
static PLAIN_REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("request-id");

/// A file sent as part of a multipart POST/PUT/PATCH.
#[derive(Clone, Debug, PartialEq)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub content: Vec<u8>,
    pub mime: Option<String>,
}

impl FilePart {
    pub fn new(field: impl Into<String>, file_name: impl Into<String>, content: Vec<u8>) -> Self {
        FilePart {
            field: field.into(),
            file_name: file_name.into(),
            content,
            mime: None,
        }
    }
}

/// Per-call switches.
#[derive(Clone, Debug)]
pub struct CallOptions {
    /// Return the whole response envelope instead of its `data`
    pub raw: bool,
    /// Overrides the API's default timeout
    pub timeout: Option<Duration>,
    /// Turn a falsy `result` into [`DataApiError::Result`]
    pub raise_exception: bool,
    /// Forward the context's cookies on POST/PUT/PATCH
    pub request_cookies: bool,
    pub files: Vec<FilePart>,
}

impl Default for CallOptions {
    fn default() -> Self {
        CallOptions {
            raw: false,
            timeout: None,
            raise_exception: true,
            request_cookies: true,
            files: Vec::new(),
        }
    }
}

impl CallOptions {
    pub fn raw() -> Self {
        CallOptions {
            raw: true,
            ..Default::default()
        }
    }
}

/// A single backend endpoint.
///
/// The URL is a template whose `{key}` placeholders are filled from the
/// parameters named in `url_keys`. Calls go through the hooks, the response
/// cache and the audit sink of the [`ApiClient`] the API was built with.
#[derive(Clone)]
pub struct DataApi {
    client: ApiClient,
    method: Method,
    url: String,
    module: String,
    description: String,
    default_return_value: Option<Value>,
    before_request: Option<BeforeRequest>,
    after_request: Option<AfterRequest>,
    after_serializer: Option<Arc<dyn ResponseSerializer>>,
    max_response_record: Option<usize>,
    max_query_params_record: Option<usize>,
    method_override: Option<String>,
    url_keys: Vec<String>,
    cache_time: Duration,
    default_timeout: Duration,
    headers: Option<HeaderHook>,
    response_validation: Option<Params>,
    param_keys: Vec<String>,
}

// Failure of one exchange with the backend. `response` is the synthesized
// envelope for HTTP-level failures; the audit record is built from it.
struct Failure {
    error: SendError,
    response: Option<DataResponse>,
    message: String,
}

impl DataApi {
    pub fn new(
        client: ApiClient,
        method: Method,
        url: impl Into<String>,
        module: impl Into<String>,
    ) -> Self {
        DataApi {
            client,
            method,
            url: url.into(),
            module: module.into(),
            description: String::new(),
            default_return_value: None,
            before_request: None,
            after_request: None,
            after_serializer: None,
            max_response_record: Some(DEFAULT_MAX_RECORD),
            max_query_params_record: Some(DEFAULT_MAX_RECORD),
            method_override: None,
            url_keys: Vec::new(),
            cache_time: Duration::ZERO,
            default_timeout: DEFAULT_TIMEOUT,
            headers: None,
            response_validation: None,
            param_keys: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Answer every call with `value` without sending anything.
    pub fn with_default_return_value(mut self, value: Value) -> Self {
        self.default_return_value = Some(value);
        self
    }

    pub fn with_before_request(mut self, hook: BeforeRequest) -> Self {
        self.before_request = Some(hook);
        self
    }

    pub fn with_after_request(mut self, hook: AfterRequest) -> Self {
        self.after_request = Some(hook);
        self
    }

    pub fn with_after_serializer(mut self, serializer: Arc<dyn ResponseSerializer>) -> Self {
        self.after_serializer = Some(serializer);
        self
    }

    /// `None` records the whole response data.
    pub fn with_max_response_record(mut self, max: Option<usize>) -> Self {
        self.max_response_record = max;
        self
    }

    /// `None` records all query parameters.
    pub fn with_max_query_params_record(mut self, max: Option<usize>) -> Self {
        self.max_query_params_record = max;
        self
    }

    pub fn with_method_override(mut self, method: impl Into<String>) -> Self {
        self.method_override = Some(method.into());
        self
    }

    pub fn with_url_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.url_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_cache_time(mut self, cache_time: Duration) -> Self {
        self.cache_time = cache_time;
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_headers(mut self, hook: HeaderHook) -> Self {
        self.headers = Some(hook);
        self
    }

    /// For backends without a `result` field: the call succeeds when any of
    /// the given fields has the given value.
    pub fn with_response_validation(mut self, expected: Params) -> Self {
        self.response_validation = Some(expected);
        self
    }

    /// Parameters also sent in the query string of POST/PUT/PATCH requests.
    pub fn with_param_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.param_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn url_keys(&self) -> &[String] {
        &self.url_keys
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Calls the API and returns the `data` of a successful response.
    pub async fn call(&self, ctx: &RequestContext, params: Params) -> Result<Value> {
        self.call_with(ctx, params, CallOptions::default()).await
    }

    pub async fn call_with(
        &self,
        ctx: &RequestContext,
        params: Params,
        options: CallOptions,
    ) -> Result<Value> {
        let timeout = options.timeout.unwrap_or(self.default_timeout);
        let response = self
            .send_request(ctx, params, timeout, &options)
            .await
            .map_err(|e| e.into_api_error(ctx.request_id()))?;

        if options.raw {
            return Ok(response.into_body());
        }

        if options.raise_exception && !response.is_success() {
            return Err(DataApiError::Result {
                message: self.error_message(&response.message_text()),
                code: response.code().cloned().unwrap_or(Value::Null),
                errors: response.errors().cloned(),
            });
        }

        Ok(response.into_data())
    }

    /// The URL with every `url_keys` placeholder replaced by its parameter.
    pub fn build_actual_url(&self, params: &Params) -> Result<String> {
        fill_url(&self.url, &self.url_keys, params)
    }

    /// Key under which the response for `params` is cached.
    pub fn cache_key(&self, params: &Params) -> Result<String> {
        let url = self.build_actual_url(params)?;
        let params_json =
            serde_json::to_string(params).map_err(|e| DataApiError::Serializer(e.to_string()))?;
        Ok(cache::cache_key(&url, &params_json))
    }

    /// Prefixes `message` with the module and appends the URL path; the
    /// result is logged.
    pub(crate) fn error_message(&self, message: &str) -> String {
        let mut full = format!("[{}-API]{}", self.module, message);
        error!(url = %self.url, "{full}");
        if let Some(path) = url_path(&self.url) {
            full.push_str(&format!(" path => {path}"));
        }
        full
    }

    fn api_error(&self, message: &str, status: Option<StatusCode>) -> SendError {
        SendError::Api {
            message: self.error_message(message),
            status,
        }
    }

    fn add_common_info(&self, ctx: &RequestContext, params: &mut Params) {
        let settings = self.client.settings();
        params
            .entry("bk_app_code")
            .or_insert_with(|| settings.app_code.clone().into());
        params
            .entry("bk_app_secret")
            .or_insert_with(|| settings.app_secret.clone().into());
        params.entry("bk_username").or_insert_with(|| {
            ctx.username()
                .unwrap_or(settings.default_username.as_str())
                .to_string()
                .into()
        });
    }

    async fn send_request(
        &self,
        ctx: &RequestContext,
        params: Params,
        timeout: Duration,
        options: &CallOptions,
    ) -> std::result::Result<DataResponse, SendError> {
        let mut params = match &self.before_request {
            Some(hook) => hook(ctx, params),
            None => params,
        };
        self.add_common_info(ctx, &mut params);

        if let Some(value) = &self.default_return_value {
            return Ok(DataResponse::new(value.clone(), ctx.request_id()));
        }

        // A key that cannot be built only disables caching for this call.
        let cache_key = self.cache_key(&params).ok();
        if !self.cache_time.is_zero()
            && let Some(key) = &cache_key
            && let Some(hit) = self.client.cache().get(key)
        {
            debug!(module = %self.module, url = %self.url, "response served from cache");
            return Ok(DataResponse::new(hit, ctx.request_id()));
        }

        let request_datetime = Local::now();
        let started = Instant::now();
        let outcome = self
            .exchange(ctx, &params, timeout, options, cache_key.as_deref())
            .await;
        let cost = started.elapsed();

        let (response, message) = match &outcome {
            Ok(response) => (Some(response), String::new()),
            Err(failure) => (failure.response.as_ref(), failure.message.clone()),
        };
        self.audit(ctx, &params, response, &message, request_datetime, cost);

        outcome.map_err(|failure| failure.error)
    }

    async fn exchange(
        &self,
        ctx: &RequestContext,
        params: &Params,
        timeout: Duration,
        options: &CallOptions,
        cache_key: Option<&str>,
    ) -> std::result::Result<DataResponse, Failure> {
        let raw = self
            .send(ctx, params, timeout, options)
            .await
            .map_err(|error| Failure {
                message: error.to_string(),
                error,
                response: None,
            })?;

        let status = raw.status();
        if status != StatusCode::OK {
            let reason = status.canonical_reason().unwrap_or_default();
            let text = raw.text().await.unwrap_or_default();
            let message = format!(
                "[{}]{}",
                status.as_u16(),
                if text.is_empty() { reason } else { text.as_str() }
            );
            let response = DataResponse::new(
                json!({"result": false, "message": message, "code": status.as_u16()}),
                ctx.request_id(),
            );
            let error = if status == StatusCode::FORBIDDEN {
                SendError::PermissionDenied(self.error_message(&message))
            } else {
                self.api_error(&message, Some(status))
            };
            return Err(Failure {
                error,
                response: Some(response),
                message,
            });
        }

        let text = raw.text().await.map_err(|e| {
            let message = format!("failed to read response body: {e}");
            Failure {
                error: self.api_error(&message, Some(status)),
                response: None,
                message,
            }
        })?;

        let mut body: Value = serde_json::from_str(&text).map_err(|_| {
            error!(url = %self.url, content = %text, "data api response not json format");
            let message = "response is not in json format".to_string();
            Failure {
                error: self.api_error(&message, Some(status)),
                response: None,
                message,
            }
        })?;

        self.validate_response(&mut body);

        // Only successful responses are post-processed and cached.
        if body.get("result").is_some_and(is_truthy) {
            if let Some(hook) = &self.after_request {
                body = hook(body);
            }

            if let Some(serializer) = &self.after_serializer {
                body = serializer.validate(body).map_err(|e| Failure {
                    message: e.clone(),
                    error: SendError::Serializer(e),
                    response: None,
                })?;
            }

            if !self.cache_time.is_zero()
                && let Some(key) = cache_key
            {
                self.client
                    .cache()
                    .set(key.to_string(), body.clone(), self.cache_time);
            }
        }

        Ok(DataResponse::new(body, ctx.request_id()))
    }

    async fn send(
        &self,
        ctx: &RequestContext,
        params: &Params,
        timeout: Duration,
        options: &CallOptions,
    ) -> std::result::Result<reqwest::Response, SendError> {
        let url = self
            .build_actual_url(params)
            .map_err(|e| self.api_error(&e.to_string(), None))?;

        let mut headers = HeaderMap::new();
        insert_header(&mut headers, &REQUEST_ID_HEADER, ctx.request_id());
        if let Some(hook) = &self.headers {
            headers.extend(hook(params));
        }
        if let Some(method_override) = &self.method_override {
            insert_header(&mut headers, &METHOD_OVERRIDE_HEADER, method_override);
        }
        let language = ctx
            .language()
            .unwrap_or(self.client.settings().language.as_str());
        insert_header(&mut headers, &LANGUAGE_HEADER, language);
        insert_header(&mut headers, &PLAIN_REQUEST_ID_HEADER, ctx.request_id());

        debug!(method = %self.method, url = %url, "sending request");

        let http = self.client.http();
        let builder = match self.method {
            Method::GET => http.get(&url).query(&query_pairs(params)),
            Method::DELETE => http
                .delete(&url)
                .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
                .body(self.json_body(params)?),
            Method::POST | Method::PUT | Method::PATCH => {
                let query = self.query(params)?;
                let mut builder = http
                    .request(self.method.clone(), &url)
                    .query(&query_pairs(&query));

                builder = if options.files.is_empty() {
                    builder
                        .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
                        .body(self.json_body(params)?)
                } else {
                    builder.multipart(self.multipart(params, &options.files)?)
                };

                if options.request_cookies
                    && let Some(cookie) = ctx.cookie_header()
                {
                    builder = builder.header(COOKIE, cookie);
                }
                builder
            }
            ref other => {
                return Err(self.api_error(&format!("unsupported request method {other}"), None));
            }
        };

        builder
            .headers(headers)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    self.api_error(&format!("request timed out: {e}"), None)
                } else {
                    self.api_error(&e.to_string(), None)
                }
            })
    }

    fn json_body(&self, params: &Params) -> std::result::Result<Vec<u8>, SendError> {
        serde_json::to_vec(params).map_err(|e| self.api_error(&e.to_string(), None))
    }

    fn query(&self, params: &Params) -> std::result::Result<Params, SendError> {
        self.param_keys
            .iter()
            .map(|key| match params.get(key) {
                Some(value) => Ok((key.clone(), value.clone())),
                None => Err(self.api_error(&DataApiError::MissingParam(key.clone()).to_string(), None)),
            })
            .collect()
    }

    fn multipart(&self, params: &Params, files: &[FilePart]) -> std::result::Result<Form, SendError> {
        let mut form = Form::new();
        for (key, value) in params {
            form = form.text(key.clone(), value_to_text(value));
        }
        for file in files {
            let mut part = Part::bytes(file.content.clone()).file_name(file.file_name.clone());
            if let Some(mime) = &file.mime {
                part = part
                    .mime_str(mime)
                    .map_err(|e| self.api_error(&e.to_string(), None))?;
            }
            form = form.part(file.field.clone(), part);
        }
        Ok(form)
    }

    fn validate_response(&self, body: &mut Value) {
        let (Some(expected), Value::Object(map)) = (&self.response_validation, body) else {
            return;
        };
        let matched = expected.iter().any(|(k, v)| map.get(k) == Some(v));
        map.entry("result").or_insert(Value::Bool(matched));
    }

    fn audit(
        &self,
        ctx: &RequestContext,
        params: &Params,
        response: Option<&DataResponse>,
        error_message: &str,
        request_datetime: DateTime<Local>,
        cost: Duration,
    ) {
        let settings = self.client.settings();
        let query_params = audit::scrub_params(
            params,
            |k| settings.is_sensitive(k),
            self.max_query_params_record,
        );
        let request_user = params
            .get("bk_username")
            .map(value_to_text)
            .unwrap_or_default();

        let record = match response {
            Some(response) => AuditRecord {
                request_datetime,
                url: self.url.clone(),
                module: self.module.clone(),
                method: self.method.to_string(),
                method_override: self.method_override.clone(),
                query_params,
                response_result: response.is_success(),
                response_code: response.code().cloned().unwrap_or_else(|| json!("00")),
                response_data: audit::truncate(
                    &serde_json::to_string(response.data().unwrap_or(&Value::Null))
                        .unwrap_or_default(),
                    self.max_response_record,
                ),
                response_message: audit::truncate(
                    &response.message_text(),
                    Some(MAX_MESSAGE_RECORD),
                ),
                response_errors: response.errors().cloned().unwrap_or(Value::Null),
                cost_time: cost.as_secs_f64(),
                request_id: ctx.request_id().to_string(),
                request_user,
            },
            None => AuditRecord {
                request_datetime,
                url: self.url.clone(),
                module: self.module.clone(),
                method: self.method.to_string(),
                method_override: self.method_override.clone(),
                query_params,
                response_result: false,
                response_code: json!(-1),
                response_data: String::new(),
                response_message: audit::truncate(error_message, Some(MAX_MESSAGE_RECORD)),
                response_errors: Value::Null,
                cost_time: cost.as_secs_f64(),
                request_id: ctx.request_id().to_string(),
                request_user,
            },
        };

        let outcome = if record.response_result {
            "success"
        } else {
            "failure"
        };
        counter!(API_REQUEST, "module" => self.module.clone(), "result" => outcome).increment(1);
        histogram!(API_REQUEST_DURATION, "module" => self.module.clone()).record(record.cost_time);

        self.client.audit().record(&record);
    }
}

impl std::fmt::Debug for DataApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataApi")
            .field("method", &self.method)
            .field("url", &self.url)
            .field("module", &self.module)
            .field("url_keys", &self.url_keys)
            .field("cache_time", &self.cache_time)
            .finish_non_exhaustive()
    }
}

fn insert_header(headers: &mut HeaderMap, name: &HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name.clone(), value);
        }
        Err(_) => warn!(header = %name, "dropping header with invalid value"),
    }
}

/// `template` with each `{key}` of `url_keys` replaced by its parameter.
pub(crate) fn fill_url(template: &str, url_keys: &[String], params: &Params) -> Result<String> {
    let mut url = template.to_string();
    for key in url_keys {
        let value = params
            .get(key)
            .ok_or_else(|| DataApiError::MissingParam(key.clone()))?;
        url = url.replace(&format!("{{{key}}}"), &value_to_text(value));
    }
    Ok(url)
}

/// Strings are sent as-is, everything else as its JSON text.
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Query pairs for `params`: nulls are skipped and arrays repeat their key.
pub(crate) fn query_pairs(params: &Params) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(params.len());
    for (key, value) in params {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                for item in items.iter().filter(|v| !v.is_null()) {
                    pairs.push((key.clone(), value_to_text(item)));
                }
            }
            other => pairs.push((key.clone(), value_to_text(other))),
        }
    }
    pairs
}

// Path component of an URL template, without query or fragment.
fn url_path(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let path = &rest[rest.find('/')?..];
    let path = path.split(['?', '#']).next().unwrap_or_default();
    (!path.is_empty()).then_some(path)
}
