use crate::config::ModuleConfig;
use crate::errors::{GatewayError, Result};
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use bytes::Bytes;
use dataapi::{ApiClient, CallOptions, Params, PassThroughApi, RequestContext};
use http::{HeaderMap, Method};
use http_body_util::BodyExt;
use hyper::body::{Body, Incoming};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use serde_json::{Value, json};
use shared::http::{BoxedBody, make_json_response};
use shared::{gauge, histogram};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

const REQUEST_ID_HEADER: &str = "x-request-id";
const USERNAME_HEADER: &str = "x-bkchat-username";
const LANGUAGE_HEADER: &str = "blueking-language";

struct Inner {
    client: ApiClient,
    modules: HashMap<String, ModuleConfig>,
}

/// Serves `{METHOD} /{module}/{sub_url}` by passing the request through to
/// the module's backend when the whitelist allows it.
#[derive(Clone)]
pub struct GatewayService {
    inner: Arc<Inner>,
}

impl GatewayService {
    pub fn new(client: ApiClient, modules: HashMap<String, ModuleConfig>) -> Self {
        GatewayService {
            inner: Arc::new(Inner { client, modules }),
        }
    }

    /// Handles one request. Failures are rendered as JSON envelopes, so this
    /// never errors.
    pub async fn handle<B>(&self, request: Request<B>) -> Response<BoxedBody>
    where
        B: Body<Data = Bytes>,
        B::Error: std::fmt::Display,
    {
        let started = Instant::now();
        gauge!(REQUESTS_INFLIGHT).increment(1.0);

        let module = module_name(request.uri().path()).to_string();
        let ctx = context_from_headers(request.headers());
        let response = match self.forward(&ctx, request).await {
            Ok(body) => make_json_response(StatusCode::OK, &body),
            Err(e) => {
                let status = e.status();
                tracing::warn!(module = %module, request_id = ctx.request_id(), error = %e, "gateway request failed");
                let code = match &e {
                    GatewayError::Api(api_error) => api_error.status().unwrap_or(status),
                    _ => status,
                };
                make_json_response(
                    status,
                    &json!({
                        "result": false,
                        "code": code.as_u16(),
                        "message": e.to_string(),
                        "data": null,
                        "request_id": ctx.request_id(),
                    }),
                )
            }
        };

        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
        histogram!(
            REQUEST_DURATION,
            "module" => module,
            "status" => response.status().as_u16().to_string()
        )
        .record(started.elapsed().as_secs_f64());
        response
    }

    async fn forward<B>(&self, ctx: &RequestContext, request: Request<B>) -> Result<Value>
    where
        B: Body<Data = Bytes>,
        B::Error: std::fmt::Display,
    {
        let (parts, body) = request.into_parts();
        let path = parts.uri.path().trim_start_matches('/');
        let (module, sub_url) = path.split_once('/').unwrap_or((path, ""));

        let config = self
            .inner
            .modules
            .get(module)
            .ok_or_else(|| GatewayError::UnknownModule(module.to_string()))?;

        let params = match parts.method {
            Method::GET | Method::DELETE => query_params(parts.uri.query()),
            _ => {
                let bytes = body
                    .collect()
                    .await
                    .map_err(|e| GatewayError::InvalidBody(e.to_string()))?
                    .to_bytes();
                body_params(&bytes)?
            }
        };

        let api = PassThroughApi::build(
            &self.inner.client,
            &module.to_ascii_uppercase(),
            parts.method.clone(),
            config.url_prefix.as_str(),
            sub_url,
            &config.supported,
        )?;
        tracing::debug!(module, sub_url, method = %parts.method, "passing request through");

        Ok(api.call_with(ctx, params, CallOptions::raw()).await?)
    }
}

impl Service<Request<Incoming>> for GatewayService {
    type Response = Response<BoxedBody>;
    type Error = GatewayError;
    type Future =
        Pin<Box<dyn Future<Output = std::result::Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req).await) })
    }
}

fn module_name(path: &str) -> &str {
    let path = path.trim_start_matches('/');
    path.split_once('/').map_or(path, |(module, _)| module)
}

fn context_from_headers(headers: &HeaderMap) -> RequestContext {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
    };

    let mut ctx = RequestContext::new();
    if let Some(request_id) = header(REQUEST_ID_HEADER) {
        ctx = ctx.with_request_id(request_id);
    }
    if let Some(username) = header(USERNAME_HEADER) {
        ctx = ctx.with_username(username);
    }
    if let Some(language) = header(LANGUAGE_HEADER) {
        ctx = ctx.with_language(language);
    }
    for cookie in headers.get_all(http::header::COOKIE) {
        if let Ok(cookie) = cookie.to_str() {
            ctx = ctx.with_cookie_header(cookie);
        }
    }
    ctx
}

/// Query string parameters; a key given more than once becomes an array.
fn query_params(query: Option<&str>) -> Params {
    let mut params = Params::new();
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        let value = Value::String(value.into_owned());
        match params.get_mut(key.as_ref()) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                params.insert(key.into_owned(), value);
            }
        }
    }
    params
}

fn body_params(bytes: &[u8]) -> Result<Params> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Params::new());
    }
    match serde_json::from_slice(bytes) {
        Ok(Value::Object(params)) => Ok(params),
        Ok(_) => Err(GatewayError::InvalidBody("expected a JSON object".into())),
        Err(e) => Err(GatewayError::InvalidBody(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use dataapi::ApiSettings;
    use http_body_util::Full;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(base: &str) -> GatewayService {
        let config: Config = serde_yaml::from_str(&format!(
            r#"
listener: {{host: "127.0.0.1", port: 8000}}
admin_listener: {{host: "127.0.0.1", port: 8001}}
modules:
    job:
        url_prefix: "{base}/jobv3/"
        supported:
            - method: GET
              url_regex: "get_job_instance_status/"
            - method: POST
              url_regex: "execute_job_plan/"
"#
        ))
        .unwrap();
        let client = ApiClient::new(ApiSettings::new("bkchat", "secret")).unwrap();
        GatewayService::new(client, config.modules)
    }

    fn request(method: Method, uri: &str, body: &str) -> Request<Full<Bytes>> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(REQUEST_ID_HEADER, "req-1")
            .header(USERNAME_HEADER, "alice")
            .body(Full::new(Bytes::from(body.to_string())))
            .unwrap()
    }

    async fn json_body(response: Response<BoxedBody>) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_query_params() {
        let params = query_params(Some("a=1&b=x%20y&a=2&a=3"));
        assert_eq!(Value::Object(params), json!({"a": ["1", "2", "3"], "b": "x y"}));
        assert!(query_params(None).is_empty());
    }

    #[test]
    fn test_body_params() {
        assert!(body_params(b"  ").unwrap().is_empty());
        assert_eq!(body_params(br#"{"a": 1}"#).unwrap()["a"], json!(1));
        assert!(matches!(body_params(b"[1]"), Err(GatewayError::InvalidBody(_))));
        assert!(matches!(body_params(b"{"), Err(GatewayError::InvalidBody(_))));
    }

    #[test]
    fn test_context_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, "abc".parse().unwrap());
        headers.insert(LANGUAGE_HEADER, "en".parse().unwrap());
        headers.append(http::header::COOKIE, "bk_token=t1; lang=en".parse().unwrap());
        let ctx = context_from_headers(&headers);
        assert_eq!(ctx.request_id(), "abc");
        assert_eq!(ctx.language(), Some("en"));
        assert_eq!(ctx.username(), None);
        assert_eq!(ctx.cookies().get("bk_token").map(String::as_str), Some("t1"));

        assert_eq!(context_from_headers(&HeaderMap::new()).request_id().len(), 32);
    }

    #[tokio::test]
    async fn test_get_passes_through_raw_envelope() {
        let server = MockServer::start().await;
        let envelope = json!({"result": false, "code": 1240002, "message": "no such job", "data": null});
        Mock::given(method("GET"))
            .and(path("/jobv3/get_job_instance_status/"))
            .and(query_param("job_instance_id", "7"))
            .and(query_param("bk_username", "alice"))
            .and(header("x-data-request-id", "req-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(envelope.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let response = service(&server.uri())
            .handle(request(Method::GET, "/job/get_job_instance_status/?job_instance_id=7", ""))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, envelope);
    }

    #[tokio::test]
    async fn test_post_forwards_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jobv3/execute_job_plan/"))
            .and(body_partial_json(json!({"job_plan_id": 3, "bk_app_code": "bkchat"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true, "data": {"job_instance_id": 9}})))
            .expect(1)
            .mount(&server)
            .await;

        let response = service(&server.uri())
            .handle(request(Method::POST, "/job/execute_job_plan/", r#"{"job_plan_id": 3}"#))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["data"]["job_instance_id"], json!(9));
    }

    #[tokio::test]
    async fn test_dot_segments_cannot_leave_whitelist() {
        let server = MockServer::start().await;
        Mock::given(path("/cc/delete_host/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": true})))
            .expect(0)
            .mount(&server)
            .await;
        let service = service(&server.uri());

        for uri in [
            "/job/get_job_instance_status/../../cc/delete_host/",
            "/job/get_job_instance_status/%2e%2e/%2e%2e/cc/delete_host/",
        ] {
            let response = service.handle(request(Method::GET, uri, "")).await;
            assert_eq!(response.status(), StatusCode::FORBIDDEN, "{uri}");
            assert_eq!(json_body(response).await["result"], json!(false));
        }
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jobv3/execute_job_plan/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let service = service(&server.uri());

        let response = service.handle(request(Method::GET, "/cmdb/search_business/", "")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["result"], json!(false));
        assert_eq!(body["request_id"], json!("req-1"));

        let response = service.handle(request(Method::DELETE, "/job/execute_job_plan/", "")).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = service.handle(request(Method::POST, "/job/execute_job_plan/", "not json")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = service.handle(request(Method::POST, "/job/execute_job_plan/", "{}")).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["code"], json!(500));
    }
}
