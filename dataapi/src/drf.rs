//! REST resource sets: a collection URL plus `{primary_key}/` detail URLs,
//! the six standard actions and any number of custom ones.
//!
//! ```text
//! list            GET    {url}
//! create          POST   {url}
//! retrieve        GET    {url}{pk}/
//! update          PUT    {url}{pk}/
//! partial_update  PATCH  {url}{pk}/
//! delete          DELETE {url}{pk}/
//! <custom>        *      {url}[{pk}/]<url_path or name>/
//! ```

use crate::api::DataApi;
use crate::client::ApiClient;
use crate::errors::{DataApiError, Result};
use crate::hooks::{AfterRequest, BeforeRequest, HeaderHook};
use http::Method;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

pub const BASE_ACTIONS: &[&str] = &[
    "list",
    "create",
    "update",
    "partial_update",
    "delete",
    "retrieve",
];

/// The API settings a resource set or one of its actions may pass down to
/// the generated [`DataApi`]s. Unset fields keep the `DataApi` defaults.
///
/// When read from configuration, unknown keys are rejected.
#[derive(Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ApiOptions {
    pub description: Option<String>,
    pub default_return_value: Option<Value>,
    #[serde(skip)]
    pub before_request: Option<BeforeRequest>,
    #[serde(skip)]
    pub after_request: Option<AfterRequest>,
    pub max_response_record: Option<usize>,
    pub max_query_params_record: Option<usize>,
    /// Seconds
    pub default_timeout: Option<u64>,
    #[serde(skip)]
    pub custom_headers: Option<HeaderHook>,
    /// Seconds
    pub cache_time: Option<u64>,
}

impl ApiOptions {
    /// `self` overlaid with every field `other` sets.
    pub fn merge(&self, other: &ApiOptions) -> ApiOptions {
        ApiOptions {
            description: other.description.clone().or_else(|| self.description.clone()),
            default_return_value: other
                .default_return_value
                .clone()
                .or_else(|| self.default_return_value.clone()),
            before_request: other
                .before_request
                .clone()
                .or_else(|| self.before_request.clone()),
            after_request: other
                .after_request
                .clone()
                .or_else(|| self.after_request.clone()),
            max_response_record: other.max_response_record.or(self.max_response_record),
            max_query_params_record: other
                .max_query_params_record
                .or(self.max_query_params_record),
            default_timeout: other.default_timeout.or(self.default_timeout),
            custom_headers: other
                .custom_headers
                .clone()
                .or_else(|| self.custom_headers.clone()),
            cache_time: other.cache_time.or(self.cache_time),
        }
    }

    pub fn apply(&self, mut api: DataApi) -> DataApi {
        if let Some(description) = &self.description {
            api = api.with_description(description.clone());
        }
        if let Some(value) = &self.default_return_value {
            api = api.with_default_return_value(value.clone());
        }
        if let Some(hook) = &self.before_request {
            api = api.with_before_request(hook.clone());
        }
        if let Some(hook) = &self.after_request {
            api = api.with_after_request(hook.clone());
        }
        if let Some(max) = self.max_response_record {
            api = api.with_max_response_record(Some(max));
        }
        if let Some(max) = self.max_query_params_record {
            api = api.with_max_query_params_record(Some(max));
        }
        if let Some(secs) = self.default_timeout {
            api = api.with_default_timeout(Duration::from_secs(secs));
        }
        if let Some(hook) = &self.custom_headers {
            api = api.with_headers(hook.clone());
        }
        if let Some(secs) = self.cache_time {
            api = api.with_cache_time(Duration::from_secs(secs));
        }
        api
    }
}

impl std::fmt::Debug for ApiOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiOptions")
            .field("description", &self.description)
            .field("default_return_value", &self.default_return_value)
            .field("before_request", &self.before_request.is_some())
            .field("after_request", &self.after_request.is_some())
            .field("max_response_record", &self.max_response_record)
            .field("max_query_params_record", &self.max_query_params_record)
            .field("default_timeout", &self.default_timeout)
            .field("custom_headers", &self.custom_headers.is_some())
            .field("cache_time", &self.cache_time)
            .finish()
    }
}

/// One action of a resource set.
#[derive(Clone, Debug)]
pub struct DrfActionApi {
    /// Whether the action targets a single resource (`{pk}/`)
    pub detail: bool,
    /// Path segment of custom actions; defaults to the action name
    pub url_path: Option<String>,
    pub method: Method,
    pub options: ApiOptions,
}

impl DrfActionApi {
    pub fn new(detail: bool, method: Method) -> Self {
        DrfActionApi {
            detail,
            url_path: None,
            method,
            options: ApiOptions::default(),
        }
    }

    pub fn with_url_path(mut self, url_path: impl Into<String>) -> Self {
        self.url_path = Some(url_path.into());
        self
    }

    pub fn with_options(mut self, options: ApiOptions) -> Self {
        self.options = options;
        self
    }
}

fn base_action(name: &str) -> Option<DrfActionApi> {
    let (detail, method) = match name {
        "list" => (false, Method::GET),
        "create" => (false, Method::POST),
        "update" => (true, Method::PUT),
        "partial_update" => (true, Method::PATCH),
        "delete" => (true, Method::DELETE),
        "retrieve" => (true, Method::GET),
        _ => return None,
    };
    Some(DrfActionApi::new(detail, method))
}

/// The REST API collection of one resource.
#[derive(Clone, Debug)]
pub struct DataDrfApiSet {
    client: ApiClient,
    url: String,
    module: String,
    primary_key: String,
    url_keys: Vec<String>,
    custom_config: IndexMap<String, DrfActionApi>,
    options: ApiOptions,
}

impl DataDrfApiSet {
    /// `url` is the collection URL and must end with `/`.
    pub fn new(
        client: ApiClient,
        url: impl Into<String>,
        module: impl Into<String>,
        primary_key: impl Into<String>,
    ) -> Self {
        DataDrfApiSet {
            client,
            url: url.into(),
            module: module.into(),
            primary_key: primary_key.into(),
            url_keys: Vec::new(),
            custom_config: IndexMap::new(),
            options: ApiOptions::default(),
        }
    }

    /// Placeholders of the collection URL itself, e.g. a parent resource id.
    pub fn with_url_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.url_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_options(mut self, options: ApiOptions) -> Self {
        self.options = options;
        self
    }

    /// Adds a custom action, or replaces the definition of a standard one.
    pub fn with_action(mut self, name: impl Into<String>, action: DrfActionApi) -> Self {
        self.custom_config.insert(name.into(), action);
        self
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Standard action names followed by the custom ones, in declaration
    /// order.
    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = BASE_ACTIONS.to_vec();
        names.extend(
            self.custom_config
                .keys()
                .map(String::as_str)
                .filter(|name| !BASE_ACTIONS.contains(name)),
        );
        names
    }

    pub fn action(&self, name: &str) -> Result<DataApi> {
        let base = base_action(name);
        let (action, is_standard) = match (self.custom_config.get(name), base.as_ref()) {
            (Some(custom), Some(_)) => (custom, true),
            (Some(custom), None) => (custom, false),
            (None, Some(base)) => (base, true),
            (None, None) => return Err(DataApiError::UnknownAction(name.to_string())),
        };
        Ok(self.build(name, action, is_standard))
    }

    pub fn list(&self) -> DataApi {
        self.standard("list")
    }

    pub fn create(&self) -> DataApi {
        self.standard("create")
    }

    pub fn retrieve(&self) -> DataApi {
        self.standard("retrieve")
    }

    pub fn update(&self) -> DataApi {
        self.standard("update")
    }

    pub fn partial_update(&self) -> DataApi {
        self.standard("partial_update")
    }

    pub fn delete(&self) -> DataApi {
        self.standard("delete")
    }

    fn standard(&self, name: &str) -> DataApi {
        let default = base_action(name).unwrap_or_else(|| DrfActionApi::new(false, Method::GET));
        let action = self.custom_config.get(name).unwrap_or(&default);
        self.build(name, action, true)
    }

    fn to_url(&self, name: &str, action: &DrfActionApi, is_standard: bool) -> (String, Vec<String>) {
        let mut url_keys = self.url_keys.clone();
        let mut url = self.url.clone();
        if action.detail {
            url.push_str(&format!("{{{}}}/", self.primary_key));
            url_keys.push(self.primary_key.clone());
        }
        if !is_standard {
            let sub_path = action.url_path.as_deref().unwrap_or(name);
            url.push_str(&format!("{sub_path}/"));
        }
        (url, url_keys)
    }

    fn build(&self, name: &str, action: &DrfActionApi, is_standard: bool) -> DataApi {
        let (url, url_keys) = self.to_url(name, action, is_standard);
        let api = DataApi::new(self.client.clone(), action.method.clone(), url, self.module.clone())
            .with_url_keys(url_keys);
        self.options.merge(&action.options).apply(api)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestContext;
    use crate::settings::ApiSettings;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> ApiClient {
        ApiClient::new(ApiSettings::new("bkchat", "secret")).unwrap()
    }

    fn insts(url: &str) -> DataDrfApiSet {
        DataDrfApiSet::new(client(), url, "meta", "inst_id")
            .with_options(ApiOptions {
                description: Some("inst operations".into()),
                cache_time: Some(30),
                ..Default::default()
            })
            .with_action("start", DrfActionApi::new(true, Method::POST))
            .with_action(
                "stats",
                DrfActionApi::new(false, Method::GET).with_url_path("statistics"),
            )
    }

    #[test]
    fn test_standard_urls() {
        let set = insts("http://example.com/insts/");

        let list = set.list();
        assert_eq!(list.url(), "http://example.com/insts/");
        assert_eq!(list.method(), &Method::GET);
        assert!(list.url_keys().is_empty());
        assert_eq!(list.description(), "inst operations");

        let create = set.create();
        assert_eq!(create.method(), &Method::POST);
        assert_eq!(create.url(), "http://example.com/insts/");

        for (api, method) in [
            (set.retrieve(), Method::GET),
            (set.update(), Method::PUT),
            (set.partial_update(), Method::PATCH),
            (set.delete(), Method::DELETE),
        ] {
            assert_eq!(api.url(), "http://example.com/insts/{inst_id}/");
            assert_eq!(api.url_keys(), ["inst_id".to_string()]);
            assert_eq!(api.method(), &method);
        }
    }

    #[test]
    fn test_custom_actions() {
        let set = insts("http://example.com/insts/");

        let start = set.action("start").unwrap();
        assert_eq!(start.url(), "http://example.com/insts/{inst_id}/start/");
        assert_eq!(start.method(), &Method::POST);

        let stats = set.action("stats").unwrap();
        assert_eq!(stats.url(), "http://example.com/insts/statistics/");

        assert!(matches!(
            set.action("restart").unwrap_err(),
            DataApiError::UnknownAction(name) if name == "restart"
        ));

        assert_eq!(
            set.action_names(),
            vec!["list", "create", "update", "partial_update", "delete", "retrieve", "start", "stats"]
        );
    }

    #[test]
    fn test_overridden_base_action_keeps_standard_url() {
        let set = DataDrfApiSet::new(client(), "http://example.com/insts/", "meta", "inst_id")
            .with_action(
                "update",
                DrfActionApi::new(true, Method::POST).with_options(ApiOptions {
                    description: Some("update via post".into()),
                    ..Default::default()
                }),
            );

        let update = set.update();
        assert_eq!(update.url(), "http://example.com/insts/{inst_id}/");
        assert_eq!(update.method(), &Method::POST);
        assert_eq!(update.description(), "update via post");
        assert_eq!(set.action("update").unwrap().method(), &Method::POST);
    }

    #[test]
    fn test_parent_url_keys() {
        let set = DataDrfApiSet::new(client(), "http://example.com/biz/{bk_biz_id}/plans/", "job", "plan_id")
            .with_url_keys(["bk_biz_id"]);
        let retrieve = set.retrieve();
        assert_eq!(retrieve.url_keys(), ["bk_biz_id".to_string(), "plan_id".to_string()]);
        let params = json!({"bk_biz_id": 3, "plan_id": 8});
        assert_eq!(
            retrieve.build_actual_url(params.as_object().unwrap()).unwrap(),
            "http://example.com/biz/3/plans/8/"
        );
    }

    #[test]
    fn test_options_merge() {
        let base = ApiOptions {
            description: Some("set".into()),
            cache_time: Some(10),
            default_timeout: Some(5),
            ..Default::default()
        };
        let action = ApiOptions {
            cache_time: Some(0),
            ..Default::default()
        };
        let merged = base.merge(&action);
        assert_eq!(merged.description.as_deref(), Some("set"));
        assert_eq!(merged.cache_time, Some(0));
        assert_eq!(merged.default_timeout, Some(5));
    }

    #[test]
    fn test_options_reject_unknown_keys() {
        let ok: ApiOptions = serde_yaml::from_str("description: logs\ncache_time: 60\n").unwrap();
        assert_eq!(ok.cache_time, Some(60));
        assert!(serde_yaml::from_str::<ApiOptions>("url_keys: [a]\n").is_err());
    }

    #[tokio::test]
    async fn test_retrieve_calls_detail_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/insts/42/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": true, "data": {"inst_id": 42}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let set = insts(&format!("{}/insts/", server.uri()));
        let data = set
            .retrieve()
            .call(&RequestContext::new(), json!({"inst_id": 42}).as_object().cloned().unwrap())
            .await
            .unwrap();
        assert_eq!(data, json!({"inst_id": 42}));
    }
}
