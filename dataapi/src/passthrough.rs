//! Whitelisted pass-through of arbitrary sub-URLs of a backend module.

use crate::api::DataApi;
use crate::client::ApiClient;
use crate::drf::ApiOptions;
use crate::errors::{DataApiError, Result};
use crate::hooks::esb_before_request;
use http::Method;
use regex::Regex;
use serde::{Deserialize, Deserializer};

/// One whitelist entry: a method and a regex anchored at the start of the
/// sub-URL.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SupportedApi {
    pub method: String,
    #[serde(deserialize_with = "deserialize_regex")]
    pub url_regex: Regex,
    #[serde(default)]
    pub options: ApiOptions,
}

impl SupportedApi {
    pub fn new(method: Method, url_regex: Regex) -> Self {
        SupportedApi {
            method: method.as_str().to_string(),
            url_regex,
            options: ApiOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ApiOptions) -> Self {
        self.options = options;
        self
    }

    fn matches(&self, method: &Method, sub_url: &str) -> bool {
        self.method.eq_ignore_ascii_case(method.as_str())
            && self
                .url_regex
                .find(sub_url)
                .is_some_and(|found| found.start() == 0)
    }
}

fn deserialize_regex<'de, D>(deserializer: D) -> std::result::Result<Regex, D::Error>
where
    D: Deserializer<'de>,
{
    let pattern = String::deserialize(deserializer)?;
    Regex::new(&pattern).map_err(serde::de::Error::custom)
}

/// `.` and `..` segments are resolved when the URL is parsed, so a sub-URL
/// holding one may not point where the whitelist matched it.
fn has_dot_segment(sub_url: &str) -> bool {
    let path = sub_url.split(['?', '#']).next().unwrap_or_default();
    path.split(['/', '\\']).any(|segment| {
        let segment = segment.to_ascii_lowercase().replace("%2e", ".");
        segment == "." || segment == ".."
    })
}

pub struct PassThroughApi;

impl PassThroughApi {
    /// A [`DataApi`] for `url_prefix + sub_url`, configured by the first
    /// whitelist entry matching `method` and `sub_url`.
    ///
    /// Entries without their own `before_request` get the ESB hook.
    pub fn build(
        client: &ApiClient,
        module: &str,
        method: Method,
        url_prefix: &str,
        sub_url: &str,
        supported: &[SupportedApi],
    ) -> Result<DataApi> {
        let entry = if has_dot_segment(sub_url) {
            None
        } else {
            supported.iter().find(|api| api.matches(&method, sub_url))
        };
        let Some(entry) = entry else {
            tracing::error!(module, %method, sub_url, "pass-through request is not whitelisted");
            return Err(DataApiError::PermissionDenied(format!(
                "illegal request, module[{module}], method[{method}], api[{sub_url}]"
            )));
        };

        let mut options = entry.options.clone();
        if options.before_request.is_none() {
            options.before_request = Some(esb_before_request(client.settings().clone()));
        }

        let url = format!("{url_prefix}{sub_url}");
        Ok(options.apply(DataApi::new(client.clone(), method, url, module)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Params;
    use crate::context::RequestContext;
    use crate::settings::ApiSettings;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> ApiClient {
        ApiClient::new(ApiSettings::new("bkchat", "secret")).unwrap()
    }

    fn whitelist() -> Vec<SupportedApi> {
        vec![
            SupportedApi::new(Method::GET, Regex::new(r"get_job_instance_status/").unwrap()),
            SupportedApi::new(Method::POST, Regex::new(r"execute_job_plan/").unwrap()).with_options(
                ApiOptions {
                    description: Some("execute plan".into()),
                    ..Default::default()
                },
            ),
        ]
    }

    #[test]
    fn test_build_matching_entry() {
        let api = PassThroughApi::build(
            &client(),
            "JOB",
            Method::POST,
            "http://esb/api/c/compapi/v2/jobv3/",
            "execute_job_plan/",
            &whitelist(),
        )
        .unwrap();
        assert_eq!(api.url(), "http://esb/api/c/compapi/v2/jobv3/execute_job_plan/");
        assert_eq!(api.method(), &Method::POST);
        assert_eq!(api.module(), "JOB");
        assert_eq!(api.description(), "execute plan");
    }

    #[test]
    fn test_build_rejects_unlisted() {
        // method mismatch
        let err = PassThroughApi::build(
            &client(),
            "JOB",
            Method::GET,
            "http://esb/",
            "execute_job_plan/",
            &whitelist(),
        )
        .unwrap_err();
        match err {
            DataApiError::PermissionDenied(message) => assert_eq!(
                message,
                "illegal request, module[JOB], method[GET], api[execute_job_plan/]"
            ),
            other => panic!("unexpected error: {other:?}"),
        }

        // the regex must match at the start of the sub-URL
        assert!(
            PassThroughApi::build(
                &client(),
                "JOB",
                Method::GET,
                "http://esb/",
                "v2/get_job_instance_status/",
                &whitelist(),
            )
            .is_err()
        );
    }

    #[test]
    fn test_build_rejects_dot_segments() {
        for sub_url in [
            "get_job_instance_status/../../cc/delete_host/",
            "get_job_instance_status/%2e%2e/execute_job_plan/",
            "get_job_instance_status/%2E./x/",
            "get_job_instance_status/..\\x/",
            "get_job_instance_status/./",
        ] {
            let err = PassThroughApi::build(
                &client(),
                "JOB",
                Method::GET,
                "http://esb/jobv3/",
                sub_url,
                &whitelist(),
            )
            .unwrap_err();
            assert!(matches!(err, DataApiError::PermissionDenied(_)), "{sub_url}");
        }

        // dots inside a segment are fine
        assert!(!has_dot_segment("get_job_instance_status/v1..2/file.txt"));
        assert!(!has_dot_segment("get_job_instance_status/?next=../x"));
    }

    #[test]
    fn test_supported_api_from_yaml() {
        let entries: Vec<SupportedApi> = serde_yaml::from_str(
            r#"
- method: GET
  url_regex: "^search_business/$"
- method: post
  url_regex: "list_biz_hosts/"
  options:
    cache_time: 60
"#,
        )
        .unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[1].matches(&Method::POST, "list_biz_hosts/"));
        assert_eq!(entries[1].options.cache_time, Some(60));

        assert!(serde_yaml::from_str::<Vec<SupportedApi>>("- method: GET\n  url_regex: \"(\"\n").is_err());
    }

    #[tokio::test]
    async fn test_pass_through_adds_esb_info() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobv3/get_job_instance_status/"))
            .and(query_param("bk_app_code", "bkchat"))
            .and(query_param("bk_username", "alice"))
            .and(query_param("job_instance_id", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "result": true, "data": {"finished": true}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = PassThroughApi::build(
            &client(),
            "JOB",
            Method::GET,
            &format!("{}/jobv3/", server.uri()),
            "get_job_instance_status/",
            &whitelist(),
        )
        .unwrap();
        let params: Params = json!({"job_instance_id": 7}).as_object().cloned().unwrap();
        let data = api
            .call(&RequestContext::new().with_username("alice"), params)
            .await
            .unwrap();
        assert_eq!(data, json!({"finished": true}));
    }

    #[test]
    fn test_entry_hook_is_kept() {
        let hook: crate::hooks::BeforeRequest = Arc::new(|_ctx: &RequestContext, params: Params| params);
        let entry = SupportedApi::new(Method::GET, Regex::new("ping/").unwrap()).with_options(ApiOptions {
            before_request: Some(hook.clone()),
            ..Default::default()
        });
        let api = PassThroughApi::build(&client(), "CC", Method::GET, "http://cc/", "ping/", &[entry]).unwrap();
        assert_eq!(api.url(), "http://cc/ping/");
    }
}
