use serde::Deserialize;
use url::Url;

/// Base URLs of the services the adapters talk to.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Endpoints {
    /// ESB component API root, e.g. `http://paas/api/c/compapi/v2/`
    pub esb_url: Url,
    pub grafana_url: Url,
    /// Chat-bot backend REST root
    pub backend_url: Url,
}

impl Endpoints {
    pub fn esb(&self, path: &str) -> String {
        join(&self.esb_url, path)
    }

    pub fn grafana(&self, path: &str) -> String {
        join(&self.grafana_url, path)
    }

    pub fn backend(&self, path: &str) -> String {
        join(&self.backend_url, path)
    }
}

// Appends `path` to `base` regardless of whether `base` ends with a slash.
// Placeholders such as `{uid}` must survive, so no URL escaping happens here.
fn join(base: &Url, path: &str) -> String {
    format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_endpoints() {
        let endpoints: Endpoints = serde_yaml::from_str(
            r#"
esb_url: "http://paas.example.com/api/c/compapi/v2"
grafana_url: "http://grafana.example.com/"
backend_url: "http://bkchat.example.com/api/v1/"
"#,
        )
        .unwrap();
        assert_eq!(
            endpoints.esb("jobv3/get_job_plan_list/"),
            "http://paas.example.com/api/c/compapi/v2/jobv3/get_job_plan_list/"
        );
        assert_eq!(
            endpoints.grafana("/api/dashboards/uid/{uid}"),
            "http://grafana.example.com/api/dashboards/uid/{uid}"
        );
        assert_eq!(
            endpoints.backend("execution_logs/"),
            "http://bkchat.example.com/api/v1/execution_logs/"
        );
    }

    #[test]
    fn test_invalid_url_rejected() {
        let result = serde_yaml::from_str::<Endpoints>(
            "esb_url: not a url\ngrafana_url: http://g/\nbackend_url: http://b/\n",
        );
        assert!(result.is_err());
    }
}
