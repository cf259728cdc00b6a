use serde::Deserialize;

/// Platform-wide settings shared by every API call.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ApiSettings {
    /// Application code sent as `bk_app_code`
    pub app_code: String,
    /// Application secret sent as `bk_app_secret`
    pub app_secret: String,
    /// Username used when the request context carries none
    #[serde(default = "default_username")]
    pub default_username: String,
    /// Value of the `blueking-language` header when the context has none
    #[serde(default = "default_language")]
    pub language: String,
    /// Parameters removed from audit records
    #[serde(default = "default_sensitive_params")]
    pub sensitive_params: Vec<String>,
    /// Whether TLS certificates of the backends are verified
    #[serde(default = "default_true")]
    pub verify_certificates: bool,
    /// `bk_supplier_account` stamped on ESB requests
    #[serde(default = "default_supplier_account")]
    pub supplier_account: String,
    /// Identity presented to Grafana through `X-WEBAUTH-USER`
    #[serde(default = "default_grafana_admin_user")]
    pub grafana_admin_user: String,
    /// Maximum number of cached responses
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: u64,
}

impl ApiSettings {
    pub fn new(app_code: impl Into<String>, app_secret: impl Into<String>) -> Self {
        ApiSettings {
            app_code: app_code.into(),
            app_secret: app_secret.into(),
            default_username: default_username(),
            language: default_language(),
            sensitive_params: default_sensitive_params(),
            verify_certificates: true,
            supplier_account: default_supplier_account(),
            grafana_admin_user: default_grafana_admin_user(),
            cache_capacity: default_cache_capacity(),
        }
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        self.sensitive_params.iter().any(|p| p == key)
    }
}

fn default_username() -> String {
    "admin".into()
}

fn default_language() -> String {
    "zh-cn".into()
}

fn default_sensitive_params() -> Vec<String> {
    [
        "bk_app_code",
        "bk_app_secret",
        "app_code",
        "app_secret",
        "bk_token",
        "bk_ticket",
        "password",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_true() -> bool {
    true
}

fn default_supplier_account() -> String {
    "0".into()
}

fn default_grafana_admin_user() -> String {
    "admin".into()
}

fn default_cache_capacity() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_yaml() {
        let yaml = r#"
app_code: bkchat
app_secret: s3cr3t
"#;
        let settings: ApiSettings = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(settings, ApiSettings::new("bkchat", "s3cr3t"));
        assert!(settings.is_sensitive("bk_app_secret"));
        assert!(!settings.is_sensitive("bk_biz_id"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let yaml = r#"
app_code: bkchat
app_secret: s3cr3t
secret_key: nope
"#;
        assert!(serde_yaml::from_str::<ApiSettings>(yaml).is_err());
    }
}
