use dataapi::SupportedApi;
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;
use url::Url;

/// Methods a pass-through request can be sent with.
const FORWARDED_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Empty module name")]
    EmptyModuleName,

    #[error("Module {0} has no supported APIs")]
    EmptyWhitelist(String),

    #[error("Module {0} has an invalid method: {1}")]
    InvalidMethod(String, String),
}

/// Gateway configuration
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Listener for pass-through requests
    pub listener: Listener,
    /// Listener for the health and readiness endpoints
    pub admin_listener: Listener,
    /// Backend modules reachable through the gateway, keyed by the first
    /// path segment
    pub modules: HashMap<String, ModuleConfig>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        for (name, module) in &self.modules {
            if name.is_empty() {
                return Err(ValidationError::EmptyModuleName);
            }
            module.validate(name)?;
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ModuleConfig {
    /// Prepended to the sub-URL of every request
    pub url_prefix: Url,
    /// Whitelist of method and sub-URL pattern pairs
    pub supported: Vec<SupportedApi>,
}

impl ModuleConfig {
    fn validate(&self, name: &str) -> Result<(), ValidationError> {
        if self.supported.is_empty() {
            return Err(ValidationError::EmptyWhitelist(name.to_string()));
        }
        for api in &self.supported {
            if !FORWARDED_METHODS.contains(&api.method.to_ascii_uppercase().as_str()) {
                return Err(ValidationError::InvalidMethod(name.to_string(), api.method.clone()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
listener:
    host: "0.0.0.0"
    port: 8000
admin_listener:
    host: "127.0.0.1"
    port: 8001
modules:
    job:
        url_prefix: "http://paas.example.com/api/c/compapi/v2/jobv3/"
        supported:
            - method: GET
              url_regex: "get_job_(plan_list|plan_detail|instance_status)/"
            - method: POST
              url_regex: "execute_job_plan/"
              options:
                  default_timeout: 10
"#;

    #[test]
    fn test_parse_valid_config() {
        let config: Config = serde_yaml::from_str(CONFIG).unwrap();
        config.validate().unwrap();

        assert_eq!(config.listener.port, 8000);
        let job = &config.modules["job"];
        assert_eq!(
            job.url_prefix.as_str(),
            "http://paas.example.com/api/c/compapi/v2/jobv3/"
        );
        assert_eq!(job.supported.len(), 2);
        assert_eq!(job.supported[1].options.default_timeout, Some(10));
    }

    #[test]
    fn test_validation_errors() {
        let mut config: Config = serde_yaml::from_str(CONFIG).unwrap();
        config.admin_listener.port = 0;
        assert!(matches!(config.validate(), Err(ValidationError::InvalidPort)));

        let mut config: Config = serde_yaml::from_str(CONFIG).unwrap();
        if let Some(job) = config.modules.get_mut("job") {
            job.supported.clear();
        }
        assert!(matches!(
            config.validate(),
            Err(ValidationError::EmptyWhitelist(name)) if name == "job"
        ));

        let mut config: Config = serde_yaml::from_str(CONFIG).unwrap();
        if let Some(job) = config.modules.get_mut("job") {
            job.supported[0].method = "GE T".into();
        }
        assert!(matches!(config.validate(), Err(ValidationError::InvalidMethod(..))));

        for method in ["HEAD", "options"] {
            let mut config: Config = serde_yaml::from_str(CONFIG).unwrap();
            if let Some(job) = config.modules.get_mut("job") {
                job.supported[0].method = method.into();
            }
            assert!(
                matches!(config.validate(), Err(ValidationError::InvalidMethod(_, m)) if m == method),
                "{method}"
            );
        }

        let mut config: Config = serde_yaml::from_str(CONFIG).unwrap();
        if let Some(job) = config.modules.get_mut("job") {
            job.supported[0].method = "patch".into();
        }
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let yaml = CONFIG.replace("execute_job_plan/", "execute_job_plan/(");
        assert!(serde_yaml::from_str::<Config>(&yaml).is_err());
    }
}
