//! The platform APIs the chat bot calls, grouped by backend module and
//! sharing one [`ApiClient`].

pub mod backend;
pub mod cc;
pub mod cmsi;
pub mod config;
pub mod grafana;
pub mod job;

pub use backend::BackendApi;
pub use cc::CcApi;
pub use cmsi::CmsiApi;
pub use config::Endpoints;
pub use grafana::GrafanaApis;
pub use job::JobApi;

use dataapi::hooks::esb_before_request;
use dataapi::{ApiClient, ApiSettings, DataApi, DataApiError};
use http::Method;

/// An ESB component API: platform credentials and the calling user are
/// stamped on every request.
pub(crate) fn esb_api(
    client: &ApiClient,
    url: String,
    method: Method,
    module: &str,
    description: &str,
) -> DataApi {
    DataApi::new(client.clone(), method, url, module)
        .with_description(description)
        .with_before_request(esb_before_request(client.settings().clone()))
}

pub struct Apis {
    client: ApiClient,
    pub job: JobApi,
    pub cc: CcApi,
    pub cmsi: CmsiApi,
    pub grafana: GrafanaApis,
    pub backend: BackendApi,
}

impl Apis {
    pub fn new(settings: ApiSettings, endpoints: &Endpoints) -> dataapi::Result<Self> {
        Ok(Self::with_client(ApiClient::new(settings)?, endpoints))
    }

    pub fn with_client(client: ApiClient, endpoints: &Endpoints) -> Self {
        Apis {
            job: JobApi::new(&client, endpoints),
            cc: CcApi::new(&client, endpoints),
            cmsi: CmsiApi::new(&client, endpoints),
            grafana: GrafanaApis::new(&client, endpoints),
            backend: BackendApi::new(&client, endpoints),
            client,
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Resolves `module.action`, e.g. `job.execute_job_plan` or
    /// `task_broadcasts.broadcast`.
    pub fn find(&self, module: &str, action: &str) -> dataapi::Result<DataApi> {
        let unknown = || DataApiError::UnknownAction(format!("{module}.{action}"));
        let found = match module {
            "job" => self.job.find(action),
            "cc" => self.cc.find(action),
            "cmsi" => self.cmsi.find(action),
            resource => {
                let set = self.backend.find(resource).ok_or_else(unknown)?;
                return set.action(action).map_err(|_| unknown());
            }
        };
        found.cloned().ok_or_else(unknown)
    }

    /// Every name [`Apis::find`] accepts, per module.
    pub fn actions(&self) -> Vec<(String, Vec<String>)> {
        let owned = |names: &[&str]| -> Vec<String> { names.iter().map(|name| name.to_string()).collect() };
        let mut actions = vec![
            ("job".to_string(), owned(JobApi::ACTIONS)),
            ("cc".to_string(), owned(CcApi::ACTIONS)),
            ("cmsi".to_string(), owned(CmsiApi::ACTIONS)),
        ];
        for resource in BackendApi::RESOURCES {
            if let Some(set) = self.backend.find(resource) {
                actions.push((resource.to_string(), owned(set.action_names().as_slice())));
            }
        }
        actions
    }
}
