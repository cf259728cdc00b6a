use crate::config::Endpoints;
use dataapi::{ApiClient, GrafanaApi};
use http::Method;

pub struct GrafanaApis {
    pub search_dashboards: GrafanaApi,
    pub get_dashboard_by_uid: GrafanaApi,
    /// Admin API, not scoped to an organisation
    pub get_org_by_name: GrafanaApi,
}

impl GrafanaApis {
    pub fn new(client: &ApiClient, endpoints: &Endpoints) -> Self {
        GrafanaApis {
            search_dashboards: GrafanaApi::new(client.clone(), Method::GET, endpoints.grafana("api/search"))
                .with_org_id(),
            get_dashboard_by_uid: GrafanaApi::new(
                client.clone(),
                Method::GET,
                endpoints.grafana("api/dashboards/uid/{uid}"),
            )
            .with_url_keys(["uid"])
            .with_org_id(),
            get_org_by_name: GrafanaApi::new(
                client.clone(),
                Method::GET,
                endpoints.grafana("api/orgs/name/{name}"),
            )
            .with_url_keys(["name"]),
        }
    }
}
