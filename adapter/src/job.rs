//! Job platform (`jobv3`) component APIs.

use crate::config::Endpoints;
use crate::esb_api;
use dataapi::{ApiClient, DataApi};
use http::Method;

const MODULE: &str = "JOB";

pub struct JobApi {
    pub get_job_plan_list: DataApi,
    pub get_job_plan_detail: DataApi,
    pub execute_job_plan: DataApi,
    pub get_job_instance_status: DataApi,
    pub get_job_instance_ip_log: DataApi,
}

impl JobApi {
    pub const ACTIONS: &'static [&'static str] = &[
        "get_job_plan_list",
        "get_job_plan_detail",
        "execute_job_plan",
        "get_job_instance_status",
        "get_job_instance_ip_log",
    ];

    pub fn new(client: &ApiClient, endpoints: &Endpoints) -> Self {
        let api = |method: Method, name: &str, description: &str| {
            esb_api(client, endpoints.esb(&format!("jobv3/{name}/")), method, MODULE, description)
        };
        JobApi {
            get_job_plan_list: api(Method::GET, "get_job_plan_list", "query job plans"),
            get_job_plan_detail: api(Method::GET, "get_job_plan_detail", "query job plan detail"),
            execute_job_plan: api(Method::POST, "execute_job_plan", "execute a job plan"),
            get_job_instance_status: api(
                Method::GET,
                "get_job_instance_status",
                "query job instance status",
            ),
            get_job_instance_ip_log: api(
                Method::GET,
                "get_job_instance_ip_log",
                "query job instance log of one host",
            ),
        }
    }

    pub fn find(&self, action: &str) -> Option<&DataApi> {
        match action {
            "get_job_plan_list" => Some(&self.get_job_plan_list),
            "get_job_plan_detail" => Some(&self.get_job_plan_detail),
            "execute_job_plan" => Some(&self.execute_job_plan),
            "get_job_instance_status" => Some(&self.get_job_instance_status),
            "get_job_instance_ip_log" => Some(&self.get_job_instance_ip_log),
            _ => None,
        }
    }
}
