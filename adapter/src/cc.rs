//! Configuration platform (`cc`) component APIs. The list APIs page through
//! `page.start`/`page.limit` and answer with `count` and `info`, so they can
//! be fetched with [`DataApi::bulk_request`].

use crate::config::Endpoints;
use crate::esb_api;
use dataapi::{ApiClient, BulkOptions, DataApi};
use http::Method;
use std::time::Duration;

const MODULE: &str = "CC";
const PAGE_LIMIT: u64 = 500;

pub struct CcApi {
    pub search_business: DataApi,
    pub list_biz_hosts: DataApi,
    pub search_set: DataApi,
}

impl CcApi {
    pub const ACTIONS: &'static [&'static str] = &["search_business", "list_biz_hosts", "search_set"];

    pub fn new(client: &ApiClient, endpoints: &Endpoints) -> Self {
        let api = |name: &str, description: &str| {
            esb_api(client, endpoints.esb(&format!("cc/{name}/")), Method::POST, MODULE, description)
                .with_cache_time(Duration::from_secs(60))
        };
        CcApi {
            search_business: api("search_business", "search businesses"),
            list_biz_hosts: api("list_biz_hosts", "list the hosts of a business"),
            search_set: api("search_set", "search the sets of a business"),
        }
    }

    /// Page size and response layout of the list APIs.
    pub fn bulk_options() -> BulkOptions {
        BulkOptions::default().with_limit(PAGE_LIMIT)
    }

    pub fn find(&self, action: &str) -> Option<&DataApi> {
        match action {
            "search_business" => Some(&self.search_business),
            "list_biz_hosts" => Some(&self.list_biz_hosts),
            "search_set" => Some(&self.search_set),
            _ => None,
        }
    }
}
