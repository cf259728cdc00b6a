//! Client side of the platform's backend APIs.
//!
//! A [`DataApi`] describes one endpoint and is called with a
//! [`RequestContext`] and a JSON parameter map. Calls run through the
//! request hooks, a shared response cache and an audit sink, and come back
//! either as the response `data` or as a classified [`DataApiError`].
//! [`DataDrfApiSet`] builds the APIs of a REST resource,
//! [`PassThroughApi`] whitelists raw sub-URLs and [`GrafanaApi`] talks to
//! Grafana.

pub mod api;
pub mod audit;
pub mod bulk;
pub mod cache;
pub mod client;
pub mod context;
pub mod drf;
pub mod errors;
pub mod grafana;
pub mod hooks;
pub mod metrics_defs;
pub mod passthrough;
pub mod response;
pub mod settings;

/// Request parameters, in the order the caller built them.
pub type Params = serde_json::Map<String, serde_json::Value>;

pub use api::{CallOptions, DataApi, FilePart};
pub use bulk::BulkOptions;
pub use client::ApiClient;
pub use context::RequestContext;
pub use drf::{ApiOptions, DataDrfApiSet, DrfActionApi};
pub use errors::{DataApiError, Result};
pub use grafana::GrafanaApi;
pub use passthrough::{PassThroughApi, SupportedApi};
pub use response::DataResponse;
pub use settings::ApiSettings;
