//! Metrics definitions for the API client.

use shared::metrics_defs::{MetricDef, MetricType};

pub const API_REQUEST: MetricDef = MetricDef {
    name: "dataapi.request",
    metric_type: MetricType::Counter,
    description: "Number of requests sent to backend APIs, tagged by module and outcome",
};

pub const API_REQUEST_DURATION: MetricDef = MetricDef {
    name: "dataapi.request.duration",
    metric_type: MetricType::Histogram,
    description: "Time to complete a backend API request in seconds",
};

pub const API_CACHE_HIT: MetricDef = MetricDef {
    name: "dataapi.cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of calls answered from the response cache",
};

pub const API_CACHE_MISS: MetricDef = MetricDef {
    name: "dataapi.cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of cache lookups that had to go to the backend",
};

pub const BULK_PAGES: MetricDef = MetricDef {
    name: "dataapi.bulk.pages",
    metric_type: MetricType::Histogram,
    description: "Number of pages fetched by a bulk request",
};

pub const ALL_METRICS: &[MetricDef] = &[
    API_REQUEST,
    API_REQUEST_DURATION,
    API_CACHE_HIT,
    API_CACHE_MISS,
    BULK_PAGES,
];
