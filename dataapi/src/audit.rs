//! One audit record per request sent to a backend.

use crate::Params;
use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Mutex;

pub const MAX_MESSAGE_RECORD: usize = 1023;

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct AuditRecord {
    pub request_datetime: DateTime<Local>,
    pub url: String,
    pub module: String,
    pub method: String,
    pub method_override: Option<String>,
    pub query_params: String,
    pub response_result: bool,
    pub response_code: Value,
    pub response_data: String,
    pub response_message: String,
    pub response_errors: Value,
    pub cost_time: f64,
    pub request_id: String,
    pub request_user: String,
}

impl fmt::Display for AuditRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method_override = self.method_override.as_deref().unwrap_or("None");
        let fields: [(&str, String); 14] = [
            ("request_datetime", self.request_datetime.format("%Y-%m-%d %H:%M:%S%.6f").to_string()),
            ("url", self.url.clone()),
            ("module", self.module.clone()),
            ("method", self.method.clone()),
            ("method_override", method_override.to_string()),
            ("query_params", self.query_params.clone()),
            ("response_result", self.response_result.to_string()),
            ("response_code", value_text(&self.response_code)),
            ("response_data", self.response_data.clone()),
            ("response_message", self.response_message.clone()),
            ("response_errors", value_text(&self.response_errors)),
            ("cost_time", self.cost_time.to_string()),
            ("request_id", self.request_id.clone()),
            ("request_user", self.request_user.clone()),
        ];
        let joined = fields
            .iter()
            .map(|(k, v)| format!(" {k}=>{v} "))
            .collect::<Vec<_>>()
            .join(" && ");
        write!(f, "[REQUEST-API] {joined}")
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Receives every audit record.
pub trait AuditSink: Send + Sync {
    fn record(&self, record: &AuditRecord);
}

/// Logs successful calls at info level and failed ones at error level.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, record: &AuditRecord) {
        if record.response_result {
            tracing::info!(
                module = %record.module,
                request_id = %record.request_id,
                cost_time = record.cost_time,
                "{record}"
            );
        } else {
            tracing::error!(
                module = %record.module,
                request_id = %record.request_id,
                cost_time = record.cost_time,
                "{record}"
            );
        }
    }
}

/// Keeps records in memory; useful to inspect what a call logged.
#[derive(Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, record: &AuditRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}

/// Renders `params` for the audit trail without the sensitive keys.
pub fn scrub_params(params: &Params, is_sensitive: impl Fn(&str) -> bool, max: Option<usize>) -> String {
    let scrubbed: Params = params
        .iter()
        .filter(|(k, _)| !is_sensitive(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    match serde_json::to_string(&scrubbed) {
        Ok(s) => truncate(&s, max),
        Err(_) => String::new(),
    }
}

/// Keeps at most `max` characters of `s`; `None` keeps everything.
pub fn truncate(s: &str, max: Option<usize>) -> String {
    match max {
        Some(max) => s.chars().take(max).collect(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> AuditRecord {
        AuditRecord {
            request_datetime: Local::now(),
            url: "http://esb/api/c/compapi/v2/cc/search_business/".into(),
            module: "CC".into(),
            method: "POST".into(),
            method_override: None,
            query_params: "{}".into(),
            response_result: true,
            response_code: json!(0),
            response_data: "[]".into(),
            response_message: "".into(),
            response_errors: Value::Null,
            cost_time: 0.25,
            request_id: "abc".into(),
            request_user: "alice".into(),
        }
    }

    #[test]
    fn test_display() {
        let line = record().to_string();
        assert!(line.starts_with("[REQUEST-API]  request_datetime=>"));
        assert!(line.contains(" &&  module=>CC "));
        assert!(line.contains(" method_override=>None "));
        assert!(line.ends_with(" request_user=>alice "));
    }

    #[test]
    fn test_scrub_params() {
        let params = json!({"bk_app_secret": "x", "bk_biz_id": 2, "password": "p"});
        let rendered = scrub_params(
            params.as_object().unwrap(),
            |k| k == "bk_app_secret" || k == "password",
            None,
        );
        assert_eq!(rendered, r#"{"bk_biz_id":2}"#);

        let rendered = scrub_params(params.as_object().unwrap(), |_| false, Some(5));
        assert_eq!(rendered.chars().count(), 5);
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("蓝鲸智云", Some(2)), "蓝鲸");
        assert_eq!(truncate("abc", None), "abc");
        assert_eq!(truncate("abc", Some(10)), "abc");
    }

    #[test]
    fn test_memory_sink() {
        let sink = MemoryAuditSink::new();
        sink.record(&record());
        TracingAuditSink.record(&record());
        assert_eq!(sink.records().len(), 1);
    }
}
