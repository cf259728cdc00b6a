//! Pluggable processing around a call: parameter rewriting before the
//! request, body rewriting and validation after it, and extra headers.

use crate::Params;
use crate::context::RequestContext;
use crate::settings::ApiSettings;
use http::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::Arc;

/// Rewrites the parameters before anything else happens to them.
pub type BeforeRequest = Arc<dyn Fn(&RequestContext, Params) -> Params + Send + Sync>;

/// Rewrites a successful response body.
pub type AfterRequest = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Produces extra headers from the final parameters.
pub type HeaderHook = Arc<dyn Fn(&Params) -> HeaderMap + Send + Sync>;

/// Validates a successful response body and returns the cleaned value.
pub trait ResponseSerializer: Send + Sync {
    fn validate(&self, body: Value) -> Result<Value, String>;
}

/// Validates the body by deserializing it into `T`; the returned value is `T`
/// serialized back, so fields `T` does not know about are dropped.
pub struct TypedSerializer<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedSerializer<T> {
    pub fn new() -> Self {
        TypedSerializer {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TypedSerializer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResponseSerializer for TypedSerializer<T>
where
    T: DeserializeOwned + Serialize,
{
    fn validate(&self, body: Value) -> Result<Value, String> {
        let typed: T = serde_json::from_value(body).map_err(|e| e.to_string())?;
        serde_json::to_value(typed).map_err(|e| e.to_string())
    }
}

/// Stamps the ESB identity on every request: the platform app credentials
/// always win over caller values, `bk_supplier_account` and `bk_username`
/// are filled when missing, and private `_`-prefixed keys are dropped.
pub fn esb_before_request(settings: Arc<ApiSettings>) -> BeforeRequest {
    Arc::new(move |ctx: &RequestContext, mut params: Params| {
        params.retain(|k, _| !k.starts_with('_'));
        params.insert("bk_app_code".into(), settings.app_code.clone().into());
        params.insert("bk_app_secret".into(), settings.app_secret.clone().into());
        params
            .entry("bk_supplier_account")
            .or_insert_with(|| settings.supplier_account.clone().into());
        params.entry("bk_username").or_insert_with(|| {
            ctx.username()
                .unwrap_or(settings.default_username.as_str())
                .to_string()
                .into()
        });
        params
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Serialize, Deserialize)]
    struct Envelope {
        result: bool,
        data: Vec<u32>,
    }

    #[test]
    fn test_typed_serializer() {
        let serializer = TypedSerializer::<Envelope>::new();
        let cleaned = serializer
            .validate(json!({"result": true, "data": [1, 2], "extra": "dropped"}))
            .unwrap();
        assert_eq!(cleaned, json!({"result": true, "data": [1, 2]}));
        assert!(serializer.validate(json!({"result": "yes"})).is_err());
    }

    #[test]
    fn test_esb_before_request() {
        let settings = Arc::new(ApiSettings::new("bkchat", "secret"));
        let hook = esb_before_request(settings);
        let ctx = RequestContext::new().with_username("alice");

        let params = json!({"bk_app_code": "spoofed", "_request": 1, "bk_biz_id": 2});
        let params = hook(&ctx, params.as_object().unwrap().clone());

        assert_eq!(params["bk_app_code"], "bkchat");
        assert_eq!(params["bk_app_secret"], "secret");
        assert_eq!(params["bk_supplier_account"], "0");
        assert_eq!(params["bk_username"], "alice");
        assert_eq!(params["bk_biz_id"], 2);
        assert!(!params.contains_key("_request"));

        let params = hook(&RequestContext::new(), Params::new());
        assert_eq!(params["bk_username"], "admin");
    }
}
