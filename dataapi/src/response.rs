use serde_json::Value;

/// The `{result, code, message, data, errors}` envelope every platform API
/// answers with.
#[derive(Clone, Debug, PartialEq)]
pub struct DataResponse {
    body: Value,
    request_id: String,
}

impl DataResponse {
    pub fn new(body: Value, request_id: impl Into<String>) -> Self {
        DataResponse {
            body,
            request_id: request_id.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.body.get("result").is_some_and(is_truthy)
    }

    pub fn code(&self) -> Option<&Value> {
        self.field("code")
    }

    pub fn message(&self) -> Option<&Value> {
        self.field("message")
    }

    /// The message rendered as text; non-string messages are stringified.
    pub fn message_text(&self) -> String {
        match self.message() {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    pub fn data(&self) -> Option<&Value> {
        self.field("data")
    }

    pub fn errors(&self) -> Option<&Value> {
        self.field("errors")
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn body(&self) -> &Value {
        &self.body
    }

    pub fn into_body(self) -> Value {
        self.body
    }

    pub fn into_data(self) -> Value {
        match self.body {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    // A JSON null counts as missing.
    fn field(&self, key: &str) -> Option<&Value> {
        self.body.get(key).filter(|v| !v.is_null())
    }
}

/// Truthiness of a JSON value: null, false, 0, "" and empty containers are
/// false.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
