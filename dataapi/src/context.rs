use indexmap::IndexMap;

/// Identity of the inbound request on whose behalf an API call is made.
///
/// Every outgoing call carries the request id in its headers and audit
/// record, and falls back to the context's username for `bk_username`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestContext {
    request_id: String,
    username: Option<String>,
    language: Option<String>,
    cookies: IndexMap<String, String>,
}

impl RequestContext {
    pub fn new() -> Self {
        RequestContext {
            request_id: uuid::Uuid::new_v4().simple().to_string(),
            ..Default::default()
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    /// Parses a `Cookie` request header (`a=1; b=2`) into the context.
    pub fn with_cookie_header(mut self, header: &str) -> Self {
        for pair in header.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=')
                && !name.is_empty()
            {
                self.cookies.insert(name.to_string(), value.to_string());
            }
        }
        self
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn cookies(&self) -> &IndexMap<String, String> {
        &self.cookies
    }

    /// Renders the cookies as a `Cookie` header value.
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}
