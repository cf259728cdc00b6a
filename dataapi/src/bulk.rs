//! Paginated fetches: the first page reports the total count, the remaining
//! pages are requested concurrently.

use crate::Params;
use crate::api::DataApi;
use crate::context::RequestContext;
use crate::errors::{DataApiError, Result};
use crate::metrics_defs::BULK_PAGES;
use serde_json::{Value, json};
use shared::histogram;
use tokio::task::JoinSet;

/// Where a page's total count and items live in the returned `data`.
#[derive(Clone, Debug)]
pub struct BulkOptions {
    /// Page size
    pub limit: u64,
    /// JSON pointer to the page items
    pub data_pointer: String,
    /// JSON pointer to the total count
    pub count_pointer: String,
}

impl Default for BulkOptions {
    fn default() -> Self {
        BulkOptions {
            limit: 1000,
            data_pointer: "/info".into(),
            count_pointer: "/count".into(),
        }
    }
}

impl BulkOptions {
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = limit;
        self
    }

    fn count(&self, data: &Value) -> Result<u64> {
        data.pointer(&self.count_pointer)
            .and_then(Value::as_u64)
            .ok_or_else(|| DataApiError::MissingParam(self.count_pointer.clone()))
    }

    fn items(&self, data: Value) -> Result<Vec<Value>> {
        let mut data = data;
        match data.pointer_mut(&self.data_pointer).map(Value::take) {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) => Ok(Vec::new()),
            _ => Err(DataApiError::MissingParam(self.data_pointer.clone())),
        }
    }
}

/// Parameters of the page starting at `start`; caller parameters win over
/// the paging ones.
fn page_params(params: &Params, start: u64, limit: u64) -> Params {
    let mut page = Params::new();
    page.insert("page".into(), json!({"start": start, "limit": limit}));
    page.insert("no_request".into(), Value::Bool(true));
    page.extend(params.clone());
    page
}

impl DataApi {
    /// Fetches every page and returns the concatenated items in page order.
    ///
    /// Any failed page fails the whole request.
    pub async fn bulk_request(
        &self,
        ctx: &RequestContext,
        params: Params,
        options: &BulkOptions,
    ) -> Result<Vec<Value>> {
        let limit = options.limit.max(1);

        let first = self.call(ctx, page_params(&params, 0, limit)).await?;
        let count = options.count(&first)?;
        let mut items = options.items(first)?;

        let mut join_set = JoinSet::new();
        let mut start = limit;
        let mut index = 0usize;
        while start < count {
            let api = self.clone();
            let ctx = ctx.clone();
            let page = page_params(&params, start, limit);
            join_set.spawn(async move { (index, api.call(&ctx, page).await) });
            start += limit;
            index += 1;
        }

        let mut pages: Vec<Option<Value>> = vec![None; index];
        while let Some(joined) = join_set.join_next().await {
            let (index, result) = joined.map_err(|e| DataApiError::Request {
                message: format!("[{}-API]bulk page task failed: {e}", self.module()),
                request_id: ctx.request_id().to_string(),
                status: None,
            })?;
            pages[index] = Some(result?);
        }

        histogram!(BULK_PAGES, "module" => self.module().to_string()).record((pages.len() + 1) as f64);
        tracing::debug!(module = %self.module(), count, pages = pages.len() + 1, "bulk request finished");

        for page in pages.into_iter().flatten() {
            items.extend(options.items(page)?);
        }
        Ok(items)
    }
}
