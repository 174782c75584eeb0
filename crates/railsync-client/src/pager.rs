//! Collection fetching across both list response shapes.
//!
//! Legacy endpoints answer with a bare array. Paginated endpoints answer
//! with `{"<plural>": [...], "_links": {"next": "/api/v2/..."}}` and are
//! followed until `next` is null or absent.

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, info};

use crate::client::Transport;
use crate::error::{SyncError, SyncResult};

/// Header opting into the paginated response variant.
pub const PAGINATION_HEADER: &str = "x-api-ident";
const PAGINATION_HEADER_VALUE: &str = "beta";

/// Fetch every record of a collection, preserving server order.
///
/// `name` is the singular resource name; the paged shape keeps records under
/// `"{name}s"`. Every page is requested with the same `query`.
pub async fn fetch_all(
    transport: &Transport,
    path: &str,
    name: &str,
    query: &[(String, String)],
) -> SyncResult<Vec<Value>> {
    let key = format!("{}s", name);
    let mut headers = HeaderMap::new();
    headers.insert(
        PAGINATION_HEADER,
        HeaderValue::from_static(PAGINATION_HEADER_VALUE),
    );

    let first = transport
        .request(Method::GET, path, &headers, query, None)
        .await?;

    let mut page = match first {
        Value::Array(items) => {
            info!(
                resource = name,
                "pagination is not enabled, using the plain list response"
            );
            return Ok(items);
        }
        page @ Value::Object(_) => page,
        other => {
            return Err(SyncError::MalformedResponse {
                url: path.to_string(),
                message: format!("list response is neither an array nor an object: {}", other),
            })
        }
    };

    let mut records = take_page(&mut page, path, &key)?;
    let mut pages = 1usize;
    while let Some(next) = next_link(&page) {
        debug!(resource = name, next = %next, "fetching next page");
        page = transport
            .request(Method::GET, &next, &headers, query, None)
            .await?;
        if !page.is_object() {
            return Err(SyncError::MalformedResponse {
                url: next,
                message: "paginated listing switched to a different response shape".to_string(),
            });
        }
        records.extend(take_page(&mut page, &next, &key)?);
        pages += 1;
    }

    debug!(
        resource = name,
        pages,
        records = records.len(),
        "fetched collection"
    );
    Ok(records)
}

fn take_page(page: &mut Value, url: &str, key: &str) -> SyncResult<Vec<Value>> {
    match page.get_mut(key).map(Value::take) {
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(SyncError::MalformedResponse {
            url: url.to_string(),
            message: format!("`{}` is not an array: {}", key, other),
        }),
        None => match page.get("error") {
            Some(error) => Err(SyncError::Application {
                message: error.to_string(),
            }),
            None => Err(SyncError::MalformedResponse {
                url: url.to_string(),
                message: format!("missing `{}` in paginated response", key),
            }),
        },
    }
}

fn next_link(page: &Value) -> Option<String> {
    page.get("_links")
        .and_then(|links| links.get("next"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
