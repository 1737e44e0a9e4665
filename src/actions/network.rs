//! Request actions: `get`, `post`, `put`, `delete`, `patch`.
//!
//! The chain data becomes the query string for GET, a multipart body when the
//! origin declares `enctype="multipart/form-data"`, and a JSON body otherwise.
//! The JSON response is the step result.

use async_trait::async_trait;
use reqwest::Url;
use serde_json::Value;

use super::{Action, ActionContext, ActionResult};
use crate::config::dlog;
use crate::dom;
use crate::error::{HyperionsError, Result};
use crate::resolve::to_display_string;
use crate::transport::{HttpMethod, HttpRequest, RequestBody};

const MULTIPART: &str = "multipart/form-data";

pub struct NetworkAction;

/// Set every data entry as a query parameter, replacing existing ones
fn apply_query(url: &mut Url, data: &Value) {
    let Value::Object(map) = data else {
        return;
    };
    if map.is_empty() {
        return;
    }

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .into_owned()
        .filter(|(key, _)| !map.contains_key(key))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .extend_pairs(map.iter().map(|(key, value)| (key.clone(), to_display_string(value))));
}

/// Text fields of a multipart body; lists send their first entry
fn multipart_fields(data: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = data else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(key, value)| {
            let value = match value {
                Value::Array(items) => items.first()?,
                other => other,
            };
            Some((key.clone(), to_display_string(value)))
        })
        .collect()
}

#[async_trait(?Send)]
impl Action for NetworkAction {
    async fn run(&self, ctx: ActionContext) -> Result<ActionResult> {
        let method = HttpMethod::from_prefix(&ctx.prefix)
            .ok_or_else(|| HyperionsError::Config(format!("`{}` is not an HTTP method", ctx.prefix)))?;

        if ctx.value.is_empty() {
            return Err(HyperionsError::MissingUrl(method.to_string()));
        }

        dlog!(ctx, "request: using method {}", method);

        let mut url = ctx
            .engine
            .location()
            .join(&ctx.value)
            .map_err(|e| HyperionsError::InvalidUrl {
                url: ctx.value.clone(),
                reason: e.to_string(),
            })?;

        let multipart = ctx
            .origin
            .as_ref()
            .and_then(|origin| dom::get_attribute(origin, "enctype"))
            .is_some_and(|enctype| enctype == MULTIPART);

        let body = if method == HttpMethod::Get {
            dlog!(ctx, "input: adding params to URL, method is GET");
            apply_query(&mut url, &ctx.data);
            RequestBody::None
        } else if multipart {
            dlog!(ctx, "input: adding params to body as FormData, element has attribute enctype === {}", MULTIPART);
            RequestBody::Multipart(multipart_fields(&ctx.data))
        } else {
            dlog!(ctx, "input: adding params to body as JSON");
            RequestBody::Json(serde_json::to_string(&ctx.data)?)
        };

        let request = HttpRequest {
            method,
            url: url.to_string(),
            body,
        };
        dlog!(ctx, "input: fetching {} with method {}", request.url, method);

        let url = request.url.clone();
        let response = ctx.engine.transport().send(request).await?;
        if response.is_error() {
            return Err(HyperionsError::Request {
                status: response.status,
                url,
            });
        }

        // an empty success body (204) carries no data
        if response.body.trim().is_empty() {
            return Ok(ActionResult::empty());
        }
        let data: Value = serde_json::from_str(&response.body)?;
        Ok(ActionResult::with_data(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_replaces_existing_parameters() {
        let mut url = Url::parse("http://localhost/api/search?q=old&page=1").unwrap();
        apply_query(&mut url, &json!({ "q": "hi", "limit": 10 }));
        assert_eq!(url.as_str(), "http://localhost/api/search?page=1&limit=10&q=hi");
    }

    #[test]
    fn test_query_untouched_without_data() {
        let mut url = Url::parse("http://localhost/api/items").unwrap();
        apply_query(&mut url, &json!({}));
        assert_eq!(url.as_str(), "http://localhost/api/items");
    }

    #[test]
    fn test_multipart_uses_first_list_entry() {
        let fields = multipart_fields(&json!({ "files": ["a.txt", "b.txt"], "title": "doc", "empty": [] }));
        assert_eq!(
            fields,
            vec![
                ("files".to_string(), "a.txt".to_string()),
                ("title".to_string(), "doc".to_string()),
            ]
        );
    }
}
