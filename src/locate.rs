//! Element Locator
//!
//! Resolves a markup query relative to an origin element:
//! - `body` is the document body
//! - `this` (optionally followed by a selector) searches from the origin
//! - anything else is a selector searched from the body

use markup5ever_rcdom::Handle;

use crate::dom;
use crate::error::{HyperionsError, Result};
use crate::selector::Selector;

/// Locate the element designated by `query`.
///
/// A non-empty query that matches nothing is a `NotFound` error.
pub fn locate(body: &Handle, origin: Option<&Handle>, query: &str) -> Result<Handle> {
    if query == "body" {
        return Ok(body.clone());
    }

    let (root, rest) = match query.strip_prefix("this") {
        Some(rest) => {
            let origin = origin.ok_or_else(|| HyperionsError::NoOrigin(query.to_string()))?;
            (origin.clone(), rest.trim())
        }
        None => (body.clone(), query.trim()),
    };

    if rest.is_empty() {
        return Ok(root);
    }

    Selector::parse(rest)?
        .query_first(&root)
        .ok_or_else(|| HyperionsError::NotFound {
            origin: dom::describe(&root),
            query: query.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{child_elements, find_body, get_attribute, parse_html};
    use crate::error::ErrorKind;
    use std::rc::Rc;

    /// Document, body and the `#s` section
    fn fixture() -> (Handle, Handle, Handle) {
        let document = parse_html(
            r#"<section id="s"><span class="x" id="inner"></span></section><span class="x" id="outer"></span>"#,
        );
        let body = find_body(&document).unwrap();
        let section = child_elements(&body).remove(0);
        (document, body, section)
    }

    #[test]
    fn test_body_query() {
        let (_doc, body, section) = fixture();
        let found = locate(&body, Some(&section), "body").unwrap();
        assert!(Rc::ptr_eq(&found, &body));
    }

    #[test]
    fn test_this_is_origin() {
        let (_doc, body, section) = fixture();
        let found = locate(&body, Some(&section), "this").unwrap();
        assert!(Rc::ptr_eq(&found, &section));
    }

    #[test]
    fn test_this_relative_query() {
        let (_doc, body, section) = fixture();
        let found = locate(&body, Some(&section), "this .x").unwrap();
        assert_eq!(get_attribute(&found, "id").as_deref(), Some("inner"));
    }

    #[test]
    fn test_document_query() {
        let (_doc, body, section) = fixture();
        let found = locate(&body, Some(&section), "#outer").unwrap();
        assert_eq!(get_attribute(&found, "id").as_deref(), Some("outer"));
    }

    #[test]
    fn test_not_found() {
        let (_doc, body, section) = fixture();
        let err = locate(&body, Some(&section), "this #outer").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_this_without_origin() {
        let (_doc, body, _) = fixture();
        let err = locate(&body, None, "this .x").unwrap_err();
        assert!(matches!(err, HyperionsError::NoOrigin(_)));
    }
}
