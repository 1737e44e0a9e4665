//! Initial data of an action chain.
//!
//! A form contributes its named fields, a named input its own value, and the
//! deprecated `data-params` attribute adds literal `key:value` pairs.

use markup5ever_rcdom::Handle;
use serde_json::{Map, Value};

use crate::config::Options;
use crate::declarations::{self, Directive};
use crate::config::dlog;
use crate::dom;
use crate::resolve::decode_param;
use crate::split::better_split;

/// Current value of a form control
fn control_value(control: &Handle) -> Option<String> {
    match dom::tag_name(control).as_deref() {
        Some("textarea") => Some(dom::text_content(control)),
        Some("select") => {
            let options: Vec<Handle> = dom::descendants(control)
                .into_iter()
                .filter(|node| dom::has_tag(node, "option"))
                .collect();
            let selected = options
                .iter()
                .find(|option| dom::has_attribute(option, "selected"))
                .or_else(|| options.first())?;
            Some(dom::get_attribute(selected, "value").unwrap_or_else(|| dom::text_content(selected)))
        }
        Some("input") => {
            let kind = dom::get_attribute(control, "type")
                .unwrap_or_default()
                .to_ascii_lowercase();
            match kind.as_str() {
                "checkbox" | "radio" => {
                    if !dom::has_attribute(control, "checked") {
                        return None;
                    }
                    Some(dom::get_attribute(control, "value").unwrap_or_else(|| "on".to_string()))
                }
                "submit" | "button" | "reset" | "image" | "file" => None,
                _ => Some(dom::get_attribute(control, "value").unwrap_or_default()),
            }
        }
        _ => None,
    }
}

fn is_checkbox(control: &Handle) -> bool {
    dom::has_tag(control, "input")
        && dom::get_attribute(control, "type").is_some_and(|kind| kind.eq_ignore_ascii_case("checkbox"))
}

/// Named fields of a form, keyed like `FormData`
fn form_params(form: &Handle, params: &mut Map<String, Value>) {
    let controls: Vec<Handle> = dom::descendants(form)
        .into_iter()
        .filter(|node| {
            ["input", "textarea", "select"].iter().any(|tag| dom::has_tag(node, tag))
                && !dom::has_attribute(node, "disabled")
        })
        .collect();

    for control in &controls {
        let Some(name) = dom::get_attribute(control, "name").filter(|name| !name.is_empty()) else {
            continue;
        };
        let multi = controls
            .iter()
            .any(|other| is_checkbox(other) && dom::get_attribute(other, "name").as_deref() == Some(name.as_str()));

        let Some(value) = control_value(control) else {
            continue;
        };
        if multi {
            let entry = params
                .entry(name)
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(list) = entry {
                list.push(Value::String(value));
            }
        } else {
            params.insert(name, Value::String(value));
        }
    }
}

/// Build the initial parameters for an element's chain
pub fn parse_params(element: &Handle, options: &Options) -> Value {
    let mut params = Map::new();

    if dom::has_tag(element, "form") {
        dlog!(options, "parseParams: element is a Form, getting inputs as params");
        form_params(element, &mut params);
    } else if dom::has_tag(element, "input") {
        let name = dom::get_attribute(element, "name")
            .filter(|name| !name.is_empty())
            .or_else(|| declarations::value(element, Directive::Name));
        if let Some(name) = name {
            dlog!(options, "input: element is an Input, getting name and value as param");
            params.insert(
                name,
                Value::String(dom::get_attribute(element, "value").unwrap_or_default()),
            );
        }
    }

    if let Some(exchange) = declarations::value(element, Directive::Params) {
        dlog!(options, "input: element has data-params, parsing them into params");
        for item in better_split(&exchange) {
            let param = decode_param(&item);
            if let Some(key) = param.prefix {
                params.insert(key, Value::String(param.value));
            }
        }
    }

    Value::Object(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{child_elements, find_body, parse_html};
    use serde_json::json;

    /// First body element, with the document keeping the tree alive
    fn element(html: &str) -> (Handle, Handle) {
        let document = parse_html(html);
        let body = find_body(&document).unwrap();
        let first = child_elements(&body).remove(0);
        (document, first)
    }

    #[test]
    fn test_form_params() {
        let (_doc, form) = element(
            r#"<form>
                <input name="q" value="hi">
                <input name="tags" type="checkbox" value="a" checked>
                <input name="tags" type="checkbox" value="b">
                <input name="tags" type="checkbox" value="c" checked>
                <input type="submit" name="go" value="Go">
                <textarea name="body">text</textarea>
                <select name="size"><option value="s">S</option><option value="m" selected>M</option></select>
            </form>"#,
        );
        let params = parse_params(&form, &Options::default());
        assert_eq!(
            params,
            json!({ "q": "hi", "tags": ["a", "c"], "body": "text", "size": "m" })
        );
    }

    #[test]
    fn test_unchecked_checkbox_group_has_no_key() {
        let (_doc, form) = element(
            r#"<form>
                <input name="q" value="hi">
                <input name="tags" type="checkbox" value="a">
                <input name="tags" type="checkbox" value="b">
            </form>"#,
        );
        assert_eq!(parse_params(&form, &Options::default()), json!({ "q": "hi" }));
    }

    #[test]
    fn test_input_params() {
        let (_doc, input) = element(r#"<input name="search" value="rust">"#);
        assert_eq!(
            parse_params(&input, &Options::default()),
            json!({ "search": "rust" })
        );
    }

    #[test]
    fn test_legacy_params() {
        let (_doc, div) = element(r#"<div data-params="page:2 sort:name"></div>"#);
        assert_eq!(
            parse_params(&div, &Options::default()),
            json!({ "page": "2", "sort": "name" })
        );
    }

    #[test]
    fn test_plain_element_has_empty_params() {
        let (_doc, div) = element("<div></div>");
        assert_eq!(parse_params(&div, &Options::default()), json!({}));
    }
}
