//! Wildcard handler: interpolates action attributes and applies `hyp:attr`.
//!
//! Runs on every rendered element, after the keyed handlers.

use markup5ever_rcdom::Handle;

use super::{AttributeContext, AttributeHandler, AttributeOutcome};
use crate::declarations::{self, Dialect, Directive};
use crate::config::dlog;
use crate::dom;
use crate::error::Result;
use crate::resolve::{decode_param, parse_value, to_display_string};
use crate::split::better_split;

pub struct GenericHandler;

impl GenericHandler {
    /// `prefix:value` binding, `text` when no prefix is given
    fn bind(ctx: &AttributeContext<'_>, element: &Handle, binding: &str) {
        let param = decode_param(binding);
        let prefix = param.prefix.as_deref().unwrap_or("text");

        let Some(resolved) = parse_value(&param.value, ctx.data, &ctx.context.path) else {
            dlog!(ctx, "attr: `{}` did not resolve, skipping", binding);
            return;
        };
        let value = to_display_string(&resolved);

        match prefix {
            "html" => dom::set_inner_html(element, &value),
            "text" => dom::set_text(element, &value),
            property => {
                if !dom::set_property(element, property, &value) {
                    dom::set_attribute(element, property, &value);
                }
            }
        }
    }
}

impl AttributeHandler for GenericHandler {
    fn apply(&self, ctx: &AttributeContext<'_>) -> Result<AttributeOutcome> {
        let element = ctx.element;

        // a loop stencil is only bound through its copies
        if declarations::value(element, Directive::Loop).is_some_and(|fragment| !fragment.is_empty()) {
            return Ok(AttributeOutcome::proceed());
        }

        for name in dom::attribute_names(element) {
            if !declarations::is_action_attribute(&name) {
                continue;
            }
            let Some(raw) = dom::get_attribute(element, &name) else {
                continue;
            };
            if let Some(value) = parse_value(&raw, ctx.data, &ctx.context.path) {
                dom::set_attribute(element, &name, &to_display_string(&value));
            }
        }

        let Some(declared) = declarations::read(element, Directive::Attributes) else {
            return Ok(AttributeOutcome::proceed());
        };

        for binding in better_split(&declared.value) {
            Self::bind(ctx, element, &binding);
        }

        let keep = ctx
            .context
            .options
            .keep_data_attributes
            .unwrap_or_else(|| ctx.engine.config().keep_data_attributes);
        // `hyp:attr` stays so the element can be rendered again
        if !keep && declared.dialect == Dialect::Legacy {
            dom::remove_attribute(element, &declared.attribute);
        }

        Ok(AttributeOutcome::proceed())
    }
}
