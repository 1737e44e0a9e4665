//! `hyp:loop="<path>"`: one copy of the element per array entry.
//!
//! The looped element stays in the document as a hidden stencil and the
//! copies are inserted right after it, marked with `hyp:copy` so the next
//! render can remove them before producing new ones.

use markup5ever_rcdom::Handle;
use serde_json::{json, Map, Value};
use std::rc::Rc;
use tracing::warn;

use super::{AttributeContext, AttributeHandler, AttributeOutcome, RenderOverride};
use crate::declarations::{self, Directive, COPY_MARKER};
use crate::config::dlog;
use crate::dom;
use crate::error::Result;
use crate::resolve::get_path;

pub struct LoopHandler;

/// Data a copy renders with: the current data plus `loop.index`
fn entry_data(data: &Value, index: usize) -> Value {
    let mut map = match data {
        Value::Object(map) => map.clone(),
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| (i.to_string(), item.clone()))
            .collect(),
        _ => Map::new(),
    };
    map.insert("loop".to_string(), json!({ "index": index }));
    Value::Object(map)
}

/// Copies of a previous render sit right after the stencil
fn remove_previous_copies(stencil: &Handle) {
    let Some(parent) = dom::parent(stencil) else {
        return;
    };
    let siblings = dom::child_elements(&parent);
    let Some(position) = siblings.iter().position(|sibling| Rc::ptr_eq(sibling, stencil)) else {
        return;
    };
    for sibling in siblings[position + 1..]
        .iter()
        .take_while(|sibling| dom::has_attribute(sibling, COPY_MARKER))
    {
        dom::detach(sibling);
    }
}

impl AttributeHandler for LoopHandler {
    fn apply(&self, ctx: &AttributeContext<'_>) -> Result<AttributeOutcome> {
        let stencil = ctx.element;
        let Some(fragment) =
            declarations::value(stencil, Directive::Loop).filter(|fragment| !fragment.is_empty())
        else {
            dlog!(ctx, "fillLoop: loop has no \"hyp:loop\"");
            return Ok(AttributeOutcome::proceed());
        };

        let source = if fragment == "this" {
            ctx.context.path.clone()
        } else {
            ctx.context.path.with_dotted(&fragment)
        };

        let Some(Value::Array(items)) = get_path(ctx.data, &source) else {
            warn!("fillLoop: loop source {} is not an array", source);
            return Ok(AttributeOutcome::halt());
        };

        remove_previous_copies(stencil);

        let mut anchor = stencil.clone();
        for index in 0..items.len() {
            dlog!(ctx, "fillLoop: loop context {} index {}", source, index);

            let copy = dom::deep_clone(stencil);
            declarations::strip(&copy, Directive::Loop);
            dom::unhide(&copy);

            ctx.process(
                &copy,
                Some(RenderOverride {
                    path: source.with(index),
                    data: entry_data(ctx.data, index),
                }),
                true,
            )?;

            dom::set_attribute(&copy, COPY_MARKER, "true");
            dom::insert_after(&anchor, &copy);
            anchor = copy;
        }

        dom::hide(stencil);
        Ok(AttributeOutcome::halt())
    }
}
