use async_trait::async_trait;
use std::rc::Rc;

use super::{Action, ActionContext, ActionResult};
use crate::attrs::RenderContext;
use crate::config::dlog;
use crate::dom;
use crate::error::Result;
use crate::resolve::PathContext;

/// `fill:<query>` renders the chain data into an existing element.
///
/// Bindings are kept unless the element options say otherwise so the same
/// element can be filled again.
pub struct FillAction;

#[async_trait(?Send)]
impl Action for FillAction {
    async fn run(&self, ctx: ActionContext) -> Result<ActionResult> {
        let target = ctx.engine.locate(ctx.origin.as_ref(), &ctx.value)?;
        let skip_self = ctx
            .origin
            .as_ref()
            .is_some_and(|origin| Rc::ptr_eq(origin, &target));

        dlog!(ctx, "fill: filling {} (skip self: {})", dom::describe(&target), skip_self);

        let context = RenderContext {
            path: PathContext::new(),
            options: ctx.options.clone().with_default_keep_data_attributes(true),
        };
        ctx.engine.fill(&target, &ctx.data, &context, skip_self)?;
        Ok(ActionResult::empty())
    }
}
