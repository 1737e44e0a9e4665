use async_trait::async_trait;

use super::{Action, ActionContext, ActionResult};
use crate::config::dlog;
use crate::dom;
use crate::error::Result;

/// `hyp:<query>` triggers another element's chain without waiting for it
pub struct HypAction;

#[async_trait(?Send)]
impl Action for HypAction {
    async fn run(&self, ctx: ActionContext) -> Result<ActionResult> {
        let target = ctx.engine.locate(ctx.origin.as_ref(), &ctx.value)?;
        dlog!(ctx, "hyp: triggering {}", dom::describe(&target));
        ctx.engine.trigger(&target);
        Ok(ActionResult::empty())
    }
}
