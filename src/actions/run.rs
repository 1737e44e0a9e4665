//! `run:<name>` hands over to a host action registered as `run:<name>`.

use async_trait::async_trait;

use super::{Action, ActionContext, ActionResult};
use crate::error::Result;

pub struct RunAction;

#[async_trait(?Send)]
impl Action for RunAction {
    async fn run(&self, ctx: ActionContext) -> Result<ActionResult> {
        let engine = ctx.engine.clone();
        let forwarded = ActionContext {
            prefix: format!("run:{}", ctx.value),
            value: String::new(),
            ..ctx
        };
        engine.run_action(forwarded).await
    }
}
