use async_trait::async_trait;
use serde_json::Value;

use super::{Action, ActionContext, ActionResult};
use crate::config::dlog;
use crate::error::Result;

/// Inline JSON: `raw:{"name":"Ada"}`
pub struct RawAction;

#[async_trait(?Send)]
impl Action for RawAction {
    async fn run(&self, ctx: ActionContext) -> Result<ActionResult> {
        if ctx.value.is_empty() {
            return Ok(ActionResult::empty());
        }
        let data: Value = serde_json::from_str(&ctx.value)?;
        dlog!(ctx, "Parsed JSON input {}", data);
        Ok(ActionResult::with_data(data))
    }
}
