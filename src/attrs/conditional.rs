use super::{AttributeContext, AttributeHandler, AttributeOutcome};
use crate::declarations::{self, Directive};
use crate::config::dlog;
use crate::dom;
use crate::error::Result;
use crate::resolve::{find_value, is_truthy};

/// `hyp:if` shows the element when the value is truthy, `hyp:else` when it is falsy.
///
/// A hidden element is left alone: its subtree is not rendered. A shown one
/// is unhidden and the walk goes on into it.
pub struct ConditionalHandler {
    negate: bool,
}

impl ConditionalHandler {
    pub fn new(negate: bool) -> Self {
        Self { negate }
    }

    fn directive(&self) -> Directive {
        if self.negate {
            Directive::Else
        } else {
            Directive::If
        }
    }
}

impl AttributeHandler for ConditionalHandler {
    fn apply(&self, ctx: &AttributeContext<'_>) -> Result<AttributeOutcome> {
        let element = ctx.element;
        let Some(key) = declarations::value(element, self.directive()) else {
            return Ok(AttributeOutcome::proceed());
        };

        let truthy = is_truthy(find_value(&key, ctx.data, &ctx.context.path));
        let visible = truthy != self.negate;
        dlog!(ctx, "condition: `{}` is {}, visible: {}", key, truthy, visible);

        if !visible {
            dom::hide(element);
            return Ok(AttributeOutcome::halt());
        }

        dom::unhide(element);
        Ok(AttributeOutcome::proceed())
    }
}
