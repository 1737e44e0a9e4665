//! Attribute handlers: how a rendered element reacts to its markup.
//!
//! The renderer looks up a handler for each `hyp:<key>` attribute of an element
//! (plus the wildcard `*`, run on every element) and lets it rewrite the
//! element. A handler may stop the walk from descending into the element, in
//! which case it is responsible for the subtree itself.

mod conditional;
mod generic;
mod loops;

use markup5ever_rcdom::Handle;
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

use crate::config::Options;
use crate::dom;
use crate::engine::Hyperions;
use crate::error::Result;
use crate::resolve::PathContext;

pub use conditional::ConditionalHandler;
pub use generic::GenericHandler;
pub use loops::LoopHandler;

/// Key of the handler applied to every element
pub const WILDCARD: &str = "*";

/// Position of a subtree in the data and the options it renders with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderContext {
    pub path: PathContext,
    pub options: Options,
}

impl RenderContext {
    pub fn new(options: Options) -> Self {
        Self {
            path: PathContext::new(),
            options,
        }
    }
}

/// Data and path a handler renders a subtree with instead of its own
#[derive(Debug, Clone)]
pub struct RenderOverride {
    pub path: PathContext,
    pub data: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeOutcome {
    /// `Some(false)` keeps the walk out of the element
    pub continue_walk: Option<bool>,
}

impl AttributeOutcome {
    pub fn proceed() -> Self {
        Self::default()
    }

    pub fn halt() -> Self {
        Self {
            continue_walk: Some(false),
        }
    }

    pub fn continues(&self) -> bool {
        self.continue_walk.unwrap_or(true)
    }
}

pub struct AttributeContext<'a> {
    pub engine: &'a Hyperions,
    pub element: &'a Handle,
    pub data: &'a Value,
    pub context: &'a RenderContext,
}

impl AttributeContext<'_> {
    /// Render `element` (or only its children when `recurse_self` is false),
    /// optionally with another path and data
    pub fn process(
        &self,
        element: &Handle,
        with: Option<RenderOverride>,
        recurse_self: bool,
    ) -> Result<()> {
        match with {
            Some(RenderOverride { path, data }) => {
                let context = RenderContext {
                    path,
                    options: self.context.options.clone(),
                };
                self.render(element, &data, &context, recurse_self)
            }
            None => self.render(element, self.data, self.context, recurse_self),
        }
    }

    fn render(
        &self,
        element: &Handle,
        data: &Value,
        context: &RenderContext,
        recurse_self: bool,
    ) -> Result<()> {
        if recurse_self {
            return self.engine.fill_element(element, data, context);
        }
        for child in dom::child_elements(element) {
            if dom::is_child_of(&child, element) {
                self.engine.fill_element(&child, data, context)?;
            }
        }
        Ok(())
    }

    pub fn log(&self, message: fmt::Arguments<'_>) {
        self.context.options.log(message);
    }
}

pub trait AttributeHandler {
    fn apply(&self, ctx: &AttributeContext<'_>) -> Result<AttributeOutcome>;
}

impl<F> AttributeHandler for F
where
    F: Fn(&AttributeContext<'_>) -> Result<AttributeOutcome>,
{
    fn apply(&self, ctx: &AttributeContext<'_>) -> Result<AttributeOutcome> {
        self(ctx)
    }
}

/// Handlers every engine starts with
pub fn builtin_handlers() -> Vec<(&'static str, Rc<dyn AttributeHandler>)> {
    vec![
        (WILDCARD, Rc::new(GenericHandler)),
        ("loop", Rc::new(LoopHandler)),
        ("if", Rc::new(ConditionalHandler::new(false))),
        ("else", Rc::new(ConditionalHandler::new(true))),
    ]
}
