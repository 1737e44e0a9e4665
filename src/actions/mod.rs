//! Actions: the named steps of an element's chain.
//!
//! An action receives the chain data and returns new data plus whether the
//! chain goes on. Actions are looked up by prefix in the engine registry, the
//! built-in set is registered by [`builtin_actions`].

mod fill;
mod hyp;
mod network;
mod raw;
mod run;
mod template;

use async_trait::async_trait;
use markup5ever_rcdom::Handle;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use crate::config::Options;
use crate::engine::Hyperions;
use crate::error::Result;

pub use fill::FillAction;
pub use hyp::HypAction;
pub use network::NetworkAction;
pub use raw::RawAction;
pub use run::RunAction;
pub use template::{Placement, TemplateAction};

/// Everything an action can see
#[derive(Clone)]
pub struct ActionContext {
    pub engine: Hyperions,
    /// Element whose chain is running, absent for host calls
    pub origin: Option<Handle>,
    /// Declared value, prefix removed
    pub value: String,
    /// Chain data for this step
    pub data: Value,
    /// Prefix the action was looked up with
    pub prefix: String,
    pub options: Options,
}

impl ActionContext {
    /// Trace output, only for elements with a debug tag
    pub fn log(&self, message: fmt::Arguments<'_>) {
        self.options.log(message);
    }
}

impl fmt::Debug for ActionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionContext")
            .field("origin", &self.origin.as_ref().map(crate::dom::describe))
            .field("value", &self.value)
            .field("data", &self.data)
            .field("prefix", &self.prefix)
            .field("options", &self.options)
            .finish()
    }
}

/// Result of one step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionResult {
    pub data: Option<Value>,
    /// `Some(false)` stops the chain, absent means continue
    pub continue_chain: Option<bool>,
}

impl ActionResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_data(data: Value) -> Self {
        Self {
            data: Some(data),
            continue_chain: None,
        }
    }

    /// Stop the chain after this step
    pub fn halt() -> Self {
        Self {
            data: None,
            continue_chain: Some(false),
        }
    }

    pub fn continues(&self) -> bool {
        self.continue_chain.unwrap_or(true)
    }
}

#[async_trait(?Send)]
pub trait Action {
    async fn run(&self, ctx: ActionContext) -> Result<ActionResult>;
}

/// Adapter turning an async closure into an [`Action`]
pub struct FnAction<F>(pub F);

#[async_trait(?Send)]
impl<F, Fut> Action for FnAction<F>
where
    F: Fn(ActionContext) -> Fut + 'static,
    Fut: Future<Output = Result<ActionResult>> + 'static,
{
    async fn run(&self, ctx: ActionContext) -> Result<ActionResult> {
        (self.0)(ctx).await
    }
}

/// Actions every engine starts with
pub fn builtin_actions() -> Vec<(&'static str, Rc<dyn Action>)> {
    let network: Rc<dyn Action> = Rc::new(NetworkAction);
    vec![
        ("run", Rc::new(RunAction)),
        ("hyp", Rc::new(HypAction)),
        ("raw", Rc::new(RawAction)),
        ("get", network.clone()),
        ("post", network.clone()),
        ("put", network.clone()),
        ("delete", network.clone()),
        ("patch", network),
        ("fill", Rc::new(FillAction)),
        ("template", Rc::new(TemplateAction)),
    ]
}
