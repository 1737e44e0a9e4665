//! # Hyperions
//!
//! Declarative, attribute-driven data binding over an HTML tree.
//!
//! Markup declares what happens:
//!
//! ```html
//! <button hyp:action1="get:/api/users" hyp:action2="template:#user-row #users">
//!   Load users
//! </button>
//! <template id="user-row"><li hyp:attr="text:name"></li></template>
//! <ul id="users"></ul>
//! ```
//!
//! and the engine wires it up:
//!
//! - **Triggers** (`hyp:trigger`): which events start an element's chain,
//!   with `once`, `load`, `after:<ms>` and `form:<event>` modifiers.
//! - **Action chains** (`hyp:action<N>`): named steps run in order, each one
//!   receiving the previous step's data (`raw`, `get`/`post`/..., `template`,
//!   `fill`, `hyp`, `run`, or any host registered prefix).
//! - **Rendering**: `hyp:attr`, `hyp:loop`, `hyp:if`/`hyp:else` resolve
//!   dotted paths and `{path}` interpolation against the data, relative to a
//!   path context that follows loops down the tree.
//!
//! The legacy `data-*` dialect (`data-input`, `data-output`, `data-loop`, ...)
//! is still understood and logs a deprecation warning on the
//! `hyperions::deprecated` tracing target.
//!
//! ## Invariants
//!
//! 1. **One-shot renders**: a render pulls from a data snapshot and rebuilds
//!    the subtree, nothing stays bound to the data afterwards.
//! 2. **Path context**: every loop copy resolves `this` against its own entry,
//!    extending the context never changes the one a sibling holds.
//! 3. **Chains are re-read**: steps and options are read from the element on
//!    every step, markup edits during a chain take effect on the next step.
//! 4. **Soft misses**: an unknown action prefix, a loop over a non-array or an
//!    unresolved binding is logged and skipped, never an error.

mod actions;
mod attrs;
mod config;
mod declarations;
mod dom;
mod engine;
mod error;
mod events;
mod locate;
mod params;
mod resolve;
mod selector;
mod split;
mod transport;
mod trigger;

#[cfg(test)]
mod engine_tests;
#[cfg(test)]
mod test_support;

pub use actions::{
    builtin_actions, Action, ActionContext, ActionResult, FnAction, Placement,
};
pub use attrs::{
    builtin_handlers, AttributeContext, AttributeHandler, AttributeOutcome, RenderContext,
    RenderOverride, WILDCARD,
};
pub use config::{EngineConfig, Options};
pub use declarations::{Declaration, Dialect, Directive, COPY_MARKER};
pub use engine::{DispatchOutcome, Hyperions, LOAD_TRIGGER, MANUAL_TRIGGER};
pub use error::{ErrorKind, HyperionsError, Result, SharedError};
pub use events::{EngineEvent, EventKind};
pub use locate::locate;
pub use params::parse_params;
pub use resolve::{
    decode_param, find_value, is_truthy, parse_value, to_display_string, Param, PathContext,
    PathSegment,
};
pub use selector::Selector;
pub use split::better_split;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, RequestBody, Transport};
pub use trigger::{parse_triggers, Modifiers, Triggers};

/// DOM helpers over the `markup5ever_rcdom` tree the engine binds against
pub mod html {
    pub use crate::dom::*;
}
