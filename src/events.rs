//! Engine lifecycle events.

use markup5ever_rcdom::Handle;
use serde_json::Value;
use std::fmt;

use crate::error::SharedError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Trigger,
    HtmlChange,
    Error,
}

/// Events delivered to subscribers registered with `Hyperions::on`
#[derive(Clone)]
pub enum EngineEvent {
    /// An element was triggered, `trigger` names the event (`manual` for host calls)
    Trigger { target: Handle, trigger: String },
    /// A template instance was placed in the document
    HtmlChange { new_element: Handle },
    /// A spawned pipeline failed
    Error {
        error: SharedError,
        params: Option<Value>,
    },
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Trigger { .. } => EventKind::Trigger,
            Self::HtmlChange { .. } => EventKind::HtmlChange,
            Self::Error { .. } => EventKind::Error,
        }
    }
}

impl fmt::Debug for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trigger { target, trigger } => f
                .debug_struct("Trigger")
                .field("target", &crate::dom::describe(target))
                .field("trigger", trigger)
                .finish(),
            Self::HtmlChange { new_element } => f
                .debug_struct("HtmlChange")
                .field("new_element", &crate::dom::describe(new_element))
                .finish(),
            Self::Error { error, params } => f
                .debug_struct("Error")
                .field("error", error)
                .field("params", params)
                .finish(),
        }
    }
}

/// Subscriber callback
pub type Listener = std::rc::Rc<dyn Fn(&EngineEvent)>;
