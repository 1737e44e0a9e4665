//! Markup declarations.
//!
//! Two dialects describe the same things: the current `hyp:*` attributes and
//! the deprecated `data-*` ones. Both are read here into one representation so
//! the rest of the engine never cares which one the author used. Reading a
//! legacy attribute logs a deprecation warning every time it is exercised.

use lazy_static::lazy_static;
use markup5ever_rcdom::Handle;
use regex::Regex;
use tracing::warn;

use crate::dom;

lazy_static! {
    /// `hyp:action`, `hyp:action1`, `hyp:action12`, ...
    static ref ACTION_ATTR_RE: Regex = Regex::new(r"^hyp:action(\d*)$").unwrap();
}

/// Legacy first chain step
pub const LEGACY_INPUT: &str = "data-input";
/// Legacy second chain step
pub const LEGACY_OUTPUT: &str = "data-output";

/// Marker put on generated loop clones
pub const COPY_MARKER: &str = "hyp:copy";

/// Every legacy attribute name, used to detect bound elements
const LEGACY_ATTRIBUTES: &[&str] = &[
    LEGACY_INPUT,
    LEGACY_OUTPUT,
    "data-params",
    "data-trigger",
    "data-options",
    "data-path",
    "data-multiple",
    "data-attribute",
    "data-loop",
    "data-if",
    "data-else",
    "data-debug",
];

/// What an attribute declares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Trigger,
    Options,
    Path,
    Multiple,
    Attributes,
    Loop,
    If,
    Else,
    Debug,
    Params,
    Name,
}

impl Directive {
    fn current_names(self) -> &'static [&'static str] {
        match self {
            Self::Trigger => &["hyp:trigger"],
            Self::Options => &["hyp:options"],
            Self::Path => &["hyp:path"],
            Self::Multiple => &["hyp:multiple"],
            Self::Attributes => &["hyp:attr", "hyp:attribute", "hyp:attributes"],
            Self::Loop => &["hyp:loop"],
            Self::If => &["hyp:if"],
            Self::Else => &["hyp:else"],
            Self::Debug => &["hyp:debug"],
            Self::Params | Self::Name => &[],
        }
    }

    fn legacy_name(self) -> &'static str {
        match self {
            Self::Trigger => "data-trigger",
            Self::Options => "data-options",
            Self::Path => "data-path",
            Self::Multiple => "data-multiple",
            Self::Attributes => "data-attribute",
            Self::Loop => "data-loop",
            Self::If => "data-if",
            Self::Else => "data-else",
            Self::Debug => "data-debug",
            Self::Params => "data-params",
            Self::Name => "data-name",
        }
    }

    /// Every attribute name carrying this directive, both dialects
    pub fn attribute_names(self) -> Vec<&'static str> {
        let mut names = self.current_names().to_vec();
        names.push(self.legacy_name());
        names
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Current,
    Legacy,
}

/// A directive read from an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub attribute: String,
    pub value: String,
    pub dialect: Dialect,
}

pub(crate) fn deprecated(attribute: &str, replacement: &str) {
    warn!(
        target: "hyperions::deprecated",
        "Hyperions attribute \"{}\" is deprecated, use \"{}\" instead",
        attribute,
        replacement
    );
}

/// Read a directive, preferring the current dialect
pub fn read(element: &Handle, directive: Directive) -> Option<Declaration> {
    for name in directive.current_names() {
        if let Some(value) = dom::get_attribute(element, name) {
            return Some(Declaration {
                attribute: name.to_string(),
                value,
                dialect: Dialect::Current,
            });
        }
    }

    let legacy = directive.legacy_name();
    let value = dom::get_attribute(element, legacy)?;
    let replacement = match directive {
        Directive::Name => "name",
        Directive::Params => "hyp:action{number}",
        _ => directive.current_names()[0],
    };
    deprecated(legacy, replacement);
    Some(Declaration {
        attribute: legacy.to_string(),
        value,
        dialect: Dialect::Legacy,
    })
}

/// Shorthand for the declared value
pub fn value(element: &Handle, directive: Directive) -> Option<String> {
    read(element, directive).map(|declaration| declaration.value)
}

/// Remove a directive in both dialects
pub fn strip(element: &Handle, directive: Directive) {
    for name in directive.attribute_names() {
        dom::remove_attribute(element, name);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ACTION CHAIN
// ═══════════════════════════════════════════════════════════════════════════════

fn action_index(name: &str) -> Option<u32> {
    let caps = ACTION_ATTR_RE.captures(name)?;
    Some(caps[1].parse().unwrap_or(0))
}

pub fn is_action_attribute(name: &str) -> bool {
    ACTION_ATTR_RE.is_match(name) || name == LEGACY_INPUT || name == LEGACY_OUTPUT
}

/// Chain steps declared on an element, as attribute names.
///
/// `hyp:action<N>` ordered by `N` (bare `hyp:action` is 0). Without those the
/// legacy `data-input`/`data-output` pair is used when present.
pub fn action_steps(element: &Handle) -> Vec<String> {
    let mut steps: Vec<(u32, String)> = dom::attribute_names(element)
        .into_iter()
        .filter_map(|name| action_index(&name).map(|index| (index, name)))
        .collect();
    steps.sort();

    if !steps.is_empty() {
        return steps.into_iter().map(|(_, name)| name).collect();
    }

    if dom::has_attribute(element, LEGACY_INPUT) || dom::has_attribute(element, LEGACY_OUTPUT) {
        return vec![LEGACY_INPUT.to_string(), LEGACY_OUTPUT.to_string()];
    }

    Vec::new()
}

/// Step following `current` in a freshly discovered chain
pub fn next_step(current: &str, steps: &[String]) -> Option<String> {
    if current == LEGACY_INPUT {
        return Some(LEGACY_OUTPUT.to_string());
    }
    if current == LEGACY_OUTPUT {
        return None;
    }
    let position = steps.iter().position(|step| step == current)?;
    steps.get(position + 1).cloned()
}

// ═══════════════════════════════════════════════════════════════════════════════
// RENDERING
// ═══════════════════════════════════════════════════════════════════════════════

/// Attribute handler key for an attribute name (`hyp:loop` -> `loop`)
pub fn handler_key(attribute: &str) -> Option<String> {
    if let Some(key) = attribute.strip_prefix("hyp:") {
        return Some(key.to_string());
    }
    let key = match attribute {
        "data-loop" => "loop",
        "data-if" => "if",
        "data-else" => "else",
        _ => return None,
    };
    deprecated(attribute, &format!("hyp:{}", key));
    Some(key.to_string())
}

/// Does the element carry any binding markup
pub fn has_markup(element: &Handle) -> bool {
    dom::attribute_names(element)
        .iter()
        .any(|name| name.starts_with("hyp:") || LEGACY_ATTRIBUTES.contains(&name.as_str()))
}

/// Does the element declare something to trigger
pub fn declares_chain(element: &Handle) -> bool {
    !action_steps(element).is_empty()
        || dom::has_attribute(element, "hyp:trigger")
        || dom::has_attribute(element, "data-trigger")
}
