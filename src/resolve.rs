//! Expression Resolver
//!
//! The markup micro-language:
//! - `prefix:value` parameters (`decode_param`)
//! - dotted paths, optionally rooted at the current loop node with `this`
//!   (`find_value`)
//! - `{path}` interpolation inside strings (`parse_value`)
//!
//! Resolution never fails hard: a path that walks into a scalar or a missing
//! key simply yields `None`.

use im::Vector;
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;
use std::fmt;

lazy_static! {
    /// `{expr}` interpolation span, non-greedy like the markup authors expect
    static ref TEMPLATE_SPAN_RE: Regex = Regex::new(r"\{(.*?)\}").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// PATH CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// One step into the data snapshot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

/// Where in the data snapshot the current subtree is rooted.
///
/// Backed by a persistent vector: extending a context returns a new one and
/// leaves the original (and every sibling branch holding it) untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathContext {
    segments: Vector<PathSegment>,
}

impl PathContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(&self, segment: impl Into<PathSegment>) -> Self {
        let mut segments = self.segments.clone();
        segments.push_back(segment.into());
        Self { segments }
    }

    /// Append every dot-separated part of `fragment` as a key segment
    pub fn with_dotted(&self, fragment: &str) -> Self {
        let mut segments = self.segments.clone();
        for part in fragment.split('.').filter(|part| !part.is_empty()) {
            segments.push_back(PathSegment::Key(part.to_string()));
        }
        Self { segments }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PathSegment> {
        self.segments.iter()
    }
}

impl<S: Into<PathSegment>> FromIterator<S> for PathContext {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for PathContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.segments.iter().map(ToString::to_string).collect();
        write!(f, "[{}]", parts.join("."))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAVIGATION
// ═══════════════════════════════════════════════════════════════════════════════

fn step<'a>(value: &'a Value, segment: &PathSegment) -> Option<&'a Value> {
    match (value, segment) {
        (Value::Object(map), PathSegment::Key(key)) => map.get(key),
        (Value::Object(map), PathSegment::Index(index)) => map.get(&index.to_string()),
        (Value::Array(items), PathSegment::Index(index)) => items.get(*index),
        (Value::Array(items), PathSegment::Key(key)) => {
            key.parse::<usize>().ok().and_then(|index| items.get(index))
        }
        _ => None,
    }
}

/// Walk a path context from `value`
pub fn get_path<'a>(value: &'a Value, path: &PathContext) -> Option<&'a Value> {
    path.iter().try_fold(value, step)
}

/// Walk a dotted path (`a.b.0.c`) from `value`
pub fn get_dotted<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, part| step(current, &PathSegment::Key(part.to_string())))
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARAMETERS
// ═══════════════════════════════════════════════════════════════════════════════

/// A decoded `prefix:value` parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub prefix: Option<String>,
    pub value: String,
}

/// Decode a parameter shaped like `prefix:value`.
///
/// Only the first colon is considered. When it is escaped (`\:`) the backslash
/// is removed and the whole string is the value. `http`/`https` are never
/// treated as a prefix so URLs pass through whole.
pub fn decode_param(input: &str) -> Param {
    let Some(index) = input.find(':') else {
        return Param {
            prefix: None,
            value: input.to_string(),
        };
    };

    if input[..index].ends_with('\\') {
        return Param {
            prefix: None,
            value: format!("{}{}", &input[..index - 1], &input[index..]),
        };
    }

    let prefix = &input[..index];
    if prefix == "http" || prefix == "https" {
        return Param {
            prefix: None,
            value: input.to_string(),
        };
    }

    Param {
        prefix: Some(prefix.to_string()),
        value: input[index + 1..].to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VALUE RESOLUTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Find a value in `data` for `key`, relative to the current path context.
///
/// `this` is the node at `path` (or `data` itself when that node is missing),
/// `this.rest` resolves `rest` from there. Anything else is a dotted path from
/// the root of `data`.
pub fn find_value<'a>(key: &str, data: &'a Value, path: &PathContext) -> Option<&'a Value> {
    if key == "this" || key.starts_with("this.") {
        let node = match get_path(data, path) {
            Some(Value::Null) | None => data,
            Some(node) => node,
        };
        return match key.strip_prefix("this.") {
            Some(rest) => get_dotted(node, rest),
            None => Some(node),
        };
    }

    if key.is_empty() || !(data.is_object() || data.is_array()) {
        return None;
    }

    get_dotted(data, key)
}

/// Resolve a "value string".
///
/// Without braces the string is a path and the raw value is returned (any
/// JSON type). Otherwise every `{path}` span is substituted with the
/// stringified value (empty when unresolved) and the result is a string.
pub fn parse_value(input: &str, data: &Value, path: &PathContext) -> Option<Value> {
    if !input.contains('{') {
        return find_value(input, data, path).cloned();
    }

    let rendered = TEMPLATE_SPAN_RE.replace_all(input, |caps: &Captures| {
        find_value(&caps[1], data, path)
            .map(to_display_string)
            .unwrap_or_default()
    });

    Some(Value::String(rendered.into_owned()))
}

/// Stringify a value the way the markup expects (`String(x)` semantics)
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => {
                format!("{:.0}", f)
            }
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Null => String::new(),
                other => to_display_string(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// General truthiness: missing, null, false, 0, NaN and "" are falsy
pub fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
