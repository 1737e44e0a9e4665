//! Error types for the binding engine
//!
//! Every failure the engine can raise maps onto one of four categories:
//! - Configuration: markup that can never work (bad placement, not a template, ...)
//! - NotFound: a locator query that matched nothing
//! - Request / Transport: network failures
//! - Data: payloads that are not valid JSON
//!
//! Soft misses (unknown action prefix, non-array loop source) are not errors,
//! they are logged and skipped.

use std::rc::Rc;

pub type Result<T> = std::result::Result<T, HyperionsError>;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum HyperionsError {
    /// Placement keyword other than `inner`, `outer` or `append`
    #[error("couldn't place elements, placement invalid `{0}`")]
    InvalidPlacement(String),

    /// Template query resolved to something that is not a `<template>`
    #[error("template not found using query `{query}` (found <{tag}>)")]
    NotATemplate { query: String, tag: String },

    /// Templates must have exactly one root element
    #[error("template MUST contain exactly one root element, found {0}")]
    TemplateRoots(usize),

    /// Network action without a URL
    #[error("missing URL for `{0}` request")]
    MissingUrl(String),

    /// Selector syntax outside the supported subset
    #[error("invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// URL that cannot be parsed or joined to the base location
    #[error("invalid URL `{url}`: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Engine configuration rejected at construction
    #[error("configuration error: {0}")]
    Config(String),

    /// Locator query matched nothing
    #[error("new location not found (origin: {origin}, query: {query})")]
    NotFound { origin: String, query: String },

    /// `this`-relative query without an origin element
    #[error("query `{0}` is relative to `this` but no origin element was given")]
    NoOrigin(String),

    /// HTTP status >= 400
    #[error("request to {url} returned a {status} error code")]
    Request { status: u16, url: String },

    /// Transport level failure (connection, body read, ...)
    #[error("transport failure: {0}")]
    Transport(String),

    /// Malformed JSON payload
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Error taxonomy used by hosts to decide how to react
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    NotFound,
    Request,
    Transport,
    Data,
}

impl HyperionsError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPlacement(_)
            | Self::NotATemplate { .. }
            | Self::TemplateRoots(_)
            | Self::MissingUrl(_)
            | Self::InvalidSelector { .. }
            | Self::InvalidUrl { .. }
            | Self::Config(_) => ErrorKind::Configuration,
            Self::NotFound { .. } | Self::NoOrigin(_) => ErrorKind::NotFound,
            Self::Request { .. } => ErrorKind::Request,
            Self::Transport(_) => ErrorKind::Transport,
            Self::Json(_) => ErrorKind::Data,
        }
    }
}

/// Shared form handed to `error` event listeners
pub type SharedError = Rc<HyperionsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            HyperionsError::InvalidPlacement("sideways".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            HyperionsError::NotFound {
                origin: "body".into(),
                query: "#nope".into()
            }
            .kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            HyperionsError::Request {
                status: 404,
                url: "http://localhost/".into()
            }
            .kind(),
            ErrorKind::Request
        );
    }

    #[test]
    fn test_error_messages() {
        let err = HyperionsError::Request {
            status: 500,
            url: "http://localhost/api".into(),
        };
        assert_eq!(
            err.to_string(),
            "request to http://localhost/api returned a 500 error code"
        );
    }
}
