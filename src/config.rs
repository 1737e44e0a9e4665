//! Engine configuration and per-element execution options.

use markup5ever_rcdom::Handle;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::declarations::{self, Directive};
use crate::error::{HyperionsError, Result};
use crate::resolve::decode_param;
use crate::split::better_split;

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Host supplied configuration, fixed for the lifetime of an engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Location of the current document, relative request URLs resolve against it
    pub base_url: String,
    /// Keep binding attributes after rendering when the element options are silent
    pub keep_data_attributes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost/".to_string(),
            keep_data_attributes: false,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| HyperionsError::Config(e.to_string()))
    }

    /// Parsed document location
    pub fn location(&self) -> Result<Url> {
        Url::parse(&self.base_url).map_err(|e| HyperionsError::Config(format!(
            "baseUrl `{}` is not an absolute URL: {}",
            self.base_url, e
        )))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXECUTION OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

static DEBUG_TAG_COUNTER: AtomicU64 = AtomicU64::new(1);

fn generate_debug_tag() -> String {
    let id = DEBUG_TAG_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("hyp-{}", id)
}

/// Options declared on an element with `hyp:options` / `hyp:debug`.
///
/// Parsed again on every trigger and render, never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    /// Log tag, enables trace logging for the element when set
    pub debug: Option<String>,
    /// Keep binding attributes after render
    pub keep_data_attributes: Option<bool>,
    /// Merge previous step data into the next step instead of replacing it
    pub keep_params: Option<bool>,
}

impl Options {
    pub fn parse(element: &Handle) -> Self {
        let mut options = Options {
            debug: declarations::value(element, Directive::Debug).map(|tag| {
                if tag.is_empty() {
                    generate_debug_tag()
                } else {
                    tag
                }
            }),
            ..Default::default()
        };

        let Some(declared) = declarations::value(element, Directive::Options) else {
            return options;
        };

        for item in better_split(&declared) {
            let param = decode_param(&item);
            let Some(key) = param.prefix else {
                continue;
            };
            let flag = match param.value.as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            };
            match (key.as_str(), flag) {
                ("keepParams", Some(flag)) => options.keep_params = Some(flag),
                ("keepDataAttributes", Some(flag)) => options.keep_data_attributes = Some(flag),
                ("debug", _) => options.debug = Some(param.value),
                _ => warn!("options: unknown option `{}` ignored", item),
            }
        }

        options
    }

    pub fn keep_params(&self) -> bool {
        self.keep_params.unwrap_or(false)
    }

    /// Set `keep_data_attributes` only when the element did not decide
    pub fn with_default_keep_data_attributes(mut self, keep: bool) -> Self {
        self.keep_data_attributes.get_or_insert(keep);
        self
    }

    /// Emit a trace record when the element opted into debugging
    pub fn log(&self, message: fmt::Arguments<'_>) {
        if let Some(tag) = &self.debug {
            debug!(tag = %tag, "{}", message);
        }
    }
}

/// `dlog!(options, "format", args..)`, only logs for elements with a debug tag
macro_rules! dlog {
    ($options:expr, $($arg:tt)*) => {
        $options.log(format_args!($($arg)*))
    };
}
pub(crate) use dlog;
