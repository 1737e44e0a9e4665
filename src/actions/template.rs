//! `template:<templateQuery> [locationQuery] [placement]`
//!
//! Instantiates a `<template>` with the chain data and places the result
//! relative to a location element (the origin when no location is given).

use async_trait::async_trait;
use markup5ever_rcdom::Handle;
use serde_json::Value;
use std::str::FromStr;

use super::{Action, ActionContext, ActionResult};
use crate::declarations::{self, Directive};
use crate::config::dlog;
use crate::dom;
use crate::engine::Hyperions;
use crate::error::{HyperionsError, Result};
use crate::events::EngineEvent;
use crate::split::better_split;

/// Where template instances go relative to the location element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    /// Replace the location itself
    Outer,
    /// Replace the location's children
    #[default]
    Inner,
    /// Add after the location's children
    Append,
}

impl FromStr for Placement {
    type Err = HyperionsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "outer" => Ok(Self::Outer),
            "inner" => Ok(Self::Inner),
            "append" => Ok(Self::Append),
            other => Err(HyperionsError::InvalidPlacement(other.to_string())),
        }
    }
}

impl Placement {
    pub fn is_keyword(s: &str) -> bool {
        s.parse::<Placement>().is_ok()
    }

    /// Put `instances` in place, announcing each one
    pub fn place(self, engine: &Hyperions, location: &Handle, instances: &[Handle]) {
        match self {
            Placement::Outer => dom::replace_with(location, instances),
            Placement::Inner => {
                dom::clear_children(location);
                for instance in instances {
                    dom::append_child(location, instance);
                }
            }
            Placement::Append => {
                for instance in instances {
                    dom::append_child(location, instance);
                }
            }
        }
        for instance in instances {
            engine.emit(&EngineEvent::HtmlChange {
                new_element: instance.clone(),
            });
        }
    }
}

/// Entries rendered by a multiple producer
fn entries(data: &Value) -> Vec<&Value> {
    match data {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    }
}

pub struct TemplateAction;

#[async_trait(?Send)]
impl Action for TemplateAction {
    async fn run(&self, ctx: ActionContext) -> Result<ActionResult> {
        let mut tokens = better_split(&ctx.value).into_iter();
        let template_query = tokens.next().unwrap_or_default();
        let mut location_query = tokens.next();
        let mut placement = tokens.next();
        dlog!(
            ctx,
            "output: Template action detected {} {:?} {:?}",
            template_query,
            location_query,
            placement
        );

        let template = ctx.engine.locate(ctx.origin.as_ref(), &template_query)?;
        if !dom::has_tag(&template, "template") {
            return Err(HyperionsError::NotATemplate {
                query: template_query,
                tag: dom::tag_name(&template).unwrap_or_default(),
            });
        }

        if placement.is_none() && location_query.as_deref().is_some_and(Placement::is_keyword) {
            dlog!(ctx, "output: only two args found, moving locationQuery to placement");
            placement = location_query.take();
        }
        let placement: Placement = match placement {
            Some(keyword) => keyword.parse()?,
            None => Placement::default(),
        };

        let multiple = ctx
            .origin
            .as_ref()
            .is_some_and(|origin| declarations::read(origin, Directive::Multiple).is_some());

        let instances = if multiple {
            entries(&ctx.data)
                .into_iter()
                .map(|entry| ctx.engine.fill_template(&template, entry, &ctx.options))
                .collect::<Result<Vec<_>>>()?
        } else {
            vec![ctx.engine.fill_template(&template, &ctx.data, &ctx.options)?]
        };

        let location = match location_query {
            Some(query) => ctx.engine.locate(ctx.origin.as_ref(), &query)?,
            None => ctx
                .origin
                .clone()
                .ok_or_else(|| HyperionsError::NoOrigin(ctx.value.clone()))?,
        };

        dlog!(ctx, "output: placing new content with placement {:?}", placement);
        placement.place(&ctx.engine, &location, &instances);

        Ok(ActionResult::empty())
    }
}
