//! Trigger declarations and the engine side tables backing them.
//!
//! Listeners and debounce timers are not stored on the elements: the engine
//! keeps them in tables keyed by node identity, holding weak references so a
//! removed subtree does not stay alive because it was once bound.

use markup5ever_rcdom::{Handle, Node};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::config::Options;
use crate::declarations::{self, Directive};
use crate::config::dlog;
use crate::dom;
use crate::resolve::decode_param;
use crate::split::better_split;

/// Trigger value disabling every listener
pub const NO_TRIGGER: &str = "none";

/// Flags read from `hyp:trigger` next to the event names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Unregister the listeners after the first run
    pub once: bool,
    /// Trigger immediately on setup
    pub load: bool,
    /// Debounce delay in milliseconds
    pub after: Option<u64>,
    /// Listen on the named fields of the element instead of the element
    pub is_form: bool,
}

/// Parsed `hyp:trigger` declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Triggers {
    pub events: Vec<String>,
    pub modifiers: Modifiers,
}

impl Triggers {
    /// `hyp:trigger="none"`
    pub fn is_disabled(&self) -> bool {
        self.events.first().map(String::as_str) == Some(NO_TRIGGER)
    }
}

pub fn parse_triggers(element: &Handle, options: &Options) -> Triggers {
    let declared = declarations::value(element, Directive::Trigger).unwrap_or_default();
    let mut triggers = Triggers::default();

    for item in better_split(&declared) {
        let param = decode_param(&item);
        let modifier = param.prefix.clone().unwrap_or_else(|| param.value.clone());
        match modifier.as_str() {
            "load" => {
                dlog!(options, "setup: modifier load");
                triggers.modifiers.load = true;
            }
            "once" => {
                dlog!(options, "setup: modifier once");
                triggers.modifiers.once = true;
            }
            "after" => match param.value.parse::<u64>() {
                Ok(delay) => {
                    dlog!(options, "setup: using dedup with value {}", delay);
                    triggers.modifiers.after = Some(delay);
                }
                Err(_) => tracing::warn!("trigger: invalid delay `{}` ignored", item),
            },
            "form" => {
                triggers.modifiers.is_form = true;
                triggers.events.push(param.value);
            }
            _ => triggers.events.push(item),
        }
    }

    if declared == NO_TRIGGER {
        dlog!(options, "setup: trigger set to \"none\", skipping...");
        triggers.events = vec![NO_TRIGGER.to_string()];
        return triggers;
    }

    if triggers.events.is_empty() {
        let default = if dom::has_tag(element, "form") { "submit" } else { "click" };
        triggers.events.push(default.to_string());
    }

    triggers
}

// ═══════════════════════════════════════════════════════════════════════════════
// LISTENER TABLE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
struct Binding {
    event: String,
    owner: Weak<Node>,
}

#[derive(Debug)]
struct ListenerEntry {
    node: Weak<Node>,
    bindings: Vec<Binding>,
}

impl ListenerEntry {
    fn is_for(&self, node: &Handle) -> bool {
        self.node.upgrade().is_some_and(|live| Rc::ptr_eq(&live, node))
    }
}

/// Event listeners registered by the engine, per target node
#[derive(Debug, Default)]
pub struct ListenerTable {
    entries: HashMap<usize, ListenerEntry>,
    set_up: HashMap<usize, Weak<Node>>,
}

impl ListenerTable {
    /// Register `owner` to be triggered when `event` reaches `target`.
    ///
    /// Returns `false` when the exact binding already exists.
    pub fn add(&mut self, target: &Handle, event: &str, owner: &Handle) -> bool {
        let key = dom::node_key(target);
        let entry = self.entries.entry(key).or_insert_with(|| ListenerEntry {
            node: Rc::downgrade(target),
            bindings: Vec::new(),
        });

        // the address was reused by a new node, drop what the dead one had
        if !entry.is_for(target) {
            entry.node = Rc::downgrade(target);
            entry.bindings.clear();
        }

        let exists = entry.bindings.iter().any(|binding| {
            binding.event == event
                && binding.owner.upgrade().is_some_and(|live| Rc::ptr_eq(&live, owner))
        });
        if exists {
            return false;
        }

        entry.bindings.push(Binding {
            event: event.to_string(),
            owner: Rc::downgrade(owner),
        });
        true
    }

    /// Record that `owner` had its triggers set up, `false` when it already had
    pub fn mark_set_up(&mut self, owner: &Handle) -> bool {
        let key = dom::node_key(owner);
        if let Some(existing) = self.set_up.get(&key) {
            if existing.upgrade().is_some_and(|live| Rc::ptr_eq(&live, owner)) {
                return false;
            }
        }
        self.set_up.insert(key, Rc::downgrade(owner));
        true
    }

    /// Owners listening for `event` on `target`
    pub fn owners(&self, target: &Handle, event: &str) -> Vec<Handle> {
        let Some(entry) = self.entries.get(&dom::node_key(target)) else {
            return Vec::new();
        };
        if !entry.is_for(target) {
            return Vec::new();
        }
        entry
            .bindings
            .iter()
            .filter(|binding| binding.event == event)
            .filter_map(|binding| binding.owner.upgrade())
            .collect()
    }

    /// Remove every binding of `owner` for the given events, wherever it listens
    pub fn remove_owner(&mut self, owner: &Handle, events: &[String]) {
        for entry in self.entries.values_mut() {
            entry.bindings.retain(|binding| {
                let same_owner = binding
                    .owner
                    .upgrade()
                    .is_some_and(|live| Rc::ptr_eq(&live, owner));
                !(same_owner && events.contains(&binding.event))
            });
        }
        self.prune();
    }

    /// Drop entries whose node or owners are gone
    pub fn prune(&mut self) {
        self.entries.retain(|_, entry| {
            entry.bindings.retain(|binding| binding.owner.strong_count() > 0);
            entry.node.strong_count() > 0 && !entry.bindings.is_empty()
        });
        self.set_up.retain(|_, owner| owner.strong_count() > 0);
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(|entry| entry.bindings.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DEBOUNCE TIMERS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
struct Timer {
    node: Weak<Node>,
    due: u64,
    seq: u64,
    step: String,
}

/// A timer that reached its due time
#[derive(Debug, Clone)]
pub struct DueTimer {
    pub element: Handle,
    pub step: String,
    pub due: u64,
}

/// Pending debounce timers, at most one per element
#[derive(Debug, Default)]
pub struct TimerTable {
    timers: HashMap<usize, Timer>,
    next_seq: u64,
}

impl TimerTable {
    /// Schedule `step` for `element` at `due`, replacing a pending timer.
    ///
    /// Returns `true` when a pending timer was cancelled.
    pub fn schedule(&mut self, element: &Handle, due: u64, step: &str) -> bool {
        let seq = self.next_seq;
        self.next_seq += 1;
        let replaced = self.cancel(element);
        self.timers.insert(
            dom::node_key(element),
            Timer {
                node: Rc::downgrade(element),
                due,
                seq,
                step: step.to_string(),
            },
        );
        replaced
    }

    pub fn cancel(&mut self, element: &Handle) -> bool {
        let key = dom::node_key(element);
        let live = self
            .timers
            .get(&key)
            .is_some_and(|timer| timer.node.upgrade().is_some_and(|node| Rc::ptr_eq(&node, element)));
        self.timers.remove(&key);
        live
    }

    /// Earliest due time among live timers
    pub fn next_due(&self) -> Option<u64> {
        self.timers
            .values()
            .filter(|timer| timer.node.strong_count() > 0)
            .map(|timer| timer.due)
            .min()
    }

    /// Remove and return the earliest timer due at or before `now`
    pub fn pop_due(&mut self, now: u64) -> Option<DueTimer> {
        self.timers.retain(|_, timer| timer.node.strong_count() > 0);
        let key = self
            .timers
            .iter()
            .filter(|(_, timer)| timer.due <= now)
            .min_by_key(|(_, timer)| (timer.due, timer.seq))
            .map(|(key, _)| *key)?;
        let timer = self.timers.remove(&key)?;
        Some(DueTimer {
            element: timer.node.upgrade()?,
            step: timer.step,
            due: timer.due,
        })
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
