//! The binding engine.
//!
//! [`Hyperions`] owns everything that lives longer than one render: the action
//! and attribute registries, the listener and timer tables, the event
//! subscribers, the transport and the executor running action chains. It is a
//! cheap cloneable handle; actions and attribute handlers receive it so they
//! can render, locate and trigger in turn.
//!
//! ## Lifecycle
//!
//! 1. `init(body)` sets up triggers on every element declaring a chain
//! 2. an event reaches an element (`dispatch_event`), or the host calls `trigger`
//! 3. the chain is spawned on the local executor and runs step by step
//! 4. render actions walk subtrees through the attribute handlers
//! 5. freshly rendered subtrees are initialised again

use futures::executor::{LocalPool, LocalSpawner};
use futures::task::LocalSpawnExt;
use markup5ever_rcdom::Handle;
use reqwest::Url;
use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;
use tracing::{debug, error, warn};

use crate::actions::{self, Action, ActionContext, ActionResult, FnAction};
use crate::attrs::{self, AttributeContext, AttributeHandler, RenderContext, WILDCARD};
use crate::config::{EngineConfig, Options};
use crate::declarations::{self, Directive, Dialect, LEGACY_INPUT};
use crate::config::dlog;
use crate::dom;
use crate::error::{HyperionsError, Result};
use crate::events::{EngineEvent, EventKind, Listener};
use crate::locate;
use crate::params;
use crate::resolve::{decode_param, get_dotted, PathContext};
use crate::transport::{HttpTransport, Transport};
use crate::trigger::{parse_triggers, ListenerTable, TimerTable};

/// Trigger name reported for host initiated runs
pub const MANUAL_TRIGGER: &str = "manual";
/// Trigger name reported for `load` triggers
pub const LOAD_TRIGGER: &str = "load";

/// What happened to a dispatched event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOutcome {
    /// At least one listener ran
    pub handled: bool,
    /// A listener cancelled the browser default (form submission)
    pub default_prevented: bool,
}

struct Inner {
    document: Handle,
    body: Handle,
    config: EngineConfig,
    location: Url,
    actions: RefCell<HashMap<String, Rc<dyn Action>>>,
    attributes: RefCell<HashMap<String, Rc<dyn AttributeHandler>>>,
    subscribers: RefCell<HashMap<EventKind, Vec<Listener>>>,
    listeners: RefCell<ListenerTable>,
    timers: RefCell<TimerTable>,
    clock: Cell<u64>,
    transport: RefCell<Rc<dyn Transport>>,
    pool: RefCell<LocalPool>,
    spawner: LocalSpawner,
}

/// Handle to a binding engine
#[derive(Clone)]
pub struct Hyperions {
    inner: Rc<Inner>,
}

impl fmt::Debug for Hyperions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hyperions")
            .field("config", &self.inner.config)
            .field("actions", &self.inner.actions.borrow().len())
            .field("attributes", &self.inner.attributes.borrow().len())
            .field("now", &self.inner.clock.get())
            .finish()
    }
}

impl Hyperions {
    /// Create an engine over a parsed document, without setting up triggers
    pub fn new(document: Handle, config: EngineConfig) -> Result<Self> {
        let body = dom::find_body(&document)
            .ok_or_else(|| HyperionsError::Config("document has no <body>".to_string()))?;
        let location = config.location()?;

        let pool = LocalPool::new();
        let spawner = pool.spawner();

        let actions = actions::builtin_actions()
            .into_iter()
            .map(|(prefix, action)| (prefix.to_string(), action))
            .collect();
        let attributes = attrs::builtin_handlers()
            .into_iter()
            .map(|(key, handler)| (key.to_string(), handler))
            .collect();

        Ok(Self {
            inner: Rc::new(Inner {
                document,
                body,
                config,
                location,
                actions: RefCell::new(actions),
                attributes: RefCell::new(attributes),
                subscribers: RefCell::new(HashMap::new()),
                listeners: RefCell::new(ListenerTable::default()),
                timers: RefCell::new(TimerTable::default()),
                clock: Cell::new(0),
                transport: RefCell::new(Rc::new(HttpTransport::new())),
                pool: RefCell::new(pool),
                spawner,
            }),
        })
    }

    /// Parse `html`, create the engine and set up every trigger of the body
    pub fn setup(html: &str, config: EngineConfig) -> Result<Self> {
        debug!("Setting up Hyperions");
        let engine = Self::new(dom::parse_html(html), config)?;
        let body = engine.body();
        engine.init(&body);
        Ok(engine)
    }

    pub fn document(&self) -> Handle {
        self.inner.document.clone()
    }

    pub fn body(&self) -> Handle {
        self.inner.body.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Location relative request URLs resolve against
    pub fn location(&self) -> &Url {
        &self.inner.location
    }

    /// Current time of the engine clock, in milliseconds
    pub fn now(&self) -> u64 {
        self.inner.clock.get()
    }

    pub fn set_transport(&self, transport: impl Transport + 'static) -> &Self {
        *self.inner.transport.borrow_mut() = Rc::new(transport);
        self
    }

    pub fn transport(&self) -> Rc<dyn Transport> {
        self.inner.transport.borrow().clone()
    }

    /// Locate an element relative to `origin` (see [`locate::locate`])
    pub fn locate(&self, origin: Option<&Handle>, query: &str) -> Result<Handle> {
        locate::locate(&self.inner.body, origin, query)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // REGISTRIES
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn add_action(&self, prefix: &str, action: impl Action + 'static) -> &Self {
        self.inner
            .actions
            .borrow_mut()
            .insert(prefix.to_string(), Rc::new(action));
        self
    }

    /// Register an async closure as an action
    pub fn add_action_fn<F, Fut>(&self, prefix: &str, action: F) -> &Self
    where
        F: Fn(ActionContext) -> Fut + 'static,
        Fut: Future<Output = Result<ActionResult>> + 'static,
    {
        self.add_action(prefix, FnAction(action))
    }

    pub fn remove_action(&self, prefix: &str) -> bool {
        self.inner.actions.borrow_mut().remove(prefix).is_some()
    }

    pub fn has_action(&self, prefix: &str) -> bool {
        self.inner.actions.borrow().contains_key(prefix)
    }

    pub fn add_attribute(&self, key: &str, handler: impl AttributeHandler + 'static) -> &Self {
        self.inner
            .attributes
            .borrow_mut()
            .insert(key.to_string(), Rc::new(handler));
        self
    }

    pub fn remove_attribute(&self, key: &str) -> bool {
        self.inner.attributes.borrow_mut().remove(key).is_some()
    }

    /// Deprecated: register `action(origin, data, options)` as `run:<name>`
    pub fn add_output_action<F, Fut>(&self, name: &str, action: F) -> &Self
    where
        F: Fn(Option<Handle>, Value, Options) -> Fut + 'static,
        Fut: Future<Output = Result<Option<Value>>> + 'static,
    {
        declarations::deprecated("addOutputAction", "add_action(\"run:{name}\")");
        self.add_legacy_action(name, action)
    }

    /// Deprecated: register `action(origin, data, options)` as `run:<name>`
    pub fn add_input_action<F, Fut>(&self, name: &str, action: F) -> &Self
    where
        F: Fn(Option<Handle>, Value, Options) -> Fut + 'static,
        Fut: Future<Output = Result<Option<Value>>> + 'static,
    {
        declarations::deprecated("addInputAction", "add_action(\"run:{name}\")");
        self.add_legacy_action(name, action)
    }

    fn add_legacy_action<F, Fut>(&self, name: &str, action: F) -> &Self
    where
        F: Fn(Option<Handle>, Value, Options) -> Fut + 'static,
        Fut: Future<Output = Result<Option<Value>>> + 'static,
    {
        let action = Rc::new(action);
        self.add_action_fn(&format!("run:{}", name), move |ctx: ActionContext| {
            let action = action.clone();
            async move {
                let data = action(ctx.origin, ctx.data, ctx.options).await?;
                Ok(ActionResult {
                    data,
                    continue_chain: None,
                })
            }
        })
    }

    /// Deprecated: run `run:<name>` without waiting for it
    pub fn run_output_action(&self, name: &str, origin: Option<Handle>, data: Value, options: Options) {
        let ctx = ActionContext {
            engine: self.clone(),
            origin,
            value: String::new(),
            data,
            prefix: format!("run:{}", name),
            options,
        };
        let engine = self.clone();
        self.spawn(async move {
            if let Err(error) = engine.run_action(ctx).await {
                engine.report(error, None);
            }
        });
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EVENTS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Subscribe to an engine event
    pub fn on(&self, kind: EventKind, listener: impl Fn(&EngineEvent) + 'static) -> &Self {
        self.inner
            .subscribers
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(Rc::new(listener));
        self
    }

    pub fn emit(&self, event: &EngineEvent) {
        let subscribers: Vec<Listener> = self
            .inner
            .subscribers
            .borrow()
            .get(&event.kind())
            .cloned()
            .unwrap_or_default();
        for subscriber in subscribers {
            subscriber(event);
        }
    }

    fn report(&self, error: HyperionsError, params: Option<Value>) {
        error!(kind = ?error.kind(), "{}", error);
        self.emit(&EngineEvent::Error {
            error: Rc::new(error),
            params,
        });
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // ACTIONS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Run the action registered for `ctx.prefix`.
    ///
    /// An unknown prefix is not an error: it is logged and stops the chain.
    pub async fn run_action(&self, ctx: ActionContext) -> Result<ActionResult> {
        dlog!(ctx, "action: running action {} {}", ctx.prefix, ctx.value);
        let action = self.inner.actions.borrow().get(&ctx.prefix).cloned();
        match action {
            Some(action) => action.run(ctx).await,
            None => {
                warn!("action: no action registered for prefix `{}`", ctx.prefix);
                Ok(ActionResult::halt())
            }
        }
    }

    /// Run the chain of `element` to completion and return its outcome
    pub async fn run_chain(&self, element: &Handle) -> Result<()> {
        let initial = initial_step(element);
        self.process(initial, element.clone(), None).await
    }

    async fn process(&self, initial: String, element: Handle, base_data: Option<Value>) -> Result<()> {
        let mut step = Some(initial);
        let mut carried = base_data;

        while let Some(current) = step {
            let options = Options::parse(&element);
            if !current.starts_with("hyp:") {
                declarations::deprecated(&current, "hyp:action{number}");
            }
            dlog!(options, "processing {}", current);

            let declared = dom::get_attribute(&element, &current);
            let steps = declarations::action_steps(&element);
            let next = declarations::next_step(&current, &steps);

            let mut data = match carried.take() {
                Some(data) => data,
                None => params::parse_params(&element, &options),
            };
            dlog!(options, "{} processing {} with data {}", current, dom::describe(&element), data);

            if let Some(subpath) = declarations::read(&element, Directive::Path) {
                if subpath.dialect == Dialect::Current {
                    declarations::deprecated(&subpath.attribute, "the template attributes");
                }
                dlog!(options, "output: output has subpath {}, getting in params", subpath.value);
                data = get_dotted(&data, &subpath.value).cloned().unwrap_or(Value::Null);
            }

            let Some(declared) = declared else {
                dlog!(options, "process: action \"{}\" not found, skipping...", current);
                carried = Some(data);
                step = next;
                continue;
            };

            let default_prefix = if declared.contains('/') { "get" } else { "template" };
            let param = decode_param(&declared);
            let prefix = param.prefix.unwrap_or_else(|| default_prefix.to_string());

            let result = self
                .run_action(ActionContext {
                    engine: self.clone(),
                    origin: Some(element.clone()),
                    value: param.value,
                    data: data.clone(),
                    prefix,
                    options: options.clone(),
                })
                .await?;

            if !result.continues() {
                dlog!(options, "process: chain stopped by {}", current);
                return Ok(());
            }
            if next.is_none() {
                dlog!(options, "process: no next action, finished !");
                return Ok(());
            }

            carried = Some(if options.keep_params() {
                merge(data, result.data)
            } else {
                result.data.unwrap_or_else(|| json!({}))
            });
            step = next;
        }

        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // TRIGGERS
    // ═══════════════════════════════════════════════════════════════════════════

    /// Set up the triggers of `base` and every element below it
    pub fn init(&self, base: &Handle) {
        self.inner.listeners.borrow_mut().prune();
        if declarations::has_markup(base) {
            self.setup_trigger(base);
        }
        for element in dom::descendants(base) {
            if declarations::has_markup(&element) {
                self.setup_trigger(&element);
            }
        }
    }

    /// Register the listeners an element declares; an element is set up once
    pub fn setup_trigger(&self, element: &Handle) {
        if !declarations::declares_chain(element) {
            return;
        }
        let options = Options::parse(element);
        dlog!(options, "Debug enabled for {}", dom::describe(element));
        dlog!(options, "setup: setting up");

        let triggers = parse_triggers(element, &options);
        if triggers.is_disabled() {
            dlog!(options, "setup: trigger set to \"none\", skipping...");
            return;
        }

        if !self.inner.listeners.borrow_mut().mark_set_up(element) {
            dlog!(options, "setup: already set up");
            return;
        }

        let targets = if triggers.modifiers.is_form {
            named_fields(element)
        } else {
            vec![element.clone()]
        };

        {
            let mut listeners = self.inner.listeners.borrow_mut();
            for event in &triggers.events {
                dlog!(options, "setup: running on {}", event);
                for target in &targets {
                    listeners.add(target, event, element);
                }
            }
        }

        if triggers.modifiers.load {
            dlog!(options, "trigger: triggered on load");
            self.fire(element, LOAD_TRIGGER, None);
        }
    }

    /// Deliver an event to `target`, running the chains listening for it
    pub fn dispatch_event(&self, target: &Handle, event: &str) -> DispatchOutcome {
        let owners = self.inner.listeners.borrow().owners(target, event);
        let mut outcome = DispatchOutcome::default();
        for owner in owners {
            outcome.handled = true;
            if self.fire(&owner, event, Some(target)) {
                outcome.default_prevented = true;
            }
        }
        outcome
    }

    /// Trigger an element's chain as if one of its events fired
    pub fn trigger(&self, element: &Handle) {
        self.fire(element, MANUAL_TRIGGER, None);
    }

    /// Run the chain of `element`, `listener` being the node the event was
    /// delivered to. Returns whether the event default was prevented.
    fn fire(&self, element: &Handle, trigger: &str, listener: Option<&Handle>) -> bool {
        let options = Options::parse(element);
        let triggers = parse_triggers(element, &options);
        let initial = initial_step(element);

        dlog!(options, "trigger: Event triggered");
        self.emit(&EngineEvent::Trigger {
            target: element.clone(),
            trigger: trigger.to_string(),
        });

        let prevented = listener.is_some_and(|node| dom::has_tag(node, "form"));
        if prevented {
            dlog!(options, "trigger: form detected, cancelling builtin submit");
        }

        if triggers.modifiers.once {
            dlog!(options, "trigger: running only once, removing listeners");
            self.inner
                .listeners
                .borrow_mut()
                .remove_owner(element, &triggers.events);
        }

        if let Some(after) = triggers.modifiers.after {
            dlog!(options, "trigger: getting dedupped");
            let due = self.now() + after;
            if self.inner.timers.borrow_mut().schedule(element, due, &initial) {
                dlog!(options, "trigger: existing event detected, cancelling old");
            }
            return prevented;
        }

        dlog!(options, "trigger: running");
        self.spawn_chain(initial, element.clone());
        prevented
    }

    fn spawn_chain(&self, initial: String, element: Handle) {
        let engine = self.clone();
        self.spawn(async move {
            if let Err(error) = engine.process(initial, element.clone(), None).await {
                engine.report(error, Some(json!({ "element": dom::describe(&element) })));
            }
        });
    }

    fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        if let Err(e) = self.inner.spawner.spawn_local(task) {
            error!("could not spawn chain: {}", e);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // EXECUTION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Run spawned chains until none of them can make progress
    pub fn run_until_idle(&self) {
        match self.inner.pool.try_borrow_mut() {
            Ok(mut pool) => pool.run_until_stalled(),
            // called from inside a chain, the outer run picks new work up
            Err(_) => debug!("run_until_idle: executor already running"),
        }
    }

    /// Block until every spawned chain completed
    pub fn run_to_completion(&self) {
        match self.inner.pool.try_borrow_mut() {
            Ok(mut pool) => pool.run(),
            Err(_) => debug!("run_to_completion: executor already running"),
        }
    }

    /// Move the engine clock forward, firing debounce timers as they come due
    pub fn advance_time(&self, ms: u64) {
        let target = self.now() + ms;
        loop {
            let timer = self.inner.timers.borrow_mut().pop_due(target);
            let Some(timer) = timer else {
                break;
            };
            self.inner.clock.set(timer.due.max(self.now()));
            dlog!(Options::parse(&timer.element), "trigger: dedupping done, running");
            self.spawn_chain(timer.step, timer.element);
            self.run_until_idle();
        }
        self.inner.clock.set(target);
        self.run_until_idle();
    }

    /// Number of debounce timers waiting
    pub fn pending_timers(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // RENDERING
    // ═══════════════════════════════════════════════════════════════════════════

    /// Render `element` with `data`, then set up the triggers it now contains.
    ///
    /// With `skip_self` the element's own bindings are left alone and only
    /// the bound elements below it are rendered.
    pub fn fill(
        &self,
        element: &Handle,
        data: &Value,
        context: &RenderContext,
        skip_self: bool,
    ) -> Result<Handle> {
        dlog!(context.options, "fill: filling {} with {}", dom::describe(element), data);

        let roots = if skip_self {
            bound_roots(element)
        } else {
            vec![element.clone()]
        };
        for root in roots {
            self.fill_element(&root, data, context)?;
        }

        self.init(element);
        Ok(element.clone())
    }

    /// Apply the attribute handlers of `element`, the wildcard always last,
    /// then walk into its children unless one of them took the subtree over
    pub fn fill_element(&self, element: &Handle, data: &Value, context: &RenderContext) -> Result<()> {
        let mut keys: Vec<String> = Vec::new();
        for name in dom::attribute_names(element) {
            if let Some(key) = declarations::handler_key(&name) {
                if key != WILDCARD && !keys.contains(&key) {
                    keys.push(key);
                }
            }
        }
        keys.push(WILDCARD.to_string());

        let mut descend = true;
        for key in keys {
            let handler = self.inner.attributes.borrow().get(&key).cloned();
            let Some(handler) = handler else {
                continue;
            };
            let outcome = handler.apply(&AttributeContext {
                engine: self,
                element,
                data,
                context,
            })?;
            if !outcome.continues() {
                dlog!(context.options, "fill: `{}` took over {}", key, dom::describe(element));
                descend = false;
            }
        }

        if !descend {
            return Ok(());
        }

        for child in dom::child_elements(element) {
            if dom::is_child_of(&child, element) {
                self.fill_element(&child, data, context)?;
            }
        }
        Ok(())
    }

    /// Instantiate a `<template>` (exactly one root element) filled with `data`
    pub fn fill_template(&self, template: &Handle, data: &Value, options: &Options) -> Result<Handle> {
        dlog!(options, "fill: cloning template");
        let contents = dom::template_contents(template).ok_or_else(|| HyperionsError::NotATemplate {
            query: dom::describe(template),
            tag: dom::tag_name(template).unwrap_or_default(),
        })?;

        let roots = dom::child_elements(&contents);
        let [root] = roots.as_slice() else {
            return Err(HyperionsError::TemplateRoots(roots.len()));
        };

        let instance = dom::deep_clone(root);
        let context = RenderContext {
            path: PathContext::new(),
            options: options.clone(),
        };
        self.fill(&instance, data, &context, false)
    }
}

/// First chain step of an element, legacy `data-input` when it declares none
fn initial_step(element: &Handle) -> String {
    declarations::action_steps(element)
        .into_iter()
        .next()
        .unwrap_or_else(|| LEGACY_INPUT.to_string())
}

/// `{...previous, ...next}` for objects, `next` replaces anything else
fn merge(previous: Value, next: Option<Value>) -> Value {
    match (previous, next) {
        (Value::Object(mut base), Some(Value::Object(extra))) => {
            base.extend(extra);
            Value::Object(base)
        }
        (previous, None) => previous,
        (_, Some(next)) => next,
    }
}

/// Highest elements below `element` carrying binding markup
fn bound_roots(element: &Handle) -> Vec<Handle> {
    let mut roots = Vec::new();
    for child in dom::child_elements(element) {
        if declarations::has_markup(&child) {
            roots.push(child);
        } else {
            roots.extend(bound_roots(&child));
        }
    }
    roots
}

/// Fields a `form:<event>` trigger listens on
fn named_fields(form: &Handle) -> Vec<Handle> {
    dom::descendants(form)
        .into_iter()
        .filter(|node| {
            (dom::has_tag(node, "input") || dom::has_tag(node, "textarea"))
                && dom::has_attribute(node, "name")
        })
        .collect()
}
