//! DOM helpers over the `markup5ever_rcdom` tree.
//!
//! The engine only needs a small slice of the browser DOM: attribute access,
//! class lists, structural mutation (append, insert after, replace, remove),
//! deep cloning, fragment parsing for inner HTML and serialization. All of it
//! lives here so the rest of the crate never touches `NodeData` directly.

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::{parse_document, parse_fragment, Attribute, LocalName, Namespace, QualName};
use markup5ever_rcdom::{Handle, Node, NodeData, RcDom, SerializableHandle};
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tendril::{StrTendril, TendrilSink};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// Class names that hide an element
pub const HIDDEN_CLASSES: [&str; 2] = ["!hidden", "hidden"];

/// Class added to hide an element
pub const HIDE_CLASS: &str = "!hidden";

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING & SERIALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Parse a full HTML document and return its document node
pub fn parse_html(html: &str) -> Handle {
    let dom = parse_document(RcDom::default(), Default::default()).one(html);
    dom.document
}

/// Parse an HTML fragment in a `<body>` context, returning the top level nodes detached
pub fn parse_fragment_nodes(html: &str) -> Vec<Handle> {
    let context = QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from("body"));
    let dom = parse_fragment(RcDom::default(), Default::default(), context, vec![]).one(html);

    // The fragment parser wraps everything into a synthetic <html> root
    let root = dom.document.children.borrow().first().cloned();
    let Some(root) = root else {
        return Vec::new();
    };
    let nodes: Vec<Handle> = root.children.borrow().clone();
    for node in &nodes {
        detach(node);
    }
    nodes
}

fn serialize_with(node: &Handle, scope: TraversalScope) -> String {
    let mut bytes = Vec::new();
    let handle: SerializableHandle = node.clone().into();
    let opts = SerializeOpts {
        traversal_scope: scope,
        ..Default::default()
    };
    if serialize(&mut bytes, &handle, opts).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Serialize the node itself and its subtree
pub fn outer_html(node: &Handle) -> String {
    serialize_with(node, TraversalScope::IncludeNode)
}

/// Serialize only the children of the node
pub fn inner_html(node: &Handle) -> String {
    serialize_with(node, TraversalScope::ChildrenOnly(None))
}

// ═══════════════════════════════════════════════════════════════════════════════
// NODE INSPECTION
// ═══════════════════════════════════════════════════════════════════════════════

/// Stable identity of a node while it is alive
pub fn node_key(node: &Handle) -> usize {
    Rc::as_ptr(node) as usize
}

pub fn is_element(node: &Handle) -> bool {
    matches!(node.data, NodeData::Element { .. })
}

/// Lowercase local tag name, `None` for non-elements
pub fn tag_name(node: &Handle) -> Option<String> {
    match &node.data {
        NodeData::Element { name, .. } => Some(name.local.to_ascii_lowercase().to_string()),
        _ => None,
    }
}

pub fn has_tag(node: &Handle, tag: &str) -> bool {
    tag_name(node).is_some_and(|name| name.eq_ignore_ascii_case(tag))
}

/// Short human readable description used in logs and errors
pub fn describe(node: &Handle) -> String {
    match &node.data {
        NodeData::Document => "#document".to_string(),
        NodeData::Element { .. } => {
            let tag = tag_name(node).unwrap_or_default();
            match get_attribute(node, "id") {
                Some(id) => format!("{}#{}", tag.to_uppercase(), id),
                None => tag.to_uppercase(),
            }
        }
        NodeData::Text { .. } => "#text".to_string(),
        _ => "#node".to_string(),
    }
}

pub fn parent(node: &Handle) -> Option<Handle> {
    let weak = node.parent.take();
    let parent = weak.as_ref().and_then(Weak::upgrade);
    node.parent.set(weak);
    parent
}

pub fn is_child_of(node: &Handle, expected: &Handle) -> bool {
    parent(node).is_some_and(|p| Rc::ptr_eq(&p, expected))
}

/// Element children, snapshotted
pub fn child_elements(node: &Handle) -> Vec<Handle> {
    node.children
        .borrow()
        .iter()
        .filter(|child| is_element(child))
        .cloned()
        .collect()
}

/// Every element below `node` in document order (excluding `node`)
pub fn descendants(node: &Handle) -> Vec<Handle> {
    let mut out = Vec::new();
    collect_descendants(node, &mut out);
    out
}

fn collect_descendants(node: &Handle, out: &mut Vec<Handle>) {
    for child in node.children.borrow().iter() {
        if is_element(child) {
            out.push(child.clone());
            collect_descendants(child, out);
        }
    }
}

/// Find `<body>` below a document (or return the node itself when it is one)
pub fn find_body(document: &Handle) -> Option<Handle> {
    if has_tag(document, "body") {
        return Some(document.clone());
    }
    descendants(document)
        .into_iter()
        .find(|node| has_tag(node, "body"))
}

/// Contents fragment of a `<template>` element
pub fn template_contents(node: &Handle) -> Option<Handle> {
    match &node.data {
        NodeData::Element {
            template_contents, ..
        } => template_contents.borrow().clone(),
        _ => None,
    }
}

/// Concatenated text of every text node in the subtree
pub fn text_content(node: &Handle) -> String {
    let mut out = String::new();
    collect_text(node, &mut out);
    out
}

fn collect_text(node: &Handle, out: &mut String) {
    if let NodeData::Text { contents } = &node.data {
        out.push_str(&contents.borrow());
    }
    for child in node.children.borrow().iter() {
        collect_text(child, out);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ATTRIBUTES
// ═══════════════════════════════════════════════════════════════════════════════

fn attribute_name(name: &str) -> QualName {
    QualName::new(None, Namespace::from(""), LocalName::from(name))
}

pub fn get_attribute(node: &Handle, name: &str) -> Option<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|attr| &*attr.name.local == name)
            .map(|attr| attr.value.to_string()),
        _ => None,
    }
}

pub fn has_attribute(node: &Handle, name: &str) -> bool {
    match &node.data {
        NodeData::Element { attrs, .. } => {
            attrs.borrow().iter().any(|attr| &*attr.name.local == name)
        }
        _ => false,
    }
}

/// Attribute names in declaration order
pub fn attribute_names(node: &Handle) -> Vec<String> {
    match &node.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .map(|attr| attr.name.local.to_string())
            .collect(),
        _ => Vec::new(),
    }
}

pub fn set_attribute(node: &Handle, name: &str, value: &str) {
    if let NodeData::Element { attrs, .. } = &node.data {
        let mut attrs = attrs.borrow_mut();
        match attrs.iter_mut().find(|attr| &*attr.name.local == name) {
            Some(attr) => attr.value = StrTendril::from(value),
            None => attrs.push(Attribute {
                name: attribute_name(name),
                value: StrTendril::from(value),
            }),
        }
    }
}

pub fn remove_attribute(node: &Handle, name: &str) {
    if let NodeData::Element { attrs, .. } = &node.data {
        attrs.borrow_mut().retain(|attr| &*attr.name.local != name);
    }
}

pub fn classes(node: &Handle) -> Vec<String> {
    get_attribute(node, "class")
        .map(|class| class.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

pub fn has_class(node: &Handle, class: &str) -> bool {
    classes(node).iter().any(|c| c == class)
}

pub fn add_class(node: &Handle, class: &str) {
    let mut list = classes(node);
    if !list.iter().any(|c| c == class) {
        list.push(class.to_string());
        set_attribute(node, "class", &list.join(" "));
    }
}

pub fn remove_classes(node: &Handle, remove: &[&str]) {
    let list = classes(node);
    if !list.iter().any(|c| remove.contains(&c.as_str())) {
        return;
    }
    let kept: Vec<String> = list
        .into_iter()
        .filter(|c| !remove.contains(&c.as_str()))
        .collect();
    set_attribute(node, "class", &kept.join(" "));
}

/// Presentation-only hide, the element stays in the tree
pub fn hide(node: &Handle) {
    add_class(node, HIDE_CLASS);
}

pub fn unhide(node: &Handle) {
    remove_classes(node, &HIDDEN_CLASSES);
}

pub fn is_hidden(node: &Handle) -> bool {
    HIDDEN_CLASSES.iter().any(|class| has_class(node, class))
}

// ═══════════════════════════════════════════════════════════════════════════════
// MUTATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Remove the node from its parent
pub fn detach(node: &Handle) {
    let weak = node.parent.take();
    if let Some(parent) = weak.as_ref().and_then(Weak::upgrade) {
        parent
            .children
            .borrow_mut()
            .retain(|child| !Rc::ptr_eq(child, node));
    }
}

pub fn append_child(parent: &Handle, child: &Handle) {
    detach(child);
    child.parent.set(Some(Rc::downgrade(parent)));
    parent.children.borrow_mut().push(child.clone());
}

/// Insert `node` right after `anchor` in the anchor's parent
pub fn insert_after(anchor: &Handle, node: &Handle) {
    let Some(parent) = parent(anchor) else {
        return;
    };
    detach(node);
    let mut children = parent.children.borrow_mut();
    let position = children
        .iter()
        .position(|child| Rc::ptr_eq(child, anchor))
        .map(|index| index + 1)
        .unwrap_or(children.len());
    children.insert(position, node.clone());
    node.parent.set(Some(Rc::downgrade(&parent)));
}

/// Replace `target` with `replacements`, in order
pub fn replace_with(target: &Handle, replacements: &[Handle]) {
    let mut anchor = target.clone();
    for node in replacements {
        insert_after(&anchor, node);
        anchor = node.clone();
    }
    detach(target);
}

pub fn clear_children(node: &Handle) {
    let children: Vec<Handle> = node.children.borrow_mut().drain(..).collect();
    for child in children {
        child.parent.set(None);
    }
}

pub fn create_text(text: &str) -> Handle {
    Node::new(NodeData::Text {
        contents: RefCell::new(StrTendril::from(text)),
    })
}

pub fn create_element(tag: &str) -> Handle {
    Node::new(NodeData::Element {
        name: QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from(tag)),
        attrs: RefCell::new(Vec::new()),
        template_contents: RefCell::new(None),
        mathml_annotation_xml_integration_point: false,
    })
}

pub fn set_text(node: &Handle, text: &str) {
    clear_children(node);
    append_child(node, &create_text(text));
}

pub fn set_inner_html(node: &Handle, html: &str) {
    clear_children(node);
    for child in parse_fragment_nodes(html) {
        append_child(node, &child);
    }
}

/// Assign a DOM property by name. Returns `false` when the name is not a
/// known element property, in which case callers fall back to an attribute.
pub fn set_property(node: &Handle, property: &str, value: &str) -> bool {
    match property {
        "innerHTML" => set_inner_html(node, value),
        "innerText" | "textContent" => set_text(node, value),
        "className" => set_attribute(node, "class", value),
        "htmlFor" => set_attribute(node, "for", value),
        _ => return false,
    }
    true
}

/// Deep copy of a node; the copy is detached
pub fn deep_clone(node: &Handle) -> Handle {
    let data = match &node.data {
        NodeData::Document => NodeData::Document,
        NodeData::Doctype {
            name,
            public_id,
            system_id,
        } => NodeData::Doctype {
            name: name.clone(),
            public_id: public_id.clone(),
            system_id: system_id.clone(),
        },
        NodeData::Text { contents } => NodeData::Text {
            contents: RefCell::new(contents.borrow().clone()),
        },
        NodeData::Comment { contents } => NodeData::Comment {
            contents: contents.clone(),
        },
        NodeData::Element {
            name,
            attrs,
            template_contents,
            mathml_annotation_xml_integration_point,
        } => NodeData::Element {
            name: name.clone(),
            attrs: RefCell::new(attrs.borrow().clone()),
            template_contents: RefCell::new(template_contents.borrow().as_ref().map(deep_clone)),
            mathml_annotation_xml_integration_point: *mathml_annotation_xml_integration_point,
        },
        NodeData::ProcessingInstruction { target, contents } => {
            NodeData::ProcessingInstruction {
                target: target.clone(),
                contents: contents.clone(),
            }
        }
    };

    let copy = Node::new(data);
    for child in node.children.borrow().iter() {
        append_child(&copy, &deep_clone(child));
    }
    copy
}
