//! CSS selector subset used by the element locator.
//!
//! Supported:
//! - type selectors and `*`
//! - `#id`, `.class`
//! - `[attr]`, `[attr=v]`, `[attr^=v]`, `[attr$=v]`, `[attr*=v]`, `[attr~=v]`
//! - descendant (whitespace) and child (`>`) combinators
//! - selector groups separated by `,`
//! - backslash escapes inside identifiers (`[hyp\:copy]`)
//!
//! Matching follows browser `querySelector` semantics: the candidate must be
//! a descendant of the search root, but ancestors outside the root still take
//! part in combinator matching.

use markup5ever_rcdom::Handle;

use crate::dom;
use crate::error::{HyperionsError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Equals,
    Prefix,
    Suffix,
    Contains,
    Includes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    op: Option<(AttrOp, String)>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// One comma-free selector, stored left to right
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    head: Compound,
    tail: Vec<(Combinator, Compound)>,
}

/// A parsed selector group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    groups: Vec<Complex>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSING
// ═══════════════════════════════════════════════════════════════════════════════

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: &str) -> HyperionsError {
        HyperionsError::InvalidSelector {
            selector: self.source.to_string(),
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos > start
    }

    fn identifier(&mut self) -> Result<String> {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == '\\' {
                let escaped = self
                    .chars
                    .get(self.pos + 1)
                    .copied()
                    .ok_or_else(|| self.error("dangling escape"))?;
                out.push(escaped);
                self.pos += 2;
            } else if c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
                out.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        if out.is_empty() {
            return Err(self.error("expected an identifier"));
        }
        Ok(out)
    }

    fn attribute_value(&mut self) -> Result<String> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let mut out = String::new();
                loop {
                    match self.peek() {
                        None => return Err(self.error("unterminated string")),
                        Some('\\') => {
                            if let Some(c) = self.chars.get(self.pos + 1) {
                                out.push(*c);
                            }
                            self.pos += 2;
                        }
                        Some(c) if c == quote => {
                            self.pos += 1;
                            return Ok(out);
                        }
                        Some(c) => {
                            out.push(c);
                            self.pos += 1;
                        }
                    }
                }
            }
            _ => self.identifier(),
        }
    }

    fn attribute(&mut self) -> Result<AttrSelector> {
        // '[' already consumed
        self.skip_whitespace();
        let name = self.identifier()?;
        self.skip_whitespace();

        let op = match self.peek() {
            Some(']') => None,
            Some('=') => Some(AttrOp::Equals),
            Some('^') => Some(AttrOp::Prefix),
            Some('$') => Some(AttrOp::Suffix),
            Some('*') => Some(AttrOp::Contains),
            Some('~') => Some(AttrOp::Includes),
            _ => return Err(self.error("unsupported attribute operator")),
        };

        let op = match op {
            None => None,
            Some(AttrOp::Equals) => {
                self.pos += 1;
                Some(AttrOp::Equals)
            }
            Some(op) => {
                self.pos += 1;
                if self.peek() != Some('=') {
                    return Err(self.error("expected `=`"));
                }
                self.pos += 1;
                Some(op)
            }
        };

        let op = match op {
            None => None,
            Some(op) => {
                self.skip_whitespace();
                let value = self.attribute_value()?;
                self.skip_whitespace();
                Some((op, value))
            }
        };

        if self.peek() != Some(']') {
            return Err(self.error("expected `]`"));
        }
        self.pos += 1;

        Ok(AttrSelector { name, op })
    }

    fn compound(&mut self) -> Result<Compound> {
        let mut compound = Compound::default();
        let start = self.pos;

        match self.peek() {
            Some('*') => {
                self.pos += 1;
            }
            Some(c) if c.is_alphabetic() || c == '\\' => {
                compound.tag = Some(self.identifier()?.to_ascii_lowercase());
            }
            _ => {}
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    compound.id = Some(self.identifier()?);
                }
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.identifier()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.attribute()?);
                }
                Some(':') => return Err(self.error("pseudo-classes are not supported")),
                _ => break,
            }
        }

        if self.pos == start {
            return Err(self.error("expected a selector"));
        }
        Ok(compound)
    }

    fn complex(&mut self) -> Result<Complex> {
        self.skip_whitespace();
        let head = self.compound()?;
        let mut tail = Vec::new();

        loop {
            let had_space = self.skip_whitespace();
            match self.peek() {
                None | Some(',') => break,
                Some('>') => {
                    self.pos += 1;
                    self.skip_whitespace();
                    tail.push((Combinator::Child, self.compound()?));
                }
                Some(_) if had_space => {
                    tail.push((Combinator::Descendant, self.compound()?));
                }
                Some(_) => return Err(self.error("unexpected character")),
            }
        }

        Ok(Complex { head, tail })
    }

    fn selector(&mut self) -> Result<Selector> {
        let mut groups = vec![self.complex()?];
        while self.peek() == Some(',') {
            self.pos += 1;
            groups.push(self.complex()?);
        }
        if self.peek().is_some() {
            return Err(self.error("trailing input"));
        }
        Ok(Selector { groups })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MATCHING
// ═══════════════════════════════════════════════════════════════════════════════

fn matches_compound(element: &Handle, compound: &Compound) -> bool {
    if !dom::is_element(element) {
        return false;
    }
    if let Some(tag) = &compound.tag {
        if !dom::has_tag(element, tag) {
            return false;
        }
    }
    if let Some(id) = &compound.id {
        if dom::get_attribute(element, "id").as_deref() != Some(id.as_str()) {
            return false;
        }
    }
    if !compound.classes.is_empty() {
        let classes = dom::classes(element);
        if !compound.classes.iter().all(|c| classes.contains(c)) {
            return false;
        }
    }
    compound.attrs.iter().all(|attr| {
        let Some(actual) = dom::get_attribute(element, &attr.name) else {
            return false;
        };
        match &attr.op {
            None => true,
            Some((AttrOp::Equals, v)) => actual == *v,
            Some((AttrOp::Prefix, v)) => !v.is_empty() && actual.starts_with(v.as_str()),
            Some((AttrOp::Suffix, v)) => !v.is_empty() && actual.ends_with(v.as_str()),
            Some((AttrOp::Contains, v)) => !v.is_empty() && actual.contains(v.as_str()),
            Some((AttrOp::Includes, v)) => actual.split_whitespace().any(|part| part == v),
        }
    })
}

/// Match the compounds `parts[..=index]` ending at `element`, right to left
fn matches_from(element: &Handle, complex: &Complex, index: usize) -> bool {
    let (compound, combinator) = if index == 0 {
        (&complex.head, None)
    } else {
        let (combinator, compound) = &complex.tail[index - 1];
        (compound, Some(*combinator))
    };

    if !matches_compound(element, compound) {
        return false;
    }

    match combinator {
        None => true,
        Some(Combinator::Child) => dom::parent(element)
            .is_some_and(|parent| matches_from(&parent, complex, index - 1)),
        Some(Combinator::Descendant) => {
            let mut ancestor = dom::parent(element);
            while let Some(current) = ancestor {
                if matches_from(&current, complex, index - 1) {
                    return true;
                }
                ancestor = dom::parent(&current);
            }
            false
        }
    }
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self> {
        Parser::new(source.trim()).selector()
    }

    pub fn matches(&self, element: &Handle) -> bool {
        self.groups
            .iter()
            .any(|complex| matches_from(element, complex, complex.tail.len()))
    }

    /// First matching descendant of `root` in document order
    pub fn query_first(&self, root: &Handle) -> Option<Handle> {
        dom::descendants(root)
            .into_iter()
            .find(|element| self.matches(element))
    }

    /// Every matching descendant of `root` in document order
    pub fn query_all(&self, root: &Handle) -> Vec<Handle> {
        dom::descendants(root)
            .into_iter()
            .filter(|element| self.matches(element))
            .collect()
    }
}
