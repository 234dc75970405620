#![forbid(unsafe_code)]

//! Compound selectors for addressing storefront markup.
//!
//! Supports the subset the behaviors need: an optional tag (or `*`), `#id`,
//! `.class`, and attribute conditions `[name]`, `[name=v]`, `[name^=v]`,
//! `[name$=v]`, `[name*=v]` with optional quoting. Comma-separated lists
//! match when any alternative matches. Descendant and child combinators are
//! rejected; callers scope queries through [`Document::query_all`] instead.
//!
//! [`Document::query_all`]: crate::dom::Document::query_all

use std::fmt;
use std::str::FromStr;

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    alternatives: Vec<Compound>,
    source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrMatch {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Prefix,
    Suffix,
    Contains,
}

/// Parse failure with the byte offset where it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorError {
    /// The selector text that failed to parse.
    pub input: String,
    /// Byte offset of the failure.
    pub position: usize,
    /// What the parser expected.
    pub reason: &'static str,
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid selector {:?} at offset {}: {}",
            self.input, self.position, self.reason
        )
    }
}

impl std::error::Error for SelectorError {}

/// Element view the matcher needs; implemented by the document.
pub trait Matchable {
    /// Lowercase tag name.
    fn tag_name(&self) -> &str;
    /// Attribute value, if present.
    fn attr(&self, name: &str) -> Option<&str>;
}

impl Selector {
    /// Parse a selector list.
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        let mut parser = Parser { src: input, pos: 0 };
        let mut alternatives = Vec::new();
        loop {
            alternatives.push(parser.compound()?);
            parser.skip_ws();
            match parser.peek() {
                None => break,
                Some(',') => {
                    parser.bump();
                }
                Some(_) => return Err(parser.error("combinators are not supported")),
            }
        }
        Ok(Self {
            alternatives,
            source: input.trim().to_string(),
        })
    }

    /// The selector text this was parsed from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether `element` matches any alternative.
    #[must_use]
    pub fn matches(&self, element: &impl Matchable) -> bool {
        self.alternatives.iter().any(|c| c.matches(element))
    }
}

impl FromStr for Selector {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Compound {
    fn is_empty(&self) -> bool {
        self.tag.is_none() && self.id.is_none() && self.classes.is_empty() && self.attrs.is_empty()
    }

    fn matches(&self, element: &impl Matchable) -> bool {
        if self.tag.as_deref().is_some_and(|tag| tag != element.tag_name()) {
            return false;
        }
        if self
            .id
            .as_deref()
            .is_some_and(|id| element.attr("id") != Some(id))
        {
            return false;
        }
        if !self.classes.is_empty() {
            let class_attr = element.attr("class").unwrap_or("");
            if !self
                .classes
                .iter()
                .all(|c| class_attr.split_ascii_whitespace().any(|have| have == c))
            {
                return false;
            }
        }
        self.attrs.iter().all(|m| {
            let Some(value) = element.attr(&m.name) else {
                return false;
            };
            match m.op {
                AttrOp::Exists => true,
                AttrOp::Equals => value == m.value,
                AttrOp::Prefix => !m.value.is_empty() && value.starts_with(&m.value),
                AttrOp::Suffix => !m.value.is_empty() && value.ends_with(&m.value),
                AttrOp::Contains => !m.value.is_empty() && value.contains(&m.value),
            }
        })
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn error(&self, reason: &'static str) -> SelectorError {
        SelectorError {
            input: self.src.to_string(),
            position: self.pos,
            reason,
        }
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_char(c)) {
            self.bump();
        }
        if start == self.pos {
            return Err(self.error("expected identifier"));
        }
        Ok(self.src[start..self.pos].to_string())
    }

    fn compound(&mut self) -> Result<Compound, SelectorError> {
        self.skip_ws();
        let mut compound = Compound::default();
        let mut universal = false;
        match self.peek() {
            Some('*') => {
                self.bump();
                universal = true;
            }
            Some(c) if is_ident_char(c) => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
            }
            _ => {}
        }
        loop {
            match self.peek() {
                Some('.') => {
                    self.bump();
                    compound.classes.push(self.ident()?);
                }
                Some('#') => {
                    self.bump();
                    compound.id = Some(self.ident()?);
                }
                Some('[') => {
                    self.bump();
                    compound.attrs.push(self.attr()?);
                }
                _ => break,
            }
        }
        if compound.is_empty() && !universal {
            return Err(self.error("empty selector"));
        }
        Ok(compound)
    }

    fn attr(&mut self) -> Result<AttrMatch, SelectorError> {
        self.skip_ws();
        let name = self.ident()?;
        self.skip_ws();
        let op = match self.peek() {
            Some(']') => {
                self.bump();
                return Ok(AttrMatch {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                });
            }
            Some('=') => {
                self.bump();
                AttrOp::Equals
            }
            Some(c @ ('^' | '$' | '*')) => {
                self.bump();
                if self.bump() != Some('=') {
                    return Err(self.error("expected '='"));
                }
                match c {
                    '^' => AttrOp::Prefix,
                    '$' => AttrOp::Suffix,
                    _ => AttrOp::Contains,
                }
            }
            _ => return Err(self.error("unexpected character in attribute condition")),
        };
        self.skip_ws();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let start = self.pos;
                loop {
                    match self.bump() {
                        Some(c) if c == quote => break,
                        Some(_) => {}
                        None => return Err(self.error("unterminated string")),
                    }
                }
                self.src[start..self.pos - quote.len_utf8()].to_string()
            }
            _ => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c != ']' && !c.is_whitespace()) {
                    self.bump();
                }
                self.src[start..self.pos].to_string()
            }
        };
        self.skip_ws();
        if self.bump() != Some(']') {
            return Err(self.error("expected ']'"));
        }
        Ok(AttrMatch { name, op, value })
    }
}
