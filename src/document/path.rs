//! JSON path expressions over document trees
//!
//! Grammar:
//!
//! ```text
//! path    := '$' step*
//! step    := '.' name | '.*' | '[' selector ']'
//! selector:= digits | 'last' | '*' | '"' chars '"' | '\'' chars '\''
//! ```
//!
//! `$.customer.name`, `$.items[0].sku`, `$.tags[*]`, `$["odd key"]`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Path parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid path '{path}' at offset {offset}: {reason}")]
pub struct PathError {
    pub path: String,
    pub offset: usize,
    pub reason: String,
}

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object member
    Field(String),
    /// Array element by position
    Index(usize),
    /// Final array element
    Last,
    /// Every member or element
    Wildcard,
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) if is_plain_name(name) => write!(f, ".{}", name),
            Segment::Field(name) => write!(f, "[{:?}]", name),
            Segment::Index(i) => write!(f, "[{}]", i),
            Segment::Last => write!(f, "[last]"),
            Segment::Wildcard => write!(f, "[*]"),
        }
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '-' || c == '#')
}

/// A parsed path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    /// The root path `$`
    pub fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Path of a single top-level field
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            segments: vec![Segment::Field(name.into())],
        }
    }

    pub fn parse(input: &str) -> Result<Self, PathError> {
        Parser::new(input).parse()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn has_wildcard(&self) -> bool {
        self.segments.iter().any(|s| matches!(s, Segment::Wildcard))
    }

    /// Top-level field this path starts with, if any
    pub fn first_field(&self) -> Option<&str> {
        match self.segments.first() {
            Some(Segment::Field(name)) => Some(name),
            _ => None,
        }
    }

    /// Split into parent path and final segment (`None` for the root)
    pub fn split_last(&self) -> Option<(JsonPath, &Segment)> {
        let (last, parent) = self.segments.split_last()?;
        Some((
            JsonPath {
                segments: parent.to_vec(),
            },
            last,
        ))
    }

    /// Resolve a single value. Wildcard paths resolve to their first match.
    pub fn evaluate<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        walk(&self.segments, root)
    }

    /// Resolve every value the path matches, in document order
    pub fn evaluate_all<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        walk_all(&self.segments, vec![root])
    }

    /// [`evaluate`](Self::evaluate) against a bare object body.
    /// The root path has no value inside a body and resolves to `None`.
    pub fn evaluate_in<'a>(&self, body: &'a Map<String, Value>) -> Option<&'a Value> {
        let (first, rest) = self.segments.split_first()?;
        match first {
            Segment::Field(name) => walk(rest, body.get(name)?),
            Segment::Wildcard => body.values().find_map(|v| walk(rest, v)),
            _ => None,
        }
    }

    /// [`evaluate_all`](Self::evaluate_all) against a bare object body
    pub fn evaluate_all_in<'a>(&self, body: &'a Map<String, Value>) -> Vec<&'a Value> {
        let Some((first, rest)) = self.segments.split_first() else {
            return Vec::new();
        };
        match first {
            Segment::Field(name) => match body.get(name) {
                Some(v) => walk_all(rest, vec![v]),
                None => Vec::new(),
            },
            Segment::Wildcard => walk_all(rest, body.values().collect()),
            _ => Vec::new(),
        }
    }
}

fn walk<'a>(segments: &[Segment], root: &'a Value) -> Option<&'a Value> {
    let mut current = root;
    for (i, segment) in segments.iter().enumerate() {
        current = match segment {
            Segment::Field(name) => current.as_object()?.get(name)?,
            Segment::Index(idx) => current.as_array()?.get(*idx)?,
            Segment::Last => current.as_array()?.last()?,
            Segment::Wildcard => {
                return walk_all(&segments[i..], vec![current]).into_iter().next();
            }
        };
    }
    Some(current)
}

fn walk_all<'a>(segments: &[Segment], mut frontier: Vec<&'a Value>) -> Vec<&'a Value> {
    for segment in segments {
        let mut next = Vec::with_capacity(frontier.len());
        for value in frontier {
            match segment {
                Segment::Field(name) => {
                    if let Some(v) = value.as_object().and_then(|o| o.get(name)) {
                        next.push(v);
                    }
                }
                Segment::Index(idx) => {
                    if let Some(v) = value.as_array().and_then(|a| a.get(*idx)) {
                        next.push(v);
                    }
                }
                Segment::Last => {
                    if let Some(v) = value.as_array().and_then(|a| a.last()) {
                        next.push(v);
                    }
                }
                Segment::Wildcard => match value {
                    Value::Array(items) => next.extend(items.iter()),
                    Value::Object(map) => next.extend(map.values()),
                    _ => {}
                },
            }
        }
        frontier = next;
    }
    frontier
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$")?;
        for segment in &self.segments {
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

impl TryFrom<String> for JsonPath {
    type Error = PathError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        JsonPath::parse(&value)
    }
}

impl From<JsonPath> for String {
    fn from(path: JsonPath) -> Self {
        path.to_string()
    }
}

impl FromStr for JsonPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JsonPath::parse(s)
    }
}

struct Parser<'a> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> PathError {
        PathError {
            path: self.input.to_string(),
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn expect(&mut self, expected: char) -> Result<(), PathError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => {
                self.pos -= 1;
                Err(self.error(format!("expected '{}', found '{}'", expected, c)))
            }
            None => Err(self.error(format!("expected '{}', found end of path", expected))),
        }
    }

    fn parse(mut self) -> Result<JsonPath, PathError> {
        self.expect('$')?;
        let mut segments = Vec::new();
        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    segments.push(self.dot_step()?);
                }
                '[' => {
                    self.pos += 1;
                    segments.push(self.bracket_step()?);
                    self.expect(']')?;
                }
                other => return Err(self.error(format!("unexpected '{}'", other))),
            }
        }
        Ok(JsonPath { segments })
    }

    fn dot_step(&mut self) -> Result<Segment, PathError> {
        if self.peek() == Some('*') {
            self.pos += 1;
            return Ok(Segment::Wildcard);
        }
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c == '.' || c == '[' || c.is_whitespace() {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return Err(self.error("empty field name"));
        }
        Ok(Segment::Field(self.chars[start..self.pos].iter().collect()))
    }

    fn bracket_step(&mut self) -> Result<Segment, PathError> {
        match self.peek() {
            Some('*') => {
                self.pos += 1;
                Ok(Segment::Wildcard)
            }
            Some(q @ ('"' | '\'')) => {
                self.pos += 1;
                self.quoted(q).map(Segment::Field)
            }
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let digits: String = self.chars[start..self.pos].iter().collect();
                digits
                    .parse::<usize>()
                    .map(Segment::Index)
                    .map_err(|_| self.error("array index out of range"))
            }
            Some('l') => {
                for expected in "last".chars() {
                    self.expect(expected)?;
                }
                Ok(Segment::Last)
            }
            Some(c) => Err(self.error(format!("unexpected '{}' in selector", c))),
            None => Err(self.error("unterminated selector")),
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String, PathError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => return Err(self.error("dangling escape")),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => return Err(self.error("unterminated quoted name")),
            }
        }
    }
}
