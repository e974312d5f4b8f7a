//! Compiled queries and their evaluation against a JSON document.
//!
//! ```rust
//! use jpath::Query;
//! use serde_json::json;
//!
//! fn main() -> jpath::Result<()> {
//!     let mut doc = json!({"items": [{"name": "a"}, {"name": "b"}, {}]});
//!
//!     let q: Query = "items[2].name".parse()?;
//!     assert_eq!(&json!("b"), q.get(&doc)?);
//!
//!     q.set(&mut doc, json!("c"))?;
//!     assert_eq!(&json!("c"), q.get(&doc)?);
//!
//!     let names: Vec<_> = Query::parse("items[*].name")?
//!         .iter_items(&doc)?
//!         .map(|(_, v)| v.clone())
//!         .collect();
//!     assert_eq!(vec![json!("a"), json!("c")], names);
//!     Ok(())
//! }
//! ```

use crate::error::{QueryError, Result};
use crate::parser::{Parser, Segment, Step};
use serde::Serialize;
use serde_json::map;
use serde_json::Value;
use std::fmt::{Display, Formatter};
use std::iter::Enumerate;
use std::slice;
use std::str::FromStr;
use tracing::{debug, trace};

/// A parsed, immutable query that can be evaluated against any number of documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: String,
    steps: Vec<Step>,
}

impl Query {
    pub(crate) fn new(source: String, steps: Vec<Step>) -> Self {
        debug!(query = %source, segments = steps.len(), "compiled query");
        Self { source, steps }
    }

    /// Parses the provided query string.
    ///
    /// # Errors
    ///
    /// Will return `Err` with `ErrorKind::Syntax` if the query is malformed.
    #[inline]
    pub fn parse(query: &str) -> Result<Self> {
        Parser::parse(query)
    }

    /// The query text this was compiled from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The segments in evaluation order.
    pub fn segments(&self) -> impl Iterator<Item = &Segment> + '_ {
        self.steps.iter().map(|s| &s.segment)
    }

    /// Reports whether the query holds exactly one `[*]` and so can be used with `iter_items`.
    #[must_use]
    pub fn is_iterable(&self) -> bool {
        self.wildcards().count() == 1
    }

    #[cfg(test)]
    pub(crate) fn steps(&self) -> &[Step] {
        &self.steps
    }

    fn wildcards(&self) -> impl Iterator<Item = (usize, &Step)> + '_ {
        self.steps
            .iter()
            .enumerate()
            .filter(|(_, s)| s.segment == Segment::Wildcard)
    }

    fn ensure_single_target(&self, op: &str) -> Result<()> {
        match self.wildcards().next() {
            Some((_, step)) => Err(QueryError::unsupported(
                Some(step.pos),
                format!("`[*]` cannot be used with {op}, use iter_items instead"),
            )),
            None => Ok(()),
        }
    }

    /// Index of the single wildcard step.
    fn wildcard_index(&self) -> Result<usize> {
        let mut wildcards = self.wildcards();
        match (wildcards.next(), wildcards.next()) {
            (Some((i, _)), None) => Ok(i),
            (None, _) => Err(QueryError::unsupported(
                None,
                format!("iter_items requires a `[*]` in `{}`", self.source),
            )),
            (Some(_), Some((_, second))) => Err(QueryError::unsupported(
                Some(second.pos),
                "iter_items requires exactly one `[*]`",
            )),
        }
    }

    /// Returns the single value the query resolves to.
    ///
    /// # Errors
    ///
    /// Will return `Err` with `NotFound` when a field, index or predicate match is missing,
    /// `TypeMismatch` when a segment meets the wrong JSON type and `UnsupportedOperation` if
    /// the query contains a `[*]`.
    pub fn get<'v>(&self, doc: &'v Value) -> Result<&'v Value> {
        self.ensure_single_target("get")?;
        self.steps.iter().try_fold(doc, |current, step| step.resolve(current))
    }

    /// Like `get` but returns a mutable reference to the resolved value.
    ///
    /// # Errors
    ///
    /// Same as `get`.
    pub fn get_mut<'v>(&self, doc: &'v mut Value) -> Result<&'v mut Value> {
        self.ensure_single_target("get_mut")?;
        self.steps
            .iter()
            .try_fold(doc, |current, step| step.resolve_mut(current))
    }

    /// Writes `value` at the location the query resolves to, in place.
    ///
    /// A trailing field is inserted when missing or overwritten when present. A trailing index
    /// or predicate overwrites an existing element; arrays never grow.
    ///
    /// # Errors
    ///
    /// Same as `get`. Nothing in the document changes when an error is returned.
    pub fn set(&self, doc: &mut Value, value: Value) -> Result<()> {
        self.ensure_single_target("set")?;
        let (last, parents) = match self.steps.split_last() {
            Some(split) => split,
            None => return Err(QueryError::syntax(0, "empty query")),
        };
        let parent = parents
            .iter()
            .try_fold(doc, |current, step| step.resolve_mut(current))?;
        last.assign(parent, value)
    }

    /// Lazily iterates the values produced by fanning out at the query's `[*]`.
    ///
    /// Elements for which the segments after the wildcard cannot be resolved are skipped.
    ///
    /// # Errors
    ///
    /// Will return `Err` with `UnsupportedOperation` unless the query contains exactly one
    /// `[*]`, with the `get` errors when the path before the wildcard does not resolve, and
    /// with `TypeMismatch` when the wildcard meets something other than an array or object.
    pub fn iter_items<'v>(&self, doc: &'v Value) -> Result<Items<'v, '_>> {
        let at = self.wildcard_index()?;
        let current = self.steps[..at]
            .iter()
            .try_fold(doc, |current, step| step.resolve(current))?;

        let entries = match current {
            Value::Array(arr) => Entries::Array(arr.iter().enumerate()),
            Value::Object(map) => Entries::Object(map.iter()),
            other => return Err(self.steps[at].mismatch("`[*]`", other)),
        };
        debug!(query = %self.source, "iterating items");
        Ok(Items {
            entries,
            rest: &self.steps[at + 1..],
        })
    }

    /// Mutable counterpart of `iter_items`, for updating every matched value in bulk.
    ///
    /// # Errors
    ///
    /// Same as `iter_items`.
    pub fn iter_items_mut<'v>(&self, doc: &'v mut Value) -> Result<ItemsMut<'v, '_>> {
        let at = self.wildcard_index()?;
        let current = self.steps[..at]
            .iter()
            .try_fold(doc, |current, step| step.resolve_mut(current))?;

        let entries = match current {
            Value::Array(arr) => EntriesMut::Array(arr.iter_mut().enumerate()),
            Value::Object(map) => EntriesMut::Object(map.iter_mut()),
            other => return Err(self.steps[at].mismatch("`[*]`", other)),
        };
        debug!(query = %self.source, "iterating items mutably");
        Ok(ItemsMut {
            entries,
            rest: &self.steps[at + 1..],
        })
    }
}

impl FromStr for Query {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        Parser::parse(s)
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

impl Step {
    fn resolve<'v>(&self, current: &'v Value) -> Result<&'v Value> {
        match (&self.segment, current) {
            (Segment::Field(name), Value::Object(map)) => map
                .get(name)
                .ok_or_else(|| self.missing(format!("field `{name}` does not exist"))),
            (Segment::Index(n), Value::Array(arr)) => arr
                .get(n - 1)
                .ok_or_else(|| self.out_of_range(*n, arr.len())),
            (Segment::Predicate(p), Value::Array(arr)) => arr
                .iter()
                .find(|v| p.matches(v))
                .ok_or_else(|| self.missing(format!("no element matches `{}`", self.segment))),
            (Segment::Wildcard, _) => Err(self.wildcard()),
            (segment, other) => Err(self.mismatch(segment, other)),
        }
    }

    fn resolve_mut<'v>(&self, current: &'v mut Value) -> Result<&'v mut Value> {
        match (&self.segment, current) {
            (Segment::Field(name), Value::Object(map)) => map
                .get_mut(name)
                .ok_or_else(|| self.missing(format!("field `{name}` does not exist"))),
            (Segment::Index(n), Value::Array(arr)) => {
                let len = arr.len();
                arr.get_mut(n - 1)
                    .ok_or_else(|| self.out_of_range(*n, len))
            }
            (Segment::Predicate(p), Value::Array(arr)) => arr
                .iter_mut()
                .find(|v| p.matches(v))
                .ok_or_else(|| self.missing(format!("no element matches `{}`", self.segment))),
            (Segment::Wildcard, _) => Err(self.wildcard()),
            (segment, other) => Err(self.mismatch(segment, other)),
        }
    }

    /// Applies the step as the terminal write of a `set`.
    fn assign(&self, parent: &mut Value, value: Value) -> Result<()> {
        match (&self.segment, parent) {
            (Segment::Field(name), Value::Object(map)) => {
                map.insert(name.clone(), value);
            }
            (Segment::Index(_) | Segment::Predicate(_), parent) => {
                *self.resolve_mut(parent)? = value;
            }
            (Segment::Wildcard, _) => return Err(self.wildcard()),
            (segment, other) => return Err(self.mismatch(segment, other)),
        }
        Ok(())
    }

    fn missing(&self, message: String) -> QueryError {
        QueryError::not_found(self.pos, message)
    }

    fn out_of_range(&self, n: usize, len: usize) -> QueryError {
        self.missing(format!("index {n} is out of range for an array of length {len}"))
    }

    fn wildcard(&self) -> QueryError {
        QueryError::unsupported(Some(self.pos), "`[*]` cannot be used with a single target")
    }

    fn mismatch(&self, segment: impl Display, found: &Value) -> QueryError {
        QueryError::type_mismatch(
            self.pos,
            format!("cannot apply `{segment}` to {}", kind_of(found)),
        )
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Where an item produced by `iter_items` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Key<'a> {
    /// 1-based array position, as written in an index segment.
    Index(usize),
    /// Object member name.
    Field(&'a str),
}

impl Display for Key<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Key::Index(n) => write!(f, "{n}"),
            Key::Field(name) => write!(f, "{name}"),
        }
    }
}

enum Entries<'v> {
    Array(Enumerate<slice::Iter<'v, Value>>),
    Object(map::Iter<'v>),
}

/// Lazy iterator returned by `Query::iter_items`.
pub struct Items<'v, 'q> {
    entries: Entries<'v>,
    rest: &'q [Step],
}

impl<'v> Iterator for Items<'v, '_> {
    type Item = (Key<'v>, &'v Value);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (key, value) = match &mut self.entries {
                Entries::Array(it) => it.next().map(|(i, v)| (Key::Index(i + 1), v))?,
                Entries::Object(it) => it.next().map(|(k, v)| (Key::Field(k.as_str()), v))?,
            };
            match self.rest.iter().try_fold(value, |current, step| step.resolve(current)) {
                Ok(v) => return Some((key, v)),
                Err(err) => trace!(%key, %err, "skipping item"),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let upper = match &self.entries {
            Entries::Array(it) => it.size_hint().1,
            Entries::Object(it) => it.size_hint().1,
        };
        (0, upper)
    }
}

enum EntriesMut<'v> {
    Array(Enumerate<slice::IterMut<'v, Value>>),
    Object(map::IterMut<'v>),
}

/// Lazy iterator returned by `Query::iter_items_mut`.
pub struct ItemsMut<'v, 'q> {
    entries: EntriesMut<'v>,
    rest: &'q [Step],
}

impl<'v> Iterator for ItemsMut<'v, '_> {
    type Item = (Key<'v>, &'v mut Value);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (key, value) = match &mut self.entries {
                EntriesMut::Array(it) => it.next().map(|(i, v)| (Key::Index(i + 1), v))?,
                EntriesMut::Object(it) => {
                    it.next().map(|(k, v)| (Key::Field(k.as_str()), v))?
                }
            };
            match self
                .rest
                .iter()
                .try_fold(value, |current, step| step.resolve_mut(current))
            {
                Ok(v) => return Some((key, v)),
                Err(err) => trace!(%key, %err, "skipping item"),
            }
        }
    }
}
