//! # JPath
//!
//! Is an XPath like query lexer, parser, cli and library for reading and updating JSON data.
//!
//! #### Queries
//! A query is a `.` separated list of fields, each optionally followed by one bracketed
//! qualifier:
//!
//! | Query             | Selects                                                             |
//! |-------------------|---------------------------------------------------------------------|
//! | `a.b`             | member `b` of member `a`                                            |
//! | `items[2]`        | the second element of `items` (indexes are 1-based)                 |
//! | `items[@foo=bar]` | the first element of `items` whose `foo` member equals `"bar"`      |
//! | `items[*].name`   | `name` of every element of `items`, only usable with `iter_items`   |
//!
//! See [`lexer`] for the token rules.
//!
//! ```rust
//! use serde_json::json;
//! use std::error::Error;
//!
//! fn main() -> Result<(), Box<dyn Error>> {
//!     let mut doc = json!({"name": "MyCompany", "properties": {"employees": 50}});
//!     let employees = jpath::compile("properties.employees")?;
//!
//!     assert_eq!(&json!(50), jpath::get(&doc, &employees)?);
//!     jpath::set(&mut doc, &employees, json!(51))?;
//!     assert_eq!(&json!(51), jpath::get(&doc, &employees)?);
//!     Ok(())
//! }
//! ```
//!
//! Evaluation holds no state between calls, so a compiled [`Query`] can be shared across
//! threads and reused against any number of documents. Callers that `set` a document from
//! more than one thread must provide their own locking.

/// Query errors
pub mod error;

/// JPath query lexer
pub mod lexer;

/// JPath query parser
pub mod parser;

/// Predicate matching
pub mod predicate;

/// Compiled queries and evaluation
pub mod query;

pub use error::{ErrorKind, QueryError, Result};
pub use query::{Items, ItemsMut, Key, Query};
pub use serde_json::Value;

/// Compiles a query string for repeated evaluation.
///
/// # Errors
///
/// Will return `Err` with `ErrorKind::Syntax` if the query is malformed.
#[inline]
pub fn compile(query: &str) -> Result<Query> {
    Query::parse(query)
}

/// Returns the value `query` resolves to within `doc`.
///
/// # Errors
///
/// See [`Query::get`].
#[inline]
pub fn get<'v>(doc: &'v Value, query: &Query) -> Result<&'v Value> {
    query.get(doc)
}

/// Writes `value` into `doc` at the location `query` resolves to.
///
/// # Errors
///
/// See [`Query::set`].
#[inline]
pub fn set(doc: &mut Value, query: &Query, value: Value) -> Result<()> {
    query.set(doc, value)
}

/// Lazily iterates every `(key, value)` produced by the `[*]` in `query`.
///
/// # Errors
///
/// See [`Query::iter_items`].
#[inline]
pub fn iter_items<'v, 'q>(doc: &'v Value, query: &'q Query) -> Result<Items<'v, 'q>> {
    query.iter_items(doc)
}
