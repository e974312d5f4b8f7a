//! Parser is used to turn a query string into a reusable [`Query`].
//!
//! ```rust
//! use jpath::parser::{Parser, Segment};
//!
//! fn main() -> jpath::Result<()> {
//!     let query = Parser::parse("items[2].name")?;
//!     let segments: Vec<&Segment> = query.segments().collect();
//!     assert_eq!(
//!         vec![
//!             &Segment::Field("items".to_string()),
//!             &Segment::Index(2),
//!             &Segment::Field("name".to_string()),
//!         ],
//!         segments
//!     );
//!     Ok(())
//! }
//! ```
//!
//! Grammar:
//!
//! ```text
//! query     := (qualifier | segment) ('.' segment)*
//! segment   := field qualifier?
//! field     := identifier | quoted-string
//! qualifier := index | predicate | wildcard
//! index     := '[' positive-integer ']'
//! predicate := '[' '@' field '=' literal ']'
//! wildcard  := '[' '*' ']'
//! ```

use crate::error::{QueryError, Result};
use crate::lexer::{is_identifier_byte, is_identifier_start, tokenize, Token, TokenKind};
use crate::predicate::Predicate;
use crate::query::Query;
use serde_json::{Number, Value};
use std::fmt::{Display, Formatter};

/// One step of a compiled query.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Selects an object member by key.
    Field(String),
    /// Selects an array element by its 1-based position.
    Index(usize),
    /// Selects the first array element matching the predicate.
    Predicate(Predicate),
    /// Fans out over every element of an array or every value of an object.
    Wildcard,
}

impl Display for Segment {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Segment::Field(name) => write_name(f, name),
            Segment::Index(n) => write!(f, "[{n}]"),
            Segment::Predicate(p) => {
                write!(f, "[@")?;
                write_name(f, &p.attribute)?;
                write!(f, "={}]", p.literal)
            }
            Segment::Wildcard => write!(f, "[*]"),
        }
    }
}

/// Writes a member name as it would be written in a query, quoting it unless it lexes as a
/// single identifier.
fn write_name(f: &mut Formatter<'_>, name: &str) -> std::fmt::Result {
    let bare = name.as_bytes().first().map_or(false, |b| is_identifier_start(*b))
        && name.bytes().all(is_identifier_byte);
    if bare {
        f.write_str(name)
    } else {
        write!(f, "{}", Value::String(name.to_string()))
    }
}

/// A `Segment` along with the byte offset it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Step {
    pub(crate) segment: Segment,
    pub(crate) pos: usize,
}

/// Parses a query string into a `Query`.
pub struct Parser<'a> {
    exp: &'a str,
}

impl<'a> Parser<'a> {
    /// Creates a parser over the source text the tokens were lexed from.
    #[must_use]
    pub fn new(exp: &'a str) -> Self {
        Parser { exp }
    }

    /// Lexes and parses the provided query.
    ///
    /// # Errors
    ///
    /// Will return `Err` with `ErrorKind::Syntax` if the query is malformed.
    pub fn parse(query: &str) -> Result<Query> {
        let tokens = tokenize(query)?;
        Parser::new(query).parse_tokens(&tokens)
    }

    /// Parses tokens previously produced from this parser's source text.
    ///
    /// # Errors
    ///
    /// Will return `Err` with `ErrorKind::Syntax` if the tokens do not form a valid query.
    pub fn parse_tokens(&self, tokens: &[Token]) -> Result<Query> {
        if tokens.is_empty() {
            return Err(QueryError::syntax(0, "empty query"));
        }
        if let Some(tok) = tokens.iter().find(|tok| self.span(tok).is_none()) {
            return Err(QueryError::syntax(
                tok.start as usize,
                "token does not belong to the query text",
            ));
        }

        let mut steps = Vec::new();
        let mut pos = 0;

        match tokens[0].kind {
            TokenKind::OpenBracket => self.parse_qualifier(tokens, &mut pos, &mut steps)?,
            _ => self.parse_segment(tokens, &mut pos, &mut steps)?,
        }

        while let Some(tok) = tokens.get(pos) {
            pos += 1;
            match tok.kind {
                TokenKind::Dot => self.parse_segment(tokens, &mut pos, &mut steps)?,
                TokenKind::CloseBracket => {
                    return Err(QueryError::syntax(
                        tok.start as usize,
                        "unbalanced `]` without a matching `[`",
                    ))
                }
                _ => {
                    return Err(QueryError::syntax(
                        tok.start as usize,
                        format!("unexpected `{}`, expected `.`", self.text(tok)),
                    ))
                }
            }
        }

        Ok(Query::new(self.exp.to_string(), steps))
    }

    fn parse_segment(&self, tokens: &[Token], pos: &mut usize, steps: &mut Vec<Step>) -> Result<()> {
        match tokens.get(*pos) {
            Some(tok) => {
                let name = self.field_name(tok)?.ok_or_else(|| match tok.kind {
                    TokenKind::Dot => QueryError::syntax(tok.start as usize, "empty field name"),
                    _ => QueryError::syntax(
                        tok.start as usize,
                        format!("expected a field name, found `{}`", self.text(tok)),
                    ),
                })?;
                *pos += 1;
                steps.push(Step {
                    segment: Segment::Field(name),
                    pos: tok.start as usize,
                });
            }
            None => {
                return Err(QueryError::syntax(
                    self.exp.len(),
                    "trailing `.` without a field name",
                ))
            }
        }

        if let Some(tok) = tokens.get(*pos) {
            if tok.kind == TokenKind::OpenBracket {
                self.parse_qualifier(tokens, pos, steps)?;
            }
        }
        Ok(())
    }

    /// Parses a single bracketed qualifier starting at the `[` token.
    fn parse_qualifier(
        &self,
        tokens: &[Token],
        pos: &mut usize,
        steps: &mut Vec<Step>,
    ) -> Result<()> {
        let open = tokens[*pos];
        *pos += 1;

        let tok = self.expect_some(tokens, *pos, "unbalanced `[`, expected a qualifier")?;
        *pos += 1;
        let segment = match tok.kind {
            TokenKind::Star => Segment::Wildcard,
            TokenKind::Number => Segment::Index(self.parse_index(tok)?),
            TokenKind::At => Segment::Predicate(self.parse_predicate(tokens, pos)?),
            TokenKind::CloseBracket => {
                return Err(QueryError::syntax(
                    tok.start as usize,
                    "empty `[]`, expected an index, predicate or `*`",
                ))
            }
            _ => {
                return Err(QueryError::syntax(
                    tok.start as usize,
                    format!("invalid qualifier `{}`", self.text(&tok)),
                ))
            }
        };

        let close = self.expect_some(tokens, *pos, "unbalanced `[`, expected `]`")?;
        if close.kind != TokenKind::CloseBracket {
            return Err(QueryError::syntax(
                close.start as usize,
                format!("expected `]`, found `{}`", self.text(&close)),
            ));
        }
        *pos += 1;

        steps.push(Step {
            segment,
            pos: open.start as usize,
        });

        match tokens.get(*pos) {
            Some(next) if next.kind == TokenKind::OpenBracket => Err(QueryError::syntax(
                next.start as usize,
                "only one bracketed qualifier is allowed per field",
            )),
            _ => Ok(()),
        }
    }

    fn parse_index(&self, tok: Token) -> Result<usize> {
        let text = self.text(&tok);
        match text.parse::<usize>() {
            Ok(n) if n > 0 => Ok(n),
            Err(_) if text.bytes().all(|b| b.is_ascii_digit()) => Err(QueryError::syntax(
                tok.start as usize,
                format!("index `{text}` is too large"),
            )),
            _ => Err(QueryError::syntax(
                tok.start as usize,
                format!("index must be a positive integer, found `{text}`"),
            )),
        }
    }

    /// Parses `attribute '=' literal` following an `@`.
    fn parse_predicate(&self, tokens: &[Token], pos: &mut usize) -> Result<Predicate> {
        let tok = self.expect_some(tokens, *pos, "predicate is missing an attribute")?;
        let attribute = self.field_name(&tok)?.ok_or_else(|| {
            QueryError::syntax(tok.start as usize, "predicate is missing an attribute")
        })?;
        *pos += 1;

        let eq = self.expect_some(tokens, *pos, "predicate is missing `=`")?;
        if eq.kind != TokenKind::Equals {
            return Err(QueryError::syntax(
                eq.start as usize,
                "predicate is missing `=`",
            ));
        }
        *pos += 1;

        let tok = self.expect_some(tokens, *pos, "predicate is missing a value")?;
        let literal = match tok.kind {
            TokenKind::Identifier => Value::String(self.text(&tok).to_string()),
            TokenKind::QuotedString => Value::String(self.unquote(&tok)?),
            TokenKind::Number => Value::Number(self.parse_number(tok)?),
            TokenKind::BooleanTrue => Value::Bool(true),
            TokenKind::BooleanFalse => Value::Bool(false),
            TokenKind::Null => Value::Null,
            _ => {
                return Err(QueryError::syntax(
                    tok.start as usize,
                    "predicate is missing a value",
                ))
            }
        };
        *pos += 1;

        Ok(Predicate::new(attribute, literal))
    }

    fn parse_number(&self, tok: Token) -> Result<Number> {
        let text = self.text(&tok);
        text.parse::<Number>().map_err(|_| {
            QueryError::syntax(tok.start as usize, format!("invalid number `{text}`"))
        })
    }

    /// Returns the member name a token denotes when it can stand as a field.
    fn field_name(&self, tok: &Token) -> Result<Option<String>> {
        match tok.kind {
            TokenKind::Identifier
            | TokenKind::BooleanTrue
            | TokenKind::BooleanFalse
            | TokenKind::Null => Ok(Some(self.text(tok).to_string())),
            TokenKind::QuotedString => self.unquote(tok).map(Some),
            _ => Ok(None),
        }
    }

    fn expect_some(&self, tokens: &[Token], pos: usize, msg: &str) -> Result<Token> {
        tokens
            .get(pos)
            .copied()
            .ok_or_else(|| QueryError::syntax(self.exp.len(), msg))
    }

    /// The source text of a token, if its range lies within the query text.
    fn span(&self, tok: &Token) -> Option<&'a str> {
        let start = tok.start as usize;
        let end = start.checked_add(tok.len as usize)?;
        let text = self.exp.get(start..end)?;
        match tok.kind {
            TokenKind::QuotedString if text.len() < 2 || text.get(1..text.len() - 1).is_none() => {
                None
            }
            _ => Some(text),
        }
    }

    /// Token text; ranges are checked once up front in `parse_tokens`.
    fn text(&self, tok: &Token) -> &'a str {
        self.span(tok).unwrap_or_default()
    }

    /// Strips the quotes from a quoted string token and decodes its escapes.
    fn unquote(&self, tok: &Token) -> Result<String> {
        let text = self.text(tok);
        let raw = &text[1..text.len() - 1];
        let base = tok.start as usize + 1;
        let mut s = String::with_capacity(raw.len());
        let mut chars = raw.char_indices();
        while let Some((i, c)) = chars.next() {
            if c != '\\' {
                s.push(c);
                continue;
            }
            let escaped = match chars.next() {
                Some((_, 'n')) => '\n',
                Some((_, 't')) => '\t',
                Some((_, 'r')) => '\r',
                Some((_, 'b')) => '\u{8}',
                Some((_, 'f')) => '\u{c}',
                Some((_, c @ ('\\' | '/' | '"' | '\''))) => c,
                Some((_, 'u')) => decode_unicode(raw, &mut chars)
                    .ok_or_else(|| QueryError::syntax(base + i, "invalid unicode escape"))?,
                _ => {
                    return Err(QueryError::syntax(
                        base + i,
                        "unknown escape sequence in quoted string",
                    ))
                }
            };
            s.push(escaped);
        }
        Ok(s)
    }
}

/// Decodes the `XXXX` of a `\uXXXX` escape, joining a following low surrogate escape when the
/// first unit is a high surrogate.
fn decode_unicode(raw: &str, chars: &mut std::str::CharIndices<'_>) -> Option<char> {
    let hex = |chars: &mut std::str::CharIndices<'_>| -> Option<u32> {
        let (start, _) = chars.clone().next()?;
        let digits = raw.get(start..start + 4)?;
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let unit = u32::from_str_radix(digits, 16).ok()?;
        for _ in 0..4 {
            chars.next();
        }
        Some(unit)
    };

    let high = hex(chars)?;
    if !(0xD800..0xDC00).contains(&high) {
        return char::from_u32(high);
    }
    match (chars.next(), chars.next()) {
        (Some((_, '\\')), Some((_, 'u'))) => {}
        _ => return None,
    }
    let low = hex(chars)?;
    if !(0xDC00..0xE000).contains(&low) {
        return None;
    }
    char::from_u32(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn segments(query: &str) -> Result<Vec<Segment>> {
        Ok(Parser::parse(query)?.segments().cloned().collect())
    }

    fn syntax_error_at(query: &str) -> Option<usize> {
        let err = Parser::parse(query).expect_err(query);
        assert_eq!(ErrorKind::Syntax, err.kind, "{query}: {err}");
        err.position
    }

    #[test]
    fn fields() -> Result<()> {
        assert_eq!(
            vec![
                Segment::Field("a".to_string()),
                Segment::Field("b".to_string())
            ],
            segments("a.b")?
        );
        Ok(())
    }

    #[test]
    fn index() -> Result<()> {
        assert_eq!(
            vec![Segment::Field("items".to_string()), Segment::Index(2)],
            segments("items[2]")?
        );
        Ok(())
    }

    #[test]
    fn predicate_bare_word() -> Result<()> {
        assert_eq!(
            vec![
                Segment::Field("items".to_string()),
                Segment::Predicate(Predicate::new("foo", json!("bar")))
            ],
            segments("items[@foo=bar]")?
        );
        Ok(())
    }

    #[test]
    fn predicate_literals() -> Result<()> {
        let literal = |q: &str| -> Result<Value> {
            match segments(q)?.pop() {
                Some(Segment::Predicate(p)) => Ok(p.literal),
                other => panic!("expected predicate, got {other:?}"),
            }
        };
        assert_eq!(json!(5), literal("a[@n=5]")?);
        assert_eq!(json!(-1.5), literal("a[@n=-1.5]")?);
        assert_eq!(json!(true), literal("a[@n=true]")?);
        assert_eq!(json!(false), literal("a[@n==false]")?);
        assert_eq!(Value::Null, literal("a[@n=null]")?);
        assert_eq!(json!("a b"), literal(r#"a[@n="a b"]"#)?);
        assert_eq!(json!("it's"), literal(r#"a[@n='it\'s']"#)?);
        assert_eq!(json!("5"), literal(r#"a[@n="5"]"#)?);
        Ok(())
    }

    #[test]
    fn predicate_numbers_beyond_i64() -> Result<()> {
        let literal = |q: &str| -> Result<Value> {
            match segments(q)?.pop() {
                Some(Segment::Predicate(p)) => Ok(p.literal),
                other => panic!("expected predicate, got {other:?}"),
            }
        };
        assert_eq!(json!(u64::MAX), literal("items[@id=18446744073709551615]")?);
        assert_eq!(json!(1e20), literal("items[@id=100000000000000000000]")?);
        assert_eq!(json!(i64::MIN), literal("items[@id=-9223372036854775808]")?);
        Ok(())
    }

    #[test]
    fn quoted_escapes() -> Result<()> {
        assert_eq!(
            vec![Segment::Field("A\n\u{1F600}/".to_string())],
            segments(r#""\u0041\n\ud83d\ude00\/""#)?
        );
        Ok(())
    }

    #[test]
    fn invalid_escapes() {
        assert_eq!(Some(6), syntax_error_at(r#"a[@n="\q"]"#));
        assert_eq!(Some(6), syntax_error_at(r#"a[@n="\u00zz"]"#));
        assert_eq!(Some(6), syntax_error_at(r#"a[@n="\u+041"]"#));
        assert_eq!(Some(1), syntax_error_at(r#""\ud83d".b"#));
        assert_eq!(Some(1), syntax_error_at(r#""\u12""#));
    }

    #[test]
    fn tokens_from_other_text() -> Result<()> {
        let err = Parser::new("a").parse_tokens(&tokenize("abcdef")?).unwrap_err();
        assert_eq!(ErrorKind::Syntax, err.kind);
        assert_eq!(Some(0), err.position);

        let stray_quote = Token {
            start: 0,
            len: 1,
            kind: TokenKind::QuotedString,
        };
        let err = Parser::new("\"").parse_tokens(&[stray_quote]).unwrap_err();
        assert_eq!(ErrorKind::Syntax, err.kind);

        let overflowing = Token {
            start: u32::MAX,
            len: u32::MAX,
            kind: TokenKind::Identifier,
        };
        assert!(Parser::new("a").parse_tokens(&[overflowing]).is_err());
        Ok(())
    }

    #[test]
    fn segment_display_quotes_names() {
        assert_eq!("x_y", Segment::Field("x_y".to_string()).to_string());
        assert_eq!(r#""a.b""#, Segment::Field("a.b".to_string()).to_string());
        assert_eq!(r#""""#, Segment::Field(String::new()).to_string());
        assert_eq!(
            r#"[@"a b"="c"]"#,
            Segment::Predicate(Predicate::new("a b", json!("c"))).to_string()
        );
        assert_eq!("[@n=1]", Segment::Predicate(Predicate::new("n", json!(1))).to_string());
    }

    #[test]
    fn wildcard() -> Result<()> {
        assert_eq!(
            vec![
                Segment::Field("items".to_string()),
                Segment::Wildcard,
                Segment::Field("name".to_string())
            ],
            segments("items[*].name")?
        );
        Ok(())
    }

    #[test]
    fn quoted_and_keyword_fields() -> Result<()> {
        assert_eq!(
            vec![
                Segment::Field("a.b".to_string()),
                Segment::Field("null".to_string()),
                Segment::Field("x y".to_string())
            ],
            segments(r#""a.b".null.'x y'"#)?
        );
        Ok(())
    }

    #[test]
    fn root_qualifier() -> Result<()> {
        assert_eq!(
            vec![Segment::Index(1), Segment::Field("id".to_string())],
            segments("[1].id")?
        );
        assert_eq!(vec![Segment::Wildcard], segments("[*]")?);
        Ok(())
    }

    #[test]
    fn whitespace_is_insignificant() -> Result<()> {
        assert_eq!(segments("items[@foo=bar].x")?, segments(" items [ @foo = bar ] . x ")?);
        Ok(())
    }

    #[test]
    fn positions() -> Result<()> {
        let query = Parser::parse("ab.cd[3]")?;
        let positions: Vec<usize> = query.steps().iter().map(|s| s.pos).collect();
        assert_eq!(vec![0, 3, 5], positions);
        Ok(())
    }

    #[test]
    fn predicate_missing_value() {
        assert_eq!(Some(6), syntax_error_at("a[@foo]"));
        assert_eq!(Some(7), syntax_error_at("a[@foo=]"));
        assert_eq!(Some(3), syntax_error_at("a[@=x]"));
        assert_eq!(Some(6), syntax_error_at("a[@foo"));
    }

    #[test]
    fn non_positive_index() {
        assert_eq!(Some(2), syntax_error_at("a[0]"));
        assert_eq!(Some(2), syntax_error_at("a[-1]"));
        assert_eq!(Some(2), syntax_error_at("a[1.5]"));
    }

    #[test]
    fn index_too_large() {
        let err = Parser::parse("a[99999999999999999999]").unwrap_err();
        assert_eq!(ErrorKind::Syntax, err.kind);
        assert_eq!(Some(2), err.position);
        assert!(err.message.contains("too large"), "{err}");
    }

    #[test]
    fn unbalanced_brackets() {
        assert_eq!(Some(3), syntax_error_at("a[1"));
        assert_eq!(Some(1), syntax_error_at("a]"));
        assert_eq!(Some(2), syntax_error_at("a[]"));
        assert_eq!(Some(4), syntax_error_at("a[1 2]"));
    }

    #[test]
    fn multiple_qualifiers() {
        assert_eq!(Some(4), syntax_error_at("a[1][2]"));
        assert_eq!(Some(3), syntax_error_at("[*][1]"));
    }

    #[test]
    fn dots() {
        assert_eq!(Some(0), syntax_error_at(".a"));
        assert_eq!(Some(2), syntax_error_at("a."));
        assert_eq!(Some(2), syntax_error_at("a..b"));
        assert_eq!(Some(0), syntax_error_at(""));
        assert_eq!(Some(0), syntax_error_at("   "));
    }

    #[test]
    fn missing_separator() {
        assert_eq!(Some(2), syntax_error_at("a b"));
        assert_eq!(Some(3), syntax_error_at("[1]a"));
        assert_eq!(Some(2), syntax_error_at("a[x]"));
    }

    #[test]
    fn lexer_errors() {
        assert_eq!(Some(2), syntax_error_at("a.#"));
        assert_eq!(Some(2), syntax_error_at(r#"a["b"#));
    }
}
