//! #### Syntax & Rules
//!
//! | Token          | Example           | Syntax Rules                                                                                       |
//! |----------------|-------------------|----------------------------------------------------------------------------------------------------|
//! | `Dot`          | `.`               | Separates segments.                                                                                |
//! | `OpenBracket`  | `[`               | N/A                                                                                                |
//! | `CloseBracket` | `]`               | N/A                                                                                                |
//! | `At`           | `@`               | Introduces a predicate attribute.                                                                  |
//! | `Equals`       | `=`               | supports both `==` and `=`.                                                                        |
//! | `Star`         | `*`               | N/A                                                                                                |
//! | `QuotedString` | `"sample text"`   | Must start and end with an unescaped `"` or `'` character.                                         |
//! | `Number`       | `-12.5e3`         | Optional leading `-`, digits, optional fraction and exponent. Must not run into identifier bytes.  |
//! | `BooleanTrue`  | `true`            | Accepts `true` as a boolean only.                                                                  |
//! | `BooleanFalse` | `false`           | Accepts `false` as a boolean only.                                                                 |
//! | `Null`         | `null`            | N/A                                                                                                |
//! | `Identifier`   | `first_name`      | Starts with `A-Z`, `a-z`, `_`, `$` or any non ASCII byte, continues with those, digits and `-`.    |
//!
//! Whitespace outside of quoted strings is ignored.

use thiserror::Error;

/// The lexed token.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Token {
    pub start: u32,
    pub len: u32,
    pub kind: TokenKind,
}

impl Token {
    /// Byte offset one past the end of the token.
    #[inline]
    #[must_use]
    pub fn end(&self) -> u32 {
        self.start + self.len
    }
}

/// The kind of `Token`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TokenKind {
    Identifier,
    QuotedString,
    Number,
    BooleanTrue,
    BooleanFalse,
    Null,
    Dot,
    OpenBracket,
    CloseBracket,
    At,
    Equals,
    Star,
}

/// A lexer for the jpath query syntax.
pub struct Tokenizer<'a> {
    pos: u32,
    remaining: &'a [u8],
}

impl<'a> Tokenizer<'a> {
    /// Creates a new `Tokenizer` to iterate over tokens
    #[inline]
    #[must_use]
    pub fn new(src: &'a str) -> Self {
        Self::new_bytes(src.as_bytes())
    }

    /// Creates a new `Tokenizer` to iterate over tokens using bytes as the source.
    #[must_use]
    pub fn new_bytes(src: &'a [u8]) -> Self {
        Self {
            pos: 0,
            remaining: src,
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace();

        if self.remaining.is_empty() {
            Ok(None)
        } else {
            let (kind, bytes_read) = tokenize_single_token(self.remaining, self.pos)?;
            let token = Token {
                kind,
                start: self.pos,
                len: bytes_read,
            };
            self.chomp(bytes_read);
            Ok(Some(token))
        }
    }

    fn skip_whitespace(&mut self) {
        let skipped = skip_whitespace(self.remaining);
        self.chomp(skipped);
    }

    fn chomp(&mut self, len: u32) {
        self.remaining = &self.remaining[len as usize..];
        self.pos += len;
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token().transpose()
    }
}

/// Tokenizes the whole query, stopping at the first lexing error.
///
/// # Errors
///
/// Will return `Err` on an unterminated quoted string, a malformed number or a character that is
/// not part of the query syntax.
pub fn tokenize(src: &str) -> Result<Vec<Token>> {
    Tokenizer::new(src).collect()
}

#[inline]
fn skip_whitespace(data: &[u8]) -> u32 {
    take_while(data, |c| c.is_ascii_whitespace()).unwrap_or(0)
}

#[inline]
/// Consumes bytes while a predicate evaluates to true.
fn take_while<F>(data: &[u8], mut pred: F) -> Option<u32>
where
    F: FnMut(u8) -> bool,
{
    let mut current_index = 0;

    for b in data {
        if !pred(*b) {
            break;
        }
        current_index += 1;
    }

    if current_index == 0 {
        None
    } else {
        Some(current_index)
    }
}

#[inline]
pub(crate) fn is_identifier_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
}

#[inline]
pub(crate) fn is_identifier_byte(b: u8) -> bool {
    is_identifier_start(b) || b.is_ascii_digit() || b == b'-'
}

/// Result of a single tokenization attempt.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the lexer.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("invalid number `{text}` at offset {pos}")]
    InvalidNumber { pos: u32, text: String },

    #[error("unsupported character `{ch}` at offset {pos}")]
    UnsupportedCharacter { pos: u32, ch: char },

    #[error("unterminated string `{text}` at offset {pos}")]
    UnterminatedString { pos: u32, text: String },
}

impl Error {
    /// Byte offset of the offending input.
    #[must_use]
    pub fn position(&self) -> u32 {
        match self {
            Error::InvalidNumber { pos, .. }
            | Error::UnsupportedCharacter { pos, .. }
            | Error::UnterminatedString { pos, .. } => *pos,
        }
    }
}

/// Try to lex a single token from the input stream.
fn tokenize_single_token(data: &[u8], pos: u32) -> Result<(TokenKind, u32)> {
    let b = match data.first() {
        Some(b) => b,
        None => panic!("invalid data passed"),
    };

    let (token, end) = match b {
        b'.' => (TokenKind::Dot, 1),
        b'[' => (TokenKind::OpenBracket, 1),
        b']' => (TokenKind::CloseBracket, 1),
        b'@' => (TokenKind::At, 1),
        b'*' => (TokenKind::Star, 1),
        b'=' if data.get(1) == Some(&b'=') => (TokenKind::Equals, 2),
        b'=' => (TokenKind::Equals, 1),
        b'"' | b'\'' => tokenize_string(data, *b, pos)?,
        b'-' => tokenize_number(data, pos)?,
        c if c.is_ascii_digit() => tokenize_number(data, pos)?,
        c if is_identifier_start(*c) => tokenize_identifier(data),
        _ => {
            return Err(Error::UnsupportedCharacter {
                pos,
                ch: char::from(*b),
            })
        }
    };
    Ok((token, end))
}

#[inline]
fn tokenize_string(data: &[u8], quote: u8, pos: u32) -> Result<(TokenKind, u32)> {
    let mut last_backslash = false;
    let mut ended_with_terminator = false;

    match take_while(&data[1..], |c| match c {
        b'\\' => {
            last_backslash = !last_backslash;
            true
        }
        _ if c == quote => {
            if last_backslash {
                last_backslash = false;
                true
            } else {
                ended_with_terminator = true;
                false
            }
        }
        _ => {
            last_backslash = false;
            true
        }
    }) {
        Some(end) if ended_with_terminator => Ok((TokenKind::QuotedString, end + 2)),
        None if ended_with_terminator => Ok((TokenKind::QuotedString, 2)),
        _ => Err(Error::UnterminatedString {
            pos,
            text: String::from_utf8_lossy(data).to_string(),
        }),
    }
}

#[inline]
fn tokenize_identifier(data: &[u8]) -> (TokenKind, u32) {
    let end = take_while(data, is_identifier_byte).unwrap_or(1);
    let kind = match data[..end as usize] {
        [b't', b'r', b'u', b'e'] => TokenKind::BooleanTrue,
        [b'f', b'a', b'l', b's', b'e'] => TokenKind::BooleanFalse,
        [b'n', b'u', b'l', b'l'] => TokenKind::Null,
        _ => TokenKind::Identifier,
    };
    (kind, end)
}

#[inline]
fn tokenize_number(data: &[u8], pos: u32) -> Result<(TokenKind, u32)> {
    let digits = |from: usize| -> usize {
        data.get(from..)
            .and_then(|rest| take_while(rest, |c| c.is_ascii_digit()))
            .unwrap_or(0) as usize
    };

    let mut end = usize::from(data[0] == b'-');
    let int_digits = digits(end);
    end += int_digits;

    // a fraction only counts when digits follow the dot, otherwise the dot is a separator
    if int_digits > 0 && data.get(end) == Some(&b'.') && digits(end + 1) > 0 {
        end += 1 + digits(end + 1);
    }

    if int_digits > 0 && matches!(data.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(data.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = digits(exp);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }

    let runs_into_identifier = data.get(end).map_or(false, |c| is_identifier_byte(*c));
    if int_digits == 0 || runs_into_identifier {
        let bad = take_while(data, |c| is_identifier_byte(c) || c == b'.').unwrap_or(1);
        return Err(Error::InvalidNumber {
            pos,
            text: String::from_utf8_lossy(&data[..bad as usize]).to_string(),
        });
    }
    Ok((TokenKind::Number, end as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! lex_test {
        (FAIL: $name:ident, $src:expr, $e:expr ) => {
            #[test]
            fn $name() -> Result<()> {
                let src: &str = $src;
                let err = tokenize(src);
                assert_eq!(Err($e), err);
                Ok(())
            }
        };
        ($name:ident, $src:expr, $( $tok:expr ),* ) => {
            #[test]
            fn $name() -> Result<()> {
                let src: &str = $src;
                let mut tokenizer = Tokenizer::new_bytes(src.as_bytes());

                $(
                    let token = tokenizer.next_token()?.unwrap();
                    assert_eq!($tok, token);
                )*
                assert_eq!(None, tokenizer.next_token()?);
                Ok(())
            }
        };
    }

    // singular
    lex_test!(
        parse_bool_true,
        "true",
        Token {
            kind: TokenKind::BooleanTrue,
            start: 0,
            len: 4
        }
    );
    lex_test!(
        parse_bool_false,
        "false",
        Token {
            kind: TokenKind::BooleanFalse,
            start: 0,
            len: 5
        }
    );
    lex_test!(
        parse_null,
        "null",
        Token {
            kind: TokenKind::Null,
            start: 0,
            len: 4
        }
    );
    lex_test!(
        parse_keyword_prefix_is_identifier,
        "trueish",
        Token {
            kind: TokenKind::Identifier,
            start: 0,
            len: 7
        }
    );
    lex_test!(
        parse_number_float,
        "123.23",
        Token {
            kind: TokenKind::Number,
            start: 0,
            len: 6
        }
    );
    lex_test!(
        parse_number_exp,
        "1e-10",
        Token {
            kind: TokenKind::Number,
            start: 0,
            len: 5
        }
    );
    lex_test!(
        parse_number_negative,
        "-3",
        Token {
            kind: TokenKind::Number,
            start: 0,
            len: 2
        }
    );
    lex_test!(
        parse_number_int,
        "123",
        Token {
            kind: TokenKind::Number,
            start: 0,
            len: 3
        }
    );
    lex_test!(
        FAIL: parse_number_invalid,
        "12ab",
        Error::InvalidNumber {
            pos: 0,
            text: "12ab".to_string()
        }
    );
    lex_test!(
        FAIL: parse_number_sign_only,
        "-",
        Error::InvalidNumber {
            pos: 0,
            text: "-".to_string()
        }
    );
    lex_test!(
        parse_identifier,
        "first_name",
        Token {
            kind: TokenKind::Identifier,
            start: 0,
            len: 10
        }
    );
    lex_test!(
        parse_identifier_dash_digits,
        "x-ray2",
        Token {
            kind: TokenKind::Identifier,
            start: 0,
            len: 6
        }
    );
    lex_test!(
        parse_identifier_unicode,
        "naïve",
        Token {
            kind: TokenKind::Identifier,
            start: 0,
            len: 6
        }
    );
    lex_test!(
        parse_string,
        r#""quoted""#,
        Token {
            kind: TokenKind::QuotedString,
            start: 0,
            len: 8
        }
    );
    lex_test!(
        parse_string_single_quoted,
        "'a b'",
        Token {
            kind: TokenKind::QuotedString,
            start: 0,
            len: 5
        }
    );
    lex_test!(
        parse_string_escaped_quote,
        r#""a\"b""#,
        Token {
            kind: TokenKind::QuotedString,
            start: 0,
            len: 6
        }
    );
    lex_test!(
        parse_string_blank,
        r#""""#,
        Token {
            kind: TokenKind::QuotedString,
            start: 0,
            len: 2
        }
    );
    lex_test!(
        FAIL: parse_string_unterminated,
        r#"a["dfg"#,
        Error::UnterminatedString {
            pos: 2,
            text: r#""dfg"#.to_string()
        }
    );
    lex_test!(
        FAIL: parse_string_unterminated2,
        r#"""#,
        Error::UnterminatedString {
            pos: 0,
            text: r#"""#.to_string()
        }
    );
    lex_test!(
        FAIL: parse_string_escaped_terminator,
        r#""abc\""#,
        Error::UnterminatedString {
            pos: 0,
            text: r#""abc\""#.to_string()
        }
    );
    lex_test!(
        parse_equals_single,
        "=",
        Token {
            kind: TokenKind::Equals,
            start: 0,
            len: 1
        }
    );
    lex_test!(
        parse_equals,
        "==",
        Token {
            kind: TokenKind::Equals,
            start: 0,
            len: 2
        }
    );
    lex_test!(
        parse_star,
        "*",
        Token {
            kind: TokenKind::Star,
            start: 0,
            len: 1
        }
    );
    lex_test!(
        parse_at,
        "@",
        Token {
            kind: TokenKind::At,
            start: 0,
            len: 1
        }
    );
    lex_test!(
        FAIL: parse_unsupported,
        "a.b/c",
        Error::UnsupportedCharacter { pos: 3, ch: '/' }
    );

    // more complex
    lex_test!(
        parse_path,
        "a.b",
        Token {
            kind: TokenKind::Identifier,
            start: 0,
            len: 1
        },
        Token {
            kind: TokenKind::Dot,
            start: 1,
            len: 1
        },
        Token {
            kind: TokenKind::Identifier,
            start: 2,
            len: 1
        }
    );
    lex_test!(
        parse_index,
        "items[2].name",
        Token {
            kind: TokenKind::Identifier,
            start: 0,
            len: 5
        },
        Token {
            kind: TokenKind::OpenBracket,
            start: 5,
            len: 1
        },
        Token {
            kind: TokenKind::Number,
            start: 6,
            len: 1
        },
        Token {
            kind: TokenKind::CloseBracket,
            start: 7,
            len: 1
        },
        Token {
            kind: TokenKind::Dot,
            start: 8,
            len: 1
        },
        Token {
            kind: TokenKind::Identifier,
            start: 9,
            len: 4
        }
    );
    lex_test!(
        parse_predicate_with_whitespace,
        "items[ @foo = 1.5 ]",
        Token {
            kind: TokenKind::Identifier,
            start: 0,
            len: 5
        },
        Token {
            kind: TokenKind::OpenBracket,
            start: 5,
            len: 1
        },
        Token {
            kind: TokenKind::At,
            start: 7,
            len: 1
        },
        Token {
            kind: TokenKind::Identifier,
            start: 8,
            len: 3
        },
        Token {
            kind: TokenKind::Equals,
            start: 12,
            len: 1
        },
        Token {
            kind: TokenKind::Number,
            start: 14,
            len: 3
        },
        Token {
            kind: TokenKind::CloseBracket,
            start: 18,
            len: 1
        }
    );
    lex_test!(
        parse_number_then_dot_separator,
        "1.a",
        Token {
            kind: TokenKind::Number,
            start: 0,
            len: 1
        },
        Token {
            kind: TokenKind::Dot,
            start: 1,
            len: 1
        },
        Token {
            kind: TokenKind::Identifier,
            start: 2,
            len: 1
        }
    );

    #[test]
    fn error_position() {
        let err = tokenize("a[#]").unwrap_err();
        assert_eq!(2, err.position());
    }
}
