//! Constrained evaluation of script fragments scraped from share pages
//!
//! Share pages build their ajax payload in inline script. None of that script
//! is ever run. Three shapes are understood and everything else is rejected:
//!
//! - a quoted literal assigned to a variable (`var sign = 'AbC/+='`)
//! - the concatenation of two captured literals
//! - a flat object literal whose values are string or number literals, or
//!   names bound to captured literals

use regex::Regex;
use thiserror::Error;

use super::extract::{find_first, Pattern};

/// A string literal captured from a page.
///
/// Only the capture functions below construct one, so concatenation can never
/// involve caller input or computed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal(String);

impl Literal {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Plain string concatenation of two captured literals
    pub fn concat(&self, other: &Literal) -> String {
        let mut joined = String::with_capacity(self.0.len() + other.0.len());
        joined.push_str(&self.0);
        joined.push_str(&other.0);
        joined
    }
}

/// `name = '<literal>'`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: Literal,
}

/// Capture an assignment with a two-group pattern (name, literal)
pub fn capture_assignment(pattern: Pattern, text: &str) -> Option<Assignment> {
    let caps = pattern.regex().captures(text)?;
    Some(Assignment {
        name: caps.get(1)?.as_str().to_string(),
        value: Literal(caps.get(2)?.as_str().to_string()),
    })
}

/// Capture the first group of a pattern as a literal
pub fn capture_literal(pattern: Pattern, text: &str) -> Option<Literal> {
    find_first(pattern, text).map(|s| Literal(s.to_string()))
}

/// Find `var <name> = '<literal>'` outside commented lines.
///
/// The literal must stay within letters, digits and `/ + = _ ? -`; it may be
/// empty.
pub fn lookup_assignment(text: &str, name: &str) -> Option<Literal> {
    let pattern = format!(
        r"[^/]{{2,}}? *?var +{} *?= *?'([\w/+=?\-]*)'",
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(text)?;
    Some(Literal(caps.get(1)?.as_str().to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiteralError {
    #[error("malformed object literal at offset {offset}: {reason}")]
    Malformed { offset: usize, reason: String },

    #[error("non-literal expression: {0}")]
    NonLiteral(String),

    #[error("`{0}` is not bound to a captured literal")]
    Unbound(String),
}

/// Value position of a flat object literal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiteralValue {
    Str(String),
    /// Numeric literal, kept as written
    Num(String),
    /// Bare name, to be bound to a captured literal
    Name(String),
}

/// Parsed `{ key: value, ... }` fragment, in source order
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ObjectLiteral {
    entries: Vec<(String, LiteralValue)>,
}

impl ObjectLiteral {
    /// Parse a flat object literal.
    ///
    /// Keys are quoted strings or bare names. Values are quoted strings
    /// without escapes, numbers, or bare names. A repeated key keeps its first
    /// position and its last value.
    pub fn parse(fragment: &str) -> Result<Self, LiteralError> {
        let mut s = Scanner::new(fragment.trim());
        let mut entries: Vec<(String, LiteralValue)> = Vec::new();

        s.expect('{')?;
        loop {
            s.skip_ws();
            match s.peek() {
                Some('}') => {
                    s.bump();
                    break;
                }
                None => return Err(s.malformed("unterminated object")),
                _ => {}
            }

            let key = match s.peek() {
                Some(q @ ('\'' | '"')) => s.quoted(q)?,
                _ => s.name().ok_or_else(|| s.malformed("expected a key"))?,
            };

            s.skip_ws();
            s.expect(':')?;
            s.skip_ws();

            let value = match s.peek() {
                Some(q @ ('\'' | '"')) => LiteralValue::Str(s.quoted(q)?),
                Some(c) if c.is_ascii_digit() || c == '-' => LiteralValue::Num(s.number()?),
                Some(c) if is_name_start(c) => {
                    LiteralValue::Name(s.name().ok_or_else(|| s.malformed("expected a name"))?)
                }
                Some(c) => {
                    return Err(LiteralError::NonLiteral(format!(
                        "value of `{}` starts with `{}`",
                        key, c
                    )))
                }
                None => return Err(s.malformed("missing value")),
            };

            s.skip_ws();
            match s.peek() {
                Some(',') => {
                    s.bump();
                }
                Some('}') => {}
                Some(c) => {
                    return Err(LiteralError::NonLiteral(format!(
                        "`{}` after value of `{}`",
                        c, key
                    )))
                }
                None => return Err(s.malformed("unterminated object")),
            }

            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => entries.push((key, value)),
            }
        }

        s.skip_ws();
        if s.peek().is_some() {
            return Err(s.malformed("content after closing brace"));
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[(String, LiteralValue)] {
        &self.entries
    }

    /// Names the object refers to, in order of appearance
    pub fn referenced_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|(_, v)| match v {
            LiteralValue::Name(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Resolve every name through `lookup` and return the flat mapping.
    ///
    /// Fails on the first name `lookup` cannot bind.
    pub fn bind<F>(&self, mut lookup: F) -> Result<Vec<(String, String)>, LiteralError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        self.entries
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    LiteralValue::Str(s) | LiteralValue::Num(s) => s.clone(),
                    LiteralValue::Name(name) => {
                        lookup(name).ok_or_else(|| LiteralError::Unbound(name.clone()))?
                    }
                };
                Ok((key.clone(), value))
            })
            .collect()
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
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

    fn malformed(&self, reason: &str) -> LiteralError {
        LiteralError::Malformed {
            offset: self.pos,
            reason: reason.to_string(),
        }
    }

    fn expect(&mut self, want: char) -> Result<(), LiteralError> {
        match self.peek() {
            Some(c) if c == want => {
                self.bump();
                Ok(())
            }
            Some(c) => Err(self.malformed(&format!("expected `{}`, found `{}`", want, c))),
            None => Err(self.malformed(&format!("expected `{}`, found end of input", want))),
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String, LiteralError> {
        self.bump();
        let start = self.pos;
        loop {
            match self.bump() {
                Some(c) if c == quote => {
                    return Ok(self.text[start..self.pos - c.len_utf8()].to_string());
                }
                Some('\\') => {
                    return Err(LiteralError::NonLiteral("escape sequence in string".into()));
                }
                Some('\n') | None => return Err(self.malformed("unterminated string")),
                Some(_) => {}
            }
        }
    }

    fn name(&mut self) -> Option<String> {
        let start = self.pos;
        if !matches!(self.peek(), Some(c) if is_name_start(c)) {
            return None;
        }
        while matches!(self.peek(), Some(c) if is_name_char(c)) {
            self.bump();
        }
        Some(self.text[start..self.pos].to_string())
    }

    fn number(&mut self) -> Result<String, LiteralError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.bump();
        }
        let digits = self.digits();
        if digits == 0 {
            return Err(self.malformed("expected a digit"));
        }
        if self.peek() == Some('.') {
            self.bump();
            if self.digits() == 0 {
                return Err(self.malformed("expected a digit after `.`"));
            }
        }
        if matches!(self.peek(), Some(c) if is_name_char(c)) {
            return Err(self.malformed("invalid number"));
        }
        Ok(self.text[start..self.pos].to_string())
    }

    fn digits(&mut self) -> usize {
        let mut count = 0;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
            count += 1;
        }
        count
    }
}
