//! Named page patterns and first-match extraction
//!
//! Share pages are obfuscated and their markup drifts. Each pattern is kept
//! loose (minimum-length wildcards rather than exact literals) and is known by
//! name, so a miss reports which contract broke instead of a raw regex.
//!
//! Patterns that start with `[^/]{2,}?` refuse to match on `//`-commented
//! lines, which the service sprinkles with decoy values.

use regex::Regex;
use std::sync::OnceLock;

use super::error::ResolveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Desktop password page: `data : '<token>'+pwd`
    PasswordToken,
    /// Desktop share page: iframe pointing at the framed download page
    FrameSource,
    /// Framed page: `var <name> = '?<1..10 chars>'`, groups (name, literal)
    ShortSign,
    /// Framed page: `var <name> = '<20+ chars>'`, groups (name, literal)
    LongSign,
    /// Any page: the `data : { ... }` ajax payload
    DataObject,
    /// Desktop-style id on mobile: `var <name> = 'tp/<id>'`
    MobileRedirect,
    /// Mobile page: `var <name> = 'http...'`
    UrlPrefix,
    /// Mobile page: `var <name> = '?<20+ chars>'`
    QuerySuffix,
}

impl Pattern {
    const ALL: [Pattern; 8] = [
        Pattern::PasswordToken,
        Pattern::FrameSource,
        Pattern::ShortSign,
        Pattern::LongSign,
        Pattern::DataObject,
        Pattern::MobileRedirect,
        Pattern::UrlPrefix,
        Pattern::QuerySuffix,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Pattern::PasswordToken => "password token",
            Pattern::FrameSource => "frame source",
            Pattern::ShortSign => "short sign literal",
            Pattern::LongSign => "long sign literal",
            Pattern::DataObject => "data object",
            Pattern::MobileRedirect => "mobile redirect",
            Pattern::UrlPrefix => "url prefix",
            Pattern::QuerySuffix => "query suffix",
        }
    }

    fn source(self) -> &'static str {
        match self {
            Pattern::PasswordToken => r"[^/]{2,}? *?data *?: *?'(.{20,}?)'\+pwd",
            Pattern::FrameSource => r#"src="(.{20,}?)" frameborder"#,
            Pattern::ShortSign => r"[^/]{2,}? *?var +?([\w$]+) *?= *?'(\?[\w/+=]{1,10}?)'",
            Pattern::LongSign => r"[^/]{2,}? *?var +?([\w$]+) *?= *?'([\w/+=]{20,}?)'",
            Pattern::DataObject => r"[^/]{2,}? *?data *?: *?(\{.+?\})",
            Pattern::MobileRedirect => r"[^/]{2,}? *?var .+? *?= *?'tp/(.+?)'",
            Pattern::UrlPrefix => r"[^/]{2,}? *?var .+? *?= *?'(http[\w\-/:.]{10,}?)'",
            Pattern::QuerySuffix => r"[^/]{2,}? *?var .+? *?= *?'(\?[\w/+=]{20,}?)'",
        }
    }

    /// Compiled regex, shared process-wide
    pub fn regex(self) -> &'static Regex {
        static COMPILED: OnceLock<Vec<Regex>> = OnceLock::new();

        let compiled = COMPILED.get_or_init(|| {
            Pattern::ALL
                .iter()
                .map(|p| Regex::new(p.source()).unwrap())
                .collect()
        });
        &compiled[self as usize]
    }
}

/// First capture group of the leftmost match, if any
pub fn find_first(pattern: Pattern, text: &str) -> Option<&str> {
    pattern
        .regex()
        .captures(text)?
        .get(1)
        .map(|m| m.as_str())
}

/// Like [`find_first`], but a miss is a protocol mismatch
pub fn require(pattern: Pattern, text: &str) -> Result<&str, ResolveError> {
    find_first(pattern, text).ok_or(ResolveError::PatternMiss(pattern.name()))
}
