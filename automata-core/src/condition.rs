//! Condition matching.
//!
//! A condition is a disjunction of shell-style glob patterns:
//!
//! ```text
//! pattern1 or pattern2 or ...
//! ```
//!
//! Each pattern is tested against the text form of an event, following
//! filesystem globbing rules:
//!
//! - `*` - any run of characters except `/`; `**` is the same as `*`
//! - `?` - any single character except `/`
//! - `[abc]`, `[a-z]` - character classes
//! - `[^abc]` - negated character class
//! - `\c` - the character `c` taken literally
//!
//! The separator is the literal string `" or "`, one space on each side.
//! Matching is case-sensitive. A pattern that fails to compile never matches.

use glob::{MatchOptions, Pattern};
use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

/// Separator between alternative patterns.
pub const OR_SEPARATOR: &str = " or ";

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// A compiled condition expression.
#[derive(Debug, Clone)]
pub struct Condition {
    when: String,
    /// One entry per alternative; `None` marks a malformed pattern.
    patterns: Vec<Option<Pattern>>,
}

impl Condition {
    /// Compiles a condition expression.
    pub fn new(when: impl Into<String>) -> Self {
        let when = when.into();
        let patterns = when
            .split(OR_SEPARATOR)
            .map(|raw| match compile(raw) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    tracing::warn!("Pattern '{}' in condition '{}' never matches: {}", raw, when, e);
                    None
                }
            })
            .collect();

        Self { when, patterns }
    }

    /// Returns the raw expression.
    pub fn when(&self) -> &str {
        &self.when
    }

    /// Returns true if any alternative matches `text`.
    pub fn matches(&self, text: &str) -> bool {
        self.patterns
            .iter()
            .flatten()
            .any(|pattern| pattern.matches_with(text, MATCH_OPTIONS))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.when)
    }
}

/// Tests `text` against the condition expression `expr` without keeping the
/// compiled form around.
pub fn matches(expr: &str, text: &str) -> bool {
    expr.split(OR_SEPARATOR).any(|raw| {
        compile(raw)
            .map(|pattern| pattern.matches_with(text, MATCH_OPTIONS))
            .unwrap_or(false)
    })
}

fn compile(raw: &str) -> Result<Pattern, String> {
    let translated = to_glob(raw).map_err(str::to_string)?;
    Pattern::new(&translated).map_err(|e| e.to_string())
}

type ClassChars<'a> = Peekable<Chars<'a>>;

/// Rewrites a condition pattern into the syntax [`Pattern`] accepts.
///
/// [`Pattern`] negates classes with `!`, has no escape character and
/// rejects `**` outside a whole path segment, so each of those is spelled
/// out explicitly here.
fn to_glob(raw: &str) -> Result<String, &'static str> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                while chars.next_if_eq(&'*').is_some() {}
                out.push('*');
            }
            '?' => out.push('?'),
            '\\' => push_literal(&mut out, chars.next().ok_or("trailing escape")?),
            '[' => {
                let (negated, members) = parse_class(&mut chars)?;
                push_class(&mut out, negated, members)?;
            }
            c => push_literal(&mut out, c),
        }
    }

    Ok(out)
}

fn push_literal(out: &mut String, c: char) {
    match c {
        '*' | '?' | '[' | ']' => {
            out.push('[');
            out.push(c);
            out.push(']');
        }
        c => out.push(c),
    }
}

/// Reads a class body up to and including its closing `]`.
fn parse_class(chars: &mut ClassChars<'_>) -> Result<(bool, Vec<(char, char)>), &'static str> {
    let negated = chars.next_if_eq(&'^').is_some();
    let mut members = Vec::new();

    loop {
        match chars.peek() {
            None => return Err("unclosed character class"),
            Some(']') if !members.is_empty() => {
                chars.next();
                return Ok((negated, members));
            }
            _ => {}
        }
        let lo = class_char(chars)?;
        let hi = match chars.next_if_eq(&'-') {
            Some(_) => class_char(chars)?,
            None => lo,
        };
        members.push((lo, hi));
    }
}

fn class_char(chars: &mut ClassChars<'_>) -> Result<char, &'static str> {
    match chars.next() {
        None => Err("unclosed character class"),
        Some('-') | Some(']') => Err("unescaped '-' or ']' in character class"),
        Some('\\') => chars.next().ok_or("trailing escape"),
        Some(c) => Ok(c),
    }
}

/// Writes a class so that [`Pattern`] reads back the same members.
///
/// `]` only survives as the first member and a leading `!` would negate, so
/// `]` is split out of every range and moved to the front, and every other
/// member is written as a `lo-hi` range.
fn push_class(
    out: &mut String,
    negated: bool,
    members: Vec<(char, char)>,
) -> Result<(), &'static str> {
    let mut close = false;
    let mut ranges = Vec::with_capacity(members.len());
    for (lo, hi) in members {
        if lo <= ']' && ']' <= hi {
            close = true;
            if lo < ']' {
                ranges.push((lo, '\\'));
            }
            if ']' < hi {
                ranges.push(('^', hi));
            }
        } else {
            ranges.push((lo, hi));
        }
    }

    if !negated && !close {
        match ranges.iter().position(|&(lo, _)| lo != '!') {
            Some(pos) => ranges.swap(0, pos),
            None => {
                // Every member starts at '!'.
                let hi = ranges.iter().map(|&(_, hi)| hi).max().unwrap_or('!');
                if hi == '!' {
                    out.push('!');
                    return Ok(());
                }
                ranges = vec![('"', hi), ('!', '!')];
            }
        }
    }

    if close {
        // A '-' right after the leading ']' would read as a range.
        match ranges.iter().position(|&(lo, _)| lo != '-') {
            Some(pos) => ranges.swap(0, pos),
            None if ranges.is_empty() => {}
            None => return Err("class of only ']' and '-' is not supported"),
        }
    }

    out.push('[');
    if negated {
        out.push('!');
    }
    if close {
        out.push(']');
    }
    for (lo, hi) in ranges {
        out.push(lo);
        out.push('-');
        out.push(hi);
    }
    out.push(']');
    Ok(())
}
