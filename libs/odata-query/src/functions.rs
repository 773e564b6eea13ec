//! Builtin `$filter` function library.
//!
//! Missing or mistyped arguments never fail a call; each function falls back to
//! a documented default instead (`false`, `0`, `-1` or `""`).

use std::borrow::Cow;
use std::collections::HashMap;

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::eval::Operand;
use crate::temporal::{self, MAX_DATETIME, MIN_DATETIME};

/// Signature of a filter function: evaluated arguments in, owned value out.
pub type BuiltinFn = for<'a> fn(&[Operand<'a>]) -> Operand<'static>;

static ABSENT: Operand<'static> = Operand::Absent;

/// Name → implementation table consulted for every `name(args)` call.
///
/// Lookups are case-insensitive; unknown names evaluate to `false`.
#[derive(Clone, Debug)]
pub struct FunctionTable {
    functions: HashMap<String, BuiltinFn>,
}

impl Default for FunctionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl FunctionTable {
    /// A table with no functions at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// The standard string, date-time and arithmetic functions.
    #[must_use]
    pub fn builtin() -> Self {
        Self::empty()
            .with("contains", contains)
            .with("startswith", startswith)
            .with("endswith", endswith)
            .with("length", length)
            .with("tolower", tolower)
            .with("toupper", toupper)
            .with("trim", trim)
            .with("substring", substring)
            .with("indexof", indexof)
            .with("concat", concat)
            .with("year", year)
            .with("month", month)
            .with("day", day)
            .with("hour", hour)
            .with("minute", minute)
            .with("second", second)
            .with("round", round)
            .with("floor", floor)
            .with("ceiling", ceiling)
            .with("now", now)
            .with("maxdatetime", maxdatetime)
            .with("mindatetime", mindatetime)
    }

    /// Add or replace a function.
    pub fn register(&mut self, name: &str, function: BuiltinFn) {
        self.functions.insert(name.to_ascii_lowercase(), function);
    }

    #[must_use]
    pub fn with(mut self, name: &str, function: BuiltinFn) -> Self {
        self.register(name, function);
        self
    }

    /// Dispatch a call by name.
    #[must_use]
    pub fn call(&self, name: &str, args: &[Operand<'_>]) -> Operand<'static> {
        match self.functions.get(&name.to_ascii_lowercase()) {
            Some(function) => function(args),
            None => {
                tracing::trace!(function = name, "unknown $filter function");
                Operand::Bool(false)
            }
        }
    }
}

fn arg<'s, 'a>(args: &'s [Operand<'a>], index: usize) -> &'s Operand<'a> {
    args.get(index).unwrap_or(&ABSENT)
}

fn text(value: String) -> Operand<'static> {
    Operand::String(Cow::Owned(value))
}

fn count_to_number(count: usize) -> f64 {
    u32::try_from(count).map_or(f64::from(u32::MAX), f64::from)
}

/// Clamp a numeric argument to a char index: negative and NaN become 0.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // saturating cast of a non-negative float
fn to_index(n: f64) -> usize {
    if n > 0.0 { n.floor() as usize } else { 0 }
}

fn string_test(args: &[Operand<'_>], test: fn(&str, &str) -> bool) -> Operand<'static> {
    if args.len() < 2 {
        return Operand::Bool(false);
    }
    Operand::Bool(test(&arg(args, 0).as_text(), &arg(args, 1).as_text()))
}

fn contains(args: &[Operand<'_>]) -> Operand<'static> {
    string_test(args, |haystack, needle| haystack.contains(needle))
}

fn startswith(args: &[Operand<'_>]) -> Operand<'static> {
    string_test(args, |haystack, prefix| haystack.starts_with(prefix))
}

fn endswith(args: &[Operand<'_>]) -> Operand<'static> {
    string_test(args, |haystack, suffix| haystack.ends_with(suffix))
}

fn length(args: &[Operand<'_>]) -> Operand<'static> {
    Operand::Number(count_to_number(arg(args, 0).as_text().chars().count()))
}

fn tolower(args: &[Operand<'_>]) -> Operand<'static> {
    text(arg(args, 0).as_text().to_lowercase())
}

fn toupper(args: &[Operand<'_>]) -> Operand<'static> {
    text(arg(args, 0).as_text().to_uppercase())
}

fn trim(args: &[Operand<'_>]) -> Operand<'static> {
    text(arg(args, 0).as_text().trim().to_owned())
}

/// `substring(s, start[, length])`, counted in chars and clamped to the string.
fn substring(args: &[Operand<'_>]) -> Operand<'static> {
    let source = arg(args, 0).as_text();
    let start = to_index(arg(args, 1).as_number().unwrap_or(0.0));
    let chars = source.chars().skip(start);
    let result: String = match args.get(2) {
        Some(len) => chars
            .take(to_index(len.as_number().unwrap_or(0.0)))
            .collect(),
        None => chars.collect(),
    };
    text(result)
}

fn indexof(args: &[Operand<'_>]) -> Operand<'static> {
    if args.len() < 2 {
        return Operand::Number(-1.0);
    }
    let haystack = arg(args, 0).as_text();
    let needle = arg(args, 1).as_text();
    let index = haystack
        .find(needle.as_ref())
        .map_or(-1.0, |byte| count_to_number(haystack[..byte].chars().count()));
    Operand::Number(index)
}

fn concat(args: &[Operand<'_>]) -> Operand<'static> {
    text(args.iter().map(Operand::as_text).collect())
}

fn date_part(args: &[Operand<'_>], part: fn(DateTime<Utc>) -> u32) -> Operand<'static> {
    let value = arg(args, 0).as_datetime().map_or(0, part);
    Operand::Number(f64::from(value))
}

fn year(args: &[Operand<'_>]) -> Operand<'static> {
    let value = arg(args, 0).as_datetime().map_or(0, |dt| dt.year());
    Operand::Number(f64::from(value))
}

fn month(args: &[Operand<'_>]) -> Operand<'static> {
    date_part(args, |dt| dt.month())
}

fn day(args: &[Operand<'_>]) -> Operand<'static> {
    date_part(args, |dt| dt.day())
}

fn hour(args: &[Operand<'_>]) -> Operand<'static> {
    date_part(args, |dt| dt.hour())
}

fn minute(args: &[Operand<'_>]) -> Operand<'static> {
    date_part(args, |dt| dt.minute())
}

fn second(args: &[Operand<'_>]) -> Operand<'static> {
    date_part(args, |dt| dt.second())
}

fn round(args: &[Operand<'_>]) -> Operand<'static> {
    Operand::Number(arg(args, 0).as_number().map_or(0.0, f64::round))
}

fn floor(args: &[Operand<'_>]) -> Operand<'static> {
    Operand::Number(arg(args, 0).as_number().map_or(0.0, f64::floor))
}

fn ceiling(args: &[Operand<'_>]) -> Operand<'static> {
    Operand::Number(arg(args, 0).as_number().map_or(0.0, f64::ceil))
}

fn now(_args: &[Operand<'_>]) -> Operand<'static> {
    text(temporal::format_timestamp(&Utc::now()))
}

fn maxdatetime(_args: &[Operand<'_>]) -> Operand<'static> {
    Operand::String(Cow::Borrowed(MAX_DATETIME))
}

fn mindatetime(_args: &[Operand<'_>]) -> Operand<'static> {
    Operand::String(Cow::Borrowed(MIN_DATETIME))
}
