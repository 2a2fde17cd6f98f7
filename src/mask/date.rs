//! `date[format]` rendering with moment-style format tokens.
//!
//! Supported tokens: `YYYY YY MMMM MMM MM M DDDD DDD Do DD D dddd ddd dd d
//! HH H hh h mm m ss s SSS A a X x ZZ Z`. Text inside `[...]` is emitted
//! verbatim; any other character is copied as-is.

use chrono::{DateTime, Datelike, TimeZone, Timelike};
use std::fmt::Display;

pub const DEFAULT_DATE_FORMAT: &str = "YYYY-MM-DD";

/// Longest tokens first so `YYYY` wins over `YY` and `Do` over `D`
const TOKENS: &[&str] = &[
    "YYYY", "MMMM", "DDDD", "dddd", "MMM", "DDD", "ddd", "SSS", "YY", "MM", "Do", "DD", "dd",
    "HH", "hh", "mm", "ss", "ZZ", "M", "D", "d", "H", "h", "m", "s", "A", "a", "X", "x", "Z",
];

pub fn format_moment<Tz>(dt: &DateTime<Tz>, format: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    let mut rest = format;

    while let Some(c) = rest.chars().next() {
        if c == '[' {
            if let Some(end) = rest.find(']') {
                out.push_str(&rest[1..end]);
                rest = &rest[end + 1..];
                continue;
            }
        }

        match TOKENS.iter().find(|token| rest.starts_with(**token)) {
            Some(token) => {
                out.push_str(&render_token(dt, token));
                rest = &rest[token.len()..];
            }
            None => {
                out.push(c);
                rest = &rest[c.len_utf8()..];
            }
        }
    }

    out
}

fn render_token<Tz>(dt: &DateTime<Tz>, token: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match token {
        "YYYY" => format!("{:04}", dt.year()),
        "YY" => format!("{:02}", dt.year().rem_euclid(100)),
        "MMMM" => dt.format("%B").to_string(),
        "MMM" => dt.format("%b").to_string(),
        "MM" => format!("{:02}", dt.month()),
        "M" => dt.month().to_string(),
        "DDDD" => format!("{:03}", dt.ordinal()),
        "DDD" => dt.ordinal().to_string(),
        "Do" => ordinal(dt.day()),
        "DD" => format!("{:02}", dt.day()),
        "D" => dt.day().to_string(),
        "dddd" => dt.format("%A").to_string(),
        "ddd" => dt.format("%a").to_string(),
        "dd" => dt.format("%a").to_string().chars().take(2).collect(),
        "d" => dt.weekday().num_days_from_sunday().to_string(),
        "HH" => format!("{:02}", dt.hour()),
        "H" => dt.hour().to_string(),
        "hh" => format!("{:02}", dt.hour12().1),
        "h" => dt.hour12().1.to_string(),
        "mm" => format!("{:02}", dt.minute()),
        "m" => dt.minute().to_string(),
        "ss" => format!("{:02}", dt.second()),
        "s" => dt.second().to_string(),
        "SSS" => format!("{:03}", dt.timestamp_subsec_millis().min(999)),
        "A" => (if dt.hour12().0 { "PM" } else { "AM" }).to_string(),
        "a" => (if dt.hour12().0 { "pm" } else { "am" }).to_string(),
        "X" => dt.timestamp().to_string(),
        "x" => dt.timestamp_millis().to_string(),
        "ZZ" => dt.format("%z").to_string(),
        "Z" => dt.format("%:z").to_string(),
        other => other.to_string(),
    }
}

fn ordinal(day: u32) -> String {
    let suffix = match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", day, suffix)
}
