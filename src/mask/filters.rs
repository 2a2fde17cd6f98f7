use regex::Regex;
use std::sync::atomic::AtomicU64;
use std::sync::{Arc, LazyLock};

use super::error::{BAD_ARGUMENT, BAD_REGEX, MaskError};
use super::tokenize::{SearchTerm, parse_search_term, tokenize};
use super::value::Value;
use super::variables::resolve_variable;
use crate::media::MediaItem;

static FOLDER_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/+").expect("Invalid regex pattern"));

/// One pipeline stage
pub type FilterFn = Box<dyn Fn(Value, &MediaItem) -> Value + Send + Sync>;

/// Compile a filter definition such as `limit:10` or `replace:/\s+/:_`.
pub fn compile_filter(definition: &str, inum: &Arc<AtomicU64>) -> Result<FilterFn, MaskError> {
    let mut tokens = tokenize(definition, ':').into_iter();
    let name = tokens.next().unwrap_or_default();
    let args: Vec<String> = tokens.collect();
    let arg = |index: usize| args.get(index).map(String::as_str);

    let filter: FilterFn = match name.as_str() {
        "def" => {
            let default = arg(0).unwrap_or_default().to_string();
            Box::new(move |input: Value, _: &MediaItem| {
                if input.is_empty() {
                    Value::text(default.as_str())
                } else {
                    input
                }
            })
        }
        "defVar" => {
            let fallback = resolve_variable(arg(0).unwrap_or("empty"), inum).ok();
            Box::new(move |input: Value, item: &MediaItem| {
                if !input.is_empty() {
                    return input;
                }
                match &fallback {
                    Some(variable) => variable(item),
                    None => Value::text(BAD_ARGUMENT),
                }
            })
        }
        "limit" => {
            let length = parse_length(arg(0));
            Box::new(move |input: Value, _: &MediaItem| match length {
                Some(length) => Value::Text(input.into_text().chars().take(length).collect()),
                None => input,
            })
        }
        "trim" => Box::new(|input: Value, _: &MediaItem| {
            Value::text(input.into_text().trim())
        }),
        "lower" => Box::new(|input: Value, _: &MediaItem| {
            Value::Text(input.into_text().to_lowercase())
        }),
        "upper" => Box::new(|input: Value, _: &MediaItem| {
            Value::Text(input.into_text().to_uppercase())
        }),
        "split" => {
            let separator = parse_search_term(arg(0).unwrap_or(","));
            let index = arg(1).map_or(Some(0), |i| i.trim().parse::<usize>().ok());
            Box::new(move |input: Value, _: &MediaItem| {
                let (Some(separator), Some(index)) = (&separator, index) else {
                    return match separator {
                        None => Value::text(BAD_REGEX),
                        Some(_) => Value::Empty,
                    };
                };
                Value::from_option(split_nth(&input.into_text(), separator, index).as_deref())
            })
        }
        "replace" => {
            let search = parse_search_term(arg(0).unwrap_or_default());
            let replacement = arg(1).unwrap_or_default().to_string();
            Box::new(move |input: Value, _: &MediaItem| match &search {
                Some(search) => Value::Text(replace(&input.into_text(), search, &replacement)),
                None => Value::text(BAD_REGEX),
            })
        }
        "noFolder" => Box::new(|input: Value, _: &MediaItem| {
            Value::Text(FOLDER_SEPARATORS.replace_all(&input.into_text(), "_").into_owned())
        }),
        _ => return Err(MaskError::BadFilter(name.clone())),
    };

    Ok(filter)
}

/// A finite numeric length; negatives clamp to zero and fractions truncate.
fn parse_length(arg: Option<&str>) -> Option<usize> {
    let arg = arg?.trim();
    let length = if arg.is_empty() { 0.0 } else { arg.parse::<f64>().ok()? };
    if !length.is_finite() {
        return None;
    }
    Some(length.max(0.0).floor() as usize)
}

fn split_nth(input: &str, separator: &SearchTerm, index: usize) -> Option<String> {
    match separator {
        SearchTerm::Literal(sep) if sep.is_empty() => {
            input.chars().nth(index).map(String::from)
        }
        SearchTerm::Literal(sep) => input.split(sep.as_str()).nth(index).map(str::to_string),
        SearchTerm::Pattern { regex, .. } => regex.split(input).nth(index).map(str::to_string),
    }
}

fn replace(input: &str, search: &SearchTerm, replacement: &str) -> String {
    match search {
        // An empty search places the replacement between every character
        SearchTerm::Literal(s) if s.is_empty() => input
            .chars()
            .map(String::from)
            .collect::<Vec<_>>()
            .join(replacement),
        SearchTerm::Literal(s) => input.replace(s.as_str(), replacement),
        SearchTerm::Pattern { regex, global } => {
            let replacement = regex_replacement(replacement);
            if *global {
                regex.replace_all(input, replacement.as_str()).into_owned()
            } else {
                regex.replace(input, replacement.as_str()).into_owned()
            }
        }
    }
}

/// Translate `$&`, `$1`..`$99` and `$$` into regex crate replacement syntax.
///
/// Any other `$` is escaped so it is emitted literally.
fn regex_replacement(replacement: &str) -> String {
    let mut out = String::with_capacity(replacement.len());
    let mut chars = replacement.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('$') => {
                chars.next();
                out.push_str("$$");
            }
            Some('&') => {
                chars.next();
                out.push_str("${0}");
            }
            Some(d) if d.is_ascii_digit() => {
                let mut group = String::new();
                while group.len() < 2 {
                    match chars.peek() {
                        Some(d) if d.is_ascii_digit() => {
                            group.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                out.push_str(&format!("${{{}}}", group));
            }
            _ => out.push_str("$$"),
        }
    }

    out
}
