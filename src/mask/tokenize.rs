//! Lexing helpers for placeholder bodies.
//!
//! A placeholder body such as `title|replace:/a|b/:x` is split on `|` into
//! pipeline stages and each stage on `:` into a filter name and arguments.
//! Text between unescaped forward slashes is a regex argument and is never
//! split, and `\` followed by the separator yields a literal separator.

use regex::{Regex, RegexBuilder};

/// Split `input` on `separator`, keeping `/.../` regions intact.
///
/// Empty tokens are dropped. Backslashes are preserved except when they
/// escape the separator outside a regex region.
pub fn tokenize(input: &str, separator: char) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut token = String::new();
    let mut escaped = false;
    let mut in_regex = false;

    for c in input.chars() {
        if c == '\\' && !escaped {
            escaped = true;
            token.push(c);
            continue;
        }

        if c == '/' && !escaped {
            in_regex = !in_regex;
        }

        if c == separator && !in_regex {
            if escaped {
                // Replace the escaping backslash with the literal separator
                token.pop();
                token.push(c);
            } else if !token.is_empty() {
                tokens.push(std::mem::take(&mut token));
            }
        } else {
            token.push(c);
        }

        escaped = false;
    }

    if !token.is_empty() {
        tokens.push(token);
    }

    tokens
}

/// Split `name[param]` into the name and the optional bracketed parameter.
pub fn parse_variable(definition: &str) -> (&str, Option<&str>) {
    let Some(start) = definition.find('[') else {
        return (definition, None);
    };
    match definition[start + 1..].find(']') {
        Some(len) => (&definition[..start], Some(&definition[start + 1..start + 1 + len])),
        None => (definition, None),
    }
}

/// A filter argument that is either literal text or a compiled regex
#[derive(Debug, Clone)]
pub enum SearchTerm {
    Literal(String),
    Pattern { regex: Regex, global: bool },
}

/// Parse a filter argument written as `/pattern/flags` into a regex.
///
/// Arguments that do not start with `/` are literal; a leading `\/` forces a
/// literal and drops the backslash. Flags default to `gi` when omitted.
/// Returns `None` for an invalid pattern or flag.
pub fn parse_search_term(arg: &str) -> Option<SearchTerm> {
    if arg.starts_with("\\/") {
        return Some(SearchTerm::Literal(arg[1..].to_string()));
    }

    match arg.rfind('/') {
        Some(end) if end != 0 && arg.starts_with('/') => {
            let flags = match &arg[end + 1..] {
                "" => "gi",
                flags => flags,
            };
            compile_pattern(&arg[1..end], flags)
        }
        _ => Some(SearchTerm::Literal(arg.to_string())),
    }
}

fn compile_pattern(pattern: &str, flags: &str) -> Option<SearchTerm> {
    let mut builder = RegexBuilder::new(pattern);
    let mut global = false;
    let mut seen = String::new();

    for flag in flags.chars() {
        if seen.contains(flag) {
            return None;
        }
        seen.push(flag);

        match flag {
            'g' => global = true,
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            // Unicode is always on; sticky matching has no counterpart
            'u' | 'y' => {}
            _ => return None,
        }
    }

    builder
        .build()
        .ok()
        .map(|regex| SearchTerm::Pattern { regex, global })
}
