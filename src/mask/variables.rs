use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use url::Url;

use super::date::{DEFAULT_DATE_FORMAT, format_moment};
use super::error::{BAD_PARAM, MaskError};
use super::tokenize::parse_variable;
use super::value::Value;
use crate::media::MediaItem;

/// Produces the initial value of a placeholder pipeline
pub type VariableFn = Arc<dyn Fn(&MediaItem) -> Value + Send + Sync>;

/// Resolve a variable definition such as `file` or `itemUrl[hostname]`.
///
/// `inum` is the mask's shared auto-increment counter.
pub fn resolve_variable(
    definition: &str,
    inum: &Arc<AtomicU64>,
) -> Result<VariableFn, MaskError> {
    let (name, parameter) = parse_variable(definition);
    let parameter = parameter.map(str::to_string);

    let func: VariableFn = match name {
        "empty" => Arc::new(|_: &MediaItem| Value::Empty),
        "file" => Arc::new(|item: &MediaItem| Value::text(&item.filename)),
        "ext" => Arc::new(|item: &MediaItem| Value::text(&item.extension)),
        "fileext" => Arc::new(|item: &MediaItem| Value::text(item.full_filename())),
        "alt" => Arc::new(|item: &MediaItem| Value::from_option(item.alt.as_deref())),
        "title" => Arc::new(|item: &MediaItem| Value::from_option(item.title.as_deref())),
        "text" => Arc::new(|item: &MediaItem| Value::from_option(item.text.as_deref())),
        "width" => Arc::new(|item: &MediaItem| number(item.width)),
        "height" => Arc::new(|item: &MediaItem| number(item.height)),
        "itemUrl" => Arc::new(move |item: &MediaItem| {
            url_as_variable(Some(&item.url), parameter.as_deref())
        }),
        "frameUrl" => Arc::new(move |item: &MediaItem| {
            url_as_variable(item.frame_url.as_ref(), parameter.as_deref())
        }),
        "tabUrl" => Arc::new(move |item: &MediaItem| {
            url_as_variable(item.tab_url.as_ref(), parameter.as_deref())
        }),
        "frameTitle" => {
            Arc::new(|item: &MediaItem| Value::from_option(item.frame_title.as_deref()))
        }
        "tabTitle" => Arc::new(|item: &MediaItem| Value::from_option(item.tab_title.as_deref())),
        "inum" => {
            let counter = Arc::clone(inum);
            Arc::new(move |item: &MediaItem| {
                if item.selected {
                    Value::Number(counter.fetch_add(1, Ordering::Relaxed) as f64)
                } else {
                    Value::Number(0.0)
                }
            })
        }
        "date" => {
            let format = match parameter {
                Some(format) if !format.is_empty() => format,
                _ => DEFAULT_DATE_FORMAT.to_string(),
            };
            Arc::new(move |_: &MediaItem| {
                Value::Text(format_moment(&chrono::Local::now(), &format))
            })
        }
        _ => return Err(MaskError::BadVariable(name.to_string())),
    };

    Ok(func)
}

fn number(n: Option<u32>) -> Value {
    n.map(|n| Value::Number(n as f64)).unwrap_or(Value::Empty)
}

/// Read a property of a URL by its browser `URL` interface name.
///
/// `search.<name>` reads a single query parameter. A missing or unknown
/// parameter yields the `BADPARAM` sentinel; an opaque origin is empty.
pub fn url_as_variable(url: Option<&Url>, parameter: Option<&str>) -> Value {
    let Some(parameter) = parameter.filter(|p| !p.is_empty()) else {
        return Value::text(BAD_PARAM);
    };

    if parameter.starts_with("search") {
        let Some(url) = url else {
            return Value::Empty;
        };
        return match parameter.split('.').nth(1) {
            Some(name) => Value::from_option(
                url.query_pairs()
                    .find(|(key, _)| key == name)
                    .map(|(_, value)| value.into_owned())
                    .as_deref(),
            ),
            None => Value::text(search(url)),
        };
    }

    let Some(property) = url_property(parameter) else {
        return Value::text(BAD_PARAM);
    };
    match url {
        Some(url) => Value::text(property(url)).normalize(),
        None => Value::Empty,
    }
}

fn url_property(name: &str) -> Option<fn(&Url) -> String> {
    let property: fn(&Url) -> String = match name {
        "href" => |url| url.as_str().to_string(),
        "origin" => |url| {
            let origin = url.origin().ascii_serialization();
            if origin == "null" { String::new() } else { origin }
        },
        "protocol" => |url| format!("{}:", url.scheme()),
        "username" => |url| url.username().to_string(),
        "password" => |url| url.password().unwrap_or_default().to_string(),
        "host" => |url| match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            _ => String::new(),
        },
        "hostname" => |url| url.host_str().unwrap_or_default().to_string(),
        "port" => |url| url.port().map(|p| p.to_string()).unwrap_or_default(),
        "pathname" => |url| url.path().to_string(),
        "hash" => |url| match url.fragment() {
            Some(fragment) if !fragment.is_empty() => format!("#{}", fragment),
            _ => String::new(),
        },
        _ => return None,
    };
    Some(property)
}

fn search(url: &Url) -> String {
    match url.query() {
        Some(query) if !query.is_empty() => format!("?{}", query),
        _ => String::new(),
    }
}
