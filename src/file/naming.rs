use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Characters replaced in directory components of a target path
const DIR_INVALID_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*'];
/// Characters replaced in the final component (backslash is a separator on Windows hosts)
const BASENAME_INVALID_CHARS: &[char] = &['<', '>', ':', '"', '|', '?', '*', '\\'];
static ABSOLUTE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\\{1,2}|/|[a-zA-Z]:)").expect("Invalid regex pattern")
});

/// Sanitize a single path component.
///
/// Only illegal and control characters and a leading `.` are touched, so a
/// component without them comes back unchanged.
fn sanitize_component(component: &str, invalid: &[char]) -> String {
    let mut result: String = component
        .chars()
        .map(|c| {
            if invalid.contains(&c) || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    // Hidden/relative components (".foo", "..") are neutralized
    if result.starts_with('.') {
        result.replace_range(..1, "_");
    }

    result
}

/// Sanitize a `/`-separated relative path component by component.
///
/// Directory components and the basename are cleaned independently, so a
/// mask that produces `a:b/c?.jpg` yields `a_b/c_.jpg` rather than collapsing
/// the directory structure.
pub fn sanitize_path(path: &str) -> String {
    let mut parts: Vec<&str> = path.split('/').collect();
    let basename = parts.pop().unwrap_or("");

    parts
        .into_iter()
        .map(|part| sanitize_component(part, DIR_INVALID_CHARS))
        .chain(std::iter::once(sanitize_component(basename, BASENAME_INVALID_CHARS)))
        .collect::<Vec<_>>()
        .join("/")
}

/// Sanitize a download directory (every component is treated as a directory).
pub fn sanitize_directory_path(path: &str) -> String {
    path.split('/')
        .map(|part| sanitize_component(part, DIR_INVALID_CHARS))
        .collect::<Vec<_>>()
        .join("/")
}

/// True if the path is absolute on any host (`/x`, `\x`, `\\server`, `C:`).
pub fn is_absolute_path(path: &str) -> bool {
    ABSOLUTE_PATH.is_match(path)
}

/// Join path parts with `/`, dropping parts that are empty or blank.
pub fn join_target_path<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .filter(|part| !part.trim().is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Adds Unix time in milliseconds to filename before the extension.
///
/// # Examples
///
/// ```ignore
/// let result = add_unix_millis_to_filename("AAA.jpg", 1768053096643);
/// assert_eq!(result, "AAA[1768053096643].jpg");
/// ```
fn add_unix_millis_to_filename(filename: &str, unix_millis: i64) -> String {
    let path = Path::new(filename);

    if let Some(extension) = path.extension() {
        // Has extension: AAA.jpg -> AAA[timestamp].jpg
        let stem = path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("");
        let ext = extension.to_str().unwrap_or("");
        format!("{}[{}].{}", stem, unix_millis, ext)
    } else {
        // No extension: AAA -> AAA[timestamp]
        format!("{}[{}]", filename, unix_millis)
    }
}

/// Ensures the file path is unique by adding Unix time in milliseconds to the file name if needed.
///
/// If a file already exists at `path`, appends `[unix_time_millis]` before the extension.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use grabbag::file::naming::ensure_unique_path;
///
/// // If /path/to/AAA.jpg exists this returns /path/to/AAA[1768053096643].jpg
/// let result = ensure_unique_path(Path::new("/path/to/AAA.jpg"));
/// ```
pub fn ensure_unique_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }

    let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
        return path.to_path_buf();
    };

    // Collision detected, add Unix time in milliseconds
    let unix_millis = chrono::Utc::now().timestamp_millis();
    path.with_file_name(add_unix_millis_to_filename(filename, unix_millis))
}
