use chrono::DateTime;
use filetime::{set_file_mtime, FileTime};
use std::path::Path;

/// Apply a `Last-Modified` response header to a downloaded file.
///
/// Returns `Ok(true)` when the header parsed and the mtime was set.
/// Unparseable headers are ignored.
pub fn apply_last_modified(path: &Path, last_modified: Option<&str>) -> std::io::Result<bool> {
    let Some(date_str) = last_modified else {
        return Ok(false);
    };

    // RFC 7231 dates are RFC 2822 compatible
    match DateTime::parse_from_rfc2822(date_str) {
        Ok(dt) => {
            set_file_mtime(path, FileTime::from_unix_time(dt.timestamp(), 0))?;
            Ok(true)
        }
        Err(e) => {
            tracing::debug!("Ignoring unparseable Last-Modified '{}': {}", date_str, e);
            Ok(false)
        }
    }
}
