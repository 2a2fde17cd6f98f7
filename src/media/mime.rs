//! Mime type to file extension table.
//!
//! Used to give data: URLs and extension-less media sources a usable extension.

const MIME_TO_EXT: &[(&str, &str)] = &[
    // Images
    ("image/jpg", "jpg"),
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/gif", "gif"),
    ("image/svg", "svg"),
    ("image/bmp", "bmp"),
    // Scraped <img> without a declared type; most likely a jpeg
    ("image/unknown", "jpg"),
    // Video
    ("video/webm", "webm"),
    ("video/mkv", "mkv"),
    ("video/mp4", "mp4"),
    ("video/mpg", "mpg"),
    ("video/mpeg", "mpeg"),
    // Audio
    ("audio/mp3", "mp3"),
    ("audio/mp4", "mp4"),
    ("audio/aac", "aac"),
    ("audio/flac", "flac"),
    ("audio/wav", "wav"),
    // Documents
    ("text/plain", "txt"),
    ("text/csv", "csv"),
    ("text/json", "json"),
    ("text/html", "html"),
    ("application/json", "json"),
];

/// Look up the extension for a mime type (exact, case-sensitive match).
pub fn extension_for_mime(mime: Option<&str>) -> Option<&'static str> {
    let mime = mime?;
    MIME_TO_EXT
        .iter()
        .find(|(known, _)| *known == mime)
        .map(|(_, ext)| *ext)
}
