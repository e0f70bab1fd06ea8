//! Upload filename handling.

/// Video container extensions accepted for upload.
pub const ALLOWED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi"];

/// Lowercased extension after the last dot, if any.
pub fn extension_of(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Whether the client-supplied name carries an accepted video extension.
pub fn is_allowed_video(filename: &str) -> bool {
    extension_of(filename)
        .map(|ext| ALLOWED_VIDEO_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

/// Reduce a client-supplied name to a safe single path component.
///
/// Path separators and whitespace become `_`, anything outside ASCII
/// alphanumerics and `.-_` is dropped, and leading/trailing dots and
/// underscores are stripped. Returns an empty string when nothing survives.
pub fn sanitize_filename(filename: &str) -> String {
    let mapped: String = filename
        .split(|c: char| c == '/' || c == '\\' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();

    mapped.trim_matches(|c| c == '.' || c == '_').to_string()
}
