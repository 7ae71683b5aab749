//! Asset URL helpers

/// Join a server-relative image path onto the API base URL.
///
/// Backslashes become forward slashes and the two halves are joined by
/// exactly one slash. Absolute `http(s)://` URLs and paths already joined to
/// `base` are returned as they are, so applying this twice is harmless.
pub fn normalize_asset_url(base: &str, path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    if path.starts_with("http://") || path.starts_with("https://") {
        return path;
    }

    let base = base.trim().trim_end_matches('/');
    if !base.is_empty() && path.strip_prefix(base).is_some_and(|rest| rest.starts_with('/')) {
        return path;
    }
    let relative = path.trim_start_matches('/');
    if base.is_empty() {
        return format!("/{}", relative);
    }
    format!("{}/{}", base, relative)
}
