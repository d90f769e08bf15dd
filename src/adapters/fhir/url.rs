//! Endpoint URL normalisation
//!
//! Endpoint lists hold base URLs in many shapes (`example.com`,
//! `https://example.com/r4/`, `https://example.com/r4/metadata`). These helpers
//! produce the concrete URLs the querier requests.

/// Prepends `https://` when the URL has no scheme
pub fn normalize_url(url: &str) -> String {
    if url.starts_with("https://") || url.starts_with("http://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

/// Appends `segment` to the normalised URL unless it already ends with it
fn with_suffix(url: &str, segment: &str) -> String {
    let mut normalized = normalize_url(url);
    let bare = format!("/{segment}");
    let slashed = format!("/{segment}/");
    if !url.ends_with(&bare) && !url.ends_with(&slashed) {
        if !url.ends_with('/') {
            normalized.push('/');
        }
        normalized.push_str(segment);
    }
    normalized
}

/// Capability statement URL, `<base>/metadata`
pub fn metadata_url(url: &str) -> String {
    with_suffix(url, "metadata")
}

/// SMART configuration URL, `<base>/.well-known/smart-configuration`
pub fn well_known_url(url: &str) -> String {
    with_suffix(url, ".well-known/smart-configuration")
}

/// `$versions` operation URL, `<base>/$versions`
pub fn versions_url(url: &str) -> String {
    with_suffix(url, "$versions")
}
