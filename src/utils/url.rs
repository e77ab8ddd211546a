// src/utils/url.rs

//! URL manipulation utilities.

/// Join a base address and a path with exactly one `/` between them.
///
/// This is string joining, not RFC 3986 resolution: a path starting with `/`
/// is appended to the base path instead of replacing it.
///
/// # Examples
/// ```
/// use site_search::utils::url::join;
///
/// assert_eq!(
///     join("https://example.com/base/", "/page.html"),
///     "https://example.com/base/page.html"
/// );
/// ```
pub fn join(base: &str, path: &str) -> String {
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return base.to_string();
    }

    let base = base.trim_end_matches('/');
    if path.starts_with('?') || path.starts_with('#') {
        return format!("{base}{path}");
    }
    format!("{base}/{path}")
}

/// Turn a scraped link into a fully-qualified address.
///
/// Magnet URIs and absolute `http(s)` links pass through; protocol-relative
/// links take the scheme of `base_url`; anything else is joined to
/// `base_url` after dropping a single leading `.`.
pub fn fix_link(uri: &str, base_url: &str) -> String {
    if uri.is_empty() || uri.starts_with("magnet:") {
        return uri.to_string();
    }

    if uri.starts_with("//") {
        let scheme = url::Url::parse(base_url)
            .map(|u| u.scheme().to_string())
            .unwrap_or_else(|_| "https".to_string());
        return format!("{scheme}:{uri}");
    }

    if uri.starts_with("http") {
        return uri.to_string();
    }

    join(base_url, uri.strip_prefix('.').unwrap_or(uri))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fix_link_magnet_untouched() {
        let magnet = "magnet:?xt=urn:btih:0123456789abcdef";
        assert_eq!(fix_link(magnet, "https://x.example/"), magnet);
    }

    #[test]
    fn test_fix_link_protocol_relative() {
        assert_eq!(
            fix_link("//cdn.example.com/a", "https://x.example/"),
            "https://cdn.example.com/a"
        );
        assert_eq!(
            fix_link("//cdn.example.com/a", "http://x.example/"),
            "http://cdn.example.com/a"
        );
    }

    #[test]
    fn test_fix_link_dot_relative() {
        assert_eq!(
            fix_link("./path", "https://x.example/base/"),
            "https://x.example/base/path"
        );
    }

    #[test]
    fn test_fix_link_plain_relative() {
        assert_eq!(
            fix_link("details.php?id=1", "https://x.example/"),
            "https://x.example/details.php?id=1"
        );
        assert_eq!(
            fix_link("/download.php?id=1", "https://x.example"),
            "https://x.example/download.php?id=1"
        );
    }

    #[test]
    fn test_fix_link_absolute_untouched() {
        assert_eq!(
            fix_link("https://other.example/x", "https://x.example/"),
            "https://other.example/x"
        );
        assert_eq!(fix_link("", "https://x.example/"), "");
    }

    #[test]
    fn test_join_query_only() {
        assert_eq!(join("https://x.example/", "?page=2"), "https://x.example?page=2");
        assert_eq!(join("https://x.example/", ""), "https://x.example/");
    }
}
