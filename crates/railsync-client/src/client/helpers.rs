//! Pure helpers: URL building and log formatting (no HTTP, no status logic).

/// Prefix of links returned by the paginated API.
pub(crate) const API_PREFIX: &str = "/api/v2/";

/// Split a service URL into the `index.php?` root and the API v2 base.
///
/// `https://rail.example.com/` becomes
/// (`https://rail.example.com/index.php?`, `https://rail.example.com/index.php?/api/v2/`).
pub(crate) fn api_roots(service_url: &str) -> (String, String) {
    let root = format!("{}/index.php?", service_url.trim_end_matches('/'));
    let api = format!("{}{}", root, API_PREFIX);
    (root, api)
}

/// Resolve an endpoint path or a pagination link against the service.
pub(crate) fn resolve_url(root_url: &str, api_url: &str, path: &str) -> String {
    if path.starts_with(API_PREFIX) {
        format!("{}{}", root_url, path)
    } else {
        format!("{}{}", api_url, path)
    }
}

/// Truncate a response body for logging.
pub(crate) fn body_preview(body: &str) -> String {
    const LIMIT: usize = 200;
    if body.chars().count() <= LIMIT {
        body.to_string()
    } else {
        let head: String = body.chars().take(LIMIT).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_roots_strip_trailing_slash() {
        let (root, api) = api_roots("https://rail.example.com/");
        assert_eq!(root, "https://rail.example.com/index.php?");
        assert_eq!(api, "https://rail.example.com/index.php?/api/v2/");
    }

    #[test]
    fn test_resolve_endpoint() {
        let (root, api) = api_roots("https://rail.example.com");
        assert_eq!(
            resolve_url(&root, &api, "get_cases/1&suite_id=2"),
            "https://rail.example.com/index.php?/api/v2/get_cases/1&suite_id=2"
        );
    }

    #[test]
    fn test_resolve_pagination_link() {
        let (root, api) = api_roots("https://rail.example.com");
        assert_eq!(
            resolve_url(&root, &api, "/api/v2/get_cases/1&offset=250"),
            "https://rail.example.com/index.php?/api/v2/get_cases/1&offset=250"
        );
    }

    #[test]
    fn test_body_preview_truncates() {
        let long = "x".repeat(500);
        let preview = body_preview(&long);
        assert_eq!(preview.len(), 203);
        assert!(preview.ends_with("..."));
        assert_eq!(body_preview("short"), "short");
    }
}
