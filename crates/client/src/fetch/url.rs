//! URL resolution for request identities and origin checks.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a possibly-relative URL against the proxy's scope.
///
/// Normalization steps:
/// 1. Trim leading/trailing whitespace
/// 2. Resolve relative paths (`./app.js`, `/icon.png`) against `scope`
/// 3. Lowercase the host
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn resolve(scope: &Url, input: &str) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = scope.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    if let Some(host) = parsed.host_str() {
        let lowered = host.to_lowercase();
        parsed
            .set_host(Some(&lowered))
            .map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

/// Scheme, host and port all match.
pub fn is_same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Url {
        Url::parse("https://checkpoints.example.com/app/").unwrap()
    }

    #[test]
    fn test_resolve_relative() {
        let url = resolve(&scope(), "./index.html").unwrap();
        assert_eq!(url.as_str(), "https://checkpoints.example.com/app/index.html");
    }

    #[test]
    fn test_resolve_scope_root() {
        let url = resolve(&scope(), "./").unwrap();
        assert_eq!(url.as_str(), "https://checkpoints.example.com/app/");
    }

    #[test]
    fn test_resolve_absolute_path() {
        let url = resolve(&scope(), "/icon-192.png").unwrap();
        assert_eq!(url.as_str(), "https://checkpoints.example.com/icon-192.png");
    }

    #[test]
    fn test_resolve_absolute_url() {
        let url = resolve(&scope(), "https://FIRESTORE.googleapis.com/v1/doc").unwrap();
        assert_eq!(url.host_str(), Some("firestore.googleapis.com"));
    }

    #[test]
    fn test_resolve_remove_fragment() {
        let url = resolve(&scope(), "./index.html#form").unwrap();
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_resolve_preserve_query() {
        let url = resolve(&scope(), "./index.html?point=gate-3&b=2").unwrap();
        assert_eq!(url.query(), Some("point=gate-3&b=2"));
    }

    #[test]
    fn test_resolve_trim_whitespace() {
        let url = resolve(&scope(), "  ./app.js  ").unwrap();
        assert_eq!(url.as_str(), "https://checkpoints.example.com/app/app.js");
    }

    #[test]
    fn test_resolve_unsupported_scheme() {
        let result = resolve(&scope(), "data:text/plain,hello");
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve(&scope(), ""), Err(UrlError::Empty)));
        assert!(matches!(resolve(&scope(), "   "), Err(UrlError::Empty)));
    }

    #[test]
    fn test_same_origin() {
        let a = Url::parse("https://checkpoints.example.com/app/app.js").unwrap();
        assert!(is_same_origin(&scope(), &a));

        let other_port = Url::parse("https://checkpoints.example.com:8443/app.js").unwrap();
        assert!(!is_same_origin(&scope(), &other_port));

        let other_scheme = Url::parse("http://checkpoints.example.com/app.js").unwrap();
        assert!(!is_same_origin(&scope(), &other_scheme));

        let cdn = Url::parse("https://cdn.jsdelivr.net/npm/jsqr.js").unwrap();
        assert!(!is_same_origin(&scope(), &cdn));
    }
}
