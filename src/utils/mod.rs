//! Utility functions and helpers.

pub mod date;
pub mod http;

use url::Url;

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url() {
        let base = Url::parse("https://www.ema.europa.eu").unwrap();
        assert_eq!(
            resolve_url(&base, "/en/medicines/human/EPAR/ozempic/rss.xml"),
            "https://www.ema.europa.eu/en/medicines/human/EPAR/ozempic/rss.xml"
        );
        assert_eq!(
            resolve_url(&base, "https://other.example/feed.xml"),
            "https://other.example/feed.xml"
        );
    }

    #[test]
    fn test_resolve_relative_to_directory() {
        let base = Url::parse("https://www.ema.europa.eu/en/").unwrap();
        assert_eq!(
            resolve_url(&base, "feed.xml"),
            "https://www.ema.europa.eu/en/feed.xml"
        );
    }
}
