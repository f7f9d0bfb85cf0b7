// src/error.rs

//! Unified error handling for the monitor.

use std::fmt;

use thiserror::Error;

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// XML reading or writing failed
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Catalog download failed; nothing downstream can run
    #[error("Catalog download from {url} failed: {message}")]
    CatalogFetch { url: String, message: String },

    /// Catalog header or a required column is missing
    #[error("Catalog format error: {0}")]
    CatalogFormat(String),

    /// Product page or feed could not be fetched
    #[error("Probe fetch failed for {product}: {message}")]
    ProbeFetch { product: String, message: String },

    /// Product page or feed could not be understood
    #[error("Probe parse failed for {product}: {message}")]
    ProbeParse { product: String, message: String },

    /// Persisted state could not be decoded
    #[error("State file {path} is corrupt: {message}")]
    StateCorrupt { path: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a catalog download error.
    pub fn catalog_fetch(url: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::CatalogFetch {
            url: url.into(),
            message: message.to_string(),
        }
    }

    /// Create a catalog format error.
    pub fn catalog_format(message: impl Into<String>) -> Self {
        Self::CatalogFormat(message.into())
    }

    /// Create a per-product fetch error.
    pub fn probe_fetch(product: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::ProbeFetch {
            product: product.into(),
            message: message.to_string(),
        }
    }

    /// Create a per-product parse error.
    pub fn probe_parse(product: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::ProbeParse {
            product: product.into(),
            message: message.to_string(),
        }
    }

    /// Create a state corruption error.
    pub fn state_corrupt(path: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::StateCorrupt {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error must abort the whole run.
    ///
    /// Per-product probe failures and state corruption are recovered by the
    /// pipeline; everything else leaves the run with nothing to work on.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::ProbeFetch { .. } | Self::ProbeParse { .. } | Self::StateCorrupt { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_errors_are_recoverable() {
        assert!(!AppError::probe_fetch("OzempX", "timed out").is_fatal());
        assert!(!AppError::probe_parse("OzempX", "bad xml").is_fatal());
        assert!(!AppError::state_corrupt("state.json", "eof").is_fatal());
    }

    #[test]
    fn test_catalog_errors_are_fatal() {
        assert!(AppError::catalog_fetch("https://x", "503").is_fatal());
        assert!(AppError::catalog_format("no header").is_fatal());
    }

    #[test]
    fn test_display_names_product() {
        let err = AppError::probe_fetch("OzempX", "HTTP 404");
        assert_eq!(err.to_string(), "Probe fetch failed for OzempX: HTTP 404");
    }
}
