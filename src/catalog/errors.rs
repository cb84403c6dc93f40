// Catalog error taxonomy and status classification
// Every failure the gateway can surface to a route handler lives here

use super::envelope::CatalogMethod;

/// Errors returned by the catalog gateway
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// Network, DNS or timeout failure before any response arrived
    #[error("Catalog request failed: {0}")]
    Transport(String),

    /// Upstream answered with a non-2xx HTTP status
    #[error("{message} (HTTP {status}): {status_text}")]
    Http {
        status: u16,
        message: String,
        status_text: String,
    },

    /// Upstream body was not valid JSON
    #[error("Invalid JSON from catalog: {source}. Raw body: {raw}")]
    Parse {
        raw: String,
        #[source]
        source: serde_json::Error,
    },

    /// Upstream answered 2xx but the envelope carries a non-200 status field
    #[error("{message} (status {status}): {status_text}")]
    Application {
        status: i64,
        message: String,
        status_text: String,
    },

    /// Well-formed JSON that does not have the shape the method promises
    #[error("Unexpected {method} response: {reason}")]
    Shape {
        method: CatalogMethod,
        reason: String,
    },
}

impl CatalogError {
    pub(crate) fn http(status: u16, status_text: impl Into<String>) -> Self {
        let status_text = status_text.into();
        Self::Http {
            status,
            message: classify_status(i64::from(status), &status_text),
            status_text,
        }
    }

    pub(crate) fn application(status: i64, status_text: impl Into<String>) -> Self {
        let status_text = status_text.into();
        Self::Application {
            status,
            message: classify_status(status, &status_text),
            status_text,
        }
    }

    pub(crate) fn shape(method: CatalogMethod, reason: impl Into<String>) -> Self {
        Self::Shape {
            method,
            reason: reason.into(),
        }
    }

    /// Upstream status code carried by this error, if any
    pub fn status(&self) -> Option<i64> {
        match self {
            CatalogError::Http { status, .. } => Some(i64::from(*status)),
            CatalogError::Application { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Human-readable classification without the appended upstream text
    pub fn classified_message(&self) -> String {
        match self {
            CatalogError::Http { message, .. } | CatalogError::Application { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

/// Map an upstream status code to a fixed human-readable message.
///
/// Unmapped codes fall back to the upstream status text verbatim, or
/// `"Unknown error"` when upstream sent none.
pub fn classify_status(status: i64, upstream_text: &str) -> String {
    let mapped = match status {
        400 => Some("Bad Request - invalid parameters sent to the parts catalog"),
        401 => Some("Unauthorized - check the catalog API key"),
        403 => Some("Forbidden - the API key lacks access to this resource"),
        404 => Some("Not Found - no matching catalog resource"),
        407 => Some("Authentication failed - provider ID or API key rejected"),
        429 => Some("Rate limited - too many catalog requests, try again later"),
        500 => Some("Server error - the parts catalog failed internally"),
        _ => None,
    };

    match mapped {
        Some(message) => message.to_string(),
        None if upstream_text.trim().is_empty() => "Unknown error".to_string(),
        None => upstream_text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapped_statuses() {
        assert!(classify_status(401, "whatever").contains("Unauthorized"));
        assert!(classify_status(400, "").starts_with("Bad Request"));
        assert!(classify_status(403, "").starts_with("Forbidden"));
        assert!(classify_status(404, "").starts_with("Not Found"));
        assert!(classify_status(407, "").starts_with("Authentication failed"));
        assert!(classify_status(429, "").starts_with("Rate limited"));
        assert!(classify_status(500, "").starts_with("Server error"));
    }

    #[test]
    fn test_unmapped_status_uses_upstream_text() {
        assert_eq!(classify_status(418, "I'm a teapot"), "I'm a teapot");
        assert_eq!(classify_status(502, ""), "Unknown error");
        assert_eq!(classify_status(503, "   "), "Unknown error");
    }

    #[test]
    fn test_http_error_display_appends_status_text() {
        let err = CatalogError::http(401, "Unauthorized");
        let rendered = err.to_string();
        assert!(rendered.contains("Unauthorized - check the catalog API key"));
        assert!(rendered.ends_with(": Unauthorized"));
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_application_error_is_classified_like_http() {
        let err = CatalogError::application(429, "quota exhausted");
        assert!(err.classified_message().starts_with("Rate limited"));
        assert_eq!(err.status(), Some(429));
    }
}
