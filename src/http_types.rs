//! Request and response types for the gateway HTTP API

use serde::{Deserialize, Serialize};

use crate::catalog::{CacheStats, VehicleRecord};

/// Standard error response format for HTTP API endpoints
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    /// Create a new error response with error code and message
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("bad_request", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub mock_mode: bool,
}

/// Plate lookup response
#[derive(Debug, Serialize, Deserialize)]
pub struct VehiclesResponse {
    pub plate: String,
    pub vehicles: Vec<VehicleRecord>,
}

/// Query parameters for the parts listing
#[derive(Debug, Deserialize)]
pub struct PartsQuery {
    pub vehicle_id: u64,
    pub assembly_group_id: u64,
    #[serde(default)]
    pub enrich: bool,
}

/// Query parameters for article detail
#[derive(Debug, Deserialize)]
pub struct ArticleQuery {
    pub brand_id: u64,
}

/// Cache statistics plus process-wide gateway counters
#[derive(Debug, Serialize)]
pub struct CacheStatsResponse {
    #[serde(flatten)]
    pub cache: CacheStats,
    pub metrics: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_constructors() {
        let err = ErrorResponse::not_found("article missing");
        assert_eq!(err.error, "not_found");
        assert_eq!(err.message, "article missing");
        assert_eq!(ErrorResponse::bad_request("x").error, "bad_request");
    }

    #[test]
    fn test_parts_query_enrich_defaults_false() {
        let query: PartsQuery =
            serde_json::from_value(serde_json::json!({"vehicle_id": 1, "assembly_group_id": 2}))
                .expect("query parses");
        assert!(!query.enrich);
    }
}
