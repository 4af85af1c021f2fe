use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Query string accepted by list endpoints.
///
/// Values are kept as raw strings: anything that does not parse as a
/// positive integer falls back to the unpaginated listing instead of
/// rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service health status
    pub status: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
    /// Seconds since the service started
    pub uptime_seconds: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
            timestamp: Utc::now(),
            uptime_seconds: 42,
        };

        let json = serde_json::to_string(&response).expect("Serialization should succeed");
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"uptimeSeconds\":42"));
    }

    #[test]
    fn test_list_query_accepts_garbage() {
        let query: ListQuery = serde_json::from_str(r#"{"page":"abc"}"#).unwrap();
        assert_eq!(query.page.as_deref(), Some("abc"));
        assert!(query.limit.is_none());
    }
}
