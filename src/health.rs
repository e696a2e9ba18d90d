//! Health-check handler.
//!
//! | Path | Question |
//! |---|---|
//! | `/health` | Is the API up, and can it reach the database right now? |
//!
//! The handler itself never fails: a broken database is reported in the body
//! with `200 OK`, so the front-end can show why data is missing.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::app::AppState;
use crate::request::Request;
use crate::response::Json;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub api: &'static str,
    pub database: &'static str,
    /// Server version on success, the connection error otherwise.
    pub database_info: String,
}

pub async fn health(state: Arc<AppState>, _req: Request) -> Json<HealthReport> {
    let (database, database_info) = match state.db.server_version().await {
        Ok(version) => ("ok", version),
        Err(e) => {
            warn!(target_db = %state.db.config(), "health check: {e}");
            ("error", e.to_string())
        }
    };
    Json(HealthReport { api: "ok", database, database_info })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::test_state;
    use crate::request::test_request;
    use crate::response::IntoResponse;

    #[tokio::test]
    async fn unreachable_database_is_reported_not_raised() {
        let resp = health(test_state(), test_request("/health", &[], None))
            .await
            .into_response();
        assert_eq!(resp.status_code(), 200);
        let body: serde_json::Value = serde_json::from_slice(resp.body()).unwrap();
        assert_eq!(body["api"], "ok");
        assert_eq!(body["database"], "error");
        assert!(!body["database_info"].as_str().unwrap().is_empty());
    }
}
