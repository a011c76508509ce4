use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::MarketError;

/// Uniform response wrapper: `data` holds the payload on success, or the
/// error message string on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct QueryResponse {
    pub success: bool,
    pub data: Value,
}

impl QueryResponse {
    pub fn ok(data: Value) -> Self {
        Self { success: true, data }
    }

    pub fn failure(err: &MarketError) -> Self {
        Self { success: false, data: Value::String(err.to_string()) }
    }
}
