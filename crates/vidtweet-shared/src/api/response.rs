use serde::{Deserialize, Serialize};

/// Envelope wrapped around every successful response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status_code: u16,
    pub message: String,
    pub data: T,
    pub success: bool,
}

impl<T> ApiResponse<T> {
    pub fn new(status_code: u16, data: T, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            data,
            success: (200..300).contains(&status_code),
        }
    }
}

/// Envelope for every failed request. `data` is always null.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
    #[serde(default)]
    pub errors: Vec<String>,
    pub data: Option<serde_json::Value>,
    pub success: bool,
}

impl ErrorBody {
    pub fn new(status_code: u16, message: impl Into<String>, errors: Vec<String>) -> Self {
        Self {
            status_code,
            message: message.into(),
            errors,
            data: None,
            success: false,
        }
    }
}
