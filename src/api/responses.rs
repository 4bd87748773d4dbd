use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::middleware::RequestId;

/// `{"data": ..., "requestId": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResponse<T> {
    pub data: T,
    pub request_id: String,
}

/// `{"error": {...}, "requestId": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: ErrorDetail,
    pub request_id: String,
}

/// Error information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// `{"data": ..., "pagination": {...}, "requestId": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub data: T,
    pub pagination: PaginationMeta,
    pub request_id: String,
}

/// Pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total: u64,
    pub total_pages: u64,
}

impl PaginationMeta {
    /// `total_pages` is `total / per_page` rounded up; a zero page size
    /// yields zero pages.
    pub fn new(page: u32, per_page: u32, total: u64) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(u64::from(per_page))
        };
        Self {
            page,
            per_page,
            total,
            total_pages,
        }
    }
}

/// Sends `data` wrapped in the success envelope.
pub fn success<T: Serialize>(request_id: &RequestId, status: StatusCode, data: T) -> Response {
    let body = SuccessResponse {
        data,
        request_id: request_id.to_string(),
    };
    (status, Json(body)).into_response()
}

/// 200 OK
pub fn ok<T: Serialize>(request_id: &RequestId, data: T) -> Response {
    success(request_id, StatusCode::OK, data)
}

/// 201 Created
pub fn created<T: Serialize>(request_id: &RequestId, data: T) -> Response {
    success(request_id, StatusCode::CREATED, data)
}

/// 204 No Content
pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub fn error(
    request_id: &RequestId,
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
) -> Response {
    error_response(request_id, status, ErrorDetail::new(code, message))
}

/// Error envelope carrying extra `details`. Details that fail to serialize
/// are dropped.
pub fn error_with_details<D: Serialize>(
    request_id: &RequestId,
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
    details: D,
) -> Response {
    let mut detail = ErrorDetail::new(code, message);
    match serde_json::to_value(details) {
        Ok(value) => detail = detail.with_details(value),
        Err(e) => tracing::warn!(error = %e, code, "Dropping unserializable error details"),
    }
    error_response(request_id, status, detail)
}

fn error_response(request_id: &RequestId, status: StatusCode, error: ErrorDetail) -> Response {
    let body = ErrorResponse {
        error,
        request_id: request_id.to_string(),
    };
    (status, Json(body)).into_response()
}

pub fn bad_request(request_id: &RequestId, message: impl Into<String>) -> Response {
    error(request_id, StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
}

pub fn unauthorized(request_id: &RequestId, message: impl Into<String>) -> Response {
    error(request_id, StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message)
}

pub fn forbidden(request_id: &RequestId, message: impl Into<String>) -> Response {
    error(request_id, StatusCode::FORBIDDEN, "FORBIDDEN", message)
}

pub fn not_found(request_id: &RequestId, message: impl Into<String>) -> Response {
    error(request_id, StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

pub fn conflict(request_id: &RequestId, message: impl Into<String>) -> Response {
    error(request_id, StatusCode::CONFLICT, "CONFLICT", message)
}

pub fn internal_error(request_id: &RequestId, message: impl Into<String>) -> Response {
    error(
        request_id,
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        message,
    )
}

/// 200 OK with pagination metadata. Inputs are not validated.
pub fn paginated<T: Serialize>(
    request_id: &RequestId,
    data: T,
    page: u32,
    per_page: u32,
    total: u64,
) -> Response {
    let body = PaginatedResponse {
        data,
        pagination: PaginationMeta::new(page, per_page, total),
        request_id: request_id.to_string(),
    };
    (StatusCode::OK, Json(body)).into_response()
}

/// 400 with a field → message map as details.
pub fn validation_error(request_id: &RequestId, errors: BTreeMap<String, String>) -> Response {
    error_with_details(
        request_id,
        StatusCode::BAD_REQUEST,
        "VALIDATION_ERROR",
        "Validation failed",
        errors,
    )
}
