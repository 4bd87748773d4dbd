mod common;

use axum::http::StatusCode;
use common::body_json;
use serde_json::json;
use service_kit::api::requests::PageQuery;
use service_kit::api::responses::{self, ErrorResponse, PaginationMeta, SuccessResponse};
use service_kit::middleware::RequestId;
use std::collections::BTreeMap;

fn request_id() -> RequestId {
    RequestId::from("req-1")
}

#[tokio::test]
async fn test_success_envelope() {
    let response = responses::ok(&request_id(), json!({ "id": 7, "name": "Roadmap" }));
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body, json!({ "data": { "id": 7, "name": "Roadmap" }, "requestId": "req-1" }));
}

#[tokio::test]
async fn test_created_and_no_content() {
    let response = responses::created(&request_id(), json!({ "id": 1 }));
    assert_eq!(response.status(), StatusCode::CREATED);
    let body: SuccessResponse<serde_json::Value> =
        serde_json::from_value(body_json(response).await).unwrap();
    assert_eq!(body.request_id, "req-1");

    let response = responses::no_content();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let bytes = common::body_bytes(response).await;
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_error_helpers_status_and_code() {
    let cases = [
        (responses::bad_request(&request_id(), "bad"), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
        (responses::unauthorized(&request_id(), "who"), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
        (responses::forbidden(&request_id(), "no"), StatusCode::FORBIDDEN, "FORBIDDEN"),
        (responses::not_found(&request_id(), "gone"), StatusCode::NOT_FOUND, "NOT_FOUND"),
        (responses::conflict(&request_id(), "dup"), StatusCode::CONFLICT, "CONFLICT"),
        (
            responses::internal_error(&request_id(), "oops"),
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
        ),
    ];

    for (response, status, code) in cases {
        assert_eq!(response.status(), status);
        let body: ErrorResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(body.error.code, code);
        assert_eq!(body.request_id, "req-1");
        assert!(body.error.details.is_none());
    }
}

#[tokio::test]
async fn test_error_with_details() {
    let response = responses::error_with_details(
        &request_id(),
        StatusCode::UNPROCESSABLE_ENTITY,
        "QUOTA_EXCEEDED",
        "Too many boards",
        json!({ "limit": 10 }),
    );
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "QUOTA_EXCEEDED");
    assert_eq!(body["error"]["message"], "Too many boards");
    assert_eq!(body["error"]["details"]["limit"], 10);
}

#[tokio::test]
async fn test_validation_error_lists_fields() {
    let mut errors = BTreeMap::new();
    errors.insert("email".to_string(), "must be a valid email".to_string());
    errors.insert("name".to_string(), "is required".to_string());

    let response = responses::validation_error(&request_id(), errors);
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["message"], "Validation failed");
    assert_eq!(body["error"]["details"]["email"], "must be a valid email");
    assert_eq!(body["error"]["details"]["name"], "is required");
}

#[tokio::test]
async fn test_paginated_envelope() {
    let response = responses::paginated(&request_id(), vec![1, 2, 3], 2, 20, 95);
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["data"], json!([1, 2, 3]));
    assert_eq!(
        body["pagination"],
        json!({ "page": 2, "perPage": 20, "total": 95, "totalPages": 5 })
    );
    assert_eq!(body["requestId"], "req-1");
}

#[test]
fn test_pagination_meta() {
    assert_eq!(PaginationMeta::new(1, 20, 95).total_pages, 5);
    assert_eq!(PaginationMeta::new(1, 10, 10).total_pages, 1);
    assert_eq!(PaginationMeta::new(3, 0, 42).total_pages, 0);
}

#[test]
fn test_page_query_accepts_both_spellings() {
    let snake: PageQuery = serde_json::from_value(json!({ "page": 2, "per_page": 50 })).unwrap();
    let camel: PageQuery = serde_json::from_value(json!({ "page": 2, "perPage": 50 })).unwrap();
    assert_eq!(snake, camel);
    assert_eq!(snake.offset(), 50);
}
