//! The `{success, data, message}` envelope every endpoint answers with.

use axum::http::StatusCode;
use axum::Json;
use domain::Pagination;
use serde::Serialize;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
pub type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::ok(data)))
}

pub fn ok_with<T>(data: T, message: impl Into<String>) -> ApiResult<T> {
    Ok(Json(ApiResponse::with_message(data, message)))
}

pub fn done(message: impl Into<String>) -> ApiResult<()> {
    Ok(Json(ApiResponse::message(message)))
}

pub fn created<T>(data: T, message: impl Into<String>) -> Created<T> {
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(data, message)),
    ))
}

/// One page of a list endpoint.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, pagination: Pagination) -> Self {
        Self {
            items,
            total,
            page: pagination.page,
            limit: pagination.limit,
            total_pages: pagination.total_pages(total),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_skips_empty_fields() {
        let body = serde_json::to_value(ApiResponse::ok(vec![1, 2])).unwrap();
        assert_eq!(body, json!({"success": true, "data": [1, 2]}));

        let body = serde_json::to_value(ApiResponse::failure("nope")).unwrap();
        assert_eq!(body, json!({"success": false, "message": "nope"}));
    }

    #[test]
    fn test_page_counts() {
        let page = Page::new(vec!["a"; 5], 45, Pagination::new(Some(3), Some(20)));
        let body = serde_json::to_value(page).unwrap();
        assert_eq!(body["total_pages"], 3);
        assert_eq!(body["page"], 3);
    }
}
