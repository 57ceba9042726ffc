//! Error handling for the Kindergarten Kitchen Management Platform
//!
//! Provides consistent error responses in Uzbek and English

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use shared::StockError;
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid token")]
    InvalidToken,

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String, message_uz: String },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_uz: String,
    },

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Stock engine errors
    #[error("Recipe '{recipe_name}' cannot be prepared: {reason}")]
    NotPreparable {
        recipe_id: Uuid,
        recipe_name: String,
        reason: String,
    },

    #[error("Unit mismatch for '{product_name}': {from_unit} -> {to_unit}")]
    UnitMismatch {
        product_id: Uuid,
        product_name: String,
        from_unit: String,
        to_unit: String,
    },

    #[error("Insufficient stock of '{product_name}': required {required}, available {available}")]
    InsufficientStock {
        product_id: Uuid,
        product_name: String,
        unit: String,
        required: Decimal,
        available: Decimal,
    },

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a field validation failure
    pub fn validation(field: &str, message: &str, message_uz: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_uz: message_uz.to_string(),
        }
    }
}

impl From<StockError> for AppError {
    fn from(err: StockError) -> Self {
        match err {
            StockError::NotPreparable {
                recipe_id,
                recipe_name,
                reason,
            } => AppError::NotPreparable {
                recipe_id,
                recipe_name,
                reason: reason.to_string(),
            },
            StockError::UnitMismatch {
                product_id,
                product_name,
                from_unit,
                to_unit,
            } => AppError::UnitMismatch {
                product_id,
                product_name,
                from_unit,
                to_unit,
            },
            StockError::InsufficientStock {
                product_id,
                product_name,
                unit,
                required,
                available,
            } => AppError::InsufficientStock {
                product_id,
                product_name,
                unit,
                required,
                available,
            },
            StockError::ProductRemoved { product_name, .. } => {
                AppError::NotFound(format!("Product '{}'", product_name))
            }
            StockError::InvalidPortions { .. } => AppError::validation(
                "portions",
                "Portions must be a positive integer",
                "Porsiyalar soni musbat butun son bo'lishi kerak",
            ),
            StockError::QuantityOutOfRange { product_id } => AppError::Validation {
                field: "quantity".to_string(),
                message: format!("Quantities for product {} exceed the supported range", product_id),
                message_uz: "Miqdor ruxsat etilgan chegaradan oshib ketdi".to_string(),
            },
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|field| field.to_string())
            .unwrap_or_default();
        AppError::Validation {
            field,
            message: errors.to_string(),
            message_uz: "Kiritilgan ma'lumotlar noto'g'ri".to_string(),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_uz: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    fn new(code: &str, message_en: String, message_uz: String) -> Self {
        Self {
            code: code.to_string(),
            message_en,
            message_uz,
            field: None,
            details: None,
        }
    }
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new(
                    "INVALID_TOKEN",
                    "Invalid token".to_string(),
                    "Token noto'g'ri".to_string(),
                ),
            ),
            AppError::Unauthorized { message, message_uz } => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", message.clone(), message_uz.clone()),
            ),
            AppError::Validation {
                field,
                message,
                message_uz,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new("VALIDATION_ERROR", message.clone(), message_uz.clone())
                },
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new(
                        "DUPLICATE_ENTRY",
                        format!("A record with this {} already exists", field),
                        format!("Bunday {} allaqachon mavjud", field),
                    )
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new(
                    "NOT_FOUND",
                    format!("{} not found", resource),
                    format!("{} topilmadi", resource),
                ),
            ),
            AppError::NotPreparable {
                recipe_id,
                recipe_name,
                reason,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    details: Some(json!({ "recipe_id": recipe_id, "reason": reason })),
                    ..ErrorDetail::new(
                        "NOT_PREPARABLE",
                        format!("Recipe '{}' cannot be prepared: {}", recipe_name, reason),
                        format!("'{}' taomini tayyorlab bo'lmaydi", recipe_name),
                    )
                },
            ),
            AppError::UnitMismatch {
                product_id,
                product_name,
                from_unit,
                to_unit,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    details: Some(json!({
                        "product_id": product_id,
                        "from_unit": from_unit,
                        "to_unit": to_unit,
                    })),
                    ..ErrorDetail::new(
                        "UNIT_MISMATCH",
                        format!(
                            "Cannot convert '{}' to '{}' for product '{}'",
                            from_unit, to_unit, product_name
                        ),
                        format!(
                            "'{}' mahsuloti uchun '{}' birligini '{}' ga o'tkazib bo'lmaydi",
                            product_name, from_unit, to_unit
                        ),
                    )
                },
            ),
            AppError::InsufficientStock {
                product_id,
                product_name,
                unit,
                required,
                available,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    details: Some(json!({
                        "product_id": product_id,
                        "unit": unit,
                        "required": required,
                        "available": available,
                    })),
                    ..ErrorDetail::new(
                        "INSUFFICIENT_STOCK",
                        format!(
                            "Not enough '{}': required {} {}, available {} {}",
                            product_name, required, unit, available, unit
                        ),
                        format!(
                            "'{}' yetarli emas: kerak {} {}, mavjud {} {}",
                            product_name, required, unit, available, unit
                        ),
                    )
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    "Ma'lumotlar bazasida xatolik yuz berdi".to_string(),
                ),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    msg.clone(),
                    "Serverda ichki xatolik yuz berdi".to_string(),
                ),
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new(
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    "Serverda ichki xatolik yuz berdi".to_string(),
                ),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.status_and_detail();

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

/// Map a unique-constraint violation to `DuplicateEntry`, anything else passes through
pub fn map_unique_violation(err: sqlx::Error, field: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::DuplicateEntry(field.to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::NotPreparableReason;

    #[test]
    fn test_insufficient_stock_maps_to_422_with_numbers() {
        let product_id = Uuid::new_v4();
        let err: AppError = StockError::InsufficientStock {
            product_id,
            product_name: "Un".to_string(),
            unit: "kg".to_string(),
            required: Decimal::new(102, 1),
            available: Decimal::from(10),
        }
        .into();

        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(detail.code, "INSUFFICIENT_STOCK");
        let details = detail.details.unwrap();
        assert_eq!(details["required"], "10.2");
        assert_eq!(details["available"], "10");
        assert_eq!(details["product_id"], product_id.to_string());
    }

    #[test]
    fn test_not_preparable_and_unit_mismatch_are_422() {
        let not_preparable: AppError = StockError::NotPreparable {
            recipe_id: Uuid::new_v4(),
            recipe_name: "Osh".to_string(),
            reason: NotPreparableReason::Inactive,
        }
        .into();
        let (status, detail) = not_preparable.status_and_detail();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(detail.code, "NOT_PREPARABLE");

        let mismatch: AppError = StockError::UnitMismatch {
            product_id: Uuid::new_v4(),
            product_name: "Tuxum".to_string(),
            from_unit: "kg".to_string(),
            to_unit: "dona".to_string(),
        }
        .into();
        let (status, detail) = mismatch.status_and_detail();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(detail.code, "UNIT_MISMATCH");
        assert!(detail.message_en.contains("Tuxum"));
    }

    #[test]
    fn test_validation_and_lookup_status_codes() {
        let (status, detail) = AppError::validation("name", "Name cannot be empty", "Nom bo'sh").status_and_detail();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(detail.field.as_deref(), Some("name"));

        let (status, _) = AppError::NotFound("Recipe".to_string()).status_and_detail();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = AppError::DuplicateEntry("name".to_string()).status_and_detail();
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = AppError::Internal("boom".to_string()).status_and_detail();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_response_body_shape() {
        let response = AppError::validation("quantity", "Quantity must be positive", "Miqdor musbat bo'lishi kerak")
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = tokio_test::block_on(axum::body::to_bytes(response.into_body(), usize::MAX)).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["field"], "quantity");
        assert!(body["error"].get("details").is_none());
    }

    #[test]
    fn test_invalid_portions_is_validation_error() {
        let err: AppError = StockError::InvalidPortions { requested: 0 }.into();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "portions"));
    }

    #[test]
    fn test_out_of_range_quantity_is_a_validation_error() {
        let product_id = Uuid::new_v4();
        let err: AppError = StockError::QuantityOutOfRange { product_id }.into();
        let (status, detail) = err.status_and_detail();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(detail.field.as_deref(), Some("quantity"));
        assert!(detail.message_en.contains(&product_id.to_string()));
    }
}
