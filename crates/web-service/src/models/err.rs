use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use color_eyre::eyre::Error;
use database::DatabaseError;
use serde::Serialize;
use std::borrow::Cow;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;
use validator::{ValidationError, ValidationErrors};

/// 使用 [`thiserror`] 定义错误类型
/// 方便根据类型转换为相应的http错误码
#[derive(Error, Debug)]
pub enum AppError {
    /// 数据验证错误，这种错误通常都是用户参数不正确导致的，所以需要转换为400
    #[error(transparent)]
    ValidationFailed(#[from] ValidationErrors),

    /// 仓库层数据库错误
    #[error(transparent)]
    RepositoryError(#[from] DatabaseError),

    /// 缺少或错误的认证信息
    #[error("Authentication credentials were not provided or are invalid.")]
    Unauthorized,

    /// 已认证但没有权限
    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// 当前状态不允许此操作
    #[error("{0}")]
    InvalidState(String),

    /// 其他类型错误
    #[error(transparent)]
    InternalError(#[from] Error),
}

impl AppError {
    /// 构造单个字段的校验错误
    pub fn field(field: &'static str, code: &'static str, message: &'static str) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, ValidationError::new(code).with_message(Cow::Borrowed(message)));
        AppError::ValidationFailed(errors)
    }

    pub fn forbidden<T: ToString>(msg: T) -> Self {
        AppError::Forbidden(msg.to_string())
    }

    pub fn not_found<T: ToString>(msg: T) -> Self {
        AppError::NotFound(msg.to_string())
    }

    pub fn invalid_state<T: ToString>(msg: T) -> Self {
        AppError::InvalidState(msg.to_string())
    }
}

/// 错误响应体
#[derive(Serialize, Debug, ToSchema)]
pub struct ErrorReply {
    #[schema(example = "Validation failed")]
    pub message: String,

    /// 字段级错误信息，仅校验错误时存在
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<BTreeMap<String, Vec<String>>>,
}

fn field_messages(errors: &ValidationErrors) -> BTreeMap<String, Vec<String>> {
    errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| e.code.to_string()))
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

fn reply(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorReply { message, fields: None })).into_response()
}

/// Tell axum how to convert `AppError` into a response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::ValidationFailed(err) => (
                StatusCode::BAD_REQUEST,
                Json(ErrorReply { message: "Validation failed".to_string(), fields: Some(field_messages(&err)) }),
            )
                .into_response(),
            AppError::RepositoryError(err) => match err {
                DatabaseError::SqlxError(sqlx::Error::RowNotFound) | DatabaseError::NotFound(_) => {
                    reply(StatusCode::NOT_FOUND, err.to_string())
                }
                DatabaseError::Conflict(msg) | DatabaseError::InvalidState(msg) => reply(StatusCode::CONFLICT, msg),
                DatabaseError::ValidationError(msg) => reply(StatusCode::BAD_REQUEST, msg),
                _ => {
                    error!("❌ 仓库错误: {}", err);
                    reply(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
                }
            },
            AppError::Unauthorized => {
                let mut response = reply(StatusCode::UNAUTHORIZED, AppError::Unauthorized.to_string());
                response
                    .headers_mut()
                    .insert(header::WWW_AUTHENTICATE, header::HeaderValue::from_static("Basic realm=\"crowdfund\""));
                response
            }
            AppError::Forbidden(msg) => reply(StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => reply(StatusCode::NOT_FOUND, msg),
            AppError::InvalidState(msg) => reply(StatusCode::CONFLICT, msg),
            AppError::InternalError(err) => {
                error!("❌ 内部错误: {:?}", err);
                reply(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        }
    }
}
