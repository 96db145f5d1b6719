use thiserror::Error;

/// 数据库操作错误类型
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLX 错误
    #[error("数据库操作错误: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// 连接错误
    #[error("数据库连接错误: {0}")]
    ConnectionError(String),

    /// 迁移错误
    #[error("数据库迁移错误: {0}")]
    MigrationError(String),

    /// 记录不存在
    #[error("{0}")]
    NotFound(String),

    /// 唯一约束冲突（用户名、邮箱、分类名称等已被占用）
    #[error("{0}")]
    Conflict(String),

    /// 记录当前状态不允许此操作（例如向非 active 项目捐款）
    #[error("{0}")]
    InvalidState(String),

    /// 数据校验错误
    #[error("{0}")]
    ValidationError(String),
}

impl DatabaseError {
    /// 创建连接错误
    pub fn connection<T: ToString>(msg: T) -> Self {
        Self::ConnectionError(msg.to_string())
    }

    /// 创建迁移错误
    pub fn migration<T: ToString>(msg: T) -> Self {
        Self::MigrationError(msg.to_string())
    }

    pub fn not_found<T: ToString>(msg: T) -> Self {
        Self::NotFound(msg.to_string())
    }

    pub fn conflict<T: ToString>(msg: T) -> Self {
        Self::Conflict(msg.to_string())
    }

    pub fn invalid_state<T: ToString>(msg: T) -> Self {
        Self::InvalidState(msg.to_string())
    }

    /// 将唯一约束冲突转换为 [`DatabaseError::Conflict`]，其他错误原样包装
    pub fn unique_violation<T: ToString>(err: sqlx::Error, msg: T) -> Self {
        match err.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => Self::conflict(msg),
            _ => Self::SqlxError(err),
        }
    }

    /// `RowNotFound` 转换为带上下文的 [`DatabaseError::NotFound`]
    pub fn or_not_found<T: ToString>(err: sqlx::Error, msg: T) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found(msg),
            other => Self::SqlxError(other),
        }
    }
}
