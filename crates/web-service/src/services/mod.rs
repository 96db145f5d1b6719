//! 服务层模块
//!
//! 包含业务逻辑的服务层实现。
//!
//! 每个服务持有 [`Repositories`](database::Repositories)（内部是 `Arc<dyn Trait>`），
//! 克隆代价很小，可以直接放进 axum 的共享状态。
//! 服务负责权限检查、依赖当前时间的校验以及多个仓库调用的组合，
//! 原子性由仓库层的条件更新和事务保证。

pub mod discovery;
pub mod engagement;
pub mod identity;
pub mod moderation;
pub mod project;
pub mod similarity;
pub mod taxonomy;

pub use discovery::DiscoveryService;
pub use engagement::EngagementService;
pub use identity::{IdentityService, Passwords};
pub use moderation::ModerationService;
pub use project::ProjectService;
pub use taxonomy::TaxonomyService;

use crate::models::err::AppError;
use database::models::{Project, User};
use validator::ValidationErrors;

/// 仅管理员可执行的操作
pub(crate) fn require_staff(user: &User) -> Result<(), AppError> {
    if user.is_staff {
        Ok(())
    } else {
        Err(AppError::forbidden("Only staff members can perform this action."))
    }
}

/// 仅项目创建者可执行的操作
pub(crate) fn require_creator(user: &User, project: &Project) -> Result<(), AppError> {
    if project.creator_id == user.id {
        Ok(())
    } else {
        Err(AppError::forbidden("Only the project creator can perform this action."))
    }
}

/// 未审核项目对非创建者不可见，统一返回 404
pub(crate) fn ensure_visible(project: &Project, viewer: Option<&User>) -> Result<(), AppError> {
    if project.is_visible_to(viewer.map(|u| u.id)) {
        Ok(())
    } else {
        Err(AppError::not_found(format!("Project `{}` not found", project.slug)))
    }
}

/// 取出派生宏校验产生的错误，后续可以继续追加服务层的校验错误
pub(crate) fn collect_errors(result: Result<(), ValidationErrors>) -> ValidationErrors {
    result.err().unwrap_or_else(ValidationErrors::new)
}
