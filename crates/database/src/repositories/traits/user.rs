//! 用户仓库 trait 定义

use crate::models::user::{User, UserCreate, UserProfileUpdate};
use crate::DatabaseResult;

/// 用户仓库trait定义
///
/// 唯一约束：用户名、邮箱。冲突时返回 [`crate::DatabaseError::Conflict`]。
#[async_trait::async_trait]
pub trait UserRepositoryTrait: Send + Sync + 'static {
    /// 创建新用户
    async fn create_user(&self, user: UserCreate) -> DatabaseResult<User>;

    /// 根据 ID 获取用户，不存在时返回 `NotFound`
    async fn get_user_by_id(&self, id: i64) -> DatabaseResult<User>;

    /// 根据邮箱查询用户（大小写不敏感）
    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>>;

    /// 根据用户名查询用户
    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>>;

    /// 更新用户资料，`None` 字段保持原值
    async fn update_profile(&self, id: i64, update: UserProfileUpdate) -> DatabaseResult<User>;

    /// 设置管理员标记
    async fn set_staff(&self, id: i64, is_staff: bool) -> DatabaseResult<User>;

    /// 删除用户，其项目、评论、评分、举报一并级联删除；捐款记录保留，捐款人置空
    async fn delete_user(&self, id: i64) -> DatabaseResult<User>;
}
