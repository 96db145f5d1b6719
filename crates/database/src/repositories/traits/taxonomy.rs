//! 分类与标签仓库 trait 定义

use crate::models::taxonomy::{Category, CategoryCreate, CategoryWithCount, Tag, TagCreate, TagWithCount};
use crate::DatabaseResult;

/// 分类与标签仓库trait定义
///
/// 分类和标签独立维护，名称唯一。
#[async_trait::async_trait]
pub trait TaxonomyRepositoryTrait: Send + Sync + 'static {
    async fn create_category(&self, category: CategoryCreate) -> DatabaseResult<Category>;

    async fn get_category(&self, id: i64) -> DatabaseResult<Category>;

    /// 分类列表（按名称排序），附带每个分类下已审核项目数量
    ///
    /// # 参数
    /// - `active_only`: 是否只返回启用的分类
    async fn list_categories(&self, active_only: bool) -> DatabaseResult<Vec<CategoryWithCount>>;

    async fn create_tag(&self, tag: TagCreate) -> DatabaseResult<Tag>;

    async fn get_tag(&self, id: i64) -> DatabaseResult<Tag>;

    /// 批量查询标签，不存在的 ID 会被忽略
    async fn find_tags(&self, ids: &[i64]) -> DatabaseResult<Vec<Tag>>;

    /// 热门标签：至少关联一个已审核项目，按项目数量倒序
    async fn list_popular_tags(&self, limit: i64) -> DatabaseResult<Vec<TagWithCount>>;
}
