//! 项目仓库 trait 定义
//!
//! 定义项目数据库操作的抽象接口

use crate::models::project::{
    Project, ProjectCreate, ProjectImage, ProjectImageCreate, ProjectQuery, ProjectSearchResult, ProjectStatus,
    ProjectSummary, ProjectUpdate, SettledProject, SimilarCandidate, StatusTransition,
};
use crate::models::taxonomy::Tag;
use crate::DatabaseResult;
use chrono::{DateTime, Utc};

/// 项目仓库trait定义
///
/// 定义了项目相关的数据库操作接口，支持：
/// - 项目创建（连同标签关联）
/// - 项目查询、列表搜索（分页）
/// - 项目更新（仅限可编辑状态）
/// - 状态流转（条件更新，前置状态不满足时不做修改）
/// - 项目图片
/// - 活动结算
#[async_trait::async_trait]
pub trait ProjectRepositoryTrait: Send + Sync + 'static {
    /// 创建新项目
    ///
    /// # 参数
    /// - `project`: 项目创建信息，slug 必须唯一
    ///
    /// # 返回值
    /// 返回创建的项目信息
    async fn create_project(&self, project: ProjectCreate) -> DatabaseResult<Project>;

    /// 根据 ID 获取项目信息
    async fn get_project_by_id(&self, id: i64) -> DatabaseResult<Project>;

    /// 根据 slug 获取项目信息
    async fn get_project_by_slug(&self, slug: &str) -> DatabaseResult<Project>;

    /// 获取项目摘要（分类名称、创建者、评分统计）
    async fn get_project_summary(&self, id: i64) -> DatabaseResult<ProjectSummary>;

    /// 项目关联的标签，按名称排序
    async fn project_tags(&self, project_id: i64) -> DatabaseResult<Vec<Tag>>;

    /// 根据查询条件搜索项目
    ///
    /// # 参数
    /// - `query`: 查询条件，参考 [`ProjectQuery`]
    ///
    /// # 返回值
    /// 返回包含项目列表和总数的结果 [`ProjectSearchResult`]
    async fn find_projects(&self, query: &ProjectQuery) -> DatabaseResult<ProjectSearchResult>;

    /// 更新项目信息
    ///
    /// 仅当项目当前状态属于 `editable` 时才会更新，否则返回 `InvalidState`。
    ///
    /// # 参数
    /// - `id`: 项目 ID
    /// - `update`: 更新信息
    /// - `editable`: 允许编辑的状态集合
    async fn update_project(&self, id: i64, update: ProjectUpdate, editable: &[ProjectStatus]) -> DatabaseResult<Project>;

    /// 执行状态流转，当前状态不满足 `transition.from` 时返回 `InvalidState`
    async fn transition_status(&self, id: i64, transition: StatusTransition) -> DatabaseResult<Project>;

    /// 取消项目
    ///
    /// 只有 active 且筹款进度低于 25% 的项目可以取消。
    /// 判断和写入在同一条语句中完成，并发捐款不会让已超过阈值的项目被取消。
    async fn cancel_project(&self, id: i64) -> DatabaseResult<Project>;

    async fn set_featured(&self, id: i64, featured: bool) -> DatabaseResult<Project>;

    /// 相似项目候选：active、已审核、与 `project` 同分类或至少共享一个标签，排除自身
    async fn similar_candidates(&self, project: &Project, tag_ids: &[i64]) -> DatabaseResult<Vec<SimilarCandidate>>;

    /// 添加项目图片，主图写入时会在同一事务中取消同项目其他图片的主图标记
    async fn add_image(&self, image: ProjectImageCreate) -> DatabaseResult<ProjectImage>;

    /// 项目图片，按排序字段和创建时间排序
    async fn list_images(&self, project_id: i64) -> DatabaseResult<Vec<ProjectImage>>;

    /// 活动结算
    ///
    /// - active 且已筹金额达到目标 → funded
    /// - active 且结束时间不晚于 `now` 仍未达标 → completed
    ///
    /// # 返回值
    /// 返回本次发生状态变化的项目
    async fn settle_campaigns(&self, now: DateTime<Utc>) -> DatabaseResult<Vec<SettledProject>>;
}
