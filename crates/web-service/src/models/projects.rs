//! 项目相关的请求与返回模型

use crate::models::common::PageQuery;
use crate::models::engagement::{CommentInfo, RatingInfo, RatingSummaryInfo};
use crate::models::taxonomy::{CategoryInfo, TagInfo};
use crate::validation::{validate_non_negative, validate_target_amount};
use chrono::{DateTime, Utc};
use database::models::{
    Project, ProjectImage, ProjectSort, ProjectStatus, ProjectSummary, SearchField, SettledProject,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// 文本搜索的匹配字段
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    #[default]
    Title,
    Tag,
    Category,
    Creator,
}

impl From<SearchType> for SearchField {
    fn from(value: SearchType) -> Self {
        match value {
            SearchType::Title => SearchField::Title,
            SearchType::Tag => SearchField::Tag,
            SearchType::Category => SearchField::Category,
            SearchType::Creator => SearchField::Creator,
        }
    }
}

/// 搜索结果排序方式
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// 平均评分倒序
    Rating,
    /// 目标金额倒序
    Target,
    /// 结束时间正序
    Deadline,
    /// 已筹金额倒序
    Funding,
    /// 创建时间倒序
    #[default]
    Recent,
}

impl From<SortBy> for ProjectSort {
    fn from(value: SortBy) -> Self {
        match value {
            SortBy::Rating => ProjectSort::Rating,
            SortBy::Target => ProjectSort::Target,
            SortBy::Deadline => ProjectSort::Deadline,
            SortBy::Funding => ProjectSort::Funding,
            SortBy::Recent => ProjectSort::Recent,
        }
    }
}

/// 搜索项目列表信息
///
/// 所有条件按 AND 组合，只会返回已审核且状态为 active/funded 的项目
#[derive(Deserialize, Debug, Default, ToSchema, Validate)]
pub struct ProjectSearch {
    #[schema(example = "solar")]
    #[validate(length(max = 100))]
    /// 搜索关键字（不区分大小写的子串匹配）
    pub search_query: Option<String>,

    #[serde(default)]
    /// 关键字匹配的字段
    pub search_type: SearchType,

    pub category_id: Option<i64>,

    #[schema(value_type = Option<String>, example = "1000")]
    #[validate(custom(function = "validate_non_negative"))]
    pub min_target: Option<Decimal>,

    #[schema(value_type = Option<String>, example = "50000")]
    #[validate(custom(function = "validate_non_negative"))]
    pub max_target: Option<Decimal>,

    #[schema(value_type = Option<String>, example = "active")]
    pub status: Option<ProjectStatus>,

    #[serde(default)]
    pub sort: SortBy,

    /// 查询分页信息
    #[serde(default)]
    #[validate(nested)]
    pub page_query: PageQuery,
}

/// 新建项目
#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct CreateProjectRequest {
    #[schema(example = "Solar pumps for Fayoum farms")]
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(min = 1))]
    pub details: String,

    #[schema(example = 1)]
    pub category_id: i64,

    #[serde(default)]
    pub tag_ids: Vec<i64>,

    #[schema(value_type = String, example = "25000.00")]
    #[validate(custom(function = "validate_target_amount"))]
    pub total_target: Decimal,

    pub start_date: DateTime<Utc>,

    pub end_date: DateTime<Utc>,

    /// 需要审核时，是否先保存为草稿
    #[serde(default)]
    pub as_draft: bool,
}

/// 修改项目，未提供的字段保持原值
#[derive(Deserialize, Debug, Default, ToSchema, Validate)]
pub struct UpdateProjectRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,

    #[validate(length(min = 1))]
    pub details: Option<String>,

    pub category_id: Option<i64>,

    /// 提供时整体替换项目标签
    pub tag_ids: Option<Vec<i64>>,

    #[schema(value_type = Option<String>)]
    #[validate(custom(function = "validate_target_amount"))]
    pub total_target: Option<Decimal>,

    pub start_date: Option<DateTime<Utc>>,

    pub end_date: Option<DateTime<Utc>>,
}

/// 添加项目图片，图片本身由外部文件存储保存，这里只记录引用
#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct AddImageRequest {
    #[schema(example = "projects/solar/cover.jpg")]
    #[validate(length(min = 1, max = 500))]
    pub image_ref: String,

    #[serde(default)]
    #[validate(length(max = 200))]
    pub caption: String,

    #[serde(default)]
    pub is_primary: bool,

    #[serde(default)]
    #[validate(range(min = 0))]
    pub sort_order: i32,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct FeatureRequest {
    pub featured: bool,
}

/// 管理员手动结算，目标状态只能是 funded 或 completed
#[derive(Deserialize, Debug, ToSchema)]
pub struct MarkStatusRequest {
    #[schema(value_type = String, example = "funded")]
    pub status: ProjectStatus,
}

/// 列表中的项目卡片
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ProjectCard {
    #[schema(example = 15)]
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub category_id: i64,
    pub category_name: String,
    pub creator_id: i64,
    pub creator_username: String,
    #[schema(value_type = String)]
    pub total_target: Decimal,
    #[schema(value_type = String)]
    pub current_amount: Decimal,
    #[schema(value_type = String, example = "42.5")]
    pub progress_percentage: Decimal,
    pub days_remaining: i64,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[schema(value_type = String, example = "active")]
    pub status: ProjectStatus,
    pub is_featured: bool,
    pub is_approved: bool,
    pub average_rating: f64,
    pub rating_count: i64,
    pub created_at: DateTime<Utc>,
}

impl ProjectCard {
    pub fn from_summary(summary: ProjectSummary, now: DateTime<Utc>) -> Self {
        let progress_percentage = summary.progress_percentage();
        let days_remaining = summary.days_remaining(now);
        Self {
            id: summary.id,
            title: summary.title,
            slug: summary.slug,
            category_id: summary.category_id,
            category_name: summary.category_name,
            creator_id: summary.creator_id,
            creator_username: summary.creator_username,
            total_target: summary.total_target,
            current_amount: summary.current_amount,
            progress_percentage,
            days_remaining,
            start_date: summary.start_date,
            end_date: summary.end_date,
            status: summary.status,
            is_featured: summary.is_featured,
            is_approved: summary.is_approved,
            average_rating: summary.average_rating,
            rating_count: summary.rating_count,
            created_at: summary.created_at,
        }
    }
}

/// 项目完整信息，派生字段在读取时计算
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ProjectInfo {
    #[schema(example = 15)]
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub details: String,
    pub category_id: i64,
    pub creator_id: i64,
    #[schema(value_type = String)]
    pub total_target: Decimal,
    #[schema(value_type = String)]
    pub current_amount: Decimal,
    #[schema(value_type = String)]
    pub progress_percentage: Decimal,
    pub days_remaining: i64,
    pub is_cancellable: bool,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[schema(value_type = String, example = "active")]
    pub status: ProjectStatus,
    pub is_featured: bool,
    pub is_approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
    /// 为空且已审核时表示系统自动审核
    pub approved_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProjectInfo {
    pub fn from_project(project: Project, now: DateTime<Utc>) -> Self {
        let progress_percentage = project.progress_percentage();
        let days_remaining = project.days_remaining(now);
        let is_cancellable = project.is_cancellable();
        Self {
            id: project.id,
            title: project.title,
            slug: project.slug,
            details: project.details,
            category_id: project.category_id,
            creator_id: project.creator_id,
            total_target: project.total_target,
            current_amount: project.current_amount,
            progress_percentage,
            days_remaining,
            is_cancellable,
            start_date: project.start_date,
            end_date: project.end_date,
            status: project.status,
            is_featured: project.is_featured,
            is_approved: project.is_approved,
            approved_at: project.approved_at,
            approved_by: project.approved_by,
            created_at: project.created_at,
            updated_at: project.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct ImageInfo {
    pub id: i64,
    pub image_ref: String,
    pub caption: String,
    pub is_primary: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

impl From<ProjectImage> for ImageInfo {
    fn from(image: ProjectImage) -> Self {
        Self {
            id: image.id,
            image_ref: image.image_ref,
            caption: image.caption,
            is_primary: image.is_primary,
            sort_order: image.sort_order,
            created_at: image.created_at,
        }
    }
}

/// 项目详情页
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ProjectDetail {
    pub project: ProjectInfo,
    pub category: CategoryInfo,
    pub creator_username: String,
    pub tags: Vec<TagInfo>,
    pub images: Vec<ImageInfo>,
    pub rating: RatingSummaryInfo,
    /// 当前登录用户自己的评分
    pub my_rating: Option<RatingInfo>,
    /// 第一页顶层评论
    pub comments: Vec<CommentInfo>,
    pub comment_count: u32,
    pub similar: Vec<ProjectCard>,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct SettledInfo {
    pub id: i64,
    pub slug: String,
    #[schema(value_type = String, example = "funded")]
    pub status: ProjectStatus,
}

impl From<SettledProject> for SettledInfo {
    fn from(settled: SettledProject) -> Self {
        Self { id: settled.id, slug: settled.slug, status: settled.status }
    }
}

/// 首页聚合数据
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct HomepageReply {
    /// 评分最高的 active 项目
    pub top_rated: Vec<ProjectCard>,
    pub latest: Vec<ProjectCard>,
    pub featured: Vec<ProjectCard>,
    /// 最近7天捐款笔数最多的 active 项目
    pub trending: Vec<ProjectCard>,
    /// 7天内结束的 active 项目
    pub ending_soon: Vec<ProjectCard>,
    pub categories: Vec<CategoryInfo>,
    pub popular_tags: Vec<TagInfo>,
}
