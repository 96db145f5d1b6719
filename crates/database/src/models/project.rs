//! 项目数据库模型
//!
//! 定义项目（众筹活动）相关的数据库模型结构体，以及基于存储字段实时计算的派生值：
//! - 筹款进度百分比
//! - 剩余天数
//! - 是否允许取消
//!
//! 派生值从不落库，避免与权威字段产生偏差。

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared_lib::CANCELLABLE_PROGRESS_PERCENT;
use std::fmt;

/// 项目状态
///
/// 状态流转：`draft → pending → active → {funded, cancelled, completed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Draft,
    Pending,
    Active,
    Funded,
    Cancelled,
    Completed,
}

impl ProjectStatus {
    /// 出现在公开列表（首页、搜索、分类/标签浏览）中的状态
    pub const PUBLIC: [ProjectStatus; 2] = [ProjectStatus::Active, ProjectStatus::Funded];

    /// 创建者仍可编辑的状态
    pub const EDITABLE: [ProjectStatus; 2] = [ProjectStatus::Draft, ProjectStatus::Pending];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Draft => "draft",
            ProjectStatus::Pending => "pending",
            ProjectStatus::Active => "active",
            ProjectStatus::Funded => "funded",
            ProjectStatus::Cancelled => "cancelled",
            ProjectStatus::Completed => "completed",
        }
    }

    pub fn is_editable(&self) -> bool {
        Self::EDITABLE.contains(self)
    }

    pub fn is_public(&self) -> bool {
        Self::PUBLIC.contains(self)
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 筹款进度百分比：`min(current / target × 100, 100)`，目标金额非正时为 0
pub fn progress_percentage(current_amount: Decimal, total_target: Decimal) -> Decimal {
    if total_target <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let hundred = Decimal::ONE_HUNDRED;
    (current_amount / total_target * hundred).min(hundred)
}

/// 剩余天数，只有 active 项目才有意义，其他状态返回 0
pub fn days_remaining(status: ProjectStatus, end_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    if status != ProjectStatus::Active {
        return 0;
    }
    (end_date - now).num_days().max(0)
}

/// 项目仅在 active 且筹款进度低于 25% 时允许取消
pub fn is_cancellable(status: ProjectStatus, current_amount: Decimal, total_target: Decimal) -> bool {
    status == ProjectStatus::Active
        && progress_percentage(current_amount, total_target) < Decimal::from(CANCELLABLE_PROGRESS_PERCENT)
}

/// 项目信息结构体
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Project {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub details: String,
    pub category_id: i64,
    pub creator_id: i64,
    pub total_target: Decimal,
    pub current_amount: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: ProjectStatus,
    pub is_featured: bool,
    pub is_approved: bool,
    pub approved_at: Option<DateTime<Utc>>,
    pub approved_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn progress_percentage(&self) -> Decimal {
        progress_percentage(self.current_amount, self.total_target)
    }

    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        days_remaining(self.status, self.end_date, now)
    }

    pub fn is_cancellable(&self) -> bool {
        is_cancellable(self.status, self.current_amount, self.total_target)
    }

    /// 已审核项目对所有人可见，未审核项目只对创建者可见
    pub fn is_visible_to(&self, viewer_id: Option<i64>) -> bool {
        self.is_approved || viewer_id == Some(self.creator_id)
    }

    /// 结算规则：active 项目达到目标 → funded；已过结束时间仍未达标 → completed
    pub fn settlement_status(&self, now: DateTime<Utc>) -> Option<ProjectStatus> {
        if self.status != ProjectStatus::Active {
            return None;
        }
        if self.current_amount >= self.total_target {
            Some(ProjectStatus::Funded)
        } else if self.end_date <= now {
            Some(ProjectStatus::Completed)
        } else {
            None
        }
    }
}

/// 列表页使用的项目摘要，包含分类名称、创建者用户名和评分统计
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectSummary {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub category_id: i64,
    pub category_name: String,
    pub creator_id: i64,
    pub creator_username: String,
    pub total_target: Decimal,
    pub current_amount: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: ProjectStatus,
    pub is_featured: bool,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub average_rating: f64,
    pub rating_count: i64,
}

impl ProjectSummary {
    pub fn progress_percentage(&self) -> Decimal {
        progress_percentage(self.current_amount, self.total_target)
    }

    pub fn days_remaining(&self, now: DateTime<Utc>) -> i64 {
        days_remaining(self.status, self.end_date, now)
    }
}

/// 项目搜索结果
#[derive(Debug, Clone)]
pub struct ProjectSearchResult {
    pub projects: Vec<ProjectSummary>,
    pub total: u32,
}

/// 相似项目候选，附带其标签ID用于打分
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SimilarCandidate {
    #[sqlx(flatten)]
    pub summary: ProjectSummary,
    pub tag_ids: Vec<i64>,
}

/// 项目创建参数
#[derive(Debug, Clone)]
pub struct ProjectCreate {
    pub title: String,
    pub slug: String,
    pub details: String,
    pub category_id: i64,
    pub creator_id: i64,
    pub tag_ids: Vec<i64>,
    pub total_target: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: ProjectStatus,
    pub approval: Option<Approval>,
}

/// 审核信息，`approved_by` 为空表示系统自动审核
#[derive(Debug, Clone, Copy)]
pub struct Approval {
    pub approved_by: Option<i64>,
    pub approved_at: DateTime<Utc>,
}

/// 项目更新参数
///
/// `None` 表示保持原值，`tag_ids` 为 `Some` 时整体替换标签集合
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate {
    pub title: Option<String>,
    pub details: Option<String>,
    pub category_id: Option<i64>,
    pub tag_ids: Option<Vec<i64>>,
    pub total_target: Option<Decimal>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

/// 带前置状态约束的状态流转
///
/// 仓库层以条件更新的方式执行：当前状态不在 `from` 中时不做任何修改
#[derive(Debug, Clone)]
pub struct StatusTransition {
    pub from: Vec<ProjectStatus>,
    pub to: ProjectStatus,
    pub approval: Option<Approval>,
}

/// 结算任务产生的状态变化
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SettledProject {
    pub id: i64,
    pub slug: String,
    pub status: ProjectStatus,
}

/// 项目图片，仅保存文件存储返回的引用
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProjectImage {
    pub id: i64,
    pub project_id: i64,
    pub image_ref: String,
    pub caption: String,
    pub is_primary: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ProjectImageCreate {
    pub project_id: i64,
    pub image_ref: String,
    pub caption: String,
    pub is_primary: bool,
    pub sort_order: i32,
}

/// 文本搜索的匹配字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchField {
    #[default]
    Title,
    Tag,
    Category,
    Creator,
}

impl SearchField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchField::Title => "title",
            SearchField::Tag => "tag",
            SearchField::Category => "category",
            SearchField::Creator => "creator",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextFilter {
    pub term: String,
    pub field: SearchField,
}

/// 列表排序方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProjectSort {
    /// 创建时间倒序
    #[default]
    Recent,
    /// 平均评分倒序，其次评分人数
    Rating,
    /// 目标金额倒序
    Target,
    /// 结束时间正序
    Deadline,
    /// 已筹金额倒序
    Funding,
    /// 统计窗口内捐款笔数倒序，其次已筹金额
    Trending,
}

impl ProjectSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectSort::Recent => "recent",
            ProjectSort::Rating => "rating",
            ProjectSort::Target => "target",
            ProjectSort::Deadline => "deadline",
            ProjectSort::Funding => "funding",
            ProjectSort::Trending => "trending",
        }
    }
}

/// 项目列表查询条件，所有条件按 AND 组合
#[derive(Debug, Clone)]
pub struct ProjectQuery {
    pub text: Option<TextFilter>,
    pub category_id: Option<i64>,
    pub tag_id: Option<i64>,
    pub creator_id: Option<i64>,
    pub min_target: Option<Decimal>,
    pub max_target: Option<Decimal>,
    /// 为空表示不限状态
    pub statuses: Vec<ProjectStatus>,
    pub approved_only: bool,
    pub featured_only: bool,
    /// 只返回至少有一个评分的项目
    pub rated_only: bool,
    /// [`ProjectSort::Trending`] 统计捐款笔数的起始时间，为空时统计全部捐款
    pub trending_since: Option<DateTime<Utc>>,
    pub ends_after: Option<DateTime<Utc>>,
    pub ends_before: Option<DateTime<Utc>>,
    pub sort: ProjectSort,
    pub limit: i64,
    pub offset: i64,
}

impl ProjectQuery {
    /// 公开列表的基础查询：已审核且状态为 active/funded
    pub fn public(limit: i64, offset: i64) -> Self {
        Self {
            text: None,
            category_id: None,
            tag_id: None,
            creator_id: None,
            min_target: None,
            max_target: None,
            statuses: ProjectStatus::PUBLIC.to_vec(),
            approved_only: true,
            featured_only: false,
            rated_only: false,
            trending_since: None,
            ends_after: None,
            ends_before: None,
            sort: ProjectSort::Recent,
            limit,
            offset,
        }
    }
}
