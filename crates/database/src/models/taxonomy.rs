//! 分类与标签数据库模型

use chrono::{DateTime, Utc};

/// 项目分类，由管理员维护
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
    /// FontAwesome 图标 class
    pub icon: String,
    /// 十六进制颜色值
    pub color: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 分类及其下已审核项目数量
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CategoryWithCount {
    #[sqlx(flatten)]
    pub category: Category,
    pub project_count: i64,
}

#[derive(Debug, Clone)]
pub struct CategoryCreate {
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
}

/// 项目标签，用于分类和搜索
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TagWithCount {
    #[sqlx(flatten)]
    pub tag: Tag,
    pub project_count: i64,
}

#[derive(Debug, Clone)]
pub struct TagCreate {
    pub name: String,
    pub color: String,
}
