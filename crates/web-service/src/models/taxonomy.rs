use crate::models::projects::ProjectCard;
use crate::services::taxonomy::CategoryShowcase;
use crate::validation::validate_color;
use chrono::{DateTime, Utc};
use database::models::{Category, CategoryWithCount, Tag, TagWithCount};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

fn default_category_color() -> String {
    "#667eea".to_string()
}

fn default_tag_color() -> String {
    "#6c757d".to_string()
}

/// 新建分类（仅管理员）
#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct CategoryCreateRequest {
    #[schema(example = "Education")]
    #[validate(length(min = 1, max = 100))]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[schema(example = "fas fa-graduation-cap")]
    #[serde(default)]
    #[validate(length(max = 50))]
    /// FontAwesome 图标 class
    pub icon: String,

    #[schema(example = "#667eea")]
    #[serde(default = "default_category_color")]
    #[validate(custom(function = "validate_color"))]
    pub color: String,
}

/// 新建标签（仅管理员）
#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct TagCreateRequest {
    #[schema(example = "solar")]
    #[validate(length(min = 1, max = 50))]
    pub name: String,

    #[schema(example = "#6c757d")]
    #[serde(default = "default_tag_color")]
    #[validate(custom(function = "validate_color"))]
    pub color: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct CategoryInfo {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub color: String,
    pub is_active: bool,
    /// 已审核项目数量，仅列表接口返回
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_count: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl From<Category> for CategoryInfo {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            description: category.description,
            icon: category.icon,
            color: category.color,
            is_active: category.is_active,
            project_count: None,
            created_at: category.created_at,
        }
    }
}

impl From<CategoryWithCount> for CategoryInfo {
    fn from(row: CategoryWithCount) -> Self {
        Self { project_count: Some(row.project_count), ..row.category.into() }
    }
}

/// 分类探索页的一项
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CategoryShowcaseInfo {
    pub category: CategoryInfo,
    /// 最多3个精选的公开项目
    pub featured: Vec<ProjectCard>,
}

impl CategoryShowcaseInfo {
    pub fn from_showcase(showcase: CategoryShowcase, now: DateTime<Utc>) -> Self {
        Self {
            category: showcase.category.into(),
            featured: showcase.featured.into_iter().map(|s| ProjectCard::from_summary(s, now)).collect(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct TagInfo {
    pub id: i64,
    pub name: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_count: Option<i64>,
}

impl From<Tag> for TagInfo {
    fn from(tag: Tag) -> Self {
        Self { id: tag.id, name: tag.name, color: tag.color, project_count: None }
    }
}

impl From<TagWithCount> for TagInfo {
    fn from(row: TagWithCount) -> Self {
        Self { project_count: Some(row.project_count), ..row.tag.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_colors() {
        let category: CategoryCreateRequest = serde_json::from_str(r#"{"name": "Health"}"#).unwrap();
        assert_eq!(category.color, "#667eea");
        assert!(category.validate().is_ok());

        let tag: TagCreateRequest = serde_json::from_str(r#"{"name": "water", "color": "blue"}"#).unwrap();
        assert!(tag.validate().is_err());
    }
}
