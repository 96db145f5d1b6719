//! 分类与标签服务

use crate::models::err::AppError;
use crate::models::taxonomy::{CategoryCreateRequest, TagCreateRequest};
use crate::services::require_staff;
use database::models::{
    Category, CategoryCreate, CategoryWithCount, ProjectQuery, ProjectSearchResult, ProjectSummary, Tag, TagCreate,
    TagWithCount, User,
};
use database::Repositories;
use tracing::{debug, info};
use validator::Validate;

/// 分类探索页每个分类展示的精选项目数量
const SHOWCASE_FEATURED: i64 = 3;

/// 分类及其精选项目
#[derive(Debug, Clone)]
pub struct CategoryShowcase {
    pub category: CategoryWithCount,
    pub featured: Vec<ProjectSummary>,
}

#[derive(Clone)]
pub struct TaxonomyService {
    repos: Repositories,
}

impl TaxonomyService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    pub async fn create_category(&self, staff: &User, request: CategoryCreateRequest) -> Result<Category, AppError> {
        require_staff(staff)?;
        request.validate()?;

        let category = self
            .repos
            .taxonomy
            .create_category(CategoryCreate {
                name: request.name.trim().to_string(),
                description: request.description,
                icon: request.icon,
                color: request.color,
            })
            .await?;
        info!("🗂️ 新建分类: {} ({})", category.name, category.id);
        Ok(category)
    }

    pub async fn create_tag(&self, staff: &User, request: TagCreateRequest) -> Result<Tag, AppError> {
        require_staff(staff)?;
        request.validate()?;

        let tag = self
            .repos
            .taxonomy
            .create_tag(TagCreate { name: request.name.trim().to_string(), color: request.color })
            .await?;
        info!("🏷️ 新建标签: {} ({})", tag.name, tag.id);
        Ok(tag)
    }

    /// 启用的分类，按名称排序，附带已审核项目数量
    pub async fn list_categories(&self) -> Result<Vec<CategoryWithCount>, AppError> {
        Ok(self.repos.taxonomy.list_categories(true).await?)
    }

    /// 分类探索：每个启用的分类附带最多3个精选的公开项目
    pub async fn category_explore(&self) -> Result<Vec<CategoryShowcase>, AppError> {
        let categories = self.repos.taxonomy.list_categories(true).await?;

        let mut showcases = Vec::with_capacity(categories.len());
        for category in categories {
            let mut query = ProjectQuery::public(SHOWCASE_FEATURED, 0);
            query.category_id = Some(category.category.id);
            query.featured_only = true;
            let featured = self.repos.projects.find_projects(&query).await?.projects;
            showcases.push(CategoryShowcase { category, featured });
        }
        Ok(showcases)
    }

    pub async fn popular_tags(&self, limit: i64) -> Result<Vec<TagWithCount>, AppError> {
        Ok(self.repos.taxonomy.list_popular_tags(limit).await?)
    }

    /// 分类下的公开项目，停用的分类视为不存在
    pub async fn category_projects(
        &self,
        category_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Category, ProjectSearchResult), AppError> {
        debug!("🗂️ 浏览分类 {}", category_id);

        let category = self.repos.taxonomy.get_category(category_id).await?;
        if !category.is_active {
            return Err(AppError::not_found(format!("Category {category_id} not found")));
        }

        let mut query = ProjectQuery::public(limit, offset);
        query.category_id = Some(category.id);
        let result = self.repos.projects.find_projects(&query).await?;
        Ok((category, result))
    }

    pub async fn tag_projects(&self, tag_id: i64, limit: i64, offset: i64) -> Result<(Tag, ProjectSearchResult), AppError> {
        debug!("🏷️ 浏览标签 {}", tag_id);

        let tag = self.repos.taxonomy.get_tag(tag_id).await?;
        let mut query = ProjectQuery::public(limit, offset);
        query.tag_id = Some(tag.id);
        let result = self.repos.projects.find_projects(&query).await?;
        Ok((tag, result))
    }
}
