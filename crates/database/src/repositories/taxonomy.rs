//! 分类与标签仓库

use crate::models::taxonomy::{Category, CategoryCreate, CategoryWithCount, Tag, TagCreate, TagWithCount};
use crate::repositories::traits::TaxonomyRepositoryTrait;
use crate::{DatabaseError, DatabaseResult};
use sqlx::PgPool;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TaxonomyRepository {
    pool: PgPool,
}

impl TaxonomyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TaxonomyRepositoryTrait for TaxonomyRepository {
    async fn create_category(&self, category: CategoryCreate) -> DatabaseResult<Category> {
        debug!("📝 创建分类: {:#?}", category);

        let name = category.name.clone();
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, description, icon, color)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, description, icon, color, is_active, created_at, updated_at
            "#,
        )
        .bind(category.name)
        .bind(category.description)
        .bind(category.icon)
        .bind(category.color)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::unique_violation(e, format!("Category `{name}` already exists.")))
    }

    async fn get_category(&self, id: i64) -> DatabaseResult<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, description, icon, color, is_active, created_at, updated_at
            FROM categories
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::or_not_found(e, format!("Category {id} not found")))
    }

    async fn list_categories(&self, active_only: bool) -> DatabaseResult<Vec<CategoryWithCount>> {
        debug!("🔍 分类列表 - 仅启用: {}", active_only);

        let categories = sqlx::query_as::<_, CategoryWithCount>(
            r#"
            SELECT c.id, c.name, c.description, c.icon, c.color, c.is_active, c.created_at, c.updated_at,
                   COUNT(p.id) FILTER (WHERE p.is_approved) AS project_count
            FROM categories c
                     LEFT JOIN projects p ON p.category_id = c.id
            WHERE (NOT $1 OR c.is_active)
            GROUP BY c.id
            ORDER BY c.name
            "#,
        )
        .bind(active_only)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    async fn create_tag(&self, tag: TagCreate) -> DatabaseResult<Tag> {
        debug!("📝 创建标签: {:#?}", tag);

        let name = tag.name.clone();
        sqlx::query_as::<_, Tag>(
            r#"
            INSERT INTO tags (name, color)
            VALUES ($1, $2)
            RETURNING id, name, color, created_at
            "#,
        )
        .bind(tag.name)
        .bind(tag.color)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::unique_violation(e, format!("Tag `{name}` already exists.")))
    }

    async fn get_tag(&self, id: i64) -> DatabaseResult<Tag> {
        sqlx::query_as::<_, Tag>("SELECT id, name, color, created_at FROM tags WHERE id = $1")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::or_not_found(e, format!("Tag {id} not found")))
    }

    async fn find_tags(&self, ids: &[i64]) -> DatabaseResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            "SELECT id, name, color, created_at FROM tags WHERE id = ANY($1) ORDER BY name",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    async fn list_popular_tags(&self, limit: i64) -> DatabaseResult<Vec<TagWithCount>> {
        let tags = sqlx::query_as::<_, TagWithCount>(
            r#"
            SELECT t.id, t.name, t.color, t.created_at, COUNT(p.id) AS project_count
            FROM tags t
                     JOIN project_tags pt ON pt.tag_id = t.id
                     JOIN projects p ON p.id = pt.project_id AND p.is_approved
            GROUP BY t.id
            ORDER BY project_count DESC, t.name
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }
}
