//! 项目仓库
//!
//! 负责项目相关的数据库操作

use crate::models::project::{
    Project, ProjectCreate, ProjectImage, ProjectImageCreate, ProjectQuery, ProjectSearchResult, ProjectStatus,
    ProjectSummary, ProjectUpdate, SettledProject, SimilarCandidate, StatusTransition,
};
use crate::models::taxonomy::Tag;
use crate::repositories::traits::ProjectRepositoryTrait;
use crate::{DatabaseError, DatabaseResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared_lib::CANCELLABLE_PROGRESS_PERCENT;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, info};

macro_rules! project_columns {
    () => {
        r#"id, title, slug, details, category_id, creator_id, total_target, current_amount, start_date, end_date,
           status, is_featured, is_approved, approved_at, approved_by, created_at, updated_at"#
    };
}

/// 项目摘要的查询列，需要配合 [`summary_from!`] 使用
macro_rules! summary_columns {
    () => {
        r#"p.id, p.title, p.slug, p.category_id, c.name AS category_name, p.creator_id, u.username AS creator_username,
           p.total_target, p.current_amount, p.start_date, p.end_date, p.status, p.is_featured, p.is_approved,
           p.created_at, COALESCE(rs.average_rating, 0)::float8 AS average_rating, rs.rating_count"#
    };
}

/// 项目摘要的数据来源，评分统计通过 LATERAL 子查询得到，没有评分时也会返回一行
macro_rules! summary_from {
    () => {
        r#"
            FROM projects p
                     JOIN categories c ON c.id = p.category_id
                     JOIN users u ON u.id = p.creator_id
                     LEFT JOIN LATERAL (SELECT AVG(r.rating)::float8 AS average_rating, COUNT(*) AS rating_count
                                        FROM ratings r
                                        WHERE r.project_id = p.id) rs ON TRUE
        "#
    };
}

/// 搜索结果行，`total_count` 由窗口函数计算
#[derive(sqlx::FromRow)]
struct SummaryRow {
    #[sqlx(flatten)]
    summary: ProjectSummary,
    total_count: i64,
}

/// 转义 LIKE 通配符，生成不区分大小写的子串匹配模式
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for ch in term.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

fn status_names(statuses: &[ProjectStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

/// 项目仓库结构体
#[derive(Debug, Clone)]
pub struct ProjectRepository {
    pool: PgPool,
}

impl ProjectRepository {
    /// 创建新的项目仓库实例
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 条件更新没有命中任何行时，区分项目不存在和状态不满足
    async fn missing_or_invalid(&self, id: i64, invalid_msg: &str) -> DatabaseError {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await;

        match exists {
            Ok(true) => DatabaseError::invalid_state(invalid_msg),
            Ok(false) => DatabaseError::not_found(format!("Project {id} not found")),
            Err(e) => DatabaseError::SqlxError(e),
        }
    }

    async fn replace_tags(tx: &mut Transaction<'_, Postgres>, project_id: i64, tag_ids: &[i64]) -> DatabaseResult<()> {
        sqlx::query("DELETE FROM project_tags WHERE project_id = $1")
            .bind(project_id)
            .execute(&mut **tx)
            .await?;

        if !tag_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO project_tags (project_id, tag_id)
                SELECT $1, UNNEST($2::bigint[])
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(project_id)
            .bind(tag_ids)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProjectRepositoryTrait for ProjectRepository {
    /// 创建新项目
    ///
    /// 项目和标签关联在同一个事务中写入，slug 冲突转换为 `Conflict`
    async fn create_project(&self, project: ProjectCreate) -> DatabaseResult<Project> {
        debug!("📝 创建项目: {:#?}", project);

        let mut tx = self.pool.begin().await?;

        let created = sqlx::query_as::<_, Project>(concat!(
            r#"
            INSERT INTO projects (title, slug, details, category_id, creator_id, total_target, start_date, end_date,
                                  status, is_approved, approved_by, approved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING "#,
            project_columns!()
        ))
        .bind(&project.title)
        .bind(&project.slug)
        .bind(&project.details)
        .bind(project.category_id)
        .bind(project.creator_id)
        .bind(project.total_target)
        .bind(project.start_date)
        .bind(project.end_date)
        .bind(project.status)
        .bind(project.approval.is_some())
        .bind(project.approval.and_then(|a| a.approved_by))
        .bind(project.approval.map(|a| a.approved_at))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| DatabaseError::unique_violation(e, format!("Slug `{}` is already taken.", project.slug)))?;

        Self::replace_tags(&mut tx, created.id, &project.tag_ids).await?;
        tx.commit().await?;

        debug!("✅ 项目创建成功: {} ({})", created.slug, created.status);
        Ok(created)
    }

    async fn get_project_by_id(&self, id: i64) -> DatabaseResult<Project> {
        debug!("🔍 根据 ID 获取项目: {}", id);

        sqlx::query_as::<_, Project>(concat!("SELECT ", project_columns!(), " FROM projects WHERE id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::or_not_found(e, format!("Project {id} not found")))
    }

    async fn get_project_by_slug(&self, slug: &str) -> DatabaseResult<Project> {
        debug!("🔍 根据 slug 获取项目: {}", slug);

        sqlx::query_as::<_, Project>(concat!("SELECT ", project_columns!(), " FROM projects WHERE slug = $1"))
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::or_not_found(e, format!("Project `{slug}` not found")))
    }

    async fn get_project_summary(&self, id: i64) -> DatabaseResult<ProjectSummary> {
        sqlx::query_as::<_, ProjectSummary>(concat!("SELECT ", summary_columns!(), summary_from!(), "WHERE p.id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::or_not_found(e, format!("Project {id} not found")))
    }

    async fn project_tags(&self, project_id: i64) -> DatabaseResult<Vec<Tag>> {
        let tags = sqlx::query_as::<_, Tag>(
            r#"
            SELECT t.id, t.name, t.color, t.created_at
            FROM tags t
                     JOIN project_tags pt ON pt.tag_id = t.id
            WHERE pt.project_id = $1
            ORDER BY t.name
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }

    /// 根据查询参数搜索项目
    ///
    /// # SQL 查询说明
    ///
    /// 1. `candidates` 中完成全部过滤，可选条件统一写成 `$n IS NULL OR ...`
    /// 2. 使用 `COUNT(*) OVER ()` 窗口函数获取分页前的总记录数
    /// 3. 排序方式作为参数传入，每种排序对应一个 `CASE` 表达式，未选中的表达式为 NULL 不影响顺序
    /// 4. 最后按创建时间和 ID 倒序，保证分页结果稳定
    async fn find_projects(&self, query: &ProjectQuery) -> DatabaseResult<ProjectSearchResult> {
        debug!("🔍 搜索项目: {:?}", query);

        let pattern = query.text.as_ref().map(|t| like_pattern(&t.term));
        let field = query.text.as_ref().map(|t| t.field.as_str()).unwrap_or("title");

        let rows = sqlx::query_as::<_, SummaryRow>(concat!(
            r#"
            WITH candidates AS (
                SELECT "#,
            summary_columns!(),
            r#",
                       CASE
                           WHEN $15 = 'trending' THEN (SELECT COUNT(*)
                                                       FROM donations d
                                                       WHERE d.project_id = p.id
                                                         AND ($12::timestamptz IS NULL OR d.created_at >= $12))
                           ELSE 0
                           END AS recent_donations
            "#,
            summary_from!(),
            r#"
                WHERE (NOT $1 OR p.is_approved)
                  AND (cardinality($2::text[]) = 0 OR p.status::text = ANY ($2::text[]))
                  AND ($3::text IS NULL OR CASE $4::text
                                               WHEN 'tag' THEN EXISTS (SELECT 1
                                                                       FROM project_tags pt
                                                                                JOIN tags t ON t.id = pt.tag_id
                                                                       WHERE pt.project_id = p.id
                                                                         AND t.name ILIKE $3)
                                               WHEN 'category' THEN c.name ILIKE $3
                                               WHEN 'creator' THEN u.username ILIKE $3
                                               ELSE p.title ILIKE $3
                      END)
                  AND ($5::bigint IS NULL OR p.category_id = $5)
                  AND ($6::bigint IS NULL OR EXISTS (SELECT 1
                                                     FROM project_tags pt
                                                     WHERE pt.project_id = p.id
                                                       AND pt.tag_id = $6))
                  AND ($7::bigint IS NULL OR p.creator_id = $7)
                  AND ($8::numeric IS NULL OR p.total_target >= $8)
                  AND ($9::numeric IS NULL OR p.total_target <= $9)
                  AND (NOT $10 OR p.is_featured)
                  AND (NOT $11 OR rs.rating_count > 0)
                  AND ($13::timestamptz IS NULL OR p.end_date >= $13)
                  AND ($14::timestamptz IS NULL OR p.end_date <= $14)
            )
            SELECT *, COUNT(*) OVER () AS total_count
            FROM candidates
            ORDER BY CASE WHEN $15 = 'rating' THEN average_rating END DESC NULLS LAST,
                     CASE WHEN $15 = 'rating' THEN rating_count END DESC NULLS LAST,
                     CASE WHEN $15 = 'target' THEN total_target END DESC NULLS LAST,
                     CASE WHEN $15 = 'deadline' THEN end_date END ASC NULLS LAST,
                     CASE WHEN $15 = 'funding' THEN current_amount END DESC NULLS LAST,
                     CASE WHEN $15 = 'trending' THEN recent_donations END DESC NULLS LAST,
                     CASE WHEN $15 = 'trending' THEN current_amount END DESC NULLS LAST,
                     created_at DESC,
                     id DESC
            LIMIT $16 OFFSET $17
            "#
        ))
        .bind(query.approved_only)
        .bind(status_names(&query.statuses))
        .bind(pattern)
        .bind(field)
        .bind(query.category_id)
        .bind(query.tag_id)
        .bind(query.creator_id)
        .bind(query.min_target)
        .bind(query.max_target)
        .bind(query.featured_only)
        .bind(query.rated_only)
        .bind(query.trending_since)
        .bind(query.ends_after)
        .bind(query.ends_before)
        .bind(query.sort.as_str())
        .bind(query.limit)
        .bind(query.offset)
        .fetch_all(&self.pool)
        .await?;

        // 获取总数
        let total = rows.first().map(|r| r.total_count).unwrap_or(0) as u32;
        let projects: Vec<ProjectSummary> = rows.into_iter().map(|r| r.summary).collect();

        debug!("✅ 搜索完成 - 找到 {} 个项目，总计 {} 个", projects.len(), total);
        Ok(ProjectSearchResult { projects, total })
    }

    /// 更新项目信息
    ///
    /// 更新数据中的字段大部分都是[`Option`]，因此使用`postgresql`中的`coalesce`函数，`None` 会被转换为
    /// 数据库的null，最终保留原值。状态约束写在 `WHERE` 中，项目在检查和写入之间被审核也不会被修改。
    async fn update_project(&self, id: i64, update: ProjectUpdate, editable: &[ProjectStatus]) -> DatabaseResult<Project> {
        debug!("🔄 更新项目 {} 信息: {:#?}", id, update);

        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query_as::<_, Project>(concat!(
            r#"
            UPDATE projects
            SET title = coalesce($2, title),
                details = coalesce($3, details),
                category_id = coalesce($4, category_id),
                total_target = coalesce($5, total_target),
                start_date = coalesce($6, start_date),
                end_date = coalesce($7, end_date),
                updated_at = now()
            WHERE id = $1
              AND status::text = ANY ($8::text[])
            RETURNING "#,
            project_columns!()
        ))
        .bind(id)
        .bind(update.title)
        .bind(update.details)
        .bind(update.category_id)
        .bind(update.total_target)
        .bind(update.start_date)
        .bind(update.end_date)
        .bind(status_names(editable))
        .fetch_optional(&mut *tx)
        .await?;

        let Some(project) = updated else {
            tx.rollback().await?;
            return Err(self.missing_or_invalid(id, "Project can no longer be edited.").await);
        };

        if let Some(tag_ids) = update.tag_ids {
            Self::replace_tags(&mut tx, id, &tag_ids).await?;
        }
        tx.commit().await?;

        debug!("✅ 项目更新成功: {}", project.slug);
        Ok(project)
    }

    async fn transition_status(&self, id: i64, transition: StatusTransition) -> DatabaseResult<Project> {
        debug!("🔄 项目 {} 状态流转: {:?} -> {}", id, transition.from, transition.to);

        let approve = transition.approval.is_some();
        let updated = sqlx::query_as::<_, Project>(concat!(
            r#"
            UPDATE projects
            SET status = $2,
                is_approved = CASE WHEN $3 THEN TRUE ELSE is_approved END,
                approved_by = CASE WHEN $3 THEN $4 ELSE approved_by END,
                approved_at = CASE WHEN $3 THEN $5 ELSE approved_at END,
                updated_at = now()
            WHERE id = $1
              AND status::text = ANY ($6::text[])
            RETURNING "#,
            project_columns!()
        ))
        .bind(id)
        .bind(transition.to)
        .bind(approve)
        .bind(transition.approval.and_then(|a| a.approved_by))
        .bind(transition.approval.map(|a| a.approved_at))
        .bind(status_names(&transition.from))
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(project) => {
                info!("✅ 项目 {} 状态已变更为 {}", project.slug, project.status);
                Ok(project)
            }
            None => Err(self
                .missing_or_invalid(id, &format!("Project cannot move to `{}` from its current status.", transition.to))
                .await),
        }
    }

    async fn cancel_project(&self, id: i64) -> DatabaseResult<Project> {
        debug!("🚫 取消项目: {}", id);

        let cancelled = sqlx::query_as::<_, Project>(concat!(
            r#"
            UPDATE projects
            SET status = 'cancelled',
                updated_at = now()
            WHERE id = $1
              AND status = 'active'
              AND current_amount * 100 < total_target * $2
            RETURNING "#,
            project_columns!()
        ))
        .bind(id)
        .bind(Decimal::from(CANCELLABLE_PROGRESS_PERCENT))
        .fetch_optional(&self.pool)
        .await?;

        match cancelled {
            Some(project) => {
                info!("✅ 项目已取消: {}", project.slug);
                Ok(project)
            }
            None => Err(self
                .missing_or_invalid(
                    id,
                    &format!("Only active projects below {CANCELLABLE_PROGRESS_PERCENT}% funding can be cancelled."),
                )
                .await),
        }
    }

    async fn set_featured(&self, id: i64, featured: bool) -> DatabaseResult<Project> {
        sqlx::query_as::<_, Project>(concat!(
            "UPDATE projects SET is_featured = $2, updated_at = now() WHERE id = $1 RETURNING ",
            project_columns!()
        ))
        .bind(id)
        .bind(featured)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::or_not_found(e, format!("Project {id} not found")))
    }

    async fn similar_candidates(&self, project: &Project, tag_ids: &[i64]) -> DatabaseResult<Vec<SimilarCandidate>> {
        debug!("🔍 相似项目候选: {} (标签 {:?})", project.slug, tag_ids);

        let candidates = sqlx::query_as::<_, SimilarCandidate>(concat!(
            "SELECT ",
            summary_columns!(),
            ", ARRAY(SELECT pt.tag_id FROM project_tags pt WHERE pt.project_id = p.id) AS tag_ids",
            summary_from!(),
            r#"
            WHERE p.id <> $1
              AND p.status = 'active'
              AND p.is_approved
              AND (p.category_id = $2 OR EXISTS (SELECT 1
                                                 FROM project_tags pt
                                                 WHERE pt.project_id = p.id
                                                   AND pt.tag_id = ANY ($3::bigint[])))
            "#
        ))
        .bind(project.id)
        .bind(project.category_id)
        .bind(tag_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(candidates)
    }

    /// 添加项目图片
    ///
    /// 锁定项目行后再处理主图标记，同一项目并发写入主图时只会保留最后提交的一张
    async fn add_image(&self, image: ProjectImageCreate) -> DatabaseResult<ProjectImage> {
        debug!("🖼️ 添加项目图片: {:?}", image);

        let mut tx = self.pool.begin().await?;

        let locked = sqlx::query_scalar::<_, i64>("SELECT id FROM projects WHERE id = $1 FOR UPDATE")
            .bind(image.project_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            return Err(DatabaseError::not_found(format!("Project {} not found", image.project_id)));
        }

        if image.is_primary {
            sqlx::query("UPDATE project_images SET is_primary = FALSE WHERE project_id = $1 AND is_primary")
                .bind(image.project_id)
                .execute(&mut *tx)
                .await?;
        }

        let created = sqlx::query_as::<_, ProjectImage>(
            r#"
            INSERT INTO project_images (project_id, image_ref, caption, is_primary, sort_order)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, project_id, image_ref, caption, is_primary, sort_order, created_at
            "#,
        )
        .bind(image.project_id)
        .bind(&image.image_ref)
        .bind(&image.caption)
        .bind(image.is_primary)
        .bind(image.sort_order)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn list_images(&self, project_id: i64) -> DatabaseResult<Vec<ProjectImage>> {
        let images = sqlx::query_as::<_, ProjectImage>(
            r#"
            SELECT id, project_id, image_ref, caption, is_primary, sort_order, created_at
            FROM project_images
            WHERE project_id = $1
            ORDER BY sort_order, created_at, id
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(images)
    }

    /// 活动结算
    ///
    /// 两个数据修改 CTE 的条件互斥（是否达到目标），同一项目不会被更新两次
    async fn settle_campaigns(&self, now: DateTime<Utc>) -> DatabaseResult<Vec<SettledProject>> {
        debug!("⏰ 开始结算众筹活动, 当前时间: {}", now);

        let settled = sqlx::query_as::<_, SettledProject>(
            r#"
            WITH funded AS (
                UPDATE projects
                    SET status = 'funded', updated_at = now()
                    WHERE status = 'active' AND current_amount >= total_target
                    RETURNING id, slug, status),
                 completed AS (
                     UPDATE projects
                         SET status = 'completed', updated_at = now()
                         WHERE status = 'active' AND current_amount < total_target AND end_date <= $1
                         RETURNING id, slug, status)
            SELECT id, slug, status FROM funded
            UNION ALL
            SELECT id, slug, status FROM completed
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        info!("✅ 结算完成, {} 个项目状态发生变化", settled.len());
        Ok(settled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("solar"), "%solar%");
        assert_eq!(like_pattern("100%"), "%100\\%%");
        assert_eq!(like_pattern("a_b"), "%a\\_b%");
        assert_eq!(like_pattern("c:\\tmp"), "%c:\\\\tmp%");
    }

    #[test]
    fn test_status_names() {
        assert_eq!(status_names(&ProjectStatus::PUBLIC), vec!["active".to_string(), "funded".to_string()]);
        assert!(status_names(&[]).is_empty());
    }
}
