//! 举报仓库

use crate::models::report::{Report, ReportCreate};
use crate::repositories::traits::ReportRepositoryTrait;
use crate::{DatabaseError, DatabaseResult};
use sqlx::PgPool;
use tracing::{debug, info};

macro_rules! report_columns {
    () => {
        "id, reporter_id, project_id, comment_id, reason, description, is_resolved, resolved_by, resolved_at, created_at"
    };
}

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl ReportRepositoryTrait for ReportRepository {
    async fn create_report(&self, report: ReportCreate) -> DatabaseResult<Report> {
        debug!("🚩 新举报: {:?}", report);

        let created = sqlx::query_as::<_, Report>(concat!(
            r#"
            INSERT INTO reports (reporter_id, project_id, comment_id, reason, description)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING "#,
            report_columns!()
        ))
        .bind(report.reporter_id)
        .bind(report.target.project_id())
        .bind(report.target.comment_id())
        .bind(report.reason)
        .bind(report.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_report(&self, id: i64) -> DatabaseResult<Report> {
        sqlx::query_as::<_, Report>(concat!("SELECT ", report_columns!(), " FROM reports WHERE id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::or_not_found(e, format!("Report {id} not found")))
    }

    async fn list_reports(&self, resolved: Option<bool>, limit: i64, offset: i64) -> DatabaseResult<Vec<Report>> {
        let reports = sqlx::query_as::<_, Report>(concat!(
            "SELECT ",
            report_columns!(),
            r#"
            FROM reports
            WHERE ($1::boolean IS NULL OR is_resolved = $1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(resolved)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(reports)
    }

    /// 处理举报，已处理的举报再次处理返回 `InvalidState`
    async fn resolve_report(&self, id: i64, resolver_id: i64) -> DatabaseResult<Report> {
        let resolved = sqlx::query_as::<_, Report>(concat!(
            r#"
            UPDATE reports
            SET is_resolved = TRUE,
                resolved_by = $2,
                resolved_at = now()
            WHERE id = $1
              AND NOT is_resolved
            RETURNING "#,
            report_columns!()
        ))
        .bind(id)
        .bind(resolver_id)
        .fetch_optional(&self.pool)
        .await?;

        match resolved {
            Some(report) => {
                info!("✅ 举报 {} 已由用户 {} 处理", report.id, resolver_id);
                Ok(report)
            }
            None => {
                // 区分举报不存在和重复处理
                self.get_report(id).await?;
                Err(DatabaseError::invalid_state(format!("Report {id} is already resolved.")))
            }
        }
    }
}
