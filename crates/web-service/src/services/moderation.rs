//! 举报与审核队列

use crate::models::err::AppError;
use crate::models::reports::{ReportQuery, ReportRequest};
use crate::services::{ensure_visible, require_staff};
use crate::validation::{check_trimmed_length, into_result};
use database::models::{Report, ReportCreate, ReportTarget, User};
use database::Repositories;
use tracing::{info, warn};
use validator::{Validate, ValidationErrors};

const DESCRIPTION_MIN_CHARS: usize = 10;
const DESCRIPTION_MAX_CHARS: usize = 500;

/// 描述可以为空，非空时去除空白后长度需在 10..=500 之间
fn check_description(description: &str) -> Result<String, AppError> {
    if description.trim().is_empty() {
        return Ok(String::new());
    }
    let mut errors = ValidationErrors::new();
    let trimmed =
        check_trimmed_length(&mut errors, "description", description, DESCRIPTION_MIN_CHARS, DESCRIPTION_MAX_CHARS);
    into_result(errors)?;
    Ok(trimmed)
}

#[derive(Clone)]
pub struct ModerationService {
    repos: Repositories,
}

impl ModerationService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    async fn file(&self, reporter: &User, target: ReportTarget, request: ReportRequest) -> Result<Report, AppError> {
        let description = check_description(&request.description)?;
        let report = self
            .repos
            .reports
            .create_report(ReportCreate { reporter_id: reporter.id, target, reason: request.reason, description })
            .await?;
        info!("🚩 用户 {} 提交举报 {} ({:?})", reporter.id, report.id, report.target);
        Ok(report)
    }

    /// 举报项目，项目需对举报人可见
    pub async fn report_project(&self, reporter: &User, slug: &str, request: ReportRequest) -> Result<Report, AppError> {
        let project = self.repos.projects.get_project_by_slug(slug).await?;
        ensure_visible(&project, Some(reporter))?;
        self.file(reporter, ReportTarget::Project(project.id), request).await
    }

    /// 举报评论，未审核的评论视为不存在
    pub async fn report_comment(
        &self,
        reporter: &User,
        comment_id: i64,
        request: ReportRequest,
    ) -> Result<Report, AppError> {
        let comment = self.repos.engagement.get_comment(comment_id).await?;
        if !comment.is_approved {
            return Err(AppError::not_found(format!("Comment {comment_id} not found")));
        }
        self.file(reporter, ReportTarget::Comment(comment.id), request).await
    }

    /// 审核队列，按提交时间倒序
    pub async fn list_reports(&self, staff: &User, query: &ReportQuery) -> Result<Vec<Report>, AppError> {
        require_staff(staff)?;
        query.validate()?;

        let limit = i64::from(query.page_size);
        let offset = i64::from(query.page_index.saturating_sub(1)) * limit;
        Ok(self.repos.reports.list_reports(query.resolved, limit, offset).await?)
    }

    /// 处理举报，重复处理返回冲突
    pub async fn resolve(&self, staff: &User, report_id: i64) -> Result<Report, AppError> {
        require_staff(staff)?;
        let report = self.repos.reports.resolve_report(report_id, staff.id).await.inspect_err(|e| {
            warn!("⚠️ 处理举报 {} 失败: {}", report_id, e);
        })?;
        info!("✅ 管理员 {} 已处理举报 {}", staff.id, report.id);
        Ok(report)
    }
}
