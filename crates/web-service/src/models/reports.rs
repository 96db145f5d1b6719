use chrono::{DateTime, Utc};
use database::models::{Report, ReportReason, ReportTarget};
use serde::{Deserialize, Serialize};
use shared_lib::DEFAULT_PAGE_SIZE;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// 举报信息，描述为空时不做长度校验
#[derive(Deserialize, Debug, ToSchema)]
pub struct ReportRequest {
    #[schema(value_type = String, example = "spam")]
    pub reason: ReportReason,

    #[serde(default)]
    pub description: String,
}

fn default_page_index() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// 举报列表查询参数
#[derive(Deserialize, Debug, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct ReportQuery {
    /// 为空时返回全部举报
    pub resolved: Option<bool>,

    #[validate(range(min = 1))]
    #[serde(default = "default_page_index")]
    pub page_index: u32,

    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ReportInfo {
    pub id: i64,
    pub reporter_id: i64,
    /// `project` 或 `comment`
    #[schema(example = "project")]
    pub target_type: String,
    pub target_id: i64,
    #[schema(value_type = String, example = "spam")]
    pub reason: ReportReason,
    pub description: String,
    pub is_resolved: bool,
    pub resolved_by: Option<i64>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Report> for ReportInfo {
    fn from(report: Report) -> Self {
        let (target_type, target_id) = match report.target {
            ReportTarget::Project(id) => ("project", id),
            ReportTarget::Comment(id) => ("comment", id),
        };
        Self {
            id: report.id,
            reporter_id: report.reporter_id,
            target_type: target_type.to_string(),
            target_id,
            reason: report.reason,
            description: report.description,
            is_resolved: report.is_resolved,
            resolved_by: report.resolved_by,
            resolved_at: report.resolved_at,
            created_at: report.created_at,
        }
    }
}
