//! 举报数据库模型
//!
//! 举报对象用 [`ReportTarget`] 表示，项目和评论二选一，
//! 数据库中对应 `project_id` / `comment_id` 两列并由 CHECK 约束保证恰好一列非空。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

/// 举报原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "report_reason", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ReportReason {
    Inappropriate,
    Spam,
    Fake,
    Violence,
    Copyright,
    Other,
}

/// 举报对象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportTarget {
    Project(i64),
    Comment(i64),
}

impl ReportTarget {
    pub fn project_id(&self) -> Option<i64> {
        match self {
            ReportTarget::Project(id) => Some(*id),
            ReportTarget::Comment(_) => None,
        }
    }

    pub fn comment_id(&self) -> Option<i64> {
        match self {
            ReportTarget::Comment(id) => Some(*id),
            ReportTarget::Project(_) => None,
        }
    }

    /// 由两列可空外键还原举报对象，两列同时为空或同时非空时返回 `None`
    pub fn from_columns(project_id: Option<i64>, comment_id: Option<i64>) -> Option<Self> {
        match (project_id, comment_id) {
            (Some(id), None) => Some(ReportTarget::Project(id)),
            (None, Some(id)) => Some(ReportTarget::Comment(id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Report {
    pub id: i64,
    pub reporter_id: i64,
    pub target: ReportTarget,
    pub reason: ReportReason,
    pub description: String,
    pub is_resolved: bool,
    pub resolved_by: Option<i64>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for Report {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let project_id: Option<i64> = row.try_get("project_id")?;
        let comment_id: Option<i64> = row.try_get("comment_id")?;
        let target = ReportTarget::from_columns(project_id, comment_id).ok_or_else(|| sqlx::Error::ColumnDecode {
            index: "project_id".to_string(),
            source: "report must reference exactly one of project_id/comment_id".into(),
        })?;

        Ok(Report {
            id: row.try_get("id")?,
            reporter_id: row.try_get("reporter_id")?,
            target,
            reason: row.try_get("reason")?,
            description: row.try_get("description")?,
            is_resolved: row.try_get("is_resolved")?,
            resolved_by: row.try_get("resolved_by")?,
            resolved_at: row.try_get("resolved_at")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ReportCreate {
    pub reporter_id: i64,
    pub target: ReportTarget,
    pub reason: ReportReason,
    pub description: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_from_columns() {
        assert_eq!(ReportTarget::from_columns(Some(3), None), Some(ReportTarget::Project(3)));
        assert_eq!(ReportTarget::from_columns(None, Some(9)), Some(ReportTarget::Comment(9)));
        assert_eq!(ReportTarget::from_columns(None, None), None);
        assert_eq!(ReportTarget::from_columns(Some(1), Some(2)), None);
    }

    #[test]
    fn test_target_columns() {
        let target = ReportTarget::Comment(5);
        assert_eq!(target.project_id(), None);
        assert_eq!(target.comment_id(), Some(5));
    }
}
