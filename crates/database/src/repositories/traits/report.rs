//! 举报仓库 trait 定义

use crate::models::report::{Report, ReportCreate};
use crate::DatabaseResult;

#[async_trait::async_trait]
pub trait ReportRepositoryTrait: Send + Sync + 'static {
    async fn create_report(&self, report: ReportCreate) -> DatabaseResult<Report>;

    async fn get_report(&self, id: i64) -> DatabaseResult<Report>;

    /// 举报列表，`resolved` 为 `None` 时不过滤处理状态
    async fn list_reports(&self, resolved: Option<bool>, limit: i64, offset: i64) -> DatabaseResult<Vec<Report>>;

    /// 标记举报已处理，重复处理返回 `InvalidState`
    async fn resolve_report(&self, id: i64, resolver_id: i64) -> DatabaseResult<Report>;
}
