//! 举报与审核队列接口

use crate::auth::CurrentUser;
use crate::models::common::Reply;
use crate::models::err::AppError;
use crate::models::reports::{ReportInfo, ReportQuery, ReportRequest};
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::debug;

/// 举报项目
#[utoipa::path(post,
    path = "/projects/{slug}/reports",
    tag = "moderation",
    params(("slug" = String, Path, description = "Project slug")),
    request_body = ReportRequest,
    security(("basic_auth" = [])),
    responses((status = 201, description = "Report filed", body = Reply<ReportInfo>))
)]
pub async fn report_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Json(request): Json<ReportRequest>,
) -> Result<(StatusCode, Json<Reply<ReportInfo>>), AppError> {
    debug!("Reporting project {} {:#?}", slug, request);

    let report = state.moderation.report_project(&user, &slug, request).await?;
    Ok((StatusCode::CREATED, Json(Reply::new(report.into()))))
}

/// 举报评论
#[utoipa::path(post,
    path = "/comments/{id}/reports",
    tag = "moderation",
    params(("id" = i64, Path, description = "Comment id")),
    request_body = ReportRequest,
    security(("basic_auth" = [])),
    responses((status = 201, description = "Report filed", body = Reply<ReportInfo>))
)]
pub async fn report_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(comment_id): Path<i64>,
    Json(request): Json<ReportRequest>,
) -> Result<(StatusCode, Json<Reply<ReportInfo>>), AppError> {
    debug!("Reporting comment {} {:#?}", comment_id, request);

    let report = state.moderation.report_comment(&user, comment_id, request).await?;
    Ok((StatusCode::CREATED, Json(Reply::new(report.into()))))
}

/// 审核队列，仅管理员
#[utoipa::path(get,
    path = "/reports",
    tag = "moderation",
    params(ReportQuery),
    security(("basic_auth" = [])),
    responses((status = 200, description = "Reports", body = Reply<Vec<ReportInfo>>))
)]
pub async fn list_reports(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<ReportQuery>,
) -> Result<Json<Reply<Vec<ReportInfo>>>, AppError> {
    let reports = state.moderation.list_reports(&user, &query).await?;
    Ok(Json(Reply::new(reports.into_iter().map(Into::into).collect())))
}

/// 标记举报已处理
#[utoipa::path(post,
    path = "/reports/{id}/resolve",
    tag = "moderation",
    params(("id" = i64, Path, description = "Report id")),
    security(("basic_auth" = [])),
    responses(
        (status = 200, description = "Report resolved", body = Reply<ReportInfo>),
        (status = 409, description = "Report already resolved"),
    )
)]
pub async fn resolve_report(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(report_id): Path<i64>,
) -> Result<Json<Reply<ReportInfo>>, AppError> {
    let report = state.moderation.resolve(&user, report_id).await?;
    Ok(Json(Reply::new(report.into())))
}
