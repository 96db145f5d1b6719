//! 项目相关接口
//!
//! 项目通过 `slug` 定位。未审核的项目只有创建者能看到，其他人访问时返回 404。

use crate::auth::{CurrentUser, MaybeUser};
use crate::models::common::{LimitQuery, Reply};
use crate::models::engagement::{CommentInfo, RatingInfo};
use crate::models::err::AppError;
use crate::models::projects::{
    AddImageRequest, CreateProjectRequest, FeatureRequest, ImageInfo, MarkStatusRequest, ProjectCard, ProjectDetail,
    ProjectInfo, SettledInfo, UpdateProjectRequest,
};
use crate::models::taxonomy::CategoryInfo;
use crate::services::project::ProjectDetails;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use shared_lib::models::limits::DEFAULT_SIMILAR_LIMIT;
use tracing::debug;

fn detail_reply(details: ProjectDetails, now: DateTime<Utc>) -> ProjectDetail {
    ProjectDetail {
        creator_username: details.summary.creator_username,
        project: ProjectInfo::from_project(details.project, now),
        category: CategoryInfo::from(details.category),
        tags: details.tags.into_iter().map(Into::into).collect(),
        images: details.images.into_iter().map(Into::into).collect(),
        rating: details.rating.into(),
        my_rating: details.my_rating.map(RatingInfo::from),
        comment_count: details.comments.total,
        comments: details.comments.comments.into_iter().map(CommentInfo::from).collect(),
        similar: details.similar.into_iter().map(|s| ProjectCard::from_summary(s, now)).collect(),
    }
}

fn project_reply(project: database::models::Project) -> Json<Reply<ProjectInfo>> {
    Json(Reply::new(ProjectInfo::from_project(project, Utc::now())))
}

/// 创建项目
///
/// 根据审核策略，新项目直接上线（自动审核），或者进入草稿/待审核状态。
#[utoipa::path(post,
    path = "/projects",
    tag = "projects",
    request_body = CreateProjectRequest,
    security(("basic_auth" = [])),
    responses(
        (status = 201, description = "Project created", body = Reply<ProjectInfo>),
        (status = 400, description = "Invalid project fields"),
    )
)]
pub async fn create_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Reply<ProjectInfo>>), AppError> {
    debug!("Creating project {:#?}", request);

    let project = state.projects.create(&user, request).await?;
    Ok((StatusCode::CREATED, project_reply(project)))
}

/// 项目详情
///
/// 包含分类、标签、图片、评分统计、当前用户的评分、第一页评论和相似项目。
#[utoipa::path(get,
    path = "/projects/{slug}",
    tag = "projects",
    params(("slug" = String, Path, description = "Project slug")),
    responses(
        (status = 200, description = "Project detail", body = Reply<ProjectDetail>),
        (status = 404, description = "Project not found or not visible"),
    )
)]
pub async fn get_project(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(slug): Path<String>,
) -> Result<Json<Reply<ProjectDetail>>, AppError> {
    debug!("Getting project {}", slug);

    let details = state.projects.detail(&slug, viewer.user()).await?;
    Ok(Json(Reply::new(detail_reply(details, Utc::now()))))
}

/// 更新项目信息
///
/// 只有创建者可以修改，且项目必须处于 draft 或 pending 状态。
#[utoipa::path(patch,
    path = "/projects/{slug}",
    tag = "projects",
    params(("slug" = String, Path, description = "Project slug")),
    request_body = UpdateProjectRequest,
    security(("basic_auth" = [])),
    responses((status = 200, description = "Updated project", body = Reply<ProjectInfo>))
)]
pub async fn update_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Json(request): Json<UpdateProjectRequest>,
) -> Result<Json<Reply<ProjectInfo>>, AppError> {
    debug!("Updating project {} with {:#?}", slug, request);

    let project = state.projects.update(&user, &slug, request).await?;
    Ok(project_reply(project))
}

/// 草稿提交审核
#[utoipa::path(post,
    path = "/projects/{slug}/submit",
    tag = "projects",
    params(("slug" = String, Path, description = "Project slug")),
    security(("basic_auth" = [])),
    responses((status = 200, description = "Project is pending review", body = Reply<ProjectInfo>))
)]
pub async fn submit_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
) -> Result<Json<Reply<ProjectInfo>>, AppError> {
    debug!("Submitting project {}", slug);
    Ok(project_reply(state.projects.submit(&user, &slug).await?))
}

/// 管理员审核通过
#[utoipa::path(post,
    path = "/projects/{slug}/approve",
    tag = "projects",
    params(("slug" = String, Path, description = "Project slug")),
    security(("basic_auth" = [])),
    responses((status = 200, description = "Project is active", body = Reply<ProjectInfo>))
)]
pub async fn approve_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
) -> Result<Json<Reply<ProjectInfo>>, AppError> {
    debug!("Approving project {}", slug);
    Ok(project_reply(state.projects.approve(&user, &slug).await?))
}

/// 创建者取消项目
///
/// 只有筹款进度低于25%的 active 项目可以取消。
#[utoipa::path(post,
    path = "/projects/{slug}/cancel",
    tag = "projects",
    params(("slug" = String, Path, description = "Project slug")),
    security(("basic_auth" = [])),
    responses(
        (status = 200, description = "Project cancelled", body = Reply<ProjectInfo>),
        (status = 409, description = "Project can no longer be cancelled"),
    )
)]
pub async fn cancel_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
) -> Result<Json<Reply<ProjectInfo>>, AppError> {
    debug!("Cancelling project {}", slug);
    Ok(project_reply(state.projects.cancel(&user, &slug).await?))
}

/// 设置或取消推荐
#[utoipa::path(put,
    path = "/projects/{slug}/featured",
    tag = "projects",
    params(("slug" = String, Path, description = "Project slug")),
    request_body = FeatureRequest,
    security(("basic_auth" = [])),
    responses((status = 200, description = "Updated project", body = Reply<ProjectInfo>))
)]
pub async fn feature_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Json(request): Json<FeatureRequest>,
) -> Result<Json<Reply<ProjectInfo>>, AppError> {
    debug!("Featuring project {} = {}", slug, request.featured);
    Ok(project_reply(state.projects.set_featured(&user, &slug, request.featured).await?))
}

/// 管理员手动标记 funded 或 completed
#[utoipa::path(put,
    path = "/projects/{slug}/status",
    tag = "projects",
    params(("slug" = String, Path, description = "Project slug")),
    request_body = MarkStatusRequest,
    security(("basic_auth" = [])),
    responses((status = 200, description = "Updated project", body = Reply<ProjectInfo>))
)]
pub async fn mark_project_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Json(request): Json<MarkStatusRequest>,
) -> Result<Json<Reply<ProjectInfo>>, AppError> {
    debug!("Marking project {} as {:?}", slug, request.status);
    Ok(project_reply(state.projects.mark_status(&user, &slug, request.status).await?))
}

/// 项目图片列表，主图在前
#[utoipa::path(get,
    path = "/projects/{slug}/images",
    tag = "projects",
    params(("slug" = String, Path, description = "Project slug")),
    responses((status = 200, description = "Project images", body = Reply<Vec<ImageInfo>>))
)]
pub async fn list_images(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(slug): Path<String>,
) -> Result<Json<Reply<Vec<ImageInfo>>>, AppError> {
    let images = state.projects.images(&slug, viewer.user()).await?;
    Ok(Json(Reply::new(images.into_iter().map(Into::into).collect())))
}

/// 添加图片引用
///
/// 设置为主图时，同一项目原有的主图会被取消。
#[utoipa::path(post,
    path = "/projects/{slug}/images",
    tag = "projects",
    params(("slug" = String, Path, description = "Project slug")),
    request_body = AddImageRequest,
    security(("basic_auth" = [])),
    responses((status = 201, description = "Image added", body = Reply<ImageInfo>))
)]
pub async fn add_image(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Json(request): Json<AddImageRequest>,
) -> Result<(StatusCode, Json<Reply<ImageInfo>>), AppError> {
    debug!("Adding image to project {} {:#?}", slug, request);

    let image = state.projects.add_image(&user, &slug, request).await?;
    Ok((StatusCode::CREATED, Json(Reply::new(image.into()))))
}

/// 相似项目
#[utoipa::path(get,
    path = "/projects/{slug}/similar",
    tag = "projects",
    params(("slug" = String, Path, description = "Project slug"), LimitQuery),
    responses((status = 200, description = "Similar projects", body = Reply<Vec<ProjectCard>>))
)]
pub async fn similar_projects(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Reply<Vec<ProjectCard>>>, AppError> {
    let limit = query.or(DEFAULT_SIMILAR_LIMIT) as usize;
    let similar = state.projects.similar(&slug, viewer.user(), limit).await?;

    let now = Utc::now();
    Ok(Json(Reply::new(similar.into_iter().map(|s| ProjectCard::from_summary(s, now)).collect())))
}

/// 手动触发一次活动结算
///
/// 已到期的 active 项目：达到目标的标记为 funded，其余标记为 completed。
#[utoipa::path(post,
    path = "/settlements",
    tag = "projects",
    security(("basic_auth" = [])),
    responses((status = 200, description = "Settled projects", body = Reply<Vec<SettledInfo>>))
)]
pub async fn settle_projects(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Reply<Vec<SettledInfo>>>, AppError> {
    crate::services::require_staff(&user)?;

    let settled = state.projects.settle(Utc::now()).await?;
    Ok(Json(Reply::new(settled.into_iter().map(Into::into).collect())))
}
