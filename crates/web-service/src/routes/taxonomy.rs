//! 分类与标签接口

use crate::auth::CurrentUser;
use crate::models::common::{LimitQuery, PageQuery, Reply, ReplyList};
use crate::models::err::AppError;
use crate::models::projects::ProjectCard;
use crate::models::taxonomy::{CategoryCreateRequest, CategoryInfo, CategoryShowcaseInfo, TagCreateRequest, TagInfo};
use crate::routes::project_page;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use tracing::debug;
use validator::Validate;

const DEFAULT_POPULAR_TAGS: u32 = 10;

/// 启用的分类列表，附带已审核项目数量
#[utoipa::path(get,
    path = "/categories",
    tag = "taxonomy",
    responses((status = 200, description = "Active categories", body = Reply<Vec<CategoryInfo>>))
)]
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Reply<Vec<CategoryInfo>>>, AppError> {
    let categories = state.taxonomy.list_categories().await?;
    Ok(Json(Reply::new(categories.into_iter().map(Into::into).collect())))
}

/// 分类探索：启用的分类按名称排序，每个分类附带最多3个精选项目
#[utoipa::path(get,
    path = "/categories/explore",
    tag = "taxonomy",
    responses((status = 200, description = "Categories with featured projects", body = Reply<Vec<CategoryShowcaseInfo>>))
)]
pub async fn category_explore(
    State(state): State<AppState>,
) -> Result<Json<Reply<Vec<CategoryShowcaseInfo>>>, AppError> {
    let now = Utc::now();
    let showcases = state.taxonomy.category_explore().await?;
    Ok(Json(Reply::new(showcases.into_iter().map(|s| CategoryShowcaseInfo::from_showcase(s, now)).collect())))
}

/// 新建分类，仅管理员
#[utoipa::path(post,
    path = "/categories",
    tag = "taxonomy",
    request_body = CategoryCreateRequest,
    security(("basic_auth" = [])),
    responses(
        (status = 201, description = "Category created", body = Reply<CategoryInfo>),
        (status = 409, description = "Category name already taken"),
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CategoryCreateRequest>,
) -> Result<(StatusCode, Json<Reply<CategoryInfo>>), AppError> {
    debug!("Creating category {:#?}", request);

    let category = state.taxonomy.create_category(&user, request).await?;
    Ok((StatusCode::CREATED, Json(Reply::new(category.into()))))
}

/// 分类下的公开项目
#[utoipa::path(get,
    path = "/categories/{id}/projects",
    tag = "taxonomy",
    params(("id" = i64, Path, description = "Category id"), PageQuery),
    responses((status = 200, description = "Projects in category", body = ReplyList<ProjectCard>))
)]
pub async fn category_projects(
    State(state): State<AppState>,
    Path(category_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ReplyList<ProjectCard>>, AppError> {
    page.validate()?;

    let (_, result) = state.taxonomy.category_projects(category_id, page.limit(), page.offset()).await?;
    Ok(Json(project_page(result, page)))
}

/// 热门标签，按已审核项目数量倒序
#[utoipa::path(get,
    path = "/tags",
    tag = "taxonomy",
    params(LimitQuery),
    responses((status = 200, description = "Popular tags", body = Reply<Vec<TagInfo>>))
)]
pub async fn popular_tags(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Reply<Vec<TagInfo>>>, AppError> {
    let tags = state.taxonomy.popular_tags(i64::from(query.or(DEFAULT_POPULAR_TAGS))).await?;
    Ok(Json(Reply::new(tags.into_iter().map(Into::into).collect())))
}

/// 新建标签，仅管理员
#[utoipa::path(post,
    path = "/tags",
    tag = "taxonomy",
    request_body = TagCreateRequest,
    security(("basic_auth" = [])),
    responses((status = 201, description = "Tag created", body = Reply<TagInfo>))
)]
pub async fn create_tag(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<TagCreateRequest>,
) -> Result<(StatusCode, Json<Reply<TagInfo>>), AppError> {
    debug!("Creating tag {:#?}", request);

    let tag = state.taxonomy.create_tag(&user, request).await?;
    Ok((StatusCode::CREATED, Json(Reply::new(tag.into()))))
}

/// 带有指定标签的公开项目
#[utoipa::path(get,
    path = "/tags/{id}/projects",
    tag = "taxonomy",
    params(("id" = i64, Path, description = "Tag id"), PageQuery),
    responses((status = 200, description = "Projects with tag", body = ReplyList<ProjectCard>))
)]
pub async fn tag_projects(
    State(state): State<AppState>,
    Path(tag_id): Path<i64>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ReplyList<ProjectCard>>, AppError> {
    page.validate()?;

    let (_, result) = state.taxonomy.tag_projects(tag_id, page.limit(), page.offset()).await?;
    Ok(Json(project_page(result, page)))
}
