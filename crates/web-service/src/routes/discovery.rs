//! 项目搜索与首页接口

use crate::models::common::{Reply, ReplyList};
use crate::models::err::AppError;
use crate::models::projects::{HomepageReply, ProjectCard, ProjectSearch};
use crate::routes::project_page;
use crate::services::discovery::Homepage;
use crate::AppState;
use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use database::models::ProjectSummary;
use tracing::debug;

/// 根据查询参数搜索项目
///
/// 查询参数由 [`ProjectSearch`] 参数决定，所有参数都是可选的，多个条件按 AND 组合。
/// 只会返回已审核且状态为 active/funded 的项目。
///
/// ## Json化
///
/// 通过`Json(search): Json<ProjectSearch>`这种语法，框架能自动将body数据反序列化为[`ProjectSearch`]对象，如果
/// 反序列化失败会直接返回400错误。
#[utoipa::path(post,
    path = "/search-projects",
    tag = "projects",
    request_body = ProjectSearch,
    responses(
        (status = 200, description = "Search results", body = ReplyList<ProjectCard>),
        (status = 400, description = "Invalid search parameters"),
    ),
)]
pub async fn find_projects(
    State(state): State<AppState>,
    Json(search): Json<ProjectSearch>,
) -> Result<Json<ReplyList<ProjectCard>>, AppError> {
    debug!("🔍 搜索项目 {:#?}", search);

    let result = state.discovery.search(&search).await?;
    Ok(Json(project_page(result, search.page_query)))
}

fn cards(summaries: Vec<ProjectSummary>, now: DateTime<Utc>) -> Vec<ProjectCard> {
    summaries.into_iter().map(|s| ProjectCard::from_summary(s, now)).collect()
}

fn homepage_reply(home: Homepage, now: DateTime<Utc>) -> HomepageReply {
    HomepageReply {
        top_rated: cards(home.top_rated, now),
        latest: cards(home.latest, now),
        featured: cards(home.featured, now),
        trending: cards(home.trending, now),
        ending_soon: cards(home.ending_soon, now),
        categories: home.categories.into_iter().map(Into::into).collect(),
        popular_tags: home.popular_tags.into_iter().map(Into::into).collect(),
    }
}

/// 首页聚合数据
#[utoipa::path(get,
    path = "/homepage",
    tag = "projects",
    responses((status = 200, description = "Homepage sections", body = Reply<HomepageReply>))
)]
pub async fn homepage(State(state): State<AppState>) -> Result<Json<Reply<HomepageReply>>, AppError> {
    let now = Utc::now();
    let home = state.discovery.homepage(now).await?;
    Ok(Json(Reply::new(homepage_reply(home, now))))
}
