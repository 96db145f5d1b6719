//! 项目发现服务：搜索、首页聚合、用户项目列表
//!
//! 所有公开列表的基础条件都是「已审核且状态为 active/funded」，
//! 其他条件在此基础上按 AND 组合。

use crate::models::err::AppError;
use crate::models::projects::ProjectSearch;
use chrono::{DateTime, Duration, Utc};
use database::models::{
    CategoryWithCount, ProjectQuery, ProjectSearchResult, ProjectSort, ProjectStatus, ProjectSummary, TagWithCount,
    TextFilter, User,
};
use database::Repositories;
use shared_lib::models::limits::HOMEPAGE_WINDOW_DAYS;
use tracing::debug;
use validator::Validate;

const HOMEPAGE_TOP_RATED: i64 = 5;
const HOMEPAGE_LATEST: i64 = 5;
const HOMEPAGE_FEATURED: i64 = 5;
const HOMEPAGE_TRENDING: i64 = 3;
const HOMEPAGE_ENDING_SOON: i64 = 3;
const HOMEPAGE_POPULAR_TAGS: i64 = 10;

/// 首页各栏目数据
#[derive(Debug)]
pub struct Homepage {
    pub top_rated: Vec<ProjectSummary>,
    pub latest: Vec<ProjectSummary>,
    pub featured: Vec<ProjectSummary>,
    pub trending: Vec<ProjectSummary>,
    pub ending_soon: Vec<ProjectSummary>,
    pub categories: Vec<CategoryWithCount>,
    pub popular_tags: Vec<TagWithCount>,
}

/// 将搜索表单转换为仓库查询，`None` 表示条件不可能满足，无需查询
pub fn build_search_query(search: &ProjectSearch) -> Option<ProjectQuery> {
    let page = search.page_query;
    let mut query = ProjectQuery::public(page.limit(), page.offset());

    query.text = search
        .search_query
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(|term| TextFilter { term: term.to_string(), field: search.search_type.into() });
    query.category_id = search.category_id;
    query.min_target = search.min_target;
    query.max_target = search.max_target;
    query.sort = search.sort.into();

    // 状态条件只能缩小公开状态集合
    if let Some(status) = search.status {
        if !status.is_public() {
            return None;
        }
        query.statuses = vec![status];
    }
    Some(query)
}

#[derive(Clone)]
pub struct DiscoveryService {
    repos: Repositories,
}

impl DiscoveryService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// 搜索公开项目
    pub async fn search(&self, search: &ProjectSearch) -> Result<ProjectSearchResult, AppError> {
        debug!("🔍 搜索项目 {:?}", search);
        search.validate()?;

        if let (Some(min), Some(max)) = (search.min_target, search.max_target) {
            if min > max {
                return Err(AppError::field(
                    "max_target",
                    "range",
                    "Maximum target must be greater than or equal to minimum target.",
                ));
            }
        }

        match build_search_query(search) {
            Some(query) => Ok(self.repos.projects.find_projects(&query).await?),
            None => Ok(ProjectSearchResult { projects: vec![], total: 0 }),
        }
    }

    /// 首页聚合数据，`now` 决定趋势和即将结束两个栏目的统计窗口
    pub async fn homepage(&self, now: DateTime<Utc>) -> Result<Homepage, AppError> {
        debug!("🏠 查询首页数据");
        let window = Duration::days(HOMEPAGE_WINDOW_DAYS);
        let active_only = |limit: i64| {
            let mut query = ProjectQuery::public(limit, 0);
            query.statuses = vec![ProjectStatus::Active];
            query
        };

        let mut top_rated = active_only(HOMEPAGE_TOP_RATED);
        top_rated.rated_only = true;
        top_rated.sort = ProjectSort::Rating;

        let latest = ProjectQuery::public(HOMEPAGE_LATEST, 0);

        let mut featured = ProjectQuery::public(HOMEPAGE_FEATURED, 0);
        featured.featured_only = true;

        let mut trending = active_only(HOMEPAGE_TRENDING);
        trending.sort = ProjectSort::Trending;
        trending.trending_since = Some(now - window);

        let mut ending_soon = active_only(HOMEPAGE_ENDING_SOON);
        ending_soon.ends_after = Some(now);
        ending_soon.ends_before = Some(now + window);
        ending_soon.sort = ProjectSort::Deadline;

        let projects = &self.repos.projects;
        Ok(Homepage {
            top_rated: projects.find_projects(&top_rated).await?.projects,
            latest: projects.find_projects(&latest).await?.projects,
            featured: projects.find_projects(&featured).await?.projects,
            trending: projects.find_projects(&trending).await?.projects,
            ending_soon: projects.find_projects(&ending_soon).await?.projects,
            categories: self.repos.taxonomy.list_categories(true).await?,
            popular_tags: self.repos.taxonomy.list_popular_tags(HOMEPAGE_POPULAR_TAGS).await?,
        })
    }

    /// 指定用户创建的已审核项目（任意状态）
    pub async fn user_projects(
        &self,
        username: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(User, ProjectSearchResult), AppError> {
        let user = self
            .repos
            .users
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::not_found(format!("User `{username}` not found")))?;

        let mut query = ProjectQuery::public(limit, offset);
        query.creator_id = Some(user.id);
        query.statuses.clear();
        let result = self.repos.projects.find_projects(&query).await?;
        Ok((user, result))
    }
}
