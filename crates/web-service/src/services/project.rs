//! 项目服务
//!
//! 提供项目生命周期相关的业务逻辑：
//! `draft → pending → active → {funded, cancelled, completed}`
//!
//! 权限和依赖当前时间的校验在这里完成，状态前置条件由仓库层的条件更新保证。

use crate::models::err::AppError;
use crate::models::projects::{AddImageRequest, CreateProjectRequest, UpdateProjectRequest};
use crate::services::similarity::similar_projects;
use crate::services::{collect_errors, ensure_visible, require_creator, require_staff};
use crate::validation::{check_campaign_dates, into_result, rule};
use chrono::{DateTime, Utc};
use database::models::{
    Approval, Category, CommentPage, Project, ProjectCreate, ProjectImage, ProjectImageCreate, ProjectStatus, ProjectSummary,
    ProjectUpdate, Rating, RatingSummary, SettledProject, StatusTransition, Tag, User,
};
use database::{DatabaseError, Repositories};
use rand::Rng;
use shared_lib::models::limits::DEFAULT_SIMILAR_LIMIT;
use shared_lib::ModerationPolicy;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};
use validator::{Validate, ValidationErrors};

/// slug 中标题部分的最大长度
const SLUG_BASE_MAX_LEN: usize = 200;

/// slug 冲突时的重试次数
const SLUG_ATTEMPTS: usize = 3;

/// 详情页第一页评论数量
const DETAIL_COMMENT_LIMIT: i64 = 10;

/// 标题转换为 URL 友好的形式：小写 ASCII 字母数字，其他字符折叠为单个 `-`
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }

    let mut slug: String = slug.chars().take(SLUG_BASE_MAX_LEN).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    if slug.is_empty() {
        slug.push_str("project");
    }
    slug
}

/// 生成项目 slug：`slugified-title-xxxxxxxx`，后缀为8位随机十六进制
pub fn generate_slug(title: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen();
    format!("{}-{:08x}", slugify(title), suffix)
}

/// 项目详情页数据
#[derive(Debug)]
pub struct ProjectDetails {
    pub project: Project,
    pub summary: ProjectSummary,
    pub category: Category,
    pub tags: Vec<Tag>,
    pub images: Vec<ProjectImage>,
    pub rating: RatingSummary,
    pub my_rating: Option<Rating>,
    pub comments: CommentPage,
    pub similar: Vec<ProjectSummary>,
}

#[derive(Clone)]
pub struct ProjectService {
    repos: Repositories,
    policy: ModerationPolicy,
}

impl ProjectService {
    pub fn new(repos: Repositories, policy: ModerationPolicy) -> Self {
        Self { repos, policy }
    }

    /// 检查分类存在且启用
    async fn check_category(&self, errors: &mut ValidationErrors, category_id: i64) -> Result<(), AppError> {
        match self.repos.taxonomy.get_category(category_id).await {
            Ok(category) if category.is_active => {}
            Ok(_) | Err(DatabaseError::NotFound(_)) => {
                errors.add("category_id", rule("invalid", "Select a valid category."));
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// 检查标签全部存在，返回去重后的标签ID
    async fn check_tags(&self, errors: &mut ValidationErrors, tag_ids: &[i64]) -> Result<Vec<i64>, AppError> {
        let unique: Vec<i64> = tag_ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        let found = self.repos.taxonomy.find_tags(&unique).await?;
        if found.len() != unique.len() {
            errors.add("tag_ids", rule("invalid", "Select valid tags."));
        }
        Ok(unique)
    }

    async fn project_by_slug(&self, slug: &str) -> Result<Project, AppError> {
        Ok(self.repos.projects.get_project_by_slug(slug).await?)
    }

    /// 创建项目
    ///
    /// 初始状态由审核策略决定：
    /// - `AutoApprove`: active，已审核，审核人为空（系统）
    /// - `RequireModeration`: `as_draft` 时为 draft，否则为 pending
    pub async fn create(&self, creator: &User, request: CreateProjectRequest) -> Result<Project, AppError> {
        debug!("🆕 创建项目 {:?}", request);

        let now = Utc::now();
        let mut errors = collect_errors(request.validate());
        let title = request.title.trim().to_string();
        if title.is_empty() {
            errors.add("title", rule("required", "This field may not be blank."));
        }
        if request.details.trim().is_empty() {
            errors.add("details", rule("required", "This field may not be blank."));
        }
        check_campaign_dates(&mut errors, request.start_date, request.end_date, now, true);
        self.check_category(&mut errors, request.category_id).await?;
        let tag_ids = self.check_tags(&mut errors, &request.tag_ids).await?;
        into_result(errors)?;

        let (status, approval) = match self.policy {
            ModerationPolicy::AutoApprove => {
                (ProjectStatus::Active, Some(Approval { approved_by: None, approved_at: now }))
            }
            ModerationPolicy::RequireModeration if request.as_draft => (ProjectStatus::Draft, None),
            ModerationPolicy::RequireModeration => (ProjectStatus::Pending, None),
        };

        let mut attempt = 0;
        loop {
            attempt += 1;
            let create = ProjectCreate {
                title: title.clone(),
                slug: generate_slug(&title),
                details: request.details.clone(),
                category_id: request.category_id,
                creator_id: creator.id,
                tag_ids: tag_ids.clone(),
                total_target: request.total_target,
                start_date: request.start_date,
                end_date: request.end_date,
                status,
                approval,
            };
            match self.repos.projects.create_project(create).await {
                Ok(project) => {
                    info!("✅ 项目创建成功: {} ({}) 状态 {}", project.slug, project.id, project.status);
                    return Ok(project);
                }
                Err(DatabaseError::Conflict(msg)) if attempt < SLUG_ATTEMPTS => {
                    warn!("⚠️ slug 冲突，重新生成: {}", msg);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// 修改项目，仅创建者可修改，且只能在 draft/pending 状态修改
    ///
    /// 只提供了一个日期时，会与已保存的另一个日期一起重新校验
    pub async fn update(&self, user: &User, slug: &str, request: UpdateProjectRequest) -> Result<Project, AppError> {
        debug!("✏️ 修改项目 {} {:?}", slug, request);

        let project = self.project_by_slug(slug).await?;
        require_creator(user, &project)?;
        if !project.status.is_editable() {
            return Err(AppError::invalid_state(format!(
                "Project in `{}` status can no longer be edited.",
                project.status
            )));
        }

        let mut errors = collect_errors(request.validate());
        if let Some(title) = &request.title {
            if title.trim().is_empty() {
                errors.add("title", rule("required", "This field may not be blank."));
            }
        }
        if request.start_date.is_some() || request.end_date.is_some() {
            let start = request.start_date.unwrap_or(project.start_date);
            let end = request.end_date.unwrap_or(project.end_date);
            let start_changed = request.start_date.is_some_and(|s| s != project.start_date);
            check_campaign_dates(&mut errors, start, end, Utc::now(), start_changed);
        }
        if let Some(category_id) = request.category_id {
            self.check_category(&mut errors, category_id).await?;
        }
        let tag_ids = match &request.tag_ids {
            Some(ids) => Some(self.check_tags(&mut errors, ids).await?),
            None => None,
        };
        into_result(errors)?;

        let update = ProjectUpdate {
            title: request.title.map(|t| t.trim().to_string()),
            details: request.details,
            category_id: request.category_id,
            tag_ids,
            total_target: request.total_target,
            start_date: request.start_date,
            end_date: request.end_date,
        };
        Ok(self.repos.projects.update_project(project.id, update, &ProjectStatus::EDITABLE).await?)
    }

    /// 创建者提交草稿等待审核：draft → pending
    pub async fn submit(&self, user: &User, slug: &str) -> Result<Project, AppError> {
        let project = self.project_by_slug(slug).await?;
        require_creator(user, &project)?;

        let transition = StatusTransition { from: vec![ProjectStatus::Draft], to: ProjectStatus::Pending, approval: None };
        let project = self.repos.projects.transition_status(project.id, transition).await?;
        info!("📨 项目已提交审核: {}", project.slug);
        Ok(project)
    }

    /// 管理员审核通过：draft/pending → active
    pub async fn approve(&self, staff: &User, slug: &str) -> Result<Project, AppError> {
        require_staff(staff)?;
        let project = self.project_by_slug(slug).await?;

        let transition = StatusTransition {
            from: ProjectStatus::EDITABLE.to_vec(),
            to: ProjectStatus::Active,
            approval: Some(Approval { approved_by: Some(staff.id), approved_at: Utc::now() }),
        };
        let project = self.repos.projects.transition_status(project.id, transition).await?;
        info!("✅ 项目审核通过: {} by {}", project.slug, staff.username);
        Ok(project)
    }

    /// 创建者取消项目，只有 active 且进度低于 25% 时允许
    pub async fn cancel(&self, user: &User, slug: &str) -> Result<Project, AppError> {
        let project = self.project_by_slug(slug).await?;
        require_creator(user, &project)?;

        match self.repos.projects.cancel_project(project.id).await {
            Ok(project) => {
                info!("🛑 项目已取消: {}", project.slug);
                Ok(project)
            }
            Err(e) => {
                warn!("⚠️ 项目 {} 取消被拒绝: {}", project.slug, e);
                Err(e.into())
            }
        }
    }

    pub async fn set_featured(&self, staff: &User, slug: &str, featured: bool) -> Result<Project, AppError> {
        require_staff(staff)?;
        let project = self.project_by_slug(slug).await?;
        let project = self.repos.projects.set_featured(project.id, featured).await?;
        info!("⭐ 项目 {} 推荐状态: {}", project.slug, featured);
        Ok(project)
    }

    /// 管理员手动结算：active → funded/completed
    pub async fn mark_status(&self, staff: &User, slug: &str, status: ProjectStatus) -> Result<Project, AppError> {
        require_staff(staff)?;
        if !matches!(status, ProjectStatus::Funded | ProjectStatus::Completed) {
            return Err(AppError::field("status", "invalid", "Status must be `funded` or `completed`."));
        }

        let project = self.project_by_slug(slug).await?;
        let transition = StatusTransition { from: vec![ProjectStatus::Active], to: status, approval: None };
        let project = self.repos.projects.transition_status(project.id, transition).await?;
        info!("🏁 项目 {} 已标记为 {}", project.slug, project.status);
        Ok(project)
    }

    /// 执行一次活动结算
    pub async fn settle(&self, now: DateTime<Utc>) -> Result<Vec<SettledProject>, AppError> {
        let settled = self.repos.projects.settle_campaigns(now).await?;
        if !settled.is_empty() {
            info!("🏁 结算完成，{} 个项目状态变化", settled.len());
        }
        Ok(settled)
    }

    /// 创建者添加项目图片
    pub async fn add_image(&self, user: &User, slug: &str, request: AddImageRequest) -> Result<ProjectImage, AppError> {
        request.validate()?;
        let project = self.project_by_slug(slug).await?;
        require_creator(user, &project)?;

        let image = self
            .repos
            .projects
            .add_image(ProjectImageCreate {
                project_id: project.id,
                image_ref: request.image_ref,
                caption: request.caption,
                is_primary: request.is_primary,
                sort_order: request.sort_order,
            })
            .await?;
        debug!("🖼️ 项目 {} 添加图片 {}", project.slug, image.id);
        Ok(image)
    }

    pub async fn images(&self, slug: &str, viewer: Option<&User>) -> Result<Vec<ProjectImage>, AppError> {
        let project = self.project_by_slug(slug).await?;
        ensure_visible(&project, viewer)?;
        Ok(self.repos.projects.list_images(project.id).await?)
    }

    /// 单个项目，未审核项目只对创建者可见
    pub async fn get(&self, slug: &str, viewer: Option<&User>) -> Result<Project, AppError> {
        let project = self.project_by_slug(slug).await?;
        ensure_visible(&project, viewer)?;
        Ok(project)
    }

    pub async fn similar(&self, slug: &str, viewer: Option<&User>, limit: usize) -> Result<Vec<ProjectSummary>, AppError> {
        let project = self.get(slug, viewer).await?;
        similar_projects(&self.repos, &project, limit).await
    }

    /// 项目详情页
    pub async fn detail(&self, slug: &str, viewer: Option<&User>) -> Result<ProjectDetails, AppError> {
        debug!("🔍 查询项目详情 {}", slug);

        let project = self.get(slug, viewer).await?;
        let summary = self.repos.projects.get_project_summary(project.id).await?;
        let category = self.repos.taxonomy.get_category(project.category_id).await?;
        let tags = self.repos.projects.project_tags(project.id).await?;
        let images = self.repos.projects.list_images(project.id).await?;
        let rating = self.repos.engagement.rating_summary(project.id).await?;
        let my_rating = match viewer {
            Some(user) => self.repos.engagement.get_rating(project.id, user.id).await?,
            None => None,
        };
        let comments = self.repos.engagement.list_comments(project.id, DETAIL_COMMENT_LIMIT, 0).await?;
        let similar = similar_projects(&self.repos, &project, DEFAULT_SIMILAR_LIMIT as usize).await?;

        Ok(ProjectDetails { project, summary, category, tags, images, rating, my_rating, comments, similar })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{active_project, fixture, Fixture};
    use chrono::Duration;
    use database::models::{DonationCreate, TagCreate};
    use rust_decimal::Decimal;

    fn create_request(title: &str) -> CreateProjectRequest {
        let now = Utc::now();
        CreateProjectRequest {
            title: title.to_string(),
            details: "Clean water for every village.".to_string(),
            category_id: 0,
            tag_ids: vec![],
            total_target: Decimal::from(5000),
            start_date: now + Duration::days(1),
            end_date: now + Duration::days(31),
            as_draft: false,
        }
    }

    fn request_for(f: &Fixture, title: &str) -> CreateProjectRequest {
        CreateProjectRequest { category_id: f.category.id, ..create_request(title) }
    }

    async fn donate(f: &Fixture, project_id: i64, amount: i64) {
        f.repos
            .engagement
            .record_donation(DonationCreate {
                project_id,
                user_id: f.other.id,
                amount: Decimal::from(amount),
                message: String::new(),
                is_anonymous: false,
            })
            .await
            .unwrap();
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Solar Pumps for Fayoum!"), "solar-pumps-for-fayoum");
        assert_eq!(slugify("  --Hello,   World--  "), "hello-world");
        assert_eq!(slugify("مشروع"), "project");
        assert_eq!(slugify(&"a".repeat(300)).len(), SLUG_BASE_MAX_LEN);
    }

    #[test]
    fn test_generate_slug_suffix() {
        let slug = generate_slug("Clean Water");
        let (base, suffix) = slug.rsplit_once('-').unwrap();
        assert_eq!(base, "clean-water");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_create_auto_approve() {
        let f = fixture().await;
        let service = ProjectService::new(f.repos.clone(), ModerationPolicy::AutoApprove);

        let project = service.create(&f.creator, request_for(&f, "Clean Water")).await.unwrap();
        assert_eq!(project.status, ProjectStatus::Active);
        assert!(project.is_approved);
        assert!(project.approved_at.is_some());
        assert_eq!(project.approved_by, None);
        assert!(project.slug.starts_with("clean-water-"));
    }

    #[tokio::test]
    async fn test_create_with_moderation() {
        let f = fixture().await;
        let service = ProjectService::new(f.repos.clone(), ModerationPolicy::RequireModeration);

        let pending = service.create(&f.creator, request_for(&f, "Pending One")).await.unwrap();
        assert_eq!(pending.status, ProjectStatus::Pending);
        assert!(!pending.is_approved);

        let draft = service
            .create(&f.creator, CreateProjectRequest { as_draft: true, ..request_for(&f, "Draft One") })
            .await
            .unwrap();
        assert_eq!(draft.status, ProjectStatus::Draft);

        let submitted = service.submit(&f.creator, &draft.slug).await.unwrap();
        assert_eq!(submitted.status, ProjectStatus::Pending);

        assert!(matches!(service.approve(&f.creator, &draft.slug).await, Err(AppError::Forbidden(_))));
        let approved = service.approve(&f.staff, &draft.slug).await.unwrap();
        assert_eq!(approved.status, ProjectStatus::Active);
        assert_eq!(approved.approved_by, Some(f.staff.id));

        // 已上线的项目不能再次审核
        assert!(matches!(
            service.approve(&f.staff, &draft.slug).await,
            Err(AppError::RepositoryError(DatabaseError::InvalidState(_)))
        ));
    }

    #[tokio::test]
    async fn test_create_validation_happens_before_write() {
        let f = fixture().await;
        let service = ProjectService::new(f.repos.clone(), ModerationPolicy::AutoApprove);
        let now = Utc::now();

        let request = CreateProjectRequest {
            total_target: Decimal::from(999),
            start_date: now - Duration::hours(1),
            end_date: now + Duration::days(400),
            tag_ids: vec![404],
            ..create_request("Bad Project")
        };
        let Err(AppError::ValidationFailed(errors)) = service.create(&f.creator, request).await else {
            panic!("expected validation error");
        };
        let fields = errors.field_errors();
        for field in ["total_target", "start_date", "end_date", "category_id", "tag_ids"] {
            assert!(fields.contains_key(field), "missing error for {field}");
        }

        let mut query = database::models::ProjectQuery::public(10, 0);
        query.statuses.clear();
        query.approved_only = false;
        assert_eq!(f.repos.projects.find_projects(&query).await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_inactive_category_rejected() {
        let f = fixture().await;
        let service = ProjectService::new(f.repos.clone(), ModerationPolicy::AutoApprove);
        f.store.set_category_active(f.category.id, false).await.unwrap();

        let Err(AppError::ValidationFailed(errors)) = service.create(&f.creator, request_for(&f, "Hidden")).await else {
            panic!("expected validation error");
        };
        assert!(errors.field_errors().contains_key("category_id"));
    }

    #[tokio::test]
    async fn test_update_rules() {
        let f = fixture().await;
        let service = ProjectService::new(f.repos.clone(), ModerationPolicy::RequireModeration);
        let tag = f
            .repos
            .taxonomy
            .create_tag(TagCreate { name: "water".to_string(), color: "#6c757d".to_string() })
            .await
            .unwrap();
        let project = service.create(&f.creator, request_for(&f, "Editable")).await.unwrap();

        let update = UpdateProjectRequest {
            title: Some("Edited Title".to_string()),
            tag_ids: Some(vec![tag.id, tag.id]),
            ..Default::default()
        };
        assert!(matches!(service.update(&f.other, &project.slug, UpdateProjectRequest::default()).await, Err(AppError::Forbidden(_))));
        let updated = service.update(&f.creator, &project.slug, update).await.unwrap();
        assert_eq!(updated.title, "Edited Title");
        // slug 创建后不变
        assert_eq!(updated.slug, project.slug);
        let tags = f.repos.projects.project_tags(project.id).await.unwrap();
        assert_eq!(tags.len(), 1);

        // 只修改结束时间时与已保存的开始时间一起校验
        let update = UpdateProjectRequest { end_date: Some(project.start_date - Duration::hours(1)), ..Default::default() };
        assert!(matches!(service.update(&f.creator, &project.slug, update).await, Err(AppError::ValidationFailed(_))));

        service.approve(&f.staff, &project.slug).await.unwrap();
        let update = UpdateProjectRequest { title: Some("Too Late".to_string()), ..Default::default() };
        assert!(matches!(service.update(&f.creator, &project.slug, update).await, Err(AppError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_cancel_guard() {
        let f = fixture().await;
        let service = ProjectService::new(f.repos.clone(), ModerationPolicy::AutoApprove);
        let low = active_project(&f, "low-progress", 1000, vec![]).await;
        let high = active_project(&f, "high-progress", 1000, vec![]).await;
        donate(&f, low.id, 200).await;
        donate(&f, high.id, 600).await;

        assert!(matches!(service.cancel(&f.other, &low.slug).await, Err(AppError::Forbidden(_))));
        let cancelled = service.cancel(&f.creator, &low.slug).await.unwrap();
        assert_eq!(cancelled.status, ProjectStatus::Cancelled);

        assert!(matches!(
            service.cancel(&f.creator, &high.slug).await,
            Err(AppError::RepositoryError(DatabaseError::InvalidState(_)))
        ));
        let unchanged = f.repos.projects.get_project_by_id(high.id).await.unwrap();
        assert_eq!(unchanged.status, ProjectStatus::Active);
        assert_eq!(unchanged.current_amount, Decimal::from(600));
    }

    #[tokio::test]
    async fn test_mark_status_and_settle() {
        let f = fixture().await;
        let service = ProjectService::new(f.repos.clone(), ModerationPolicy::AutoApprove);
        let funded = active_project(&f, "reached-goal", 1000, vec![]).await;
        let manual = active_project(&f, "manual-close", 1000, vec![]).await;
        donate(&f, funded.id, 1000).await;

        assert!(matches!(
            service.mark_status(&f.staff, &manual.slug, ProjectStatus::Cancelled).await,
            Err(AppError::ValidationFailed(_))
        ));
        let completed = service.mark_status(&f.staff, &manual.slug, ProjectStatus::Completed).await.unwrap();
        assert_eq!(completed.status, ProjectStatus::Completed);

        let settled = service.settle(Utc::now()).await.unwrap();
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].id, funded.id);
        assert_eq!(settled[0].status, ProjectStatus::Funded);
        assert!(service.settle(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_detail_visibility() {
        let f = fixture().await;
        let service = ProjectService::new(f.repos.clone(), ModerationPolicy::RequireModeration);
        let pending = service.create(&f.creator, request_for(&f, "Secret")).await.unwrap();

        assert!(matches!(service.detail(&pending.slug, None).await, Err(AppError::NotFound(_))));
        assert!(matches!(service.detail(&pending.slug, Some(&f.other)).await, Err(AppError::NotFound(_))));
        let detail = service.detail(&pending.slug, Some(&f.creator)).await.unwrap();
        assert_eq!(detail.project.id, pending.id);
        assert_eq!(detail.category.id, f.category.id);
        assert_eq!(detail.rating.rating_count, 0);
    }

    #[tokio::test]
    async fn test_add_image_creator_only() {
        let f = fixture().await;
        let service = ProjectService::new(f.repos.clone(), ModerationPolicy::AutoApprove);
        let project = active_project(&f, "with-images", 1000, vec![]).await;
        let request = |is_primary| AddImageRequest {
            image_ref: "projects/cover.jpg".to_string(),
            caption: String::new(),
            is_primary,
            sort_order: 0,
        };

        assert!(matches!(service.add_image(&f.other, &project.slug, request(true)).await, Err(AppError::Forbidden(_))));
        service.add_image(&f.creator, &project.slug, request(true)).await.unwrap();
        service.add_image(&f.creator, &project.slug, request(true)).await.unwrap();

        let images = service.images(&project.slug, None).await.unwrap();
        assert_eq!(images.len(), 2);
        assert_eq!(images.iter().filter(|i| i.is_primary).count(), 1);
    }
}
