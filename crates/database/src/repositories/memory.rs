//! 内存仓库实现
//!
//! 所有仓库 trait 的内存版本，所有数据放在一把异步互斥锁后面，
//! 每个操作在持锁期间完成，因此与 PostgreSQL 实现一样满足：
//! - 捐款金额的原子累加
//! - 每个用户对每个项目只有一条评分
//! - 状态流转的前置条件检查与写入不可分割
//!
//! 仅在启用 `memory` feature 时编译，供上层服务和 HTTP 测试使用。

use crate::models::engagement::{
    Comment, CommentCreate, CommentPage, CommentWithAuthor, Donation, DonationCreate, DonationReceipt,
    DonationWithDonor, DonationWithProject, Rating, RatingSummary, RatingUpsert, RatingUpsertOutcome,
};
use crate::models::project::{
    Project, ProjectCreate, ProjectImage, ProjectImageCreate, ProjectQuery, ProjectSearchResult, ProjectSort,
    ProjectStatus, ProjectSummary, ProjectUpdate, SearchField, SettledProject, SimilarCandidate, StatusTransition,
};
use crate::models::report::{Report, ReportCreate};
use crate::models::taxonomy::{Category, CategoryCreate, CategoryWithCount, Tag, TagCreate, TagWithCount};
use crate::models::user::{User, UserCreate, UserProfileUpdate};
use crate::repositories::traits::{
    EngagementRepositoryTrait, ProjectRepositoryTrait, ReportRepositoryTrait, TaxonomyRepositoryTrait,
    UserRepositoryTrait,
};
use crate::{DatabaseError, DatabaseResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use shared_lib::CANCELLABLE_PROGRESS_PERCENT;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default)]
struct MemoryState {
    last_id: i64,
    users: BTreeMap<i64, User>,
    categories: BTreeMap<i64, Category>,
    tags: BTreeMap<i64, Tag>,
    projects: BTreeMap<i64, Project>,
    project_tags: BTreeMap<i64, BTreeSet<i64>>,
    images: BTreeMap<i64, ProjectImage>,
    comments: BTreeMap<i64, Comment>,
    ratings: BTreeMap<i64, Rating>,
    donations: BTreeMap<i64, Donation>,
    reports: BTreeMap<i64, Report>,
}

impl MemoryState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn project(&self, id: i64) -> DatabaseResult<&Project> {
        self.projects
            .get(&id)
            .ok_or_else(|| DatabaseError::not_found(format!("Project {id} not found")))
    }

    fn project_mut(&mut self, id: i64) -> DatabaseResult<&mut Project> {
        self.projects
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found(format!("Project {id} not found")))
    }

    fn tag_ids(&self, project_id: i64) -> Vec<i64> {
        self.project_tags
            .get(&project_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    fn rating_summary(&self, project_id: i64) -> RatingSummary {
        let values: Vec<f64> = self
            .ratings
            .values()
            .filter(|r| r.project_id == project_id)
            .map(|r| f64::from(r.rating))
            .collect();
        if values.is_empty() {
            return RatingSummary::default();
        }
        RatingSummary {
            average_rating: values.iter().sum::<f64>() / values.len() as f64,
            rating_count: values.len() as i64,
        }
    }

    fn summary(&self, project: &Project) -> ProjectSummary {
        let rating = self.rating_summary(project.id);
        ProjectSummary {
            id: project.id,
            title: project.title.clone(),
            slug: project.slug.clone(),
            category_id: project.category_id,
            category_name: self
                .categories
                .get(&project.category_id)
                .map(|c| c.name.clone())
                .unwrap_or_default(),
            creator_id: project.creator_id,
            creator_username: self
                .users
                .get(&project.creator_id)
                .map(|u| u.username.clone())
                .unwrap_or_default(),
            total_target: project.total_target,
            current_amount: project.current_amount,
            start_date: project.start_date,
            end_date: project.end_date,
            status: project.status,
            is_featured: project.is_featured,
            is_approved: project.is_approved,
            created_at: project.created_at,
            average_rating: rating.average_rating,
            rating_count: rating.rating_count,
        }
    }

    fn text_matches(&self, project: &Project, field: SearchField, needle: &str) -> bool {
        let contains = |haystack: &str| haystack.to_lowercase().contains(needle);
        match field {
            SearchField::Title => contains(&project.title),
            SearchField::Tag => self
                .tag_ids(project.id)
                .iter()
                .filter_map(|id| self.tags.get(id))
                .any(|t| contains(&t.name)),
            SearchField::Category => self.categories.get(&project.category_id).is_some_and(|c| contains(&c.name)),
            SearchField::Creator => self.users.get(&project.creator_id).is_some_and(|u| contains(&u.username)),
        }
    }

    fn matches(&self, project: &Project, query: &ProjectQuery) -> bool {
        if query.approved_only && !project.is_approved {
            return false;
        }
        if !query.statuses.is_empty() && !query.statuses.contains(&project.status) {
            return false;
        }
        if let Some(text) = &query.text {
            if !self.text_matches(project, text.field, &text.term.to_lowercase()) {
                return false;
            }
        }
        if query.category_id.is_some_and(|id| id != project.category_id) {
            return false;
        }
        if query.tag_id.is_some_and(|id| !self.tag_ids(project.id).contains(&id)) {
            return false;
        }
        if query.creator_id.is_some_and(|id| id != project.creator_id) {
            return false;
        }
        if query.min_target.is_some_and(|min| project.total_target < min) {
            return false;
        }
        if query.max_target.is_some_and(|max| project.total_target > max) {
            return false;
        }
        if query.featured_only && !project.is_featured {
            return false;
        }
        if query.rated_only && !self.ratings.values().any(|r| r.project_id == project.id) {
            return false;
        }
        if query.ends_after.is_some_and(|t| project.end_date < t) {
            return false;
        }
        if query.ends_before.is_some_and(|t| project.end_date > t) {
            return false;
        }
        true
    }

    fn recent_donations(&self, project_id: i64, since: Option<DateTime<Utc>>) -> usize {
        self.donations
            .values()
            .filter(|d| d.project_id == project_id && since.map_or(true, |t| d.created_at >= t))
            .count()
    }

    fn comment_with_author(&self, comment: &Comment, count_replies: bool) -> CommentWithAuthor {
        let reply_count = if count_replies {
            self.comments
                .values()
                .filter(|r| r.parent_id == Some(comment.id) && r.is_approved)
                .count() as i64
        } else {
            0
        };
        CommentWithAuthor {
            comment: comment.clone(),
            username: self.users.get(&comment.user_id).map(|u| u.username.clone()).unwrap_or_default(),
            reply_count,
        }
    }

    fn remove_comment(&mut self, id: i64) {
        self.comments.remove(&id);
        self.reports.retain(|_, r| r.target.comment_id() != Some(id));
        let replies: Vec<i64> = self
            .comments
            .values()
            .filter(|c| c.parent_id == Some(id))
            .map(|c| c.id)
            .collect();
        for reply in replies {
            self.remove_comment(reply);
        }
    }

    fn remove_project(&mut self, id: i64) {
        self.projects.remove(&id);
        self.project_tags.remove(&id);
        self.images.retain(|_, i| i.project_id != id);
        self.ratings.retain(|_, r| r.project_id != id);
        self.donations.retain(|_, d| d.project_id != id);
        self.reports.retain(|_, r| r.target.project_id() != Some(id));
        let comments: Vec<i64> = self
            .comments
            .values()
            .filter(|c| c.project_id == id)
            .map(|c| c.id)
            .collect();
        for comment in comments {
            self.remove_comment(comment);
        }
    }
}

/// 内存存储，克隆后共享同一份数据
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 启用或停用分类，对应后台管理的分类开关
    pub async fn set_category_active(&self, id: i64, is_active: bool) -> DatabaseResult<Category> {
        let mut state = self.state.lock().await;
        let category = state
            .categories
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found(format!("Category {id} not found")))?;
        category.is_active = is_active;
        category.updated_at = Utc::now();
        Ok(category.clone())
    }

    /// 修改捐款时间，用于构造统计窗口之外的历史捐款
    pub async fn set_donation_created_at(&self, id: i64, created_at: DateTime<Utc>) -> DatabaseResult<()> {
        let mut state = self.state.lock().await;
        let donation = state
            .donations
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found(format!("Donation {id} not found")))?;
        donation.created_at = created_at;
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserRepositoryTrait for MemoryStore {
    async fn create_user(&self, user: UserCreate) -> DatabaseResult<User> {
        let mut state = self.state.lock().await;
        if state
            .users
            .values()
            .any(|u| u.username == user.username || u.email.to_lowercase() == user.email.to_lowercase())
        {
            return Err(DatabaseError::conflict("Username or email is already registered."));
        }

        let id = state.next_id();
        let created = User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            profile_picture: user.profile_picture,
            birthdate: None,
            facebook_profile: None,
            country: None,
            is_staff: false,
            is_active: true,
            date_joined: Utc::now(),
        };
        state.users.insert(id, created.clone());
        debug!("✅ 用户创建成功: {}", id);
        Ok(created)
    }

    async fn get_user_by_id(&self, id: i64) -> DatabaseResult<User> {
        let state = self.state.lock().await;
        state
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found(format!("User {id} not found")))
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let state = self.state.lock().await;
        let email = email.to_lowercase();
        Ok(state.users.values().find(|u| u.email.to_lowercase() == email).cloned())
    }

    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn update_profile(&self, id: i64, update: UserProfileUpdate) -> DatabaseResult<User> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found(format!("User {id} not found")))?;

        if let Some(first_name) = update.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = update.last_name {
            user.last_name = last_name;
        }
        if let Some(phone) = update.phone {
            user.phone = phone;
        }
        if update.profile_picture.is_some() {
            user.profile_picture = update.profile_picture;
        }
        if update.birthdate.is_some() {
            user.birthdate = update.birthdate;
        }
        if update.facebook_profile.is_some() {
            user.facebook_profile = update.facebook_profile;
        }
        if update.country.is_some() {
            user.country = update.country;
        }
        Ok(user.clone())
    }

    async fn set_staff(&self, id: i64, is_staff: bool) -> DatabaseResult<User> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found(format!("User {id} not found")))?;
        user.is_staff = is_staff;
        Ok(user.clone())
    }

    async fn delete_user(&self, id: i64) -> DatabaseResult<User> {
        let mut state = self.state.lock().await;
        let user = state
            .users
            .remove(&id)
            .ok_or_else(|| DatabaseError::not_found(format!("User {id} not found")))?;

        let projects: Vec<i64> = state
            .projects
            .values()
            .filter(|p| p.creator_id == id)
            .map(|p| p.id)
            .collect();
        for project in projects {
            state.remove_project(project);
        }
        let comments: Vec<i64> = state
            .comments
            .values()
            .filter(|c| c.user_id == id)
            .map(|c| c.id)
            .collect();
        for comment in comments {
            state.remove_comment(comment);
        }
        state.ratings.retain(|_, r| r.user_id != id);
        for donation in state.donations.values_mut() {
            if donation.user_id == Some(id) {
                donation.user_id = None;
            }
        }
        state.reports.retain(|_, r| r.reporter_id != id);
        for project in state.projects.values_mut() {
            if project.approved_by == Some(id) {
                project.approved_by = None;
            }
        }
        for report in state.reports.values_mut() {
            if report.resolved_by == Some(id) {
                report.resolved_by = None;
            }
        }

        debug!("🗑️ 用户已删除: {}", id);
        Ok(user)
    }
}

#[async_trait::async_trait]
impl TaxonomyRepositoryTrait for MemoryStore {
    async fn create_category(&self, category: CategoryCreate) -> DatabaseResult<Category> {
        let mut state = self.state.lock().await;
        if state.categories.values().any(|c| c.name == category.name) {
            return Err(DatabaseError::conflict(format!("Category `{}` already exists.", category.name)));
        }
        let id = state.next_id();
        let now = Utc::now();
        let created = Category {
            id,
            name: category.name,
            description: category.description,
            icon: category.icon,
            color: category.color,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        state.categories.insert(id, created.clone());
        Ok(created)
    }

    async fn get_category(&self, id: i64) -> DatabaseResult<Category> {
        let state = self.state.lock().await;
        state
            .categories
            .get(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found(format!("Category {id} not found")))
    }

    async fn list_categories(&self, active_only: bool) -> DatabaseResult<Vec<CategoryWithCount>> {
        let state = self.state.lock().await;
        let mut categories: Vec<CategoryWithCount> = state
            .categories
            .values()
            .filter(|c| !active_only || c.is_active)
            .map(|c| CategoryWithCount {
                category: c.clone(),
                project_count: state
                    .projects
                    .values()
                    .filter(|p| p.category_id == c.id && p.is_approved)
                    .count() as i64,
            })
            .collect();
        categories.sort_by(|a, b| a.category.name.cmp(&b.category.name));
        Ok(categories)
    }

    async fn create_tag(&self, tag: TagCreate) -> DatabaseResult<Tag> {
        let mut state = self.state.lock().await;
        if state.tags.values().any(|t| t.name == tag.name) {
            return Err(DatabaseError::conflict(format!("Tag `{}` already exists.", tag.name)));
        }
        let id = state.next_id();
        let created = Tag { id, name: tag.name, color: tag.color, created_at: Utc::now() };
        state.tags.insert(id, created.clone());
        Ok(created)
    }

    async fn get_tag(&self, id: i64) -> DatabaseResult<Tag> {
        let state = self.state.lock().await;
        state
            .tags
            .get(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found(format!("Tag {id} not found")))
    }

    async fn find_tags(&self, ids: &[i64]) -> DatabaseResult<Vec<Tag>> {
        let state = self.state.lock().await;
        let mut tags: Vec<Tag> = state.tags.values().filter(|t| ids.contains(&t.id)).cloned().collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn list_popular_tags(&self, limit: i64) -> DatabaseResult<Vec<TagWithCount>> {
        let state = self.state.lock().await;
        let mut tags: Vec<TagWithCount> = state
            .tags
            .values()
            .map(|t| TagWithCount {
                tag: t.clone(),
                project_count: state
                    .projects
                    .values()
                    .filter(|p| p.is_approved && state.project_tags.get(&p.id).is_some_and(|ids| ids.contains(&t.id)))
                    .count() as i64,
            })
            .filter(|t| t.project_count > 0)
            .collect();
        tags.sort_by(|a, b| b.project_count.cmp(&a.project_count).then_with(|| a.tag.name.cmp(&b.tag.name)));
        tags.truncate(limit.max(0) as usize);
        Ok(tags)
    }
}

#[async_trait::async_trait]
impl ProjectRepositoryTrait for MemoryStore {
    async fn create_project(&self, project: ProjectCreate) -> DatabaseResult<Project> {
        let mut state = self.state.lock().await;
        if state.projects.values().any(|p| p.slug == project.slug) {
            return Err(DatabaseError::conflict(format!("Slug `{}` is already taken.", project.slug)));
        }

        let id = state.next_id();
        let now = Utc::now();
        let created = Project {
            id,
            title: project.title,
            slug: project.slug,
            details: project.details,
            category_id: project.category_id,
            creator_id: project.creator_id,
            total_target: project.total_target,
            current_amount: Decimal::ZERO,
            start_date: project.start_date,
            end_date: project.end_date,
            status: project.status,
            is_featured: false,
            is_approved: project.approval.is_some(),
            approved_at: project.approval.map(|a| a.approved_at),
            approved_by: project.approval.and_then(|a| a.approved_by),
            created_at: now,
            updated_at: now,
        };
        state.projects.insert(id, created.clone());
        state.project_tags.insert(id, project.tag_ids.into_iter().collect());
        Ok(created)
    }

    async fn get_project_by_id(&self, id: i64) -> DatabaseResult<Project> {
        let state = self.state.lock().await;
        state.project(id).cloned()
    }

    async fn get_project_by_slug(&self, slug: &str) -> DatabaseResult<Project> {
        let state = self.state.lock().await;
        state
            .projects
            .values()
            .find(|p| p.slug == slug)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found(format!("Project `{slug}` not found")))
    }

    async fn get_project_summary(&self, id: i64) -> DatabaseResult<ProjectSummary> {
        let state = self.state.lock().await;
        let project = state.project(id)?;
        Ok(state.summary(project))
    }

    async fn project_tags(&self, project_id: i64) -> DatabaseResult<Vec<Tag>> {
        let state = self.state.lock().await;
        let mut tags: Vec<Tag> = state
            .tag_ids(project_id)
            .iter()
            .filter_map(|id| state.tags.get(id).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }

    async fn find_projects(&self, query: &ProjectQuery) -> DatabaseResult<ProjectSearchResult> {
        let state = self.state.lock().await;

        let mut rows: Vec<(ProjectSummary, usize)> = state
            .projects
            .values()
            .filter(|p| state.matches(p, query))
            .map(|p| (state.summary(p), state.recent_donations(p.id, query.trending_since)))
            .collect();

        rows.sort_by(|(a, a_recent), (b, b_recent)| {
            let primary = match query.sort {
                ProjectSort::Recent => Ordering::Equal,
                ProjectSort::Rating => b
                    .average_rating
                    .partial_cmp(&a.average_rating)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| b.rating_count.cmp(&a.rating_count)),
                ProjectSort::Target => b.total_target.cmp(&a.total_target),
                ProjectSort::Deadline => a.end_date.cmp(&b.end_date),
                ProjectSort::Funding => b.current_amount.cmp(&a.current_amount),
                ProjectSort::Trending => b_recent
                    .cmp(a_recent)
                    .then_with(|| b.current_amount.cmp(&a.current_amount)),
            };
            primary
                .then_with(|| b.created_at.cmp(&a.created_at))
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = rows.len() as u32;
        let projects = rows
            .into_iter()
            .map(|(summary, _)| summary)
            .skip(query.offset.max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect();
        Ok(ProjectSearchResult { projects, total })
    }

    async fn update_project(&self, id: i64, update: ProjectUpdate, editable: &[ProjectStatus]) -> DatabaseResult<Project> {
        let mut state = self.state.lock().await;
        let project = state.project_mut(id)?;
        if !editable.contains(&project.status) {
            return Err(DatabaseError::invalid_state("Project can no longer be edited."));
        }

        if let Some(title) = update.title {
            project.title = title;
        }
        if let Some(details) = update.details {
            project.details = details;
        }
        if let Some(category_id) = update.category_id {
            project.category_id = category_id;
        }
        if let Some(total_target) = update.total_target {
            project.total_target = total_target;
        }
        if let Some(start_date) = update.start_date {
            project.start_date = start_date;
        }
        if let Some(end_date) = update.end_date {
            project.end_date = end_date;
        }
        project.updated_at = Utc::now();
        let updated = project.clone();

        if let Some(tag_ids) = update.tag_ids {
            state.project_tags.insert(id, tag_ids.into_iter().collect());
        }
        Ok(updated)
    }

    async fn transition_status(&self, id: i64, transition: StatusTransition) -> DatabaseResult<Project> {
        let mut state = self.state.lock().await;
        let project = state.project_mut(id)?;
        if !transition.from.contains(&project.status) {
            return Err(DatabaseError::invalid_state(format!(
                "Project cannot move to `{}` from its current status.",
                transition.to
            )));
        }

        project.status = transition.to;
        if let Some(approval) = transition.approval {
            project.is_approved = true;
            project.approved_by = approval.approved_by;
            project.approved_at = Some(approval.approved_at);
        }
        project.updated_at = Utc::now();
        Ok(project.clone())
    }

    async fn cancel_project(&self, id: i64) -> DatabaseResult<Project> {
        let mut state = self.state.lock().await;
        let project = state.project_mut(id)?;
        if !project.is_cancellable() {
            return Err(DatabaseError::invalid_state(format!(
                "Only active projects below {CANCELLABLE_PROGRESS_PERCENT}% funding can be cancelled."
            )));
        }
        project.status = ProjectStatus::Cancelled;
        project.updated_at = Utc::now();
        Ok(project.clone())
    }

    async fn set_featured(&self, id: i64, featured: bool) -> DatabaseResult<Project> {
        let mut state = self.state.lock().await;
        let project = state.project_mut(id)?;
        project.is_featured = featured;
        project.updated_at = Utc::now();
        Ok(project.clone())
    }

    async fn similar_candidates(&self, project: &Project, tag_ids: &[i64]) -> DatabaseResult<Vec<SimilarCandidate>> {
        let state = self.state.lock().await;
        let candidates = state
            .projects
            .values()
            .filter(|p| p.id != project.id && p.status == ProjectStatus::Active && p.is_approved)
            .filter_map(|p| {
                let candidate_tags = state.tag_ids(p.id);
                let related =
                    p.category_id == project.category_id || candidate_tags.iter().any(|id| tag_ids.contains(id));
                related.then(|| SimilarCandidate { summary: state.summary(p), tag_ids: candidate_tags })
            })
            .collect();
        Ok(candidates)
    }

    async fn add_image(&self, image: ProjectImageCreate) -> DatabaseResult<ProjectImage> {
        let mut state = self.state.lock().await;
        state.project(image.project_id)?;

        if image.is_primary {
            for existing in state.images.values_mut() {
                if existing.project_id == image.project_id {
                    existing.is_primary = false;
                }
            }
        }

        let id = state.next_id();
        let created = ProjectImage {
            id,
            project_id: image.project_id,
            image_ref: image.image_ref,
            caption: image.caption,
            is_primary: image.is_primary,
            sort_order: image.sort_order,
            created_at: Utc::now(),
        };
        state.images.insert(id, created.clone());
        Ok(created)
    }

    async fn list_images(&self, project_id: i64) -> DatabaseResult<Vec<ProjectImage>> {
        let state = self.state.lock().await;
        let mut images: Vec<ProjectImage> = state
            .images
            .values()
            .filter(|i| i.project_id == project_id)
            .cloned()
            .collect();
        images.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| a.created_at.cmp(&b.created_at))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(images)
    }

    async fn settle_campaigns(&self, now: DateTime<Utc>) -> DatabaseResult<Vec<SettledProject>> {
        let mut state = self.state.lock().await;
        let mut funded = Vec::new();
        let mut completed = Vec::new();

        for project in state.projects.values_mut() {
            let Some(next) = project.settlement_status(now) else {
                continue;
            };
            project.status = next;
            project.updated_at = Utc::now();
            let settled = SettledProject { id: project.id, slug: project.slug.clone(), status: next };
            if next == ProjectStatus::Funded {
                funded.push(settled);
            } else {
                completed.push(settled);
            }
        }

        funded.extend(completed);
        Ok(funded)
    }
}

#[async_trait::async_trait]
impl EngagementRepositoryTrait for MemoryStore {
    async fn add_comment(&self, comment: CommentCreate) -> DatabaseResult<Comment> {
        let mut state = self.state.lock().await;
        state.project(comment.project_id)?;

        let id = state.next_id();
        let now = Utc::now();
        let created = Comment {
            id,
            project_id: comment.project_id,
            user_id: comment.user_id,
            parent_id: comment.parent_id,
            content: comment.content,
            is_approved: true,
            created_at: now,
            updated_at: now,
        };
        state.comments.insert(id, created.clone());
        Ok(created)
    }

    async fn get_comment(&self, id: i64) -> DatabaseResult<Comment> {
        let state = self.state.lock().await;
        state
            .comments
            .get(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found(format!("Comment {id} not found")))
    }

    async fn list_comments(&self, project_id: i64, limit: i64, offset: i64) -> DatabaseResult<CommentPage> {
        let state = self.state.lock().await;
        let mut comments: Vec<&Comment> = state
            .comments
            .values()
            .filter(|c| c.project_id == project_id && c.parent_id.is_none() && c.is_approved)
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let total = comments.len() as u32;
        let comments = comments
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|c| state.comment_with_author(c, true))
            .collect();
        Ok(CommentPage { comments, total })
    }

    async fn list_replies(&self, parent_id: i64) -> DatabaseResult<Vec<CommentWithAuthor>> {
        let state = self.state.lock().await;
        let mut replies: Vec<&Comment> = state
            .comments
            .values()
            .filter(|c| c.parent_id == Some(parent_id) && c.is_approved)
            .collect();
        replies.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(replies.into_iter().map(|c| state.comment_with_author(c, false)).collect())
    }

    async fn upsert_rating(&self, rating: RatingUpsert) -> DatabaseResult<RatingUpsertOutcome> {
        let mut state = self.state.lock().await;
        state.project(rating.project_id)?;

        let now = Utc::now();
        if let Some(existing) = state
            .ratings
            .values_mut()
            .find(|r| r.project_id == rating.project_id && r.user_id == rating.user_id)
        {
            existing.rating = rating.rating;
            existing.review = rating.review;
            existing.updated_at = now;
            return Ok(RatingUpsertOutcome { rating: existing.clone(), created: false });
        }

        let id = state.next_id();
        let created = Rating {
            id,
            project_id: rating.project_id,
            user_id: rating.user_id,
            rating: rating.rating,
            review: rating.review,
            created_at: now,
            updated_at: now,
        };
        state.ratings.insert(id, created.clone());
        Ok(RatingUpsertOutcome { rating: created, created: true })
    }

    async fn get_rating(&self, project_id: i64, user_id: i64) -> DatabaseResult<Option<Rating>> {
        let state = self.state.lock().await;
        Ok(state
            .ratings
            .values()
            .find(|r| r.project_id == project_id && r.user_id == user_id)
            .cloned())
    }

    async fn rating_summary(&self, project_id: i64) -> DatabaseResult<RatingSummary> {
        let state = self.state.lock().await;
        Ok(state.rating_summary(project_id))
    }

    async fn record_donation(&self, donation: DonationCreate) -> DatabaseResult<DonationReceipt> {
        let mut state = self.state.lock().await;
        let project = state.project_mut(donation.project_id)?;
        if project.status != ProjectStatus::Active || !project.is_approved {
            return Err(DatabaseError::invalid_state(
                "Donations are only accepted for active, approved projects.",
            ));
        }
        project.current_amount += donation.amount;
        project.updated_at = Utc::now();
        let project_current_amount = project.current_amount;

        let id = state.next_id();
        let created = Donation {
            id,
            project_id: donation.project_id,
            user_id: Some(donation.user_id),
            amount: donation.amount,
            message: donation.message,
            is_anonymous: donation.is_anonymous,
            created_at: Utc::now(),
        };
        state.donations.insert(id, created.clone());
        Ok(DonationReceipt { donation: created, project_current_amount })
    }

    async fn list_project_donations(&self, project_id: i64, limit: i64) -> DatabaseResult<Vec<DonationWithDonor>> {
        let state = self.state.lock().await;
        let mut donations: Vec<&Donation> = state.donations.values().filter(|d| d.project_id == project_id).collect();
        donations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(donations
            .into_iter()
            .take(limit.max(0) as usize)
            .map(|d| DonationWithDonor {
                donation: d.clone(),
                username: d.user_id.and_then(|id| state.users.get(&id)).map(|u| u.username.clone()),
            })
            .collect())
    }

    async fn list_user_donations(&self, user_id: i64) -> DatabaseResult<Vec<DonationWithProject>> {
        let state = self.state.lock().await;
        let mut donations: Vec<&Donation> = state.donations.values().filter(|d| d.user_id == Some(user_id)).collect();
        donations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(donations
            .into_iter()
            .filter_map(|d| {
                state.projects.get(&d.project_id).map(|p| DonationWithProject {
                    donation: d.clone(),
                    project_title: p.title.clone(),
                    project_slug: p.slug.clone(),
                })
            })
            .collect())
    }

    async fn donation_total(&self, project_id: i64) -> DatabaseResult<Decimal> {
        let state = self.state.lock().await;
        Ok(state
            .donations
            .values()
            .filter(|d| d.project_id == project_id)
            .map(|d| d.amount)
            .sum())
    }
}

#[async_trait::async_trait]
impl ReportRepositoryTrait for MemoryStore {
    async fn create_report(&self, report: ReportCreate) -> DatabaseResult<Report> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        let created = Report {
            id,
            reporter_id: report.reporter_id,
            target: report.target,
            reason: report.reason,
            description: report.description,
            is_resolved: false,
            resolved_by: None,
            resolved_at: None,
            created_at: Utc::now(),
        };
        state.reports.insert(id, created.clone());
        Ok(created)
    }

    async fn get_report(&self, id: i64) -> DatabaseResult<Report> {
        let state = self.state.lock().await;
        state
            .reports
            .get(&id)
            .cloned()
            .ok_or_else(|| DatabaseError::not_found(format!("Report {id} not found")))
    }

    async fn list_reports(&self, resolved: Option<bool>, limit: i64, offset: i64) -> DatabaseResult<Vec<Report>> {
        let state = self.state.lock().await;
        let mut reports: Vec<&Report> = state
            .reports
            .values()
            .filter(|r| resolved.map_or(true, |flag| r.is_resolved == flag))
            .collect();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        Ok(reports
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn resolve_report(&self, id: i64, resolver_id: i64) -> DatabaseResult<Report> {
        let mut state = self.state.lock().await;
        let report = state
            .reports
            .get_mut(&id)
            .ok_or_else(|| DatabaseError::not_found(format!("Report {id} not found")))?;
        if report.is_resolved {
            return Err(DatabaseError::invalid_state(format!("Report {id} is already resolved.")));
        }
        report.is_resolved = true;
        report.resolved_by = Some(resolver_id);
        report.resolved_at = Some(Utc::now());
        Ok(report.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::project::{Approval, TextFilter};
    use crate::models::report::{ReportReason, ReportTarget};
    use chrono::Duration;

    struct Fixture {
        store: MemoryStore,
        user: User,
        category: Category,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let user = store
            .create_user(UserCreate {
                username: "mona".to_string(),
                email: "mona@example.com".to_string(),
                password_hash: "hash".to_string(),
                first_name: "Mona".to_string(),
                last_name: "Adel".to_string(),
                phone: "01012345678".to_string(),
                profile_picture: None,
            })
            .await
            .unwrap();
        let category = store
            .create_category(CategoryCreate {
                name: "Water".to_string(),
                description: String::new(),
                icon: String::new(),
                color: "#667eea".to_string(),
            })
            .await
            .unwrap();
        Fixture { store, user, category }
    }

    async fn active_project(f: &Fixture, slug: &str, target: i64, tag_ids: Vec<i64>) -> Project {
        let now = Utc::now();
        f.store
            .create_project(ProjectCreate {
                title: slug.replace('-', " "),
                slug: slug.to_string(),
                details: "details".to_string(),
                category_id: f.category.id,
                creator_id: f.user.id,
                tag_ids,
                total_target: Decimal::from(target),
                start_date: now + Duration::days(1),
                end_date: now + Duration::days(30),
                status: ProjectStatus::Active,
                approval: Some(Approval { approved_by: None, approved_at: now }),
            })
            .await
            .unwrap()
    }

    async fn donate(f: &Fixture, project_id: i64, amount: i64) -> DatabaseResult<DonationReceipt> {
        f.store
            .record_donation(DonationCreate {
                project_id,
                user_id: f.user.id,
                amount: Decimal::from(amount),
                message: String::new(),
                is_anonymous: false,
            })
            .await
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let f = fixture().await;
        let result = f
            .store
            .create_user(UserCreate {
                username: "mona".to_string(),
                email: "other@example.com".to_string(),
                password_hash: "hash".to_string(),
                first_name: "M".to_string(),
                last_name: "A".to_string(),
                phone: "01012345678".to_string(),
                profile_picture: None,
            })
            .await;
        assert!(matches!(result, Err(DatabaseError::Conflict(_))));
        assert!(f.store.find_by_email("MONA@example.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_email_unique_ignoring_case() {
        let f = fixture().await;
        let result = f
            .store
            .create_user(UserCreate {
                username: "mona2".to_string(),
                email: "Mona@Example.com".to_string(),
                password_hash: "hash".to_string(),
                first_name: "M".to_string(),
                last_name: "A".to_string(),
                phone: "01012345678".to_string(),
                profile_picture: None,
            })
            .await;
        assert!(matches!(result, Err(DatabaseError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_concurrent_donations_sum_exactly() {
        let f = fixture().await;
        let project = active_project(&f, "clean-water", 1000, vec![]).await;
        let project_id = project.id;

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = f.store.clone();
                let user_id = f.user.id;
                tokio::spawn(async move {
                    store
                        .record_donation(DonationCreate {
                            project_id,
                            user_id,
                            amount: Decimal::new(1050, 2),
                            message: String::new(),
                            is_anonymous: false,
                        })
                        .await
                })
            })
            .collect();
        for result in futures::future::join_all(handles).await {
            result.unwrap().unwrap();
        }

        let stored = f.store.get_project_by_id(project.id).await.unwrap();
        assert_eq!(stored.current_amount, Decimal::new(10500, 2));
        assert_eq!(f.store.donation_total(project.id).await.unwrap(), stored.current_amount);
    }

    #[tokio::test]
    async fn test_donation_requires_active_project() {
        let f = fixture().await;
        let project = active_project(&f, "clean-water", 1000, vec![]).await;
        f.store.cancel_project(project.id).await.unwrap();

        assert!(matches!(donate(&f, project.id, 50).await, Err(DatabaseError::InvalidState(_))));
        assert!(matches!(donate(&f, 9999, 50).await, Err(DatabaseError::NotFound(_))));
        assert_eq!(f.store.donation_total(project.id).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_cancel_respects_threshold() {
        let f = fixture().await;
        let project = active_project(&f, "clean-water", 1000, vec![]).await;
        donate(&f, project.id, 250).await.unwrap();

        let result = f.store.cancel_project(project.id).await;
        assert!(matches!(result, Err(DatabaseError::InvalidState(_))));
        let stored = f.store.get_project_by_id(project.id).await.unwrap();
        assert_eq!(stored.status, ProjectStatus::Active);
    }

    #[tokio::test]
    async fn test_upsert_rating_keeps_single_row() {
        let f = fixture().await;
        let project = active_project(&f, "clean-water", 1000, vec![]).await;

        let first = f
            .store
            .upsert_rating(RatingUpsert { project_id: project.id, user_id: f.user.id, rating: 3, review: String::new() })
            .await
            .unwrap();
        let second = f
            .store
            .upsert_rating(RatingUpsert {
                project_id: project.id,
                user_id: f.user.id,
                rating: 5,
                review: "great".to_string(),
            })
            .await
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.rating.id, second.rating.id);
        let summary = f.store.rating_summary(project.id).await.unwrap();
        assert_eq!(summary, RatingSummary { average_rating: 5.0, rating_count: 1 });
    }

    #[tokio::test]
    async fn test_primary_image_is_unique() {
        let f = fixture().await;
        let project = active_project(&f, "clean-water", 1000, vec![]).await;

        for (i, image_ref) in ["a.jpg", "b.jpg", "c.jpg"].iter().enumerate() {
            f.store
                .add_image(ProjectImageCreate {
                    project_id: project.id,
                    image_ref: image_ref.to_string(),
                    caption: String::new(),
                    is_primary: i != 1,
                    sort_order: i as i32,
                })
                .await
                .unwrap();
        }

        let images = f.store.list_images(project.id).await.unwrap();
        let primaries: Vec<_> = images.iter().filter(|i| i.is_primary).collect();
        assert_eq!(primaries.len(), 1);
        assert_eq!(primaries[0].image_ref, "c.jpg");
    }

    #[tokio::test]
    async fn test_find_projects_filters_and_sorts() {
        let f = fixture().await;
        let solar = f
            .store
            .create_tag(TagCreate { name: "solar".to_string(), color: "#000000".to_string() })
            .await
            .unwrap();
        let a = active_project(&f, "solar-pumps", 5000, vec![solar.id]).await;
        let b = active_project(&f, "school-books", 2000, vec![]).await;
        let c = active_project(&f, "water-wells", 8000, vec![]).await;
        donate(&f, b.id, 500).await.unwrap();

        let mut query = ProjectQuery::public(12, 0);
        query.sort = ProjectSort::Target;
        let result = f.store.find_projects(&query).await.unwrap();
        assert_eq!(result.total, 3);
        let ids: Vec<i64> = result.projects.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![c.id, a.id, b.id]);

        query.sort = ProjectSort::Funding;
        query.min_target = Some(Decimal::from(1500));
        query.max_target = Some(Decimal::from(6000));
        let result = f.store.find_projects(&query).await.unwrap();
        let ids: Vec<i64> = result.projects.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);

        let mut query = ProjectQuery::public(12, 0);
        query.text = Some(TextFilter { term: "SOL".to_string(), field: SearchField::Tag });
        let result = f.store.find_projects(&query).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.projects[0].id, a.id);

        // 分页不影响总数
        let mut query = ProjectQuery::public(1, 1);
        query.sort = ProjectSort::Recent;
        let result = f.store.find_projects(&query).await.unwrap();
        assert_eq!(result.total, 3);
        assert_eq!(result.projects.len(), 1);
        assert_eq!(result.projects[0].id, b.id);
    }

    #[tokio::test]
    async fn test_settle_campaigns() {
        let f = fixture().await;
        let funded = active_project(&f, "funded", 1000, vec![]).await;
        let running = active_project(&f, "running", 1000, vec![]).await;
        donate(&f, funded.id, 1000).await.unwrap();

        let later = Utc::now() + Duration::days(60);
        let settled = f.store.settle_campaigns(later).await.unwrap();
        assert_eq!(settled.len(), 2);
        assert_eq!(settled[0].id, funded.id);
        assert_eq!(settled[0].status, ProjectStatus::Funded);
        assert_eq!(settled[1].id, running.id);
        assert_eq!(settled[1].status, ProjectStatus::Completed);

        // 已结算的项目不会再次变化
        assert!(f.store.settle_campaigns(later).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_resolve_report_twice() {
        let f = fixture().await;
        let project = active_project(&f, "clean-water", 1000, vec![]).await;
        let report = f
            .store
            .create_report(ReportCreate {
                reporter_id: f.user.id,
                target: ReportTarget::Project(project.id),
                reason: ReportReason::Spam,
                description: String::new(),
            })
            .await
            .unwrap();

        let resolved = f.store.resolve_report(report.id, f.user.id).await.unwrap();
        assert!(resolved.is_resolved);
        assert!(matches!(
            f.store.resolve_report(report.id, f.user.id).await,
            Err(DatabaseError::InvalidState(_))
        ));
        assert_eq!(f.store.list_reports(Some(false), 10, 0).await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_delete_user_cascades() {
        let f = fixture().await;
        let project = active_project(&f, "clean-water", 1000, vec![]).await;
        donate(&f, project.id, 50).await.unwrap();

        f.store.delete_user(f.user.id).await.unwrap();
        assert!(matches!(
            f.store.get_project_by_id(project.id).await,
            Err(DatabaseError::NotFound(_))
        ));
        assert!(f.store.list_user_donations(f.user.id).await.unwrap().is_empty());
    }
}
