//! 互动服务：捐款、评分、评论与回复

use crate::models::engagement::{CommentRequest, DonateRequest, RateRequest};
use crate::models::err::AppError;
use crate::services::ensure_visible;
use crate::validation::{check_trimmed_length, into_result};
use database::models::{
    Comment, CommentCreate, CommentPage, CommentWithAuthor, DonationCreate, DonationReceipt, DonationWithDonor,
    DonationWithProject, Project, RatingSummary, RatingUpsert, RatingUpsertOutcome, User,
};
use database::Repositories;
use tracing::{debug, info};
use validator::{Validate, ValidationErrors};

const COMMENT_MIN_CHARS: usize = 3;
const COMMENT_MAX_CHARS: usize = 1000;
const REPLY_MIN_CHARS: usize = 2;
const REPLY_MAX_CHARS: usize = 500;

#[derive(Clone)]
pub struct EngagementService {
    repos: Repositories,
}

impl EngagementService {
    pub fn new(repos: Repositories) -> Self {
        Self { repos }
    }

    /// 查询项目并检查可见性
    async fn visible_project(&self, slug: &str, viewer: Option<&User>) -> Result<Project, AppError> {
        let project = self.repos.projects.get_project_by_slug(slug).await?;
        ensure_visible(&project, viewer)?;
        Ok(project)
    }

    /// 评分和评论只允许针对已审核项目
    async fn approved_project(&self, slug: &str, user: &User) -> Result<Project, AppError> {
        let project = self.visible_project(slug, Some(user)).await?;
        if !project.is_approved {
            return Err(AppError::invalid_state("This project is awaiting approval."));
        }
        Ok(project)
    }

    /// 捐款
    ///
    /// 金额累加与捐款记录写入由仓库在同一事务中完成，
    /// 项目不是 active 或未审核时返回冲突，不写入任何数据
    pub async fn donate(&self, user: &User, slug: &str, request: DonateRequest) -> Result<DonationReceipt, AppError> {
        debug!("💰 用户 {} 向项目 {} 捐款 {}", user.id, slug, request.amount);
        request.validate()?;

        let project = self.visible_project(slug, Some(user)).await?;
        let receipt = self
            .repos
            .engagement
            .record_donation(DonationCreate {
                project_id: project.id,
                user_id: user.id,
                amount: request.amount,
                message: request.message.trim().to_string(),
                is_anonymous: request.is_anonymous,
            })
            .await?;

        info!(
            "✅ 捐款成功: 项目 {} 金额 {} 已筹 {}",
            project.slug, receipt.donation.amount, receipt.project_current_amount
        );
        Ok(receipt)
    }

    /// 评分，同一用户重复评分会原地更新
    pub async fn rate(
        &self,
        user: &User,
        slug: &str,
        request: RateRequest,
    ) -> Result<(RatingUpsertOutcome, RatingSummary), AppError> {
        debug!("⭐ 用户 {} 为项目 {} 评分 {}", user.id, slug, request.rating);
        request.validate()?;

        let project = self.approved_project(slug, user).await?;
        let outcome = self
            .repos
            .engagement
            .upsert_rating(RatingUpsert {
                project_id: project.id,
                user_id: user.id,
                rating: request.rating,
                review: request.review.trim().to_string(),
            })
            .await?;
        let summary = self.repos.engagement.rating_summary(project.id).await?;
        Ok((outcome, summary))
    }

    /// 发表顶层评论
    pub async fn comment(&self, user: &User, slug: &str, request: CommentRequest) -> Result<Comment, AppError> {
        let mut errors = ValidationErrors::new();
        let content = check_trimmed_length(&mut errors, "content", &request.content, COMMENT_MIN_CHARS, COMMENT_MAX_CHARS);
        into_result(errors)?;

        let project = self.approved_project(slug, user).await?;
        let comment = self
            .repos
            .engagement
            .add_comment(CommentCreate { project_id: project.id, user_id: user.id, parent_id: None, content })
            .await?;
        debug!("💬 项目 {} 新评论 {}", project.slug, comment.id);
        Ok(comment)
    }

    /// 回复评论
    ///
    /// 只能回复已审核的顶层评论，回复继承父评论所属的项目
    pub async fn reply(&self, user: &User, parent_id: i64, request: CommentRequest) -> Result<Comment, AppError> {
        let mut errors = ValidationErrors::new();
        let content = check_trimmed_length(&mut errors, "content", &request.content, REPLY_MIN_CHARS, REPLY_MAX_CHARS);
        into_result(errors)?;

        let parent = self.approved_comment(parent_id).await?;
        if parent.is_reply() {
            return Err(AppError::invalid_state("Replies can only be added to top-level comments."));
        }

        let comment = self
            .repos
            .engagement
            .add_comment(CommentCreate {
                project_id: parent.project_id,
                user_id: user.id,
                parent_id: Some(parent.id),
                content,
            })
            .await?;
        debug!("💬 评论 {} 新回复 {}", parent.id, comment.id);
        Ok(comment)
    }

    /// 未审核的评论视为不存在
    async fn approved_comment(&self, id: i64) -> Result<Comment, AppError> {
        let comment = self.repos.engagement.get_comment(id).await?;
        if !comment.is_approved {
            return Err(AppError::not_found(format!("Comment {id} not found")));
        }
        Ok(comment)
    }

    pub async fn list_comments(
        &self,
        slug: &str,
        viewer: Option<&User>,
        limit: i64,
        offset: i64,
    ) -> Result<CommentPage, AppError> {
        let project = self.visible_project(slug, viewer).await?;
        Ok(self.repos.engagement.list_comments(project.id, limit, offset).await?)
    }

    pub async fn list_replies(&self, comment_id: i64) -> Result<Vec<CommentWithAuthor>, AppError> {
        let parent = self.approved_comment(comment_id).await?;
        Ok(self.repos.engagement.list_replies(parent.id).await?)
    }

    pub async fn project_donations(
        &self,
        slug: &str,
        viewer: Option<&User>,
        limit: i64,
    ) -> Result<Vec<DonationWithDonor>, AppError> {
        let project = self.visible_project(slug, viewer).await?;
        Ok(self.repos.engagement.list_project_donations(project.id, limit).await?)
    }

    pub async fn user_donations(&self, user: &User) -> Result<Vec<DonationWithProject>, AppError> {
        Ok(self.repos.engagement.list_user_donations(user.id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{active_project, fixture};
    use database::models::ProjectStatus;
    use database::DatabaseError;
    use rust_decimal::Decimal;
    use std::sync::Arc;

    fn donate_request(amount: Decimal) -> DonateRequest {
        DonateRequest { amount, message: String::new(), is_anonymous: false }
    }

    fn text(content: &str) -> CommentRequest {
        CommentRequest { content: content.to_string() }
    }

    #[tokio::test]
    async fn test_donate_validation() {
        let f = fixture().await;
        let service = EngagementService::new(f.repos.clone());
        let project = active_project(&f, "water-wells", 1000, vec![]).await;

        assert!(matches!(
            service.donate(&f.other, &project.slug, donate_request(Decimal::new(999, 2))).await,
            Err(AppError::ValidationFailed(_))
        ));
        assert!(matches!(
            service.donate(&f.other, &project.slug, donate_request(Decimal::new(10001, 3))).await,
            Err(AppError::ValidationFailed(_))
        ));

        let receipt = service.donate(&f.other, &project.slug, donate_request(Decimal::new(1050, 2))).await.unwrap();
        assert_eq!(receipt.project_current_amount, Decimal::new(1050, 2));
    }

    #[tokio::test]
    async fn test_concurrent_donations() {
        let f = fixture().await;
        let service = Arc::new(EngagementService::new(f.repos.clone()));
        let project = active_project(&f, "concurrent", 1000, vec![]).await;

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let service = Arc::clone(&service);
                let user = f.other.clone();
                let slug = project.slug.clone();
                tokio::spawn(async move { service.donate(&user, &slug, donate_request(Decimal::new(1250, 2))).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = f.repos.projects.get_project_by_id(project.id).await.unwrap();
        assert_eq!(stored.current_amount, Decimal::from(250));
        assert_eq!(f.repos.engagement.donation_total(project.id).await.unwrap(), Decimal::from(250));
        // 捐款不会触发自动结算
        assert_eq!(stored.status, ProjectStatus::Active);
    }

    #[tokio::test]
    async fn test_donation_to_closed_project_rejected() {
        let f = fixture().await;
        let service = EngagementService::new(f.repos.clone());
        let project = active_project(&f, "closing", 1000, vec![]).await;
        f.repos.projects.cancel_project(project.id).await.unwrap();

        assert!(matches!(
            service.donate(&f.other, &project.slug, donate_request(Decimal::from(50))).await,
            Err(AppError::RepositoryError(DatabaseError::InvalidState(_)))
        ));
        assert_eq!(f.repos.engagement.donation_total(project.id).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_rating_upsert() {
        let f = fixture().await;
        let service = EngagementService::new(f.repos.clone());
        let project = active_project(&f, "rated", 1000, vec![]).await;

        let (first, summary) = service
            .rate(&f.other, &project.slug, RateRequest { rating: 4, review: String::new() })
            .await
            .unwrap();
        assert!(first.created);
        assert_eq!(summary.rating_count, 1);

        let (second, summary) = service
            .rate(&f.other, &project.slug, RateRequest { rating: 2, review: "changed".to_string() })
            .await
            .unwrap();
        assert!(!second.created);
        assert_eq!(second.rating.id, first.rating.id);
        assert_eq!(summary.rating_count, 1);
        assert_eq!(summary.average_rating, 2.0);

        assert!(matches!(
            service.rate(&f.other, &project.slug, RateRequest { rating: 6, review: String::new() }).await,
            Err(AppError::ValidationFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_comment_and_reply_rules() {
        let f = fixture().await;
        let service = EngagementService::new(f.repos.clone());
        let project = active_project(&f, "discussed", 1000, vec![]).await;

        // 去除空白后不足3个字符
        assert!(matches!(service.comment(&f.other, &project.slug, text("  hi  ")).await, Err(AppError::ValidationFailed(_))));
        let comment = service.comment(&f.other, &project.slug, text("  Great project!  ")).await.unwrap();
        assert_eq!(comment.content, "Great project!");

        assert!(matches!(service.reply(&f.creator, comment.id, text(" a ")).await, Err(AppError::ValidationFailed(_))));
        let reply = service.reply(&f.creator, comment.id, text("Thanks")).await.unwrap();
        assert_eq!(reply.project_id, project.id);
        assert_eq!(reply.parent_id, Some(comment.id));

        // 只允许一层回复
        assert!(matches!(service.reply(&f.other, reply.id, text("Nested")).await, Err(AppError::InvalidState(_))));

        let page = service.list_comments(&project.slug, None, 10, 0).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.comments[0].reply_count, 1);

        let replies = service.list_replies(comment.id).await.unwrap();
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].username, "creator");
    }

    #[tokio::test]
    async fn test_content_length_minimums() {
        let f = fixture().await;
        let service = EngagementService::new(f.repos.clone());
        let project = active_project(&f, "boundaries", 1000, vec![]).await;

        let comment = service.comment(&f.other, &project.slug, text(" wow ")).await.unwrap();
        assert_eq!(comment.content, "wow");

        let reply = service.reply(&f.creator, comment.id, text("ok")).await.unwrap();
        assert_eq!(reply.content, "ok");
        let padded = service.reply(&f.creator, comment.id, text(" ok ")).await.unwrap();
        assert_eq!(padded.content, "ok");

        let replies = service.list_replies(comment.id).await.unwrap();
        assert_eq!(replies.len(), 2);
    }

    #[tokio::test]
    async fn test_user_donations() {
        let f = fixture().await;
        let service = EngagementService::new(f.repos.clone());
        let project = active_project(&f, "history", 1000, vec![]).await;
        service
            .donate(&f.other, &project.slug, DonateRequest { is_anonymous: true, ..donate_request(Decimal::from(20)) })
            .await
            .unwrap();

        let mine = service.user_donations(&f.other).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].project_slug, "history");

        let public = service.project_donations(&project.slug, None, 10).await.unwrap();
        assert_eq!(public.len(), 1);
        assert!(public[0].donation.is_anonymous);
    }
}
