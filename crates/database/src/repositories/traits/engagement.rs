//! 互动仓库 trait 定义：评论、评分、捐款

use crate::models::engagement::{
    Comment, CommentCreate, CommentPage, CommentWithAuthor, DonationCreate, DonationReceipt, DonationWithDonor,
    DonationWithProject, Rating, RatingSummary, RatingUpsert, RatingUpsertOutcome,
};
use crate::DatabaseResult;
use rust_decimal::Decimal;

/// 互动仓库trait定义
#[async_trait::async_trait]
pub trait EngagementRepositoryTrait: Send + Sync + 'static {
    async fn add_comment(&self, comment: CommentCreate) -> DatabaseResult<Comment>;

    async fn get_comment(&self, id: i64) -> DatabaseResult<Comment>;

    /// 项目的顶层已审核评论（不含回复），按创建时间倒序分页
    async fn list_comments(&self, project_id: i64, limit: i64, offset: i64) -> DatabaseResult<CommentPage>;

    /// 评论的已审核回复，按创建时间正序
    async fn list_replies(&self, parent_id: i64) -> DatabaseResult<Vec<CommentWithAuthor>>;

    /// 新增或更新评分
    ///
    /// 同一 (项目, 用户) 并发首次评分时由唯一约束 + 冲突更新保证只存在一条记录，
    /// 调用方不会收到唯一约束错误。
    async fn upsert_rating(&self, rating: RatingUpsert) -> DatabaseResult<RatingUpsertOutcome>;

    async fn get_rating(&self, project_id: i64, user_id: i64) -> DatabaseResult<Option<Rating>>;

    async fn rating_summary(&self, project_id: i64) -> DatabaseResult<RatingSummary>;

    /// 记录捐款
    ///
    /// 捐款插入与项目已筹金额的原子自增在同一事务内完成。
    /// 项目不是 active 或未审核时返回 `InvalidState`，不写入任何数据。
    async fn record_donation(&self, donation: DonationCreate) -> DatabaseResult<DonationReceipt>;

    /// 项目的捐款记录，按时间倒序
    async fn list_project_donations(&self, project_id: i64, limit: i64) -> DatabaseResult<Vec<DonationWithDonor>>;

    /// 用户的捐款记录，按时间倒序
    async fn list_user_donations(&self, user_id: i64) -> DatabaseResult<Vec<DonationWithProject>>;

    /// 捐款流水合计，用于核对项目已筹金额
    async fn donation_total(&self, project_id: i64) -> DatabaseResult<Decimal>;
}
