//! 互动数据库模型：评论、评分、捐款

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// 项目评论，`parent_id` 不为空时表示回复
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Comment {
    pub id: i64,
    pub project_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Comment {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// 评论及作者用户名、已审核回复数
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CommentWithAuthor {
    #[sqlx(flatten)]
    pub comment: Comment,
    pub username: String,
    pub reply_count: i64,
}

#[derive(Debug, Clone)]
pub struct CommentPage {
    pub comments: Vec<CommentWithAuthor>,
    pub total: u32,
}

#[derive(Debug, Clone)]
pub struct CommentCreate {
    pub project_id: i64,
    pub user_id: i64,
    pub parent_id: Option<i64>,
    pub content: String,
}

/// 项目评分，每个用户对每个项目最多一条
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Rating {
    pub id: i64,
    pub project_id: i64,
    pub user_id: i64,
    pub rating: i16,
    pub review: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RatingUpsert {
    pub project_id: i64,
    pub user_id: i64,
    pub rating: i16,
    pub review: String,
}

/// 评分写入结果，`created` 区分新建和原地更新
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RatingUpsertOutcome {
    #[sqlx(flatten)]
    pub rating: Rating,
    pub created: bool,
}

/// 项目评分统计，没有评分时平均分为 0
#[derive(Debug, Clone, Copy, Default, PartialEq, sqlx::FromRow)]
pub struct RatingSummary {
    pub average_rating: f64,
    pub rating_count: i64,
}

/// 捐款记录，只追加不修改
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Donation {
    pub id: i64,
    pub project_id: i64,
    /// 捐款人注销账号后为空
    pub user_id: Option<i64>,
    pub amount: Decimal,
    pub message: String,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct DonationCreate {
    pub project_id: i64,
    pub user_id: i64,
    pub amount: Decimal,
    pub message: String,
    pub is_anonymous: bool,
}

/// 捐款写入结果，附带项目最新的已筹金额
#[derive(Debug, Clone)]
pub struct DonationReceipt {
    pub donation: Donation,
    pub project_current_amount: Decimal,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DonationWithDonor {
    #[sqlx(flatten)]
    pub donation: Donation,
    pub username: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DonationWithProject {
    #[sqlx(flatten)]
    pub donation: Donation,
    pub project_title: String,
    pub project_slug: String,
}
