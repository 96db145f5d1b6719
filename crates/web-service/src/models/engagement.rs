//! 互动相关的请求与返回模型：捐款、评分、评论

use crate::validation::validate_donation_amount;
use chrono::{DateTime, Utc};
use database::models::{
    CommentWithAuthor, DonationReceipt, DonationWithDonor, DonationWithProject, Rating, RatingSummary,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// 捐款信息
#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct DonateRequest {
    #[schema(value_type = String, example = "150.00")]
    #[validate(custom(function = "validate_donation_amount"))]
    /// 捐款金额，最少10，最多两位小数
    pub amount: Decimal,

    #[serde(default)]
    #[validate(length(max = 200))]
    pub message: String,

    #[serde(default)]
    /// 匿名捐款时公开列表不显示捐款人
    pub is_anonymous: bool,
}

/// 项目捐款列表中的一条记录
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct DonationInfo {
    pub id: i64,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub message: String,
    pub is_anonymous: bool,
    /// 匿名捐款或捐款人已注销时为空
    pub donor: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<DonationWithDonor> for DonationInfo {
    fn from(row: DonationWithDonor) -> Self {
        let donor = row.username.filter(|_| !row.donation.is_anonymous);
        Self {
            id: row.donation.id,
            amount: row.donation.amount,
            message: row.donation.message,
            is_anonymous: row.donation.is_anonymous,
            donor,
            created_at: row.donation.created_at,
        }
    }
}

/// 用户个人的捐款记录
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct UserDonationInfo {
    pub id: i64,
    pub project_id: i64,
    pub project_title: String,
    pub project_slug: String,
    #[schema(value_type = String)]
    pub amount: Decimal,
    pub message: String,
    pub is_anonymous: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DonationWithProject> for UserDonationInfo {
    fn from(row: DonationWithProject) -> Self {
        Self {
            id: row.donation.id,
            project_id: row.donation.project_id,
            project_title: row.project_title,
            project_slug: row.project_slug,
            amount: row.donation.amount,
            message: row.donation.message,
            is_anonymous: row.donation.is_anonymous,
            created_at: row.donation.created_at,
        }
    }
}

/// 捐款成功后的回执
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct DonationReceiptReply {
    pub id: i64,
    pub project_id: i64,
    #[schema(value_type = String, example = "150.00")]
    pub amount: Decimal,
    /// 项目最新的已筹金额
    #[schema(value_type = String)]
    pub project_current_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl From<DonationReceipt> for DonationReceiptReply {
    fn from(receipt: DonationReceipt) -> Self {
        Self {
            id: receipt.donation.id,
            project_id: receipt.donation.project_id,
            amount: receipt.donation.amount,
            project_current_amount: receipt.project_current_amount,
            created_at: receipt.donation.created_at,
        }
    }
}

/// 评分信息，同一用户重复评分会覆盖之前的评分
#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct RateRequest {
    #[schema(example = 5)]
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,

    #[serde(default)]
    #[validate(length(max = 500))]
    pub review: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct RatingInfo {
    pub id: i64,
    pub project_id: i64,
    pub user_id: i64,
    pub rating: i16,
    pub review: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Rating> for RatingInfo {
    fn from(rating: Rating) -> Self {
        Self {
            id: rating.id,
            project_id: rating.project_id,
            user_id: rating.user_id,
            rating: rating.rating,
            review: rating.review,
            created_at: rating.created_at,
            updated_at: rating.updated_at,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, ToSchema)]
pub struct RatingSummaryInfo {
    /// 没有评分时为0
    #[schema(example = 4.5)]
    pub average_rating: f64,
    pub total_ratings: i64,
}

impl From<RatingSummary> for RatingSummaryInfo {
    fn from(summary: RatingSummary) -> Self {
        Self { average_rating: summary.average_rating, total_ratings: summary.rating_count }
    }
}

/// 评分结果
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct RatingReply {
    pub rating: RatingInfo,
    /// 是否为首次评分
    pub created: bool,
    /// 写入后的项目评分统计
    pub summary: RatingSummaryInfo,
}

/// 评论或回复内容，长度在服务层按去除首尾空白后的字符数校验
#[derive(Deserialize, Debug, ToSchema)]
pub struct CommentRequest {
    #[schema(example = "Great initiative, good luck!")]
    pub content: String,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct CommentInfo {
    pub id: i64,
    pub project_id: i64,
    pub user_id: i64,
    pub username: String,
    pub parent_id: Option<i64>,
    pub content: String,
    /// 已审核的回复数量，回复本身始终为0
    pub reply_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<CommentWithAuthor> for CommentInfo {
    fn from(row: CommentWithAuthor) -> Self {
        Self {
            id: row.comment.id,
            project_id: row.comment.project_id,
            user_id: row.comment.user_id,
            username: row.username,
            parent_id: row.comment.parent_id,
            content: row.comment.content,
            reply_count: row.reply_count,
            created_at: row.comment.created_at,
            updated_at: row.comment.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::models::Donation;

    fn donation_row(is_anonymous: bool) -> DonationWithDonor {
        DonationWithDonor {
            donation: Donation {
                id: 1,
                project_id: 2,
                user_id: Some(3),
                amount: Decimal::new(5000, 2),
                message: String::new(),
                is_anonymous,
                created_at: Utc::now(),
            },
            username: Some("mona".to_string()),
        }
    }

    #[test]
    fn test_anonymous_donor_hidden() {
        assert_eq!(DonationInfo::from(donation_row(false)).donor.as_deref(), Some("mona"));
        assert_eq!(DonationInfo::from(donation_row(true)).donor, None);
    }

    #[test]
    fn test_rate_request_range() {
        let ok = RateRequest { rating: 5, review: String::new() };
        assert!(ok.validate().is_ok());
        let low = RateRequest { rating: 0, review: String::new() };
        assert!(low.validate().is_err());
        let high = RateRequest { rating: 6, review: String::new() };
        assert!(high.validate().is_err());
    }

    #[test]
    fn test_donate_request_amount() {
        let request: DonateRequest = serde_json::from_str(r#"{"amount": "9.99"}"#).unwrap();
        assert!(request.validate().is_err());
        let request: DonateRequest = serde_json::from_str(r#"{"amount": "10.50", "is_anonymous": true}"#).unwrap();
        assert!(request.validate().is_ok());
        assert!(request.is_anonymous);
    }
}
