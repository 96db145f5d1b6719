//! 互动仓库：评论、评分、捐款

use crate::models::engagement::{
    Comment, CommentCreate, CommentPage, CommentWithAuthor, Donation, DonationCreate, DonationReceipt,
    DonationWithDonor, DonationWithProject, Rating, RatingSummary, RatingUpsert, RatingUpsertOutcome,
};
use crate::repositories::traits::EngagementRepositoryTrait;
use crate::{DatabaseError, DatabaseResult};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{debug, info};

macro_rules! comment_columns {
    () => {
        "c.id, c.project_id, c.user_id, c.parent_id, c.content, c.is_approved, c.created_at, c.updated_at"
    };
}

macro_rules! donation_columns {
    () => {
        "d.id, d.project_id, d.user_id, d.amount, d.message, d.is_anonymous, d.created_at"
    };
}

#[derive(sqlx::FromRow)]
struct CommentRow {
    #[sqlx(flatten)]
    comment: CommentWithAuthor,
    total_count: i64,
}

#[derive(Debug, Clone)]
pub struct EngagementRepository {
    pool: PgPool,
}

impl EngagementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl EngagementRepositoryTrait for EngagementRepository {
    async fn add_comment(&self, comment: CommentCreate) -> DatabaseResult<Comment> {
        debug!("💬 添加评论: 项目 {} 用户 {} 父评论 {:?}", comment.project_id, comment.user_id, comment.parent_id);

        let created = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (project_id, user_id, parent_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING id, project_id, user_id, parent_id, content, is_approved, created_at, updated_at
            "#,
        )
        .bind(comment.project_id)
        .bind(comment.user_id)
        .bind(comment.parent_id)
        .bind(comment.content)
        .fetch_one(&self.pool)
        .await?;
        Ok(created)
    }

    async fn get_comment(&self, id: i64) -> DatabaseResult<Comment> {
        sqlx::query_as::<_, Comment>(concat!("SELECT ", comment_columns!(), " FROM comments c WHERE c.id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::or_not_found(e, format!("Comment {id} not found")))
    }

    /// 顶层已审核评论，最新的在前，附带已审核回复数
    async fn list_comments(&self, project_id: i64, limit: i64, offset: i64) -> DatabaseResult<CommentPage> {
        let rows = sqlx::query_as::<_, CommentRow>(concat!(
            "SELECT ",
            comment_columns!(),
            r#",
                   u.username,
                   (SELECT COUNT(*) FROM comments r WHERE r.parent_id = c.id AND r.is_approved) AS reply_count,
                   COUNT(*) OVER () AS total_count
            FROM comments c
                     JOIN users u ON u.id = c.user_id
            WHERE c.project_id = $1
              AND c.parent_id IS NULL
              AND c.is_approved
            ORDER BY c.created_at DESC, c.id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(project_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total = rows.first().map(|r| r.total_count).unwrap_or(0) as u32;
        let comments = rows.into_iter().map(|r| r.comment).collect();
        Ok(CommentPage { comments, total })
    }

    /// 已审核回复，最早的在前
    async fn list_replies(&self, parent_id: i64) -> DatabaseResult<Vec<CommentWithAuthor>> {
        let replies = sqlx::query_as::<_, CommentWithAuthor>(concat!(
            "SELECT ",
            comment_columns!(),
            r#", u.username, 0::bigint AS reply_count
            FROM comments c
                     JOIN users u ON u.id = c.user_id
            WHERE c.parent_id = $1
              AND c.is_approved
            ORDER BY c.created_at, c.id
            "#
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(replies)
    }

    /// 新增或更新评分
    ///
    /// `ON CONFLICT` 保证并发首次评分也只会产生一行，`xmax = 0` 说明这一行是本语句插入的
    async fn upsert_rating(&self, rating: RatingUpsert) -> DatabaseResult<RatingUpsertOutcome> {
        debug!("⭐ 评分: 项目 {} 用户 {} -> {}", rating.project_id, rating.user_id, rating.rating);

        let outcome = sqlx::query_as::<_, RatingUpsertOutcome>(
            r#"
            INSERT INTO ratings (project_id, user_id, rating, review)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (project_id, user_id) DO UPDATE
                SET rating = EXCLUDED.rating,
                    review = EXCLUDED.review,
                    updated_at = now()
            RETURNING id, project_id, user_id, rating, review, created_at, updated_at, (xmax = 0) AS created
            "#,
        )
        .bind(rating.project_id)
        .bind(rating.user_id)
        .bind(rating.rating)
        .bind(rating.review)
        .fetch_one(&self.pool)
        .await?;
        Ok(outcome)
    }

    async fn get_rating(&self, project_id: i64, user_id: i64) -> DatabaseResult<Option<Rating>> {
        let rating = sqlx::query_as::<_, Rating>(
            r#"
            SELECT id, project_id, user_id, rating, review, created_at, updated_at
            FROM ratings
            WHERE project_id = $1 AND user_id = $2
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(rating)
    }

    async fn rating_summary(&self, project_id: i64) -> DatabaseResult<RatingSummary> {
        let summary = sqlx::query_as::<_, RatingSummary>(
            r#"
            SELECT COALESCE(AVG(rating), 0)::float8 AS average_rating, COUNT(*) AS rating_count
            FROM ratings
            WHERE project_id = $1
            "#,
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(summary)
    }

    /// 记录捐款
    ///
    /// 先以原子自增的方式更新项目已筹金额（条件：active 且已审核），再写入捐款记录，两步在同一事务中。
    /// 并发捐款在项目行上排队，已筹金额始终等于全部捐款之和。
    async fn record_donation(&self, donation: DonationCreate) -> DatabaseResult<DonationReceipt> {
        debug!("💰 记录捐款: 项目 {} 用户 {} 金额 {}", donation.project_id, donation.user_id, donation.amount);

        let mut tx = self.pool.begin().await?;

        let current_amount = sqlx::query_scalar::<_, Decimal>(
            r#"
            UPDATE projects
            SET current_amount = current_amount + $2,
                updated_at = now()
            WHERE id = $1
              AND status = 'active'
              AND is_approved
            RETURNING current_amount
            "#,
        )
        .bind(donation.project_id)
        .bind(donation.amount)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(project_current_amount) = current_amount else {
            tx.rollback().await?;
            let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM projects WHERE id = $1)")
                .bind(donation.project_id)
                .fetch_one(&self.pool)
                .await?;
            return Err(if exists {
                DatabaseError::invalid_state("Donations are only accepted for active, approved projects.")
            } else {
                DatabaseError::not_found(format!("Project {} not found", donation.project_id))
            });
        };

        let created = sqlx::query_as::<_, Donation>(
            r#"
            INSERT INTO donations (project_id, user_id, amount, message, is_anonymous)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, project_id, user_id, amount, message, is_anonymous, created_at
            "#,
        )
        .bind(donation.project_id)
        .bind(donation.user_id)
        .bind(donation.amount)
        .bind(donation.message)
        .bind(donation.is_anonymous)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!("✅ 捐款成功: 项目 {} 已筹 {}", created.project_id, project_current_amount);
        Ok(DonationReceipt { donation: created, project_current_amount })
    }

    async fn list_project_donations(&self, project_id: i64, limit: i64) -> DatabaseResult<Vec<DonationWithDonor>> {
        let donations = sqlx::query_as::<_, DonationWithDonor>(concat!(
            "SELECT ",
            donation_columns!(),
            r#", u.username
            FROM donations d
                     LEFT JOIN users u ON u.id = d.user_id
            WHERE d.project_id = $1
            ORDER BY d.created_at DESC, d.id DESC
            LIMIT $2
            "#
        ))
        .bind(project_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(donations)
    }

    async fn list_user_donations(&self, user_id: i64) -> DatabaseResult<Vec<DonationWithProject>> {
        let donations = sqlx::query_as::<_, DonationWithProject>(concat!(
            "SELECT ",
            donation_columns!(),
            r#", p.title AS project_title, p.slug AS project_slug
            FROM donations d
                     JOIN projects p ON p.id = d.project_id
            WHERE d.user_id = $1
            ORDER BY d.created_at DESC, d.id DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(donations)
    }

    async fn donation_total(&self, project_id: i64) -> DatabaseResult<Decimal> {
        let total = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(amount), 0)::numeric FROM donations WHERE project_id = $1",
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}
