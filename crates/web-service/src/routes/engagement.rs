//! 捐款、评分、评论接口

use crate::auth::{CurrentUser, MaybeUser};
use crate::models::common::{LimitQuery, PageQuery, Reply, ReplyList};
use crate::models::engagement::{
    CommentInfo, CommentRequest, DonateRequest, DonationInfo, DonationReceiptReply, RateRequest, RatingReply,
};
use crate::models::err::AppError;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use database::models::CommentWithAuthor;
use tracing::debug;
use validator::Validate;

const DEFAULT_DONATION_LIMIT: u32 = 10;

/// 捐款
///
/// 只能向已审核且处于 active 状态的项目捐款，金额至少为10且最多两位小数。
#[utoipa::path(post,
    path = "/projects/{slug}/donations",
    tag = "engagement",
    params(("slug" = String, Path, description = "Project slug")),
    request_body = DonateRequest,
    security(("basic_auth" = [])),
    responses(
        (status = 201, description = "Donation recorded", body = Reply<DonationReceiptReply>),
        (status = 409, description = "Project is not accepting donations"),
    )
)]
pub async fn donate(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Json(request): Json<DonateRequest>,
) -> Result<(StatusCode, Json<Reply<DonationReceiptReply>>), AppError> {
    debug!("Donating to project {} {:#?}", slug, request);

    let receipt = state.engagement.donate(&user, &slug, request).await?;
    Ok((StatusCode::CREATED, Json(Reply::new(receipt.into()))))
}

/// 项目最近的捐款，匿名捐款不显示捐款人
#[utoipa::path(get,
    path = "/projects/{slug}/donations",
    tag = "engagement",
    params(("slug" = String, Path, description = "Project slug"), LimitQuery),
    responses((status = 200, description = "Recent donations", body = Reply<Vec<DonationInfo>>))
)]
pub async fn list_donations(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(slug): Path<String>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Reply<Vec<DonationInfo>>>, AppError> {
    let limit = i64::from(query.or(DEFAULT_DONATION_LIMIT));
    let donations = state.engagement.project_donations(&slug, viewer.user(), limit).await?;
    Ok(Json(Reply::new(donations.into_iter().map(Into::into).collect())))
}

/// 评分
///
/// 每个用户对每个项目只有一条评分，重复提交会更新原有评分。
#[utoipa::path(post,
    path = "/projects/{slug}/ratings",
    tag = "engagement",
    params(("slug" = String, Path, description = "Project slug")),
    request_body = RateRequest,
    security(("basic_auth" = [])),
    responses((status = 200, description = "Rating saved", body = Reply<RatingReply>))
)]
pub async fn rate_project(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Json(request): Json<RateRequest>,
) -> Result<Json<Reply<RatingReply>>, AppError> {
    debug!("Rating project {} {:#?}", slug, request);

    let (outcome, summary) = state.engagement.rate(&user, &slug, request).await?;
    Ok(Json(Reply::new(RatingReply {
        rating: outcome.rating.into(),
        created: outcome.created,
        summary: summary.into(),
    })))
}

fn comment_list(rows: Vec<CommentWithAuthor>) -> Vec<CommentInfo> {
    rows.into_iter().map(Into::into).collect()
}

/// 顶层评论列表，按时间倒序
#[utoipa::path(get,
    path = "/projects/{slug}/comments",
    tag = "engagement",
    params(("slug" = String, Path, description = "Project slug"), PageQuery),
    responses((status = 200, description = "Top-level comments", body = ReplyList<CommentInfo>))
)]
pub async fn list_comments(
    State(state): State<AppState>,
    viewer: MaybeUser,
    Path(slug): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ReplyList<CommentInfo>>, AppError> {
    page.validate()?;

    let result = state.engagement.list_comments(&slug, viewer.user(), page.limit(), page.offset()).await?;
    Ok(Json(ReplyList::new(comment_list(result.comments), result.total, page)))
}

/// 发表评论
#[utoipa::path(post,
    path = "/projects/{slug}/comments",
    tag = "engagement",
    params(("slug" = String, Path, description = "Project slug")),
    request_body = CommentRequest,
    security(("basic_auth" = [])),
    responses((status = 201, description = "Comment added", body = Reply<CommentInfo>))
)]
pub async fn add_comment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(slug): Path<String>,
    Json(request): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Reply<CommentInfo>>), AppError> {
    debug!("Commenting on project {}", slug);

    let username = user.username.clone();
    let comment = state.engagement.comment(&user, &slug, request).await?;
    let info = CommentWithAuthor { comment, username, reply_count: 0 };
    Ok((StatusCode::CREATED, Json(Reply::new(info.into()))))
}

/// 评论的回复列表，按时间正序
#[utoipa::path(get,
    path = "/comments/{id}/replies",
    tag = "engagement",
    params(("id" = i64, Path, description = "Comment id")),
    responses((status = 200, description = "Replies", body = Reply<Vec<CommentInfo>>))
)]
pub async fn list_replies(
    State(state): State<AppState>,
    Path(comment_id): Path<i64>,
) -> Result<Json<Reply<Vec<CommentInfo>>>, AppError> {
    let replies = state.engagement.list_replies(comment_id).await?;
    Ok(Json(Reply::new(comment_list(replies))))
}

/// 回复顶层评论
#[utoipa::path(post,
    path = "/comments/{id}/replies",
    tag = "engagement",
    params(("id" = i64, Path, description = "Comment id")),
    request_body = CommentRequest,
    security(("basic_auth" = [])),
    responses(
        (status = 201, description = "Reply added", body = Reply<CommentInfo>),
        (status = 409, description = "Parent is itself a reply"),
    )
)]
pub async fn add_reply(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(comment_id): Path<i64>,
    Json(request): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Reply<CommentInfo>>), AppError> {
    debug!("Replying to comment {}", comment_id);

    let username = user.username.clone();
    let comment = state.engagement.reply(&user, comment_id, request).await?;
    let info = CommentWithAuthor { comment, username, reply_count: 0 };
    Ok((StatusCode::CREATED, Json(Reply::new(info.into()))))
}
