//! 用户相关接口
//!
//! `/me` 下的接口都需要 Basic 认证。

use crate::auth::CurrentUser;
use crate::models::common::{PageQuery, Reply, ReplyList};
use crate::models::engagement::UserDonationInfo;
use crate::models::err::AppError;
use crate::models::projects::ProjectCard;
use crate::models::users::{DeleteAccountRequest, ProfileReply, RegisterRequest, UpdateProfileRequest, UserInfo};
use crate::routes::project_page;
use crate::services::identity::Profile;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use tracing::debug;
use validator::Validate;

fn profile_reply(profile: Profile) -> ProfileReply {
    let now = Utc::now();
    ProfileReply {
        donation_count: profile.donations.len() as u32,
        user: profile.user.into(),
        projects: profile.projects.into_iter().map(|s| ProjectCard::from_summary(s, now)).collect(),
        donations: profile.donations.into_iter().map(Into::into).collect(),
        total_donated: profile.total_donated,
        project_count: profile.project_count,
    }
}

/// 注册
///
/// 所有字段错误会一起返回，包括两次密码不一致、邮箱或用户名已被占用。
#[utoipa::path(post,
    path = "/users",
    tag = "users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = Reply<UserInfo>),
        (status = 400, description = "Invalid registration fields"),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Reply<UserInfo>>), AppError> {
    debug!("Registering user {}", request.username);

    let user = state.identity.register(request).await?;
    Ok((StatusCode::CREATED, Json(Reply::new(user.into()))))
}

/// 指定用户创建的已审核项目
#[utoipa::path(get,
    path = "/users/{username}/projects",
    tag = "users",
    params(("username" = String, Path, description = "Username"), PageQuery),
    responses(
        (status = 200, description = "Projects created by user", body = ReplyList<ProjectCard>),
        (status = 404, description = "User not found"),
    )
)]
pub async fn user_projects(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Query(page): Query<PageQuery>,
) -> Result<Json<ReplyList<ProjectCard>>, AppError> {
    page.validate()?;

    let (_, result) = state.discovery.user_projects(&username, page.limit(), page.offset()).await?;
    Ok(Json(project_page(result, page)))
}

/// 个人主页
///
/// 包含用户信息、创建的所有项目（任意状态）、捐款记录和捐款总额。
#[utoipa::path(get,
    path = "/me",
    tag = "users",
    security(("basic_auth" = [])),
    responses((status = 200, description = "Profile", body = Reply<ProfileReply>))
)]
pub async fn get_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Reply<ProfileReply>>, AppError> {
    debug!("Getting profile {}", user.id);

    let profile = state.identity.profile(user).await?;
    Ok(Json(Reply::new(profile_reply(profile))))
}

/// 修改个人资料
#[utoipa::path(patch,
    path = "/me",
    tag = "users",
    request_body = UpdateProfileRequest,
    security(("basic_auth" = [])),
    responses((status = 200, description = "Updated profile", body = Reply<UserInfo>))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<Reply<UserInfo>>, AppError> {
    let user = state.identity.update_profile(&user, request).await?;
    Ok(Json(Reply::new(user.into())))
}

/// 注销账号
#[utoipa::path(delete,
    path = "/me",
    tag = "users",
    request_body = DeleteAccountRequest,
    security(("basic_auth" = [])),
    responses((status = 200, description = "Deleted account", body = Reply<UserInfo>))
)]
pub async fn delete_account(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<DeleteAccountRequest>,
) -> Result<Json<Reply<UserInfo>>, AppError> {
    debug!("Deleting account {}", user.id);

    let user = state.identity.delete_account(&user, request).await?;
    Ok(Json(Reply::new(user.into())))
}

/// 我的捐款记录，按时间倒序
#[utoipa::path(get,
    path = "/me/donations",
    tag = "users",
    security(("basic_auth" = [])),
    responses((status = 200, description = "Donation history", body = Reply<Vec<UserDonationInfo>>))
)]
pub async fn my_donations(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Reply<Vec<UserDonationInfo>>>, AppError> {
    let donations = state.engagement.user_donations(&user).await?;
    Ok(Json(Reply::new(donations.into_iter().map(Into::into).collect())))
}
