//! 用户相关的请求与返回模型

use crate::models::engagement::UserDonationInfo;
use crate::models::projects::ProjectCard;
use crate::validation::{validate_facebook_profile, validate_phone, validate_username};
use chrono::{DateTime, NaiveDate, Utc};
use database::models::User;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// 注册信息
///
/// 密码不会出现在日志中，因此这里没有派生 `Debug`
#[derive(Deserialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[schema(example = "mona")]
    #[validate(length(min = 1, max = 150), custom(function = "validate_username"))]
    pub username: String,

    #[schema(example = "Mona")]
    #[validate(length(min = 1, max = 50))]
    pub first_name: String,

    #[schema(example = "Adel")]
    #[validate(length(min = 1, max = 50))]
    pub last_name: String,

    #[schema(example = "mona@example.com")]
    #[validate(email, length(max = 254))]
    pub email: String,

    #[schema(example = "01012345678")]
    #[validate(custom(function = "validate_phone"))]
    /// 埃及手机号
    pub phone: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    /// 确认密码，必须与 `password` 一致
    pub password_confirm: String,

    #[validate(length(min = 1, max = 500))]
    /// 文件存储返回的头像引用
    pub profile_picture: Option<String>,
}

/// 用户资料修改，邮箱不可修改
#[derive(Deserialize, Debug, Default, ToSchema, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 50))]
    pub first_name: Option<String>,

    #[validate(length(min = 1, max = 50))]
    pub last_name: Option<String>,

    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,

    #[validate(length(min = 1, max = 500))]
    pub profile_picture: Option<String>,

    #[schema(example = "1995-04-12")]
    pub birthdate: Option<NaiveDate>,

    #[validate(length(max = 200), custom(function = "validate_facebook_profile"))]
    pub facebook_profile: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub country: Option<String>,
}

/// 注销账号，需要再次输入密码并确认
#[derive(Deserialize, ToSchema)]
pub struct DeleteAccountRequest {
    pub password: String,

    #[serde(default)]
    pub confirm: bool,
}

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct UserInfo {
    #[schema(example = 7)]
    pub id: i64,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub phone: String,
    pub profile_picture: Option<String>,
    pub birthdate: Option<NaiveDate>,
    /// 按出生日期计算的年龄
    pub age: Option<i64>,
    pub facebook_profile: Option<String>,
    pub country: Option<String>,
    pub is_staff: bool,
    pub date_joined: DateTime<Utc>,
}

impl From<User> for UserInfo {
    fn from(user: User) -> Self {
        let age = user.age_on(Utc::now().date_naive());
        let full_name = user.full_name();
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            full_name,
            phone: user.phone,
            profile_picture: user.profile_picture,
            birthdate: user.birthdate,
            age,
            facebook_profile: user.facebook_profile,
            country: user.country,
            is_staff: user.is_staff,
            date_joined: user.date_joined,
        }
    }
}

/// 个人主页：用户信息、创建的项目（所有状态）、捐款记录与统计
#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct ProfileReply {
    pub user: UserInfo,
    pub projects: Vec<ProjectCard>,
    pub donations: Vec<UserDonationInfo>,
    #[schema(value_type = String, example = "150.00")]
    pub total_donated: Decimal,
    pub donation_count: u32,
    pub project_count: u32,
}
