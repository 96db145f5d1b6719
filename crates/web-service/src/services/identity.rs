//! 用户身份服务
//!
//! 注册、登录认证、个人主页、资料修改和注销账号。
//! 密码使用 argon2id 哈希保存，登录凭证可以是邮箱或用户名。

use crate::models::err::AppError;
use crate::models::users::{DeleteAccountRequest, RegisterRequest, UpdateProfileRequest};
use crate::services::collect_errors;
use crate::validation::{check_birthdate, into_result, rule};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use chrono::Utc;
use color_eyre::eyre::eyre;
use database::models::{DonationWithProject, ProjectQuery, ProjectSummary, User, UserCreate, UserProfileUpdate};
use database::Repositories;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

/// 个人主页展示的创建项目数量上限
const PROFILE_PROJECT_LIMIT: i64 = 100;

/// 密码哈希与校验
#[derive(Clone)]
pub struct Passwords {
    argon2: Arc<Argon2<'static>>,
}

impl Default for Passwords {
    fn default() -> Self {
        Self { argon2: Arc::new(Argon2::default()) }
    }
}

impl Passwords {
    /// 使用自定义参数，测试中用来降低哈希成本
    pub fn with_params(params: Params) -> Self {
        Self { argon2: Arc::new(Argon2::new(Algorithm::Argon2id, Version::V0x13, params)) }
    }

    pub fn hash(&self, password: &str) -> Result<String, AppError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::InternalError(eyre!("Can not hash password: {e}")))
    }

    /// 哈希格式错误时视为校验失败
    pub fn verify(&self, password: &str, password_hash: &str) -> bool {
        match PasswordHash::new(password_hash) {
            Ok(parsed) => self.argon2.verify_password(password.as_bytes(), &parsed).is_ok(),
            Err(e) => {
                warn!("⚠️ 无法解析密码哈希: {}", e);
                false
            }
        }
    }
}

/// 个人主页数据
#[derive(Debug)]
pub struct Profile {
    pub user: User,
    pub projects: Vec<ProjectSummary>,
    pub project_count: u32,
    pub donations: Vec<DonationWithProject>,
    pub total_donated: Decimal,
}

#[derive(Clone)]
pub struct IdentityService {
    repos: Repositories,
    passwords: Passwords,
}

impl IdentityService {
    pub fn new(repos: Repositories, passwords: Passwords) -> Self {
        Self { repos, passwords }
    }

    /// 注册新用户
    ///
    /// 字段校验、两次密码一致性以及邮箱/用户名占用情况会一起返回给调用方
    pub async fn register(&self, request: RegisterRequest) -> Result<User, AppError> {
        debug!("📝 注册用户 {}", request.username);

        let mut errors = collect_errors(request.validate());
        if request.password != request.password_confirm {
            errors.add("password_confirm", rule("mismatch", "Passwords do not match."));
        }

        let email = request.email.trim().to_string();
        if self.repos.users.find_by_email(&email).await?.is_some() {
            errors.add("email", rule("duplicate", "This email is already registered."));
        }
        if self.repos.users.find_by_username(&request.username).await?.is_some() {
            errors.add("username", rule("duplicate", "A user with that username already exists."));
        }
        into_result(errors)?;

        let password_hash = self.passwords.hash(&request.password)?;
        let user = self
            .repos
            .users
            .create_user(UserCreate {
                username: request.username,
                email,
                password_hash,
                first_name: request.first_name.trim().to_string(),
                last_name: request.last_name.trim().to_string(),
                phone: request.phone,
                profile_picture: request.profile_picture,
            })
            .await?;

        info!("✅ 用户注册成功: {} ({})", user.username, user.id);
        Ok(user)
    }

    /// 登录认证
    ///
    /// `login` 包含 `@` 时按邮箱查找，否则按用户名查找。
    /// 密码校验通过且账号处于启用状态时返回用户，其他情况返回 `None`。
    pub async fn authenticate(&self, login: &str, password: &str) -> Result<Option<User>, AppError> {
        let user = if login.contains('@') {
            self.repos.users.find_by_email(login).await?
        } else {
            self.repos.users.find_by_username(login).await?
        };

        Ok(user.filter(|u| u.is_active && self.passwords.verify(password, &u.password_hash)))
    }

    /// 个人主页：用户信息、创建的所有项目、捐款记录与合计
    pub async fn profile(&self, user: User) -> Result<Profile, AppError> {
        debug!("👤 查询个人主页 {}", user.id);

        let mut query = ProjectQuery::public(PROFILE_PROJECT_LIMIT, 0);
        query.creator_id = Some(user.id);
        query.statuses.clear();
        query.approved_only = false;
        let projects = self.repos.projects.find_projects(&query).await?;

        let donations = self.repos.engagement.list_user_donations(user.id).await?;
        let total_donated = donations.iter().map(|d| d.donation.amount).sum();

        Ok(Profile {
            user,
            projects: projects.projects,
            project_count: projects.total,
            donations,
            total_donated,
        })
    }

    pub async fn update_profile(&self, user: &User, request: UpdateProfileRequest) -> Result<User, AppError> {
        debug!("✏️ 更新用户资料 {} {:?}", user.id, request);

        let mut errors = collect_errors(request.validate());
        if let Some(birthdate) = request.birthdate {
            check_birthdate(&mut errors, birthdate, Utc::now().date_naive());
        }
        into_result(errors)?;

        let update = UserProfileUpdate {
            first_name: request.first_name.map(|s| s.trim().to_string()),
            last_name: request.last_name.map(|s| s.trim().to_string()),
            phone: request.phone,
            profile_picture: request.profile_picture,
            birthdate: request.birthdate,
            facebook_profile: request.facebook_profile,
            country: request.country,
        };
        Ok(self.repos.users.update_profile(user.id, update).await?)
    }

    /// 注销账号，需要勾选确认并再次输入正确的密码
    pub async fn delete_account(&self, user: &User, request: DeleteAccountRequest) -> Result<User, AppError> {
        if !request.confirm {
            return Err(AppError::field("confirm", "required", "Please confirm that you want to delete your account."));
        }
        if !self.passwords.verify(&request.password, &user.password_hash) {
            return Err(AppError::field("password", "incorrect", "Incorrect password."));
        }

        let deleted = self.repos.users.delete_user(user.id).await?;
        info!("🗑️ 用户已注销: {} ({})", deleted.username, deleted.id);
        Ok(deleted)
    }

    /// 将指定邮箱的用户提升为管理员，用户不存在时返回 `None`
    pub async fn promote_staff(&self, email: &str) -> Result<Option<User>, AppError> {
        let Some(user) = self.repos.users.find_by_email(email).await? else {
            warn!("⚠️ 未找到需要提升为管理员的用户: {}", email);
            return Ok(None);
        };
        if user.is_staff {
            return Ok(Some(user));
        }

        let user = self.repos.users.set_staff(user.id, true).await?;
        info!("🔑 用户已提升为管理员: {}", user.email);
        Ok(Some(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{active_project, cheap_passwords, fixture};
    use database::models::DonationCreate;

    fn register_request(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            first_name: "Mona".to_string(),
            last_name: "Adel".to_string(),
            email: email.to_string(),
            phone: "01012345678".to_string(),
            password: "s3cret-pass".to_string(),
            password_confirm: "s3cret-pass".to_string(),
            profile_picture: None,
        }
    }

    #[test]
    fn test_password_hash_roundtrip() {
        let passwords = cheap_passwords();
        let hash = passwords.hash("s3cret-pass").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(passwords.verify("s3cret-pass", &hash));
        assert!(!passwords.verify("wrong-pass", &hash));
        assert!(!passwords.verify("s3cret-pass", "not-a-hash"));
    }

    #[tokio::test]
    async fn test_register_and_authenticate() {
        let f = fixture().await;
        let service = IdentityService::new(f.repos.clone(), cheap_passwords());

        let user = service.register(register_request("mona", "mona@example.com")).await.unwrap();
        assert!(user.password_hash.starts_with("$argon2id$"));

        let by_email = service.authenticate("mona@example.com", "s3cret-pass").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(user.id));
        let by_username = service.authenticate("mona", "s3cret-pass").await.unwrap();
        assert_eq!(by_username.map(|u| u.id), Some(user.id));
        assert!(service.authenticate("mona", "wrong-pass").await.unwrap().is_none());
        assert!(service.authenticate("nobody", "s3cret-pass").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_reports_duplicates_and_mismatch() {
        let f = fixture().await;
        let service = IdentityService::new(f.repos.clone(), cheap_passwords());
        service.register(register_request("mona", "mona@example.com")).await.unwrap();

        let mut request = register_request("mona", "MONA@example.com");
        request.password_confirm = "different".to_string();
        let Err(AppError::ValidationFailed(errors)) = service.register(request).await else {
            panic!("expected validation error");
        };
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("username"));
        assert!(fields.contains_key("password_confirm"));
    }

    #[tokio::test]
    async fn test_register_rejects_invalid_fields() {
        let f = fixture().await;
        let service = IdentityService::new(f.repos.clone(), cheap_passwords());

        let mut request = register_request("mona@home", "not-an-email");
        request.phone = "01312345678".to_string();
        request.password = "short".to_string();
        request.password_confirm = "short".to_string();
        let Err(AppError::ValidationFailed(errors)) = service.register(request).await else {
            panic!("expected validation error");
        };
        let fields = errors.field_errors();
        for field in ["username", "email", "phone", "password"] {
            assert!(fields.contains_key(field), "missing error for {field}");
        }
    }

    #[tokio::test]
    async fn test_profile_totals() {
        let f = fixture().await;
        let service = IdentityService::new(f.repos.clone(), cheap_passwords());
        let project = active_project(&f, "clean-water", 1000, vec![]).await;
        for amount in [50, 25] {
            f.repos
                .engagement
                .record_donation(DonationCreate {
                    project_id: project.id,
                    user_id: f.other.id,
                    amount: Decimal::from(amount),
                    message: String::new(),
                    is_anonymous: false,
                })
                .await
                .unwrap();
        }

        let profile = service.profile(f.other.clone()).await.unwrap();
        assert_eq!(profile.total_donated, Decimal::from(75));
        assert_eq!(profile.donations.len(), 2);
        assert_eq!(profile.project_count, 0);

        let profile = service.profile(f.creator.clone()).await.unwrap();
        assert_eq!(profile.project_count, 1);
        assert_eq!(profile.projects[0].slug, "clean-water");
    }

    #[tokio::test]
    async fn test_update_profile_checks_birthdate() {
        let f = fixture().await;
        let service = IdentityService::new(f.repos.clone(), cheap_passwords());

        let request = UpdateProfileRequest {
            birthdate: Some(Utc::now().date_naive()),
            ..Default::default()
        };
        assert!(matches!(
            service.update_profile(&f.creator, request).await,
            Err(AppError::ValidationFailed(_))
        ));

        let request = UpdateProfileRequest {
            country: Some("Egypt".to_string()),
            facebook_profile: Some("https://facebook.com/creator".to_string()),
            ..Default::default()
        };
        let updated = service.update_profile(&f.creator, request).await.unwrap();
        assert_eq!(updated.country.as_deref(), Some("Egypt"));
        assert_eq!(updated.email, f.creator.email);
    }

    #[tokio::test]
    async fn test_delete_account_requires_confirmation() {
        let f = fixture().await;
        let service = IdentityService::new(f.repos.clone(), cheap_passwords());

        let request = DeleteAccountRequest { password: "password123".to_string(), confirm: false };
        assert!(service.delete_account(&f.other, request).await.is_err());
        let request = DeleteAccountRequest { password: "wrong".to_string(), confirm: true };
        assert!(service.delete_account(&f.other, request).await.is_err());

        let request = DeleteAccountRequest { password: "password123".to_string(), confirm: true };
        service.delete_account(&f.other, request).await.unwrap();
        assert!(f.repos.users.find_by_username("donor").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_donor_keeps_ledger() {
        let f = fixture().await;
        let service = IdentityService::new(f.repos.clone(), cheap_passwords());
        let project = active_project(&f, "solar-pumps", 1000, vec![]).await;
        f.repos
            .engagement
            .record_donation(DonationCreate {
                project_id: project.id,
                user_id: f.other.id,
                amount: Decimal::from(200),
                message: "Good luck".to_string(),
                is_anonymous: false,
            })
            .await
            .unwrap();

        let request = DeleteAccountRequest { password: "password123".to_string(), confirm: true };
        service.delete_account(&f.other, request).await.unwrap();

        // 捐款记录保留，已筹金额仍等于捐款总和
        let stored = f.repos.projects.get_project_by_id(project.id).await.unwrap();
        assert_eq!(stored.current_amount, Decimal::from(200));
        assert_eq!(f.repos.engagement.donation_total(project.id).await.unwrap(), stored.current_amount);

        let donations = f.repos.engagement.list_project_donations(project.id, 10).await.unwrap();
        assert_eq!(donations.len(), 1);
        assert_eq!(donations[0].donation.user_id, None);
        assert_eq!(donations[0].username, None);
    }

    #[tokio::test]
    async fn test_promote_staff() {
        let f = fixture().await;
        let service = IdentityService::new(f.repos.clone(), cheap_passwords());

        let promoted = service.promote_staff("donor@example.com").await.unwrap().unwrap();
        assert!(promoted.is_staff);
        assert!(service.promote_staff("ghost@example.com").await.unwrap().is_none());
    }
}
