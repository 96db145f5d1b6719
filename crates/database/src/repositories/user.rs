//! 用户仓库
//!
//! 负责用户相关的数据库操作

use crate::models::user::{User, UserCreate, UserProfileUpdate};
use crate::repositories::traits::UserRepositoryTrait;
use crate::{DatabaseError, DatabaseResult};
use sqlx::PgPool;
use tracing::debug;

macro_rules! user_columns {
    () => {
        r#"id, username, email, password_hash, first_name, last_name, phone, profile_picture,
           birthdate, facebook_profile, country, is_staff, is_active, date_joined"#
    };
}

/// 用户仓库结构体
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// 创建新的用户仓库实例
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserRepositoryTrait for UserRepository {
    async fn create_user(&self, user: UserCreate) -> DatabaseResult<User> {
        debug!("📝 创建用户: {} <{}>", user.username, user.email);

        let created = sqlx::query_as::<_, User>(concat!(
            r#"
            INSERT INTO users (username, email, password_hash, first_name, last_name, phone, profile_picture)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING "#,
            user_columns!()
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(&user.profile_picture)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::unique_violation(e, "Username or email is already registered."))?;

        debug!("✅ 用户创建成功: {}", created.id);
        Ok(created)
    }

    async fn get_user_by_id(&self, id: i64) -> DatabaseResult<User> {
        debug!("🔍 根据 ID 获取用户: {}", id);

        sqlx::query_as::<_, User>(concat!("SELECT ", user_columns!(), " FROM users WHERE id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::or_not_found(e, format!("User {id} not found")))
    }

    async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE lower(email) = lower($1) LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> DatabaseResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(concat!("SELECT ", user_columns!(), " FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    /// 更新用户资料
    ///
    /// 与项目更新一样使用 `coalesce`，`None` 会被转换为数据库的null，最终保留原值。
    async fn update_profile(&self, id: i64, update: UserProfileUpdate) -> DatabaseResult<User> {
        debug!("🔄 更新用户 {} 资料: {:#?}", id, update);

        sqlx::query_as::<_, User>(concat!(
            r#"
            UPDATE users
            SET first_name = coalesce($2, first_name),
                last_name = coalesce($3, last_name),
                phone = coalesce($4, phone),
                profile_picture = coalesce($5, profile_picture),
                birthdate = coalesce($6, birthdate),
                facebook_profile = coalesce($7, facebook_profile),
                country = coalesce($8, country)
            WHERE id = $1
            RETURNING "#,
            user_columns!()
        ))
        .bind(id)
        .bind(update.first_name)
        .bind(update.last_name)
        .bind(update.phone)
        .bind(update.profile_picture)
        .bind(update.birthdate)
        .bind(update.facebook_profile)
        .bind(update.country)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::or_not_found(e, format!("User {id} not found")))
    }

    async fn set_staff(&self, id: i64, is_staff: bool) -> DatabaseResult<User> {
        sqlx::query_as::<_, User>(concat!(
            "UPDATE users SET is_staff = $2 WHERE id = $1 RETURNING ",
            user_columns!()
        ))
        .bind(id)
        .bind(is_staff)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DatabaseError::or_not_found(e, format!("User {id} not found")))
    }

    async fn delete_user(&self, id: i64) -> DatabaseResult<User> {
        debug!("🗑️ 删除用户: {}", id);

        sqlx::query_as::<_, User>(concat!("DELETE FROM users WHERE id = $1 RETURNING ", user_columns!()))
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DatabaseError::or_not_found(e, format!("User {id} not found")))
    }
}
