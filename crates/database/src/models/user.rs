//! 用户数据库模型

use chrono::{DateTime, NaiveDate, Utc};

/// 用户信息结构体
///
/// 邮箱是主要登录凭证，用户名同样唯一，也可用于登录
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub profile_picture: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub facebook_profile: Option<String>,
    pub country: Option<String>,
    pub is_staff: bool,
    pub is_active: bool,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }

    /// 根据生日计算年龄（整年，按365天折算），未填写生日时返回 `None`
    pub fn age_on(&self, today: NaiveDate) -> Option<i64> {
        self.birthdate.map(|birthdate| age_between(birthdate, today))
    }
}

/// 按 365 天一年折算的整岁数
pub fn age_between(birthdate: NaiveDate, today: NaiveDate) -> i64 {
    (today - birthdate).num_days().div_euclid(365)
}

/// 用户创建参数，密码已经完成哈希
#[derive(Debug, Clone)]
pub struct UserCreate {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub profile_picture: Option<String>,
}

/// 用户资料更新参数
///
/// 所有字段都是可选的，`None` 表示保持原值。邮箱不允许修改。
#[derive(Debug, Clone, Default)]
pub struct UserProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub profile_picture: Option<String>,
    pub birthdate: Option<NaiveDate>,
    pub facebook_profile: Option<String>,
    pub country: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_between() {
        let birthdate = NaiveDate::from_ymd_opt(2000, 6, 15).unwrap();
        assert_eq!(age_between(birthdate, NaiveDate::from_ymd_opt(2013, 6, 20).unwrap()), 13);
        assert_eq!(age_between(birthdate, NaiveDate::from_ymd_opt(2000, 6, 15).unwrap()), 0);
        assert_eq!(age_between(birthdate, NaiveDate::from_ymd_opt(2001, 6, 14).unwrap()), 0);
        assert_eq!(age_between(birthdate, NaiveDate::from_ymd_opt(2001, 6, 15).unwrap()), 1);
    }
}
