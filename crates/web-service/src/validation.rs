//! 自定义校验规则
//!
//! - `validate_*` 函数供 `#[validate(custom(function = ...))]` 使用
//! - `check_*` 函数依赖当前时间或多个字段，由服务层显式调用，`now` 由调用方传入

use chrono::{DateTime, Duration, NaiveDate, Utc};
use database::models::user::age_between;
use rust_decimal::Decimal;
use shared_lib::models::limits::MONEY_DECIMAL_PLACES;
use shared_lib::{MAX_CAMPAIGN_DAYS, MIN_CAMPAIGN_DAYS, MIN_DONATION_AMOUNT, MIN_TARGET_AMOUNT};
use std::borrow::Cow;
use validator::{ValidationError, ValidationErrors};

/// 带提示信息的校验错误
pub fn rule(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

/// 埃及手机号：`01` 开头，第三位为 0/1/2/5，共11位数字
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let bytes = phone.as_bytes();
    let valid = bytes.len() == 11
        && bytes.iter().all(u8::is_ascii_digit)
        && bytes.starts_with(b"01")
        && matches!(bytes[2], b'0' | b'1' | b'2' | b'5');
    if valid {
        Ok(())
    } else {
        Err(rule("phone", "Enter a valid Egyptian phone number."))
    }
}

/// 用户名只允许字母、数字和 `.` `+` `-` `_`，不允许 `@`，以便登录时区分邮箱
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    if !username.is_empty() && username.chars().all(|c| c.is_alphanumeric() || matches!(c, '.' | '+' | '-' | '_')) {
        Ok(())
    } else {
        Err(rule("username", "Enter a valid username. Letters, digits and ./+/-/_ only."))
    }
}

/// `#RRGGBB` 格式的颜色值
pub fn validate_color(color: &str) -> Result<(), ValidationError> {
    let valid = color.len() == 7 && color.starts_with('#') && color[1..].chars().all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(rule("color", "Enter a hex color such as #667eea."))
    }
}

pub fn validate_facebook_profile(url: &str) -> Result<(), ValidationError> {
    if url.contains("facebook.com") {
        Ok(())
    } else {
        Err(rule("facebook_profile", "Enter a valid Facebook profile URL."))
    }
}

fn has_money_scale(amount: &Decimal) -> bool {
    amount.normalize().scale() <= MONEY_DECIMAL_PLACES
}

pub fn validate_target_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount < Decimal::from(MIN_TARGET_AMOUNT) {
        return Err(rule("min_target", "Target amount must be at least 1000."));
    }
    if !has_money_scale(amount) {
        return Err(rule("decimal_places", "Ensure that there are no more than 2 decimal places."));
    }
    Ok(())
}

pub fn validate_donation_amount(amount: &Decimal) -> Result<(), ValidationError> {
    if *amount < Decimal::from(MIN_DONATION_AMOUNT) {
        return Err(rule("min_donation", "Donation amount must be at least 10."));
    }
    if !has_money_scale(amount) {
        return Err(rule("decimal_places", "Ensure that there are no more than 2 decimal places."));
    }
    Ok(())
}

pub fn validate_non_negative(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        Err(rule("negative", "Amount must not be negative."))
    } else {
        Ok(())
    }
}

/// 去除首尾空白后检查字符数，返回去除空白后的文本
pub fn check_trimmed_length(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> String {
    let trimmed = value.trim();
    let count = trimmed.chars().count();
    if count < min {
        errors.add(field, rule("length", "Ensure this field has enough characters."));
    } else if count > max {
        errors.add(field, rule("length", "Ensure this field does not have too many characters."));
    }
    trimmed.to_string()
}

/// 众筹活动时间：开始时间晚于当前时间，结束时间晚于开始时间，持续1到365天
pub fn check_campaign_dates(
    errors: &mut ValidationErrors,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    now: DateTime<Utc>,
    start_changed: bool,
) {
    if start_changed && start <= now {
        errors.add("start_date", rule("future", "Start date must be in the future."));
    }
    if end <= start {
        errors.add("end_date", rule("after_start", "End date must be after start date."));
        return;
    }
    let duration = end - start;
    if duration < Duration::days(MIN_CAMPAIGN_DAYS) {
        errors.add("end_date", rule("min_duration", "Campaign must run for at least 1 day."));
    } else if duration > Duration::days(MAX_CAMPAIGN_DAYS) {
        errors.add("end_date", rule("max_duration", "Campaign cannot run for more than 365 days."));
    }
}

/// 出生日期不能晚于今天，且年龄不小于13岁
pub fn check_birthdate(errors: &mut ValidationErrors, birthdate: NaiveDate, today: NaiveDate) {
    if birthdate > today {
        errors.add("birthdate", rule("future", "Birth date cannot be in the future."));
    } else if age_between(birthdate, today) < shared_lib::models::limits::MIN_USER_AGE {
        errors.add("birthdate", rule("min_age", "You must be at least 13 years old."));
    }
}

/// 将累积的错误转换为 `Result`
pub fn into_result(errors: ValidationErrors) -> Result<(), ValidationErrors> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("01012345678").is_ok());
        assert!(validate_phone("01512345678").is_ok());
        assert!(validate_phone("01312345678").is_err());
        assert!(validate_phone("0101234567").is_err());
        assert!(validate_phone("0101234567a").is_err());
        assert!(validate_phone("+201012345678").is_err());
    }

    #[test]
    fn test_username_and_color() {
        assert!(validate_username("mona.adel_1").is_ok());
        assert!(validate_username("mona@adel").is_err());
        assert!(validate_username("").is_err());
        assert!(validate_color("#667eea").is_ok());
        assert!(validate_color("667eea").is_err());
        assert!(validate_color("#66ze11").is_err());
    }

    #[test]
    fn test_money_rules() {
        assert!(validate_target_amount(&Decimal::from(1000)).is_ok());
        assert!(validate_target_amount(&Decimal::new(99999, 2)).is_err());
        assert!(validate_target_amount(&Decimal::new(1000001, 3)).is_err());
        // 尾随0不算额外的小数位
        assert!(validate_target_amount(&Decimal::new(1000500, 3)).is_ok());

        assert!(validate_donation_amount(&Decimal::from(10)).is_ok());
        assert!(validate_donation_amount(&Decimal::new(999, 2)).is_err());
        assert!(validate_donation_amount(&Decimal::new(10505, 3)).is_err());
    }

    #[test]
    fn test_campaign_dates() {
        let now = Utc::now();
        let mut errors = ValidationErrors::new();
        check_campaign_dates(&mut errors, now + Duration::days(1), now + Duration::days(31), now, true);
        assert!(errors.is_empty());

        let mut errors = ValidationErrors::new();
        check_campaign_dates(&mut errors, now - Duration::hours(1), now + Duration::days(10), now, true);
        assert!(errors.field_errors().contains_key("start_date"));

        // 未修改的开始时间不要求在未来
        let mut errors = ValidationErrors::new();
        check_campaign_dates(&mut errors, now - Duration::hours(1), now + Duration::days(10), now, false);
        assert!(errors.is_empty());

        let mut errors = ValidationErrors::new();
        check_campaign_dates(&mut errors, now + Duration::days(2), now + Duration::days(1), now, true);
        assert!(errors.field_errors().contains_key("end_date"));

        let mut errors = ValidationErrors::new();
        check_campaign_dates(&mut errors, now + Duration::days(1), now + Duration::days(1) + Duration::hours(5), now, true);
        assert!(errors.field_errors().contains_key("end_date"));

        let mut errors = ValidationErrors::new();
        check_campaign_dates(&mut errors, now + Duration::days(1), now + Duration::days(367), now, true);
        assert!(errors.field_errors().contains_key("end_date"));
    }

    #[test]
    fn test_birthdate() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let mut errors = ValidationErrors::new();
        check_birthdate(&mut errors, NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(), today);
        assert!(errors.is_empty());

        let mut errors = ValidationErrors::new();
        check_birthdate(&mut errors, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(), today);
        assert!(errors.field_errors().contains_key("birthdate"));

        let mut errors = ValidationErrors::new();
        check_birthdate(&mut errors, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(), today);
        assert!(errors.field_errors().contains_key("birthdate"));
    }

    #[test]
    fn test_trimmed_length() {
        let mut errors = ValidationErrors::new();
        let text = check_trimmed_length(&mut errors, "content", "   hi   ", 3, 1000);
        assert_eq!(text, "hi");
        assert!(errors.field_errors().contains_key("content"));

        let mut errors = ValidationErrors::new();
        assert_eq!(check_trimmed_length(&mut errors, "content", " ok ", 2, 500), "ok");
        assert!(errors.is_empty());
    }
}
