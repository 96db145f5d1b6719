//! HTTP Basic 认证
//!
//! 两个提取器：
//! - [`CurrentUser`]：必须登录，缺少或错误的认证信息返回 401
//! - [`MaybeUser`]：可选登录，没有 `Authorization` 请求头时为匿名访问，
//!   提供了认证信息但不正确时同样返回 401
//!
//! 登录名包含 `@` 时按邮箱匹配，否则按用户名匹配。

use crate::models::err::AppError;
use crate::AppState;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use database::models::User;
use tracing::debug;

/// 已登录用户
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// 可能已登录的用户
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

/// 解析 `Authorization: Basic base64(login:password)`，没有该请求头时返回 `None`
fn basic_credentials(headers: &HeaderMap) -> Result<Option<(String, String)>, AppError> {
    let Some(value) = headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    let value = value.to_str().map_err(|_| AppError::Unauthorized)?;
    let (scheme, encoded) = value.split_once(' ').ok_or(AppError::Unauthorized)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AppError::Unauthorized);
    }

    let decoded = STANDARD.decode(encoded.trim()).map_err(|_| AppError::Unauthorized)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AppError::Unauthorized)?;
    // 密码中允许出现 `:`，只按第一个分隔
    let (login, password) = decoded.split_once(':').ok_or(AppError::Unauthorized)?;
    Ok(Some((login.to_string(), password.to_string())))
}

async fn authenticate(parts: &Parts, state: &AppState) -> Result<Option<User>, AppError> {
    let Some((login, password)) = basic_credentials(&parts.headers)? else {
        return Ok(None);
    };

    match state.identity.authenticate(&login, &password).await? {
        Some(user) => Ok(Some(user)),
        None => {
            debug!("🔒 认证失败: {}", login);
            Err(AppError::Unauthorized)
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(parts, state).await?.map(CurrentUser).ok_or(AppError::Unauthorized)
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(authenticate(parts, state).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_basic_credentials() {
        assert!(basic_credentials(&HeaderMap::new()).unwrap().is_none());

        let encoded = STANDARD.encode("donor@example.com:pass:word");
        let (login, password) = basic_credentials(&headers(&format!("Basic {encoded}"))).unwrap().unwrap();
        assert_eq!(login, "donor@example.com");
        assert_eq!(password, "pass:word");

        assert!(basic_credentials(&headers("Bearer abc")).is_err());
        assert!(basic_credentials(&headers("Basic !!!")).is_err());
        let no_colon = STANDARD.encode("donor");
        assert!(basic_credentials(&headers(&format!("Basic {no_colon}"))).is_err());
    }
}
