use color_eyre::eyre::{eyre, Context};
use color_eyre::{Help, Result};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// 项目审核策略
///
/// 决定新建项目的初始状态：
/// - `AutoApprove`: 创建即上线（active + 已审核），当前部署使用此策略
/// - `RequireModeration`: 创建后进入 draft/pending，等待管理员审核
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModerationPolicy {
    #[default]
    AutoApprove,
    RequireModeration,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("未知的审核策略: {0}（可选值: auto-approve, require-moderation）")]
pub struct ParsePolicyError(String);

impl FromStr for ModerationPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto-approve" | "auto_approve" => Ok(Self::AutoApprove),
            "require-moderation" | "require_moderation" => Ok(Self::RequireModeration),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}

/// 数据库连接池配置
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// postgresql数据库链接字符串
    pub postgresql_conn_str: String,

    /// 连接池最少保留的连接数
    /// 可通过环境变量 `DB_MIN_CONNECTIONS` 来调整
    pub min_connections: u32,

    /// 连接池最大连接数，生产环境配置30~40即可
    /// 可通过环境变量 `DB_MAX_CONNECTIONS` 来调整
    pub max_connections: u32,
}

/// 程序配置
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// 数据库配置
    pub database: DatabaseConfig,

    /// Web服务监听地址
    pub bind_addr: String,

    /// 新建项目的审核策略
    pub moderation_policy: ModerationPolicy,

    /// 结算定时任务的cron表达式，未设置时不启动结算任务
    pub settlement_cron: Option<String>,

    /// 启动时提升为管理员的用户邮箱
    pub bootstrap_staff_email: Option<String>,

    /// 日志级别
    pub log_level: tracing::Level,
}

impl AppConfig {
    pub fn load() -> Result<Arc<AppConfig>> {
        // 加载.env文件中的数据注入到环境变量中，方便本地测试
        // 线上环境部署时会直接使用环境变量，不需要.env文件
        let _ = dotenvy::dotenv();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        Ok(Arc::new(config))
    }

    /// 从任意键值来源构建配置
    ///
    /// `lookup` 返回 `None` 表示该变量未设置，空字符串同样视为未设置。
    pub fn from_lookup<F>(lookup: F) -> Result<AppConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        // 读取数据库地址信息（仅支持postgresql）
        let db_url = get("DATABASE_URL")
            .ok_or_else(|| eyre!("Can not load DATABASE_URL in environment"))
            .suggestion("设置 DATABASE_URL 环境变量")?;

        let min_connections = parse_or("DB_MIN_CONNECTIONS", get("DB_MIN_CONNECTIONS"), 10u32)?;
        let max_connections = parse_or("DB_MAX_CONNECTIONS", get("DB_MAX_CONNECTIONS"), 40u32)?;
        if min_connections > max_connections {
            return Err(eyre!(
                "DB_MIN_CONNECTIONS ({min_connections}) 不能大于 DB_MAX_CONNECTIONS ({max_connections})"
            ));
        }

        let moderation_policy = match get("MODERATION_POLICY") {
            Some(v) => v
                .parse::<ModerationPolicy>()
                .context("Can not parse MODERATION_POLICY")
                .suggestion("使用 auto-approve 或 require-moderation")?,
            None => ModerationPolicy::default(),
        };

        let log_level = match get("LOG_LEVEL") {
            Some(v) => v
                .parse::<tracing::Level>()
                .map_err(|e| eyre!("Can not parse LOG_LEVEL `{v}`: {e}"))?,
            None => tracing::Level::INFO,
        };

        Ok(AppConfig {
            database: DatabaseConfig {
                postgresql_conn_str: db_url,
                min_connections,
                max_connections,
            },
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8080".to_string()),
            moderation_policy,
            settlement_cron: get("SETTLEMENT_CRON"),
            bootstrap_staff_email: get("BOOTSTRAP_STAFF_EMAIL"),
            log_level,
        })
    }
}

fn parse_or<T>(key: &str, value: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => v.parse::<T>().map_err(|e| eyre!("Can not parse {key} `{v}`: {e}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/crowdfund")])).unwrap();

        assert_eq!(config.database.postgresql_conn_str, "postgres://localhost/crowdfund");
        assert_eq!(config.database.min_connections, 10);
        assert_eq!(config.database.max_connections, 40);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.moderation_policy, ModerationPolicy::AutoApprove);
        assert!(config.settlement_cron.is_none());
        assert_eq!(config.log_level, tracing::Level::INFO);
    }

    #[test]
    fn test_missing_database_url() {
        assert!(AppConfig::from_lookup(lookup_from(&[])).is_err());
        // 空字符串视为未设置
        assert!(AppConfig::from_lookup(lookup_from(&[("DATABASE_URL", "  ")])).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://db/crowdfund"),
            ("DB_MIN_CONNECTIONS", "2"),
            ("DB_MAX_CONNECTIONS", "8"),
            ("MODERATION_POLICY", "require-moderation"),
            ("SETTLEMENT_CRON", "0 */5 * * * *"),
            ("LOG_LEVEL", "debug"),
        ]))
        .unwrap();

        assert_eq!(config.database.min_connections, 2);
        assert_eq!(config.database.max_connections, 8);
        assert_eq!(config.moderation_policy, ModerationPolicy::RequireModeration);
        assert_eq!(config.settlement_cron.as_deref(), Some("0 */5 * * * *"));
        assert_eq!(config.log_level, tracing::Level::DEBUG);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = ("DATABASE_URL", "postgres://db/crowdfund");
        assert!(AppConfig::from_lookup(lookup_from(&[base, ("DB_MAX_CONNECTIONS", "many")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[base, ("MODERATION_POLICY", "yolo")])).is_err());
        assert!(AppConfig::from_lookup(lookup_from(&[
            base,
            ("DB_MIN_CONNECTIONS", "50"),
            ("DB_MAX_CONNECTIONS", "5")
        ]))
        .is_err());
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!("Auto-Approve".parse::<ModerationPolicy>(), Ok(ModerationPolicy::AutoApprove));
        assert_eq!("require_moderation".parse::<ModerationPolicy>(), Ok(ModerationPolicy::RequireModeration));
        assert!("manual".parse::<ModerationPolicy>().is_err());
    }
}
