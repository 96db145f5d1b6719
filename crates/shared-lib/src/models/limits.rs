//! 业务常量定义模块
//!
//! 统一管理众筹平台的业务规则常量，
//! 确保 web 服务、数据库仓库和定时任务使用同一套数值。

/// 项目目标金额下限（货币单位，EGP）
pub const MIN_TARGET_AMOUNT: i64 = 1000;

/// 单笔捐款金额下限（货币单位，EGP）
pub const MIN_DONATION_AMOUNT: i64 = 10;

/// 金额允许的小数位数
pub const MONEY_DECIMAL_PLACES: u32 = 2;

/// 众筹活动最短持续天数
pub const MIN_CAMPAIGN_DAYS: i64 = 1;

/// 众筹活动最长持续天数
pub const MAX_CAMPAIGN_DAYS: i64 = 365;

/// 可取消项目的筹款进度上限（百分比，不含）
///
/// 进度低于此值且处于 active 状态的项目才允许创建者取消
pub const CANCELLABLE_PROGRESS_PERCENT: i64 = 25;

/// 列表页默认分页大小
pub const DEFAULT_PAGE_SIZE: u32 = 12;

/// 相似项目默认返回数量
pub const DEFAULT_SIMILAR_LIMIT: u32 = 4;

/// 注册用户最小年龄
pub const MIN_USER_AGE: i64 = 13;

/// 首页“趋势”与“即将结束”统计窗口（天）
pub const HOMEPAGE_WINDOW_DAYS: i64 = 7;
