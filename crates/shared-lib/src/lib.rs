//! 🔧 共享库模块
//!
//! 这个模块包含了在多个服务之间共享的通用代码，包括：
//! - 程序配置（环境变量加载）
//! - 项目审核策略
//! - 业务常量（金额下限、活动时长、分页大小等）

pub mod models;

// 重新导出常用类型
pub use models::{
    AppConfig, DatabaseConfig, ModerationPolicy,
    // 业务常量
    CANCELLABLE_PROGRESS_PERCENT, DEFAULT_PAGE_SIZE, MAX_CAMPAIGN_DAYS, MIN_CAMPAIGN_DAYS, MIN_DONATION_AMOUNT,
    MIN_TARGET_AMOUNT,
};
