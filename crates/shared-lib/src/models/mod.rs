pub mod config;
pub mod limits;

// 重新导出具体的类型
pub use config::{AppConfig, DatabaseConfig, ModerationPolicy};
pub use limits::*;
