//! 定时任务列表

pub mod settlement;
