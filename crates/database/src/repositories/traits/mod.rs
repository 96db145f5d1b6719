//! 数据库仓库 trait 定义
//!
//! 这里定义了各种数据库仓库的抽象接口
//!
//! ## Repository Trait 设计模式 🎯
//!
//! 所有 Repository trait 都遵循统一的约束：
//!
//! ```rust,ignore
//! #[async_trait::async_trait]
//! pub trait XxxRepositoryTrait: Send + Sync + 'static {
//!     // 异步方法定义...
//! }
//! ```
//!
//! ### 为什么使用 trait object 📚
//!
//! 上层服务通过 `Arc<dyn XxxRepositoryTrait>` 持有仓库：
//!
//! - `utoipa_axum::routes!` 需要具体的 handler 函数，泛型 handler 无法注册，
//!   因此 `AppState` 不能携带仓库类型参数
//! - 同一套服务代码可以切换到 PostgreSQL 实现或内存实现（`memory` feature）
//! - `#[async_trait]` 生成的方法返回 `Pin<Box<dyn Future + Send>>`，trait 保持对象安全
//!
//! #### `Send + Sync + 'static` ⏰
//! - 仓库实例在多个请求、多个线程之间共享
//! - `Arc<dyn Trait>` 需要在 `tokio::spawn` 的任务中使用
//!
//! ### 实际应用场景 💡
//!
//! ```rust,ignore
//! let repositories = Repositories::postgres(pool.clone());
//! let project = repositories.projects.get_project_by_slug("solar-pumps-0a1b2c3d").await?;
//!
//! // 并发访问场景 (Send + Sync)
//! let handles: Vec<_> = (0..10).map(|_| {
//!     let repo = Arc::clone(&repositories.engagement);
//!     tokio::spawn(async move { repo.rating_summary(project.id).await })
//! }).collect();
//! ```
//!
//! ### 约定 ✅
//!
//! 1. **错误处理**：统一返回 `DatabaseResult<T>`，唯一约束冲突转换为 `Conflict`，记录不存在为 `NotFound`
//! 2. **条件更新**：状态相关的写操作把前置条件写进 `WHERE`，不在应用层先读后写
//! 3. **事务**：涉及多表的写操作（捐款、图片主图、项目标签）在同一事务中完成

pub mod engagement;
pub mod project;
pub mod report;
pub mod taxonomy;
pub mod user;

// 重新导出
pub use engagement::EngagementRepositoryTrait;
pub use project::ProjectRepositoryTrait;
pub use report::ReportRepositoryTrait;
pub use taxonomy::TaxonomyRepositoryTrait;
pub use user::UserRepositoryTrait;
