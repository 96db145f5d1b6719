//! 数据库仓库模块
//!
//! 这里定义数据库操作的Repository层

pub mod engagement;
#[cfg(feature = "memory")]
pub mod memory;
pub mod project;
pub mod report;
pub mod taxonomy;
pub mod traits;
pub mod user;

use sqlx::PgPool;
use std::sync::Arc;

// 重新导出具体的类型
pub use engagement::EngagementRepository;
pub use project::ProjectRepository;
pub use report::ReportRepository;
pub use taxonomy::TaxonomyRepository;
pub use traits::{
    EngagementRepositoryTrait, ProjectRepositoryTrait, ReportRepositoryTrait, TaxonomyRepositoryTrait,
    UserRepositoryTrait,
};
pub use user::UserRepository;

/// 全部仓库的集合
///
/// 克隆只会增加 `Arc` 引用计数，可以直接放进 axum 的共享状态。
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepositoryTrait>,
    pub taxonomy: Arc<dyn TaxonomyRepositoryTrait>,
    pub projects: Arc<dyn ProjectRepositoryTrait>,
    pub engagement: Arc<dyn EngagementRepositoryTrait>,
    pub reports: Arc<dyn ReportRepositoryTrait>,
}

impl Repositories {
    /// 基于 PostgreSQL 连接池创建全部仓库
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            users: Arc::new(UserRepository::new(pool.clone())),
            taxonomy: Arc::new(TaxonomyRepository::new(pool.clone())),
            projects: Arc::new(ProjectRepository::new(pool.clone())),
            engagement: Arc::new(EngagementRepository::new(pool.clone())),
            reports: Arc::new(ReportRepository::new(pool)),
        }
    }

    /// 基于内存存储创建全部仓库，所有仓库共享同一份数据
    #[cfg(feature = "memory")]
    pub fn in_memory(store: memory::MemoryStore) -> Self {
        Self {
            users: Arc::new(store.clone()),
            taxonomy: Arc::new(store.clone()),
            projects: Arc::new(store.clone()),
            engagement: Arc::new(store.clone()),
            reports: Arc::new(store),
        }
    }
}

impl std::fmt::Debug for Repositories {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repositories").finish_non_exhaustive()
    }
}
