//! Web服务模块
//!
//! 提供众筹平台的 HTTP API 接口和文档服务

use color_eyre::Result;
use database::Repositories;
use services::{
    DiscoveryService, EngagementService, IdentityService, ModerationService, Passwords, ProjectService,
    TaxonomyService,
};
use shared_lib::ModerationPolicy;
use tokio::sync::watch::Receiver;
use tracing::info;

pub mod auth;
pub mod models;
pub mod routes;
pub mod services;
pub mod validation;

/// 应用共享状态
///
/// 所有服务内部都只持有 `Arc`，克隆代价很小
#[derive(Clone)]
pub struct AppState {
    pub identity: IdentityService,
    pub projects: ProjectService,
    pub engagement: EngagementService,
    pub taxonomy: TaxonomyService,
    pub discovery: DiscoveryService,
    pub moderation: ModerationService,
}

impl AppState {
    pub fn new(repos: Repositories, policy: ModerationPolicy) -> Self {
        Self::with_passwords(repos, policy, Passwords::default())
    }

    /// 指定密码哈希参数，测试中使用低成本参数
    pub fn with_passwords(repos: Repositories, policy: ModerationPolicy, passwords: Passwords) -> Self {
        Self {
            identity: IdentityService::new(repos.clone(), passwords),
            projects: ProjectService::new(repos.clone(), policy),
            engagement: EngagementService::new(repos.clone()),
            taxonomy: TaxonomyService::new(repos.clone()),
            discovery: DiscoveryService::new(repos.clone()),
            moderation: ModerationService::new(repos),
        }
    }
}

/// 启动 Web 服务，收到关闭信号后优雅退出
pub async fn start_web_service(state: AppState, bind_addr: &str, mut shutdown_rx: Receiver<bool>) -> Result<()> {
    let router = routes::create_app_router(state);

    info!("🚀 启动 Web Service 在 {}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            // 发送端被丢弃时同样视为关闭
            let _ = shutdown_rx.changed().await;
            info!("🛑 Web Service 正在关闭...");
        })
        .await?;

    Ok(())
}
