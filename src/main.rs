//! 众筹平台后端入口
//!
//! 启动流程：
//! 1. 读取环境变量配置并初始化日志
//! 2. 初始化数据库连接池并执行迁移
//! 3. 启动 Web 服务，配置了结算 cron 时同时启动定时任务
//! 4. 收到 Ctrl+C 后通知所有服务优雅退出

use color_eyre::Result;
use database::{initialize_database, Repositories};
use shared_lib::AppConfig;
use tokio::sync::watch;
use tracing::{info, warn};
use web_service::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let config = AppConfig::load()?;

    tracing_subscriber::fmt().with_max_level(config.log_level).init();
    info!("🚀 启动众筹平台后端，审核策略: {:?}", config.moderation_policy);

    let pool = initialize_database(&config.database).await?;
    let repos = Repositories::postgres(pool);
    let state = AppState::new(repos.clone(), config.moderation_policy);

    if let Some(email) = &config.bootstrap_staff_email {
        if let Some(user) = state.identity.promote_staff(email).await? {
            info!("👑 管理员账号: {} ({})", user.username, user.id);
        }
    }

    // 关闭信号，所有服务共享同一个接收端
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("📴 收到 Ctrl+C，开始关闭服务..."),
            Err(e) => warn!("⚠️ 监听关闭信号失败: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    let web = web_service::start_web_service(state, &config.bind_addr, shutdown_rx.clone());
    match config.settlement_cron.as_deref() {
        Some(cron_expr) => {
            let cron = cronjob_service::start_settlement_cron(repos, cron_expr, shutdown_rx);
            tokio::try_join!(web, cron)?;
        }
        None => {
            info!("⏸️ 未配置 SETTLEMENT_CRON，不启动结算任务");
            web.await?;
        }
    }

    info!("✅ 所有服务已停止");
    Ok(())
}
