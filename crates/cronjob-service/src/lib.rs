//! 定时任务服务
//!
//! 目前只有一个任务：按 cron 表达式周期性结算到期或达标的众筹项目。

use chrono::Utc;
use color_eyre::Result;
use database::Repositories;
use tokio::sync::watch::Receiver;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

pub mod jobs;

/// 启动定时任务，直到收到关闭信号
///
/// `cron_expr` 使用带秒的6段格式，例如 `0 */5 * * * *` 表示每5分钟执行一次
pub async fn start_settlement_cron(repos: Repositories, cron_expr: &str, shutdown_rx: Receiver<bool>) -> Result<()> {
    info!("🕐 启动定时任务调度器...");

    // 创建 cron 调度器
    let mut sched = JobScheduler::new().await?;

    let settlement_job = Job::new_async(cron_expr, move |_uuid, _l| {
        let repos = repos.clone();
        Box::pin(async move {
            if let Err(e) = jobs::settlement::execute_settlement_once(&repos, Utc::now()).await {
                error!("❌ 活动结算任务执行失败: {}", e);
            }
        })
    })?;

    // 添加任务到调度器
    sched.add(settlement_job).await?;

    // 启动调度器（非阻塞）
    sched.start().await?;
    info!("✅ 定时任务调度器已启动，结算任务计划: {}", cron_expr);

    // 等待关闭信号（这里才真正阻塞等待）
    wait_for_shutdown(shutdown_rx).await;

    info!("📴 收到关闭信号，停止定时任务调度器...");
    sched.shutdown().await?;
    info!("✅ 定时任务调度器已停止");

    Ok(())
}

/// 等待关闭信号
async fn wait_for_shutdown(mut shutdown_rx: Receiver<bool>) {
    // 如果已经是 true，直接返回
    if *shutdown_rx.borrow() {
        return;
    }

    // 等待信号变化
    let _ = shutdown_rx.changed().await;
}
