//! 众筹活动结算
//!
//! 检查所有 active 项目：
//! - 已筹金额达到目标的标记为 funded
//! - 已到结束时间但未达标的标记为 completed
//!
//! 状态切换由仓库层的条件更新完成，多个实例同时执行也不会重复结算。

use chrono::{DateTime, Utc};
use database::models::{ProjectStatus, SettledProject};
use database::{DatabaseResult, Repositories};
use tracing::{debug, info, instrument};

/// 执行一次结算，由外部 cron 调度器调用
#[instrument(skip(repos))]
pub async fn execute_settlement_once(repos: &Repositories, now: DateTime<Utc>) -> DatabaseResult<Vec<SettledProject>> {
    debug!("🔄 执行活动结算检查");

    let settled = repos.projects.settle_campaigns(now).await?;
    if settled.is_empty() {
        debug!("📭 没有需要结算的项目");
        return Ok(settled);
    }

    let funded = settled.iter().filter(|s| s.status == ProjectStatus::Funded).count();
    info!("✅ 结算完成: {} 个项目达成目标, {} 个项目已结束", funded, settled.len() - funded);
    for project in &settled {
        debug!("📌 {} -> {:?}", project.slug, project.status);
    }
    Ok(settled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use database::models::{Approval, CategoryCreate, ProjectCreate, UserCreate};
    use database::MemoryStore;
    use rust_decimal::Decimal;

    async fn project(repos: &Repositories, slug: &str, end_in_days: i64, creator_id: i64, category_id: i64) -> i64 {
        let now = Utc::now();
        repos
            .projects
            .create_project(ProjectCreate {
                title: slug.to_string(),
                slug: slug.to_string(),
                details: "details".to_string(),
                category_id,
                creator_id,
                tag_ids: vec![],
                total_target: Decimal::from(1000),
                start_date: now - Duration::days(10),
                end_date: now + Duration::days(end_in_days),
                status: ProjectStatus::Active,
                approval: Some(Approval { approved_by: None, approved_at: now }),
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_settlement_marks_expired_campaigns() {
        let repos = Repositories::in_memory(MemoryStore::new());
        let user = repos
            .users
            .create_user(UserCreate {
                username: "creator".to_string(),
                email: "creator@example.com".to_string(),
                password_hash: "hash".to_string(),
                first_name: "Creator".to_string(),
                last_name: "Tester".to_string(),
                phone: "01012345678".to_string(),
                profile_picture: None,
            })
            .await
            .unwrap();
        let category = repos
            .taxonomy
            .create_category(CategoryCreate {
                name: "Water".to_string(),
                description: String::new(),
                icon: String::new(),
                color: "#667eea".to_string(),
            })
            .await
            .unwrap();

        let expired = project(&repos, "expired", -1, user.id, category.id).await;
        let running = project(&repos, "running", 10, user.id, category.id).await;

        let settled = execute_settlement_once(&repos, Utc::now()).await.unwrap();
        assert_eq!(settled.len(), 1);
        assert_eq!(settled[0].id, expired);
        assert_eq!(settled[0].status, ProjectStatus::Completed);

        // 再次执行不会重复结算
        assert!(execute_settlement_once(&repos, Utc::now()).await.unwrap().is_empty());
        let still_running = repos.projects.get_project_by_id(running).await.unwrap();
        assert_eq!(still_running.status, ProjectStatus::Active);
    }
}
