//! 相似项目推荐
//!
//! 候选集由仓库提供（active、已审核、同分类或至少共享一个标签），这里只负责打分排序：
//!
//! `score = 2 × 同分类 + 共享标签数`
//!
//! 分数相同时按创建时间倒序，再按 ID 倒序，保证结果稳定。

use crate::models::err::AppError;
use database::models::{Project, ProjectSummary, SimilarCandidate};
use database::Repositories;
use std::cmp::Reverse;
use tracing::debug;

/// 单次请求允许返回的最大数量
pub const MAX_SIMILAR_LIMIT: usize = 20;

fn score(project: &Project, tag_ids: &[i64], candidate: &SimilarCandidate) -> usize {
    let same_category = usize::from(candidate.summary.category_id == project.category_id);
    let shared_tags = candidate.tag_ids.iter().filter(|id| tag_ids.contains(id)).count();
    2 * same_category + shared_tags
}

/// 对候选项目打分排序，`limit` 会被限制在 1..=20
pub fn rank_similar(
    project: &Project,
    tag_ids: &[i64],
    candidates: Vec<SimilarCandidate>,
    limit: usize,
) -> Vec<ProjectSummary> {
    let mut scored: Vec<(usize, ProjectSummary)> = candidates
        .into_iter()
        .filter(|c| c.summary.id != project.id)
        .map(|c| (score(project, tag_ids, &c), c.summary))
        .filter(|(score, _)| *score > 0)
        .collect();

    scored.sort_by_key(|(score, summary)| (Reverse(*score), Reverse(summary.created_at), Reverse(summary.id)));
    scored.truncate(limit.clamp(1, MAX_SIMILAR_LIMIT));
    scored.into_iter().map(|(_, summary)| summary).collect()
}

/// 查询并排序与 `project` 相似的项目
pub async fn similar_projects(
    repos: &Repositories,
    project: &Project,
    limit: usize,
) -> Result<Vec<ProjectSummary>, AppError> {
    debug!("🔗 查询相似项目 {} limit={}", project.id, limit);

    let tag_ids: Vec<i64> = repos.projects.project_tags(project.id).await?.into_iter().map(|t| t.id).collect();
    let candidates = repos.projects.similar_candidates(project, &tag_ids).await?;
    Ok(rank_similar(project, &tag_ids, candidates, limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{active_project, fixture};
    use chrono::{Duration, Utc};
    use database::models::{ProjectStatus, TagCreate};
    use rust_decimal::Decimal;

    fn summary(id: i64, category_id: i64, age_days: i64) -> ProjectSummary {
        let now = Utc::now();
        ProjectSummary {
            id,
            title: format!("project {id}"),
            slug: format!("project-{id}"),
            category_id,
            category_name: "Water".to_string(),
            creator_id: 1,
            creator_username: "creator".to_string(),
            total_target: Decimal::from(1000),
            current_amount: Decimal::ZERO,
            start_date: now,
            end_date: now + Duration::days(30),
            status: ProjectStatus::Active,
            is_featured: false,
            is_approved: true,
            created_at: now - Duration::days(age_days),
            average_rating: 0.0,
            rating_count: 0,
        }
    }

    fn candidate(id: i64, category_id: i64, age_days: i64, tag_ids: Vec<i64>) -> SimilarCandidate {
        SimilarCandidate { summary: summary(id, category_id, age_days), tag_ids }
    }

    fn base_project() -> Project {
        let now = Utc::now();
        Project {
            id: 1,
            title: "Base".to_string(),
            slug: "base".to_string(),
            details: String::new(),
            category_id: 10,
            creator_id: 1,
            total_target: Decimal::from(1000),
            current_amount: Decimal::ZERO,
            start_date: now,
            end_date: now + Duration::days(30),
            status: ProjectStatus::Active,
            is_featured: false,
            is_approved: true,
            approved_at: Some(now),
            approved_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_rank_by_score_then_recency() {
        let project = base_project();
        let tags = [100, 101, 102];
        let candidates = vec![
            // 同分类：2分
            candidate(2, 10, 5, vec![]),
            // 共享3个标签：3分
            candidate(3, 20, 9, vec![100, 101, 102]),
            // 同分类 + 1个标签：3分，但更新
            candidate(4, 10, 1, vec![100]),
            // 共享1个标签：1分
            candidate(5, 20, 0, vec![101]),
        ];

        let ranked: Vec<i64> = rank_similar(&project, &tags, candidates, 4).into_iter().map(|s| s.id).collect();
        assert_eq!(ranked, vec![4, 3, 2, 5]);
    }

    #[test]
    fn test_rank_ties_broken_by_id_and_limit_clamped() {
        let project = base_project();
        let mut candidates: Vec<SimilarCandidate> = (2..40).map(|id| candidate(id, 10, 3, vec![])).collect();
        // 创建时间完全相同时按ID倒序
        let same_time = candidates[0].summary.created_at;
        for c in candidates.iter_mut() {
            c.summary.created_at = same_time;
        }

        let ranked = rank_similar(&project, &[], candidates.clone(), 100);
        assert_eq!(ranked.len(), MAX_SIMILAR_LIMIT);
        assert_eq!(ranked[0].id, 39);
        assert_eq!(ranked[1].id, 38);

        assert_eq!(rank_similar(&project, &[], candidates, 0).len(), 1);
    }

    #[test]
    fn test_self_and_unrelated_excluded() {
        let project = base_project();
        let candidates = vec![candidate(1, 10, 0, vec![]), candidate(7, 99, 0, vec![500])];
        assert!(rank_similar(&project, &[100], candidates, 4).is_empty());
    }

    #[tokio::test]
    async fn test_similar_projects_from_store() {
        let f = fixture().await;
        let solar = f
            .repos
            .taxonomy
            .create_tag(TagCreate { name: "solar".to_string(), color: "#6c757d".to_string() })
            .await
            .unwrap();

        let base = active_project(&f, "base-project", 1000, vec![solar.id]).await;
        let sibling = active_project(&f, "sibling-project", 1000, vec![solar.id]).await;
        let plain = active_project(&f, "plain-project", 1000, vec![]).await;

        let similar = similar_projects(&f.repos, &base, 4).await.unwrap();
        let ids: Vec<i64> = similar.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![sibling.id, plain.id]);
    }
}
