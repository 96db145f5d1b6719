//! 路由入口
//!
//! 提供 [`create_app_router`] 函数，导出当前App的所有路由。
//!
//! 用户可以在导出路由时传入共享数据 shared_state，这样所有路由函数都可以访问。

use crate::models::common::{PageQuery, ReplyList};
use crate::models::projects::ProjectCard;
use crate::AppState;
use axum::Router;
use chrono::Utc;
use database::models::ProjectSearchResult;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::openapi::Components;
use utoipa::{Modify, OpenApi};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_scalar::{Scalar, Servable};

pub mod discovery;
pub mod engagement;
pub mod moderation;
pub mod projects;
pub mod taxonomy;
pub mod users;

// routes! 宏需要同时引用 handler 和 utoipa 生成的 `__path_*` 结构体
use discovery::*;
use engagement::*;
use moderation::*;
use projects::*;
use taxonomy::*;
use users::*;

/// 项目列表分页返回
pub(crate) fn project_page(result: ProjectSearchResult, page: PageQuery) -> ReplyList<ProjectCard> {
    let now = Utc::now();
    let cards = result.projects.into_iter().map(|s| ProjectCard::from_summary(s, now)).collect();
    ReplyList::new(cards, result.total, page)
}

/// 导出当前App的所有路由
///
/// ## 参数定义
/// - state: 共享数据，参考 [`AppState`] 定义。存放各个业务服务。
///
/// ## **❗️注意事项：**
///
/// 由于 [`routes!`] 宏限制，在同一个宏里面不能同时定义多个相同类型的http接口。
/// 不能这样定义：
///
/// ```ignore
/// routes!(get, get, post)
/// ```
///
/// 这样会导致Panic
///
/// 需要拆开定义，同一个宏里面只放同一个路径的不同方法
///
/// ```ignore
/// routes!(get, post)
/// .routes!(get)
/// ```
///
fn routers(state: AppState) -> OpenApiRouter {
    OpenApiRouter::new()
        // 发现
        .routes(routes!(find_projects))
        .routes(routes!(homepage))
        // 项目
        .routes(routes!(create_project))
        .routes(routes!(get_project, update_project))
        .routes(routes!(submit_project))
        .routes(routes!(approve_project))
        .routes(routes!(cancel_project))
        .routes(routes!(feature_project))
        .routes(routes!(mark_project_status))
        .routes(routes!(list_images, add_image))
        .routes(routes!(similar_projects))
        .routes(routes!(settle_projects))
        // 互动
        .routes(routes!(list_donations, donate))
        .routes(routes!(rate_project))
        .routes(routes!(list_comments, add_comment))
        .routes(routes!(list_replies, add_reply))
        // 分类与标签
        .routes(routes!(list_categories, create_category))
        .routes(routes!(category_explore))
        .routes(routes!(category_projects))
        .routes(routes!(popular_tags, create_tag))
        .routes(routes!(tag_projects))
        // 用户
        .routes(routes!(register))
        .routes(routes!(user_projects))
        .routes(routes!(get_profile, update_profile, delete_account))
        .routes(routes!(my_donations))
        // 举报
        .routes(routes!(report_project))
        .routes(routes!(report_comment))
        .routes(routes!(list_reports))
        .routes(routes!(resolve_report))
        .with_state(state)
}

/// 在文档中声明 Basic 认证方式
struct BasicAuthAddon;

impl Modify for BasicAuthAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Components::new);
        components.add_security_scheme("basic_auth", SecurityScheme::Http(Http::new(HttpAuthScheme::Basic)));
    }
}

/// 创建当前App的路由
///
/// 完成以下功能：
/// - 生成OpenAPI文档
/// - 生成App路由
/// - 使用Scalar作为最终在线文档格式
///
/// 由于使用了 `utoipa` 库来自动化生成`openapi`文档，因此我们没有使用原生的 [`Router`]，而是使用了
/// [`OpenApiRouter`] 。
pub fn create_app_router(shared_state: AppState) -> Router {
    // 当前项目的OpenAPI声明
    #[derive(OpenApi)]
    #[openapi(
        modifiers(&BasicAuthAddon),
        tags(
            (name = "projects", description = "项目创建、审核、生命周期与搜索"),
            (name = "engagement", description = "捐款、评分、评论与回复"),
            (name = "taxonomy", description = "分类与标签"),
            (name = "users", description = "注册与个人主页"),
            (name = "moderation", description = "举报与审核队列"),
        ),
    )]
    struct ApiDoc;

    // 使用`utoipa_axum`提供的OpenApiRouter来创建路由。
    // 同时传递共享状态数据到路由中供使用。
    // 最终拿到的变量：
    // - router: Axum的Router，实际的路由对象
    // - api: utoipa的OpenApi，生成的OpenAPI对象
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .nest("/api/v1", routers(shared_state))
        .split_for_parts();

    // 合并文档路由，用户可通过 /docs 访问文档网页地址
    router.merge(Scalar::with_url("/docs", api))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{cheap_passwords, fixture, Fixture};
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use chrono::Duration;
    use serde_json::{json, Value};
    use shared_lib::ModerationPolicy;
    use tower::ServiceExt;

    fn app(f: &Fixture) -> Router {
        let state = AppState::with_passwords(f.repos.clone(), ModerationPolicy::AutoApprove, cheap_passwords());
        create_app_router(state)
    }

    fn basic(login: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{login}:{password}")))
    }

    async fn send(app: &Router, method: Method, uri: &str, auth: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            request = request.header(header::AUTHORIZATION, auth);
        }
        let body = match body {
            Some(value) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = app.clone().oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap_or(Value::Null) };
        (status, value)
    }

    fn project_body(f: &Fixture, title: &str) -> Value {
        let now = Utc::now();
        json!({
            "title": title,
            "details": "Solar powered pumps for smallholder farms.",
            "category_id": f.category.id,
            "total_target": "5000.00",
            "start_date": (now + Duration::days(1)).to_rfc3339(),
            "end_date": (now + Duration::days(31)).to_rfc3339(),
        })
    }

    #[tokio::test]
    async fn test_register_and_profile() {
        let f = fixture().await;
        let app = app(&f);

        let registration = json!({
            "username": "mona",
            "first_name": "Mona",
            "last_name": "Adel",
            "email": "mona@example.com",
            "phone": "01012345678",
            "password": "secret-pass",
            "password_confirm": "secret-pass",
        });
        let (status, body) = send(&app, Method::POST, "/api/v1/users", None, Some(registration.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["username"], "mona");

        // 重复注册返回字段错误
        let (status, _) = send(&app, Method::POST, "/api/v1/users", None, Some(registration)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let auth = basic("mona@example.com", "secret-pass");
        let (status, body) = send(&app, Method::GET, "/api/v1/me", Some(&auth), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user"]["email"], "mona@example.com");
        assert_eq!(body["data"]["project_count"], 0);

        let (status, _) = send(&app, Method::GET, "/api/v1/me", Some(&basic("mona", "wrong")), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, _) = send(&app, Method::GET, "/api/v1/me", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_project_donation_flow() {
        let f = fixture().await;
        let app = app(&f);
        let creator = basic("creator", "password123");
        let donor = basic("donor@example.com", "password123");

        let (status, body) =
            send(&app, Method::POST, "/api/v1/projects", Some(&creator), Some(project_body(&f, "Solar Pumps"))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "active");
        let slug = body["data"]["slug"].as_str().unwrap().to_string();
        assert!(slug.starts_with("solar-pumps-"));

        let (status, body) = send(&app, Method::GET, &format!("/api/v1/projects/{slug}"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["creator_username"], "creator");
        assert_eq!(body["data"]["category"]["name"], "Water");

        let donation = json!({ "amount": "150.00", "message": "Good luck" });
        let uri = format!("/api/v1/projects/{slug}/donations");
        let (status, _) = send(&app, Method::POST, &uri, None, Some(donation.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, body) = send(&app, Method::POST, &uri, Some(&donor), Some(donation)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["project_current_amount"], "150.00");

        let (status, body) = send(&app, Method::GET, &uri, None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["donor"], "donor");

        let (status, body) = send(&app, Method::GET, "/api/v1/me/donations", Some(&donor), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["project_slug"], slug.as_str());
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let f = fixture().await;
        let app = app(&f);
        let donor = basic("donor", "password123");

        let (status, _) = send(&app, Method::GET, "/api/v1/projects/missing", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let category = json!({ "name": "Health" });
        let (status, _) = send(&app, Method::POST, "/api/v1/categories", Some(&donor), Some(category.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let admin = basic("admin", "password123");
        let (status, _) = send(&app, Method::POST, "/api/v1/categories", Some(&admin), Some(category)).await;
        assert_eq!(status, StatusCode::CREATED);

        let search = json!({ "min_target": "5000", "max_target": "1000" });
        let (status, body) = send(&app, Method::POST, "/api/v1/search-projects", None, Some(search)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.to_string().contains("max_target"));

        let (status, body) = send(&app, Method::GET, "/api/v1/homepage", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["categories"].as_array().unwrap().len(), 2);

        let (status, body) = send(&app, Method::GET, "/api/v1/categories/explore", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["category"]["name"], "Health");
        assert_eq!(body["data"][1]["featured"], json!([]));
    }
}
