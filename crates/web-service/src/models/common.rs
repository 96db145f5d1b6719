use serde::{Deserialize, Serialize};
use shared_lib::DEFAULT_PAGE_SIZE;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

fn default_page_index() -> u32 {
    1
}

fn default_page_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

/// 分页查询信息
///
/// 既可以作为 json body 的一部分，也可以作为 query 参数使用，缺省时为第1页、每页12条
#[derive(Deserialize, Debug, Clone, Copy, ToSchema, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    #[schema(example = 1)]
    #[validate(range(min = 1))]
    #[serde(default = "default_page_index")]
    /// 分页查询的开始页数
    pub page_index: u32,

    #[schema(example = 12)]
    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_page_size")]
    /// 分页查询的每页大小
    pub page_size: u32,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self { page_index: default_page_index(), page_size: default_page_size() }
    }
}

impl PageQuery {
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    /// saturating_sub(1)会保证结果>=0，不会出现溢出
    pub fn offset(&self) -> i64 {
        i64::from(self.page_index.saturating_sub(1)) * i64::from(self.page_size)
    }
}

/// 封装符合json-api的单个返回对象
///
/// 具体参考：<https://jsonapi.org>
#[derive(Deserialize, Debug, ToSchema, Serialize)]
pub struct Reply<T> {
    pub data: T,
}

impl<T> Reply<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// 封装符合json-api的列表对象
#[derive(Deserialize, Debug, ToSchema, Serialize)]
pub struct ReplyList<T> {
    pub data: Vec<T>,
    #[schema(example = 146)]
    /// 分页查询总数
    pub total: u32,

    #[schema(example = 12)]
    /// 分页查询的每页大小
    pub page_size: u32,

    #[schema(example = 1)]
    /// 分页查询的开始页数
    pub page_index: u32,
}

impl<T> ReplyList<T> {
    pub fn new(data: Vec<T>, total: u32, page: PageQuery) -> Self {
        Self { data, total, page_size: page.page_size, page_index: page.page_index }
    }
}

/// 只限制返回数量的列表查询参数
#[derive(Deserialize, Debug, Clone, Copy, Default, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LimitQuery {
    /// 返回数量，缺省时使用各接口自己的默认值
    pub limit: Option<u32>,
}

impl LimitQuery {
    pub fn or(&self, default: u32) -> u32 {
        self.limit.unwrap_or(default)
    }
}
