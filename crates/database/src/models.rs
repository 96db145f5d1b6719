//! 数据库模型模块
//!
//! 这里定义与数据库表对应的结构体和相关操作

pub mod engagement;
pub mod project;
pub mod report;
pub mod taxonomy;
pub mod user;

// 重新导出具体的模型
pub use engagement::{
    Comment, CommentCreate, CommentPage, CommentWithAuthor, Donation, DonationCreate, DonationReceipt,
    DonationWithDonor, DonationWithProject, Rating, RatingSummary, RatingUpsert, RatingUpsertOutcome,
};
pub use project::{
    Approval, Project, ProjectCreate, ProjectImage, ProjectImageCreate, ProjectQuery, ProjectSearchResult,
    ProjectSort, ProjectStatus, ProjectSummary, ProjectUpdate, SearchField, SettledProject, SimilarCandidate,
    StatusTransition, TextFilter,
};
pub use report::{Report, ReportCreate, ReportReason, ReportTarget};
pub use taxonomy::{Category, CategoryCreate, CategoryWithCount, Tag, TagCreate, TagWithCount};
pub use user::{User, UserCreate, UserProfileUpdate};
