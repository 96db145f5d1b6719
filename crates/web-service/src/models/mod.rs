pub mod common;
pub mod engagement;
pub mod err;
pub mod projects;
pub mod reports;
pub mod taxonomy;
pub mod users;
