pub mod computer;
pub mod license;
pub mod meeting;
pub mod user;
