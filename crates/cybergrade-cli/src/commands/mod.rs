pub mod context;
pub mod dashboard;
pub mod export;
pub mod grade;
pub mod init;
pub mod status;
pub mod submit;
pub mod validate;
