pub mod catalog;
pub mod import;
pub mod init;
pub mod report;
pub mod request_schema;
