//! CLI command implementations

pub mod init;
pub mod query;
pub mod receive;
pub mod send;
pub mod service;
pub mod validate;
