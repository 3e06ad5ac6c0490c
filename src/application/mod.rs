//! Application services: query composition, soft-delete scoping and the
//! cache-aware content services built on them.

pub mod comments;
pub mod content;
pub mod context;
pub mod error;
pub mod query;
pub mod repos;
pub mod soft_delete;
