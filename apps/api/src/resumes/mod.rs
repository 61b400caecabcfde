//! Resume metadata. Files themselves live wherever `file_path` points.

pub mod handlers;
pub mod repository;
