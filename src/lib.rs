pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod global;
pub mod meeting;
pub mod notify;
pub mod presence;
pub mod store;
pub mod summary;
