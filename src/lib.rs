pub mod application;
pub mod auth;
pub mod cli;
pub mod core;
pub mod database;
pub mod environment;
pub mod mbti;
pub mod types;
pub mod utils;
pub mod web;

pub use environment::EnvironmentConfig;
pub use web::start_web_server;
