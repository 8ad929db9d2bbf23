pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod rbac;
pub mod services;
pub mod state;

pub use app::app;
pub use state::AppState;
