pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod state;
pub mod todos;

pub use error::AppError;
pub use state::AppState;
